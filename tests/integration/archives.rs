//! Binary archive downloads through the listing catalog

use chrono::NaiveDate;
use esios_client::catalog::KnownResource;
use esios_client::decode::{decode_archive, ArchiveLayout, FileFormat, FormatError};
use esios_client::transport::Payload;
use esios_client::{Cell, ClientError, DecodedResult, Query, Resource, ResourceKind};

use crate::support::{
    client, date, index_sheet, june_first, listing, listing_entry, xlsx, zip, FakeTransport,
};

const HEADER: &[&str] = &["Unidad", "Hora 1", "Hora 2"];
const ROW_1: &[&str] = &["GEN1", "10", "12"];
const ROW_2: &[&str] = &["GEN2", "5", "6"];
const ROW_3: &[&str] = &["DEM1", "-3", "-4"];

#[tokio::test]
async fn test_workbook_with_empty_sheet_yields_single_table() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives",
        listing(&[listing_entry(90, "TESTBOOK", "xls", "D", "2021-06-01")]),
    );
    let workbook = xlsx(&[("Sheet1", &[HEADER, ROW_1, ROW_2, ROW_3]), ("Sheet2", &[])]);
    transport.respond(
        "/archives/90/download",
        Payload::zip(zip(&[("TESTBOOK_20210601.xlsx", &workbook)])),
    );

    let mut client = client(&transport);
    let result = client.download_by("TESTBOOK", &june_first()).await.unwrap();

    let tables = result.as_tables().expect("archive decodes to a table map");
    assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["Sheet1"]);
    let sheet = &tables["Sheet1"];
    assert_eq!(sheet.len(), 3);
    assert_eq!(sheet.columns(), HEADER);
    assert_eq!(sheet.get(0, "Unidad"), Some(&Cell::Text("GEN1".to_string())));
    assert_eq!(sheet.get(2, "Hora 2"), Some(&Cell::Number(-4.0)));

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].path, "/archives");
    assert_eq!(calls[1].path, "/archives/90/download");
    assert_eq!(calls[1].param("date"), Some("2021-06-01T00:00:00+02:00"));
}

#[tokio::test]
async fn test_missing_archive_is_not_available_after_one_refresh() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives",
        listing(&[listing_entry(48, "liquicomun", "csv", "M", "2021-06-01")]),
    );

    let mut client = client(&transport);
    let err = client.download_by("I90DIA", &june_first()).await.unwrap_err();

    match &err {
        ClientError::NotAvailable { context } => {
            assert_eq!(context.kind, ResourceKind::Archive);
            assert_eq!(context.date, Some(june_first()));
        }
        other => panic!("expected NotAvailable, got {other:?}"),
    }
    assert!(err.to_string().contains("I90DIA"));

    let calls = transport.calls();
    assert_eq!(calls.len(), 2, "initial load plus one refresh: {calls:?}");
    assert!(calls.iter().all(|c| c.path == "/archives"));
    assert_eq!(calls[0].param("date"), None);
    assert_eq!(calls[1].param("date"), Some("2021-06-01T00:00:00+02:00"));
}

#[tokio::test]
async fn test_refresh_picks_up_late_publication() {
    let transport = FakeTransport::new();
    transport.respond("/archives", listing(&[]));
    transport.respond(
        "/archives",
        listing(&[listing_entry(34, "I90DIA", "zip", "D", "2021-06-01")]),
    );
    let index = index_sheet(&[("I90DIA26", "Programa"), ("I90DIA01", "Reservada")]);
    let index: Vec<&[&str]> = index.iter().map(Vec::as_slice).collect();
    let workbook = xlsx(&[
        ("Indice", &index),
        (
            "I90DIA26",
            &[&["Programa I90"], &["Fecha 01/06/2021"], HEADER, ROW_1, ROW_2],
        ),
        ("I90DIA01", &[&["Titulo"], &["Sub"], HEADER, ROW_3]),
    ]);
    transport.respond(
        "/archives/34/download",
        Payload::zip(zip(&[
            ("leeme.txt", b"ignored".as_slice()),
            ("I90DIA_20210601.xlsx", &workbook),
        ])),
    );

    let mut client = client(&transport);
    let result = client
        .download(Resource::Archive("I90DIA".to_string()), &june_first())
        .await
        .unwrap();

    let tables = result.as_tables().unwrap();
    assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["I90DIA26", "Indice"]);
    assert_eq!(tables["Indice"].columns(), &["Hoja", "Descripcion"]);
    let sheet = &tables["I90DIA26"];
    assert_eq!(sheet.columns(), HEADER);
    assert_eq!(sheet.len(), 2);
    assert_eq!(sheet.get(0, "Hora 1"), Some(&Cell::Number(10.0)));
    assert_eq!(transport.calls_to("/archives"), 2);
    assert_eq!(transport.calls_to("/archives/34/download"), 1);
}

#[tokio::test]
async fn test_daily_archive_found_from_utc_midnight() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives",
        listing(&[listing_entry(48, "liquicomun", "csv", "D", "2021-06-01")]),
    );
    transport.respond(
        "/archives/48/download",
        Payload::zip(zip(&[("prdvdatos_20210601.csv", b"Hora;Precio\n1;45,67\n".as_slice())])),
    );

    // the same instant as Madrid midnight on June 1st, written in UTC
    let mut client = client(&transport);
    let result = client
        .download_by("liquicomun", &date("2021-05-31T22:00:00+00:00"))
        .await
        .unwrap();

    let tables = result.as_tables().unwrap();
    assert_eq!(tables["prdvdatos_20210601"].get(0, "Precio"), Some(&Cell::Number(45.67)));
    assert_eq!(transport.calls_to("/archives"), 1, "no refresh needed");
}

#[tokio::test]
async fn test_registered_late_archive_goes_through_dated_refresh() {
    let transport = FakeTransport::new();
    transport.respond("/archives", listing(&[]));
    transport.respond(
        "/archives",
        listing(&[listing_entry(77, "TARDIO", "xls", "D", "2021-06-01")]),
    );
    let workbook = xlsx(&[("Sheet1", &[HEADER, ROW_1])]);
    transport.respond(
        "/archives/77/download",
        Payload::zip(zip(&[("TARDIO_20210601.xlsx", &workbook)])),
    );

    let mut client = client(&transport);
    client.register(KnownResource::new("TARDIO", ResourceKind::Archive));
    let result = client.download_by("TARDIO", &june_first()).await.unwrap();

    assert_eq!(result.as_tables().unwrap()["Sheet1"].len(), 1);
    assert_eq!(transport.calls_to("/archives"), 2);
    assert_eq!(transport.calls_to("/indicators"), 0);
}

#[tokio::test]
async fn test_monthly_delimited_archive() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives",
        listing(&[listing_entry(48, "liquicomun", "csv", "M", "2021-06-01")]),
    );
    let prices = "Fecha;Hora;Precio\n01/06/2021;1;45,67\n01/06/2021;2;1.234,5\n";
    let units = "Codigo;Nombre\nUP1;Planta Norte\n";
    transport.respond(
        "/archives/48/download",
        Payload::zip(zip(&[
            ("prdvdatos_202106.csv", prices.as_bytes()),
            ("unidades_202106.csv", units.as_bytes()),
        ])),
    );

    let mut client = client(&transport);
    let result = client
        .download_by(Query::from("liquicomun"), &date("2021-06-15T00:00:00+02:00"))
        .await
        .unwrap();

    let tables = result.as_tables().unwrap();
    assert_eq!(
        tables.keys().collect::<Vec<_>>(),
        vec!["prdvdatos_202106", "unidades_202106"]
    );
    let prices = &tables["prdvdatos_202106"];
    assert_eq!(prices.columns(), &["Fecha", "Hora", "Precio"]);
    assert_eq!(
        prices.get(0, "Fecha"),
        Some(&Cell::Date(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()))
    );
    assert_eq!(prices.get(1, "Hora"), Some(&Cell::Number(2.0)));
    assert_eq!(prices.get(0, "Precio"), Some(&Cell::Number(45.67)));
    assert_eq!(prices.get(1, "Precio"), Some(&Cell::Number(1234.5)));
    assert_eq!(
        tables["unidades_202106"].get(0, "Nombre"),
        Some(&Cell::Text("Planta Norte".to_string()))
    );
}

#[tokio::test]
async fn test_resolve_does_not_fetch_the_file() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives",
        listing(&[listing_entry(34, "I90DIA", "zip", "D", "2021-06-01")]),
    );

    let mut client = client(&transport);
    let reference = client
        .resolve(&Resource::Archive("I90DIA".to_string()), &june_first())
        .await
        .unwrap();

    assert_eq!(reference.kind, ResourceKind::Archive);
    assert_eq!(reference.location, "/archives/34/download");
    // declared by the registry; the listing tag alone says nothing
    assert_eq!(reference.format, Some(FileFormat::Spreadsheet));
    assert_eq!(transport.calls_to("/archives/34/download"), 0);
}

#[tokio::test]
async fn test_corrupt_container_is_format_error() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives",
        listing(&[listing_entry(90, "TESTBOOK", "xls", "D", "2021-06-01")]),
    );
    transport.respond("/archives/90/download", Payload::zip(b"not a zip".to_vec()));

    let mut client = client(&transport);
    let err = client.download_by("TESTBOOK", &june_first()).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Format {
            source: FormatError::Container(_),
            ..
        }
    ));
}

#[test]
fn test_archive_decoding_is_deterministic() {
    let workbook = xlsx(&[("B", &[HEADER, ROW_1]), ("A", &[HEADER, ROW_2])]);
    let container = zip(&[("book.xlsx", &workbook)]);

    let first = decode_archive(&container, None, &ArchiveLayout::default()).unwrap();
    let second = decode_archive(&container, None, &ArchiveLayout::default()).unwrap();
    assert_eq!(first, second);
    match first {
        DecodedResult::Tables(tables) => assert_eq!(tables.len(), 2),
        other => panic!("expected tables, got {}", other.shape()),
    }
}
