//! JSON archives fetched directly by name

use esios_client::decode::FormatError;
use esios_client::transport::Payload;
use esios_client::{Cell, ClientError, Resource};
use serde_json::json;

use crate::support::{client, june_first, FakeTransport};

#[tokio::test]
async fn test_json_archive_skips_the_catalog() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives_json/SujetosMercado",
        Payload::json(
            r#"{"SujetosMercado": [{"Codigo": "IBEG", "Descripcion": "Iberdrola Generación"}],
                "fecha": "2021-06-01"}"#,
        ),
    );

    let mut client = client(&transport);
    let result = client.download_by("SujetosMercado", &june_first()).await.unwrap();

    let nested = result.as_nested().expect("JSON archives stay nested");
    assert_eq!(nested["fecha"], json!("2021-06-01"));
    assert_eq!(nested["SujetosMercado"][0]["Codigo"], json!("IBEG"));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/archives_json/SujetosMercado");
    assert_eq!(calls[0].param("date"), Some("2021-06-01T00:00:00+02:00"));
}

#[tokio::test]
async fn test_json_archive_must_be_an_object() {
    let transport = FakeTransport::new();
    transport.respond("/archives_json/Custom", Payload::json("[1, 2, 3]"));

    let mut client = client(&transport);
    let err = client
        .download(Resource::ArchiveJson("Custom".to_string()), &june_first())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Format {
            source: FormatError::Json(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_programming_unit_owners_joins_both_archives() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives_json/UnidadesProgramacion",
        Payload::json(
            r#"{"UnidadesProgramacion": [
                {"Código de UP": "GEN1", "Sujeto del Mercado": "IBEG"},
                {"Código de UP": "EOL1", "Sujeto del Mercado": "ENDG"},
                {"Código de UP": "HUERFANA", "Sujeto del Mercado": "NADIE"}
            ]}"#,
        ),
    );
    transport.respond(
        "/archives_json/SujetosMercado",
        Payload::json(
            r#"{"SujetosMercado": [
                {"Código de sujeto": "ENDG", "Nombre": "Endesa Generación"},
                {"Código de sujeto": "IBEG", "Nombre": "Iberdrola Generación"}
            ]}"#,
        ),
    );

    let mut client = client(&transport);
    let table = client.programming_unit_owners(&june_first()).await.unwrap();

    assert_eq!(table.columns(), &["Código de UP", "Nombre"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(0, "Código de UP"), Some(&Cell::Text("GEN1".to_string())));
    assert_eq!(
        table.get(0, "Nombre"),
        Some(&Cell::Text("Iberdrola Generación".to_string()))
    );
    assert_eq!(
        table.get(1, "Nombre"),
        Some(&Cell::Text("Endesa Generación".to_string()))
    );

    assert_eq!(transport.calls_to("/archives"), 0);
    assert!(transport
        .calls()
        .iter()
        .all(|c| c.param("date") == Some("2021-06-01T00:00:00+02:00")));
}

#[tokio::test]
async fn test_programming_unit_owners_requires_records() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives_json/UnidadesProgramacion",
        Payload::json(r#"{"UnidadesProgramacion": "pending"}"#),
    );
    transport.respond("/archives_json/SujetosMercado", Payload::json(r#"{"SujetosMercado": []}"#));

    let mut client = client(&transport);
    let err = client.programming_unit_owners(&june_first()).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Format {
            source: FormatError::Json(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_listings_skip_the_catalog() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives_json",
        Payload::json(
            r#"{"archives": [
                {"id": 1, "name": "SujetosMercado", "archive_type": "json"},
                {"id": 2, "name": "UnidadesProgramacion", "archive_type": "json"}
            ]}"#,
        ),
    );
    transport.respond(
        "/indicators",
        Payload::json(r#"{"indicators": [{"id": 600, "name": "Precio mercado spot diario"}]}"#),
    );

    let client = client(&transport);
    let archives = client.list_json_archives().await.unwrap();
    let names: Vec<&str> = archives.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["SujetosMercado", "UnidadesProgramacion"]);
    assert_eq!(archives[0].archive_type.as_deref(), Some("json"));

    let indicators = client.list_indicators().await.unwrap();
    assert_eq!(indicators.len(), 1);
    assert_eq!(indicators[0].id, 600);

    assert_eq!(transport.calls_to("/archives"), 0);
    assert!(transport.calls().iter().all(|c| c.params.is_empty()));
}
