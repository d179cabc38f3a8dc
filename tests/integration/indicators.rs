//! Indicator downloads by id and by name

use esios_client::decode::FormatError;
use esios_client::lookup::IndicatorSearch;
use esios_client::timezone::{CentralEuropeanTime, FixedZone};
use esios_client::transport::{Endpoints, Payload, TransportError};
use esios_client::{Cell, ClientError, EsiosClient, Query};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::support::{client, june_first, listing, listing_entry, CountingCatalog, FakeTransport};

const MAPPED_SERIES: &str = r#"{
    "series_a": [["2021-05-31T22:00:00Z", 1.0], ["2021-05-31T23:00:00Z", 2.0]],
    "series_b": [["2021-05-31T22:00:00Z", 3.0], ["2021-05-31T23:00:00Z", 4.0]]
}"#;

#[tokio::test]
async fn test_indicator_by_id_never_touches_the_catalog() {
    let transport = FakeTransport::new();
    transport.respond("/indicators/600", Payload::json(MAPPED_SERIES));

    let (catalog, counters) = CountingCatalog::new(transport.clone());
    let lookup = IndicatorSearch::new(transport.clone(), Endpoints::default());
    let mut client = EsiosClient::with_collaborators(
        transport.clone(),
        Box::new(catalog),
        Box::new(lookup),
        Arc::new(CentralEuropeanTime),
    );

    let table = client
        .download_by(600, &june_first())
        .await
        .unwrap()
        .into_table()
        .expect("indicators decode to one table");

    assert_eq!(counters.total(), 0);
    assert_eq!(counters.refreshes.load(Ordering::SeqCst), 0);

    assert_eq!(table.columns(), &["series_a", "series_b"]);
    let index: Vec<String> = table.index().unwrap().iter().map(|t| t.to_rfc3339()).collect();
    assert_eq!(
        index,
        vec!["2021-06-01T00:00:00+02:00", "2021-06-01T01:00:00+02:00"]
    );
    assert_eq!(
        table.rows(),
        &[
            vec![Cell::Number(1.0), Cell::Number(3.0)],
            vec![Cell::Number(2.0), Cell::Number(4.0)],
        ]
    );

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/indicators/600");
    assert_eq!(calls[0].param("date"), Some("2021-06-01T00:00:00+02:00"));
}

#[tokio::test]
async fn test_native_indicator_document_in_fixed_zone() {
    let transport = FakeTransport::new();
    transport.respond(
        "/indicators/1001",
        Payload::json(
            r#"{"indicator": {"name": "PVPC", "values": [
                {"value": 120.5, "datetime_utc": "2021-06-01T00:00:00Z", "geo_name": "Península"},
                {"value": "98.1", "datetime_utc": "2021-06-01T00:00:00Z", "geo_name": "Canarias"},
                {"value": null, "datetime_utc": "2021-06-01T01:00:00Z", "geo_name": "Península"}
            ]}}"#,
        ),
    );
    let mut client = EsiosClient::with_transport(transport.clone(), Arc::new(FixedZone::utc()));

    let result = client.download_by(1001, &june_first()).await.unwrap();
    let table = result.as_table().unwrap();

    assert_eq!(table.columns(), &["Península", "Canarias"]);
    assert_eq!(table.len(), 2);
    assert_eq!(
        table.index().unwrap()[1].to_rfc3339(),
        "2021-06-01T01:00:00+00:00"
    );
    assert_eq!(table.get(0, "Península"), Some(&Cell::Number(120.5)));
    assert_eq!(table.get(0, "Canarias"), Some(&Cell::Number(98.1)));
    assert_eq!(table.get(1, "Península"), Some(&Cell::Empty));
    assert_eq!(table.get(1, "Canarias"), Some(&Cell::Empty));
}

#[tokio::test]
async fn test_out_of_order_series_is_rejected() {
    let transport = FakeTransport::new();
    transport.respond(
        "/indicators/600",
        Payload::json(r#"{"a": [["2021-06-01T01:00:00Z", 1.0], ["2021-06-01T00:00:00Z", 2.0]]}"#),
    );

    let mut client = client(&transport);
    let err = client.download_by(600, &june_first()).await.unwrap_err();
    match err {
        ClientError::Format {
            context,
            source: FormatError::UnorderedTimestamps { series, .. },
        } => {
            assert_eq!(series, "a");
            assert_eq!(context.to_string(), "indicator #600 for 2021-06-01T00:00:00+02:00");
        }
        other => panic!("expected unordered timestamps, got {other:?}"),
    }
}

#[tokio::test]
async fn test_indicator_by_name_goes_through_lookup() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives",
        listing(&[listing_entry(34, "I90DIA", "zip", "D", "2021-06-01")]),
    );
    transport.respond(
        "/indicators",
        Payload::json(
            r#"{"indicators": [
                {"id": 1001, "name": "PVPC"},
                {"id": 600, "name": "Precio mercado spot diario"}
            ]}"#,
        ),
    );
    transport.respond("/indicators/600", Payload::json(MAPPED_SERIES));

    let mut client = client(&transport);
    let result = client
        .download_by(Query::from("Precio mercado spot diario"), &june_first())
        .await
        .unwrap();
    assert_eq!(result.as_table().unwrap().len(), 2);

    let paths: Vec<String> = transport.calls().into_iter().map(|c| c.path).collect();
    assert_eq!(paths, vec!["/archives", "/indicators", "/indicators/600"]);
}

#[tokio::test]
async fn test_unknown_name_is_not_found() {
    let transport = FakeTransport::new();
    transport.respond("/archives", listing(&[]));
    transport.respond(
        "/indicators",
        Payload::json(r#"{"indicators": [{"id": 1001, "name": "PVPC"}]}"#),
    );

    let mut client = client(&transport);
    assert_eq!(client.lookup_id("PVPC").await.unwrap(), 1001);

    let err = client.download_by("pvpc", &june_first()).await.unwrap_err();
    assert!(matches!(&err, ClientError::NotFound { name } if name == "pvpc"));
    assert!(err.context().is_none());
}

#[tokio::test]
async fn test_transport_failure_carries_context() {
    let transport = FakeTransport::new();

    let mut client = client(&transport);
    let err = client.download_by(42, &june_first()).await.unwrap_err();
    match err {
        ClientError::Transport { context, source } => {
            assert_eq!(context.to_string(), "indicator #42 for 2021-06-01T00:00:00+02:00");
            assert!(matches!(source, TransportError::Status { status: 404, .. }));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}
