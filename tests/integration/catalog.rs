//! Listing catalog lookups and refreshes

use esios_client::catalog::{ArchiveCatalog, Catalog, Horizon};
use esios_client::transport::{Endpoints, Payload};

use crate::support::{client, date, june_first, listing, listing_entry, FakeTransport};

#[tokio::test]
async fn test_find_misses_until_refresh_supplies_the_entry() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives",
        listing(&[listing_entry(34, "I90DIA", "zip", "D", "2021-06-01")]),
    );
    let mut catalog = Catalog::new(transport.clone(), Endpoints::default());

    assert!(!catalog.is_loaded());
    assert!(catalog.find("I90DIA", &june_first()).is_none());
    assert!(transport.calls().is_empty());

    catalog.refresh(Some(&june_first())).await.unwrap();
    let entry = catalog.find("I90DIA", &june_first()).expect("entry after refresh");
    assert_eq!(entry.id, 34);
    assert_eq!(entry.horizon, Horizon::Daily);
    assert_eq!(entry.location, "/archives/34/download");
    assert_eq!(transport.calls_to("/archives"), 1);
}

#[tokio::test]
async fn test_find_respects_dates_and_availability() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives",
        Payload::json(
            r#"{"archives": [
                {"id": 34, "name": "I90DIA", "archive_type": "zip", "horizon": "D",
                 "date": {"date": "2021-06-01T00:00:00.000+02:00"}},
                {"id": 7, "name": "IMES", "archive_type": "xls", "horizon": "M",
                 "date": "2021-06-01"},
                {"id": 35, "name": "I3DIA", "archive_type": "zip", "horizon": "D",
                 "date": "2021-06-01", "available": false}
            ]}"#,
        ),
    );
    let mut catalog = Catalog::new(transport.clone(), Endpoints::default());
    catalog.refresh(None).await.unwrap();

    assert!(catalog.find("I90DIA", &date("2021-06-02T00:00:00+02:00")).is_none());
    assert!(catalog.find("i90dia", &june_first()).is_none());
    assert!(catalog.find("IMES", &date("2021-06-30T00:00:00+02:00")).is_some());
    assert!(catalog.find("IMES", &date("2021-07-01T00:00:00+02:00")).is_none());
    assert!(catalog.find("I3DIA", &june_first()).is_none());
    assert!(catalog.contains_name("I3DIA"));
    assert_eq!(catalog.entries().len(), 3);
}

#[tokio::test]
async fn test_refresh_replaces_the_whole_listing() {
    let transport = FakeTransport::new();
    transport.respond(
        "/archives",
        listing(&[listing_entry(34, "I90DIA", "zip", "D", "2021-06-01")]),
    );
    transport.respond(
        "/archives",
        listing(&[listing_entry(35, "I3DIA", "zip", "D", "2021-06-01")]),
    );
    let mut catalog = Catalog::new(transport.clone(), Endpoints::default());

    catalog.refresh(None).await.unwrap();
    assert!(catalog.contains_name("I90DIA"));
    catalog.refresh(None).await.unwrap();
    assert!(!catalog.contains_name("I90DIA"));
    assert!(catalog.contains_name("I3DIA"));
}

#[tokio::test]
async fn test_malformed_listing_is_reported() {
    let transport = FakeTransport::new();
    transport.respond("/archives", Payload::json(r#"{"archives": "nope"}"#));

    let mut client = client(&transport);
    let err = client.refresh_catalog(Some(&june_first())).await.unwrap_err();
    assert!(matches!(err, esios_client::ClientError::Format { .. }));
    assert!(!client.catalog().is_loaded());
}

#[tokio::test]
async fn test_client_refresh_sends_the_date() {
    let transport = FakeTransport::new();
    transport.respond("/archives", listing(&[]));

    let mut client = client(&transport);
    client.refresh_catalog(Some(&june_first())).await.unwrap();

    assert!(client.catalog().is_loaded());
    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].param("date"), Some("2021-06-01T00:00:00+02:00"));
}
