//! Fakes and fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use esios_client::catalog::{ArchiveCatalog, Catalog, CatalogEntry, CatalogError};
use esios_client::timezone::CentralEuropeanTime;
use esios_client::transport::{Endpoints, Payload, Transport, TransportError, TransportResult};
use esios_client::EsiosClient;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// One recorded transport request
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Transport serving canned payloads per path
///
/// Responses for a path are consumed in order; the last one is repeated.
/// Unknown paths answer HTTP 404.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<HashMap<String, Vec<Payload>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, payload: Payload) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push(payload);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls().iter().filter(|c| c.path == path).count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, path: &str, params: &[(&str, String)]) -> TransportResult<Payload> {
        self.calls.lock().unwrap().push(Call {
            path: path.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(path) {
            Some(queue) if queue.len() > 1 => Ok(queue.remove(0)),
            Some(queue) if !queue.is_empty() => Ok(queue[0].clone()),
            _ => Err(TransportError::Status {
                status: 404,
                body: format!("no fixture for {path}"),
            }),
        }
    }
}

/// Call counts observed by [`CountingCatalog`]
#[derive(Debug, Default)]
pub struct CatalogCounters {
    pub refreshes: AtomicUsize,
    pub finds: AtomicUsize,
}

impl CatalogCounters {
    pub fn total(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst) + self.finds.load(Ordering::SeqCst)
    }
}

/// Listing catalog that counts refresh and find calls
pub struct CountingCatalog {
    inner: Catalog,
    counters: Arc<CatalogCounters>,
}

impl CountingCatalog {
    pub fn new(transport: Arc<dyn Transport>) -> (Self, Arc<CatalogCounters>) {
        let counters = Arc::new(CatalogCounters::default());
        let catalog = Self {
            inner: Catalog::new(transport, Endpoints::default()),
            counters: counters.clone(),
        };
        (catalog, counters)
    }
}

#[async_trait]
impl ArchiveCatalog for CountingCatalog {
    fn is_loaded(&self) -> bool {
        self.inner.is_loaded()
    }

    async fn refresh(&mut self, date: Option<&DateTime<FixedOffset>>) -> Result<(), CatalogError> {
        self.counters.refreshes.fetch_add(1, Ordering::SeqCst);
        self.inner.refresh(date).await
    }

    fn find(&self, name: &str, date: &DateTime<FixedOffset>) -> Option<CatalogEntry> {
        self.counters.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find(name, date)
    }

    fn entries(&self) -> &[CatalogEntry] {
        self.inner.entries()
    }
}

/// Client over `transport` in Central European Time
pub fn client(transport: &Arc<FakeTransport>) -> EsiosClient {
    EsiosClient::with_transport(transport.clone(), Arc::new(CentralEuropeanTime))
}

pub fn date(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

/// 2021-06-01 local midnight in Madrid
pub fn june_first() -> DateTime<FixedOffset> {
    date("2021-06-01T00:00:00+02:00")
}

/// One archive listing entry without a download block
pub fn listing_entry(id: u32, name: &str, archive_type: &str, horizon: &str, day: &str) -> String {
    format!(
        r#"{{"id": {id}, "name": "{name}", "archive_type": "{archive_type}", "horizon": "{horizon}",
            "date": {{"date": "{day}T00:00:00.000+02:00"}}, "available": true}}"#
    )
}

pub fn listing(entries: &[String]) -> Payload {
    Payload::json(format!(r#"{{"archives": [{}]}}"#, entries.join(",")))
}

/// Zip container with the given files
pub fn zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (path, contents) in files {
        writer
            .start_file(*path, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Minimal xlsx workbook; numeric-looking cells are stored as numbers
pub fn xlsx(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    let mut parts: Vec<(String, String)> = Vec::new();

    for (n, (name, rows)) in sheets.iter().enumerate() {
        let id = n + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{id}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        workbook.push_str(&format!(
            r#"<sheet name="{name}" sheetId="{id}" r:id="rId{id}"/>"#
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{id}.xml"/>"#
        ));

        let mut sheet = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, value) in row.iter().enumerate() {
                let reference = format!("{}{}", (b'A' + c as u8) as char, r + 1);
                if value.parse::<f64>().is_ok() {
                    sheet.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#));
                } else {
                    sheet.push_str(&format!(
                        r#"<c r="{reference}" t="inlineStr"><is><t>{value}</t></is></c>"#
                    ));
                }
            }
            sheet.push_str("</row>");
        }
        sheet.push_str("</sheetData></worksheet>");
        parts.push((format!("xl/worksheets/sheet{id}.xml"), sheet));
    }

    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");
    rels.push_str("</Relationships>");
    let root_rels = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    let mut files: Vec<(&str, &[u8])> = vec![
        ("[Content_Types].xml", content_types.as_bytes()),
        ("_rels/.rels", root_rels.as_bytes()),
        ("xl/workbook.xml", workbook.as_bytes()),
        ("xl/_rels/workbook.xml.rels", rels.as_bytes()),
    ];
    for (path, sheet) in &parts {
        files.push((path.as_str(), sheet.as_bytes()));
    }
    zip(&files)
}

/// Rows of a report index sheet: nine title rows, a header row at row 9, then
/// one (sheet, description) row per sheet
pub fn index_sheet<'a>(sheets: &[(&'a str, &'a str)]) -> Vec<Vec<&'a str>> {
    let mut rows = vec![vec!["Informe"]; 9];
    rows.push(vec!["Hoja", "Descripcion"]);
    rows.extend(sheets.iter().map(|(name, description)| vec![*name, *description]));
    rows
}

/// P48-style program document for 2021-06-01 (Madrid)
pub fn program_document(series: &[(&str, &str, &[(u32, &str)])]) -> String {
    let body: String = series
        .iter()
        .map(|(tag, unit, values)| {
            let intervals: String = values
                .iter()
                .map(|(pos, ctd)| format!(r#"<Intervalo><Pos v="{pos}"/><Ctd v="{ctd}"/></Intervalo>"#))
                .collect();
            format!(
                r#"<SeriesTemporales><{tag} v="{unit}"/><Periodo><IntervaloTiempo v="2021-05-31T22:00Z/2021-06-01T22:00Z"/><Resolucion v="PT60M"/>{intervals}</Periodo></SeriesTemporales>"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="ISO-8859-1"?><ProgramaDiarioOperacion><Horizonte v="2021-05-31T22:00Z/2021-06-01T22:00Z"/>{body}</ProgramaDiarioOperacion>"#
    )
}
