//! Progress table retrieval and HTML table parsing.

use crate::{auth::Session, error::EtlError};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

// Selector::parse only fails on invalid CSS; these literals are fixed.
static THEAD_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("thead").unwrap());
static TBODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody").unwrap());
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static HEADER_CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").unwrap());

/// Header labels plus rows of cell text, as scraped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut table = Self { headers, rows };
        table.reconcile();
        table
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    /// Pads rows with empty cells and names missing columns `col_{i}`.
    /// Only applies when both headers and rows are present.
    fn reconcile(&mut self) {
        if self.headers.is_empty() || self.rows.is_empty() {
            return;
        }
        let width = self.width();
        for i in self.headers.len()..width {
            self.headers.push(format!("col_{i}"));
        }
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
    }
}

/// Anything able to produce the raw progress table behind a URL.
pub trait Extractor {
    fn extract(&self, url: &str) -> Result<RawTable, EtlError>;
}

/// Fetches portal pages through an authenticated [`Session`].
pub struct PortalScraper<'a> {
    session: &'a Session,
    table_id: String,
    normalize_unicode: bool,
}

impl<'a> PortalScraper<'a> {
    pub fn new(session: &'a Session, table_id: &str, normalize_unicode: bool) -> Self {
        Self {
            session,
            table_id: table_id.to_string(),
            normalize_unicode,
        }
    }

    pub fn scrape(&self, url: &str) -> Result<RawTable, EtlError> {
        let resp = self
            .session
            .client()
            .get(url)
            .send()
            .map_err(|e| EtlError::http(url, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EtlError::http(url, format!("status {status}")));
        }

        let body = resp
            .text()
            .map_err(|e| EtlError::http(url, format!("reading body: {e}")))?;
        debug!("fetched {} bytes from {}", body.len(), url);

        parse_table(&body, &self.table_id, self.normalize_unicode).map_err(|err| match err {
            EtlError::TableNotFound { table_id, .. } => EtlError::TableNotFound {
                table_id,
                url: url.to_string(),
            },
            other => other,
        })
    }
}

impl Extractor for PortalScraper<'_> {
    fn extract(&self, url: &str) -> Result<RawTable, EtlError> {
        self.scrape(url)
    }
}

/// Extracts the table whose `id` attribute equals `table_id`.
pub fn parse_table(html: &str, table_id: &str, normalize_unicode: bool) -> Result<RawTable, EtlError> {
    let table_selector = Selector::parse(&format!("table[id=\"{}\"]", table_id.replace('"', "")))
        .map_err(|e| EtlError::Configuration(format!("invalid table id {table_id:?}: {e:?}")))?;

    let doc = Html::parse_document(html);
    let table = doc
        .select(&table_selector)
        .next()
        .ok_or_else(|| EtlError::TableNotFound {
            table_id: table_id.to_string(),
            url: String::new(),
        })?;

    let headers: Vec<String> = table
        .select(&THEAD_SELECTOR)
        .next()
        .and_then(|thead| thead.select(&ROW_SELECTOR).next())
        .map(|tr| {
            tr.select(&HEADER_CELL_SELECTOR)
                .map(|th| cell_text(th, normalize_unicode))
                .collect()
        })
        .unwrap_or_default();

    let rows: Vec<Vec<String>> = table
        .select(&TBODY_SELECTOR)
        .next()
        .map(|tbody| {
            tbody
                .select(&ROW_SELECTOR)
                .map(|tr| {
                    tr.select(&CELL_SELECTOR)
                        .map(|td| cell_text(td, normalize_unicode))
                        .collect()
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(RawTable::new(headers, rows))
}

fn cell_text(el: ElementRef<'_>, normalize_unicode: bool) -> String {
    let text: String = el.text().collect();
    if normalize_unicode {
        text.nfkc().collect::<String>().trim().to_string()
    } else {
        text.trim().to_string()
    }
}
