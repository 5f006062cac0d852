//! Remote pack catalog retrieval
//!
//! The tracker publishes one listing page per bot with the packs inside a
//! `menu2` section, one `<tr class="L1">` row per pack. This parser handles
//! exactly that shape and nothing more.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::thread;
use std::time::Duration;

use crate::reconcile::CatalogEntry;

const FETCH_ATTEMPTS: u32 = 3;
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_PAUSE: Duration = Duration::from_secs(2);

lazy_static! {
    static ref ROW: Regex = Regex::new(r#"(?s)<tr class="L1">(.*?)</tr>"#).unwrap();
    static ref CELL: Regex = Regex::new(r"(?s)<td[^>]*>(.*?)</td>").unwrap();
    static ref INNER_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Source of the remote pack listing for a bot.
pub trait CatalogSource {
    fn fetch(&self, alias: &str) -> Result<Vec<CatalogEntry>>;
}

pub struct HttpCatalog {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn fetch_page(&self, alias: &str) -> Result<String> {
        let url = format!("{}?Modo=Packs&bot={}", self.base_url, alias);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .client
                .get(&url)
                .send()
                .and_then(|r| r.error_for_status())
                .and_then(|r| r.text())
            {
                Ok(body) => return Ok(body),
                Err(e) if attempt >= FETCH_ATTEMPTS => {
                    return Err(e)
                        .with_context(|| format!("fetch {} ({} attempts)", url, FETCH_ATTEMPTS));
                }
                Err(e) => {
                    eprintln!("catalog attempt {}/{} failed: {}", attempt, FETCH_ATTEMPTS, e);
                    thread::sleep(RETRY_PAUSE);
                }
            }
        }
    }
}

impl CatalogSource for HttpCatalog {
    fn fetch(&self, alias: &str) -> Result<Vec<CatalogEntry>> {
        let body = self.fetch_page(alias)?;
        Ok(parse_listing(alias, &body))
    }
}

/// Extract catalog rows from a listing page. Rows that do not fit the
/// expected shape are skipped with a warning rather than failing the pass.
pub fn parse_listing(alias: &str, body: &str) -> Vec<CatalogEntry> {
    let section = match body.find("id=\"menu2\"") {
        Some(idx) => &body[idx..],
        None => {
            eprintln!("bot {}: listing has no menu2 section", alias);
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    for row in ROW.captures_iter(section) {
        let cells: Vec<String> = CELL
            .captures_iter(&row[1])
            .map(|c| INNER_TAG.replace_all(&c[1], "").trim().to_string())
            .collect();
        if cells.len() < 5 {
            continue;
        }
        match cells[0].trim_start_matches('#').parse::<u32>() {
            Ok(pack) => entries.push(CatalogEntry {
                pack,
                name: cells[4].clone(),
            }),
            Err(_) => eprintln!("bot {}: skipping row with bad pack id {:?}", alias, cells[0]),
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html><body><div id="menu1">nav</div>
        <div id="menu2"><table>
        <tr class="L1"><td>#11</td><td>1x</td><td>300MB</td><td>today</td><td><a href="#">[AnimeNSK] Show - 11 (ABCD1234)</a></td></tr>
        <tr class="L1"><td>#12</td><td>4x</td><td>299MB</td><td>today</td><td>Show - 12 (EFGH5678)</td></tr>
        <tr class="L1"><td>#oops</td><td></td><td></td><td></td><td>broken row</td></tr>
        </table></div></body></html>"##;

    #[test]
    fn test_rows_parse_in_order() {
        let entries = parse_listing("Laura", PAGE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].pack, 11);
        assert_eq!(entries[0].name, "[AnimeNSK] Show - 11 (ABCD1234)");
        assert_eq!(entries[1].pack, 12);
        assert_eq!(entries[1].name, "Show - 12 (EFGH5678)");
    }

    #[test]
    fn test_rows_before_menu2_are_ignored() {
        let page = r#"<tr class="L1"><td>#1</td><td></td><td></td><td></td><td>x</td></tr><div id="menu2"></div>"#;
        assert!(parse_listing("Laura", page).is_empty());
    }

    #[test]
    fn test_missing_section_yields_empty() {
        assert!(parse_listing("Laura", "<html></html>").is_empty());
    }
}
