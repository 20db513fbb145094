use crate::error::TrackerError;
use crate::tracker::config::SiteConfig;
use crate::tracker::names::NameSet;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const USER_AGENT: &str = "guild-lastseen tracker";
const HEADING_OR_TABLE: &str = "h3, h4, h5, h6, table";

/// Source of the current online list for one server and guild.
pub trait Scraper {
    fn online_members(&self) -> Result<NameSet, TrackerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    Url(String),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct SiteScraper {
    pub source: PageSource,
    pub server_label: String,
    pub guild_name: String,
    pub timeout: Duration,
}

impl SiteScraper {
    pub fn from_config(cfg: &SiteConfig) -> Self {
        let source = match &cfg.source_file {
            Some(file) => PageSource::File(PathBuf::from(file)),
            None => PageSource::Url(cfg.url.clone()),
        };
        Self {
            source,
            server_label: cfg.server_label.clone(),
            guild_name: cfg.guild_name.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }

    fn fetch_html(&self) -> Result<String, TrackerError> {
        match &self.source {
            PageSource::File(path) => fs::read_to_string(path).map_err(|err| {
                TrackerError::Fetch(format!("failed to read {}: {err}", path.display()))
            }),
            PageSource::Url(url) => {
                let client = Client::builder()
                    .timeout(self.timeout)
                    .user_agent(USER_AGENT)
                    .build()
                    .map_err(|err| TrackerError::Fetch(format!("http client setup: {err}")))?;
                let response = client
                    .get(url)
                    .send()
                    .map_err(|err| TrackerError::Fetch(format!("GET {url}: {err}")))?;
                if !response.status().is_success() {
                    return Err(TrackerError::Fetch(format!(
                        "GET {url} returned {}",
                        response.status()
                    )));
                }
                response
                    .text()
                    .map_err(|err| TrackerError::Fetch(format!("GET {url} body: {err}")))
            }
        }
    }
}

impl Scraper for SiteScraper {
    fn online_members(&self) -> Result<NameSet, TrackerError> {
        let html = self.fetch_html()?;
        parse_online_members(&html, &self.server_label, &self.guild_name)
    }
}

fn selector(raw: &str) -> Result<Selector, TrackerError> {
    Selector::parse(raw).map_err(|err| TrackerError::Parse(format!("selector `{raw}`: {err}")))
}

/// Text of an element with every text node trimmed and joined.
fn cell_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_heading(element: ElementRef<'_>) -> bool {
    matches!(element.value().name(), "h3" | "h4" | "h5" | "h6")
}

/// For each `<table` tag in source order, whether the page itself wrote a
/// `<tbody>` before the next table tag. The parser adds one to every table,
/// so the parsed tree cannot answer this.
fn explicit_tbody_flags(html: &str) -> Vec<bool> {
    let lower = html.to_ascii_lowercase();
    let is_tag_end = |rest: &str| {
        rest.starts_with(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
    };
    let starts: Vec<usize> = lower
        .match_indices("<table")
        .filter(|(pos, _)| is_tag_end(&lower[pos + "<table".len()..]))
        .map(|(pos, _)| pos)
        .collect();

    starts
        .iter()
        .map(|&start| {
            let rest = &lower[start + "<table".len()..];
            let end = [rest.find("<table"), rest.find("</table")]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(rest.len());
            rest[..end].contains("<tbody")
        })
        .collect()
}

/// First table after a heading mentioning `server_label` that has a body.
fn find_server_table<'a>(
    document: &'a Html,
    html: &str,
    server_label: &str,
) -> Result<Option<ElementRef<'a>>, TrackerError> {
    let wanted = server_label.to_lowercase();
    let sequence: Vec<ElementRef<'a>> = document.select(&selector(HEADING_OR_TABLE)?).collect();
    let flags = explicit_tbody_flags(html);
    let mut table_index = HashMap::new();
    for element in sequence.iter().filter(|el| el.value().name() == "table") {
        let next = table_index.len();
        table_index.insert(element.id(), next);
    }
    // Tag counting can drift on odd markup; accept the table then.
    let has_body = |table: &ElementRef<'_>| {
        table_index
            .get(&table.id())
            .and_then(|idx| flags.get(*idx))
            .copied()
            .unwrap_or(true)
    };

    for (idx, element) in sequence.iter().enumerate() {
        if !is_heading(*element) {
            continue;
        }
        let heading = cell_text(*element);
        if heading.is_empty() || !heading.to_lowercase().contains(&wanted) {
            continue;
        }
        let next_table = sequence[idx + 1..]
            .iter()
            .find(|el| el.value().name() == "table");
        if let Some(table) = next_table {
            if has_body(table) {
                return Ok(Some(*table));
            } else {
                tracing::debug!(heading = %heading, "skipping table without tbody");
            }
        }
    }
    Ok(None)
}

/// Names from the server table whose guild cell contains `guild_name`,
/// ignoring case.
pub fn parse_online_members(
    html: &str,
    server_label: &str,
    guild_name: &str,
) -> Result<NameSet, TrackerError> {
    let document = Html::parse_document(html);
    let table = find_server_table(&document, html, server_label)?.ok_or_else(|| {
        TrackerError::Parse(format!("no member table found under a `{server_label}` heading"))
    })?;

    let guild_filter = guild_name.to_lowercase();
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;
    let mut names = NameSet::new();
    let Some(body) = table.select(&selector("tbody")?).next() else {
        return Ok(names);
    };
    for row in body.select(&row_sel) {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
        if cells.len() < 2 {
            continue;
        }
        let name = cell_text(cells[0]);
        let guild = cell_text(cells[1]);
        if name.is_empty() || guild.is_empty() {
            continue;
        }
        if guild.to_lowercase().contains(&guild_filter) {
            names.insert(&name);
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE: &str = r#"
<html><body>
  <h4>Shadowrealm - Players online</h4>
  <table><tbody>
    <tr><td>Elsewhere</td><td>beQuiet</td></tr>
  </tbody></table>
  <h4>Netherworld - Players online</h4>
  <table>
    <thead><tr><th>Name</th><th>Guild</th></tr></thead>
    <tbody>
      <tr><td> Alice </td><td>[beQuiet]</td></tr>
      <tr><td>Bob</td><td><span>BEQUIET</span> Reserve</td></tr>
      <tr><td>Mallory</td><td>Loud Crew</td></tr>
      <tr><td>Nobody</td><td></td></tr>
      <tr><td>Lonely cell</td></tr>
      <tr><td></td><td>beQuiet</td></tr>
    </tbody>
  </table>
</body></html>
"#;

    #[test]
    fn picks_table_under_matching_heading() {
        let names = parse_online_members(PAGE, "netherworld", "beQuiet").expect("parse");
        assert_eq!(names.to_vec(), vec!["Alice", "Bob"]);
    }

    #[test]
    fn guild_filter_is_a_case_insensitive_substring() {
        let names = parse_online_members(PAGE, "Netherworld", "crew").expect("parse");
        assert_eq!(names.to_vec(), vec!["Mallory"]);
    }

    #[test]
    fn missing_heading_is_a_parse_error() {
        let err = parse_online_members(PAGE, "Paradise", "beQuiet").expect_err("no table");
        assert!(matches!(err, TrackerError::Parse(_)));
    }

    #[test]
    fn heading_without_table_is_a_parse_error() {
        let html = "<html><body><h3>Netherworld</h3><p>maintenance</p></body></html>";
        let err = parse_online_members(html, "Netherworld", "beQuiet").expect_err("no table");
        assert!(matches!(err, TrackerError::Parse(_)));
    }

    #[test]
    fn table_without_tbody_is_skipped_for_the_next_heading() {
        let html = r#"<html><body>
  <h4>Netherworld</h4>
  <table><tr><td>Alice</td><td>beQuiet</td></tr></table>
  <h4>Netherworld - Players online</h4>
  <table><TBODY><tr><td>Bob</td><td>beQuiet</td></tr></TBODY></table>
</body></html>"#;
        let names = parse_online_members(html, "Netherworld", "beQuiet").expect("parse");
        assert_eq!(names.to_vec(), vec!["Bob"]);

        let bare = "<h4>Netherworld</h4><table><tr><td>Alice</td><td>beQuiet</td></tr></table>";
        let err = parse_online_members(bare, "Netherworld", "beQuiet").expect_err("no tbody");
        assert!(matches!(err, TrackerError::Parse(_)));
    }

    #[test]
    fn tbody_flags_follow_table_tags() {
        let html = "<table><tbody></tbody></table><p>table</p><table ><tr></tr></table><tablex>";
        assert_eq!(explicit_tbody_flags(html), vec![true, false]);
    }

    #[test]
    fn file_source_reads_fixture() {
        let tmp = tempdir().expect("tempdir");
        let page = tmp.path().join("page.html");
        fs::write(&page, PAGE).expect("write page");

        let scraper = SiteScraper {
            source: PageSource::File(page),
            server_label: "Netherworld".into(),
            guild_name: "beQuiet".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(scraper.online_members().expect("scrape").len(), 2);
    }

    #[test]
    fn missing_file_is_a_fetch_error() {
        let scraper = SiteScraper {
            source: PageSource::File(PathBuf::from("/definitely/not/here.html")),
            server_label: "Netherworld".into(),
            guild_name: "beQuiet".into(),
            timeout: Duration::from_secs(1),
        };
        assert!(matches!(
            scraper.online_members(),
            Err(TrackerError::Fetch(_))
        ));
    }
}
