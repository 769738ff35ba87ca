//! Feed fetch stage: discover event documents linked from OSINT feed index
//! pages and snapshot them to disk with a download manifest.

use crate::config::FetchConfig;
use crate::errors::PipelineError;
use crate::reduce::clean_value;
use chrono::Utc;
use rayon::prelude::*;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One manifest row per download attempt, success or failure.
#[derive(Debug, Serialize)]
pub struct FetchRecord {
    pub url: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub fetched_at: String,
    /// Quick-index event metadata, flattened into the row.
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Last path segment of the URL; percent-encoding is kept as-is so the file
/// name round-trips with the manifest.
fn basename_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(String::from))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| String::from("download.json"))
}

/// `href` attribute values pointing at `.json` files. Feed indexes are plain
/// directory listings, so attribute scanning is enough; no DOM needed.
fn extract_json_hrefs(html: &str) -> Vec<String> {
    let lower = html.to_ascii_lowercase();
    let mut hrefs = Vec::new();
    for (idx, _) in lower.match_indices("href") {
        let tail = html[idx + 4..].trim_start();
        let Some(tail) = tail.strip_prefix('=') else {
            continue;
        };
        let tail = tail.trim_start();
        let Some(quote) = tail.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let body = &tail[1..];
        let Some(end) = body.find(quote) else {
            continue;
        };
        let href = &body[..end];
        if href.to_ascii_lowercase().ends_with(".json") {
            hrefs.push(href.to_string());
        }
    }
    hrefs
}

/// Absolute URLs of every event document the index pages link to,
/// deduplicated and sorted across all indexes.
pub fn list_feed_urls(
    client: &Client,
    index_urls: &[String],
) -> Result<Vec<String>, PipelineError> {
    let mut urls = BTreeSet::new();
    for index_url in index_urls {
        let base = Url::parse(index_url).map_err(|e| PipelineError::IndexUnavailable {
            url: index_url.clone(),
            reason: e.to_string(),
        })?;
        let body = client
            .get(base.clone())
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| PipelineError::IndexUnavailable {
                url: index_url.clone(),
                reason: e.to_string(),
            })?;
        for href in extract_json_hrefs(&body) {
            match base.join(&href) {
                Ok(resolved) => {
                    urls.insert(resolved.to_string());
                }
                Err(e) => warn!(index = %index_url, href = %href, error = %e, "unresolvable link"),
            }
        }
    }
    Ok(urls.into_iter().collect())
}

/// Metadata lifted from a parsed event for the manifest row: uuid, date,
/// info, publish_timestamp, and a threat_level_id validated to "1".."4".
/// Empty values are cleaned out rather than serialized as nulls.
fn minimal_metadata(raw: &Value) -> Map<String, Value> {
    let Some(event) = raw.get("Event").and_then(Value::as_object) else {
        return Map::new();
    };

    let mut meta = Map::new();
    for key in ["uuid", "date", "info", "publish_timestamp"] {
        if let Some(v) = event.get(key) {
            meta.insert(key.to_string(), v.clone());
        }
    }
    if let Some(level) = event
        .get("threat_level_id")
        .or_else(|| event.get("threat_level"))
    {
        let id = match level {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if matches!(id.as_str(), "1" | "2" | "3" | "4") {
            meta.insert("threat_level_id".to_string(), Value::String(id));
        }
    }

    match clean_value(&Value::Object(meta)) {
        Some(Value::Object(cleaned)) => cleaned,
        _ => Map::new(),
    }
}

fn try_download(
    client: &Client,
    url: &str,
    dest: &Path,
) -> Result<(u64, String, Map<String, Value>), String> {
    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?;
    let body = response.bytes().map_err(|e| e.to_string())?;
    fs::write(dest, &body).map_err(|e| e.to_string())?;

    let meta = serde_json::from_slice::<Value>(&body)
        .map(|raw| minimal_metadata(&raw))
        .unwrap_or_default();
    Ok((body.len() as u64, sha256_hex(&body), meta))
}

/// Download one document with retries; failures end up as an error row, never
/// a panic, so one broken link cannot sink a snapshot.
fn download_one(client: &Client, url: &str, output_dir: &Path, retries: u32) -> FetchRecord {
    let filename = basename_of(url);
    let dest = output_dir.join(&filename);
    let retries = retries.max(1);
    let mut last_error = String::from("no attempts made");

    for attempt in 1..=retries {
        match try_download(client, url, &dest) {
            Ok((size, sha256, meta)) => {
                debug!(url, size, "downloaded");
                return FetchRecord {
                    url: url.to_string(),
                    filename,
                    size: Some(size),
                    sha256: Some(sha256),
                    error: None,
                    fetched_at: Utc::now().to_rfc3339(),
                    meta,
                };
            }
            Err(reason) => {
                last_error = reason;
                if attempt < retries {
                    warn!(url, attempt, error = %last_error, "download failed, retrying");
                    thread::sleep(Duration::from_millis(1500 * u64::from(attempt)));
                }
            }
        }
    }

    warn!(url, error = %last_error, "download failed");
    FetchRecord {
        url: url.to_string(),
        filename,
        size: None,
        sha256: None,
        error: Some(last_error),
        fetched_at: Utc::now().to_rfc3339(),
        meta: Map::new(),
    }
}

fn write_fetch_manifest(path: &Path, records: &[FetchRecord]) -> Result<(), PipelineError> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        writeln!(writer, "{}", serde_json::to_string(record)?)?;
    }
    writer.flush()?;
    Ok(())
}

pub struct FeedFetcher {
    config: FetchConfig,
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| PipelineError::InvalidConfiguration(format!("http client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Snapshot every event document the configured indexes link to, then
    /// write `manifest.jsonl` next to the downloads. Rows come back in URL
    /// order regardless of which worker finished first.
    pub fn run(&self, output_dir: &Path) -> Result<Vec<FetchRecord>, PipelineError> {
        fs::create_dir_all(output_dir)?;
        let urls = list_feed_urls(&self.client, &self.config.index_urls)?;
        info!(
            indexes = self.config.index_urls.len(),
            files = urls.len(),
            "feed index scanned"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| PipelineError::InvalidConfiguration(format!("worker pool: {e}")))?;
        let records: Vec<FetchRecord> = pool.install(|| {
            urls.par_iter()
                .map(|url| download_one(&self.client, url, output_dir, self.config.retries))
                .collect()
        });

        write_fetch_manifest(&output_dir.join("manifest.jsonl"), &records)?;

        let failed = records.iter().filter(|r| r.error.is_some()).count();
        info!(downloaded = records.len() - failed, failed, "fetch complete");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_json_links_from_directory_listing() {
        let html = concat!(
            "<html><body><h1>Index of /feed-osint</h1><pre>",
            r#"<a href="../">../</a>"#,
            r#"<a href="0a1b2c.json">0a1b2c.json</a> 12-Mar-2024 10:11 4096"#,
            r#"<a href='9f8e7d.JSON'>9f8e7d.JSON</a>"#,
            r#"<a href="hashes.csv">hashes.csv</a>"#,
            r#"<a name="anchor">no href</a>"#,
            "</pre></body></html>",
        );
        let hrefs = extract_json_hrefs(html);
        assert_eq!(hrefs, ["0a1b2c.json", "9f8e7d.JSON"]);
    }

    #[test]
    fn relative_links_resolve_against_the_index() {
        let base = Url::parse("https://feeds.example.org/doc/feed-osint/").unwrap();
        let resolved = base.join("0a1b2c.json").unwrap();
        assert_eq!(
            resolved.as_str(),
            "https://feeds.example.org/doc/feed-osint/0a1b2c.json"
        );
    }

    #[test]
    fn basenames_come_from_the_url_path() {
        assert_eq!(
            basename_of("https://feeds.example.org/feed/0a1b2c.json?x=1"),
            "0a1b2c.json"
        );
        assert_eq!(basename_of("https://feeds.example.org/feed/"), "download.json");
    }

    #[test]
    fn minimal_metadata_keeps_index_fields_and_valid_levels() {
        let raw = json!({"Event": {
            "uuid": "5f0c-...-d1",
            "date": "2024-03-12",
            "info": "Campaign",
            "publish_timestamp": "1710238271",
            "threat_level_id": 4,
            "Attribute": [{"type": "ip-dst", "value": "203.0.113.7"}],
        }});
        let meta = minimal_metadata(&raw);
        assert_eq!(meta.get("uuid"), Some(&json!("5f0c-...-d1")));
        assert_eq!(meta.get("publish_timestamp"), Some(&json!("1710238271")));
        // Numeric 4 is stringified and, unlike label normalization, kept.
        assert_eq!(meta.get("threat_level_id"), Some(&json!("4")));
        assert!(meta.get("Attribute").is_none());
    }

    #[test]
    fn minimal_metadata_drops_invalid_levels_and_empty_fields() {
        let raw = json!({"Event": {
            "uuid": "",
            "info": null,
            "date": "2024-03-12",
            "threat_level_id": "9",
        }});
        let meta = minimal_metadata(&raw);
        assert_eq!(meta.get("date"), Some(&json!("2024-03-12")));
        assert!(meta.get("uuid").is_none());
        assert!(meta.get("info").is_none());
        assert!(meta.get("threat_level_id").is_none());

        assert!(minimal_metadata(&json!({"response": []})).is_empty());
    }

    #[test]
    fn metadata_falls_back_to_threat_level_key() {
        let raw = json!({"Event": {"threat_level": "2"}});
        let meta = minimal_metadata(&raw);
        assert_eq!(meta.get("threat_level_id"), Some(&json!("2")));
    }

    #[test]
    fn records_serialize_flat_with_optional_fields_omitted() {
        let mut meta = Map::new();
        meta.insert("uuid".to_string(), json!("5f0c"));
        let ok = FetchRecord {
            url: "https://feeds.example.org/feed/a.json".to_string(),
            filename: "a.json".to_string(),
            size: Some(4096),
            sha256: Some("deadbeef".to_string()),
            error: None,
            fetched_at: "2024-03-12T10:11:12+00:00".to_string(),
            meta,
        };
        let row: Value = serde_json::from_str(&serde_json::to_string(&ok).unwrap()).unwrap();
        assert_eq!(row.get("size"), Some(&json!(4096)));
        assert_eq!(row.get("uuid"), Some(&json!("5f0c")));
        assert!(row.get("error").is_none());
        assert!(row.get("meta").is_none());

        let failed = FetchRecord {
            url: "https://feeds.example.org/feed/b.json".to_string(),
            filename: "b.json".to_string(),
            size: None,
            sha256: None,
            error: Some("timeout".to_string()),
            fetched_at: "2024-03-12T10:11:12+00:00".to_string(),
            meta: Map::new(),
        };
        let row: Value = serde_json::from_str(&serde_json::to_string(&failed).unwrap()).unwrap();
        assert_eq!(row.get("error"), Some(&json!("timeout")));
        assert!(row.get("size").is_none());
        assert!(row.get("sha256").is_none());
    }
}
