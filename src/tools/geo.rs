use std::fs::{
    self,
    File,
};
use std::io::{
    BufWriter,
    Read,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    anyhow,
    bail,
    ensure,
    Context,
};
use itertools::Itertools;
use log::{
    info,
    warn,
};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use serde_json::Value;

use super::{
    esummary_records,
    eutils_get,
    parse_esearch,
};
use crate::llm::http_client;

pub const GEO_FTP_BASE: &str = "https://ftp.ncbi.nlm.nih.gov/geo/series";

static ACCESSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^GSE\d+$").expect("valid accession regex"));

// Directory entries only: sort links carry `?`, parent links a `/`.
static HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="([^"/?]+)""#).expect("valid href regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoSeries {
    pub accession:           String,
    pub title:               String,
    pub summary:             String,
    pub organism:            String,
    pub platform:            String,
    pub n_samples:           u64,
    pub series_type:         String,
    /// File kinds announced by the summary (`TAR`, `MTX`, ...), not names.
    pub supplementary_types: Vec<String>,
}

/// Normalizes and validates a series accession (`gse123` becomes
/// `GSE123`).
pub fn validate_accession(accession: &str) -> anyhow::Result<String> {
    let normalized = accession.trim().to_uppercase();
    ensure!(
        ACCESSION_RE.is_match(&normalized),
        "Invalid GEO series accession '{}', expected GSE followed by digits",
        accession
    );
    Ok(normalized)
}

/// `GSE123456` lives under `GSE123nnn`; series with at most three digits
/// under `GSEnnn`.
pub fn series_stub(accession: &str) -> String {
    let digits = &accession[3..];
    let keep = digits.len().saturating_sub(3);
    format!("GSE{}nnn", &digits[..keep])
}

pub fn supplementary_url(
    accession: &str,
    file: &str,
) -> String {
    format!(
        "{GEO_FTP_BASE}/{}/{accession}/suppl/{file}",
        series_stub(accession)
    )
}

/// Series matching `accession` in a `gds` esummary reply.
pub fn parse_series(
    accession: &str,
    body: &Value,
) -> anyhow::Result<GeoSeries> {
    let text = |record: &Value, key: &str| {
        record
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let records = esummary_records(body)?;
    let Some(record) = records
        .into_iter()
        .find(|r| r.get("accession").and_then(Value::as_str) == Some(accession))
    else {
        bail!("GEO series {} not found", accession);
    };

    let n_samples = record
        .get("n_samples")
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0);
    let supplementary_types = record
        .get("suppfile")
        .and_then(Value::as_str)
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(GeoSeries {
        accession: accession.to_string(),
        title: text(record, "title"),
        summary: text(record, "summary"),
        organism: text(record, "taxon"),
        platform: format!("GPL{}", text(record, "gpl")),
        n_samples,
        series_type: text(record, "gdstype"),
        supplementary_types,
    })
}

/// File names linked from a `suppl/` directory index page.
pub fn parse_suppl_listing(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unique()
        .collect()
}

/// Streams `url` into `dest`. Bytes go to `<dest>.part` first, which is
/// renamed once the body is complete and removed on any failure, so a
/// partial download never replaces `dest`.
pub(crate) fn download_to<F>(
    client: &reqwest::blocking::Client,
    url: &str,
    dest: &Path,
    mut progress: F,
) -> anyhow::Result<u64>
where
    F: FnMut(u64, Option<u64>), {
    let name = dest
        .file_name()
        .ok_or_else(|| anyhow!("Invalid download target {}", dest.display()))?;
    let part = dest.with_file_name(format!("{}.part", name.to_string_lossy()));

    match stream_into(client, url, &part, &mut progress) {
        Ok(written) => {
            fs::rename(&part, dest)
                .with_context(|| format!("moving {} into place", part.display()))?;
            Ok(written)
        },
        Err(e) => {
            if part.exists() {
                if let Err(rm) = fs::remove_file(&part) {
                    warn!("Could not remove {}: {}", part.display(), rm);
                }
            }
            Err(e)
        },
    }
}

fn stream_into<F>(
    client: &reqwest::blocking::Client,
    url: &str,
    part: &Path,
    progress: &mut F,
) -> anyhow::Result<u64>
where
    F: FnMut(u64, Option<u64>), {
    let mut response = client
        .get(url)
        .timeout(std::time::Duration::from_secs(3600))
        .send()?;
    if !response.status().is_success() {
        bail!("Download of {} failed: HTTP {}", url, response.status());
    }
    let total = response.content_length();

    let mut writer = BufWriter::new(
        File::create(part).with_context(|| format!("creating {}", part.display()))?,
    );
    let mut buffer = vec![0u8; 64 * 1024];
    let mut written = 0u64;
    loop {
        let n = response
            .read(&mut buffer)
            .with_context(|| format!("reading {}", url))?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n])?;
        written += n as u64;
        progress(written, total);
    }
    writer.flush()?;

    if let Some(total) = total {
        ensure!(
            written == total,
            "Download of {} ended after {} of {} bytes",
            url,
            written,
            total
        );
    }
    Ok(written)
}

pub struct GeoClient {
    api_key: Option<String>,
    client:  reqwest::blocking::Client,
}

impl GeoClient {
    pub fn new(api_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            client: http_client()?,
        })
    }

    pub fn series(
        &self,
        accession: &str,
    ) -> anyhow::Result<GeoSeries> {
        let accession = validate_accession(accession)?;
        let ids = parse_esearch(&eutils_get(
            &self.client,
            "esearch",
            &[
                ("db", "gds".to_string()),
                ("term", format!("{accession}[ACCN] AND gse[ETYP]")),
            ],
            self.api_key.as_deref(),
        )?)?;
        if ids.is_empty() {
            bail!("GEO series {} not found", accession);
        }
        let summary = eutils_get(
            &self.client,
            "esummary",
            &[("db", "gds".to_string()), ("id", ids.join(","))],
            self.api_key.as_deref(),
        )?;
        parse_series(&accession, &summary)
    }

    /// Names of the files in the series `suppl/` directory. A series
    /// without supplementary files has no such directory and yields an
    /// empty list.
    pub fn supplementary_files(
        &self,
        accession: &str,
    ) -> anyhow::Result<Vec<String>> {
        let accession = validate_accession(accession)?;
        let url = supplementary_url(&accession, "");
        let response = self.client.get(&url).send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            bail!("Listing {} failed: HTTP {}", url, response.status());
        }
        Ok(parse_suppl_listing(&response.text()?))
    }

    /// Downloads a supplementary file into `dest_dir`. `progress` receives
    /// the bytes written so far and the total size when known.
    pub fn download_supplementary<F>(
        &self,
        accession: &str,
        file: &str,
        dest_dir: &Path,
        progress: F,
    ) -> anyhow::Result<PathBuf>
    where
        F: FnMut(u64, Option<u64>), {
        let accession = validate_accession(accession)?;
        ensure!(
            !file.is_empty() && !file.contains('/') && !file.contains(".."),
            "Invalid supplementary file name '{}'",
            file
        );
        let url = supplementary_url(&accession, file);
        info!("Downloading {}", url);

        fs::create_dir_all(dest_dir)?;
        let dest = dest_dir.join(file);
        let written = download_to(&self.client, &url, &dest, progress)?;
        info!("Saved {} ({} bytes)", dest.display(), written);
        Ok(dest)
    }
}
