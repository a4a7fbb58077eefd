//! Clients for public NCBI resources: PubMed literature search and GEO
//! series lookup/download, both through the E-utilities API.

pub mod geo;
pub mod pubmed;
#[cfg(test)]
mod tests;

use anyhow::bail;
use serde_json::Value;

pub use geo::{
    GeoClient,
    GeoSeries,
};
pub use pubmed::{
    Article,
    PubMedClient,
};

pub const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Ids from an `esearch` JSON reply.
pub fn parse_esearch(body: &Value) -> anyhow::Result<Vec<String>> {
    if let Some(error) = body.pointer("/esearchresult/ERROR").and_then(Value::as_str) {
        bail!("E-utilities search failed: {}", error);
    }
    let Some(ids) = body.pointer("/esearchresult/idlist").and_then(Value::as_array)
    else {
        bail!("Malformed esearch reply");
    };
    Ok(ids
        .iter()
        .filter_map(|id| id.as_str().map(str::to_string))
        .collect())
}

/// Document summaries of an `esummary` JSON reply, in the order of the
/// `uids` list.
pub fn esummary_records(body: &Value) -> anyhow::Result<Vec<&Value>> {
    let Some(result) = body.get("result")
    else {
        bail!("Malformed esummary reply");
    };
    let uids = result
        .get("uids")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    Ok(uids
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|uid| result.get(uid))
        .collect())
}

pub(crate) fn eutils_get(
    client: &reqwest::blocking::Client,
    utility: &str,
    params: &[(&str, String)],
    api_key: Option<&str>,
) -> anyhow::Result<Value> {
    let mut query = params.to_vec();
    query.push(("retmode", "json".to_string()));
    if let Some(key) = api_key {
        query.push(("api_key", key.to_string()));
    }
    let response = client
        .get(format!("{EUTILS_BASE}/{utility}.fcgi"))
        .query(&query)
        .send()?;
    if !response.status().is_success() {
        bail!("NCBI {} returned HTTP {}", utility, response.status());
    }
    Ok(response.json()?)
}
