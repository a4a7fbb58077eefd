use itertools::Itertools;
use log::info;
use serde::Serialize;
use serde_json::Value;

use super::{
    esummary_records,
    eutils_get,
    parse_esearch,
};
use crate::llm::http_client;

pub const DEFAULT_MAX_RESULTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub pmid:    String,
    pub title:   String,
    pub journal: String,
    pub pubdate: String,
    pub authors: Vec<String>,
    pub doi:     Option<String>,
}

impl Article {
    pub fn url(&self) -> String {
        format!("https://pubmed.ncbi.nlm.nih.gov/{}/", self.pmid)
    }

    /// `First Author et al.` style author line.
    pub fn short_authors(&self) -> String {
        match self.authors.len() {
            0 => "Unknown authors".to_string(),
            1 | 2 => self.authors.join(", "),
            _ => format!("{} et al.", self.authors[0]),
        }
    }
}

/// Articles of a PubMed `esummary` reply.
pub fn parse_articles(body: &Value) -> anyhow::Result<Vec<Article>> {
    let text = |record: &Value, key: &str| {
        record
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Ok(esummary_records(body)?
        .into_iter()
        .map(|record| {
            let authors = record
                .get("authors")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(|a| a.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect_vec()
                })
                .unwrap_or_default();
            let doi = record
                .get("articleids")
                .and_then(Value::as_array)
                .and_then(|ids| {
                    ids.iter().find(|id| {
                        id.get("idtype").and_then(Value::as_str) == Some("doi")
                    })
                })
                .and_then(|id| id.get("value").and_then(Value::as_str))
                .map(str::to_string);

            Article {
                pmid: text(record, "uid"),
                title: text(record, "title"),
                journal: text(record, "fulljournalname"),
                pubdate: text(record, "pubdate"),
                authors,
                doi,
            }
        })
        .collect())
}

pub struct PubMedClient {
    api_key: Option<String>,
    client:  reqwest::blocking::Client,
}

impl PubMedClient {
    pub fn new(api_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            client: http_client()?,
        })
    }

    pub fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> anyhow::Result<Vec<Article>> {
        let ids = parse_esearch(&eutils_get(
            &self.client,
            "esearch",
            &[
                ("db", "pubmed".to_string()),
                ("term", query.to_string()),
                ("retmax", max_results.to_string()),
            ],
            self.api_key.as_deref(),
        )?)?;
        info!("PubMed search '{}' returned {} ids", query, ids.len());
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let summary = eutils_get(
            &self.client,
            "esummary",
            &[("db", "pubmed".to_string()), ("id", ids.join(","))],
            self.api_key.as_deref(),
        )?;
        parse_articles(&summary)
    }
}
