use std::fs;
use std::io::{
    Read,
    Write,
};
use std::net::TcpListener;
use std::path::Path;
use std::thread;

use rstest::rstest;
use serde_json::json;

use super::geo::{
    download_to,
    parse_series,
    parse_suppl_listing,
    series_stub,
    supplementary_url,
    validate_accession,
};
use super::pubmed::parse_articles;
use super::*;

#[test]
fn test_parse_esearch() {
    let body = json!({
        "header": {"type": "esearch"},
        "esearchresult": {"count": "2", "idlist": ["38000001", "38000002"]}
    });
    assert_eq!(parse_esearch(&body).unwrap(), vec!["38000001", "38000002"]);

    let failed = json!({"esearchresult": {"ERROR": "Invalid query"}});
    assert!(parse_esearch(&failed).unwrap_err().to_string().contains("Invalid query"));
    assert!(parse_esearch(&json!({})).is_err());
}

#[test]
fn test_parse_articles() {
    let body = json!({
        "result": {
            "uids": ["2", "1"],
            "1": {
                "uid": "1",
                "title": "First",
                "fulljournalname": "Nature",
                "pubdate": "2024 Jan",
                "authors": [{"name": "Doe J"}, {"name": "Roe R"}, {"name": "Poe P"}],
                "articleids": [
                    {"idtype": "pubmed", "value": "1"},
                    {"idtype": "doi", "value": "10.1000/xyz"}
                ]
            },
            "2": {"uid": "2", "title": "Second", "authors": []}
        }
    });
    let articles = parse_articles(&body).unwrap();
    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].pmid, "2");
    assert_eq!(articles[0].short_authors(), "Unknown authors");
    assert!(articles[0].doi.is_none());
    assert_eq!(articles[1].doi.as_deref(), Some("10.1000/xyz"));
    assert_eq!(articles[1].short_authors(), "Doe J et al.");
    assert_eq!(articles[1].url(), "https://pubmed.ncbi.nlm.nih.gov/1/");
}

#[rstest]
#[case("GSE12345", Some("GSE12345"))]
#[case(" gse1 ", Some("GSE1"))]
#[case("GSM12345", None)]
#[case("GSE12a", None)]
#[case("GSE", None)]
fn test_validate_accession(
    #[case] input: &str,
    #[case] expected: Option<&str>,
) {
    assert_eq!(validate_accession(input).ok().as_deref(), expected);
}

#[rstest]
#[case("GSE1", "GSEnnn")]
#[case("GSE999", "GSEnnn")]
#[case("GSE1234", "GSE1nnn")]
#[case("GSE123456", "GSE123nnn")]
fn test_series_stub(
    #[case] accession: &str,
    #[case] expected: &str,
) {
    assert_eq!(series_stub(accession), expected);
}

#[test]
fn test_supplementary_url() {
    assert_eq!(
        supplementary_url("GSE123456", "GSE123456_RAW.tar"),
        "https://ftp.ncbi.nlm.nih.gov/geo/series/GSE123nnn/GSE123456/suppl/GSE123456_RAW.tar"
    );
}

#[test]
fn test_parse_series() {
    let body = json!({
        "result": {
            "uids": ["200123456"],
            "200123456": {
                "accession": "GSE123456",
                "title": "PBMC atlas",
                "summary": "Single-cell RNA-seq of PBMCs",
                "taxon": "Homo sapiens",
                "gpl": "24676",
                "n_samples": 8,
                "gdstype": "Expression profiling by high throughput sequencing",
                "suppfile": "TAR, MTX, TSV"
            }
        }
    });
    let series = parse_series("GSE123456", &body).unwrap();
    assert_eq!(series.organism, "Homo sapiens");
    assert_eq!(series.platform, "GPL24676");
    assert_eq!(series.n_samples, 8);
    assert_eq!(series.supplementary_types, vec!["TAR", "MTX", "TSV"]);

    assert!(parse_series("GSE1", &body).is_err());
}

#[test]
fn test_parse_suppl_listing() {
    let html = r#"<html><head><title>Index of /geo/series/GSE109nnn/GSE109564/suppl</title></head>
<body><h1>Index of /geo/series/GSE109nnn/GSE109564/suppl</h1>
<pre>Name                                   Last modified      Size  <hr><a href="?C=N;O=D">Name</a>
<a href="/geo/series/GSE109nnn/GSE109564/">Parent Directory</a>                                            -
<a href="GSE109564_Kidney.counts.txt.gz">GSE109564_Kidney.counts.txt.gz</a>   2018-06-01 10:00   12M
<a href="GSE109564_RAW.tar">GSE109564_RAW.tar</a>                2018-06-01 10:00  210M
<a href="filelist.txt">filelist.txt</a>                     2018-06-01 10:00  1.2K
</pre></body></html>"#;
    assert_eq!(
        parse_suppl_listing(html),
        vec![
            "GSE109564_Kidney.counts.txt.gz",
            "GSE109564_RAW.tar",
            "filelist.txt"
        ]
    );
    assert!(parse_suppl_listing("<html>404 Not Found</html>").is_empty());
}

/// Answers a single request on a local port with `response` and closes
/// the connection.
fn serve_once(response: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while !request.ends_with(b"\r\n\r\n") {
            if stream.read(&mut byte).unwrap_or(0) == 0 {
                break;
            }
            request.push(byte[0]);
        }
        let _ = stream.write_all(response);
    });
    format!("http://{addr}/suppl/GSE1_counts.txt.gz")
}

fn local_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
}

fn part_of(dest: &Path) -> std::path::PathBuf {
    dest.with_file_name("GSE1_counts.txt.gz.part")
}

#[test]
fn test_download_complete() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("GSE1_counts.txt.gz");
    let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello");

    let mut last = (0, None);
    let written = download_to(&local_client(), &url, &dest, |n, total| last = (n, total)).unwrap();
    assert_eq!(written, 5);
    assert_eq!(last, (5, Some(5)));
    assert_eq!(fs::read_to_string(&dest).unwrap(), "hello");
    assert!(!part_of(&dest).exists());
}

#[test]
fn test_download_truncated_keeps_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("GSE1_counts.txt.gz");
    fs::write(&dest, "previous").unwrap();
    let url = serve_once(
        b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nonly ten b",
    );

    assert!(download_to(&local_client(), &url, &dest, |_, _| {}).is_err());
    assert_eq!(fs::read_to_string(&dest).unwrap(), "previous");
    assert!(!part_of(&dest).exists());
}

#[test]
fn test_download_http_error_leaves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("GSE1_counts.txt.gz");
    let url = serve_once(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");

    let err = download_to(&local_client(), &url, &dest, |_, _| {}).unwrap_err();
    assert!(err.to_string().contains("404"));
    assert!(!dest.exists());
    assert!(!part_of(&dest).exists());
}
