//! Helpers shared by several modules of the crate.
//!
//! - The rayon thread pool used for column conversion.
//! - Getter generation for plain structs.
//! - Timestamp formatting used in file names and logs.
//! - File name sanitizing and transparent gzip reading.

use std::fs::File;
use std::io::{
    BufRead,
    BufReader,
};
use std::path::Path;

use anyhow::Context;
use chrono::Local;
use flate2::read::MultiGzDecoder;
use once_cell::sync::Lazy;
use rayon::{
    ThreadPool,
    ThreadPoolBuilder,
};

pub static THREAD_POOL: Lazy<ThreadPool> = Lazy::new(|| {
    let num_threads: Option<usize> = std::env::var("LOBSTER_NUM_THREADS")
        .ok()
        .and_then(|str| str.parse::<usize>().ok());
    ThreadPoolBuilder::new()
        .num_threads(num_threads.unwrap_or(0))
        .build()
        .expect("Failed to create thread pool")
});

/// Copies `LOBSTER_NUM_THREADS` into `POLARS_MAX_THREADS`. Polars reads
/// the latter once, when its pool starts.
pub fn forward_thread_count() {
    match std::env::var("LOBSTER_NUM_THREADS") {
        Ok(n) if !n.trim().is_empty() => std::env::set_var("POLARS_MAX_THREADS", n.trim()),
        _ => {},
    }
}

pub fn n_threads() -> usize {
    THREAD_POOL.current_num_threads()
}

#[macro_export]
macro_rules! getter_fn {
    ($field_name: ident, $field_type: ty) => {
        pub fn $field_name(&self) -> &$field_type {
            &self.$field_name
        }
    };
}
pub use getter_fn;

/// Timestamp used in generated file names, e.g. `20250102_153000`.
pub fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Timestamp used in the tool usage log, e.g. `2025-01-02 15:30:00`.
pub fn log_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn iso_now() -> String {
    Local::now().to_rfc3339()
}

/// Keeps alphanumerics, spaces, `_` and `-`, trims the end and turns spaces
/// into underscores.
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .trim_end()
        .replace(' ', "_")
}

pub fn format_megabytes(bytes: usize, precision: usize) -> String {
    format!("{:.*} MB", precision, bytes as f64 / (1024.0 * 1024.0))
}

/// Opens a text file, decompressing it on the fly when it ends with `.gz`.
pub fn open_text<P: AsRef<Path>>(path: P) -> anyhow::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let is_gz = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    }
    else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("UMAP of clusters"), "UMAP_of_clusters");
        assert_eq!(sanitize_filename("QC: counts/cell  "), "QC_countscell");
        assert_eq!(sanitize_filename("%%%"), "");
    }

    #[test]
    fn test_format_megabytes() {
        assert_eq!(format_megabytes(1024 * 1024, 1), "1.0 MB");
        assert_eq!(format_megabytes(3 * 1024 * 1024 / 2, 2), "1.50 MB");
    }

    #[test]
    fn test_timestamps_shape() {
        assert_eq!(file_timestamp().len(), 15);
        assert_eq!(log_timestamp().len(), 19);
    }
}
