use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use glob::glob;
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use log::LevelFilter;

#[derive(Args, Debug, Clone)]
pub(crate) struct UtilsArgs {
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v debug, -vv trace)"
    )]
    pub verbose: u8,

    #[arg(
        short,
        long,
        conflicts_with = "verbose",
        help = "Only log errors"
    )]
    pub quiet: bool,
}

impl UtilsArgs {
    pub fn level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Installs the logger. `RUST_LOG` still overrides module levels.
    pub fn setup(&self) -> anyhow::Result<()> {
        let mut builder = pretty_env_logger::formatted_builder();
        builder.filter_level(self.level());
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        builder.try_init()?;
        Ok(())
    }
}

pub fn init_pbar(total: u64) -> anyhow::Result<ProgressBar> {
    let progress_bar = ProgressBar::new(total);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}, ETA: {eta}] \
                 [{bar:40.cyan/blue}] {bytes:>10.green}/{total_bytes:10} {msg}",
            )?
            .progress_chars("#>-"),
    );
    Ok(progress_bar)
}

pub fn init_spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

pub(crate) fn expand_wildcards(paths: &[String]) -> Vec<PathBuf> {
    let mut expanded_paths = Vec::new();

    for path in paths {
        if path.contains('*') || path.contains('?') {
            match glob(path) {
                Ok(matches) => {
                    expanded_paths.extend(matches.filter_map(Result::ok));
                },
                Err(e) => eprintln!("Error processing wildcard '{}': {}", path, e),
            }
        }
        else {
            expanded_paths.push(PathBuf::from(path));
        }
    }

    expanded_paths
}

/// `1536` → `1.5 KB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    }
    else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, "0 B")]
    #[case(1023, "1023 B")]
    #[case(1536, "1.5 KB")]
    #[case(5 * 1024 * 1024, "5.0 MB")]
    fn test_human_size(
        #[case] bytes: u64,
        #[case] expected: &str,
    ) {
        assert_eq!(human_size(bytes), expected);
    }

    #[test]
    fn test_expand_plain_paths() {
        let paths = vec!["a.csv".to_string(), "dir/b.tsv".to_string()];
        assert_eq!(
            expand_wildcards(&paths),
            vec![PathBuf::from("a.csv"), PathBuf::from("dir/b.tsv")]
        );
    }
}
