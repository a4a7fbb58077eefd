use std::path::PathBuf;

use clap::Args;
use console::style;
use log::warn;
use lobster::prelude::*;
use lobster::tools::pubmed::DEFAULT_MAX_RESULTS;

use crate::strings::{
    chat,
    ncbi as strings,
};
use crate::utils::{
    init_pbar,
    init_spinner,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct PubmedArgs {
    #[arg(required = true, num_args = 1.., help = strings::QUERY)]
    query: Vec<String>,

    #[arg(short, long, default_value_t = DEFAULT_MAX_RESULTS, help = strings::MAX)]
    max: usize,
}

impl PubmedArgs {
    pub fn run(
        &self,
        _utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let settings = Settings::from_env()?;
        let client = PubMedClient::new(settings.ncbi_api_key.clone())?;
        let query = self.query.join(" ");

        let spinner = init_spinner(&format!("Searching PubMed for '{}'", query))?;
        let articles = client.search(&query, self.max);
        spinner.finish_and_clear();
        let articles = articles?;

        if articles.is_empty() {
            println!("{}", style("No articles found").yellow());
            return Ok(());
        }
        for (i, article) in articles.iter().enumerate() {
            println!("{}. {}", i + 1, style(&article.title).bold());
            println!(
                "   {} | {} | {}",
                article.short_authors(),
                article.journal,
                article.pubdate
            );
            match &article.doi {
                Some(doi) => println!("   PMID {} | doi:{}", article.pmid, doi),
                None => println!("   PMID {}", article.pmid),
            }
            println!("   {}", style(article.url()).blue());
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct GeoArgs {
    #[arg(required = true, help = strings::ACCESSION)]
    accession: String,

    #[arg(short, long, help = strings::DOWNLOAD)]
    download: Option<String>,

    #[arg(short, long, help = chat::WORKSPACE)]
    workspace: Option<PathBuf>,
}

impl GeoArgs {
    pub fn run(
        &self,
        _utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let settings = Settings::from_env()?;
        let client = GeoClient::new(settings.ncbi_api_key.clone())?;

        let spinner = init_spinner(&format!("Fetching {}", self.accession))?;
        let series = client.series(&self.accession);
        spinner.finish_and_clear();
        let series = series?;

        println!("{} {}", style(&series.accession).green().bold(), series.title);
        println!("Organism: {}", series.organism);
        println!("Platform: {}", series.platform);
        println!("Samples:  {}", series.n_samples);
        println!("Type:     {}", series.series_type);
        if !series.supplementary_types.is_empty() {
            println!("Supplementary types: {}", series.supplementary_types.join(", "));
        }
        println!("\n{}", series.summary);

        if self.download.is_none() {
            match client.supplementary_files(&series.accession) {
                Ok(files) if files.is_empty() => {
                    println!("\n{}", style("No supplementary files").yellow())
                },
                Ok(files) => {
                    println!("\n{}", style("Supplementary files (use --download NAME):").bold());
                    for file in files {
                        println!("  {}", file);
                    }
                },
                Err(e) => warn!("Could not list supplementary files: {}", e),
            }
        }

        if let Some(file) = &self.download {
            let dm = DataManager::new(
                self.workspace
                    .clone()
                    .or_else(|| settings.workspace.clone()),
            )?;
            let pbar = init_pbar(0)?;
            pbar.set_message(file.clone());
            let saved = client.download_supplementary(
                &series.accession,
                file,
                dm.data_dir(),
                |written, total| {
                    if let Some(total) = total {
                        pbar.set_length(total);
                    }
                    pbar.set_position(written);
                },
            );
            pbar.finish_and_clear();
            println!("Saved {}", style(saved?.display()).green());
        }
        Ok(())
    }
}
