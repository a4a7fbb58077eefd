//! # lobster
//!
//! `lobster` is the library behind the Lobster command-line assistant for
//! bioinformatics analysis. It keeps a workspace of expression data, plots
//! and exports, talks to an LLM provider (Anthropic directly, AWS Bedrock, or
//! the Lobster cloud with local fallback) and gives the model a view of the
//! currently loaded dataset.
//!
//! ## Key Features
//!
//! * **Data management**: [`DataManager`] loads CSV/TSV, Arrow IPC and 10X
//!   MTX matrices into a Polars [`DataFrame`](polars::prelude::DataFrame) and
//!   an AnnData-like [`ExpressionMatrix`], keeps a bounded plot history and a
//!   tool usage log, and exports everything as a zip package.
//! * **Agent configuration**: per-agent model presets and profiles
//!   ([`AgentConfigurator`]) with JSON files and environment overrides.
//! * **LLM backends**: the [`ChatBackend`] trait with Anthropic, Bedrock
//!   (SigV4 signed) and cloud implementations.
//! * **Public data**: PubMed literature search and GEO series lookup and
//!   supplementary file download.
//!
//! ## Structure
//!
//! * [`config`]: environment settings and agent/model configuration.
//! * [`data`]: expression matrices, file formats, plots, processing history
//!   and the [`DataManager`].
//! * [`workspace`]: file management inside a workspace root.
//! * [`llm`]: chat backends and provider selection.
//! * [`tools`]: NCBI E-utilities clients.
//! * [`client`]: the [`AgentClient`] conversation driver.
//! * [`utils`]: small shared helpers.
//!
//! ## Usage
//!
//! ```no_run
//! use lobster::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut manager = DataManager::new(None)?;
//!     manager.load_file("counts.csv")?;
//!     println!("{}", serde_json::to_string_pretty(&manager.data_summary())?);
//!     Ok(())
//! }
//! ```
//!
//! Number of threads used by Polars can be configured with the
//! `LOBSTER_NUM_THREADS` environment variable, also read from `.env` by
//! [`config::Settings::from_env`].

#[ctor::ctor]
fn init() {
    utils::forward_thread_count();
}

pub mod client;
pub mod config;
pub mod data;
pub mod llm;
pub mod prelude;
pub mod tools;
pub mod utils;
pub mod workspace;

#[allow(unused_imports)]
use prelude::*;
