use std::path::PathBuf;
use std::str::FromStr;

use anyhow::anyhow;
use clap::{
    Args,
    Subcommand,
};
use console::style;
use dialoguer::Confirm;
use lobster::prelude::*;
use lobster::workspace;

use crate::strings::{
    chat,
    files as strings,
};
use crate::utils::{
    expand_wildcards,
    human_size,
    init_spinner,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct WorkspaceArgs {
    #[arg(short, long, help = chat::WORKSPACE)]
    workspace: Option<PathBuf>,
}

impl WorkspaceArgs {
    fn data_manager(&self) -> anyhow::Result<DataManager> {
        let settings = Settings::from_env()?;
        DataManager::new(
            self.workspace
                .clone()
                .or_else(|| settings.workspace.clone()),
        )
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum FilesMenu {
    /// List workspace files.
    List {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  WorkspaceArgs,
        #[arg(short, long, value_parser = Category::from_str, help = strings::DIR)]
        dir:   Option<Category>,
    },
    /// Copy files into the workspace.
    Upload {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  WorkspaceArgs,
        #[arg(required = true, num_args = 1.., help = strings::UPLOAD)]
        paths: Vec<String>,
    },
    /// Delete a file or directory of the workspace.
    Delete {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  WorkspaceArgs,
        #[arg(required = true, help = strings::DELETE)]
        path:  PathBuf,
        #[arg(short, long, default_value_t = false, help = strings::FORCE)]
        force: bool,
    },
    /// Show details of a workspace file.
    Info {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  WorkspaceArgs,
        #[arg(required = true, help = strings::INFO)]
        path:  PathBuf,
    },
}

impl FilesMenu {
    pub fn utils(&self) -> &UtilsArgs {
        match self {
            Self::List { utils, .. }
            | Self::Upload { utils, .. }
            | Self::Delete { utils, .. }
            | Self::Info { utils, .. } => utils,
        }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match self {
            Self::List { args, dir, .. } => {
                let dm = args.data_manager()?;
                let entries = workspace::list(&dm, *dir)?;
                if entries.is_empty() {
                    println!("{}", style("No files").yellow());
                }
                for entry in entries {
                    println!(
                        "{:<8} {:<40} {:>10}  {}",
                        entry.category.dir_name(),
                        entry.name,
                        human_size(entry.size),
                        entry.modified.format("%Y-%m-%d %H:%M")
                    );
                }
            },
            Self::Upload { args, paths, .. } => {
                let mut dm = args.data_manager()?;
                let mut failed = 0;
                for path in expand_wildcards(paths) {
                    let spinner = init_spinner(&format!("Uploading {}", path.display()))?;
                    let outcome = workspace::upload(&mut dm, &path);
                    spinner.finish_and_clear();
                    match outcome {
                        Ok(outcome) => {
                            println!(
                                "{} {} ({}){}",
                                style("Uploaded").green(),
                                outcome.path.display(),
                                human_size(outcome.size),
                                if outcome.data_loaded { ", loaded" } else { "" }
                            );
                        },
                        Err(e) => {
                            failed += 1;
                            eprintln!("{} {}: {}", style("Failed").red(), path.display(), e);
                        },
                    }
                }
                if failed > 0 {
                    return Err(anyhow!("{} file(s) could not be uploaded", failed));
                }
            },
            Self::Delete {
                args, path, force, ..
            } => {
                let dm = args.data_manager()?;
                let target = workspace::resolve_within(dm.workspace_path(), path)?;
                if !force {
                    let confirmed = Confirm::new()
                        .with_prompt(format!("Delete {}?", target.display()))
                        .default(false)
                        .interact()
                        .unwrap_or(false);
                    if !confirmed {
                        println!("{}", style("Deletion aborted by the user.").red());
                        return Ok(());
                    }
                }
                let deleted = workspace::delete(dm.workspace_path(), path)?;
                println!("{} {}", style("Deleted").green(), deleted.display());
            },
            Self::Info { args, path, .. } => {
                let dm = args.data_manager()?;
                let info = workspace::info(dm.workspace_path(), path)?;
                println!("{}", serde_json::to_string_pretty(&info)?);
            },
        }
        Ok(())
    }
}
