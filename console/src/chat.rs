use std::path::PathBuf;

use clap::Args;
use console::style;
use dialoguer::Input;
use itertools::Itertools;
use lobster::prelude::*;
use log::debug;

use crate::commands::SlashCommand;
use crate::strings::chat as strings;
use crate::utils::{
    human_size,
    init_spinner,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct ChatArgs {
    #[arg(short, long, help = strings::WORKSPACE)]
    workspace: Option<PathBuf>,

    #[arg(short, long, help = strings::PROFILE)]
    profile: Option<String>,

    #[arg(long, help = strings::CONFIG_FILE)]
    config_file: Option<PathBuf>,

    #[arg(long, default_value_t = false, help = strings::NO_REASONING)]
    no_reasoning: bool,

    #[arg(long, default_value_t = false, help = strings::LOCAL)]
    local: bool,
}

impl ChatArgs {
    pub fn run(
        &self,
        _utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let settings = Settings::from_env()?;
        let configurator = AgentConfigurator::new(
            self.profile.as_deref().or(settings.profile.as_deref()),
            self.config_file
                .as_deref()
                .or(settings.config_file.as_deref()),
        )?;

        let spinner = init_spinner("Connecting to the model provider...")?;
        let backend = if self.local {
            local_backend(&settings)
        }
        else {
            connect(&settings, &configurator)
        };
        spinner.finish_and_clear();
        let backend = backend?;

        let workspace = self
            .workspace
            .clone()
            .or_else(|| settings.workspace.clone());
        let data_manager = DataManager::new(workspace)?;
        let mut client = AgentClient::new(
            data_manager,
            backend,
            &configurator,
            ClientOptions {
                enable_reasoning: !self.no_reasoning,
                ..Default::default()
            },
        )?;

        print_banner(&client, configurator.profile());

        loop {
            let line: String = match Input::new()
                .with_prompt(format!("{}", style("lobster").cyan().bold()))
                .allow_empty(true)
                .interact_text()
            {
                Ok(line) => line,
                Err(e) => {
                    debug!("Input closed: {}", e);
                    break;
                },
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('/') {
                match SlashCommand::parse(line) {
                    Ok(SlashCommand::Exit) => break,
                    Ok(command) => {
                        if let Err(e) = handle_command(&mut client, command) {
                            eprintln!("{}", style(format!("Error: {:#}", e)).red());
                        }
                    },
                    Err(e) => eprintln!("{}", style(e).yellow()),
                }
                continue;
            }

            let spinner = init_spinner("Thinking...")?;
            let result = client.query(line);
            spinner.finish_and_clear();
            print_result(&result);
        }

        println!("{}", style("Saving workspace state...").dim());
        for item in client.data_manager().auto_save_state() {
            println!("  {}", item);
        }
        println!("{}", style("Goodbye!").green().bold());
        Ok(())
    }
}

fn print_banner(
    client: &AgentClient,
    profile: &str,
) {
    println!("{}", style("Lobster").red().bold());
    println!(
        "Session {} | backend {} | profile {}",
        style(client.session_id()).green(),
        style(client.backend_name()).green(),
        style(profile).green(),
    );
    println!(
        "Workspace: {}",
        style(client.workspace_path().display()).blue()
    );
    println!("Type /help for commands, /exit to leave.\n");
}

fn print_result(result: &QueryResult) {
    if result.success {
        println!("\n{}\n", result.response);
    }
    else {
        eprintln!("\n{}\n", style(&result.response).red());
    }
    if !result.plots.is_empty() {
        println!(
            "{} {}",
            style("Plots:").bold(),
            result.plots.iter().map(|p| p.id.as_str()).join(", ")
        );
    }
    debug!("Answered in {:.2}s", result.duration);
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_command(
    client: &mut AgentClient,
    command: SlashCommand,
) -> anyhow::Result<()> {
    match command {
        SlashCommand::Help => println!("{}", strings::HELP),
        SlashCommand::Files => {
            for (category, files) in client.data_manager().list_workspace_files()? {
                println!("{}", style(format!("{}/", category.dir_name())).bold());
                if files.is_empty() {
                    println!("  {}", style("(empty)").dim());
                }
                for file in files {
                    println!(
                        "  {:<40} {:>10}  {}",
                        file.name,
                        human_size(file.size),
                        file.modified.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        },
        SlashCommand::Read(name) => {
            let content = client.read_file(&name)?;
            println!("{}", style(&name).bold());
            println!("{}", content);
        },
        SlashCommand::Data => {
            let summary = client.data_manager().data_summary();
            if summary.is_loaded() {
                print_json(&summary)?;
            }
            else {
                println!("{}", style(summary.status).yellow());
            }
        },
        SlashCommand::Plots => {
            let history = client.data_manager().plot_history();
            if history.is_empty() {
                println!("{}", style("No plots yet").yellow());
            }
            for plot in history {
                println!(
                    "  {:<10} {:<40} {}  {}",
                    style(&plot.id).green(),
                    plot.title,
                    plot.timestamp,
                    plot.source.as_deref().unwrap_or("")
                );
            }
        },
        SlashCommand::Workspace => {
            let status = client.data_manager().workspace_status()?;
            println!("Workspace: {}", style(status.workspace_path.display()).blue());
            println!("Data loaded: {}", status.data_loaded);
            println!("Plots in memory: {}", status.plot_count);
            println!("Tools used: {}", status.tool_usage_count);
            for (category, count) in &status.saved_files {
                println!("  {:<8} {} files", category.dir_name(), count);
            }
        },
        SlashCommand::WorkspaceList => {
            let datasets = client.data_manager().list_datasets()?;
            if datasets.is_empty() {
                println!("{}", style("No datasets in data/").yellow());
            }
            for dataset in datasets {
                println!("  {:<40} {:>10}", dataset.name, human_size(dataset.size));
            }
        },
        SlashCommand::WorkspaceLoad(name) => {
            let spinner = init_spinner(&format!("Loading {}...", name))?;
            let loaded = client.data_manager_mut().load_dataset(&name);
            spinner.finish_and_clear();
            let path = loaded?;
            let summary = client.data_manager().data_summary();
            println!(
                "Loaded {} {}",
                style(path.display()).green(),
                summary
                    .shape
                    .map(|(r, c)| format!("({} samples × {} features)", r, c))
                    .unwrap_or_default()
            );
        },
        SlashCommand::Status => print_json(&client.status())?,
        SlashCommand::Export => {
            let path = client.export_session(None)?;
            println!("Exported to {}", style(path.display()).green());
        },
        SlashCommand::Reset => {
            client.reset();
            println!("{}", style("Conversation cleared").green());
        },
        SlashCommand::Exit => {},
    }
    Ok(())
}
