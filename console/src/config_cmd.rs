use std::path::PathBuf;

use clap::{
    Args,
    Subcommand,
};
use console::style;
use lobster::config::DEFAULT_PROFILE;
use lobster::prelude::*;

use crate::strings::{
    chat,
    config as strings,
};
use crate::utils::UtilsArgs;

#[derive(Args, Debug, Clone)]
pub(crate) struct ConfigArgs {
    #[arg(short, long, help = chat::PROFILE)]
    profile: Option<String>,

    #[arg(long, help = chat::CONFIG_FILE)]
    config_file: Option<PathBuf>,
}

impl ConfigArgs {
    fn configurator(&self) -> anyhow::Result<(Settings, AgentConfigurator)> {
        let settings = Settings::from_env()?;
        let configurator = AgentConfigurator::new(
            self.profile.as_deref().or(settings.profile.as_deref()),
            self.config_file
                .as_deref()
                .or(settings.config_file.as_deref()),
        )?;
        Ok((settings, configurator))
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum ConfigMenu {
    /// Show the active agent configuration.
    Show {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  ConfigArgs,
        #[arg(short, long, help = "Show the resolved model parameters of one agent")]
        agent: Option<String>,
    },
    /// List the configuration profiles.
    Profiles {
        #[clap(flatten)]
        utils: UtilsArgs,
    },
    /// List the model presets.
    Models {
        #[clap(flatten)]
        utils: UtilsArgs,
    },
    /// Write the active configuration to a JSON file.
    Export {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  ConfigArgs,
        #[arg(required = true, help = strings::EXPORT)]
        file:  PathBuf,
    },
}

impl ConfigMenu {
    pub fn utils(&self) -> &UtilsArgs {
        match self {
            Self::Show { utils, .. }
            | Self::Profiles { utils }
            | Self::Models { utils }
            | Self::Export { utils, .. } => utils,
        }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match self {
            Self::Show { args, agent, .. } => {
                let (settings, configurator) = args.configurator()?;
                match agent {
                    Some(agent) => {
                        let params = configurator.llm_params(agent, &settings)?;
                        println!("{}", style(agent).bold());
                        println!("{:#?}", params);
                    },
                    None => print!("{}", configurator.render()?),
                }
            },
            Self::Profiles { .. } => {
                let configurator = AgentConfigurator::new(None, None)?;
                for profile in configurator.available_profiles() {
                    let marker = if profile == configurator.profile() { "*" } else { " " };
                    let default = if profile == DEFAULT_PROFILE { " (default)" } else { "" };
                    println!("{} {}{}", marker, style(profile).green(), default);
                }
            },
            Self::Models { .. } => {
                let configurator = AgentConfigurator::new(None, None)?;
                for (name, model) in configurator.available_models() {
                    println!(
                        "{:<28} {:<10} {:<14} {}",
                        style(name).green(),
                        model.tier.to_string(),
                        model.region,
                        model.model_id
                    );
                    if !model.description.is_empty() {
                        println!("{:<28} {}", "", style(&model.description).dim());
                    }
                }
            },
            Self::Export { args, file, .. } => {
                let (_, configurator) = args.configurator()?;
                configurator.export_config(file)?;
                println!("Configuration written to {}", style(file.display()).green());
            },
        }
        Ok(())
    }
}
