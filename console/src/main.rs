mod chat;
mod commands;
mod config_cmd;
mod files;
mod ncbi;
mod strings;
mod utils;

use chat::ChatArgs;
use clap::{
    Parser,
    Subcommand,
};
use config_cmd::ConfigMenu;
use files::FilesMenu;
use ncbi::{
    GeoArgs,
    PubmedArgs,
};
use utils::UtilsArgs;
use wild::ArgsOs;

#[derive(Parser, Debug)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,)]
struct Cli {
    #[command(subcommand)]
    command: MainMenu,
}

#[derive(Subcommand, Debug)]
enum MainMenu {
    /// Start an interactive analysis session.
    Chat {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  ChatArgs,
    },

    /// Inspect and export the agent configuration.
    #[command(subcommand, name = "config")]
    Config(ConfigMenu),

    /// Manage workspace files.
    #[command(subcommand, name = "files")]
    Files(FilesMenu),

    /// Search PubMed.
    Pubmed {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  PubmedArgs,
    },

    /// Look up a GEO series and download its supplementary files.
    Geo {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  GeoArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let args: ArgsOs = wild::args_os();
    let cli = Cli::parse_from(args);

    match cli.command {
        MainMenu::Chat { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
        MainMenu::Config(menu) => {
            menu.utils().setup()?;
            menu.run()?;
        },
        MainMenu::Files(menu) => {
            menu.utils().setup()?;
            menu.run()?;
        },
        MainMenu::Pubmed { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
        MainMenu::Geo { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_chat_flags() {
        let cli = Cli::parse_from([
            "lobster",
            "chat",
            "--workspace",
            "ws",
            "--no-reasoning",
            "--local",
            "-vv",
        ]);
        let MainMenu::Chat { utils, .. } = cli.command
        else {
            panic!("expected chat");
        };
        assert_eq!(utils.verbose, 2);
    }

    #[test]
    fn test_parse_files_list_dir() {
        let cli = Cli::parse_from(["lobster", "files", "list", "--dir", "plots"]);
        assert!(matches!(
            cli.command,
            MainMenu::Files(FilesMenu::List { dir: Some(lobster::data::Category::Plots), .. })
        ));
        assert!(Cli::try_parse_from(["lobster", "files", "list", "--dir", "tmp"]).is_err());
    }
}
