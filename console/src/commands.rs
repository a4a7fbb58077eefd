use anyhow::bail;

/// In-session command typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SlashCommand {
    Help,
    Files,
    Read(String),
    Data,
    Plots,
    Workspace,
    WorkspaceList,
    WorkspaceLoad(String),
    Status,
    Export,
    Reset,
    Exit,
}

impl SlashCommand {
    /// Parses a line starting with `/`. Arguments keep their inner spaces.
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let line = line.trim();
        let Some(body) = line.strip_prefix('/')
        else {
            bail!("Commands start with '/'");
        };
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "help" => Self::Help,
            "files" => Self::Files,
            "read" => {
                if rest.is_empty() {
                    bail!("Usage: /read <file>");
                }
                Self::Read(rest.to_string())
            },
            "data" => Self::Data,
            "plots" => Self::Plots,
            "workspace" => {
                let (sub, arg) = match rest.split_once(char::is_whitespace) {
                    Some((sub, arg)) => (sub, arg.trim()),
                    None => (rest, ""),
                };
                match sub {
                    "" => Self::Workspace,
                    "list" => Self::WorkspaceList,
                    "load" if arg.is_empty() => bail!("Usage: /workspace load <name>"),
                    "load" => Self::WorkspaceLoad(arg.to_string()),
                    other => bail!("Unknown workspace command: {}", other),
                }
            },
            "status" => Self::Status,
            "export" => Self::Export,
            "reset" => Self::Reset,
            "exit" | "quit" => Self::Exit,
            other => bail!("Unknown command: /{}. Type /help for a list.", other),
        };
        Ok(command)
    }
}
