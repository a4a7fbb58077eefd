macro_rules! define_strings {
    (
        $($name:ident = $value:literal);*$(;)?
    ) => {
        $(
            pub const $name: &str = $value;
        )*
    };
}

pub mod chat {
    define_strings! {
        WORKSPACE =
            "Workspace directory holding data/, plots/ and exports/. Defaults \
            to LOBSTER_WORKSPACE or ./.lobster_workspace.";
        PROFILE =
            "Agent configuration profile, see `lobster config profiles`. \
            Defaults to LOBSTER_PROFILE or production.";
        CONFIG_FILE =
            "JSON agent configuration file. Takes precedence over the profile \
            when it exists.";
        NO_REASONING =
            "Ask for direct answers without step by step reasoning.";
        LOCAL =
            "Skip the Lobster cloud and talk to the local provider directly.";
        HELP =
            "Commands:\n  \
            /help                   Show this help\n  \
            /files                  List workspace files\n  \
            /read <file>            Print a workspace file\n  \
            /data                   Summary of the loaded dataset\n  \
            /plots                  Plot history\n  \
            /workspace              Workspace status\n  \
            /workspace list         Datasets available in data/\n  \
            /workspace load <name>  Load a dataset from data/\n  \
            /status                 Session status\n  \
            /export                 Export the session\n  \
            /reset                  Clear the conversation\n  \
            /exit, /quit            Save state and leave\n\n\
            Anything else is sent to the assistant.";
    }
}

pub mod files {
    define_strings! {
        DIR =
            "Only list files of this workspace directory.";
        UPLOAD =
            "Files to copy into the workspace data/ directory. Wildcards are \
            expanded. Tabular files are loaded right away.";
        DELETE =
            "Path relative to the workspace root.";
        FORCE =
            "Automatically confirm deletion.";
        INFO =
            "Path relative to the workspace root.";
    }
}

pub mod config {
    define_strings! {
        EXPORT =
            "Destination of the exported JSON configuration.";
    }
}

pub mod ncbi {
    define_strings! {
        QUERY =
            "PubMed search terms.";
        MAX =
            "Maximum number of articles.";
        ACCESSION =
            "GEO series accession (GSE followed by digits).";
        DOWNLOAD =
            "Supplementary file to download into the workspace data/ directory. \
            Run without this option to list the file names.";
    }
}
