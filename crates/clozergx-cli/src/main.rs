//! The `clozergx` command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "clozergx", version, about = "Embedded-answer (cloze) question toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a question text and list its sub-questions
    Parse {
        /// Question text file
        #[arg(long)]
        file: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check a question text for authoring problems
    Validate {
        /// Question text file
        #[arg(long)]
        file: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Insert or remove automatic short-answer gaps
    Gaps {
        #[command(subcommand)]
        action: GapsAction,
    },

    /// Grade a response, or compute the final grade of a response history
    Grade {
        /// Question text file
        #[arg(long)]
        file: PathBuf,

        /// JSON object of response fields (e.g. {"sub1_answer": "cat"})
        #[arg(long, conflicts_with = "history", required_unless_present = "history")]
        response: Option<PathBuf>,

        /// JSON array of responses, one per try
        #[arg(long)]
        history: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example question
    Init,
}

#[derive(Subcommand)]
enum GapsAction {
    /// Turn every Nth word into a short-answer gap
    Add {
        /// Text file; paragraphs are separated by blank lines
        #[arg(long)]
        file: PathBuf,

        /// Gap every Nth word (default from config)
        #[arg(long)]
        interval: Option<usize>,

        /// Leave capitalised words alone
        #[arg(long)]
        skip_capitalized: bool,

        /// Write here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Replace inserted gaps with their words
    Remove {
        /// Text file; paragraphs are separated by blank lines
        #[arg(long)]
        file: PathBuf,

        /// Write here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clozergx=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse {
            file,
            format,
            config,
        } => commands::parse::execute(file, format, config),
        Commands::Validate { file, config } => commands::validate::execute(file, config),
        Commands::Gaps { action } => match action {
            GapsAction::Add {
                file,
                interval,
                skip_capitalized,
                output,
                config,
            } => commands::gaps::add(file, interval, skip_capitalized, output, config),
            GapsAction::Remove { file, output } => commands::gaps::remove(file, output),
        },
        Commands::Grade {
            file,
            response,
            history,
            config,
        } => commands::grade::execute(file, response, history, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
