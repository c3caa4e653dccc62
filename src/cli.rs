use crate::hours::TimeFormat;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "githours")]
#[command(about = "Estimate working hours per repository from git commit timestamps")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Directory containing git repositories (or a repository itself)")]
    pub root: Option<PathBuf>,

    #[arg(long, global = true, help = "Author name or e-mail to filter commits by")]
    pub author: Option<String>,

    #[arg(long, global = true, help = "Path to settings file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory for the commit cache database")]
    pub cache: Option<PathBuf>,

    #[arg(long, global = true, help = "Do not read or write the commit cache")]
    pub no_cache: bool,

    #[arg(long, global = true, value_enum, help = "Time display format")]
    pub format: Option<TimeFormat>,

    #[arg(long, global = true, help = "Hide commit summaries")]
    pub no_summary: bool,

    #[arg(long, global = true, default_value = "warn", help = "Log level when RUST_LOG is unset")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Hours for a single day
    Day {
        #[arg(help = "today, yesterday or YYYY-MM-DD", default_value = "today")]
        date: String,

        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,
    },
    /// Hours for the Monday-to-Sunday week containing a day
    Week {
        #[arg(help = "today, yesterday or YYYY-MM-DD", default_value = "today")]
        date: String,

        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,
    },
    /// Activity summary of one repository on one day
    Summary {
        #[arg(help = "Repository folder, relative to the root")]
        folder: PathBuf,

        #[arg(help = "today, yesterday or YYYY-MM-DD", default_value = "today")]
        date: String,
    },
    /// Show the effective settings
    Config {
        #[arg(long, help = "Write a default settings file if none exists")]
        init: bool,
    },
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        use crate::hours::exec::{self, Output};
        use crate::model::WindowKind;

        let output = |json: bool, ndjson: bool| {
            if json {
                Output::Json
            } else if ndjson {
                Output::Ndjson
            } else {
                Output::Table
            }
        };

        match self.command {
            Commands::Day { date, json, ndjson } => {
                exec::exec(&self.common, WindowKind::Day, &date, output(json, ndjson))
            }
            Commands::Week { date, json, ndjson } => {
                exec::exec(&self.common, WindowKind::Week, &date, output(json, ndjson))
            }
            Commands::Summary { folder, date } => exec::summary(&self.common, &folder, &date),
            Commands::Config { init } => exec::config(&self.common, init),
        }
    }
}
