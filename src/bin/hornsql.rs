//! hornsql - run a Prolog-subset program against SQLite
//!
//! Usage:
//!   hornsql family.pl [--backend memory|<path>] [--param who=tom] [--format json]
//!
//! Output (text):
//!   ?- grandparent(tom, X).
//!   % X = ann

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use hornsql::exec::output;
use hornsql::{Backend, BodyPolicy, Config, Executor, OutputFormat};

#[derive(Parser)]
#[command(name = "hornsql")]
#[command(author, version, about = "Compile facts, rules and queries into SQL and run them")]
struct Cli {
    /// Program source file
    file: PathBuf,

    /// `memory` or a SQLite database path
    #[arg(long)]
    backend: Option<Backend>,

    /// Upper bound on rule resolution passes
    #[arg(long)]
    max_passes: Option<usize>,

    /// Compile only the first clause of every rule body and query
    #[arg(long)]
    first_clause_only: bool,

    /// Value for a `:name` query parameter, as name=value
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Output format: text or json
    #[arg(long)]
    format: Option<OutputFormat>,

    /// JSON configuration file; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the generated SQL for every query
    #[arg(long)]
    show_sql: bool,

    /// More logging on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => {
            Ok((name.trim_start_matches(':').to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{}'", raw)),
    }
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("failed to load config {:?}", path))?,
            None => Config::default(),
        };

        if let Some(backend) = &self.backend {
            config = config.backend(backend.clone());
        }
        if let Some(passes) = self.max_passes {
            config = config.max_passes(passes);
        }
        if self.first_clause_only {
            config = config.body_policy(BodyPolicy::FirstClause);
        }
        if let Some(format) = self.format {
            config = config.output(format);
        }
        if self.show_sql {
            config = config.show_sql(true);
        }
        for (name, value) in &self.params {
            config = config.param(name.as_str(), value.as_str());
        }
        Ok(config)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config()?;
    let source = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("failed to read {:?}", cli.file))?;

    tracing::info!("Running {:?} on {} backend", cli.file, config.backend);
    let format = config.output;
    let mut executor = Executor::open(config).context("failed to open store")?;
    let report = executor
        .run(&source)
        .map_err(|e| anyhow!("{}: {}", cli.file.display(), e))?;

    print!("{}", output::render(&report, format)?);
    Ok(())
}
