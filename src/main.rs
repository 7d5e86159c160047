mod config;
mod convert;
mod error;
mod family_key;
mod gedcom;
mod model;
mod pages;
mod parser;
mod report;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use config::{OutputFormat, Settings};
use parser::{FamilyRecord, PersonRecord};
use report::RunReport;

#[derive(Parser)]
#[command(name = "edge2ged", about = "Convert Family Edge reports to GEDCOM")]
struct Cli {
    /// Settings file (default: ./edge2ged.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert person.doc and family.doc into one GEDCOM file
    Convert {
        /// Person report
        #[arg(long)]
        person: Option<PathBuf>,
        /// Family group report
        #[arg(long)]
        family: Option<PathBuf>,
        /// Write Ancestry.com flavoured GEDCOM
        #[arg(long)]
        ancestry: bool,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print each page's parsed fields as JSON lines
    Parse {
        #[arg(value_enum)]
        kind: ReportKind,
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportKind {
    Person,
    Family,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout may carry the GEDCOM itself
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    let mut report = RunReport::new();

    match cli.command {
        Commands::Convert {
            person,
            family,
            ancestry,
            output,
        } => {
            if let Some(person) = person {
                settings.person_file = person;
            }
            if let Some(family) = family {
                settings.family_file = family;
            }
            if ancestry {
                settings.format = OutputFormat::Ancestry;
            }

            let text = convert::run(&settings, &mut report).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, text)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!("GEDCOM written to {}", path.display());
                }
                None => io::stdout().lock().write_all(text.as_bytes())?,
            }
        }
        Commands::Parse { kind, file } => {
            let mut out = io::stdout().lock();
            let count = match kind {
                ReportKind::Person => convert::dump_pages::<PersonRecord>(&file, &mut out, &mut report).await?,
                ReportKind::Family => convert::dump_pages::<FamilyRecord>(&file, &mut out, &mut report).await?,
            };
            out.flush()?;
            info!("{} pages dumped", count);
        }
    }

    report.log_summary();
    Ok(())
}
