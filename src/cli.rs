use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{bail, Context, Result};
use tracing::info;

use culprit::core::{Engine, IncidentInput};
use culprit::Config;

#[derive(Parser)]
#[command(name = "culprit")]
#[command(about = "Correlates production exceptions with recent code changes")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Parse a stack trace and print it as JSON
    ParseTrace {
        /// File containing the stack trace
        #[arg(short, long)]
        trace: PathBuf,
    },

    /// Run an investigation over an incident description
    Analyze {
        /// Incident JSON: stack trace, incident time, per-service diffs and deployments
        #[arg(short, long)]
        incident: PathBuf,

        /// Write the investigation here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Analyze services one after another instead of in parallel
        #[arg(long)]
        sequential: bool,
    },
}

impl Cli {
    pub async fn execute(self, config: Config) -> Result<()> {
        match self.command {
            Commands::Init { path, force } => init(path, force, &config),
            Commands::ParseTrace { trace } => {
                let text = std::fs::read_to_string(&trace)
                    .with_context(|| format!("Failed to read stack trace {}", trace.display()))?;
                let engine = Engine::new(&config)?;
                let parsed = engine.parse_trace(Some(&text));
                println!("{}", serde_json::to_string_pretty(&parsed)?);
                Ok(())
            }
            Commands::Analyze { incident, output, sequential } => {
                analyze(&incident, output.as_deref(), sequential, &config).await
            }
        }
    }
}

fn init(path: Option<PathBuf>, force: bool, config: &Config) -> Result<()> {
    let target = path.unwrap_or_else(|| PathBuf::from(".")).join("culprit.toml");
    if target.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", target.display());
    }

    config.save(&target)?;
    info!("Wrote configuration to {}", target.display());
    Ok(())
}

async fn analyze(incident_path: &Path, output: Option<&Path>, sequential: bool, config: &Config) -> Result<()> {
    let content = std::fs::read_to_string(incident_path)
        .with_context(|| format!("Failed to read incident {}", incident_path.display()))?;
    let incident = IncidentInput::from_json(&content)
        .with_context(|| format!("Invalid incident JSON in {}", incident_path.display()))?;

    let engine = Arc::new(Engine::new(config)?);
    let investigation = if sequential {
        engine.investigate(incident)
    } else {
        engine.investigate_concurrent(incident).await?
    };

    let rendered = serde_json::to_string_pretty(&investigation)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            info!("Investigation written to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
