use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::report::{aggregate, format_summary_with, parse_report, Captions};
use crate::server::run_server;

#[derive(Parser)]
#[command(name = "reportlens")]
#[command(author, version, about = "Allure report summaries and analysis", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output file path (defaults to stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Pretty print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a locally saved Allure report
    Summary {
        /// Report file (JSON array of test cases)
        file: PathBuf,

        /// Print the aggregate as JSON instead of the formatted summary
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Wrap status counts in color spans
        #[arg(long, default_value_t = false)]
        color: bool,

        /// Use English captions
        #[arg(long, default_value_t = false)]
        english: bool,
    },

    /// Fetch, index and analyze one report
    Analyze {
        #[command(flatten)]
        settings: Settings,

        /// Report UUID
        #[arg(short, long)]
        uuid: String,

        /// One-off question (the default question is used otherwise)
        #[arg(short, long)]
        question: Option<String>,
    },

    /// Serve the HTTP API
    Serve {
        #[command(flatten)]
        settings: Settings,

        /// Address to listen on
        #[arg(short, long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: String,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Summary {
                file,
                json,
                color,
                english,
            } => {
                info!("Summarizing report file: {}", file.display());
                let summary = summarize_file(file)?;

                if *json {
                    self.write_json(&summary)
                } else {
                    let captions = if *english {
                        Captions::english()
                    } else {
                        Captions::default()
                    };
                    self.write(format_summary_with(&summary, *color, &captions))
                }
            }
            Commands::Analyze {
                settings,
                uuid,
                question,
            } => {
                let service = settings.build_service()?;
                let outcome = match question {
                    Some(question) => service.analyze_with_question(uuid, question).await?,
                    None => service.analyze(uuid).await?,
                };
                self.write_json(&outcome)
            }
            Commands::Serve { settings, bind } => {
                let service = Arc::new(settings.build_service()?);
                run_server(service, bind).await
            }
        }
    }

    fn write_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        let json_output = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        self.write(json_output)
    }

    fn write(&self, output: String) -> Result<()> {
        if let Some(output_path) = &self.output {
            std::fs::write(output_path, output)?;
            info!("Output written to: {}", output_path.display());
        } else {
            println!("{}", output);
        }
        Ok(())
    }
}

fn summarize_file(path: &Path) -> Result<crate::insights::ReportSummary> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let cases = parse_report(&body)
        .with_context(|| format!("{} is not a valid Allure report", path.display()))?;
    Ok(aggregate(&cases, Utc::now().timestamp()))
}
