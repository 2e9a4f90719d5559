mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "judge-cli")]
#[command(about = "Judge CLI - Manage sandbox languages and judge solutions locally", long_about = None)]
struct Cli {
    /// Path to the language registry file
    #[arg(long, global = true, default_value = judge_common::config::DEFAULT_LANGUAGES_PATH)]
    languages: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured languages and their sandbox runtime ids
    ListLangs,

    /// Register a language with its sandbox runtime id
    AddLang {
        /// Canonical language name (e.g., kotlin, scala)
        #[arg(short, long)]
        name: String,

        /// Sandbox language id
        #[arg(short, long)]
        runtime_id: u32,

        /// Alternative names accepted in requests
        #[arg(short, long)]
        alias: Vec<String>,
    },

    /// Judge a solution file against a problem definition
    Judge {
        /// Solution source file
        #[arg(short, long)]
        file: PathBuf,

        /// Solution language
        #[arg(short, long, default_value = "javascript")]
        language: String,

        /// Problem definition (JSON)
        #[arg(short, long)]
        problem: PathBuf,

        /// Run the full suite and record a submission instead of sampling
        #[arg(long, default_value = "false")]
        submit: bool,

        /// User id for --submit
        #[arg(short, long, default_value = "local")]
        user: String,

        /// Judge one ad-hoc input instead of the problem's cases
        #[arg(long)]
        input: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ListLangs => {
            commands::list_languages(&cli.languages)?;
        }
        Commands::AddLang { name, runtime_id, alias } => {
            commands::add_language(&cli.languages, &name, runtime_id, &alias)?;
        }
        Commands::Judge {
            file,
            language,
            problem,
            submit,
            user,
            input,
        } => {
            let options = commands::JudgeOptions {
                file,
                language,
                problem,
                submit,
                user,
                input,
            };
            commands::judge(&cli.languages, options).await?;
        }
    }

    Ok(())
}
