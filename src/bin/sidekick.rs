use std::{fs, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use sidekick::{
    judge::{PrizeCatalog, Submission},
    transcript::Transcript,
    verdict::{TranscriptReducer, DEFAULT_NOTE_FIELD},
    SidekickConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sidekick")]
#[command(about = "Judge hackathon prize eligibility with LLM agents")]
struct Args {
    /// Prize catalog YAML overriding or extending the built-in prizes
    #[arg(long, global = true)]
    prizes: Option<PathBuf>,

    /// Model id sent to OpenRouter (overrides SIDEKICK_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a prize checker against a submission and print the verdict
    Check {
        #[arg(long)]
        prize: String,
        #[arg(long)]
        repo_url: Option<String>,
        #[arg(long)]
        project_number: Option<String>,
        #[arg(long)]
        project_url: Option<String>,
        /// Write the agent transcript as JSON
        #[arg(long)]
        save_transcript: Option<PathBuf>,
    },
    /// Reduce a saved transcript to a verdict without calling any model
    Reduce {
        transcript: PathBuf,
        #[arg(long, default_value = DEFAULT_NOTE_FIELD)]
        note_field: String,
    },
    /// List the prizes in the catalog
    Prizes,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn,sidekick=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = SidekickConfig::from_env()?;
    if let Some(path) = args.prizes {
        config = config.with_prizes_file(path);
    }
    if let Some(model) = args.model {
        config = config.with_model(model);
    }

    match args.command {
        Command::Check {
            prize,
            repo_url,
            project_number,
            project_url,
            save_transcript,
        } => {
            let judge = config.build_judge()?;
            let submission = Submission {
                project_title: None,
                repo_url,
                project_number,
                project_url,
            };

            let outcome = judge.run(&prize, &submission).await?;
            if let Some(path) = save_transcript {
                fs::write(&path, outcome.transcript.to_json_string()?)?;
                eprintln!("transcript written to {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&outcome.verdict)?);
        }
        Command::Reduce {
            transcript,
            note_field,
        } => {
            let content = fs::read_to_string(&transcript)?;
            let transcript = Transcript::from_json_str(&content)?;
            let verdict = TranscriptReducer::new()
                .with_note_field(note_field)
                .reduce(&transcript);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        Command::Prizes => {
            let catalog: PrizeCatalog = config.load_catalog()?;
            for prize in catalog.iter() {
                let fields: Vec<&str> = prize.required_fields.iter().map(|field| field.as_str()).collect();
                println!("{:<14} {:<28} [{}]", prize.id, prize.name, fields.join(", "));
            }
        }
    }

    Ok(())
}
