//! transcribeq CLI: operator interface to the prompt allocator.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use transcribeq::allocator::Allocator;
use transcribeq::config::Config;
use transcribeq::db::Db;
use transcribeq::error::Error;
use transcribeq::model::*;
use transcribeq::recorder::Recorder;
use transcribeq::store::Store;
use transcribeq::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "transcribeq", about = "Quota-bounded transcription prompts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check database connectivity and apply migrations
    Health,
    /// Work item (response) operations
    Response {
        #[command(subcommand)]
        action: ResponseAction,
    },
    /// Participant operations
    Participant {
        #[command(subcommand)]
        action: ParticipantAction,
    },
    /// Prompt allocation
    Prompt {
        #[command(subcommand)]
        action: PromptAction,
    },
    /// Transcription operations
    Transcription {
        #[command(subcommand)]
        action: TranscriptionAction,
    },
}

#[derive(Subcommand)]
enum ResponseAction {
    /// Ingest a response to be transcribed
    Add {
        /// Storage link of the audio payload
        storage_link: String,
    },
    /// Show a response and its completion counts
    Show { id: WorkItemId },
}

#[derive(Subcommand)]
enum ParticipantAction {
    /// Register a participant
    Add,
    /// Show a participant's history
    Show { id: ParticipantId },
}

#[derive(Subcommand)]
enum PromptAction {
    /// Allocate the next prompt for a participant
    Next {
        #[arg(long)]
        participant: ParticipantId,
        /// Target language (defaults to TRANSCRIPTION_LANGUAGE)
        #[arg(long)]
        language: Option<Language>,
    },
}

#[derive(Subcommand)]
enum TranscriptionAction {
    /// Record a completed transcription
    Record {
        #[arg(long)]
        participant: ParticipantId,
        #[arg(long)]
        response: WorkItemId,
        #[arg(long)]
        text: String,
        /// Target language (defaults to TRANSCRIPTION_LANGUAGE)
        #[arg(long)]
        language: Option<Language>,
    },
    /// Show a transcription
    Show { id: TranscriptionId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "transcribeq".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let db = Db::connect(config.database_url.expose_secret()).await?;
    db.migrate().await?;
    let db = Arc::new(db);

    let result = run(cli.command, db, &config).await;
    guard.force_flush();
    result
}

async fn run(command: Command, db: Arc<Db>, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Health => {
            db.health_check().await?;
            println!("ok");
        }
        Command::Response { action } => match action {
            ResponseAction::Add { storage_link } => {
                let item = db.create_work_item(NewWorkItem::new(storage_link)).await?;
                println!("Created response {}", item.id.0);
            }
            ResponseAction::Show { id } => {
                let item = db.get_work_item(id).await?;
                println!("ID:       {}", item.id.0);
                println!("Storage:  {}", item.storage_link);
                println!("Created:  {}", item.created_at);
                println!("Counts:   {}", serde_json::to_string(&item.completion_counts)?);
            }
        },
        Command::Participant { action } => match action {
            ParticipantAction::Add => {
                let participant = db.create_participant().await?;
                println!("Created participant {}", participant.id.0);
            }
            ParticipantAction::Show { id } => {
                let participant = db.get_participant(id).await?;
                println!("ID:           {}", participant.id.0);
                println!("Transcribed:  {}", participant.transcribed.len());
                for work_item in &participant.transcribed {
                    println!("  {}", work_item.0);
                }
            }
        },
        Command::Prompt {
            action:
                PromptAction::Next {
                    participant,
                    language,
                },
        } => {
            let allocator = Allocator::new(db, config.settings.clone());
            let language = language.unwrap_or_else(|| config.settings.default_language.clone());
            match allocator.next_prompt_for(participant, &language).await? {
                Allocation::Assigned(prompt) => {
                    println!("Response:  {}", prompt.work_item_id.0);
                    println!("Content:   {}", prompt.content);
                    println!("Position:  {}", prompt.position);
                }
                Allocation::Exhausted => println!("{}", Allocation::EXHAUSTED_MESSAGE),
            }
        }
        Command::Transcription { action } => match action {
            TranscriptionAction::Record {
                participant,
                response,
                text,
                language,
            } => {
                let recorder =
                    Recorder::new(db, config.settings.clone()).with_retry(config.retry.clone());
                let language =
                    language.unwrap_or_else(|| config.settings.default_language.clone());
                match recorder
                    .record_transcription(participant, response, &language, &text)
                    .await
                {
                    Ok(recorded) => {
                        println!("Recorded transcription {}", recorded.transcription.id.0);
                        println!(
                            "Participant has {} transcription(s)",
                            recorded.participant.transcribed.len()
                        );
                    }
                    Err(Error::QuotaExceeded { .. }) => {
                        println!(
                            "This response already has enough transcriptions. \
                             Request a new prompt."
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            TranscriptionAction::Show { id } => {
                let t = db.get_transcription(id).await?;
                println!("ID:           {}", t.id.0);
                println!("Participant:  {}", t.participant_id.0);
                println!("Response:     {}", t.work_item_id.0);
                println!("Language:     {}", t.language);
                println!("Status:       {}", t.status);
                println!("Created:      {}", t.created_at);
                println!("Text:         {}", t.text);
            }
        },
    }
    Ok(())
}
