mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use practice_common::config::PracticeConfig;
use practice_common::types::DEFAULT_QUESTION_TYPE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "practice-cli")]
#[command(about = "Practice CLI - Grade solutions and review progress", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a source file against one question
    Run {
        /// Source file to submit
        #[arg(short, long)]
        source: PathBuf,

        /// Questions JSON file (fetched from the backend when omitted)
        #[arg(short, long)]
        questions: Option<PathBuf>,

        /// Subject used to fetch the question list
        #[arg(long, default_value = "python")]
        subject: String,

        /// Tag group used to fetch the question list (e.g. day-1:1)
        #[arg(short, long, default_value = "")]
        tags: String,

        /// Position of the question in the list
        #[arg(short, long, default_value = "0")]
        index: usize,

        /// Language (python, java, c, cpp, javascript)
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Run this stdin as a custom case alongside the graded ones
        #[arg(long)]
        custom_input: Option<String>,

        /// Learner id (defaults to PRACTICE_STUDENT_ID)
        #[arg(long)]
        student_id: Option<String>,
    },

    /// Show list-view progress for a learner
    Progress {
        #[arg(long, default_value = "python")]
        subject: String,

        #[arg(short, long)]
        tags: String,

        #[arg(long)]
        student_id: Option<String>,
    },

    /// Fetch and display one question
    Question {
        /// Question identifier
        #[arg(short, long)]
        id: String,

        #[arg(long, default_value = "python")]
        subject: String,

        #[arg(long = "type", default_value = DEFAULT_QUESTION_TYPE)]
        question_type: String,
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
        .init();

    let cli = Cli::parse();
    let config = PracticeConfig::from_env();

    match cli.command {
        Commands::Run {
            source,
            questions,
            subject,
            tags,
            index,
            language,
            custom_input,
            student_id,
        } => {
            commands::run(
                &config,
                commands::RunOptions {
                    questions_file: questions.as_deref(),
                    subject: &subject,
                    tags: &tags,
                    index,
                    source: &source,
                    language: &language,
                    custom_input: custom_input.as_deref(),
                    student_id: student_id.as_deref(),
                },
            )
            .await?;
        }
        Commands::Progress {
            subject,
            tags,
            student_id,
        } => {
            commands::progress(&config, &subject, &tags, student_id.as_deref()).await?;
        }
        Commands::Question {
            id,
            subject,
            question_type,
        } => {
            commands::show_question(&config, &subject, &id, &question_type).await?;
        }
    }

    Ok(())
}
