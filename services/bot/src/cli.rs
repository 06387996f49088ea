use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use screening_ai::error::AppError;
use screening_ai::workflows::questionnaire::parse_question_bank;

#[derive(Parser, Debug)]
#[command(
    name = "Candidate Screening Bot",
    about = "Run the candidate screening webhook service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the webhook service (default command)
    Serve(ServeArgs),
    /// Validate a question-bank CSV export without importing it
    Questions(QuestionsArgs),
    /// Run a scripted end-to-end questionnaire demo in memory
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct QuestionsArgs {
    /// Path to the CSV export (Order,Question,Shape,Choices,Screening,Criteria)
    #[arg(long)]
    file: PathBuf,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Questions(args) => validate_questions(args),
        Command::Demo(args) => run_demo(args).await,
    }
}

fn validate_questions(args: QuestionsArgs) -> Result<(), AppError> {
    let file = std::fs::File::open(&args.file)?;
    match parse_question_bank(file) {
        Ok(questions) => {
            println!(
                "{} valid question(s) in {}",
                questions.len(),
                args.file.display()
            );
            for question in &questions {
                let screening = if question.screening.is_some() {
                    " [screening]"
                } else {
                    ""
                };
                println!(
                    "  {}. {:?}: {}{}",
                    question.order, question.expected, question.text, screening
                );
            }
            Ok(())
        }
        Err(err) => {
            eprintln!("question bank export is invalid: {err}");
            std::process::exit(2);
        }
    }
}
