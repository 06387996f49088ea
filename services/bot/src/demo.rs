use crate::infra::{
    seed_demo_data, InMemoryDirectory, InMemoryInteractionStore, InMemoryReminderQueue,
    InMemoryScoreRepository,
};
use async_trait::async_trait;
use clap::Args;
use std::sync::{Arc, Mutex};

use screening_ai::error::AppError;
use screening_ai::config::QuestionnaireConfig;
use screening_ai::workflows::questionnaire::{
    CallbackData, CandidateInput, CommandName, ConversationEngine,
};
use screening_ai::workflows::scoring::{
    HrNotification, NotificationError, NotificationSink, ScoreRepository, ScoringClient,
    ScoringClientError, ScoringDispatcher, ScoringHandoff, ScoringJob,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the full JSON payload of every outbound message
    #[arg(long)]
    verbose: bool,
    /// Scoring reply the canned model returns (try "not-a-number")
    #[arg(long, default_value = "8")]
    score_reply: String,
}

#[derive(Default)]
struct CollectingHandoff {
    jobs: Mutex<Vec<ScoringJob>>,
}

impl ScoringHandoff for CollectingHandoff {
    fn dispatch(&self, job: ScoringJob) {
        self.jobs.lock().expect("handoff mutex poisoned").push(job);
    }
}

struct CannedClient(String);

#[async_trait]
impl ScoringClient for CannedClient {
    async fn evaluate(
        &self,
        _document: &str,
        _instruction: &str,
    ) -> Result<String, ScoringClientError> {
        Ok(self.0.clone())
    }
}

struct PrintSink;

impl NotificationSink for PrintSink {
    fn notify(&self, notification: HrNotification) -> Result<(), NotificationError> {
        println!(
            "HR notification: application {} scored {:.1} ({})",
            notification.application_id.0, notification.score, notification.decision
        );
        Ok(())
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Candidate screening demo\n");

    let directory = Arc::new(InMemoryDirectory::default());
    let interactions = Arc::new(InMemoryInteractionStore::default());
    let reminders = Arc::new(InMemoryReminderQueue::default());
    let handoff = Arc::new(CollectingHandoff::default());
    let engine = ConversationEngine::new(
        directory.clone(),
        interactions.clone(),
        reminders,
        handoff.clone(),
        QuestionnaireConfig::default(),
    );

    let seed = seed_demo_data(&directory);

    let script: Vec<(&str, CandidateInput)> = vec![
        (
            "/start",
            CandidateInput::Command {
                name: CommandName::Start,
            },
        ),
        (
            "[I consent]",
            CandidateInput::Callback {
                data: CallbackData::Consent(true).encode(),
            },
        ),
        (
            "Alice Petrova",
            CandidateInput::Text {
                body: "Alice Petrova".to_string(),
            },
        ),
        (
            "[Yes]",
            CandidateInput::Callback {
                data: CallbackData::Choice("Yes".to_string()).encode(),
            },
        ),
        (
            "Three years on a telecom support line.",
            CandidateInput::Text {
                body: "Three years on a telecom support line.".to_string(),
            },
        ),
        (
            "[Submit]",
            CandidateInput::Callback {
                data: CallbackData::Submit.encode(),
            },
        ),
    ];

    for (label, input) in script {
        println!("candidate> {label}");
        let messages = engine.handle(&seed.chat, input)?;
        for message in messages {
            println!("bot> {}", message.body().replace('\n', "\n     "));
            if args.verbose {
                println!(
                    "     {}",
                    serde_json::to_string(&message).unwrap_or_default()
                );
            }
        }
        println!();
    }

    let jobs = handoff.jobs.lock().expect("handoff mutex poisoned").clone();
    let Some(job) = jobs.first().copied() else {
        println!("no scoring job was dispatched");
        return Ok(());
    };

    println!("scoring application {} ...", job.application_id.0);
    let scores = Arc::new(InMemoryScoreRepository::default());
    let dispatcher = ScoringDispatcher::new(
        directory,
        interactions,
        scores.clone(),
        Arc::new(PrintSink),
        Arc::new(CannedClient(args.score_reply)),
    );
    match dispatcher.dispatch(job).await {
        Ok(result) => {
            println!("model replied '{}'", result.raw_response);
            println!("persisted score: {:.1}", result.score);
        }
        Err(err) => println!("scoring dispatch failed: {err}"),
    }

    let recorded = scores
        .for_application(job.application_id)
        .map(|results| results.len())
        .unwrap_or(0);
    println!("{recorded} scoring result(s) on file");

    Ok(())
}
