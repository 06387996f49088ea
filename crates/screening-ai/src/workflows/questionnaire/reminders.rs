//! Reminder scheduling.
//!
//! Pausing a questionnaire enqueues a one-shot reminder; a periodic sweep
//! force-pauses interactions whose candidates silently walked away. Due
//! reminders live in a durable queue polled by the scheduler loop rather
//! than in fire-and-forget timers, so a process restart does not drop them.
//! Firing re-checks the interaction state, which also makes the
//! schedule/fire race harmless.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::QuestionnaireConfig;

use super::domain::{ApplicationId, ChatId, InteractionState};
use super::engine::SessionMap;
use super::store::{Directory, InteractionStore, StoreError};
use super::transport::{ChatTransport, OutboundMessage};

/// One scheduled reminder. The chat identity keys the queue: scheduling a
/// new reminder for an identity replaces any pending one (last-cancel-wins).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderEntry {
    pub chat: ChatId,
    pub application_id: ApplicationId,
    pub due_at: DateTime<Utc>,
}

/// Durable due-reminder queue. Implementations must make `schedule` replace
/// the identity's previous entry atomically.
pub trait ReminderQueue: Send + Sync {
    fn schedule(&self, entry: ReminderEntry) -> Result<(), StoreError>;
    /// Remove and return every entry due at or before `now`.
    fn due(&self, now: DateTime<Utc>) -> Result<Vec<ReminderEntry>, StoreError>;
    fn pending(&self) -> Result<usize, StoreError>;
}

/// Background re-engagement of candidates who paused without finishing.
pub struct ReminderScheduler<D, I, R> {
    directory: Arc<D>,
    interactions: Arc<I>,
    queue: Arc<R>,
    transport: Arc<dyn ChatTransport>,
    sessions: SessionMap,
    config: QuestionnaireConfig,
}

impl<D, I, R> ReminderScheduler<D, I, R>
where
    D: Directory + Send + Sync + 'static,
    I: InteractionStore + Send + Sync + 'static,
    R: ReminderQueue + Send + Sync + 'static,
{
    pub fn new(
        directory: Arc<D>,
        interactions: Arc<I>,
        queue: Arc<R>,
        transport: Arc<dyn ChatTransport>,
        sessions: SessionMap,
        config: QuestionnaireConfig,
    ) -> Self {
        Self {
            directory,
            interactions,
            queue,
            transport,
            sessions,
            config,
        }
    }

    /// Force-pause started interactions idle past the threshold and schedule
    /// their reminders. Returns how many interactions were paused.
    pub fn run_sweep(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = now - self.config.inactivity_threshold;
        let stale = self.interactions.stale_started(cutoff)?;
        let mut paused = 0usize;

        for mut interaction in stale {
            interaction.state = InteractionState::Paused;
            if let Err(err) = self.interactions.update(interaction.clone()) {
                warn!(interaction = interaction.id.0, error = %err, "sweep failed to pause interaction");
                continue;
            }
            paused += 1;

            let chat = match self.directory.candidate(interaction.candidate_id) {
                Ok(Some(candidate)) => candidate.chat,
                Ok(None) => None,
                Err(err) => {
                    warn!(candidate = interaction.candidate_id.0, error = %err, "sweep could not resolve candidate");
                    None
                }
            };

            let Some(chat) = chat else {
                debug!(
                    interaction = interaction.id.0,
                    "paused interaction has no chat identity, skipping reminder"
                );
                continue;
            };

            self.sessions.evict(&chat);
            if let Err(err) = self.queue.schedule(ReminderEntry {
                chat,
                application_id: interaction.application_id,
                due_at: now + self.config.reminder_delay,
            }) {
                warn!(interaction = interaction.id.0, error = %err, "sweep failed to schedule reminder");
            }
        }

        if paused > 0 {
            info!(paused, "inactivity sweep paused abandoned questionnaires");
        }
        Ok(paused)
    }

    /// Deliver every due reminder whose interaction is still paused. Returns
    /// how many reminders were sent.
    pub async fn fire_due(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut sent = 0usize;

        for entry in self.queue.due(now)? {
            // Candidates who resumed (or finished) since the pause get nothing.
            let still_paused = matches!(
                self.interactions.get(entry.application_id)?,
                Some(interaction) if interaction.state == InteractionState::Paused
            );
            if !still_paused {
                continue;
            }

            match self
                .transport
                .deliver(&entry.chat, reminder_message())
                .await
            {
                Ok(()) => {
                    sent += 1;
                    info!(chat = %entry.chat, application = entry.application_id.0, "reminder sent");
                }
                Err(err) => {
                    warn!(chat = %entry.chat, error = %err, "reminder delivery failed");
                }
            }
        }

        Ok(sent)
    }

    /// Run the poll/sweep loop on the tokio runtime.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut poll = tokio::time::interval(self.config.reminder_poll_interval);
            let mut last_sweep = tokio::time::Instant::now();

            loop {
                poll.tick().await;
                let now = Utc::now();

                if let Err(err) = self.fire_due(now).await {
                    warn!(error = %err, "reminder poll failed");
                }

                if last_sweep.elapsed() >= self.config.sweep_interval {
                    last_sweep = tokio::time::Instant::now();
                    if let Err(err) = self.run_sweep(now) {
                        warn!(error = %err, "inactivity sweep failed");
                    }
                }
            }
        })
    }
}

fn reminder_message() -> OutboundMessage {
    OutboundMessage::Ack {
        body: "You have an unfinished questionnaire. Send /start to continue where you left off."
            .to_string(),
    }
}
