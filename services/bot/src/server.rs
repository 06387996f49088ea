use crate::cli::ServeArgs;
use crate::infra::{
    seed_demo_data, AppState, InMemoryDirectory, InMemoryInteractionStore, InMemoryReminderQueue,
    InMemoryScoreRepository, LoggingNotificationSink, LoggingTransport,
};
use crate::routes::with_ops_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use screening_ai::config::AppConfig;
use screening_ai::error::AppError;
use screening_ai::telemetry;
use screening_ai::workflows::questionnaire::{ConversationEngine, ReminderScheduler};
use screening_ai::workflows::scoring::{HttpScoringClient, ScoringDispatcher, TokioScoringHandoff};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = Arc::new(InMemoryDirectory::default());
    let interactions = Arc::new(InMemoryInteractionStore::default());
    let reminders = Arc::new(InMemoryReminderQueue::default());
    let scores = Arc::new(InMemoryScoreRepository::default());
    let notifications = Arc::new(LoggingNotificationSink);
    let transport = Arc::new(LoggingTransport);

    let seed = seed_demo_data(&directory);
    info!(chat = %seed.chat, "demo vacancy and candidate seeded");

    let scoring_client = Arc::new(HttpScoringClient::new(&config.scoring));
    let dispatcher = Arc::new(ScoringDispatcher::new(
        directory.clone(),
        interactions.clone(),
        scores,
        notifications,
        scoring_client,
    ));

    let engine = Arc::new(ConversationEngine::new(
        directory.clone(),
        interactions.clone(),
        reminders.clone(),
        Arc::new(TokioScoringHandoff::new(dispatcher)),
        config.questionnaire.clone(),
    ));

    let scheduler = Arc::new(ReminderScheduler::new(
        directory,
        interactions,
        reminders,
        transport,
        engine.session_map(),
        config.questionnaire.clone(),
    ));
    let _scheduler_task = scheduler.spawn();

    let app = with_ops_routes(engine)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "candidate screening bot ready");

    axum::serve(listener, app).await?;
    Ok(())
}
