use fleet_telemetry_backbone::{
    api::{build_router, AppState},
    broker::ReliableSubscriber,
    config::Config,
    ingest::{IssueReportHandler, TransitionCommandHandler},
    stream::FanOutBridge,
    workflow::{InMemoryIssueStore, WorkflowService},
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fleet_telemetry_backbone=info,tower_http=info".into());
    if config.observability.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        "Starting fleet-telemetry-backbone v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Issue store + workflow service
    let store = Arc::new(InMemoryIssueStore::new());
    let workflow = Arc::new(WorkflowService::new(store));
    tracing::info!("Workflow service initialized");

    // Reliable subscriber; a dead-letter producer connection failure is fatal
    let subscriber = Arc::new(ReliableSubscriber::connect(
        config.broker.clone(),
        config.subscriber.clone(),
    )?);

    let report_topic = config.broker.full_topic(&config.topics.issue_reports);
    subscriber.subscribe(
        &report_topic,
        Arc::new(IssueReportHandler::new(workflow.clone())),
    )?;
    let transition_topic = config.broker.full_topic(&config.topics.issue_transitions);
    subscriber.subscribe(
        &transition_topic,
        Arc::new(TransitionCommandHandler::new(workflow.clone())),
    )?;
    let subscriber_handle = subscriber.start();
    tracing::info!(
        topics = ?[&report_topic, &transition_topic],
        "Reliable subscriber started"
    );

    // Fan-out bridge; its shared subscription starts on first client connect
    let bridge = Arc::new(FanOutBridge::new(
        config.broker.clone(),
        config.streaming.clone(),
    ));
    tracing::info!(topic = %config.streaming.topic, "Fan-out bridge initialized");

    // HTTP server
    let app_state = AppState::new(
        workflow,
        bridge,
        config.observability.prometheus_enabled,
    );
    let app = build_router(app_state);

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   REST API: http://{}/v1/issues", http_addr);
    tracing::info!("   Live stream: http://{}/v1/stream/telemetry", http_addr);

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = subscriber_handle => {
            tracing::warn!("Subscriber dispatch loop stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    // Best-effort drain; losing at most one in-flight message is acceptable,
    // it will be redelivered
    tracing::info!("Shutting down gracefully...");
    subscriber.close(Duration::from_secs(5));
    Ok(())
}
