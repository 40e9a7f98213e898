use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use credops::config::AppConfig;
use credops::error::AppError;
use credops::telemetry;
use credops::workflows::notify::{
    HttpMessagingClient, InMemoryTemplateStore, MessagingGateway, NotificationDispatcher,
    TemplateStore,
};
use credops::workflows::scheduling::{
    scheduling_router, AppointmentLocation, AppointmentProposal, IdentityDirectory, MemoryStore,
    ProposalId, ProposalStatus, ReminderSweeper, SchedulingService, StaticDirectory,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Credit Compliance Orchestrator",
    about = "Run the interview scheduling and approval workflow service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run one reminder sweep and print the summary
    Sweep(SweepArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug, Default)]
struct SweepArgs {
    /// Override the staleness threshold in hours
    #[arg(long)]
    staleness_hours: Option<i64>,
    /// Override the inter-message pacing in milliseconds
    #[arg(long)]
    pace_ms: Option<u64>,
    /// Seed a few stale demo proposals before sweeping
    #[arg(long)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Sweep(args) => tokio::task::spawn_blocking(move || run_sweep(args))
            .await
            .map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))?,
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let store = Arc::new(MemoryStore::new());
    let directory: Arc<dyn IdentityDirectory> =
        Arc::new(StaticDirectory::from_spec(&config.roles_spec));
    let templates: Arc<dyn TemplateStore> = Arc::new(InMemoryTemplateStore::with_defaults());
    let gateway: Arc<dyn MessagingGateway> =
        Arc::new(HttpMessagingClient::new(&config.messaging)?);

    let service = Arc::new(SchedulingService::new(
        store.clone(),
        directory,
        templates.clone(),
        NotificationDispatcher::new(gateway.clone(), config.messaging.clone()),
    ));
    let sweeper = Arc::new(ReminderSweeper::new(
        store,
        NotificationDispatcher::new(gateway, config.messaging.clone()),
        templates,
        config.sweep.clone(),
    ));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(scheduling_router(service, sweeper))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "compliance scheduling orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let mut sweep_config = config.sweep.clone();
    if let Some(hours) = args.staleness_hours {
        sweep_config.staleness_hours = hours;
    }
    if let Some(pace_ms) = args.pace_ms {
        sweep_config.pace = Duration::from_millis(pace_ms);
    }

    let store = Arc::new(MemoryStore::new());
    if args.seed_demo {
        seed_demo_proposals(&store);
    }

    let gateway: Arc<dyn MessagingGateway> =
        Arc::new(HttpMessagingClient::new(&config.messaging)?);
    let templates: Arc<dyn TemplateStore> = Arc::new(InMemoryTemplateStore::with_defaults());
    let sweeper = ReminderSweeper::new(
        store,
        NotificationDispatcher::new(gateway, config.messaging.clone()),
        templates,
        sweep_config,
    );

    let summary = sweeper.sweep(Utc::now())?;

    println!("Reminder sweep finished");
    println!("- scanned: {}", summary.scanned);
    println!("- sent: {}", summary.sent);
    println!("- failed: {}", summary.failed);

    Ok(())
}

/// Seed stale pending proposals so the sweep demo has rows to process.
fn seed_demo_proposals(store: &MemoryStore) {
    use credops::workflows::scheduling::SchedulingStore as _;

    let created_at = Utc::now() - ChronoDuration::hours(48);
    for (index, (name, phone)) in [
        ("Ana Souza", "(44) 9 9821-3344"),
        ("Carlos Lima", "(44) 9 8712-0001"),
    ]
    .into_iter()
    .enumerate()
    {
        let id = format!("demo-{:02}", index + 1);
        let proposal = AppointmentProposal {
            id: ProposalId(id),
            compliance_ref: format!("compliance-{:02}", index + 1),
            client_name: name.to_string(),
            client_phone: phone.to_string(),
            cpf: "529.982.247-25".to_string(),
            reviewer_id: "ana".to_string(),
            slot_a: NaiveDate::from_ymd_opt(2026, 9, 14).expect("valid date"),
            slot_b: NaiveDate::from_ymd_opt(2026, 9, 16).expect("valid date"),
            window_start: "09:00".to_string(),
            window_end: "11:30".to_string(),
            location: AppointmentLocation {
                venue: "Agency branch 014".to_string(),
                city: "Maringá".to_string(),
            },
            status: ProposalStatus::Pending,
            confirmed_slot: None,
            reminder_sent_at: None,
            message_id: None,
            observations: String::new(),
            created_at,
        };
        if store.create_proposal(proposal).is_err() {
            eprintln!("demo proposal already seeded");
        }
    }
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
