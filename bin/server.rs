// Roll Call - Web Server
// JSON API over one shared session; a background task drives its timers.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use clap::Parser;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use roll_call::{
    day_range, default_export_name, open_session, records_to_csv, AttendanceRecord,
    AttendanceStats, AttendanceStatus, Config, Controls, Session, SessionEvent, Student,
};

const TICK_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "roll-call-server")]
#[command(about = "Roll call JSON API", long_about = None)]
#[command(version)]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    db: Option<PathBuf>,

    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session<StdRng>>>,
    recent_limit: usize,
}

impl AppState {
    fn lock_session(&self) -> MutexGuard<'_, Session<StdRng>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    fn respond(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Snapshot returned by every session endpoint
#[derive(Serialize)]
struct StateResponse {
    state: &'static str,
    current: Option<Student>,
    history_len: usize,
    cursor: Option<usize>,
    controls: Controls,
    stats: AttendanceStats,
    events: Vec<SessionEvent>,
}

fn snapshot(session: &mut Session<StdRng>) -> StateResponse {
    StateResponse {
        state: session.state().name(),
        current: session.current().map(|entry| entry.student.clone()),
        history_len: session.history().len(),
        cursor: session.history().cursor(),
        controls: session.controls(),
        stats: session.stats(),
        events: session.drain_events(),
    }
}

#[derive(Deserialize)]
struct RangeQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<usize>,
}

impl RangeQuery {
    fn bounds(&self) -> (Option<chrono::DateTime<chrono::Utc>>, Option<chrono::DateTime<chrono::Utc>>) {
        (
            self.from.map(|day| day_range(day, day).0),
            self.to.map(|day| day_range(day, day).1),
        )
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/state - Current selection, controls and pending events
async fn get_state(State(state): State<AppState>) -> Response {
    let mut session = state.lock_session();
    ApiResponse::ok(snapshot(&mut session)).respond(StatusCode::OK)
}

/// POST /api/roll - Start a roll (revealed by the ticker after the delay)
async fn roll(State(state): State<AppState>) -> Response {
    let mut session = state.lock_session();
    let started = session.start_roll(Instant::now());
    let status = if started { StatusCode::OK } else { StatusCode::CONFLICT };
    ApiResponse::ok(snapshot(&mut session)).respond(status)
}

/// POST /api/attendance/:status - Mark the current student
async fn mark_attendance(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Response {
    let status: AttendanceStatus = match status.parse() {
        Ok(status) => status,
        Err(e) => return ApiResponse::<()>::error(e).respond(StatusCode::BAD_REQUEST),
    };

    let mut session = state.lock_session();
    match session.mark_attendance(status) {
        Some(record) => ApiResponse::ok(record).respond(StatusCode::OK),
        None => {
            let events = session.drain_events();
            let message = events
                .into_iter()
                .rev()
                .find_map(|event| match event {
                    SessionEvent::Notification { message, .. } => Some(message),
                    _ => None,
                })
                .unwrap_or_else(|| "No student selected".to_string());
            ApiResponse::<()>::error(message).respond(StatusCode::CONFLICT)
        }
    }
}

/// POST /api/next - Replay forward, or roll at the end of history
async fn next(State(state): State<AppState>) -> Response {
    let mut session = state.lock_session();
    session.go_next(Instant::now());
    ApiResponse::ok(snapshot(&mut session)).respond(StatusCode::OK)
}

/// POST /api/previous - Replay the previous selection
async fn previous(State(state): State<AppState>) -> Response {
    let mut session = state.lock_session();
    session.go_previous();
    ApiResponse::ok(snapshot(&mut session)).respond(StatusCode::OK)
}

/// POST /api/auto-roll - Toggle auto roll
async fn toggle_auto_roll(State(state): State<AppState>) -> Response {
    let mut session = state.lock_session();
    session.toggle_auto_roll(Instant::now());
    ApiResponse::ok(snapshot(&mut session)).respond(StatusCode::OK)
}

/// GET /api/stats - Roster-wide rates
async fn get_stats(State(state): State<AppState>) -> Response {
    let session = state.lock_session();
    ApiResponse::ok(session.stats()).respond(StatusCode::OK)
}

/// GET /api/records?from&to&limit - Newest first
async fn get_records(State(state): State<AppState>, Query(query): Query<RangeQuery>) -> Response {
    let (start, end) = query.bounds();
    let limit = query.limit.unwrap_or(state.recent_limit);

    let mut session = state.lock_session();
    let records: Vec<AttendanceRecord> = session.recent_records(start, end, limit);
    ApiResponse::ok(records).respond(StatusCode::OK)
}

/// GET /api/export?from&to - CSV download
async fn export_records(State(state): State<AppState>, Query(query): Query<RangeQuery>) -> Response {
    let (start, end) = query.bounds();
    let records = state.lock_session().records_in_range(start, end);

    if records.is_empty() {
        return ApiResponse::<()>::error("No records to export").respond(StatusCode::NOT_FOUND);
    }

    match records_to_csv(&records) {
        Ok(body) => {
            let disposition = format!(
                "attachment; filename=\"{}\"",
                default_export_name(Local::now().date_naive())
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                format!("\u{feff}{}", body),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to render export");
            ApiResponse::<()>::error(e.to_string()).respond(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /api/import - Replace the roster from a plain-text body
async fn import_roster(State(state): State<AppState>, body: String) -> Response {
    let mut session = state.lock_session();
    match session.import_roster(&body) {
        Ok(_) => ApiResponse::ok(snapshot(&mut session)).respond(StatusCode::OK),
        Err(e) => {
            session.drain_events();
            ApiResponse::<()>::error(e.to_string()).respond(StatusCode::BAD_REQUEST)
        }
    }
}

/// POST /api/clear - Delete every record and zero all counters
async fn clear(State(state): State<AppState>) -> Response {
    let mut session = state.lock_session();
    session.clear_all();
    ApiResponse::ok(snapshot(&mut session)).respond(StatusCode::OK)
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("roll_call=info,roll_call_server=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::discover(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.database_path = db;
    }

    println!("🌐 Roll Call - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━");

    let session = open_session(&config)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    println!("✓ Database opened: {:?}", config.database_path);

    // Create shared state
    let state = AppState {
        session: Arc::new(Mutex::new(session)),
        recent_limit: config.recent_records_limit,
    };

    // Reveal delays and auto rolls only advance when ticked
    let ticker = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            ticker.lock_session().tick(Instant::now());
        }
    });

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/state", get(get_state))
        .route("/roll", post(roll))
        .route("/attendance/:status", post(mark_attendance))
        .route("/next", post(next))
        .route("/previous", post(previous))
        .route("/auto-roll", post(toggle_auto_roll))
        .route("/stats", get(get_stats))
        .route("/records", get(get_records))
        .route("/export", get(export_records))
        .route("/import", post(import_roster))
        .route("/clear", post(clear))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", args.addr))?;

    tracing::info!(addr = %args.addr, "server listening");
    println!("\n🚀 Server running on http://{}", args.addr);
    println!("   API: http://{}/api/state", args.addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
