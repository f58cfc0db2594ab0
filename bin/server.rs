// Appraisal Ledger - Web Server
// REST API with Axum

use anyhow::Context;
use appraisal_ledger::{
    build_report, compute_dashboard, filter_banks, init_logging, insight_within,
    provider_from_config, ActorId, AppConfig, Bank, DashboardStats, InsightProvider, Loan,
    LoanFilter, RecordStore, Report, ReportMode, SqliteStore,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tower_http::cors::CorsLayer;

/// Header carrying the appraiser identity
const ACTOR_HEADER: &str = "x-appraiser-id";

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    config: Arc<AppConfig>,
    insight: Arc<dyn InsightProvider>,
}

impl AppState {
    fn store(&self) -> MutexGuard<'_, SqliteStore> {
        // A panic in another handler does not invalidate the connection
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Both lists, fetched under one lock
    fn snapshot(&self, actor: &ActorId) -> (Vec<Loan>, Vec<Bank>) {
        let store = self.store();
        (store.list_loans(actor), store.list_banks(actor))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
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
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message.into()),
        }),
    )
        .into_response()
}

fn actor_from(headers: &HeaderMap) -> Result<ActorId, Response> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| ActorId::new(v).ok())
        .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "missing X-Appraiser-Id header"))
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Option<String>,
}

#[derive(Deserialize)]
struct MonthQuery {
    #[serde(default)]
    month: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/banks - Branch list, optionally filtered by name
async fn list_banks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };

    let banks = state.store().list_banks(&actor);
    let filtered: Vec<Bank> = filter_banks(&banks, query.search.as_deref().unwrap_or(""))
        .into_iter()
        .cloned()
        .collect();

    Json(ApiResponse::ok(filtered)).into_response()
}

/// POST /api/banks - Insert or update a branch; returns the refreshed list
async fn save_bank(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(bank): Json<Bank>,
) -> Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };
    if let Err(e) = bank.validate() {
        return failure(StatusCode::BAD_REQUEST, e.to_string());
    }

    let store = state.store();
    if !store.save_bank(&actor, &bank) {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "could not save bank");
    }
    Json(ApiResponse::ok(store.list_banks(&actor))).into_response()
}

/// DELETE /api/banks/:id - Remove a branch; its loans remain
async fn delete_bank(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };

    let store = state.store();
    if !store.delete_bank(&actor, &id) {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "could not delete bank");
    }
    Json(ApiResponse::ok(store.list_banks(&actor))).into_response()
}

/// GET /api/loans - Loan register (?search=&bankId=&date=)
async fn list_loans(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<LoanFilter>,
) -> Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };

    let loans = state.store().list_loans(&actor);
    let filtered: Vec<Loan> = filter.apply(&loans).into_iter().cloned().collect();

    Json(ApiResponse::ok(filtered)).into_response()
}

/// POST /api/loans - Insert or update an appraisal; returns the refreshed list
async fn save_loan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(loan): Json<Loan>,
) -> Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };

    let loan = loan.normalized();
    if let Err(e) = loan.validate() {
        return failure(StatusCode::BAD_REQUEST, e.to_string());
    }

    let store = state.store();
    if !store.save_loan(&actor, &loan) {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "could not save loan");
    }
    Json(ApiResponse::ok(store.list_loans(&actor))).into_response()
}

/// DELETE /api/loans/:id
async fn delete_loan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };

    let store = state.store();
    if !store.delete_loan(&actor, &id) {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "could not delete loan");
    }
    Json(ApiResponse::ok(store.list_loans(&actor))).into_response()
}

/// GET /api/dashboard - Numeric statistics only (insight has its own endpoint)
async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };

    let (loans, banks) = state.snapshot(&actor);
    let stats: DashboardStats =
        compute_dashboard(&loans, &banks, Utc::now().date_naive(), state.config.fees.dashboard);

    Json(ApiResponse::ok(stats)).into_response()
}

/// GET /api/insight - Written summary, always succeeds (fallback text on failure)
async fn get_insight(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };

    // Lock released before the provider call
    let (loans, banks) = state.snapshot(&actor);
    let text = insight_within(
        state.insight.as_ref(),
        &loans,
        &banks,
        Utc::now().date_naive(),
        Duration::from_secs(state.config.insight.timeout_secs),
    )
    .await;

    Json(ApiResponse::ok(text)).into_response()
}

fn report_for(state: &AppState, actor: &ActorId, mode: &str, month: Option<&str>) -> Result<Report, Response> {
    let mode = ReportMode::parse(mode, month).map_err(|e| failure(StatusCode::BAD_REQUEST, e.to_string()))?;
    let (loans, banks) = state.snapshot(actor);
    Ok(build_report(mode, &loans, &banks, Utc::now().date_naive(), state.config.fees.report))
}

#[derive(Serialize)]
struct ReportResponse {
    #[serde(flatten)]
    report: Report,
    totals: appraisal_ledger::ReportTotals,
}

/// GET /api/reports/:mode?month=YYYY-MM - Report rows plus footer totals
async fn report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(mode): Path<String>,
    Query(query): Query<MonthQuery>,
) -> Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };

    match report_for(&state, &actor, &mode, query.month.as_deref()) {
        Ok(report) => {
            let totals = report.totals();
            Json(ApiResponse::ok(ReportResponse { report, totals })).into_response()
        }
        Err(resp) => resp,
    }
}

/// GET /api/reports/:mode/csv - Same report as a CSV download
async fn report_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(mode): Path<String>,
    Query(query): Query<MonthQuery>,
) -> Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };

    let report = match report_for(&state, &actor, &mode, query.month.as_deref()) {
        Ok(report) => report,
        Err(resp) => return resp,
    };

    match report.to_csv() {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", report.file_name(Utc::now())),
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Error exporting report");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "could not export report")
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::load(None).context("Failed to load configuration")?;

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    tracing::info!(path = ?config.database_path, "Database opened");

    // Create shared state
    let insight: Arc<dyn InsightProvider> = Arc::from(provider_from_config(&config));
    let bind = config.server.bind.clone();
    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        config: Arc::new(config),
        insight,
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/banks", get(list_banks).post(save_bank))
        .route("/banks/:id", delete(delete_bank))
        .route("/loans", get(list_loans).post(save_loan))
        .route("/loans/:id", delete(delete_loan))
        .route("/dashboard", get(dashboard))
        .route("/insight", get(get_insight))
        .route("/reports/:mode", get(report))
        .route("/reports/:mode/csv", get(report_csv))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;

    tracing::info!(addr = %bind, "Appraisal server listening");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
