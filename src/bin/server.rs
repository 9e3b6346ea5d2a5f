use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use sheet_matcher::types::deserialize_u32_from_number;
use sheet_matcher::{
    DemandPiece, EngineError, MaterialEstimate, OptimizationResult, Optimizer, PolicyMode,
    SheetStats, SufficiencyReport, SupplySheet, check_sufficiency, estimate_material_needed,
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    demand: Vec<DemandPiece>,
    supply: Vec<SupplySheet>,
    #[serde(default)]
    mode: PolicyMode,
    #[serde(default = "default_true")]
    allow_rotation: bool,
    #[serde(default, deserialize_with = "deserialize_u32_from_number")]
    kerf: u32,
}

#[derive(Deserialize, Serialize)]
struct SufficiencyRequest {
    demand: Vec<DemandPiece>,
    supply: Vec<SupplySheet>,
}

#[derive(Deserialize, Serialize)]
struct EstimateRequest {
    demand: Vec<DemandPiece>,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct OptimizeResponse {
    mode: PolicyMode,
    #[serde(flatten)]
    result: OptimizationResult,
    sheet_stats: Vec<SheetStats>,
}

type ApiError = (StatusCode, String);

fn bad_request(e: EngineError) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

async fn optimize(Json(req): Json<OptimizeRequest>) -> Result<Json<OptimizeResponse>, ApiError> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );

    let result = Optimizer::new()
        .with_kerf(req.kerf)
        .optimize(&req.demand, &req.supply, req.mode, req.allow_rotation)
        .map_err(bad_request)?;

    let sheet_stats = result
        .layouts
        .iter()
        .map(|l| l.stats())
        .collect::<Result<Vec<_>, _>>()
        .map_err(bad_request)?;

    Ok(Json(OptimizeResponse {
        mode: req.mode,
        result,
        sheet_stats,
    }))
}

async fn sufficiency(Json(req): Json<SufficiencyRequest>) -> Json<SufficiencyReport> {
    tracing::info!(
        pieces = req.demand.len(),
        sheets = req.supply.len(),
        "POST /sufficiency"
    );
    Json(check_sufficiency(&req.demand, &req.supply))
}

async fn estimate(Json(req): Json<EstimateRequest>) -> Json<MaterialEstimate> {
    tracing::info!(pieces = req.demand.len(), "POST /estimate");
    Json(estimate_material_needed(&req.demand))
}

fn app() -> Router {
    Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize))
        .route("/sufficiency", post(sufficiency))
        .route("/estimate", post(estimate))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

fn main() {
    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: std::env::var("SENTRY_DSN")
            .ok()
            .and_then(|dsn| dsn.parse().ok()),
        release: sentry::release_name!(),
        ..Default::default()
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(serve());
}

async fn serve() {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app()).await.unwrap();
}
