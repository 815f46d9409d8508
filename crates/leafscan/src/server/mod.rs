//! HTTP surface: `POST /predict` and `GET /health`.
//!
//! The CPU-bound screening runs on the blocking pool; only the vision model
//! call is awaited on the runtime.

pub mod error;

use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use crate::{
    advisor,
    archive::UploadArchive,
    pipeline::{Analyzer, MODEL_VERSION},
    types::{DetectionResult, SensorReading},
};

pub use error::{ApiError, ErrorBody};

/// Default request body limit, 16 MiB
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

pub const SOIL_MOISTURE_HEADER: &str = "x-soil-moisture";
pub const TEMPERATURE_HEADER: &str = "x-temperature";
pub const HUMIDITY_HEADER: &str = "x-humidity";

const SPECIAL_FEATURES: [&str; 3] = [
    "Enhanced Tomato Mold Detection",
    "Early Blight Detection",
    "Powdery Mildew Detection",
];
const PLANT_SUPPORT: &str = "Global - All vegetables + Lebanese herbs";

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    /// Uploads are not kept when unset
    pub archive: Option<UploadArchive>,
}

impl AppState {
    pub fn new(analyzer: Analyzer, archive: Option<UploadArchive>) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            archive,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: DetectionResult,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_version: &'static str,
    pub vision_model_available: bool,
    pub vision_library_available: bool,
    pub special_features: Vec<&'static str>,
    pub plant_support: &'static str,
}

/// Browser clients on any origin may call the API
pub fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors())
        .with_state(state)
}

/// Serve until the listener fails
pub async fn serve(listener: tokio::net::TcpListener, state: AppState, body_limit: usize) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, router(state, body_limit)).await
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let capabilities = state.analyzer.capabilities();
    Json(HealthResponse {
        status: "healthy",
        model_loaded: true,
        model_version: MODEL_VERSION,
        vision_model_available: capabilities.vision_model,
        vision_library_available: capabilities.vision_library,
        special_features: SPECIAL_FEATURES.to_vec(),
        plant_support: PLANT_SUPPORT,
    })
}

async fn predict(State(state): State<AppState>, request: Request) -> Result<Json<AnalysisResponse>, ApiError> {
    let mut reading = sensor_headers(request.headers())?;
    let bytes = if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
        read_multipart(multipart, &mut reading).await?
    } else {
        Bytes::from_request(request, &())
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?
    };

    if bytes.is_empty() {
        return Err(ApiError::NoPayload);
    }

    info!(bytes = bytes.len(), "analysis request");
    if reading.is_present() {
        info!(
            soil_moisture = reading.soil_moisture,
            temperature = reading.temperature,
            humidity = reading.humidity,
            "sensor data supplied"
        );
    }

    if let Some(archive) = &state.archive {
        if let Err(e) = archive.store(&bytes).await {
            warn!(error = %e, dir = %archive.dir().display(), "failed to archive upload");
        }
    }

    let analyzer = Arc::clone(&state.analyzer);
    let screening = {
        let bytes = bytes.clone();
        tokio::task::spawn_blocking(move || analyzer.screen(&bytes))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))??
    };

    let mut result = state.analyzer.resolve(screening, &bytes).await;
    if reading.is_present() {
        result = advisor::advise(result, &reading);
    }

    Ok(Json(AnalysisResponse { success: true, result }))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

/// Missing headers read as zero; malformed ones are rejected
fn sensor_headers(headers: &HeaderMap) -> Result<SensorReading, ApiError> {
    let read = |name: &str| -> Result<f64, ApiError> {
        match headers.get(name) {
            None => Ok(0.0),
            Some(value) => {
                let text = value
                    .to_str()
                    .map_err(|_| ApiError::BadRequest(format!("Invalid {name} header")))?;
                parse_reading(name, text)
            }
        }
    };

    Ok(SensorReading::new(
        read(SOIL_MOISTURE_HEADER)?,
        read(TEMPERATURE_HEADER)?,
        read(HUMIDITY_HEADER)?,
    ))
}

fn parse_reading(name: &str, text: &str) -> Result<f64, ApiError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid {name} value: {text:?}")))
}

/// The `file` field holds the image; sensor fields override the headers
async fn read_multipart(mut multipart: Multipart, reading: &mut SensorReading) -> Result<Bytes, ApiError> {
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
                file = Some(bytes);
            }
            "soil_moisture" | "temperature" | "humidity" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
                let value = parse_reading(&name, &text)?;
                match name.as_str() {
                    "soil_moisture" => reading.soil_moisture = value,
                    "temperature" => reading.temperature = value,
                    _ => reading.humidity = value,
                }
            }
            _ => {}
        }
    }

    file.ok_or(ApiError::NoPayload)
}
