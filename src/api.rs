use crate::classifier::{Classifier, ClassifierError, ImageSource};
use crate::metrics_defs;
use crate::storage::{RecordStore, StorageError};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Shared, read-only handler state. Cloned per request; both clients are
/// cheap handles around a connection pool.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Classifier,
    pub store: RecordStore,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/classify", post(classify))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ClassifyRequest {
    image_url: Option<String>,
    image_data: Option<String>,
}

#[derive(Serialize)]
struct ClassifyResponse {
    garbage_type: String,
}

impl IntoResponse for ClassifyResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error_message: String,
}

#[derive(Debug)]
enum ApiError {
    MalformedRequest(String),
    Classifier(ClassifierError),
    Storage(StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::MalformedRequest(message) => (StatusCode::BAD_REQUEST, message),
            // A backend/image mismatch is the caller's to fix; everything
            // else the classifier reports is an upstream failure.
            ApiError::Classifier(e @ ClassifierError::UnsupportedImage(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Classifier(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Storage(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        (status, Json(ApiErrorResponse { error_message })).into_response()
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Accept one image reference, classify it, persist the label, respond.
async fn classify(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ClassifyResponse, ApiError> {
    metrics::counter!(metrics_defs::CLASSIFY_REQUESTS).increment(1);

    let request: ClassifyRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::MalformedRequest(format!("invalid request body: {e}")))?;
    let image = image_source(request)?;

    let garbage_type = state.classifier.classify(&image).await.map_err(|e| {
        metrics::counter!(metrics_defs::CLASSIFY_FAILURES).increment(1);
        tracing::error!(error = %e, "classification failed");
        ApiError::Classifier(e)
    })?;

    state
        .store
        .insert_classification(&garbage_type)
        .await
        .map_err(|e| {
            metrics::counter!(metrics_defs::STORAGE_FAILURES).increment(1);
            tracing::error!(error = %e, "failed to store classification");
            ApiError::Storage(e)
        })?;

    metrics::counter!(metrics_defs::RECORDS_STORED).increment(1);
    tracing::info!(garbage_type = %garbage_type, "image classified and stored");

    Ok(ClassifyResponse { garbage_type })
}

/// Validate the inbound payload before any outbound call is made.
fn image_source(request: ClassifyRequest) -> Result<ImageSource, ApiError> {
    if let Some(url) = request.image_url {
        if url.is_empty() {
            return Err(ApiError::MalformedRequest("imageUrl is empty".into()));
        }
        return Ok(ImageSource::Url(url));
    }

    if let Some(data) = request.image_data {
        BASE64
            .decode(&data)
            .map_err(|e| ApiError::MalformedRequest(format!("imageData is not valid base64: {e}")))?;
        return Ok(ImageSource::Inline(data));
    }

    Err(ApiError::MalformedRequest(
        "request must contain an imageUrl or imageData field".into(),
    ))
}
