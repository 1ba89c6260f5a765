use crate::error::AppError;
use crate::hashing::CertificateHash;
use crate::health;
use crate::observability::metrics::Metrics;
use crate::pages;
use crate::service::{CertificateService, RegisterOutcome};
use crate::uploads::Upload;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CertificateService>,
    pub metrics: Arc<Metrics>,
    /// Set once the node has answered a probe.
    pub readiness: Arc<AtomicBool>,
    pub version: String,
    pub max_upload_bytes: usize,
}

pub fn router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/register", get(register_form).post(register_submit))
        .route("/verify", get(verify_form).post(verify_submit))
        .route("/api/certificates/:hash", get(api_verify))
        .merge(health::routes())
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

pub async fn start_server<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

fn status_of(e: &AppError) -> StatusCode {
    match e {
        AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Chain(_) => StatusCode::BAD_GATEWAY,
        AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        AppError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_of(&self);
        (status, Html(pages::error_page(status.as_u16(), &self.to_string()))).into_response()
    }
}

fn ensure_ready(state: &AppState) -> Result<(), AppError> {
    if state.readiness.load(Ordering::SeqCst) {
        Ok(())
    } else {
        Err(AppError::Unavailable)
    }
}

fn form_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::TooLarge(e.body_text())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

#[derive(Default)]
struct SubmittedForm {
    password: Option<String>,
    upload: Option<Upload>,
}

async fn read_form(mut multipart: Multipart) -> Result<SubmittedForm, AppError> {
    let mut form = SubmittedForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(form_error)?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "certificate" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(form_error)?;
                // Browsers send an empty part when no file was chosen.
                if !filename.is_empty() {
                    form.upload = Some(Upload { filename, bytes: bytes.to_vec() });
                }
            }
            "password" => {
                let text = field
                    .text()
                    .await
                    .map_err(form_error)?;
                form.password = Some(text);
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn index() -> Html<String> {
    Html(pages::index())
}

async fn register_form() -> Html<String> {
    Html(pages::register_form())
}

async fn verify_form() -> Html<String> {
    Html(pages::verify_form())
}

async fn register_submit(State(state): State<AppState>, multipart: Multipart) -> Result<Response, AppError> {
    ensure_ready(&state)?;
    let form = read_form(multipart).await?;
    let password = form.password.unwrap_or_default();
    // Detached: a sent registration must reach its audit record even if the
    // client disconnects.
    let service = state.service.clone();
    let outcome = tokio::spawn(async move { service.register(&password, form.upload).await })
        .await
        .map_err(|e| AppError::Storage(format!("registration task failed: {}", e)))??;
    let status = match outcome {
        RegisterOutcome::Denied => StatusCode::FORBIDDEN,
        _ => StatusCode::OK,
    };
    Ok((status, Html(pages::register_outcome(&outcome))).into_response())
}

async fn verify_submit(State(state): State<AppState>, multipart: Multipart) -> Result<Html<String>, AppError> {
    ensure_ready(&state)?;
    let form = read_form(multipart).await?;
    let verification = state.service.verify(form.upload).await?;
    Ok(Html(pages::verification_result(&verification)))
}

async fn api_verify(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    let result = async {
        ensure_ready(&state)?;
        let hash = CertificateHash::from_hex(&hash).map_err(AppError::BadRequest)?;
        state.service.verify_hash(&hash).await
    }
    .await;
    match result {
        Ok(v) => Json(v).into_response(),
        Err(e) => (status_of(&e), Json(json!({"error": e.to_string()}))).into_response(),
    }
}
