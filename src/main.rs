//! Operator web console.
//!
//! Adapts axum requests to the framework-agnostic `api` layer: hands the
//! request's session to `OperatorSession`, flattens urlencoded and multipart
//! bodies into `ApiRequest`, and turns `ApiResponse` back into HTTP. Session
//! cookies and expiry belong to `tower_sessions`.

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Form, Router};
use bulkmail::api::session::OperatorSession;
use bulkmail::api::{self, ApiRequest, ApiResponse, AppState};
use bulkmail::configuration::Config;
use bulkmail::mailer::SmtpMailer;
use bulkmail::storage::SqliteStorage;
use bulkmail::types::UploadedFile;
use bulkmail::uploads::UploadDir;
use std::collections::HashMap;
use std::sync::Arc;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};
use tracing::info;

const SESSION_COOKIE: &str = "session_id";

type SharedState = Arc<AppState<SqliteStorage, SmtpMailer>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env()?;
    info!(
        database = %config.database_url,
        upload_dir = %config.upload_dir.display(),
        smtp_host = %config.smtp_host,
        smtp_port = config.smtp_port,
        session_idle_minutes = config.session_idle_minutes,
        "Starting bulkmail"
    );

    let storage = Arc::new(SqliteStorage::connect(&config.database_url).await?);
    let mailer = Arc::new(SmtpMailer::new(config.smtp_host.clone(), config.smtp_port));
    let uploads = UploadDir::create(&config.upload_dir).await?;
    let state: SharedState = Arc::new(AppState::new(storage, mailer, uploads));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, router(state, &config))
        .await
        .context("Server error")?;
    Ok(())
}

fn router(state: SharedState, config: &Config) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE)
        .with_secure(config.session_secure)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(
            config.session_idle_minutes,
        )));

    Router::new()
        .fallback(dispatch)
        .layer(session_layer)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state)
}

async fn dispatch(
    State(state): State<SharedState>,
    session: Session,
    request: Request,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    info!(method = %method, path = %path, "Handling request");

    let mut api_request = ApiRequest::new(&method, &path, OperatorSession::new(session));
    if method == "POST" {
        if let Err(rejection) = read_body(request, &mut api_request).await {
            return rejection;
        }
    }

    to_http(api::handle(api_request, &state).await)
}

/// Copy text fields and files from the body into `api_request`.
async fn read_body(request: Request, api_request: &mut ApiRequest) -> Result<(), Response> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(IntoResponse::into_response)?;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(IntoResponse::into_response)?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field.bytes().await.map_err(IntoResponse::into_response)?;
                    api_request
                        .files
                        .push(UploadedFile::new(name, filename, bytes.to_vec()));
                }
                None => {
                    let value = field.text().await.map_err(IntoResponse::into_response)?;
                    api_request.form.insert(name, value);
                }
            }
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(IntoResponse::into_response)?;
        api_request.form = fields;
    }

    Ok(())
}

fn to_http(response: ApiResponse) -> Response {
    match response {
        ApiResponse::Html(body) => Html(body).into_response(),
        ApiResponse::Text { status, body } => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        )
            .into_response(),
        ApiResponse::Redirect(location) => Redirect::to(&location).into_response(),
    }
}
