//! HTTP surface for the operator console.
//!
//! Framework-agnostic: accepts `ApiRequest`, returns `ApiResponse`.
//! The server binary in `src/main.rs` adapts axum types to/from these, wraps
//! the request's `tower_sessions::Session`, and calls `handle`.

mod handlers;
pub mod session;

use crate::dispatcher::DispatchLimits;
use crate::mailer::Mailer;
use crate::storage::Storage;
use crate::types::UploadedFile;
use crate::uploads::UploadDir;
use session::OperatorSession;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Request / Response types
// ============================================================================

pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub session: OperatorSession,
    /// Text fields from a urlencoded or multipart body.
    pub form: HashMap<String, String>,
    /// File fields from a multipart body.
    pub files: Vec<UploadedFile>,
}

impl ApiRequest {
    pub fn new(method: &str, path: &str, session: OperatorSession) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            session,
            form: HashMap::new(),
            files: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.form.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.files.push(file);
        self
    }

    fn field(&self, name: &str) -> &str {
        self.form.get(name).map(|s| s.as_str()).unwrap_or("")
    }
}

#[derive(Debug)]
pub enum ApiResponse {
    Html(String),
    Text { status: u16, body: String },
    Redirect(String),
}

impl ApiResponse {
    pub fn status(&self) -> u16 {
        match self {
            Self::Html(_) => 200,
            Self::Text { status, .. } => *status,
            Self::Redirect(_) => 303,
        }
    }

    pub fn redirect_location(&self) -> Option<&str> {
        if let Self::Redirect(loc) = self {
            Some(loc)
        } else {
            None
        }
    }

    pub fn body_contains(&self, s: &str) -> bool {
        match self {
            Self::Html(body) | Self::Text { body, .. } => body.contains(s),
            Self::Redirect(_) => false,
        }
    }
}

// ============================================================================
// Application state
// ============================================================================

pub struct AppState<S, M> {
    pub(crate) storage: Arc<S>,
    pub(crate) mailer: Arc<M>,
    pub(crate) uploads: UploadDir,
    pub(crate) limits: DispatchLimits,
}

impl<S, M> AppState<S, M> {
    pub fn new(storage: Arc<S>, mailer: Arc<M>, uploads: UploadDir) -> Self {
        Self {
            storage,
            mailer,
            uploads,
            limits: DispatchLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: DispatchLimits) -> Self {
        self.limits = limits;
        self
    }
}

// ============================================================================
// Dispatch
// ============================================================================

pub async fn handle<S, M>(request: ApiRequest, state: &Arc<AppState<S, M>>) -> ApiResponse
where
    S: Storage,
    M: Mailer,
{
    let method = request.method.clone();
    let path = request.path.clone();

    if method == "POST" {
        if let Some(encoded) = path.strip_prefix("/remove-account/") {
            let email = match urlencoding::decode(encoded) {
                Ok(email) => email.into_owned(),
                Err(_) => {
                    return ApiResponse::Text {
                        status: 400,
                        body: "Invalid account address".to_string(),
                    };
                }
            };
            return handlers::remove_account_post(&request.session, &email).await;
        }
    }

    match (method.as_str(), path.as_str()) {
        ("GET", "/") => handlers::dashboard_get(state, &request.session).await,
        ("GET", "/upload-excel") => handlers::upload_get(&request.session).await,
        ("POST", "/upload-excel") => handlers::upload_post(state, request).await,
        ("GET", "/sender-accounts") => handlers::sender_accounts_get(&request.session).await,
        ("POST", "/sender-accounts") => handlers::sender_accounts_post(&request).await,
        ("GET", "/campaign") => handlers::campaign_get(&request.session).await,
        ("POST", "/campaign") => handlers::campaign_post(state, request).await,
        ("POST", "/activate-sending") => {
            handlers::activate_sending_post(state, &request.session).await
        }
        _ => ApiResponse::Text {
            status: 404,
            body: "Not Found".to_string(),
        },
    }
}
