use super::session::{Flash, FlashLevel, OperatorSession};
use super::{ApiRequest, ApiResponse, AppState};
use crate::campaign::Campaign;
use crate::configuration::MAX_SENDER_ACCOUNTS;
use crate::dispatcher::{self, Activation, DispatchError, PreconditionError};
use crate::ingest::{self, IngestReport};
use crate::mailer::Mailer;
use crate::storage::Storage;
use crate::types::{RecipientStats, UploadedFile};
use askama::Template;
use chrono::{NaiveTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Templates
// ============================================================================

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    flashes: Vec<Flash>,
    stats: RecipientStats,
    sending_progress: String,
    senders: Vec<String>,
}

#[derive(Template)]
#[template(path = "upload_excel.html")]
struct UploadTemplate {
    flashes: Vec<Flash>,
    log: Option<IngestReport>,
}

struct AccountRow {
    email: String,
    remove_path: String,
}

#[derive(Template)]
#[template(path = "sender_accounts.html")]
struct SenderAccountsTemplate {
    flashes: Vec<Flash>,
    accounts: Vec<AccountRow>,
    max_accounts: usize,
}

#[derive(Template)]
#[template(path = "campaign.html")]
struct CampaignTemplate {
    flashes: Vec<Flash>,
    subject: String,
    body: String,
    attachment: Option<String>,
}

// ============================================================================
// Response helpers
// ============================================================================

fn page<T: Template>(template: T) -> ApiResponse {
    match template.render() {
        Ok(html) => ApiResponse::Html(html),
        Err(e) => {
            error!(error = %e, "Failed to render template");
            internal_error()
        }
    }
}

fn internal_error() -> ApiResponse {
    ApiResponse::Text {
        status: 500,
        body: "Internal server error".to_string(),
    }
}

fn session_error(e: anyhow::Error) -> ApiResponse {
    error!(error = %e, "Session store failed");
    internal_error()
}

fn redirect(location: &str) -> ApiResponse {
    ApiResponse::Redirect(location.to_string())
}

// ============================================================================
// Route handlers
// ============================================================================

/// GET /
pub(super) async fn dashboard_get<S, M>(
    state: &Arc<AppState<S, M>>,
    session: &OperatorSession,
) -> ApiResponse
where
    S: Storage,
    M: Mailer,
{
    let today = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    let stats = match state.storage.stats(today).await {
        Ok(stats) => stats,
        Err(e) => {
            error!(error = %e, "Failed to load recipient counts");
            return internal_error();
        }
    };

    let operator = match session.load().await {
        Ok(operator) => operator,
        Err(e) => return session_error(e),
    };
    let flashes = match session.take_flashes().await {
        Ok(flashes) => flashes,
        Err(e) => return session_error(e),
    };

    page(DashboardTemplate {
        flashes,
        stats,
        sending_progress: format!("{} / {}", stats.sent_since, state.limits.total_limit),
        senders: operator
            .senders
            .list()
            .iter()
            .map(|a| a.email.clone())
            .collect(),
    })
}

/// GET /upload-excel
pub(super) async fn upload_get(session: &OperatorSession) -> ApiResponse {
    match session.take_flashes().await {
        Ok(flashes) => page(UploadTemplate { flashes, log: None }),
        Err(e) => session_error(e),
    }
}

/// POST /upload-excel
///
/// Ingests every file in the `files` field and renders the counters directly
/// (no redirect), with one flash per skipped file.
pub(super) async fn upload_post<S, M>(state: &Arc<AppState<S, M>>, request: ApiRequest) -> ApiResponse
where
    S: Storage,
    M: Mailer,
{
    let session = request.session;
    let files: Vec<UploadedFile> = request
        .files
        .into_iter()
        .filter(|f| f.field == "files" && !f.filename.is_empty())
        .collect();
    info!(files = files.len(), "Processing spreadsheet upload");

    let (log, problems) = match ingest::ingest_files(&state.storage, files).await {
        Ok(report) => {
            let problems: Vec<String> = report.file_errors.iter().map(|e| e.to_string()).collect();
            (Some(report), problems)
        }
        Err(e) => {
            error!(error = %e, "Ingestion failed");
            (
                None,
                vec!["Upload failed while saving addresses. Check logs.".to_string()],
            )
        }
    };

    // Flashes raised here are rendered straight away, so they never touch
    // the session.
    let mut flashes = match session.take_flashes().await {
        Ok(flashes) => flashes,
        Err(e) => return session_error(e),
    };
    flashes.extend(problems.into_iter().map(|message| Flash {
        level: FlashLevel::Danger,
        message,
    }));

    page(UploadTemplate { flashes, log })
}

/// GET /sender-accounts
pub(super) async fn sender_accounts_get(session: &OperatorSession) -> ApiResponse {
    let operator = match session.load().await {
        Ok(operator) => operator,
        Err(e) => return session_error(e),
    };
    let flashes = match session.take_flashes().await {
        Ok(flashes) => flashes,
        Err(e) => return session_error(e),
    };

    let accounts = operator
        .senders
        .list()
        .iter()
        .map(|a| AccountRow {
            email: a.email.clone(),
            remove_path: format!("/remove-account/{}", urlencoding::encode(&a.email)),
        })
        .collect();

    page(SenderAccountsTemplate {
        flashes,
        accounts,
        max_accounts: MAX_SENDER_ACCOUNTS,
    })
}

/// POST /sender-accounts
pub(super) async fn sender_accounts_post(request: &ApiRequest) -> ApiResponse {
    let email = request.field("email");
    let password = request.field("password");

    let updated = request
        .session
        .update(|s| match s.senders.add(email, password) {
            Ok(()) => {
                info!(sender = %email.trim(), accounts = s.senders.len(), "Sender account added");
                s.flash(FlashLevel::Success, "Sender account added");
            }
            Err(e) => {
                warn!(sender = %email.trim(), error = %e, "Sender account rejected");
                s.flash(FlashLevel::Danger, e.to_string());
            }
        })
        .await;

    match updated {
        Ok(()) => redirect("/sender-accounts"),
        Err(e) => session_error(e),
    }
}

/// POST /remove-account/{email}
pub(super) async fn remove_account_post(session: &OperatorSession, email: &str) -> ApiResponse {
    let updated = session
        .update(|s| {
            let removed = s.senders.remove(email);
            info!(sender = %email, removed, "Remove sender account");
            s.flash(
                FlashLevel::Success,
                format!("Removed sender account {}", email),
            );
        })
        .await;

    match updated {
        Ok(()) => redirect("/sender-accounts"),
        Err(e) => session_error(e),
    }
}

/// GET /campaign
pub(super) async fn campaign_get(session: &OperatorSession) -> ApiResponse {
    let campaign = match session.load().await {
        Ok(operator) => operator.campaign,
        Err(e) => return session_error(e),
    };
    let flashes = match session.take_flashes().await {
        Ok(flashes) => flashes,
        Err(e) => return session_error(e),
    };

    page(CampaignTemplate {
        flashes,
        subject: campaign.subject,
        body: campaign.body,
        attachment: campaign.attachment,
    })
}

/// POST /campaign
///
/// Replaces the session's campaign. A new attachment is written to the upload
/// directory first; saving without one clears the previous reference.
pub(super) async fn campaign_post<S, M>(state: &Arc<AppState<S, M>>, request: ApiRequest) -> ApiResponse {
    let session = &request.session;
    let upload = request
        .files
        .iter()
        .find(|f| f.field == "attachment" && !f.filename.is_empty());

    let attachment = match upload {
        None => None,
        Some(file) => match state.uploads.save(&file.filename, &file.bytes).await {
            Ok(Some(name)) => Some(name),
            Ok(None) => {
                warn!(file = %file.filename, "Attachment name unusable after sanitizing; ignoring it");
                None
            }
            Err(e) => {
                error!(error = %e, file = %file.filename, "Failed to store attachment");
                return match session
                    .flash(
                        FlashLevel::Danger,
                        "Could not store the attachment. Check logs.",
                    )
                    .await
                {
                    Ok(()) => redirect("/campaign"),
                    Err(e) => session_error(e),
                };
            }
        },
    };

    let campaign = Campaign::new(request.field("subject"), request.field("body"), attachment);
    info!(
        subject = %campaign.subject,
        attachment = ?campaign.attachment,
        "Campaign saved"
    );
    let updated = session
        .update(|s| {
            s.campaign = campaign;
            s.flash(FlashLevel::Success, "Campaign setup saved for this run");
        })
        .await;

    match updated {
        Ok(()) => redirect("/"),
        Err(e) => session_error(e),
    }
}

/// POST /activate-sending
///
/// Copies the pool and campaign out of the session and runs one activation.
pub(super) async fn activate_sending_post<S, M>(
    state: &Arc<AppState<S, M>>,
    session: &OperatorSession,
) -> ApiResponse
where
    S: Storage,
    M: Mailer,
{
    let operator = match session.load().await {
        Ok(operator) => operator,
        Err(e) => return session_error(e),
    };
    let attachment = operator
        .campaign
        .attachment
        .as_deref()
        .map(|name| state.uploads.path_for(name));

    let result = dispatcher::activate(
        &state.storage,
        state.mailer.as_ref(),
        Activation {
            senders: operator.senders.list(),
            campaign: &operator.campaign,
            attachment,
            limits: state.limits,
        },
    )
    .await;

    let updated = session
        .update(|s| match result {
            Ok(report) => {
                s.flash(
                    FlashLevel::Success,
                    format!("Sent {} emails in this batch.", report.sent),
                );
                if !report.failures.is_empty() {
                    s.flash(
                        FlashLevel::Danger,
                        format!(
                            "Errors occurred for {} emails. Check logs.",
                            report.failures.len()
                        ),
                    );
                }
            }
            Err(DispatchError::Precondition(p)) => {
                info!(reason = %p, "Activation refused");
                let level = match p {
                    PreconditionError::NoPendingRecipients => FlashLevel::Warning,
                    _ => FlashLevel::Danger,
                };
                s.flash(level, p.to_string());
            }
            Err(DispatchError::Storage(e)) => {
                error!(error = %e, "Activation failed");
                s.flash(
                    FlashLevel::Danger,
                    "Sending failed while reading recipients. Check logs.",
                );
            }
        })
        .await;

    match updated {
        Ok(()) => redirect("/"),
        Err(e) => session_error(e),
    }
}

// ============================================================================
// Tests
// ============================================================================
