//! Activation: distributes pending recipients across sender accounts and
//! sends the campaign to each, one recipient at a time.
//!
//! Recipients are fetched in insertion order and cut into contiguous slices,
//! one per account in pool order. A slice is at most `limit_per_account` long
//! and all slices together cover at most `total_limit` recipients; anything
//! past the last slice stays pending for a later activation.

use crate::campaign::Campaign;
use crate::configuration::{LIMIT_PER_ACCOUNT, TOTAL_LIMIT};
use crate::mailer::Mailer;
use crate::senders::SenderAccount;
use crate::storage::Storage;
use crate::types::Recipient;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Activation aborted before anything was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("Add at least one sender account to send emails")]
    NoSenderAccounts,
    #[error("Set campaign subject and body before sending")]
    IncompleteCampaign,
    #[error("No unsent emails available")]
    NoPendingRecipients,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchLimits {
    pub total_limit: usize,
    pub limit_per_account: usize,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        Self {
            total_limit: TOTAL_LIMIT,
            limit_per_account: LIMIT_PER_ACCOUNT,
        }
    }
}

impl DispatchLimits {
    /// `min(limit_per_account, total_limit / accounts)`. Zero when there are
    /// more accounts than `total_limit`, in which case nothing is sent.
    pub fn emails_per_account(&self, accounts: usize) -> usize {
        if accounts == 0 {
            return 0;
        }
        self.limit_per_account.min(self.total_limit / accounts)
    }
}

/// Cut `recipients` into one contiguous slice per account. Slice `i` covers
/// `i * per_account .. (i + 1) * per_account`, clamped to the input; trailing
/// slices may be empty.
pub fn plan_slices<T>(recipients: &[T], accounts: usize, per_account: usize) -> Vec<&[T]> {
    (0..accounts)
        .map(|i| {
            let start = (i * per_account).min(recipients.len());
            let end = ((i + 1) * per_account).min(recipients.len());
            &recipients[start..end]
        })
        .collect()
}

/// A recipient whose delivery failed. It stays pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub recipient: String,
    pub sender: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failures: Vec<DeliveryFailure>,
    /// Fetched this activation but beyond the last slice.
    pub deferred: usize,
}

/// Everything an activation needs from the operator's session.
pub struct Activation<'a> {
    pub senders: &'a [SenderAccount],
    pub campaign: &'a Campaign,
    /// Resolved location of the campaign attachment, if it has one.
    pub attachment: Option<PathBuf>,
    pub limits: DispatchLimits,
}

/// Run one activation. Preconditions are checked in order (senders,
/// campaign, pending recipients) before any delivery is attempted.
///
/// A failed delivery, or a failure to record a successful one, is collected
/// into the report and the loop moves on. Only the initial fetch can fail the
/// whole call.
pub async fn activate<S: Storage, M: Mailer>(
    storage: &Arc<S>,
    mailer: &M,
    activation: Activation<'_>,
) -> Result<DispatchReport, DispatchError> {
    let Activation {
        senders,
        campaign,
        attachment,
        limits,
    } = activation;

    if senders.is_empty() {
        return Err(PreconditionError::NoSenderAccounts.into());
    }
    if !campaign.is_ready() {
        return Err(PreconditionError::IncompleteCampaign.into());
    }

    let pending = storage.fetch_pending(limits.total_limit).await?;
    if pending.is_empty() {
        return Err(PreconditionError::NoPendingRecipients.into());
    }

    let per_account = limits.emails_per_account(senders.len());
    let slices = plan_slices(&pending, senders.len(), per_account);
    let assigned: usize = slices.iter().map(|s| s.len()).sum();

    info!(
        pending = pending.len(),
        accounts = senders.len(),
        per_account,
        assigned,
        "Starting activation"
    );
    if per_account == 0 {
        warn!(
            accounts = senders.len(),
            total_limit = limits.total_limit,
            "More sender accounts than the total limit; nothing will be sent"
        );
    }

    let mut report = DispatchReport {
        deferred: pending.len() - assigned,
        ..DispatchReport::default()
    };

    for (sender, slice) in senders.iter().zip(slices) {
        for recipient in slice {
            match deliver(storage, mailer, sender, campaign, attachment.as_deref(), recipient)
                .await
            {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    let failure = DeliveryFailure {
                        recipient: recipient.email.clone(),
                        sender: sender.email.clone(),
                        error: format!("{:#}", e),
                    };
                    error!(
                        recipient = %failure.recipient,
                        sender = %failure.sender,
                        error = %failure.error,
                        "Delivery failed"
                    );
                    report.failures.push(failure);
                }
            }
        }
    }

    info!(
        sent = report.sent,
        failed = report.failures.len(),
        deferred = report.deferred,
        "Activation finished"
    );
    Ok(report)
}

async fn deliver<S: Storage, M: Mailer>(
    storage: &Arc<S>,
    mailer: &M,
    sender: &SenderAccount,
    campaign: &Campaign,
    attachment: Option<&Path>,
    recipient: &Recipient,
) -> anyhow::Result<()> {
    let body = campaign.render_body(&recipient.email);
    mailer
        .send_email(sender, &recipient.email, &campaign.subject, &body, attachment)
        .await?;
    storage.mark_sent(recipient.id, Utc::now()).await?;
    Ok(())
}
