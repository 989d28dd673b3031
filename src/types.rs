use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A person to notify.
///
/// `phone` may hold separators until it passes through
/// [`normalize_phone`](crate::contact::normalize_phone); every recipient
/// handed to the batch scheduler carries digits only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub phone: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
        }
    }
}

/// Result of one dispatch attempt for one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchStatus {
    /// The gateway accepted the batch containing this recipient.
    Success,

    /// The batch containing this recipient failed.
    Fail,

    /// Dry-run mode; nothing left the process.
    DryRun,

    /// Never attempted: invalid contact data or cancelled before its batch.
    Skipped,
}

impl std::fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchStatus::Success => write!(f, "success"),
            DispatchStatus::Fail => write!(f, "fail"),
            DispatchStatus::DryRun => write!(f, "dry_run"),
            DispatchStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Per-recipient outcome. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub name: String,
    pub phone: String,
    pub status: DispatchStatus,
    pub detail: Option<String>,
}

impl DispatchOutcome {
    pub fn new(recipient: &Recipient, status: DispatchStatus, detail: Option<String>) -> Self {
        Self {
            name: recipient.name.clone(),
            phone: recipient.phone.clone(),
            status,
            detail,
        }
    }

    /// Counts toward `success_count`.
    pub fn is_success(&self) -> bool {
        matches!(self.status, DispatchStatus::Success | DispatchStatus::DryRun)
    }

    pub fn is_failure(&self) -> bool {
        self.status == DispatchStatus::Fail
    }

    pub fn recipient(&self) -> Recipient {
        Recipient::new(self.name.clone(), self.phone.clone())
    }
}

/// Aggregate result of one `send` or `retry` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Number of deduplicated recipients.
    pub total_targets: usize,

    /// `Success` and `DryRun` outcomes.
    pub success_count: usize,

    /// `Fail` outcomes.
    pub fail_count: usize,

    /// True iff any outcome is `DryRun`.
    pub dry_run: bool,

    /// One entry per deduplicated recipient, in dispatch order.
    pub outcomes: Vec<DispatchOutcome>,

    /// Recipients rejected before batching (blank name or phone).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<DispatchOutcome>,

    pub info: Option<String>,
}

impl DispatchSummary {
    /// Summary for an invocation that had nothing to send.
    pub fn empty(dry_run: bool, info: impl Into<String>) -> Self {
        Self {
            total_targets: 0,
            success_count: 0,
            fail_count: 0,
            dry_run,
            outcomes: Vec::new(),
            skipped: Vec::new(),
            info: Some(info.into()),
        }
    }

    pub fn from_outcomes(outcomes: Vec<DispatchOutcome>) -> Self {
        let success_count = outcomes.iter().filter(|o| o.is_success()).count();
        let fail_count = outcomes.iter().filter(|o| o.is_failure()).count();
        let dry_run = outcomes.iter().any(|o| o.status == DispatchStatus::DryRun);

        Self {
            total_targets: outcomes.len(),
            success_count,
            fail_count,
            dry_run,
            outcomes,
            skipped: Vec::new(),
            info: None,
        }
    }

    pub fn with_skipped(mut self, skipped: Vec<DispatchOutcome>) -> Self {
        self.skipped = skipped;
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Outcomes with status `Fail`, as ledger records stamped now.
    pub fn failed_records(&self) -> Vec<FailedRecord> {
        let failed_at = Utc::now();
        self.outcomes
            .iter()
            .filter(|o| o.is_failure())
            .map(|o| FailedRecord {
                recipient: o.recipient(),
                error_message: o.detail.clone(),
                failed_at,
            })
            .collect()
    }
}

/// Failure ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub recipient: Recipient,
    pub error_message: Option<String>,
    pub failed_at: DateTime<Utc>,
}

impl FailedRecord {
    pub fn new(recipient: Recipient, error_message: Option<String>) -> Self {
        Self {
            recipient,
            error_message,
            failed_at: Utc::now(),
        }
    }

    pub fn error_or_unknown(&self) -> &str {
        self.error_message.as_deref().unwrap_or("unknown")
    }
}
