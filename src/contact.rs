//! Contact canonicalization and deduplication.

use std::collections::HashSet;

use crate::types::{DispatchOutcome, DispatchStatus, Recipient};

/// Strip everything but ASCII digits, keeping their order.
///
/// Returns an empty string when the input has no digits; callers must
/// reject such contacts.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize every phone and split off recipients that cannot be sent to.
///
/// Rejected recipients come back as `Skipped` outcomes carrying their
/// original phone text.
pub fn normalize_all(recipients: Vec<Recipient>) -> (Vec<Recipient>, Vec<DispatchOutcome>) {
    let mut accepted = Vec::with_capacity(recipients.len());
    let mut rejected = Vec::new();

    for recipient in recipients {
        let phone = normalize_phone(&recipient.phone);
        if recipient.name.trim().is_empty() {
            rejected.push(DispatchOutcome::new(
                &recipient,
                DispatchStatus::Skipped,
                Some("missing name".to_string()),
            ));
        } else if phone.is_empty() {
            rejected.push(DispatchOutcome::new(
                &recipient,
                DispatchStatus::Skipped,
                Some("missing phone number".to_string()),
            ));
        } else {
            accepted.push(Recipient { phone, ..recipient });
        }
    }

    (accepted, rejected)
}

/// Output of [`dedup_by_phone`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduplicated {
    pub recipients: Vec<Recipient>,
    pub removed: usize,
}

/// Keep the first recipient per phone number; later ones are dropped even
/// when the name differs.
pub fn dedup_by_phone(recipients: Vec<Recipient>) -> Deduplicated {
    let before = recipients.len();
    let mut seen = HashSet::with_capacity(before);
    let recipients: Vec<Recipient> = recipients
        .into_iter()
        .filter(|r| seen.insert(r.phone.clone()))
        .collect();

    let removed = before - recipients.len();
    if removed > 0 {
        tracing::info!(removed, remaining = recipients.len(), "removed duplicate phone numbers");
    }

    Deduplicated { recipients, removed }
}
