use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::{Credentials, DispatchClient};
use crate::config::{DispatcherConfig, SmsConfig};
use crate::contact::{dedup_by_phone, normalize_all, normalize_phone, Deduplicated};
use crate::error::DispatchError;
use crate::gateway::{Disconnected, Gateway, HttpGateway};
use crate::ledger::FailureLedger;
use crate::scheduler::{batch_count, batches, FixedDelay, Pacer, TokenBucketPacer};
use crate::types::{DispatchOutcome, DispatchStatus, DispatchSummary, FailedRecord, Recipient};

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

/// Subject used when the caller leaves it blank.
pub const DEFAULT_SUBJECT: &str = "[수련회비 납부안내]";

const TEST_RECIPIENT_NAME: &str = "테스트";
const DEFAULT_TEST_MESSAGE: &str = "테스트 문자입니다";

/// End-to-end bulk dispatch: normalize, dedupe, batch, send, record failures.
///
/// Cheap to clone; clones share the same failure ledger. Concurrent
/// invocations are independent apart from that ledger.
#[derive(Clone)]
pub struct Dispatcher {
    config: DispatcherConfig,
    client: DispatchClient,
    pacer: Arc<dyn Pacer>,
    ledger: Arc<FailureLedger>,
}

impl Dispatcher {
    /// Build a dispatcher talking to the configured HTTP gateway.
    ///
    /// In dry-run mode missing credentials are tolerated; live mode fails
    /// fast on them.
    pub fn new(config: &SmsConfig, ledger: Arc<FailureLedger>) -> Result<Self, DispatchError> {
        config.dispatcher.validate()?;

        let gateway: Arc<dyn Gateway> = match HttpGateway::new(&config.gateway) {
            Ok(gateway) => Arc::new(gateway),
            Err(err) if config.dispatcher.dry_run => {
                tracing::warn!(error = %err, "gateway not configured; dry-run only");
                Arc::new(Disconnected)
            }
            Err(err) => return Err(err.into()),
        };

        let credentials = Credentials {
            api_key: config.gateway.api_key.clone(),
            api_secret: config.gateway.api_secret.clone(),
            sender: config.gateway.sender.clone(),
        };

        Ok(Self::with_gateway(config.dispatcher.clone(), credentials, gateway, ledger))
    }

    /// Build a dispatcher over any gateway implementation.
    pub fn with_gateway(
        config: DispatcherConfig,
        credentials: Credentials,
        gateway: Arc<dyn Gateway>,
        ledger: Arc<FailureLedger>,
    ) -> Self {
        let pacer: Arc<dyn Pacer> = match config.rate_limit {
            Some((max_rps, burst)) => Arc::new(TokenBucketPacer::new(max_rps, burst)),
            None => Arc::new(FixedDelay::new(config.batch_delay)),
        };

        Self {
            client: DispatchClient::new(config.dry_run, credentials, gateway),
            config,
            pacer,
            ledger,
        }
    }

    /// Replace the inter-batch pacer.
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<FailureLedger> {
        &self.ledger
    }

    /// Send `message` to every unique, valid recipient.
    pub async fn send(
        &self,
        recipients: Vec<Recipient>,
        message: &str,
        subject: &str,
    ) -> Result<DispatchSummary, DispatchError> {
        self.send_with_cancel(recipients, message, subject, &CancellationToken::new())
            .await
    }

    /// Like [`send`](Self::send), stopping between batches once `cancel`
    /// fires. A batch already in flight always completes; recipients of
    /// batches never started come back as `Skipped`.
    pub async fn send_with_cancel(
        &self,
        recipients: Vec<Recipient>,
        message: &str,
        subject: &str,
        cancel: &CancellationToken,
    ) -> Result<DispatchSummary, DispatchError> {
        if recipients.is_empty() {
            return Ok(DispatchSummary::empty(true, "no recipients to send to"));
        }
        validate_message(message)?;

        self.run(recipients, message, subject_or_default(subject), cancel)
            .await
    }

    /// Resend to every recipient in the failure ledger.
    ///
    /// The ledger is cleared before sending; recipients that fail again are
    /// recorded anew.
    pub async fn retry(
        &self,
        message: &str,
        subject: &str,
    ) -> Result<DispatchSummary, DispatchError> {
        if self.ledger.count().await == 0 {
            return Ok(DispatchSummary::empty(false, "no failed dispatches to retry"));
        }
        validate_message(message)?;

        let targets = self.ledger.drain_targets().await;
        if targets.is_empty() {
            return Ok(DispatchSummary::empty(false, "no failed dispatches to retry"));
        }

        tracing::info!(targets = targets.len(), "retrying failed dispatches");
        self.run(targets, message, subject_or_default(subject), &CancellationToken::new())
            .await
    }

    pub async fn list_failed(&self) -> Vec<FailedRecord> {
        self.ledger.get_all().await
    }

    /// Empty the failure ledger, returning how many records were removed.
    pub async fn clear_failed(&self) -> usize {
        self.ledger.clear().await
    }

    /// Send a single message to one number, e.g. the operator's own phone.
    ///
    /// Bypasses deduplication and never touches the failure ledger.
    pub async fn send_test(
        &self,
        phone: &str,
        message: &str,
        subject: &str,
    ) -> Result<DispatchSummary, DispatchError> {
        let phone = normalize_phone(phone);
        if phone.is_empty() {
            return Err(DispatchError::Validation("phone is required".to_string()));
        }
        let message = if message.trim().is_empty() {
            DEFAULT_TEST_MESSAGE
        } else {
            message
        };

        let recipient = Recipient::new(TEST_RECIPIENT_NAME, phone);
        let outcomes = self
            .client
            .dispatch_batch(std::slice::from_ref(&recipient), message, subject_or_default(subject))
            .await;
        Ok(DispatchSummary::from_outcomes(outcomes))
    }

    async fn run(
        &self,
        recipients: Vec<Recipient>,
        message: &str,
        subject: &str,
        cancel: &CancellationToken,
    ) -> Result<DispatchSummary, DispatchError> {
        let mut notes = Vec::new();

        let (accepted, skipped) = normalize_all(recipients);
        if !skipped.is_empty() {
            tracing::warn!(skipped = skipped.len(), "skipping recipients without a name or phone");
            notes.push(format!(
                "{} recipients without a name or phone were skipped",
                skipped.len()
            ));
        }

        let Deduplicated { recipients, removed } = dedup_by_phone(accepted);
        if removed > 0 {
            notes.push(format!("{removed} duplicate phone numbers removed"));
        }

        let max_batch_size = self.config.max_batch_size;
        let total_batches = batch_count(recipients.len(), max_batch_size);
        tracing::info!(
            recipients = recipients.len(),
            batches = total_batches,
            subject,
            message_bytes = message.len(),
            dry_run = self.client.is_dry_run(),
            "starting dispatch"
        );

        let mut outcomes: Vec<DispatchOutcome> = Vec::with_capacity(recipients.len());
        for (index, batch) in batches(&recipients, max_batch_size).enumerate() {
            if index > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = self.pacer.pause() => {}
                }
            }

            if cancel.is_cancelled() {
                let remaining = &recipients[outcomes.len()..];
                tracing::warn!(
                    sent_batches = index,
                    remaining = remaining.len(),
                    "dispatch cancelled"
                );
                notes.push(format!("cancelled; {} recipients not attempted", remaining.len()));
                outcomes.extend(remaining.iter().map(|r| {
                    DispatchOutcome::new(r, DispatchStatus::Skipped, Some("cancelled".to_string()))
                }));
                break;
            }

            tracing::info!(
                batch = index + 1,
                total = total_batches,
                size = batch.len(),
                "dispatching batch"
            );
            metric_inc("sms.dispatch.batches");
            outcomes.extend(self.client.dispatch_batch(batch, message, subject).await);
        }

        let mut summary = DispatchSummary::from_outcomes(outcomes).with_skipped(skipped);
        if !notes.is_empty() {
            summary = summary.with_info(notes.join("; "));
        }

        let failed = summary.failed_records();
        if !failed.is_empty() {
            tracing::warn!(failed = failed.len(), "failed dispatches kept for retry");
            self.ledger.add_all(failed).await;
        }

        tracing::info!(
            total = summary.total_targets,
            success = summary.success_count,
            fail = summary.fail_count,
            "dispatch finished"
        );
        Ok(summary)
    }
}

fn validate_message(message: &str) -> Result<(), DispatchError> {
    if message.trim().is_empty() {
        return Err(DispatchError::Validation("message is required".to_string()));
    }
    Ok(())
}

fn subject_or_default(subject: &str) -> &str {
    if subject.trim().is_empty() {
        DEFAULT_SUBJECT
    } else {
        subject
    }
}
