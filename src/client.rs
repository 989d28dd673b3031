//! Sends one batch, or simulates it, and maps the result to outcomes.

use std::sync::Arc;

use crate::gateway::{Gateway, MessageType, OutboundMessage, SendManyRequest};
use crate::signing::AuthHeader;
use crate::types::{DispatchOutcome, DispatchStatus, Recipient};

#[cfg(feature = "metrics")]
fn metric_add(name: &'static str, value: u64) {
    metrics::counter!(name, value);
}

#[cfg(not(feature = "metrics"))]
fn metric_add(_name: &'static str, _value: u64) {}

/// Credentials the client signs with.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub sender: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

/// Per-batch dispatcher.
///
/// The gateway does not report per-recipient results for `send-many`, so
/// a batch succeeds or fails as a whole: one bad number can fail the
/// other 999 recipients sharing its batch.
#[derive(Clone)]
pub struct DispatchClient {
    dry_run: bool,
    credentials: Credentials,
    gateway: Arc<dyn Gateway>,
}

impl DispatchClient {
    pub fn new(dry_run: bool, credentials: Credentials, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            dry_run,
            credentials,
            gateway,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Dispatch one batch. Always returns exactly one outcome per recipient,
    /// in batch order.
    pub async fn dispatch_batch(
        &self,
        batch: &[Recipient],
        message: &str,
        subject: &str,
    ) -> Vec<DispatchOutcome> {
        if self.dry_run {
            metric_add("sms.dispatch.dry_run", batch.len() as u64);
            return batch
                .iter()
                .map(|recipient| {
                    tracing::debug!(
                        recipient = %recipient.name,
                        phone = %recipient.phone,
                        "dry run"
                    );
                    DispatchOutcome::new(
                        recipient,
                        DispatchStatus::DryRun,
                        Some("dry run".to_string()),
                    )
                })
                .collect();
        }

        let request = self.build_request(batch, message, subject);
        let auth = AuthHeader::sign(&self.credentials.api_key, &self.credentials.api_secret);

        match self.gateway.send_many(&request, &auth).await {
            Ok(response) => {
                let group = response.group_info.unwrap_or_default();
                let count = group.count.unwrap_or_default();
                tracing::info!(
                    recipients = batch.len(),
                    group_id = group
                        .group_id
                        .as_deref()
                        .or(group.id.as_deref())
                        .unwrap_or("-"),
                    total = count.total,
                    registered_success = count.registered_success,
                    registered_failed = count.registered_failed,
                    "gateway accepted batch"
                );
                if count.registered_failed > 0 {
                    tracing::warn!(
                        registered_failed = count.registered_failed,
                        "gateway reported rejected messages; per-recipient status is not available"
                    );
                }
                metric_add("sms.dispatch.success", batch.len() as u64);
                batch
                    .iter()
                    .map(|recipient| DispatchOutcome::new(recipient, DispatchStatus::Success, None))
                    .collect()
            }
            Err(err) => {
                tracing::error!(recipients = batch.len(), error = %err, "batch dispatch failed");
                metric_add("sms.dispatch.failure", batch.len() as u64);
                let detail = err.to_string();
                batch
                    .iter()
                    .map(|recipient| {
                        DispatchOutcome::new(recipient, DispatchStatus::Fail, Some(detail.clone()))
                    })
                    .collect()
            }
        }
    }

    fn build_request(&self, batch: &[Recipient], message: &str, subject: &str) -> SendManyRequest {
        SendManyRequest {
            messages: batch
                .iter()
                .map(|recipient| OutboundMessage {
                    to: recipient.phone.clone(),
                    from: self.credentials.sender.clone(),
                    text: message.to_string(),
                    message_type: MessageType::Lms,
                    subject: subject.to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::SendManyResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(SendManyRequest, AuthHeader)>>,
        fail: bool,
    }

    #[async_trait]
    impl Gateway for Recording {
        async fn send_many(
            &self,
            request: &SendManyRequest,
            auth: &AuthHeader,
        ) -> Result<SendManyResponse, GatewayError> {
            self.calls.lock().unwrap().push((request.clone(), auth.clone()));
            if self.fail {
                Err(GatewayError::Status { status: 500, body: "down".into() })
            } else {
                Ok(SendManyResponse::default())
            }
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            api_key: "key".into(),
            api_secret: "secret".into(),
            sender: "0212345678".into(),
        }
    }

    fn batch() -> Vec<Recipient> {
        vec![Recipient::new("A", "01011112222"), Recipient::new("C", "01033334444")]
    }

    #[tokio::test]
    async fn dry_run_never_touches_gateway() {
        let gateway = Arc::new(Recording::default());
        let client = DispatchClient::new(true, credentials(), gateway.clone());

        let outcomes = client.dispatch_batch(&batch(), "hi", "subj").await;

        assert!(outcomes.iter().all(|o| o.status == DispatchStatus::DryRun));
        assert!(gateway.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_batch_is_one_signed_call() {
        let gateway = Arc::new(Recording::default());
        let client = DispatchClient::new(false, credentials(), gateway.clone());

        let outcomes = client.dispatch_batch(&batch(), "hi", "subj").await;
        assert!(outcomes.iter().all(|o| o.status == DispatchStatus::Success));

        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (request, auth) = &calls[0];
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].to, "01033334444");
        assert_eq!(request.messages[0].from, "0212345678");
        assert_eq!(auth.api_key, "key");
        assert!(crate::signing::verify_signature(
            b"secret",
            &auth.date,
            &auth.salt,
            &auth.signature
        ));
    }

    #[tokio::test]
    async fn failure_marks_whole_batch() {
        let gateway = Arc::new(Recording { fail: true, ..Default::default() });
        let client = DispatchClient::new(false, credentials(), gateway);

        let outcomes = client.dispatch_batch(&batch(), "hi", "subj").await;

        assert_eq!(outcomes.len(), 2);
        for outcome in &outcomes {
            assert_eq!(outcome.status, DispatchStatus::Fail);
            assert_eq!(outcome.detail.as_deref(), Some("gateway returned 500: down"));
        }
    }
}
