//! A single-process bulk SMS dispatch pipeline.
//!
//! Recipients are normalized, deduplicated by phone number, split into
//! bounded batches and sent through an HMAC-authenticated `send-many`
//! gateway with a pause between batches. Failed recipients land in an
//! in-memory ledger that can be inspected, cleared or retried.
//!
//! ## Guarantees
//! - Exactly one dispatch attempt per unique phone number per invocation
//! - Batches never exceed the configured size
//! - A fresh timestamp and salt for every signed request
//! - One outcome per deduplicated recipient, failures included
//! - Dry-run mode never touches the network
//!
//! ## Non-Guarantees
//! - Exactly-once delivery at the gateway
//! - Per-recipient status within a batch (a batch succeeds or fails whole)
//! - Durability of the failure ledger across restarts
//! - Automatic retries
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sms_dispatcher::{Dispatcher, FailureLedger, Recipient, SmsConfig};
//!
//! let config = SmsConfig::from_env()?;
//! let dispatcher = Dispatcher::new(&config, Arc::new(FailureLedger::new()))?;
//!
//! let summary = dispatcher
//!     .send(vec![Recipient::new("Kim", "010-1234-5678")], "Fee is due Friday", "")
//!     .await?;
//! if summary.fail_count > 0 {
//!     dispatcher.retry("Fee is due Friday", "").await?;
//! }
//! ```

mod client;
mod config;
mod contact;
mod dispatcher;
mod error;
mod gateway;
mod ledger;
mod scheduler;
mod signing;
mod types;

pub use client::{Credentials, DispatchClient};
pub use config::{DispatcherConfig, GatewayConfig, SmsConfig, DEFAULT_BASE_URL};
pub use contact::{dedup_by_phone, normalize_all, normalize_phone, Deduplicated};
pub use dispatcher::{Dispatcher, DEFAULT_SUBJECT};
pub use error::{ConfigError, DispatchError, GatewayError};
pub use gateway::{
    Disconnected, Gateway, GroupCount, GroupInfo, HttpGateway, MessageType, OutboundMessage,
    SendManyRequest, SendManyResponse, SEND_MANY_PATH,
};
pub use ledger::FailureLedger;
pub use scheduler::{batch_count, batches, FixedDelay, Pacer, TokenBucket, TokenBucketPacer};
pub use signing::{
    compute_signature, is_date_fresh, parse_auth_header, verify_auth_header, verify_signature,
    AuthHeader, VerificationError,
};
pub use types::{DispatchOutcome, DispatchStatus, DispatchSummary, FailedRecord, Recipient};
