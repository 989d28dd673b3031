use std::sync::Arc;

use sms_dispatcher::{Dispatcher, FailureLedger, Recipient, SmsConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sms_dispatcher=debug")),
        )
        .init();

    let config = SmsConfig::from_env()?;
    let dispatcher = Dispatcher::new(&config, Arc::new(FailureLedger::new()))?;

    let recipients = vec![
        Recipient::new("Kim", "010-1111-2222"),
        Recipient::new("Lee", "01011112222"),
        Recipient::new("Park", "010-3333-4444"),
    ];

    let summary = dispatcher
        .send(recipients, "The retreat fee is due this Friday.", "")
        .await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
