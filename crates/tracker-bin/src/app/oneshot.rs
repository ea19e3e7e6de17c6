//! Unbuffered commands: `put` and `health`.

use delivery_transport::{HttpTransport, Method};
use serde_json::Value;
use tracing::debug;
use tracker_config_and_utils::Config;

/// Send a single event straight to the collector.
pub async fn run_put(
    config: &Config,
    stream: &str,
    data: &str,
    get: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let event: Value = serde_json::from_str(data)?;
    let method = if get { Method::Get } else { Method::Post };
    let transport = HttpTransport::new(config.transport_config()?)?;

    debug!(stream, ?method, "Sending single event");
    let response = transport.put_event(stream, &event, method).await?;
    println!("{} {}", response.status, response.message);
    Ok(())
}

/// Probe the collector. Errors when it is down so the process exits non-zero.
pub async fn run_health(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let transport = HttpTransport::new(config.transport_config()?)?;
    let response = transport.health().await?;
    println!("{}: {}", config.endpoint, response.message);
    Ok(())
}
