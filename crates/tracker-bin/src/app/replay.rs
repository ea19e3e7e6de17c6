//! `stream-tracker replay`: re-send dead-lettered batches.

use delivery_transport::HttpTransport;
use event_tracker::{Batch, Transport};
use serde_json::Value;
use tracing::{info, warn};
use tracker_config_and_utils::{Config, Paths};

use crate::dead_letter::{DeadLetter, DeadLetterFile};

/// Outcome of one replay pass.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub delivered: usize,
    /// Batches that failed again, with their records updated.
    pub remaining: Vec<DeadLetter>,
}

pub async fn run_replay(config: &Config, paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let store = DeadLetterFile::new(paths.dead_letter_file());
    let letters = store.read_all()?;
    if letters.is_empty() {
        println!("Nothing to replay");
        return Ok(());
    }

    let transport = HttpTransport::new(config.transport_config()?)?;
    let total = letters.len();
    let report = replay(&transport, letters).await;
    store.rewrite(&report.remaining)?;

    println!(
        "Replayed {} batches: {} delivered, {} still failing",
        total,
        report.delivered,
        report.remaining.len()
    );
    Ok(())
}

/// Send each batch once, in file order.
pub async fn replay<T>(transport: &T, letters: Vec<DeadLetter>) -> ReplayReport
where
    T: Transport<Value>,
{
    let mut report = ReplayReport::default();

    for letter in letters {
        let batch = Batch::new(letter.stream.clone(), letter.data.clone());
        match transport.post(&batch).await {
            Ok(response) => {
                info!(
                    stream = %batch.stream,
                    events = batch.len(),
                    status = response.status,
                    "Replayed batch delivered"
                );
                report.delivered += 1;
            }
            Err(e) => {
                warn!(
                    stream = %batch.stream,
                    events = batch.len(),
                    error = %e,
                    "Replayed batch failed"
                );
                report.remaining.push(letter.failed_again(&e));
            }
        }
    }

    report
}
