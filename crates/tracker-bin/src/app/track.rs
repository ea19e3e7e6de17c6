//! `stream-tracker track`: feed newline-delimited JSON into a running tracker.

use std::path::PathBuf;
use std::sync::Arc;

use delivery_transport::{HttpTransport, ScriptedTransport};
use event_tracker::{Tracker, TrackerError, Transport};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracker_config_and_utils::{Config, Paths};

use super::signals::termination_signal;
use crate::dead_letter::DeadLetterFile;

/// Options for the `track` command.
pub struct TrackOptions {
    pub stream: String,
    /// Read events from this file instead of stdin.
    pub file: Option<PathBuf>,
    /// Accept every batch locally instead of contacting the collector.
    pub dry_run: bool,
}

/// Per-run input accounting.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackSummary {
    /// Lines read, including blank and rejected ones.
    pub lines: usize,
    pub tracked: usize,
    /// Unparseable lines and events refused by validation.
    pub rejected: usize,
    pub timed_out: usize,
    /// Input stopped early because the tracker left the running state.
    pub interrupted: bool,
}

/// Run the track command until EOF or a termination signal, then drain.
pub async fn run_track(
    config: &Config,
    paths: &Paths,
    opts: TrackOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    paths.ensure_dirs()?;

    let dry_run = opts
        .dry_run
        .then(|| Arc::new(ScriptedTransport::<Value>::succeeding()));
    let transport: Arc<dyn Transport<Value>> = match &dry_run {
        Some(scripted) => scripted.clone(),
        None => Arc::new(HttpTransport::new(config.transport_config()?)?),
    };

    let dead_letters = Arc::new(DeadLetterFile::new(paths.dead_letter_file()));
    let tracker: Tracker<Value> = Tracker::builder(transport)
        .config(config.tracker.clone())
        .observer(dead_letters.clone())
        .build();
    tracker.start();
    let trigger = tracker.shutdown_trigger();

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match &opts.file {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    info!(
        stream = %opts.stream,
        source = %opts.file.as_ref().map_or("stdin".into(), |p| p.display().to_string()),
        dry_run = opts.dry_run,
        "Tracking events"
    );

    let mut summary = TrackSummary::default();
    let signal = tokio::select! {
        result = pump(&tracker, &opts.stream, input, &mut summary) => {
            result?;
            None
        }
        signal = termination_signal() => Some(signal),
    };

    match signal {
        Some(signal) => {
            info!(signal, "Received termination signal, draining tracker");
            trigger.fire().await;
        }
        None => tracker.stop().await,
    }

    println!(
        "Tracked {} events on stream {} ({} rejected, {} timed out)",
        summary.tracked, opts.stream, summary.rejected, summary.timed_out
    );
    if summary.interrupted {
        println!("Input closed early: tracker stopped");
    }
    if dead_letters.path().exists() {
        println!(
            "Dead-letter file: {} (run `stream-tracker replay` to re-send)",
            dead_letters.path().display()
        );
    }
    if let Some(scripted) = dry_run {
        println!("Dry run: {} batches accepted locally", scripted.calls());
    }
    Ok(())
}

/// Parse each non-blank line as JSON and track it on `stream`.
///
/// Returns at EOF or once the tracker stops accepting events.
pub async fn pump<R>(
    tracker: &Tracker<Value>,
    stream: &str,
    reader: R,
    summary: &mut TrackSummary,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        summary.lines += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: Value = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = summary.lines, error = %e, "Skipping malformed event");
                summary.rejected += 1;
                continue;
            }
        };

        match tracker.track(stream, event).await {
            Ok(()) => summary.tracked += 1,
            Err(TrackerError::NotRunning(state)) => {
                info!(%state, "Tracker stopped accepting events, closing input");
                summary.interrupted = true;
                break;
            }
            Err(e @ TrackerError::TrackingTimeout { .. }) => {
                warn!(line = summary.lines, error = %e, "Event dropped");
                summary.timed_out += 1;
            }
            Err(e) => {
                warn!(line = summary.lines, error = %e, "Event rejected");
                summary.rejected += 1;
            }
        }
    }

    Ok(())
}
