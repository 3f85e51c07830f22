//! Server-to-server transfer choreography
//!
//! Drives the source and destination control channels through the fixed
//! nine-step FXP sequence. The payload flows directly between the two
//! servers over the rendezvous set up in the first two steps; this
//! process only exchanges control-channel text and never sees the file
//! bytes.

use std::time::{Duration, Instant};

use log::{info, warn};
use serde::Serialize;

use crate::client::ControlChannel;
use crate::error::{ClientError, ClientResult};
use crate::transfer::passive::enter_passive;

/// Named steps of the transfer sequence, in protocol order.
///
/// Each step gates on one reply code; a mismatch aborts the sequence and
/// the error carries the step name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    PassiveSource,
    PortAck,
    SourceCwd,
    DestCwd,
    StorReady,
    RetrReady,
    SourceComplete,
    DestComplete,
}

impl TransferStep {
    pub fn name(self) -> &'static str {
        match self {
            TransferStep::PassiveSource => "passive-mode",
            TransferStep::PortAck => "port-ack",
            TransferStep::SourceCwd => "source-cwd",
            TransferStep::DestCwd => "dest-cwd",
            TransferStep::StorReady => "stor-ready",
            TransferStep::RetrReady => "retr-ready",
            TransferStep::SourceComplete => "source-complete",
            TransferStep::DestComplete => "dest-complete",
        }
    }

    pub fn expected_code(self) -> u16 {
        match self {
            TransferStep::PassiveSource => 227,
            TransferStep::PortAck => 200,
            TransferStep::SourceCwd | TransferStep::DestCwd => 250,
            TransferStep::StorReady | TransferStep::RetrReady => 150,
            TransferStep::SourceComplete | TransferStep::DestComplete => 226,
        }
    }
}

/// Result of one completed transfer.
///
/// Throughput is derived from the caller's size hint and whole-second
/// wall clock. A transfer that finishes inside the first second reports
/// the hint itself: the divisor is clamped to one second rather than
/// risking a divide-by-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub bytes_per_second: u64,
    pub elapsed_secs: u64,
}

impl TransferOutcome {
    fn from_hint(file_size_hint: u64, elapsed: Duration) -> Self {
        let elapsed_secs = elapsed.as_secs();
        Self {
            bytes_per_second: file_size_hint / elapsed_secs.max(1),
            elapsed_secs,
        }
    }
}

/// Run one server-to-server transfer.
///
/// Fail-fast: the first reply that misses its gate code aborts the
/// sequence, no later step is attempted, and the error names the failing
/// step. There is no compensating rollback — a failure after STOR was
/// accepted can leave a partial file on the destination.
#[allow(clippy::too_many_arguments)]
pub async fn transfer(
    source: &mut ControlChannel,
    destination: &mut ControlChannel,
    source_path: &str,
    dest_path: &str,
    file_name: &str,
    file_size_hint: u64,
    secure: bool,
) -> ClientResult<TransferOutcome> {
    info!(
        "fxp {} -> {}: {}/{} ({} byte hint)",
        source.site(),
        destination.site(),
        source_path,
        file_name,
        file_size_hint
    );

    // Steps 1-2: rendezvous. The source listens; its token is relayed to
    // the destination verbatim.
    let token = enter_passive(source, secure).await?;
    gate(destination, TransferStep::PortAck, &format!("PORT {}", token)).await?;

    // Steps 3-4: position both sessions.
    source
        .change_directory(source_path)
        .await
        .map_err(|e| e.with_step(TransferStep::SourceCwd.name()))?;
    destination
        .change_directory(dest_path)
        .await
        .map_err(|e| e.with_step(TransferStep::DestCwd.name()))?;

    // Step 5: destination opens for writing.
    gate(
        destination,
        TransferStep::StorReady,
        &format!("STOR {}", file_name),
    )
    .await?;

    // Step 6: source starts sending; the clock starts with RETR.
    source.send(&format!("RETR {}", file_name)).await?;
    let started = Instant::now();
    expect_reply(source, TransferStep::RetrReady).await?;

    // Steps 7-8: both servers report completion on their own channels.
    expect_reply(source, TransferStep::SourceComplete).await?;
    expect_reply(destination, TransferStep::DestComplete).await?;

    let outcome = TransferOutcome::from_hint(file_size_hint, started.elapsed());
    info!(
        "fxp complete: {} in {}s ({} B/s)",
        file_name, outcome.elapsed_secs, outcome.bytes_per_second
    );
    Ok(outcome)
}

/// Send the step's command and gate on its expected code.
async fn gate(
    channel: &mut ControlChannel,
    step: TransferStep,
    command: &str,
) -> ClientResult<()> {
    channel.send(command).await?;
    expect_reply(channel, step).await
}

/// Gate the next reply on the step's expected code.
async fn expect_reply(channel: &mut ControlChannel, step: TransferStep) -> ClientResult<()> {
    let response = channel.receive().await?;
    let actual = response.code()?;
    let expected = step.expected_code();
    if actual != expected {
        warn!(
            "fxp aborted at {}: expected {}, got {}",
            step.name(),
            expected,
            actual
        );
        return Err(ClientError::Protocol {
            step: step.name(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_divides_hint_by_whole_seconds() {
        let outcome = TransferOutcome::from_hint(1_000_000, Duration::from_secs(10));
        assert_eq!(outcome.bytes_per_second, 100_000);
        assert_eq!(outcome.elapsed_secs, 10);
    }

    #[test]
    fn sub_second_transfer_clamps_the_divisor() {
        let outcome = TransferOutcome::from_hint(5_000, Duration::from_millis(20));
        assert_eq!(outcome.bytes_per_second, 5_000);
        assert_eq!(outcome.elapsed_secs, 0);
    }

    #[test]
    fn steps_gate_on_their_protocol_codes() {
        assert_eq!(TransferStep::PortAck.expected_code(), 200);
        assert_eq!(TransferStep::SourceCwd.expected_code(), 250);
        assert_eq!(TransferStep::StorReady.expected_code(), 150);
        assert_eq!(TransferStep::DestComplete.expected_code(), 226);
        assert_eq!(TransferStep::PortAck.name(), "port-ack");
        assert_eq!(TransferStep::SourceComplete.name(), "source-complete");
    }
}
