//! Stop signals from the outer scheduler and terminal status folding

use std::fmt;

use tokio::sync::watch;

/// Why the scheduler asked a stage to stop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopSignalType {
    #[default]
    None,
    Cancel,
    Timeout,
    /// The agent is shutting down
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    NotStartedYet,
    Running,
    Success,
    Failure,
    Cancelled,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::NotStartedYet => "NOT_STARTED_YET",
            StageStatus::Running => "RUNNING",
            StageStatus::Success => "SUCCESS",
            StageStatus::Failure => "FAILURE",
            StageStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combine a computed status with the stop signal
///
/// The stop signal wins over whatever the stage computed: a terminated agent
/// keeps the stage's previous status so it can be resumed, a cancelled one
/// is `Cancelled` and a timed out one is `Failure`.
pub fn determine_stage_status(
    signal: StopSignalType,
    original: StageStatus,
    got: StageStatus,
) -> StageStatus {
    match signal {
        StopSignalType::None => got,
        StopSignalType::Terminate => original,
        StopSignalType::Cancel => StageStatus::Cancelled,
        StopSignalType::Timeout => StageStatus::Failure,
    }
}

/// Read side handed to stage executions
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<StopSignalType>,
}

/// Write side kept by the scheduler
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<StopSignalType>,
}

/// Create a connected handle and signal
pub fn stop_signal() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(StopSignalType::None);
    (StopHandle { tx }, StopSignal { rx })
}

impl StopSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_, rx) = watch::channel(StopSignalType::None);
        Self { rx }
    }

    pub fn signal(&self) -> StopSignalType {
        *self.rx.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.signal() != StopSignalType::None
    }

    /// Resolve once a stop is requested
    ///
    /// Pends forever when the handle is dropped without stopping.
    pub async fn stopped(&self) -> StopSignalType {
        let mut rx = self.rx.clone();
        let signal = rx
            .wait_for(|s| *s != StopSignalType::None)
            .await
            .map(|s| *s);
        match signal {
            Ok(signal) => signal,
            Err(_) => std::future::pending().await,
        }
    }
}

impl StopHandle {
    pub fn cancel(&self) {
        self.send(StopSignalType::Cancel);
    }

    pub fn timeout(&self) {
        self.send(StopSignalType::Timeout);
    }

    pub fn terminate(&self) {
        self.send(StopSignalType::Terminate);
    }

    /// First stop wins
    fn send(&self, signal: StopSignalType) {
        self.tx.send_if_modified(|current| {
            if *current == StopSignalType::None {
                *current = signal;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determine_stage_status() {
        use StageStatus::*;

        assert_eq!(determine_stage_status(StopSignalType::None, Running, Success), Success);
        assert_eq!(determine_stage_status(StopSignalType::None, Running, Failure), Failure);
        assert_eq!(
            determine_stage_status(StopSignalType::Terminate, NotStartedYet, Success),
            NotStartedYet
        );
        assert_eq!(determine_stage_status(StopSignalType::Cancel, Running, Success), Cancelled);
        assert_eq!(determine_stage_status(StopSignalType::Timeout, Running, Success), Failure);
    }

    #[test]
    fn test_first_stop_wins() {
        let (handle, signal) = stop_signal();
        assert!(!signal.is_stopped());

        handle.timeout();
        handle.cancel();
        assert_eq!(signal.signal(), StopSignalType::Timeout);
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_never() {
        assert_eq!(StopSignal::never().signal(), StopSignalType::None);
    }

    #[tokio::test]
    async fn test_stopped_resolves() {
        let (handle, signal) = stop_signal();
        let waiter = tokio::spawn(async move { signal.stopped().await });

        handle.cancel();
        assert_eq!(waiter.await.unwrap(), StopSignalType::Cancel);
    }
}
