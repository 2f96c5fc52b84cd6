use tracing::{info, warn};

use crate::error::{Error, ReceiverError, ReceiverStep};
use crate::receiver::{Receiver, StartMode};

/// 300 cycles is five minutes at the usual 1 Hz epoch rate.
pub const DEFAULT_RESTART_CYCLE_THRESHOLD: u32 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Running,
    Restarting,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Counted(u32),
    Restarted,
}

/// Bounds how long the receiver runs before it is cycled through a hot restart.
///
/// Long continuous runs degrade some receivers, so every completed poll
/// (fresh or stale) counts toward the threshold. A failed restart is terminal.
#[derive(Debug)]
pub struct ReceiverSupervisor {
    threshold: u32,
    cycle_count: u32,
    state: SupervisorState,
}

impl ReceiverSupervisor {
    pub fn new(threshold: u32) -> Self {
        Self { threshold, cycle_count: 0, state: SupervisorState::Running }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_fatal(&self) -> bool {
        self.state == SupervisorState::Fatal
    }

    /// Mark the receiver unrecoverable (bring-up failed).
    pub fn fail(&mut self) {
        self.state = SupervisorState::Fatal;
    }

    pub async fn tick<R: Receiver>(&mut self, receiver: &mut R) -> Result<TickOutcome, Error> {
        if self.state != SupervisorState::Running {
            return Err(Error::Halted);
        }

        self.cycle_count = self.cycle_count.saturating_add(1);
        if self.cycle_count < self.threshold {
            return Ok(TickOutcome::Counted(self.cycle_count));
        }

        self.state = SupervisorState::Restarting;
        info!("supervisor: {} cycles reached, restarting receiver", self.cycle_count);
        match restart_sequence(receiver).await {
            Ok(()) => {
                self.cycle_count = 0;
                self.state = SupervisorState::Running;
                info!("supervisor: receiver restart OK");
                Ok(TickOutcome::Restarted)
            }
            Err((step, source)) => {
                self.state = SupervisorState::Fatal;
                warn!("supervisor: receiver restart failed at {}: {}", step, source);
                Err(Error::ReceiverRestartFailure { step, source })
            }
        }
    }
}

async fn restart_sequence<R: Receiver>(receiver: &mut R) -> Result<(), (ReceiverStep, ReceiverError)> {
    receiver.stop().await.map_err(|e| (ReceiverStep::Stop, e))?;
    receiver.end().await.map_err(|e| (ReceiverStep::End, e))?;
    receiver.begin().await.map_err(|e| (ReceiverStep::Begin, e))?;
    receiver
        .start(StartMode::Hot)
        .await
        .map_err(|e| (ReceiverStep::HotStart, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockReceiver};

    #[tokio::test]
    async fn test_counts_until_threshold() {
        let mut rx = MockReceiver::default();
        let mut sup = ReceiverSupervisor::new(3);
        assert_eq!(sup.tick(&mut rx).await.unwrap(), TickOutcome::Counted(1));
        assert_eq!(sup.tick(&mut rx).await.unwrap(), TickOutcome::Counted(2));
        assert!(rx.calls.is_empty());
        assert_eq!(sup.state(), SupervisorState::Running);
    }

    #[tokio::test]
    async fn test_restart_sequence_order_and_reset() {
        let mut rx = MockReceiver::default();
        let mut sup = ReceiverSupervisor::new(3);
        for _ in 0..2 {
            sup.tick(&mut rx).await.unwrap();
        }
        assert_eq!(sup.tick(&mut rx).await.unwrap(), TickOutcome::Restarted);
        assert_eq!(
            rx.calls,
            vec![Call::Stop, Call::End, Call::Begin, Call::Start(StartMode::Hot)]
        );
        assert_eq!(sup.cycle_count(), 0);
        assert_eq!(sup.state(), SupervisorState::Running);

        // counting starts over
        assert_eq!(sup.tick(&mut rx).await.unwrap(), TickOutcome::Counted(1));
    }

    #[tokio::test]
    async fn test_failed_step_short_circuits_to_fatal() {
        let mut rx = MockReceiver { fail_on: Some(Call::End), ..Default::default() };
        let mut sup = ReceiverSupervisor::new(1);
        let err = sup.tick(&mut rx).await.unwrap_err();
        assert!(matches!(
            err,
            Error::ReceiverRestartFailure { step: ReceiverStep::End, .. }
        ));
        assert_eq!(rx.calls, vec![Call::Stop, Call::End]);
        assert!(sup.is_fatal());
    }

    #[tokio::test]
    async fn test_fatal_is_terminal() {
        let mut rx = MockReceiver { fail_on: Some(Call::Start(StartMode::Hot)), ..Default::default() };
        let mut sup = ReceiverSupervisor::new(1);
        assert!(sup.tick(&mut rx).await.is_err());
        let calls = rx.calls.len();

        assert!(matches!(sup.tick(&mut rx).await, Err(Error::Halted)));
        assert_eq!(rx.calls.len(), calls);
    }

    #[tokio::test]
    async fn test_fail_marks_fatal() {
        let mut rx = MockReceiver::default();
        let mut sup = ReceiverSupervisor::new(DEFAULT_RESTART_CYCLE_THRESHOLD);
        sup.fail();
        assert!(matches!(sup.tick(&mut rx).await, Err(Error::Halted)));
        assert_eq!(sup.cycle_count(), 0);
    }
}
