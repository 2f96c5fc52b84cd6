use crate::error::ReceiverError;
use crate::sample::{Constellation, NavSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Discard cached almanac/ephemeris.
    Cold,
    /// Reuse whatever the receiver still holds.
    Hot,
}

/// Navigation receiver as seen by the supervisor and the poll loop.
///
/// `begin`/`end` power the device up and down, `start`/`stop` control
/// positioning while it is powered.
#[allow(async_fn_in_trait)]
pub trait Receiver {
    async fn begin(&mut self) -> Result<(), ReceiverError>;

    /// Enable exactly these constellations, disabling the rest.
    async fn select_constellations(&mut self, set: &[Constellation]) -> Result<(), ReceiverError>;

    async fn start(&mut self, mode: StartMode) -> Result<(), ReceiverError>;

    async fn stop(&mut self) -> Result<(), ReceiverError>;

    async fn end(&mut self) -> Result<(), ReceiverError>;

    /// Waits until the receiver has a new epoch. Never times out on its own.
    async fn next_sample(&mut self) -> Result<NavSample, ReceiverError>;
}
