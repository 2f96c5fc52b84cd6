//! Scripted collaborators for unit tests.

use std::collections::VecDeque;

use time::PrimitiveDateTime;

use crate::error::{ReceiverError, RtcError};
use crate::receiver::{Receiver, StartMode};
use crate::rtc::RealTimeClock;
use crate::sample::{Constellation, NavSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Begin,
    Select,
    Start(StartMode),
    Stop,
    End,
    NextSample,
}

#[derive(Default)]
pub struct MockReceiver {
    pub calls: Vec<Call>,
    pub selected: Vec<Constellation>,
    pub samples: VecDeque<Result<NavSample, ReceiverError>>,
    /// Every call matching this one fails.
    pub fail_on: Option<Call>,
    /// When set, `next_sample` with an empty queue never resolves.
    pub hang_when_empty: bool,
}

impl MockReceiver {
    pub fn with_samples(samples: impl IntoIterator<Item = NavSample>) -> Self {
        Self { samples: samples.into_iter().map(Ok).collect(), ..Default::default() }
    }

    fn record(&mut self, call: Call) -> Result<(), ReceiverError> {
        self.calls.push(call);
        if self.fail_on == Some(call) {
            return Err(ReceiverError::Rejected(format!("{call:?}")));
        }
        Ok(())
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

impl Receiver for MockReceiver {
    async fn begin(&mut self) -> Result<(), ReceiverError> {
        self.record(Call::Begin)
    }

    async fn select_constellations(&mut self, set: &[Constellation]) -> Result<(), ReceiverError> {
        self.record(Call::Select)?;
        self.selected = set.to_vec();
        Ok(())
    }

    async fn start(&mut self, mode: StartMode) -> Result<(), ReceiverError> {
        self.record(Call::Start(mode))
    }

    async fn stop(&mut self) -> Result<(), ReceiverError> {
        self.record(Call::Stop)
    }

    async fn end(&mut self) -> Result<(), ReceiverError> {
        self.record(Call::End)
    }

    async fn next_sample(&mut self) -> Result<NavSample, ReceiverError> {
        self.record(Call::NextSample)?;
        match self.samples.pop_front() {
            Some(sample) => sample,
            None if self.hang_when_empty => std::future::pending().await,
            None => Err(ReceiverError::EndOfStream),
        }
    }
}

pub struct MockRtc {
    pub now: PrimitiveDateTime,
    pub writes: Vec<PrimitiveDateTime>,
    pub fail_write: bool,
}

impl MockRtc {
    pub fn at(now: PrimitiveDateTime) -> Self {
        Self { now, writes: Vec::new(), fail_write: false }
    }
}

impl RealTimeClock for MockRtc {
    fn read(&mut self) -> Result<PrimitiveDateTime, RtcError> {
        Ok(self.now)
    }

    async fn write(&mut self, time: PrimitiveDateTime) -> Result<(), RtcError> {
        if self.fail_write {
            return Err(RtcError::Range);
        }
        self.writes.push(time);
        self.now = time;
        Ok(())
    }
}
