use time::{Duration, PrimitiveDateTime};
use tracing::debug;

use crate::error::ClockError;
use crate::rtc::RealTimeClock;
use crate::sample::GnssTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InvalidSatelliteTime,
    WithinTolerance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionOutcome {
    Corrected(PrimitiveDateTime),
    Skipped(SkipReason),
}

/// Keeps the RTC within one second of satellite time.
///
/// Stateless between calls: every decision is taken against a fresh RTC read.
#[derive(Debug, Clone, Copy)]
pub struct ClockSync {
    timezone_offset: Duration,
}

impl ClockSync {
    pub fn new(timezone_offset_s: i64) -> Self {
        Self { timezone_offset: Duration::seconds(timezone_offset_s) }
    }

    pub fn timezone_offset(&self) -> Duration {
        self.timezone_offset
    }

    /// Satellite time shifted into local wall time, if the receiver time is usable.
    pub fn local_time(&self, sample_time: &GnssTime) -> Option<PrimitiveDateTime> {
        if !sample_time.is_trusted() {
            return None;
        }
        sample_time.to_datetime()?.checked_add(self.timezone_offset)
    }

    pub async fn maybe_correct<C: RealTimeClock>(
        &self,
        rtc: &mut C,
        sample_time: &GnssTime,
    ) -> Result<CorrectionOutcome, ClockError> {
        let Some(corrected) = self.local_time(sample_time) else {
            debug!("clock sync: untrusted satellite time {}", sample_time);
            return Ok(CorrectionOutcome::Skipped(SkipReason::InvalidSatelliteTime));
        };

        let now = rtc.read().map_err(ClockError::Read)?;
        let diff_s = (now - corrected).whole_seconds();
        if diff_s.abs() < 1 {
            return Ok(CorrectionOutcome::Skipped(SkipReason::WithinTolerance));
        }

        rtc.write(corrected).await.map_err(ClockError::Write)?;
        debug!("clock sync: rtc off by {}s, set to {}", diff_s, corrected);
        Ok(CorrectionOutcome::Corrected(corrected))
    }
}
