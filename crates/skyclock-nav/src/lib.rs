pub mod clock_sync;
pub mod debug;
pub mod doctor;
pub mod error;
pub mod gnss;
pub mod gnss_rtc;
pub mod offset;
pub mod profile;
pub mod receiver;
pub mod rtc;
pub mod sample;
pub mod skyplot;
pub mod supervisor;

#[cfg(test)]
mod mock;

pub use error::{Error, Result};
pub use gnss_rtc::{GnssRtc, PollOutcome, SampleStatus};
pub use profile::ConstellationProfile;
pub use sample::{Constellation, GnssTime, NavSample, SatelliteObservation};

use serde::Deserialize;

/// UTC+9, fixed; no DST handling.
pub const DEFAULT_TIMEZONE_OFFSET_S: i64 = 9 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GnssRtcConfig {
    pub profile: ConstellationProfile,

    /// Added to satellite (UTC) time before it is written to the RTC.
    pub timezone_offset_s: i64,

    /// Completed polls before the receiver is hot-restarted.
    pub restart_cycle_threshold: u32,

    pub debug: bool,

    /// Upper bound on the wait for one sample. Unset blocks forever.
    pub sample_timeout_ms: Option<u64>,

    /// Static bias subtracted from every reported position, in degrees.
    pub lat_offset: f64,
    pub lon_offset: f64,
}

impl Default for GnssRtcConfig {
    fn default() -> Self {
        Self {
            profile: ConstellationProfile::default(),
            timezone_offset_s: DEFAULT_TIMEZONE_OFFSET_S,
            restart_cycle_threshold: supervisor::DEFAULT_RESTART_CYCLE_THRESHOLD,
            debug: false,
            sample_timeout_ms: None,
            lat_offset: 0.0,
            lon_offset: 0.0,
        }
    }
}
