use anyhow::{Context, Result};
use std::path::Path;

use crate::gnss::NmeaSource;
use crate::rtc::HwClock;
use crate::GnssRtcConfig;

/// ±14 h covers every civil zone in use.
pub const MAX_TIMEZONE_OFFSET_S: i64 = 14 * 60 * 60;

pub fn check_sync(cfg: &GnssRtcConfig) -> Result<()> {
    anyhow::ensure!(cfg.restart_cycle_threshold >= 1, "sync.restart_cycle_threshold must be >= 1");
    anyhow::ensure!(
        cfg.timezone_offset_s.abs() <= MAX_TIMEZONE_OFFSET_S,
        "sync.timezone_offset_s out of range (±{}s)", MAX_TIMEZONE_OFFSET_S
    );
    // a bias larger than a degree is a wrong sign or unit, not leveling
    anyhow::ensure!(cfg.lat_offset.abs() <= 1.0 && cfg.lon_offset.abs() <= 1.0, "sync.lat_offset/lon_offset should be within ±1°");
    if let Some(ms) = cfg.sample_timeout_ms {
        anyhow::ensure!(ms >= 1000, "sync.sample_timeout_ms below one epoch (1000ms)");
    }
    Ok(())
}

pub fn check_receiver(source: &NmeaSource) -> Result<()> {
    match source {
        NmeaSource::Serial { device, baud } => {
            anyhow::ensure!(!device.is_empty(), "receiver.device missing");
            anyhow::ensure!(*baud > 0, "receiver.baud invalid");
            anyhow::ensure!(Path::new(device).exists(), "receiver.device {} not present", device);
        }
        NmeaSource::File(path) => {
            std::fs::metadata(path)
                .with_context(|| format!("receiver.file {}", path.display()))?;
        }
    }
    Ok(())
}

pub fn check_hwclock(rtc: &HwClock) -> Result<()> {
    let path = rtc.since_epoch_path();
    anyhow::ensure!(path.exists(), "rtc sysfs node {} not found", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes() {
        check_sync(&GnssRtcConfig::default()).unwrap();
    }

    #[test]
    fn test_rejects_bad_sync_values() {
        let zero = GnssRtcConfig { restart_cycle_threshold: 0, ..Default::default() };
        assert!(check_sync(&zero).is_err());

        let tz = GnssRtcConfig { timezone_offset_s: 15 * 3600, ..Default::default() };
        assert!(check_sync(&tz).is_err());

        let bias = GnssRtcConfig { lon_offset: -2.0, ..Default::default() };
        assert!(check_sync(&bias).is_err());

        let timeout = GnssRtcConfig { sample_timeout_ms: Some(200), ..Default::default() };
        assert!(check_sync(&timeout).is_err());
    }

    #[test]
    fn test_receiver_checks() {
        let missing = NmeaSource::File("/nonexistent/skyclock.nmea".into());
        assert!(check_receiver(&missing).is_err());

        let no_baud = NmeaSource::Serial { device: "/dev/null".into(), baud: 0 };
        assert!(check_receiver(&no_baud).is_err());
    }
}
