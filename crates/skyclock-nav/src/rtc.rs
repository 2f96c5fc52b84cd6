use std::path::PathBuf;
use std::time::Instant;

use time::{OffsetDateTime, PrimitiveDateTime};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::RtcError;

/// Battery-backed clock holding local wall time (zone offset already applied).
///
/// Setting the clock may shell out to a device tool, so `write` is async.
#[allow(async_fn_in_trait)]
pub trait RealTimeClock {
    fn read(&mut self) -> Result<PrimitiveDateTime, RtcError>;
    async fn write(&mut self, time: PrimitiveDateTime) -> Result<(), RtcError>;
}

/// Linux RTC device: read through sysfs, set through `hwclock`.
///
/// The registers are treated as naive wall time, so reads take `since_epoch`
/// at face value and writes pass the value with an explicit `UTC` suffix.
pub struct HwClock {
    device: String,
}

impl HwClock {
    pub fn new(device: impl Into<String>) -> Self {
        Self { device: device.into() }
    }

    pub fn since_epoch_path(&self) -> PathBuf {
        PathBuf::from("/sys/class/rtc").join(&self.device).join("since_epoch")
    }

    pub fn device_path(&self) -> String {
        format!("/dev/{}", self.device)
    }
}

impl RealTimeClock for HwClock {
    fn read(&mut self) -> Result<PrimitiveDateTime, RtcError> {
        let path = self.since_epoch_path();
        let content = std::fs::read_to_string(&path)?;
        let secs: i64 = content
            .trim()
            .parse()
            .map_err(|e| RtcError::Parse(format!("{}: {}", path.display(), e)))?;
        let t = OffsetDateTime::from_unix_timestamp(secs).map_err(|_| RtcError::Range)?;
        Ok(PrimitiveDateTime::new(t.date(), t.time()))
    }

    async fn write(&mut self, time: PrimitiveDateTime) -> Result<(), RtcError> {
        let date = format!("{} UTC", format_rtc(time));
        let mut cmd = Command::new("hwclock");
        cmd.args(["--set", "--utc", "--rtc", &self.device_path(), "--date", &date]);

        debug!("rtc: hwclock --set {}", self.device);
        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RtcError::Command(format!("{}: {}", output.status, stderr.trim())));
        }
        info!("rtc {} set to {}", self.device, date);
        Ok(())
    }
}

/// In-memory clock that keeps running from the last value written.
pub struct SoftRtc {
    base: PrimitiveDateTime,
    anchor: Instant,
}

impl SoftRtc {
    pub fn starting_at(time: PrimitiveDateTime) -> Self {
        Self { base: time, anchor: Instant::now() }
    }

    /// Seeded from the host clock shifted by a fixed zone offset.
    pub fn from_host(timezone_offset_s: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        let base = PrimitiveDateTime::new(now.date(), now.time());
        let base = base
            .checked_add(time::Duration::seconds(timezone_offset_s))
            .unwrap_or(base);
        Self::starting_at(base)
    }
}

impl RealTimeClock for SoftRtc {
    fn read(&mut self) -> Result<PrimitiveDateTime, RtcError> {
        let elapsed = time::Duration::try_from(self.anchor.elapsed()).map_err(|_| RtcError::Range)?;
        self.base.checked_add(elapsed).ok_or(RtcError::Range)
    }

    async fn write(&mut self, time: PrimitiveDateTime) -> Result<(), RtcError> {
        self.base = time;
        self.anchor = Instant::now();
        Ok(())
    }
}

/// `YYYY-MM-DD HH:MM:SS`, the form `hwclock --date` accepts.
pub fn format_rtc(time: PrimitiveDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        time.year(),
        u8::from(time.month()),
        time.day(),
        time.hour(),
        time.minute(),
        time.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_format_rtc() {
        assert_eq!(format_rtc(datetime!(2024-01-02 03:04:05.999)), "2024-01-02 03:04:05");
    }

    #[tokio::test]
    async fn test_soft_rtc_keeps_written_value() {
        let mut rtc = SoftRtc::starting_at(datetime!(2020-01-01 0:00));
        rtc.write(datetime!(2024-10-22 12:00)).await.unwrap();
        let now = rtc.read().unwrap();
        assert!(now >= datetime!(2024-10-22 12:00));
        assert!(now - datetime!(2024-10-22 12:00) < time::Duration::seconds(1));
    }

    #[test]
    fn test_hwclock_paths() {
        let rtc = HwClock::new("rtc0");
        assert_eq!(rtc.since_epoch_path(), PathBuf::from("/sys/class/rtc/rtc0/since_epoch"));
        assert_eq!(rtc.device_path(), "/dev/rtc0");
    }

    #[tokio::test]
    async fn test_hwclock_write_missing_device_fails() {
        // either hwclock is absent or it rejects the device; both surface as errors
        let mut rtc = HwClock::new("rtc-skyclock-missing");
        assert!(rtc.write(datetime!(2024-10-22 12:00)).await.is_err());
    }
}
