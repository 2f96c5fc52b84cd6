use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, Month, PrimitiveDateTime, Time};

/// Receivers report an uninitialized clock as an epoch-era date.
pub const MIN_TRUSTED_YEAR: u16 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constellation {
    Gps,
    Glonass,
    Sbas,
    QzssL1ca,
    QzssL1s,
    Beidou,
    Galileo,
    Unknown,
}

impl Constellation {
    pub fn label(&self) -> &'static str {
        match self {
            Constellation::Gps => "GPS",
            Constellation::Glonass => "GLONASS",
            Constellation::Sbas => "SBAS",
            Constellation::QzssL1ca => "QZ_L1CA",
            Constellation::QzssL1s => "QZ_L1S",
            Constellation::Beidou => "BEIDOU",
            Constellation::Galileo => "GALILEO",
            Constellation::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Constellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Calendar time exactly as the receiver reported it (UTC, no zone applied).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GnssTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

impl GnssTime {
    pub fn is_trusted(&self) -> bool {
        self.year >= MIN_TRUSTED_YEAR
    }

    /// `None` when the fields do not form a real calendar instant.
    pub fn to_datetime(&self) -> Option<PrimitiveDateTime> {
        let month = Month::try_from(self.month).ok()?;
        let date = Date::from_calendar_date(i32::from(self.year), month, self.day).ok()?;
        let time = Time::from_hms_micro(self.hour, self.minute, self.second, self.microsecond).ok()?;
        Some(PrimitiveDateTime::new(date, time))
    }
}

impl fmt::Display for GnssTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}/{:02}/{:02} {:02}:{:02}:{:02}.{:06}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.microsecond
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteObservation {
    pub constellation: Constellation,
    pub id: u32,
    pub elevation_deg: f32,
    pub azimuth_deg: f32,
    /// Negative means the receiver has no usable signal for this satellite.
    pub signal_db: f32,
}

/// One poll's navigation snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavSample {
    pub time: GnssTime,
    pub fix_valid: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub satellites: Vec<SatelliteObservation>,
}

impl NavSample {
    /// Raw position, only meaningful with a valid fix.
    pub fn position(&self) -> Option<(f64, f64)> {
        self.fix_valid.then_some((self.latitude, self.longitude))
    }

    pub fn satellite_count(&self) -> usize {
        self.satellites.len()
    }

    /// One line per satellite, in receiver order.
    pub fn satellite_table(&self) -> String {
        let mut out = format!("Number of Satellites: {:2}\n", self.satellites.len());
        for (i, sat) in self.satellites.iter().enumerate() {
            out.push_str(&format!(
                "[{:2}] Type: {}, ID: {:2}, Elevation: {:2}°, Azimuth: {:3}°, Signal Level: {:.6} dB\n",
                i,
                sat.constellation,
                sat.id,
                sat.elevation_deg as u32,
                sat.azimuth_deg as u32,
                sat.signal_db,
            ));
        }
        out
    }
}
