use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sample::Constellation;
use Constellation::*;

/// Which constellations the receiver should track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstellationProfile {
    Gps,
    Glonass,
    GpsSbas,
    GpsGlonass,
    GpsBeidou,
    GpsGalileo,
    GpsQz1c,
    GpsGlonassQz1c,
    GpsBeidouQz1c,
    GpsGalileoQz1c,
    #[default]
    GpsQz1cQz1s,
}

impl ConstellationProfile {
    /// Index order matches the numeric profile ids accepted from config.
    pub const ALL: [ConstellationProfile; 11] = [
        ConstellationProfile::Gps,
        ConstellationProfile::Glonass,
        ConstellationProfile::GpsSbas,
        ConstellationProfile::GpsGlonass,
        ConstellationProfile::GpsBeidou,
        ConstellationProfile::GpsGalileo,
        ConstellationProfile::GpsQz1c,
        ConstellationProfile::GpsGlonassQz1c,
        ConstellationProfile::GpsBeidouQz1c,
        ConstellationProfile::GpsGalileoQz1c,
        ConstellationProfile::GpsQz1cQz1s,
    ];

    /// The exact set to enable. Anything not listed is disabled.
    pub fn constellations(&self) -> &'static [Constellation] {
        match self {
            ConstellationProfile::Gps => &[Gps],
            ConstellationProfile::Glonass => &[Glonass],
            ConstellationProfile::GpsSbas => &[Gps, Sbas],
            ConstellationProfile::GpsGlonass => &[Gps, Glonass],
            ConstellationProfile::GpsBeidou => &[Gps, Beidou],
            ConstellationProfile::GpsGalileo => &[Gps, Galileo],
            ConstellationProfile::GpsQz1c => &[Gps, QzssL1ca],
            ConstellationProfile::GpsGlonassQz1c => &[Gps, Glonass, QzssL1ca],
            ConstellationProfile::GpsBeidouQz1c => &[Gps, Beidou, QzssL1ca],
            ConstellationProfile::GpsGalileoQz1c => &[Gps, Galileo, QzssL1ca],
            ConstellationProfile::GpsQz1cQz1s => &[Gps, QzssL1ca, QzssL1s],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConstellationProfile::Gps => "gps",
            ConstellationProfile::Glonass => "glonass",
            ConstellationProfile::GpsSbas => "gps-sbas",
            ConstellationProfile::GpsGlonass => "gps-glonass",
            ConstellationProfile::GpsBeidou => "gps-beidou",
            ConstellationProfile::GpsGalileo => "gps-galileo",
            ConstellationProfile::GpsQz1c => "gps-qz1c",
            ConstellationProfile::GpsGlonassQz1c => "gps-glonass-qz1c",
            ConstellationProfile::GpsBeidouQz1c => "gps-beidou-qz1c",
            ConstellationProfile::GpsGalileoQz1c => "gps-galileo-qz1c",
            ConstellationProfile::GpsQz1cQz1s => "gps-qz1c-qz1s",
        }
    }

    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }
}

impl fmt::Display for ConstellationProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown constellation profile: {0}")]
pub struct UnknownProfile(pub String);

impl FromStr for ConstellationProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(index) = s.parse::<i64>() {
            return Self::from_index(index).ok_or_else(|| UnknownProfile(s.to_string()));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownProfile(s.to_string()))
    }
}
