use std::io::SeekFrom;
use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::error::ReceiverError;
use crate::receiver::{Receiver, StartMode};
use crate::sample::{Constellation, GnssTime, NavSample, SatelliteObservation};

#[derive(Debug, Clone)]
pub enum NmeaSource {
    Serial { device: String, baud: u32 },
    /// Recorded log. Reopening after `end` resumes at the next unread line,
    /// so supervised restarts do not replay the log from the top.
    File(PathBuf),
}

enum Stream {
    Serial(BufReader<SerialStream>),
    File(BufReader<File>),
}

/// Proprietary sentence bodies (without `$`/checksum) sent on start.
#[derive(Debug, Clone, Default)]
pub struct StartCommands {
    pub cold: Option<String>,
    pub hot: Option<String>,
}

/// NMEA 0183 receiver over a serial port or a recorded log.
pub struct NmeaReceiver {
    source: NmeaSource,
    commands: StartCommands,
    stream: Option<Stream>,
    running: bool,
    parser: NmeaParser,
    /// Bytes of the recorded log consumed so far.
    replay_offset: u64,
}

impl NmeaReceiver {
    pub fn new(source: NmeaSource) -> Self {
        Self {
            source,
            commands: StartCommands::default(),
            stream: None,
            running: false,
            parser: NmeaParser::default(),
            replay_offset: 0,
        }
    }

    pub fn with_start_commands(mut self, commands: StartCommands) -> Self {
        self.commands = commands;
        self
    }

    pub fn source(&self) -> &NmeaSource {
        &self.source
    }

    async fn send_command(&mut self, body: &str) -> Result<(), ReceiverError> {
        match self.stream.as_mut() {
            Some(Stream::Serial(port)) => {
                port.write_all(nmea_sentence(body).as_bytes()).await?;
                port.flush().await?;
                debug!("nmea: sent ${}", body);
                Ok(())
            }
            // recorded logs cannot be commanded
            Some(Stream::File(_)) => Ok(()),
            None => Err(ReceiverError::NotOpen),
        }
    }
}

impl Receiver for NmeaReceiver {
    async fn begin(&mut self) -> Result<(), ReceiverError> {
        let stream = match &self.source {
            NmeaSource::Serial { device, baud } => {
                let port = tokio_serial::new(device, *baud).open_native_async()?;
                Stream::Serial(BufReader::new(port))
            }
            NmeaSource::File(path) => {
                let mut file = File::open(path).await?;
                if self.replay_offset > 0 {
                    file.seek(SeekFrom::Start(self.replay_offset)).await?;
                }
                Stream::File(BufReader::new(file))
            }
        };
        self.stream = Some(stream);
        info!("nmea: opened {:?} at offset {}", self.source, self.replay_offset);
        Ok(())
    }

    async fn select_constellations(&mut self, set: &[Constellation]) -> Result<(), ReceiverError> {
        self.parser.select(set);
        Ok(())
    }

    async fn start(&mut self, mode: StartMode) -> Result<(), ReceiverError> {
        if self.stream.is_none() {
            return Err(ReceiverError::NotOpen);
        }
        let command = match mode {
            StartMode::Cold => {
                self.parser.clear_sky();
                self.commands.cold.clone()
            }
            StartMode::Hot => self.commands.hot.clone(),
        };
        if let Some(body) = command {
            self.send_command(&body).await?;
        }
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ReceiverError> {
        self.running = false;
        Ok(())
    }

    async fn end(&mut self) -> Result<(), ReceiverError> {
        self.running = false;
        self.stream = None;
        Ok(())
    }

    async fn next_sample(&mut self) -> Result<NavSample, ReceiverError> {
        if !self.running {
            return Err(if self.stream.is_none() { ReceiverError::NotOpen } else { ReceiverError::NotStarted });
        }
        let mut line = String::new();
        loop {
            line.clear();
            let n = match self.stream.as_mut() {
                Some(Stream::Serial(r)) => r.read_line(&mut line).await?,
                Some(Stream::File(r)) => {
                    let n = r.read_line(&mut line).await?;
                    self.replay_offset += n as u64;
                    n
                }
                None => return Err(ReceiverError::NotOpen),
            };
            if n == 0 {
                return Err(ReceiverError::EndOfStream);
            }
            if let Some(sample) = self.parser.feed(line.trim()) {
                return Ok(sample);
            }
        }
    }
}

/// Frame a sentence body as `$BODY*HH\r\n`.
pub fn nmea_sentence(body: &str) -> String {
    format!("${}*{:02X}\r\n", body, checksum(body))
}

fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

/// Strips framing and validates the checksum.
fn sentence_body(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('$')?;
    let (body, sum) = rest.split_once('*')?;
    let sum = u8::from_str_radix(sum.get(..2)?, 16).ok()?;
    (checksum(body) == sum).then_some(body)
}

/// Turns a stream of NMEA lines into one `NavSample` per RMC epoch.
///
/// GSV groups update a per-talker sky table that is committed once the last
/// message of the group arrives, so a sample always sees complete groups.
#[derive(Debug, Default)]
pub struct NmeaParser {
    selected: Vec<Constellation>,
    pending: Vec<(String, Vec<SatelliteObservation>)>,
    sky: Vec<(String, Vec<SatelliteObservation>)>,
}

impl NmeaParser {
    /// Empty selection reports every constellation.
    pub fn select(&mut self, set: &[Constellation]) {
        self.selected = set.to_vec();
    }

    pub fn clear_sky(&mut self) {
        self.pending.clear();
        self.sky.clear();
    }

    pub fn feed(&mut self, line: &str) -> Option<NavSample> {
        let body = sentence_body(line)?;
        let fields: Vec<&str> = body.split(',').collect();
        let (Some(talker), Some(kind)) = (fields[0].get(..2), fields[0].get(2..)) else {
            return None;
        };
        match kind {
            "GSV" => {
                self.on_gsv(talker, &fields);
                None
            }
            "RMC" => self.on_rmc(&fields),
            _ => None,
        }
    }

    fn on_gsv(&mut self, talker: &str, fields: &[&str]) {
        if fields.len() < 4 {
            return;
        }
        let (Ok(total), Ok(index)) = (fields[1].parse::<u8>(), fields[2].parse::<u8>()) else {
            return;
        };
        // NMEA 4.10 appends a signal id after the satellite blocks
        let signal = if (fields.len() - 4) % 4 == 1 { fields[fields.len() - 1] } else { "" };
        let key = format!("{talker}{signal}");

        if index == 1 {
            self.pending.retain(|(k, _)| *k != key);
            self.pending.push((key.clone(), Vec::new()));
        }
        let Some(slot) = self.pending.iter_mut().find(|(k, _)| *k == key) else {
            return;
        };
        for block in fields[4..].chunks_exact(4) {
            let Ok(prn) = block[0].parse::<u32>() else { continue };
            slot.1.push(SatelliteObservation {
                constellation: classify(talker, prn),
                id: prn,
                elevation_deg: block[1].parse().unwrap_or(0.0),
                azimuth_deg: block[2].parse().unwrap_or(0.0),
                signal_db: block[3].parse().unwrap_or(-1.0),
            });
        }

        if index == total {
            if let Some(pos) = self.pending.iter().position(|(k, _)| *k == key) {
                let group = self.pending.remove(pos);
                match self.sky.iter_mut().find(|(k, _)| *k == key) {
                    Some(existing) => *existing = group,
                    None => self.sky.push(group),
                }
            }
        }
    }

    fn on_rmc(&self, fields: &[&str]) -> Option<NavSample> {
        if fields.len() < 10 {
            return None;
        }
        let hms = parse_hms(fields[1]);
        // a date without a readable time of day must not be trusted either
        let mut time = match hms {
            Some(_) => parse_date(fields[9]).unwrap_or_default(),
            None => GnssTime::default(),
        };
        if let Some((hour, minute, second, microsecond)) = hms {
            time.hour = hour;
            time.minute = minute;
            time.second = second;
            time.microsecond = microsecond;
        }

        let lat = parse_deg_min(fields[3], fields[4]);
        let lon = parse_deg_min(fields[5], fields[6]);
        let fix_valid = fields[2] == "A" && lat.is_some() && lon.is_some();

        let satellites = self
            .sky
            .iter()
            .flat_map(|(_, sats)| sats.iter())
            .filter(|s| self.selected.is_empty() || self.selected.contains(&s.constellation))
            .cloned()
            .collect();

        Some(NavSample {
            time,
            fix_valid,
            latitude: lat.unwrap_or(0.0),
            longitude: lon.unwrap_or(0.0),
            satellites,
        })
    }
}

fn classify(talker: &str, prn: u32) -> Constellation {
    match (talker, prn) {
        ("GP", 1..=32) => Constellation::Gps,
        ("GP", 33..=64) => Constellation::Sbas,
        ("GP", 183..=192) => Constellation::QzssL1s,
        ("GP", 193..=202) => Constellation::QzssL1ca,
        ("GL", _) => Constellation::Glonass,
        ("GA", _) => Constellation::Galileo,
        ("GB", _) | ("BD", _) => Constellation::Beidou,
        ("GQ", _) | ("QZ", _) => Constellation::QzssL1ca,
        _ => Constellation::Unknown,
    }
}

// hhmmss[.sss]
fn parse_hms(v: &str) -> Option<(u8, u8, u8, u32)> {
    if v.len() < 6 {
        return None;
    }
    let hour = v.get(0..2)?.parse().ok()?;
    let minute = v.get(2..4)?.parse().ok()?;
    let second = v.get(4..6)?.parse().ok()?;
    let microsecond = match v.get(6..) {
        Some(frac) if frac.starts_with('.') && frac.len() > 1 => {
            let digits = &frac[1..];
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let digits = &digits[..digits.len().min(6)];
            let scale = 10u32.pow(6 - digits.len() as u32);
            digits.parse::<u32>().ok()? * scale
        }
        _ => 0,
    };
    Some((hour, minute, second, microsecond))
}

// ddmmyy; an empty date leaves the year at 0 so the time is never trusted
fn parse_date(v: &str) -> Option<GnssTime> {
    if v.len() != 6 {
        return None;
    }
    let day = v.get(0..2)?.parse().ok()?;
    let month = v.get(2..4)?.parse().ok()?;
    let yy: u16 = v.get(4..6)?.parse().ok()?;
    Some(GnssTime { year: 2000 + yy, month, day, ..Default::default() })
}

fn parse_deg_min(v: &str, hemi: &str) -> Option<f64> {
    if v.is_empty() { return None; }
    // lat: ddmm.mmmm, lon: dddmm.mmmm
    let dot = v.find('.')?;
    let deg_len = if dot > 4 { 3 } else { 2 };
    let deg: f64 = v.get(..deg_len)?.parse().ok()?;
    let min: f64 = v.get(deg_len..)?.parse().ok()?;
    let mut out = deg + (min / 60.0);
    if hemi == "S" || hemi == "W" { out = -out; }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(body: &str) -> String {
        nmea_sentence(body).trim_end().to_string()
    }

    const RMC: &str = "GPRMC,031500.50,A,3539.2400,N,13945.3000,E,0.0,0.0,221024,,,A";

    #[test]
    fn test_sentence_checksum() {
        assert_eq!(nmea_sentence("PMTK101"), "$PMTK101*32\r\n");
        assert_eq!(nmea_sentence("PMTK103"), "$PMTK103*30\r\n");
    }

    #[test]
    fn test_bad_checksum_ignored() {
        let mut p = NmeaParser::default();
        let line = format!("${}*{:02X}", RMC, checksum(RMC) ^ 0xFF);
        assert!(p.feed(&line).is_none());
        assert!(p.feed(&format!("${RMC}")).is_none());
    }

    #[test]
    fn test_rmc_builds_sample() {
        let mut p = NmeaParser::default();
        let s = p.feed(&framed(RMC)).unwrap();
        assert_eq!(
            s.time,
            GnssTime { year: 2024, month: 10, day: 22, hour: 3, minute: 15, second: 0, microsecond: 500_000 }
        );
        assert!(s.fix_valid);
        assert!((s.latitude - 35.654).abs() < 1e-9);
        assert!((s.longitude - 139.755).abs() < 1e-9);
        assert!(s.satellites.is_empty());
    }

    #[test]
    fn test_rmc_without_fix_or_date() {
        let mut p = NmeaParser::default();
        let s = p.feed(&framed("GPRMC,000012.00,V,,,,,,,,,,N")).unwrap();
        assert!(!s.fix_valid);
        assert_eq!(s.time.year, 0);
        assert_eq!(s.time.second, 12);
        assert_eq!(s.position(), None);
    }

    #[test]
    fn test_southern_western_hemisphere() {
        assert_eq!(parse_deg_min("3330.0000", "S"), Some(-33.5));
        assert_eq!(parse_deg_min("07030.0000", "W"), Some(-70.5));
    }

    #[test]
    fn test_gsv_group_commits_on_last_message() {
        let mut p = NmeaParser::default();
        p.feed(&framed("GPGSV,2,1,5,01,40,083,46,02,17,308,41,12,07,344,,14,22,228,45"));
        // group incomplete: nothing committed yet
        assert!(p.feed(&framed(RMC)).unwrap().satellites.is_empty());

        p.feed(&framed("GPGSV,2,2,5,193,67,165,38"));
        let s = p.feed(&framed(RMC)).unwrap();
        assert_eq!(s.satellite_count(), 5);
        assert_eq!(s.satellites[0].id, 1);
        assert_eq!(s.satellites[0].signal_db, 46.0);
        assert_eq!(s.satellites[2].signal_db, -1.0);
        assert_eq!(s.satellites[4].constellation, Constellation::QzssL1ca);
    }

    #[test]
    fn test_new_group_replaces_old() {
        let mut p = NmeaParser::default();
        p.feed(&framed("GPGSV,1,1,2,01,40,083,46,02,17,308,41"));
        p.feed(&framed("GPGSV,1,1,1,03,10,010,30"));
        let s = p.feed(&framed(RMC)).unwrap();
        assert_eq!(s.satellites.iter().map(|s| s.id).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_selection_filters_satellites() {
        let mut p = NmeaParser::default();
        p.feed(&framed("GPGSV,1,1,2,01,40,083,46,40,30,200,35"));
        p.feed(&framed("GLGSV,1,1,1,70,50,120,39"));
        p.select(&[Constellation::Gps, Constellation::Glonass]);
        let s = p.feed(&framed(RMC)).unwrap();
        let kinds: Vec<_> = s.satellites.iter().map(|s| s.constellation).collect();
        assert_eq!(kinds, vec![Constellation::Gps, Constellation::Glonass]);
    }

    #[test]
    fn test_clear_sky() {
        let mut p = NmeaParser::default();
        p.feed(&framed("GPGSV,1,1,1,01,40,083,46"));
        p.clear_sky();
        assert!(p.feed(&framed(RMC)).unwrap().satellites.is_empty());
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("GP", 7), Constellation::Gps);
        assert_eq!(classify("GP", 48), Constellation::Sbas);
        assert_eq!(classify("GP", 184), Constellation::QzssL1s);
        assert_eq!(classify("GB", 11), Constellation::Beidou);
        assert_eq!(classify("GN", 1), Constellation::Unknown);
    }

    #[test]
    fn test_hms_fraction() {
        assert_eq!(parse_hms("235959.123"), Some((23, 59, 59, 123_000)));
        assert_eq!(parse_hms("000000"), Some((0, 0, 0, 0)));
        assert_eq!(parse_hms("12"), None);
        assert_eq!(parse_hms("235959.1234567"), Some((23, 59, 59, 123_456)));
    }

    #[test]
    fn test_hms_rejects_non_ascii_fraction() {
        assert_eq!(parse_hms("031500.éééé"), None);
        assert_eq!(parse_hms("031500.5x"), None);
        assert_eq!(parse_hms("0315é0"), None);
    }

    #[test]
    fn test_rmc_with_garbled_time_is_untrusted() {
        let mut p = NmeaParser::default();
        let s = p
            .feed(&framed("GPRMC,031500.éééé,A,3539.2400,N,13945.3000,E,0.0,0.0,221024,,,A"))
            .unwrap();
        assert_eq!(s.time, GnssTime::default());
        assert!(!s.time.is_trusted());
        assert!(s.fix_valid);
    }

    #[tokio::test]
    async fn test_replay_file() {
        let path = std::env::temp_dir().join(format!("skyclock-replay-{}.nmea", std::process::id()));
        let log = [
            framed("GPGSV,1,1,1,05,80,010,40"),
            framed(RMC),
            framed("GPRMC,031501.50,A,3539.2400,N,13945.3000,E,0.0,0.0,221024,,,A"),
        ]
        .join("\r\n");
        std::fs::write(&path, log).unwrap();

        let mut rx = NmeaReceiver::new(NmeaSource::File(path.clone()));
        assert!(matches!(rx.next_sample().await, Err(ReceiverError::NotOpen)));
        rx.begin().await.unwrap();
        assert!(matches!(rx.next_sample().await, Err(ReceiverError::NotStarted)));
        rx.start(StartMode::Cold).await.unwrap();

        let first = rx.next_sample().await.unwrap();
        assert_eq!(first.satellite_count(), 1);
        let second = rx.next_sample().await.unwrap();
        assert_eq!(second.time.second, 1);
        assert!(matches!(rx.next_sample().await, Err(ReceiverError::EndOfStream)));

        rx.end().await.unwrap();
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_file_reopen_resumes() {
        let path = std::env::temp_dir().join(format!("skyclock-resume-{}.nmea", std::process::id()));
        let log: String = [
            RMC,
            "GPRMC,031501.50,A,3539.2400,N,13945.3000,E,0.0,0.0,221024,,,A",
        ]
        .iter()
        .map(|b| nmea_sentence(b))
        .collect();
        std::fs::write(&path, log).unwrap();

        let mut rx = NmeaReceiver::new(NmeaSource::File(path.clone()));
        rx.begin().await.unwrap();
        rx.start(StartMode::Cold).await.unwrap();
        assert_eq!(rx.next_sample().await.unwrap().time.second, 0);

        rx.stop().await.unwrap();
        rx.end().await.unwrap();
        rx.begin().await.unwrap();
        rx.start(StartMode::Hot).await.unwrap();
        assert_eq!(rx.next_sample().await.unwrap().time.second, 1);
        assert!(matches!(rx.next_sample().await, Err(ReceiverError::EndOfStream)));

        std::fs::remove_file(path).unwrap();
    }
}
