use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock_sync::{ClockSync, CorrectionOutcome};
use crate::debug::{DebugSink, TracingSink};
use crate::error::{Error, ReceiverError, ReceiverStep, Result};
use crate::offset::PositionOffsetCorrector;
use crate::profile::ConstellationProfile;
use crate::receiver::{Receiver, StartMode};
use crate::rtc::{format_rtc, RealTimeClock};
use crate::sample::{NavSample, SatelliteObservation};
use crate::skyplot::{self, SkyPlot};
use crate::supervisor::{ReceiverSupervisor, SupervisorState, TickOutcome};
use crate::GnssRtcConfig;

#[derive(Debug)]
pub enum SampleStatus {
    Fresh,
    /// Nothing new this cycle; the previous sample stays current.
    Stale(ReceiverError),
}

#[derive(Debug)]
pub struct PollOutcome {
    pub sample: SampleStatus,
    /// `None` when the cycle had no fresh sample.
    pub correction: Option<CorrectionOutcome>,
    pub tick: TickOutcome,
}

impl PollOutcome {
    pub fn is_fresh(&self) -> bool {
        matches!(self.sample, SampleStatus::Fresh)
    }
}

/// Receiver-driven RTC keeper.
///
/// Owns the receiver and the clock. Each `poll` waits for one epoch, syncs the
/// RTC against it, keeps it for the query methods and advances the restart
/// supervisor.
pub struct GnssRtc<R, C, D = TracingSink> {
    receiver: R,
    rtc: C,
    sink: D,
    config: GnssRtcConfig,
    clock_sync: ClockSync,
    supervisor: ReceiverSupervisor,
    offset: PositionOffsetCorrector,
    last: NavSample,
}

impl<R: Receiver, C: RealTimeClock> GnssRtc<R, C> {
    pub fn new(receiver: R, rtc: C, config: GnssRtcConfig) -> Self {
        Self::with_sink(receiver, rtc, config, TracingSink)
    }
}

impl<R: Receiver, C: RealTimeClock, D: DebugSink> GnssRtc<R, C, D> {
    pub fn with_sink(receiver: R, rtc: C, config: GnssRtcConfig, sink: D) -> Self {
        Self {
            receiver,
            rtc,
            sink,
            clock_sync: ClockSync::new(config.timezone_offset_s),
            supervisor: ReceiverSupervisor::new(config.restart_cycle_threshold),
            offset: PositionOffsetCorrector::new(config.lat_offset, config.lon_offset),
            last: NavSample::default(),
            config,
        }
    }

    /// Power the receiver up and cold-start it with the configured constellations.
    pub async fn begin(&mut self) -> Result<()> {
        let set = self.config.profile.constellations();
        let steps = async {
            self.receiver.begin().await.map_err(|e| (ReceiverStep::Begin, e))?;
            self.receiver
                .select_constellations(set)
                .await
                .map_err(|e| (ReceiverStep::Select, e))?;
            self.receiver
                .start(StartMode::Cold)
                .await
                .map_err(|e| (ReceiverStep::ColdStart, e))
        };
        match steps.await {
            Ok(()) => {
                info!("gnss: setup OK (profile {})", self.config.profile);
                self.debug_line("Gnss setup OK");
                Ok(())
            }
            Err((step, source)) => {
                self.supervisor.fail();
                warn!("gnss: {} failed: {}", step, source);
                self.debug_line(&format!("Gnss {step} error!! {source}"));
                Err(Error::ReceiverBringupFailure { step, source })
            }
        }
    }

    /// Run one cycle. Only fatal conditions are returned as errors.
    pub async fn poll(&mut self) -> Result<PollOutcome> {
        if self.supervisor.is_fatal() {
            return Err(Error::Halted);
        }

        let next = match self.config.sample_timeout_ms {
            Some(ms) => {
                let limit = Duration::from_millis(ms);
                tokio::time::timeout(limit, self.receiver.next_sample())
                    .await
                    .unwrap_or(Err(ReceiverError::Timeout(limit)))
            }
            None => self.receiver.next_sample().await,
        };

        let (sample, correction) = match next {
            Ok(sample) => {
                self.last = sample;
                let correction = match self.clock_sync.maybe_correct(&mut self.rtc, &self.last.time).await {
                    Ok(correction) => correction,
                    Err(e) => {
                        // RTC failures are fatal; the cycle is not counted
                        self.supervisor.fail();
                        let cause = std::error::Error::source(&e).map(|s| s.to_string()).unwrap_or_default();
                        warn!("gnss: {}: {}", e, cause);
                        self.debug_line(&format!("RTC update error!! {e}: {cause}"));
                        return Err(e.into());
                    }
                };
                if let CorrectionOutcome::Corrected(t) = correction {
                    self.debug_line(&format!("RTC updated to: {}", format_rtc(t)));
                }
                self.debug_sample();
                (SampleStatus::Fresh, Some(correction))
            }
            Err(e) => {
                debug!("gnss: no new sample: {}", e);
                self.debug_line("data not update");
                (SampleStatus::Stale(e), None)
            }
        };

        let tick = match self.supervisor.tick(&mut self.receiver).await {
            Ok(tick) => tick,
            Err(e) => {
                self.debug_line(&format!("Gnss restart error!! {e}"));
                return Err(e);
            }
        };
        if tick == TickOutcome::Restarted {
            self.debug_line("Gnss restart OK.");
        }

        Ok(PollOutcome { sample, correction, tick })
    }

    pub fn is_fix_valid(&self) -> bool {
        self.last.fix_valid
    }

    pub fn satellite_count(&self) -> usize {
        self.last.satellite_count()
    }

    pub fn latitude(&self) -> f64 {
        self.corrected_position().0
    }

    pub fn longitude(&self) -> f64 {
        self.corrected_position().1
    }

    pub fn corrected_position(&self) -> (f64, f64) {
        self.offset.correct(self.last.position())
    }

    pub fn satellites(&self) -> &[SatelliteObservation] {
        &self.last.satellites
    }

    pub fn satellite_table(&self) -> String {
        self.last.satellite_table()
    }

    pub fn sky_plot(&self, width: usize, height: usize) -> SkyPlot {
        skyplot::render(&self.last.satellites, self.last.fix_valid, width, height)
    }

    pub fn render_sky_plot(&self, width: usize, height: usize) -> String {
        self.sky_plot(width, height).to_string()
    }

    pub fn last_sample(&self) -> &NavSample {
        &self.last
    }

    pub fn supervisor_state(&self) -> SupervisorState {
        self.supervisor.state()
    }

    pub fn cycle_count(&self) -> u32 {
        self.supervisor.cycle_count()
    }

    pub fn config(&self) -> &GnssRtcConfig {
        &self.config
    }

    /// Applies at the next `begin`.
    pub fn set_constellation_profile(&mut self, profile: ConstellationProfile) {
        self.config.profile = profile;
    }

    pub fn set_position_offset(&mut self, lat_offset: f64, lon_offset: f64) {
        self.config.lat_offset = lat_offset;
        self.config.lon_offset = lon_offset;
        self.offset.set_offset(lat_offset, lon_offset);
    }

    pub fn set_debug_mode(&mut self, enable: bool) {
        self.config.debug = enable;
    }

    pub fn into_parts(self) -> (R, C, D) {
        (self.receiver, self.rtc, self.sink)
    }

    fn debug_line(&mut self, line: &str) {
        if self.config.debug {
            self.sink.write_line(line);
        }
    }

    fn debug_sample(&mut self) {
        if !self.config.debug {
            return;
        }
        let s = &self.last;
        let mut lines = vec![format!(
            "{}, numSat:{:2}, {}",
            s.time,
            s.satellite_count(),
            if s.fix_valid { "Fix" } else { "No-Fix" }
        )];
        match s.position() {
            Some((lat, lon)) => lines.push(format!("Lat={lat:.6}, Lon={lon:.6}")),
            None => lines.push("No Position".to_string()),
        }
        lines.extend(s.satellite_table().lines().map(str::to_string));
        for line in lines {
            self.sink.write_line(&line);
        }
    }
}
