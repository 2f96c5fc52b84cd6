use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use skyclock_nav::debug::StdoutSink;
use skyclock_nav::doctor as nav_doctor;
use skyclock_nav::error::{ReceiverError, RtcError};
use skyclock_nav::gnss::{NmeaReceiver, NmeaSource, StartCommands};
use skyclock_nav::receiver::Receiver;
use skyclock_nav::rtc::{format_rtc, HwClock, RealTimeClock, SoftRtc};
use skyclock_nav::{ConstellationProfile, GnssRtc, GnssRtcConfig, SampleStatus};

use time::PrimitiveDateTime;

#[derive(Debug, Parser)]
#[command(name = "skyclock", version, about = "skyclock - GNSS-disciplined RTC keeper")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Doctor,
    /// Keep the RTC in sync until interrupted.
    Run(RunArgs),
    /// Wait for the first fix and print the sky plot.
    Plot(RunArgs),
    /// List constellation profiles.
    Profiles,
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    /// Override sync.profile (name or index).
    #[arg(long)]
    profile: Option<ConstellationProfile>,

    /// Echo receiver debug lines to stdout.
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    receiver: ReceiverCfg,
    rtc: RtcCfg,
    #[serde(default)]
    sync: GnssRtcConfig,
    #[serde(default)]
    skyplot: SkyPlotCfg,
}

#[derive(Debug, serde::Deserialize)]
struct ReceiverCfg {
    source: String,
    device: Option<String>,
    baud: Option<u32>,
    file: Option<String>,
    cold_start_cmd: Option<String>,
    hot_start_cmd: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct RtcCfg {
    backend: String,
    device: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
struct SkyPlotCfg {
    width: usize,
    height: usize,
    /// Print every n-th fresh sample while running; 0 disables.
    every_n: u64,
}

impl Default for SkyPlotCfg {
    fn default() -> Self {
        Self { width: 40, height: 12, every_n: 10 }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

enum CliRtc {
    Hw(HwClock),
    Soft(SoftRtc),
}

impl RealTimeClock for CliRtc {
    fn read(&mut self) -> Result<PrimitiveDateTime, RtcError> {
        match self {
            CliRtc::Hw(rtc) => rtc.read(),
            CliRtc::Soft(rtc) => rtc.read(),
        }
    }

    async fn write(&mut self, time: PrimitiveDateTime) -> Result<(), RtcError> {
        match self {
            CliRtc::Hw(rtc) => rtc.write(time).await,
            CliRtc::Soft(rtc) => rtc.write(time).await,
        }
    }
}

type Station = GnssRtc<NmeaReceiver, CliRtc, StdoutSink>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Run(args) => run(&cfg, args).await?,
        Command::Plot(args) => plot(&cfg, args).await?,
        Command::Profiles => profiles(),
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    nav_doctor::check_sync(&cfg.sync)?;
    nav_doctor::check_receiver(&receiver_source(&cfg.receiver)?)?;

    let mut rtc = build_rtc(&cfg.rtc, cfg.sync.timezone_offset_s)?;
    if let CliRtc::Hw(hw) = &rtc {
        nav_doctor::check_hwclock(hw).or_else(|e| {
            warn!("rtc not usable here: {:#}", e);
            Ok::<(), anyhow::Error>(())
        })?;
    }
    match rtc.read() {
        Ok(now) => {
            let host = time::OffsetDateTime::now_utc() + time::Duration::seconds(cfg.sync.timezone_offset_s);
            let host = PrimitiveDateTime::new(host.date(), host.time());
            info!("doctor: rtc reads {} (host local {}, diff {}s)", format_rtc(now), format_rtc(host), (now - host).whole_seconds());
        }
        Err(e) => warn!("doctor: rtc read failed: {}", e),
    }

    info!("doctor: OK");
    Ok(())
}

fn profiles() {
    for (index, profile) in ConstellationProfile::ALL.iter().enumerate() {
        let set: Vec<&str> = profile.constellations().iter().map(|c| c.label()).collect();
        println!("{:2} {:<18} {}", index, profile.name(), set.join(", "));
    }
}

async fn run(cfg: &Config, args: RunArgs) -> Result<()> {
    info!("run: starting");
    let mut station = build_station(cfg, &args)?;
    station.begin().await.context("receiver bring-up")?;

    let every_n = cfg.skyplot.every_n;
    let mut fresh = 0u64;

    loop {
        let out = tokio::select! {
            res = station.poll() => res?,
            _ = tokio::signal::ctrl_c() => {
                info!("run: interrupted");
                break;
            }
        };

        match &out.sample {
            SampleStatus::Fresh => {
                fresh += 1;
                if every_n > 0 && fresh % every_n == 0 {
                    print_sky(&station, cfg);
                }
            }
            SampleStatus::Stale(ReceiverError::EndOfStream) => {
                info!("run: receiver stream ended after {} samples", fresh);
                break;
            }
            SampleStatus::Stale(_) => {}
        }
    }

    let (mut receiver, _, _) = station.into_parts();
    shutdown(&mut receiver).await;
    Ok(())
}

async fn plot(cfg: &Config, args: RunArgs) -> Result<()> {
    let mut station = build_station(cfg, &args)?;
    station.begin().await.context("receiver bring-up")?;

    loop {
        let out = station.poll().await?;
        match out.sample {
            SampleStatus::Fresh => break,
            SampleStatus::Stale(ReceiverError::EndOfStream) => anyhow::bail!("receiver stream ended before first sample"),
            SampleStatus::Stale(_) => {}
        }
    }
    print_sky(&station, cfg);

    let (mut receiver, _, _) = station.into_parts();
    shutdown(&mut receiver).await;
    Ok(())
}

async fn shutdown(receiver: &mut NmeaReceiver) {
    if let Err(e) = receiver.stop().await {
        warn!("shutdown: receiver stop failed: {}", e);
    }
    if let Err(e) = receiver.end().await {
        warn!("shutdown: receiver end failed: {}", e);
    }
}

fn print_sky(station: &Station, cfg: &Config) {
    let (lat, lon) = station.corrected_position();
    println!(
        "fix={} sats={} lat={:.6} lon={:.6}",
        station.is_fix_valid(),
        station.satellite_count(),
        lat,
        lon
    );
    print!("{}", station.render_sky_plot(cfg.skyplot.width, cfg.skyplot.height));
    print!("{}", station.satellite_table());
}

fn build_station(cfg: &Config, args: &RunArgs) -> Result<Station> {
    let mut sync = cfg.sync.clone();
    if let Some(profile) = args.profile {
        sync.profile = profile;
    }
    if args.debug {
        sync.debug = true;
    }

    let receiver = NmeaReceiver::new(receiver_source(&cfg.receiver)?).with_start_commands(StartCommands {
        cold: cfg.receiver.cold_start_cmd.clone(),
        hot: cfg.receiver.hot_start_cmd.clone(),
    });
    let rtc = build_rtc(&cfg.rtc, sync.timezone_offset_s)?;
    info!("run: profile={} threshold={} tz={}s", sync.profile, sync.restart_cycle_threshold, sync.timezone_offset_s);

    Ok(GnssRtc::with_sink(receiver, rtc, sync, StdoutSink))
}

fn receiver_source(r: &ReceiverCfg) -> Result<NmeaSource> {
    match r.source.as_str() {
        "nmea-serial" => Ok(NmeaSource::Serial {
            device: r.device.clone().context("receiver.device missing")?,
            baud: r.baud.unwrap_or(115200),
        }),
        "nmea-file" => Ok(NmeaSource::File(r.file.as_ref().context("receiver.file missing")?.into())),
        other => anyhow::bail!("unknown receiver.source: {}", other),
    }
}

fn build_rtc(r: &RtcCfg, timezone_offset_s: i64) -> Result<CliRtc> {
    match r.backend.as_str() {
        "hwclock" => Ok(CliRtc::Hw(HwClock::new(r.device.clone().unwrap_or_else(|| "rtc0".into())))),
        "soft" => Ok(CliRtc::Soft(SoftRtc::from_host(timezone_offset_s))),
        other => anyhow::bail!("unknown rtc.backend: {}", other),
    }
}
