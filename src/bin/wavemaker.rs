use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;
use wavemaker::audio::{RecoveryExecutor, StreamEngine};
use wavemaker::backend::{platform_device, AudioDevice, SimulatedDevice};
use wavemaker::config::AppConfig;

const SIMULATED_SAMPLE_RATE: u32 = 48000;
const SIMULATED_FRAMES_PER_BURST: u32 = 192;

#[derive(Parser, Debug)]
#[command(
    name = "wavemaker",
    about = "Play a toggling sine tone on the default output device"
)]
struct Cli {
    /// JSON config file (defaults to assets/wavemaker.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output backend
    #[arg(long, value_enum, default_value_t = Backend::Platform)]
    backend: Backend,
    /// Toggle the tone every N milliseconds
    #[arg(long, default_value_t = 500)]
    toggle_ms: u64,
    /// Stop after N seconds (runs until Ctrl-C when omitted)
    #[arg(long)]
    duration_secs: Option<u64>,
    /// Simulate a device disconnect after N milliseconds (simulated backend only)
    #[arg(long)]
    disconnect_after_ms: Option<u64>,
    /// Override the configured log level
    #[arg(long)]
    log_level: Option<tracing::Level>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Oboe on Android, cpal elsewhere
    Platform,
    /// In-process device pulled by a timer; no sound is produced
    Simulated,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    wavemaker::init_logging(cli.log_level.unwrap_or_else(|| config.logging.max_level()));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("wavemaker-cli")
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(drive(cli, config))
}

async fn drive(cli: Cli, config: AppConfig) -> Result<ExitCode> {
    let simulated = (cli.backend == Backend::Simulated)
        .then(|| SimulatedDevice::new(SIMULATED_SAMPLE_RATE, SIMULATED_FRAMES_PER_BURST));
    if cli.disconnect_after_ms.is_some() && simulated.is_none() {
        warn!("[cli] --disconnect-after-ms only applies to the simulated backend");
    }

    let device: Arc<dyn AudioDevice> = match &simulated {
        Some(device) => Arc::new(device.clone()),
        None => platform_device(),
    };
    let executor = RecoveryExecutor::new(tokio::runtime::Handle::current());
    let engine = StreamEngine::new(device, &config, executor);

    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!("[cli] engine event: {:?}", event),
                Err(RecvError::Lagged(skipped)) => warn!("[cli] missed {} engine events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    engine.start().context("failed to start output stream")?;

    if let Some(device) = simulated.clone() {
        tokio::spawn(pump_simulated(device));
    }

    let deadline = cli.duration_secs;
    let stop_after = async move {
        match deadline {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(stop_after);

    let disconnect_plan = simulated.zip(cli.disconnect_after_ms);
    let mut disconnect_pending = disconnect_plan.is_some();
    let disconnect_at = async {
        match &disconnect_plan {
            Some((_, ms)) => tokio::time::sleep(Duration::from_millis(*ms)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(disconnect_at);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut toggle = tokio::time::interval(Duration::from_millis(cli.toggle_ms.max(1)));
    loop {
        tokio::select! {
            _ = toggle.tick() => {
                let on = !engine.is_tone_on();
                engine.set_tone_on(on);
                info!("[cli] tone {}", if on { "on" } else { "off" });
            }
            _ = &mut disconnect_at, if disconnect_pending => {
                disconnect_pending = false;
                if let Some((device, _)) = &disconnect_plan {
                    info!("[cli] simulating device disconnect");
                    device.disconnect();
                }
            }
            _ = &mut stop_after => break,
            _ = &mut ctrl_c => break,
        }
    }

    engine.stop().context("failed to stop output stream")?;
    info!("[cli] done");
    Ok(ExitCode::SUCCESS)
}

/// Stand in for the device's real-time thread: pull one burst per burst period
async fn pump_simulated(device: SimulatedDevice) {
    let frames = SIMULATED_FRAMES_PER_BURST as usize;
    let period = Duration::from_secs_f64(
        f64::from(SIMULATED_FRAMES_PER_BURST) / f64::from(SIMULATED_SAMPLE_RATE),
    );
    let bursts_per_report = (SIMULATED_SAMPLE_RATE / SIMULATED_FRAMES_PER_BURST) as usize;

    let mut ticker = tokio::time::interval(period);
    let mut peak = 0.0_f32;
    let mut bursts = 0usize;
    let mut missed = 0usize;
    loop {
        ticker.tick().await;
        match device.pull(frames) {
            Some(samples) => {
                peak = samples.iter().fold(peak, |acc, s| acc.max(s.abs()));
            }
            None => missed += 1,
        }
        bursts += 1;

        if bursts == bursts_per_report {
            info!("[cli] simulated output: peak={:.3} missed_bursts={}", peak, missed);
            peak = 0.0;
            bursts = 0;
            missed = 0;
        }
    }
}
