//! Headless sample runs against a recording surface.

pub mod fire;
pub mod gradients;

use std::sync::{Arc, Mutex};

use canvex_canvas::{
    BatchCodec, CallLog, FrameDriver, FrameHandler, InProcessTransport, RecordingSurface,
    SurfaceHost, TickOutcome,
};
use canvex_core::config::Config;
use canvex_core::types::SurfaceOptions;
use tracing::{info, warn};

/// Element id the samples use as an image source.
pub const SAMPLE_IMAGE_ID: u32 = 1;

#[derive(Debug, Default)]
pub struct RunStats {
    pub frames: u64,
    pub operations: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub native_calls: usize,
    pub registered: usize,
}

/// Drive one session for `frames` ticks, paced at the configured frame
/// interval. Ctrl-C stops early. `on_tick` sees every outcome.
pub async fn run(
    config: &Config,
    width: u32,
    height: u32,
    frames: u64,
    handler: Box<dyn FrameHandler>,
    mut on_tick: impl FnMut(u64, &TickOutcome),
) -> anyhow::Result<RunStats> {
    let logs: Arc<Mutex<Vec<CallLog>>> = Arc::new(Mutex::new(Vec::new()));
    let factory_logs = logs.clone();
    let host = Arc::new(SurfaceHost::with_settings(
        Box::new(move |_: &str, w: u32, h: u32, options: SurfaceOptions| {
            let surface = RecordingSurface::new(w, h)
                .with_options(options)
                .with_element(SAMPLE_IMAGE_ID);
            factory_logs
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(surface.log());
            Ok(surface)
        }),
        BatchCodec::new(config.decode_cache_capacity()),
        config.handle_warn_threshold(),
    ));
    let driver = FrameDriver::from_config(Arc::new(InProcessTransport::new(host.clone())), config);

    let session_id = driver
        .create_session(width, height, config.surface_options(), handler)
        .await?;
    info!(session_id = %session_id, width, height, frames, "Sample started");

    let mut stats = RunStats::default();
    let mut interval = tokio::time::interval(driver.frame_interval());
    let step = driver.frame_interval().as_secs_f64() * 1000.0;

    while stats.frames < frames {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!(frames = stats.frames, "Interrupted");
                break;
            }
            _ = interval.tick() => {
                let timestamp = stats.frames as f64 * step;
                for outcome in driver.tick(timestamp).await {
                    match &outcome {
                        TickOutcome::Flushed { operations, report, .. } => {
                            stats.operations += operations;
                            stats.applied += report.applied;
                            stats.skipped += report.skipped.len();
                        }
                        TickOutcome::Failed { .. } => stats.failed += 1,
                    }
                    on_tick(stats.frames, &outcome);
                }
                stats.frames += 1;
            }
        }
    }

    stats.registered = host.with_applier(&session_id, |a| a.registered()).await?;
    driver.dispose(&session_id).await?;
    stats.native_calls = logs
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .map(CallLog::len)
        .sum();
    Ok(stats)
}

pub fn print_summary(name: &str, stats: &RunStats) {
    println!("{name}: {} frames", stats.frames);
    println!("  operations:   {}", stats.operations);
    println!("  applied:      {}", stats.applied);
    println!("  skipped:      {}", stats.skipped);
    println!("  failed ticks: {}", stats.failed);
    println!("  native calls: {}", stats.native_calls);
    println!("  composites:   {}", stats.registered);
}
