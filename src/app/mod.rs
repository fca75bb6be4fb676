mod demo;
pub mod frame_scheduler;
mod runtime_loop;
pub mod scene_slot;

pub use demo::{demo_scene, DemoScene, DemoSettings, FlyCamera};
pub use frame_scheduler::{FramePhase, FrameScheduler, FrameStatus, SchedulerSettings, StopReason};
pub use runtime_loop::DEFAULT_MAX_FRAME_DELTA;
pub use scene_slot::{SceneSlot, SceneSlotStats};

use crate::config::{AppConfig, AppConfigOverrides, LoggingConfig, DEFAULT_CONFIG_PATH};
use crate::custom_events::CustomEvents;
use crate::events::EventKind;
use crate::renderer::GpuRenderer;
use crate::triggers::TriggerMap;
use crate::window::WinitWindow;
use anyhow::{Context, Result};
use std::path::Path;

/// Installs the process logger. `RUST_LOG` wins over the configured filter.
pub fn init_logging(logging: &LoggingConfig) {
    let env = env_logger::Env::default().default_filter_or(logging.filter.as_str());
    if let Err(err) = env_logger::Builder::from_env(env).format_timestamp_millis().try_init() {
        log::debug!("logger already installed: {err}");
    }
}

pub fn run() -> Result<()> {
    run_with_overrides(Path::new(DEFAULT_CONFIG_PATH), AppConfigOverrides::default())
}

pub fn run_with_overrides(config_path: &Path, overrides: AppConfigOverrides) -> Result<()> {
    let (mut config, load_error) = match AppConfig::load(config_path) {
        Ok(cfg) => (cfg, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    config.apply_overrides(&overrides);
    init_logging(&config.logging);
    if let Some(err) = load_error {
        log::warn!("Config load error: {err:?}. Falling back to defaults.");
    }
    if !overrides.is_empty() {
        log::info!("command-line overrides: {}", overrides.applied_fields().join(", "));
    }
    run_with_config(config)
}

pub fn run_with_config(config: AppConfig) -> Result<()> {
    let window = WinitWindow::open(&config.window)?;
    let handle = window.handle().context("Window closed before the renderer could attach")?;
    let renderer = GpuRenderer::new(handle, &config.window)?;
    let triggers = TriggerMap::from_bindings(&config.input.bindings, "config");
    let mut custom_events = CustomEvents::new();
    custom_events
        .create("exit")
        .bind_input(EventKind::Exit)
        .bind_callback(|_| log::info!("window close requested, finishing the current frame"));
    let mut scheduler = FrameScheduler::new(window, renderer, SchedulerSettings::from_config(&config))
        .with_triggers(triggers)
        .with_custom_events(custom_events);
    scheduler.request_scene(demo_scene(DemoSettings::default()));
    let reason = scheduler.run()?;
    let metrics = scheduler.cluster_metrics();
    log::info!(
        "stopped ({reason:?}) after {} frame(s) in {:.1}s, {} clamped; last build: {}/{} lights visible, {} active cluster(s), {:.2} light(s) per cluster",
        scheduler.frame_index(),
        scheduler.elapsed_seconds(),
        scheduler.clamped_frames(),
        metrics.visible_lights,
        metrics.total_lights,
        metrics.active_clusters,
        metrics.average_lights_per_cluster(),
    );
    Ok(())
}
