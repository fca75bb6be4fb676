use anyhow::{Context, Result};
use smallvec::SmallVec;

use super::runtime_loop::{RuntimeLoop, DEFAULT_MAX_FRAME_DELTA};
use super::scene_slot::SceneSlot;
use crate::camera::CameraUniformGpu;
use crate::config::AppConfig;
use crate::custom_events::CustomEvents;
use crate::ecs::SceneLight;
use crate::events::Event;
use crate::input::{EventBridge, InputState};
use crate::renderer::light_clusters::{ClusterBuilder, ClusterDims, ClusterGrid, ClusterMetrics, DepthSlicing, LightVolume};
use crate::renderer::{FrameData, LightGpu, RenderBackend};
use crate::scene::{FrameContext, Scene};
use crate::time::Time;
use crate::triggers::TriggerMap;
use crate::window::WindowBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    Idle,
    PollEvents,
    UpdateLogic,
    BuildClusters,
    Render,
    SwapBuffers,
    CheckSceneSwap,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    WindowClosed,
    ExitRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Continue,
    Stopped(StopReason),
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub cluster_dims: ClusterDims,
    pub slicing: DepthSlicing,
    pub key_repeat: bool,
    pub max_frame_delta: f32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            cluster_dims: ClusterDims::new(16, 9, 24),
            slicing: DepthSlicing::default(),
            key_repeat: false,
            max_frame_delta: DEFAULT_MAX_FRAME_DELTA,
        }
    }
}

impl SchedulerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cluster_dims: config.clusters.dims(),
            slicing: config.clusters.slicing,
            key_repeat: config.input.key_repeat,
            ..Self::default()
        }
    }
}

/// Owns the frame lifecycle: events in, logic, cluster build, render, present, then the scene swap.
pub struct FrameScheduler<W: WindowBackend, R: RenderBackend> {
    window: W,
    renderer: R,
    bridge: EventBridge,
    input: InputState,
    triggers: TriggerMap,
    custom_events: CustomEvents,
    slot: SceneSlot,
    clusters: ClusterBuilder,
    runtime: RuntimeLoop,
    frame_events: Vec<Event>,
    scene_lights: Vec<SceneLight>,
    light_volumes: Vec<LightVolume>,
    gpu_lights: Vec<LightGpu>,
    grid: ClusterGrid,
    camera_uniform: CameraUniformGpu,
    exit_requested: bool,
    phase: FramePhase,
    frame_index: u64,
    last_frame_phases: SmallVec<[FramePhase; 8]>,
}

impl<W: WindowBackend, R: RenderBackend> FrameScheduler<W, R> {
    pub fn new(window: W, renderer: R, settings: SchedulerSettings) -> Self {
        let (width, height) = window.size();
        let clusters = ClusterBuilder::new(settings.cluster_dims, settings.slicing);
        let grid = clusters.empty_grid();
        Self {
            window,
            renderer,
            bridge: EventBridge::new(width, height).with_key_repeat(settings.key_repeat),
            input: InputState::new(),
            triggers: TriggerMap::with_defaults(),
            custom_events: CustomEvents::new(),
            slot: SceneSlot::new(),
            clusters,
            runtime: RuntimeLoop::new(Time::new(), settings.max_frame_delta),
            frame_events: Vec::new(),
            scene_lights: Vec::new(),
            light_volumes: Vec::new(),
            gpu_lights: Vec::new(),
            grid,
            camera_uniform: bytemuck::Zeroable::zeroed(),
            exit_requested: false,
            phase: FramePhase::Idle,
            frame_index: 0,
            last_frame_phases: SmallVec::new(),
        }
    }

    pub fn with_triggers(mut self, triggers: TriggerMap) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn with_custom_events(mut self, custom_events: CustomEvents) -> Self {
        self.custom_events = custom_events;
        self
    }

    /// Replaces the frame clock, e.g. with [`Time::fixed`] for reproducible runs.
    pub fn with_time(mut self, time: Time, max_frame_delta: f32) -> Self {
        self.runtime = RuntimeLoop::new(time, max_frame_delta);
        self
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn bridge(&self) -> &EventBridge {
        &self.bridge
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn triggers(&self) -> &TriggerMap {
        &self.triggers
    }

    pub fn custom_events(&self) -> &CustomEvents {
        &self.custom_events
    }

    /// Custom events may be created or rebound between frames.
    pub fn custom_events_mut(&mut self) -> &mut CustomEvents {
        &mut self.custom_events
    }

    pub fn scene_slot(&self) -> &SceneSlot {
        &self.slot
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.slot.current()
    }

    /// Queues `scene`; it becomes current at the end of the next frame.
    pub fn request_scene(&mut self, scene: Scene) {
        self.slot.request_load(scene);
    }

    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.window.set_cursor_visible(visible, &mut self.bridge);
    }

    /// Stops the loop once the frame in progress has finished.
    pub fn exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn last_frame_phases(&self) -> &[FramePhase] {
        &self.last_frame_phases
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn cluster_metrics(&self) -> &ClusterMetrics {
        self.clusters.metrics()
    }

    /// Frames whose delta exceeded the configured maximum and was clamped.
    pub fn clamped_frames(&self) -> u64 {
        self.runtime.clamped_frames()
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.runtime.time().elapsed_seconds()
    }

    pub fn run(&mut self) -> Result<StopReason> {
        loop {
            match self.run_frame() {
                Ok(FrameStatus::Continue) => {}
                Ok(FrameStatus::Stopped(reason)) => return Ok(reason),
                Err(err) => {
                    self.stop();
                    return Err(err);
                }
            }
        }
    }

    /// Runs one full iteration, every phase in order, unless the loop should stop first.
    pub fn run_frame(&mut self) -> Result<FrameStatus> {
        if self.phase == FramePhase::Stopped {
            return Ok(FrameStatus::Stopped(StopReason::ExitRequested));
        }
        let stop_reason = if self.window.should_close() {
            Some(StopReason::WindowClosed)
        } else if self.exit_requested {
            Some(StopReason::ExitRequested)
        } else {
            None
        };
        if let Some(reason) = stop_reason {
            log::info!("stopping after {} frame(s): {reason:?}", self.frame_index);
            self.stop();
            return Ok(FrameStatus::Stopped(reason));
        }

        self.last_frame_phases.clear();
        self.poll_events();
        self.update_logic();
        self.build_clusters();
        self.render().with_context(|| format!("Render failed on frame {}", self.frame_index))?;
        self.swap_buffers().with_context(|| format!("Present failed on frame {}", self.frame_index))?;
        self.check_scene_swap();
        self.frame_index += 1;
        Ok(FrameStatus::Continue)
    }

    fn enter(&mut self, phase: FramePhase) {
        log::trace!("frame {} -> {phase:?}", self.frame_index);
        self.phase = phase;
        self.last_frame_phases.push(phase);
    }

    fn stop(&mut self) {
        self.phase = FramePhase::Stopped;
        self.slot.shutdown();
    }

    fn poll_events(&mut self) {
        self.enter(FramePhase::PollEvents);
        self.bridge.begin_frame();
        self.input.begin_frame();
        self.triggers.begin_frame();
        self.custom_events.begin_frame();
        self.window.pump_events(&mut self.bridge);
        self.frame_events = self.bridge.poll();
        for event in &self.frame_events {
            self.input.apply(event);
            self.triggers.apply(event);
            self.custom_events.apply(event);
            match *event {
                Event::Exit => self.exit_requested = true,
                Event::WindowResized { width, height } => {
                    log::debug!("viewport resized to {width}x{height}");
                    self.renderer.resize(width, height);
                    if height > 0 {
                        if let Some(scene) = self.slot.current_mut() {
                            scene.ecs_mut().set_viewport_aspect(width as f32 / height as f32);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn update_logic(&mut self) {
        self.enter(FramePhase::UpdateLogic);
        let tick = self.runtime.tick();
        if let Some(dropped) = tick.dropped_time {
            log::debug!("frame {} dropped {dropped:.3}s of wall time", self.frame_index);
        }
        let Some(scene) = self.slot.current_mut() else {
            return;
        };
        let mut frame = FrameContext::new(
            tick.dt,
            self.frame_index,
            &self.frame_events,
            &self.input,
            &self.triggers,
            &self.custom_events,
        );
        scene.update(&mut frame);
        let (loads, exit) = frame.into_requests();
        for next in loads {
            self.slot.request_load(next);
        }
        if exit {
            log::debug!("scene requested exit on frame {}", self.frame_index);
            self.exit_requested = true;
        }
    }

    fn build_clusters(&mut self) {
        self.enter(FramePhase::BuildClusters);
        self.scene_lights.clear();
        self.light_volumes.clear();
        self.gpu_lights.clear();
        let Some(scene) = self.slot.current_mut() else {
            self.grid = self.clusters.empty_grid();
            self.camera_uniform = bytemuck::Zeroable::zeroed();
            return;
        };
        let ecs = scene.ecs_mut();
        ecs.collect_lights(&mut self.scene_lights);
        self.light_volumes.extend(self.scene_lights.iter().map(SceneLight::volume));
        self.gpu_lights.extend(self.scene_lights.iter().map(LightGpu::from));
        match ecs.active_camera_mut() {
            Some(camera) => {
                self.grid = self.clusters.build(camera, &self.light_volumes);
                self.camera_uniform = camera.uniform();
            }
            None => {
                self.grid = self.clusters.empty_grid();
                self.camera_uniform = bytemuck::Zeroable::zeroed();
            }
        }
    }

    fn render(&mut self) -> Result<()> {
        self.enter(FramePhase::Render);
        let frame = FrameData {
            frame_index: self.frame_index,
            camera: self.camera_uniform,
            clusters: &self.grid,
            lights: &self.gpu_lights,
        };
        self.renderer.render(&frame)
    }

    fn swap_buffers(&mut self) -> Result<()> {
        self.enter(FramePhase::SwapBuffers);
        self.window.swap_buffers();
        self.renderer.present()
    }

    fn check_scene_swap(&mut self) {
        self.enter(FramePhase::CheckSceneSwap);
        if !self.slot.consume_pending() {
            return;
        }
        let (width, height) = self.window.size();
        if height > 0 {
            if let Some(scene) = self.slot.current_mut() {
                scene.ecs_mut().set_viewport_aspect(width as f32 / height as f32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::ecs::EcsWorld;
    use crate::events::{EventKind, KeyCode};
    use crate::input::RawCallback;
    use crate::renderer::NullRenderer;
    use crate::scene::SceneLogic;
    use crate::window::HeadlessWindow;
    use glam::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn scheduler() -> FrameScheduler<HeadlessWindow, NullRenderer> {
        FrameScheduler::new(HeadlessWindow::new(320, 240), NullRenderer::new(), SchedulerSettings::default())
            .with_time(Time::fixed(Duration::from_millis(10)), DEFAULT_MAX_FRAME_DELTA)
    }

    #[test]
    fn phases_run_in_order() {
        let mut scheduler = scheduler();
        assert_eq!(scheduler.phase(), FramePhase::Idle);
        assert_eq!(scheduler.run_frame().expect("frame"), FrameStatus::Continue);
        assert_eq!(
            scheduler.last_frame_phases(),
            &[
                FramePhase::PollEvents,
                FramePhase::UpdateLogic,
                FramePhase::BuildClusters,
                FramePhase::Render,
                FramePhase::SwapBuffers,
                FramePhase::CheckSceneSwap,
            ]
        );
        assert_eq!(scheduler.frame_index(), 1);
        assert_eq!(scheduler.renderer().presents(), 1);
    }

    #[test]
    fn empty_slot_still_renders_an_empty_grid() {
        let mut scheduler = scheduler();
        scheduler.run_frame().expect("frame");
        let expected = ClusterGrid::packed_size(ClusterDims::new(16, 9, 24).cluster_count());
        assert_eq!(scheduler.renderer().last_cluster_bytes().len(), expected);
    }

    #[test]
    fn close_callback_stops_on_the_next_frame() {
        let mut scheduler = scheduler();
        scheduler.window_mut().queue_callbacks([RawCallback::WindowClose]);
        assert_eq!(scheduler.run_frame().expect("frame"), FrameStatus::Continue);
        assert_eq!(scheduler.renderer().frames_rendered(), 1);
        assert_eq!(scheduler.run_frame().expect("frame"), FrameStatus::Stopped(StopReason::WindowClosed));
        assert_eq!(scheduler.phase(), FramePhase::Stopped);
    }

    #[test]
    fn resize_reaches_renderer_once() {
        let mut scheduler = scheduler();
        scheduler.window_mut().queue_callbacks([
            RawCallback::WindowSize { width: 640, height: 480 },
            RawCallback::WindowSize { width: 640, height: 480 },
        ]);
        scheduler.run_frame().expect("frame");
        assert_eq!(scheduler.renderer().resizes(), &[(640, 480)]);
    }

    struct FiringWatcher(Arc<Mutex<Vec<usize>>>);

    impl SceneLogic for FiringWatcher {
        fn on_update(&mut self, _ecs: &mut EcsWorld, frame: &mut FrameContext<'_>) {
            self.0.lock().unwrap().push(frame.custom_events.fire_count("viewport"));
        }
    }

    #[test]
    fn custom_events_fire_during_poll_and_reach_logic() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut custom_events = CustomEvents::new();
        custom_events
            .create("viewport")
            .bind_input(EventKind::WindowResized)
            .bind_input(EventKind::GainedFocus)
            .bind_callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = scheduler().with_custom_events(custom_events);
        scheduler.request_scene(Scene::new("watch", FiringWatcher(seen.clone())));
        scheduler.run_frame().expect("frame 0");

        scheduler.window_mut().queue_callbacks([
            RawCallback::WindowSize { width: 640, height: 480 },
            RawCallback::Focus { focused: true },
            RawCallback::Key { key: KeyCode::W.to_raw(), scancode: 0, action: 1, mods: 0 },
        ]);
        scheduler.run_frame().expect("frame 1");
        scheduler.run_frame().expect("frame 2");

        assert_eq!(*seen.lock().unwrap(), vec![2, 0]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(scheduler.custom_events().firings().is_empty());
    }

    #[test]
    fn camera_uniform_resets_when_the_scene_has_no_camera() {
        struct Lit;
        impl SceneLogic for Lit {
            fn on_spawn(&mut self, ecs: &mut EcsWorld) {
                ecs.spawn_camera("camera", Camera::first_person(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, 1.0, 1.0, 0.1, 10.0));
            }
        }
        let mut scheduler = scheduler();
        scheduler.request_scene(Scene::new("lit", Lit));
        scheduler.run_frame().expect("frame 0");
        scheduler.run_frame().expect("frame 1");
        assert_eq!(scheduler.renderer().last_camera().expect("camera").position_near, [1.0, 2.0, 3.0, 0.1]);

        scheduler.request_scene(Scene::empty("dark"));
        scheduler.run_frame().expect("frame 2");
        scheduler.run_frame().expect("frame 3");
        let camera = scheduler.renderer().last_camera().expect("camera");
        let zeroed: CameraUniformGpu = bytemuck::Zeroable::zeroed();
        assert_eq!(bytemuck::bytes_of(camera), bytemuck::bytes_of(&zeroed));
    }

    #[test]
    fn long_frames_are_counted_as_clamped() {
        let mut scheduler = FrameScheduler::new(HeadlessWindow::new(320, 240), NullRenderer::new(), SchedulerSettings::default())
            .with_time(Time::fixed(Duration::from_millis(400)), DEFAULT_MAX_FRAME_DELTA);
        scheduler.run_frame().expect("frame");
        scheduler.run_frame().expect("frame");
        assert_eq!(scheduler.clamped_frames(), 2);
    }
}
