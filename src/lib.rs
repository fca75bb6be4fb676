pub mod app;
pub mod camera;
pub mod cli;
pub mod config;
pub mod custom_events;
pub mod ecs;
pub mod events;
pub mod input;
pub mod renderer;
pub mod scene;
pub mod scripts;
pub mod time;
pub mod triggers;
pub mod window;

pub use app::{run, run_with_overrides, FrameScheduler};
