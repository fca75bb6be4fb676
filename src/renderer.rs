mod cluster_pass;
pub mod light_clusters;
pub mod window_surface;

use crate::camera::CameraUniformGpu;
use crate::config::WindowConfig;
use crate::ecs::{LightKind, SceneLight};
use anyhow::{Context, Result};
use cluster_pass::ClusterDebugPass;
use light_clusters::ClusterGrid;
use std::sync::Arc;
use window_surface::{SurfaceFrame, WindowSurface};
use winit::dpi::PhysicalSize;
use winit::window::Window;

/// Light as uploaded to the GPU; index `i` matches index `i` in every cluster record.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightGpu {
    pub position_range: [f32; 4],
    pub color_intensity: [f32; 4],
    /// `w` is 0 for point lights and 1 for spots.
    pub direction_kind: [f32; 4],
    /// Cosines of the inner and outer cone half-angles.
    pub cone: [f32; 4],
}

impl From<&SceneLight> for LightGpu {
    fn from(light: &SceneLight) -> Self {
        let (kind, cone) = match light.kind {
            LightKind::Point => (0.0, [1.0, 1.0, 0.0, 0.0]),
            LightKind::Spot { inner_angle, outer_angle, .. } => {
                (1.0, [inner_angle.cos(), outer_angle.cos(), 0.0, 0.0])
            }
        };
        Self {
            position_range: light.position.extend(light.range).to_array(),
            color_intensity: light.color.extend(light.intensity).to_array(),
            direction_kind: light.direction.extend(kind).to_array(),
            cone,
        }
    }
}

/// Everything the render phase hands to a backend.
pub struct FrameData<'a> {
    pub frame_index: u64,
    pub camera: CameraUniformGpu,
    pub clusters: &'a ClusterGrid,
    pub lights: &'a [LightGpu],
}

pub trait RenderBackend {
    fn resize(&mut self, width: u32, height: u32);
    fn render(&mut self, frame: &FrameData<'_>) -> Result<()>;
    fn present(&mut self) -> Result<()>;
}

/// Keeps what it was handed instead of drawing it.
#[derive(Debug, Default)]
pub struct NullRenderer {
    frames_rendered: u64,
    presents: u64,
    last_frame_index: Option<u64>,
    last_camera: Option<CameraUniformGpu>,
    last_light_count: usize,
    cluster_bytes: Vec<u8>,
    resizes: Vec<(u32, u32)>,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn presents(&self) -> u64 {
        self.presents
    }

    pub fn last_frame_index(&self) -> Option<u64> {
        self.last_frame_index
    }

    pub fn last_camera(&self) -> Option<&CameraUniformGpu> {
        self.last_camera.as_ref()
    }

    pub fn last_light_count(&self) -> usize {
        self.last_light_count
    }

    /// The packed cluster buffer of the most recent frame, exactly as it would be uploaded.
    pub fn last_cluster_bytes(&self) -> &[u8] {
        &self.cluster_bytes
    }

    pub fn resizes(&self) -> &[(u32, u32)] {
        &self.resizes
    }
}

impl RenderBackend for NullRenderer {
    fn resize(&mut self, width: u32, height: u32) {
        self.resizes.push((width, height));
    }

    fn render(&mut self, frame: &FrameData<'_>) -> Result<()> {
        self.frames_rendered += 1;
        self.last_frame_index = Some(frame.frame_index);
        self.last_camera = Some(frame.camera);
        self.last_light_count = frame.lights.len();
        frame.clusters.write_bytes(&mut self.cluster_bytes);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.presents += 1;
        Ok(())
    }
}

/// wgpu backend drawing the cluster occupancy view into a window surface.
pub struct GpuRenderer {
    surface: WindowSurface,
    pass: ClusterDebugPass,
    pending: Option<SurfaceFrame>,
}

impl GpuRenderer {
    pub fn new(window: Arc<Window>, window_cfg: &WindowConfig) -> Result<Self> {
        let mut surface = WindowSurface::new(window_cfg);
        surface.attach(window).context("Failed to initialize GPU surface")?;
        let format = surface.surface_format()?;
        let pass = ClusterDebugPass::new(surface.device()?, format);
        Ok(Self { surface, pass, pending: None })
    }

    pub fn surface(&self) -> &WindowSurface {
        &self.surface
    }
}

impl RenderBackend for GpuRenderer {
    fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(PhysicalSize::new(width, height));
    }

    fn render(&mut self, frame: &FrameData<'_>) -> Result<()> {
        let Some(target) = self.surface.acquire_surface_frame()? else {
            return Ok(());
        };
        let size = self.surface.size();
        let (device, queue) = self.surface.device_and_queue()?;
        self.pass.upload(device, queue, frame, (size.width, size.height));
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Frame Encoder") });
        self.pass.encode(&mut encoder, target.view());
        queue.submit(std::iter::once(encoder.finish()));
        self.pending = Some(target);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if let Some(frame) = self.pending.take() {
            frame.present();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{LightComponent, Transform3D};
    use glam::Vec3;
    use light_clusters::ClusterDims;

    #[test]
    fn light_gpu_layout_is_four_vec4() {
        assert_eq!(std::mem::size_of::<LightGpu>(), 64);
        assert_eq!(std::mem::size_of::<CameraUniformGpu>(), 224);
    }

    #[test]
    fn spot_light_packs_cone_cosines() {
        let light = SceneLight::resolve(
            &LightComponent::spot(Vec3::ONE, 2.0, 5.0, Vec3::NEG_Z, 0.0, 0.5),
            &Transform3D::from_translation(Vec3::new(1.0, 2.0, 3.0)),
        );
        let gpu = LightGpu::from(&light);
        assert_eq!(gpu.position_range, [1.0, 2.0, 3.0, 5.0]);
        assert_eq!(gpu.color_intensity[3], 2.0);
        assert_eq!(gpu.direction_kind[3], 1.0);
        assert_eq!(gpu.cone[0], 1.0);
        assert!((gpu.cone[1] - 0.5f32.cos()).abs() < 1e-6);
    }

    #[test]
    fn null_renderer_keeps_packed_clusters() {
        let grid = ClusterGrid::empty(ClusterDims::new(2, 2, 2));
        let mut renderer = NullRenderer::new();
        let frame =
            FrameData { frame_index: 7, camera: bytemuck::Zeroable::zeroed(), clusters: &grid, lights: &[] };
        renderer.render(&frame).expect("render");
        renderer.present().expect("present");
        assert_eq!(renderer.last_frame_index(), Some(7));
        assert_eq!(renderer.last_cluster_bytes(), grid.to_bytes().as_slice());
        assert_eq!(renderer.presents(), 1);
    }
}
