use super::{FrameData, LightGpu};
use crate::camera::CameraUniformGpu;
use crate::renderer::light_clusters::{ClusterGrid, MAX_LIGHTS_PER_CLUSTER};

const MIN_LIGHT_CAPACITY: usize = 64;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct DebugParamsGpu {
    viewport: [f32; 2],
    light_count: u32,
    max_per_cluster: u32,
}

/// Fullscreen view of per-tile cluster occupancy with a marker at each light.
pub(super) struct ClusterDebugPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    camera_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    light_buffer: wgpu::Buffer,
    light_capacity: usize,
    cluster_buffer: wgpu::Buffer,
    cluster_capacity: u64,
    bind_group: wgpu::BindGroup,
    cluster_bytes: Vec<u8>,
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl ClusterDebugPass {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cluster Debug Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../assets/shaders/cluster_debug.wgsl").into()),
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cluster Debug BGL"),
            entries: &[uniform_entry(0), uniform_entry(1), storage_entry(2), storage_entry(3)],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cluster Debug Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Cluster Debug Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState { topology: wgpu::PrimitiveTopology::TriangleList, ..Default::default() },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let camera_buffer =
            uniform_buffer(device, "Camera Uniform", std::mem::size_of::<CameraUniformGpu>() as u64);
        let params_buffer =
            uniform_buffer(device, "Cluster Debug Params", std::mem::size_of::<DebugParamsGpu>() as u64);
        let light_capacity = MIN_LIGHT_CAPACITY;
        let light_buffer =
            storage_buffer(device, "Light Storage", (light_capacity * std::mem::size_of::<LightGpu>()) as u64);
        let cluster_capacity = ClusterGrid::packed_size(1) as u64;
        let cluster_buffer = storage_buffer(device, "Cluster Storage", cluster_capacity);
        let bind_group = Self::create_bind_group(
            device,
            &bind_group_layout,
            &camera_buffer,
            &params_buffer,
            &light_buffer,
            &cluster_buffer,
        );
        Self {
            pipeline,
            bind_group_layout,
            camera_buffer,
            params_buffer,
            light_buffer,
            light_capacity,
            cluster_buffer,
            cluster_capacity,
            bind_group,
            cluster_bytes: Vec::new(),
        }
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        camera: &wgpu::Buffer,
        params: &wgpu::Buffer,
        lights: &wgpu::Buffer,
        clusters: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cluster Debug BG"),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: camera.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: params.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: lights.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: clusters.as_entire_binding() },
            ],
        })
    }

    /// Grows the storage buffers to fit this frame, rebuilding the bind group when either moves.
    fn ensure_capacity(&mut self, device: &wgpu::Device, light_count: usize, cluster_bytes: u64) {
        let mut rebind = false;
        if light_count > self.light_capacity {
            let mut new_cap = self.light_capacity.max(MIN_LIGHT_CAPACITY);
            while new_cap < light_count {
                new_cap *= 2;
            }
            self.light_buffer =
                storage_buffer(device, "Light Storage", (new_cap * std::mem::size_of::<LightGpu>()) as u64);
            self.light_capacity = new_cap;
            rebind = true;
        }
        if cluster_bytes > self.cluster_capacity {
            self.cluster_buffer = storage_buffer(device, "Cluster Storage", cluster_bytes);
            self.cluster_capacity = cluster_bytes;
            rebind = true;
        }
        if rebind {
            self.bind_group = Self::create_bind_group(
                device,
                &self.bind_group_layout,
                &self.camera_buffer,
                &self.params_buffer,
                &self.light_buffer,
                &self.cluster_buffer,
            );
        }
    }

    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, frame: &FrameData<'_>, viewport: (u32, u32)) {
        frame.clusters.write_bytes(&mut self.cluster_bytes);
        self.ensure_capacity(device, frame.lights.len(), self.cluster_bytes.len() as u64);
        let params = DebugParamsGpu {
            viewport: [viewport.0.max(1) as f32, viewport.1.max(1) as f32],
            light_count: frame.lights.len() as u32,
            max_per_cluster: MAX_LIGHTS_PER_CLUSTER as u32,
        };
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&frame.camera));
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
        if !frame.lights.is_empty() {
            queue.write_buffer(&self.light_buffer, 0, bytemuck::cast_slice(frame.lights));
        }
        queue.write_buffer(&self.cluster_buffer, 0, &self.cluster_bytes);
    }

    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Cluster Debug Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r: 0.02, g: 0.03, b: 0.08, a: 1.0 }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
