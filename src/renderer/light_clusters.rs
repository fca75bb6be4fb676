use std::mem;

use glam::{Vec2, Vec3};
use serde::Deserialize;

use crate::camera::{Camera, FrustumShape, ViewFrustum};

/// Capacity of one cluster's light list. Extra lights are dropped for that cluster only.
pub const MAX_LIGHTS_PER_CLUSTER: usize = 32;
pub const CLUSTER_HEADER_SIZE: usize = mem::size_of::<ClusterHeaderGpu>();
pub const CLUSTER_RECORD_SIZE: usize = mem::size_of::<ClusterRecordGpu>();

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClusterHeaderGpu {
    pub x_count: i32,
    pub y_count: i32,
    pub z_count: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClusterRecordGpu {
    pub light_count: u32,
    pub light_indices: [u32; MAX_LIGHTS_PER_CLUSTER],
}

impl Default for ClusterRecordGpu {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

impl ClusterRecordGpu {
    pub fn lights(&self) -> &[u32] {
        &self.light_indices[..self.light_count as usize]
    }

    fn try_push(&mut self, light_index: u32) -> bool {
        let count = self.light_count as usize;
        if count >= MAX_LIGHTS_PER_CLUSTER {
            return false;
        }
        self.light_indices[count] = light_index;
        self.light_count += 1;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DepthSlicing {
    /// `near * (far / near)^(k / z)`: thin slices close to the camera.
    #[default]
    Exponential,
    /// `near + (far - near) * k / z`.
    Linear,
}

impl DepthSlicing {
    /// Depth of boundary `k` out of `count` slices. Boundary 0 is `near` and `count` is `far`.
    pub fn boundary(self, near: f32, far: f32, k: u32, count: u32) -> f32 {
        if k == 0 {
            return near;
        }
        if k >= count {
            return far;
        }
        let t = k as f32 / count as f32;
        match self {
            DepthSlicing::Linear => near + (far - near) * t,
            DepthSlicing::Exponential => near * (far / near).powf(t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterDims {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl ClusterDims {
    /// Every axis holds at least one cluster.
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x: x.max(1), y: y.max(1), z: z.max(1) }
    }

    pub const fn cluster_count(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }

    pub fn flat_index(&self, x: u32, y: u32, z: u32) -> usize {
        cluster_flat_index(x, y, z, self.x, self.y)
    }
}

/// World-space influence sphere of one light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightVolume {
    pub center: Vec3,
    pub radius: f32,
}

impl LightVolume {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Light index lists for every cluster of one frame, ready to be packed for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterGrid {
    dims: ClusterDims,
    slicing: DepthSlicing,
    slice_depths: Vec<f32>,
    records: Vec<ClusterRecordGpu>,
}

impl ClusterGrid {
    pub fn empty(dims: ClusterDims) -> Self {
        Self {
            dims,
            slicing: DepthSlicing::default(),
            slice_depths: Vec::new(),
            records: vec![ClusterRecordGpu::default(); dims.cluster_count()],
        }
    }

    /// Size in bytes of a packed grid with `cluster_count` clusters.
    pub const fn packed_size(cluster_count: usize) -> usize {
        CLUSTER_HEADER_SIZE + CLUSTER_RECORD_SIZE * cluster_count
    }

    pub fn dims(&self) -> ClusterDims {
        self.dims
    }

    pub fn slicing(&self) -> DepthSlicing {
        self.slicing
    }

    /// `z + 1` ascending boundary depths, empty for a grid that was never built.
    pub fn slice_depths(&self) -> &[f32] {
        &self.slice_depths
    }

    pub fn header(&self) -> ClusterHeaderGpu {
        ClusterHeaderGpu { x_count: self.dims.x as i32, y_count: self.dims.y as i32, z_count: self.dims.z as i32 }
    }

    pub fn records(&self) -> &[ClusterRecordGpu] {
        &self.records
    }

    pub fn record(&self, x: u32, y: u32, z: u32) -> &ClusterRecordGpu {
        &self.records[self.dims.flat_index(x, y, z)]
    }

    pub fn lights_in(&self, x: u32, y: u32, z: u32) -> &[u32] {
        self.record(x, y, z).lights()
    }

    pub fn byte_size(&self) -> usize {
        Self::packed_size(self.records.len())
    }

    /// Header followed by every record in flat `z, y, x` order, native-endian.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        out.clear();
        out.reserve(self.byte_size());
        out.extend_from_slice(bytemuck::bytes_of(&self.header()));
        out.extend_from_slice(bytemuck::cast_slice(&self.records));
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_bytes(&mut bytes);
        bytes
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClusterMetrics {
    pub total_lights: u32,
    pub visible_lights: u32,
    pub total_clusters: u32,
    pub active_clusters: u32,
    pub light_assignments: u32,
    pub max_lights_per_cluster: u32,
    pub overflow_drops: u32,
    pub overflow_clusters: u32,
    pub cache_hits: u64,
}

impl ClusterMetrics {
    pub fn culled_lights(&self) -> u32 {
        self.total_lights.saturating_sub(self.visible_lights)
    }

    pub fn average_lights_per_cluster(&self) -> f32 {
        if self.total_clusters == 0 {
            0.0
        } else {
            self.light_assignments as f32 / self.total_clusters as f32
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct BoundsKey {
    near: u32,
    far: u32,
    shape: [u32; 5],
    dims: ClusterDims,
    slicing: DepthSlicing,
}

impl BoundsKey {
    fn new(frustum: &ViewFrustum, dims: ClusterDims, slicing: DepthSlicing) -> Self {
        let shape = match frustum.shape {
            FrustumShape::Perspective { tan_half_fov_y, aspect } => {
                [0, tan_half_fov_y.to_bits(), aspect.to_bits(), 0, 0]
            }
            FrustumShape::Orthographic { left, right, bottom, top } => {
                [1, left.to_bits(), right.to_bits(), bottom.to_bits(), top.to_bits()]
            }
        };
        Self { near: frustum.near.to_bits(), far: frustum.far.to_bits(), shape, dims, slicing }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct BuildKey {
    bounds: BoundsKey,
    view: [u32; 16],
}

/// The last build, reused only for bit-identical inputs.
#[derive(Clone, Debug, Default)]
struct ClusterCache {
    key: Option<BuildKey>,
    lights: Vec<LightVolume>,
    grid: Option<ClusterGrid>,
    metrics: ClusterMetrics,
}

impl ClusterCache {
    fn lookup(&self, key: &BuildKey, lights: &[LightVolume]) -> Option<(&ClusterGrid, ClusterMetrics)> {
        match (&self.key, &self.grid) {
            (Some(cached), Some(grid)) if cached == key && same_light_bits(&self.lights, lights) => {
                Some((grid, self.metrics))
            }
            _ => None,
        }
    }

    fn store(&mut self, key: BuildKey, lights: &[LightVolume], grid: &ClusterGrid, metrics: ClusterMetrics) {
        self.key = Some(key);
        self.lights.clear();
        self.lights.extend_from_slice(lights);
        self.grid = Some(grid.clone());
        self.metrics = metrics;
    }

    fn invalidate(&mut self) {
        self.key = None;
        self.lights.clear();
        self.grid = None;
    }
}

/// View-space cluster bounds, rebuilt only when the frustum shape or grid layout changes.
#[derive(Default)]
struct ClusterScratch {
    key: Option<BoundsKey>,
    slice_depths: Vec<f32>,
    bounds: Vec<(Vec3, Vec3)>,
    overflowed: Vec<bool>,
}

impl ClusterScratch {
    fn prepare(&mut self, frustum: &ViewFrustum, dims: ClusterDims, slicing: DepthSlicing) {
        let key = BoundsKey::new(frustum, dims, slicing);
        if self.key == Some(key) {
            return;
        }
        self.slice_depths.clear();
        self.slice_depths.extend((0..=dims.z).map(|k| slicing.boundary(frustum.near, frustum.far, k, dims.z)));

        self.bounds.clear();
        self.bounds.reserve(dims.cluster_count());
        for z in 0..dims.z {
            let near_depth = self.slice_depths[z as usize];
            let far_depth = self.slice_depths[z as usize + 1];
            let near_rect = frustum.cross_section(near_depth);
            let far_rect = frustum.cross_section(far_depth);
            for y in 0..dims.y {
                let (y0, y1) = (y as f32 / dims.y as f32, (y + 1) as f32 / dims.y as f32);
                for x in 0..dims.x {
                    let (x0, x1) = (x as f32 / dims.x as f32, (x + 1) as f32 / dims.x as f32);
                    let lo_near = lerp_rect(near_rect, x0, y0);
                    let hi_near = lerp_rect(near_rect, x1, y1);
                    let lo_far = lerp_rect(far_rect, x0, y0);
                    let hi_far = lerp_rect(far_rect, x1, y1);
                    let min = lo_near.min(lo_far).extend(-far_depth);
                    let max = hi_near.max(hi_far).extend(-near_depth);
                    self.bounds.push((min, max));
                }
            }
        }
        self.key = Some(key);
    }
}

fn lerp_rect((min, max): (Vec2, Vec2), fx: f32, fy: f32) -> Vec2 {
    Vec2::new(min.x + (max.x - min.x) * fx, min.y + (max.y - min.y) * fy)
}

/// Inclusive on the surface: a sphere that only touches the box counts.
fn sphere_touches_aabb(center: Vec3, radius: f32, min: Vec3, max: Vec3) -> bool {
    let closest = center.clamp(min, max);
    closest.distance_squared(center) <= radius * radius
}

/// Slices `[d[k], d[k + 1]]` overlapping the closed depth interval `[lo, hi]`.
fn slice_range(depths: &[f32], lo: f32, hi: f32) -> Option<(u32, u32)> {
    let slices = depths.len().checked_sub(1)?;
    let start = depths[1..].partition_point(|&d| d < lo);
    let end = depths[..slices].partition_point(|&d| d <= hi);
    (start < end).then(|| (start as u32, end as u32 - 1))
}

/// Assigns lights to the clusters of a camera's view volume.
pub struct ClusterBuilder {
    dims: ClusterDims,
    slicing: DepthSlicing,
    scratch: ClusterScratch,
    cache: ClusterCache,
    metrics: ClusterMetrics,
}

impl ClusterBuilder {
    pub fn new(dims: ClusterDims, slicing: DepthSlicing) -> Self {
        Self {
            dims,
            slicing,
            scratch: ClusterScratch::default(),
            cache: ClusterCache::default(),
            metrics: ClusterMetrics::default(),
        }
    }

    pub fn dims(&self) -> ClusterDims {
        self.dims
    }

    pub fn slicing(&self) -> DepthSlicing {
        self.slicing
    }

    pub fn metrics(&self) -> &ClusterMetrics {
        &self.metrics
    }

    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }

    pub fn empty_grid(&self) -> ClusterGrid {
        ClusterGrid::empty(self.dims)
    }

    pub fn build(&mut self, camera: &mut Camera, lights: &[LightVolume]) -> ClusterGrid {
        let frustum = camera.frustum();
        self.build_from_frustum(&frustum, lights)
    }

    pub fn build_from_frustum(&mut self, frustum: &ViewFrustum, lights: &[LightVolume]) -> ClusterGrid {
        let slicing = self.effective_slicing(frustum);
        let key = BuildKey {
            bounds: BoundsKey::new(frustum, self.dims, slicing),
            view: frustum.view.to_cols_array().map(f32::to_bits),
        };
        let cache_hits = self.metrics.cache_hits;
        if let Some((grid, metrics)) = self.cache.lookup(&key, lights) {
            self.metrics = ClusterMetrics { cache_hits: cache_hits + 1, ..metrics };
            return grid.clone();
        }

        let grid = self.assign(frustum, slicing, lights);
        self.metrics.cache_hits = cache_hits;
        if self.metrics.overflow_drops > 0 {
            log::debug!(
                "{} light assignment(s) dropped across {} full cluster(s) (capacity {})",
                self.metrics.overflow_drops,
                self.metrics.overflow_clusters,
                MAX_LIGHTS_PER_CLUSTER
            );
        }
        self.cache.store(key, lights, &grid, self.metrics);
        grid
    }

    fn effective_slicing(&self, frustum: &ViewFrustum) -> DepthSlicing {
        if self.slicing == DepthSlicing::Exponential && frustum.near <= 0.0 {
            // Geometric spacing is undefined from depth zero.
            DepthSlicing::Linear
        } else {
            self.slicing
        }
    }

    fn assign(&mut self, frustum: &ViewFrustum, slicing: DepthSlicing, lights: &[LightVolume]) -> ClusterGrid {
        let dims = self.dims;
        self.scratch.prepare(frustum, dims, slicing);
        self.scratch.overflowed.clear();
        self.scratch.overflowed.resize(dims.cluster_count(), false);

        let mut records = vec![ClusterRecordGpu::default(); dims.cluster_count()];
        let mut metrics = ClusterMetrics {
            total_lights: lights.len() as u32,
            total_clusters: dims.cluster_count() as u32,
            ..Default::default()
        };

        for (index, light) in lights.iter().enumerate() {
            let center = frustum.view.transform_point3(light.center);
            let radius = light.radius.max(0.0);
            let depth = -center.z;
            if depth + radius < frustum.near || depth - radius > frustum.far {
                continue;
            }
            let Some((z_start, z_end)) = slice_range(&self.scratch.slice_depths, depth - radius, depth + radius)
            else {
                continue;
            };
            #[cfg(feature = "cluster_trace")]
            log::trace!("light {index} depth {depth:.3} r {radius:.3} -> slices {z_start}..={z_end}");

            let mut touched = false;
            for z in z_start..=z_end {
                for y in 0..dims.y {
                    for x in 0..dims.x {
                        let idx = dims.flat_index(x, y, z);
                        let (min, max) = self.scratch.bounds[idx];
                        if !sphere_touches_aabb(center, radius, min, max) {
                            continue;
                        }
                        touched = true;
                        if records[idx].try_push(index as u32) {
                            metrics.light_assignments += 1;
                        } else {
                            metrics.overflow_drops += 1;
                            self.scratch.overflowed[idx] = true;
                        }
                    }
                }
            }
            if touched {
                metrics.visible_lights += 1;
            }
        }

        metrics.active_clusters = records.iter().filter(|record| record.light_count > 0).count() as u32;
        metrics.max_lights_per_cluster = records.iter().map(|record| record.light_count).max().unwrap_or(0);
        metrics.overflow_clusters = self.scratch.overflowed.iter().filter(|flag| **flag).count() as u32;
        self.metrics = metrics;

        ClusterGrid { dims, slicing, slice_depths: self.scratch.slice_depths.clone(), records }
    }
}

fn cluster_flat_index(x: u32, y: u32, z: u32, grid_x: u32, grid_y: u32) -> usize {
    (z as usize * grid_x as usize * grid_y as usize) + (y as usize * grid_x as usize) + x as usize
}

fn light_bits(light: &LightVolume) -> [u32; 4] {
    [light.center.x.to_bits(), light.center.y.to_bits(), light.center.z.to_bits(), light.radius.to_bits()]
}

fn same_light_bits(cached: &[LightVolume], lights: &[LightVolume]) -> bool {
    cached.len() == lights.len() && cached.iter().zip(lights).all(|(a, b)| light_bits(a) == light_bits(b))
}
