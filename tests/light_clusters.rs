use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vireo_engine::camera::Camera;
use vireo_engine::renderer::light_clusters::{
    ClusterBuilder, ClusterDims, ClusterGrid, DepthSlicing, LightVolume, CLUSTER_RECORD_SIZE,
    MAX_LIGHTS_PER_CLUSTER,
};

// With this camera and a 16^3 linear grid every cluster is a unit cube:
// x, y in [-8 + i, -7 + i] and view depth in [1 + k, 2 + k].
fn unit_cube_camera() -> Camera {
    Camera::orthographic(-8.0, 8.0, -8.0, 8.0, 1.0, 17.0)
}

fn unit_cube_builder() -> ClusterBuilder {
    ClusterBuilder::new(ClusterDims::new(16, 16, 16), DepthSlicing::Linear)
}

fn reference_touch(light: &LightVolume, x: u32, y: u32, z: u32) -> bool {
    let min = Vec3::new(-8.0 + x as f32, -8.0 + y as f32, -(2.0 + z as f32));
    let max = Vec3::new(-7.0 + x as f32, -7.0 + y as f32, -(1.0 + z as f32));
    let closest = light.center.clamp(min, max);
    closest.distance_squared(light.center) <= light.radius * light.radius
}

fn random_lights(rng: &mut StdRng, count: usize) -> Vec<LightVolume> {
    (0..count)
        .map(|_| {
            let center = Vec3::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0), rng.gen_range(-20.0..2.0));
            LightVolume::new(center, rng.gen_range(0.1..1.5))
        })
        .collect()
}

#[test]
fn assignment_matches_brute_force_reference() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut builder = unit_cube_builder();
    for _ in 0..8 {
        let lights = random_lights(&mut rng, 24);
        let grid = builder.build(&mut unit_cube_camera(), &lights);
        for z in 0..16 {
            for y in 0..16 {
                for x in 0..16 {
                    let expected: Vec<u32> = lights
                        .iter()
                        .enumerate()
                        .filter(|(_, light)| reference_touch(light, x, y, z))
                        .map(|(index, _)| index as u32)
                        .collect();
                    assert_eq!(grid.lights_in(x, y, z), expected.as_slice(), "cluster ({x}, {y}, {z})");
                }
            }
        }
        assert_eq!(builder.metrics().overflow_drops, 0);
    }
}

#[test]
fn visible_light_count_matches_lights_with_any_cluster() {
    let mut rng = StdRng::seed_from_u64(99);
    let lights = random_lights(&mut rng, 40);
    let mut builder = unit_cube_builder();
    let grid = builder.build(&mut unit_cube_camera(), &lights);

    let mut seen = vec![false; lights.len()];
    for record in grid.records() {
        for &index in record.lights() {
            seen[index as usize] = true;
        }
    }
    let metrics = builder.metrics();
    assert_eq!(metrics.visible_lights as usize, seen.iter().filter(|s| **s).count());
    assert_eq!(metrics.total_lights, 40);
    assert_eq!(metrics.culled_lights(), 40 - metrics.visible_lights);
}

#[test]
fn crowded_cluster_keeps_the_first_lights_only() {
    let crowd: Vec<LightVolume> =
        (0..MAX_LIGHTS_PER_CLUSTER + 5).map(|_| LightVolume::new(Vec3::new(0.5, 0.5, -1.5), 0.1)).collect();
    let mut builder = unit_cube_builder();
    let grid = builder.build(&mut unit_cube_camera(), &crowd);

    let expected: Vec<u32> = (0..MAX_LIGHTS_PER_CLUSTER as u32).collect();
    assert_eq!(grid.lights_in(8, 8, 0), expected.as_slice());
    let metrics = builder.metrics();
    assert_eq!(metrics.overflow_drops, 5);
    assert_eq!(metrics.overflow_clusters, 1);
    assert_eq!(metrics.max_lights_per_cluster, MAX_LIGHTS_PER_CLUSTER as u32);
}

#[test]
fn packed_size_follows_cluster_count() {
    for (x, y, z) in [(1, 1, 1), (16, 9, 24), (3, 5, 7)] {
        let mut builder = ClusterBuilder::new(ClusterDims::new(x, y, z), DepthSlicing::Exponential);
        let mut camera = Camera::first_person(Vec3::ZERO, Vec3::ZERO, 1.0, 1.5, 0.1, 100.0);
        let grid = builder.build(&mut camera, &[LightVolume::new(Vec3::new(0.0, 0.0, -10.0), 2.0)]);
        let count = (x * y * z) as usize;
        assert_eq!(grid.records().len(), count);
        assert_eq!(grid.to_bytes().len(), 12 + count * CLUSTER_RECORD_SIZE);
        assert_eq!(grid.to_bytes().len(), ClusterGrid::packed_size(count));
    }
}

#[test]
fn independent_builders_produce_identical_bytes() {
    let mut rng = StdRng::seed_from_u64(1234);
    let lights = random_lights(&mut rng, 64);
    let mut camera = Camera::first_person(Vec3::new(0.0, 0.0, 4.0), Vec3::new(0.1, 0.3, 0.0), 1.1, 1.7, 0.5, 60.0);

    let mut a = ClusterBuilder::new(ClusterDims::new(16, 9, 24), DepthSlicing::Exponential);
    let mut b = ClusterBuilder::new(ClusterDims::new(16, 9, 24), DepthSlicing::Exponential);
    let first = a.build(&mut camera, &lights).to_bytes();
    let second = b.build(&mut camera, &lights).to_bytes();
    assert_eq!(first, second);

    a.invalidate_cache();
    assert_eq!(a.build(&mut camera, &lights).to_bytes(), first);
}

#[test]
fn camera_looking_straight_up_still_sees_lights_above() {
    let mut camera = Camera::looking_at(Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0), 1.0, 1.0, 0.1, 50.0);
    let mut builder = ClusterBuilder::new(ClusterDims::new(16, 9, 24), DepthSlicing::Exponential);
    let grid = builder.build(&mut camera, &[LightVolume::new(Vec3::new(0.0, 5.0, 0.0), 2.0)]);
    assert_eq!(builder.metrics().visible_lights, 1);
    assert!(builder.metrics().light_assignments > 0);
    assert!(grid.records().iter().any(|record| record.lights() == [0]));
}

#[test]
fn lights_behind_the_camera_are_culled() {
    let mut builder = unit_cube_builder();
    let lights = [
        LightVolume::new(Vec3::new(0.0, 0.0, 3.0), 1.0),
        LightVolume::new(Vec3::new(0.0, 0.0, -40.0), 2.0),
        LightVolume::new(Vec3::new(0.0, 0.0, -5.0), 0.5),
    ];
    let grid = builder.build(&mut unit_cube_camera(), &lights);
    assert_eq!(builder.metrics().visible_lights, 1);
    assert!(grid.records().iter().flat_map(|r| r.lights()).all(|&index| index == 2));
}
