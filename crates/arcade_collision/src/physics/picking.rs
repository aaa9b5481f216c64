//! Mouse picking
//!
//! A click becomes a world-space ray through the camera's view frustum. The
//! ray walks the grid cells it crosses and each candidate body is tested with
//! a slab test against its local AABB, in the body's own model space.

use log::trace;

use crate::config::PickingConfig;
use crate::foundation::math::{constants, utils, Vec2, Vec3};
use crate::spatial::{Aabb, HashCell};
use super::collision::Ray;
use super::collision_layers::CollisionLayers;
use super::collision_system::{BodyKey, CollisionLookup};

/// Camera basis and projection used to build pick rays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// World position
    pub position: Vec3,
    /// Normalized up vector
    pub up: Vec3,
    /// Normalized right vector
    pub right: Vec3,
    /// Normalized view direction
    pub front: Vec3,
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    /// Width over height
    pub aspect: f32,
}

/// Closest body under a pick ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    /// Picked body
    pub body: BodyKey,
    /// Squared distance from the camera to the body's origin
    pub distance_sq: f32,
}

/// Builds pick rays and resolves them against the collision grid
#[derive(Debug, Clone)]
pub struct ObjectPicker {
    max_distance: f32,
    required_layers: CollisionLayers,
}

impl Default for ObjectPicker {
    fn default() -> Self {
        Self::new(&PickingConfig::default())
    }
}

impl ObjectPicker {
    /// Create a picker that only considers [`CollisionLayers::PICKABLE`] bodies
    pub fn new(config: &PickingConfig) -> Self {
        Self {
            max_distance: config.max_distance,
            required_layers: CollisionLayers::PICKABLE,
        }
    }

    /// Change which layers a body must be on to be pickable
    pub fn with_required_layers(mut self, layers: CollisionLayers) -> Self {
        self.required_layers = layers;
        self
    }

    /// Furthest distance a pick ray reaches
    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// World-space ray through a click point
    ///
    /// `click` is measured in pixels from the top-left corner. The render
    /// plane is taken to sit at distance 1 in front of the camera, so `t` of
    /// the returned ray is the distance from the camera to that plane point.
    pub fn generate_ray(screen_resolution: Vec2, click: Vec2, camera: &CameraView) -> Ray {
        let mut ndc = (click.component_div(&screen_resolution) - Vec2::repeat(0.5)) * 2.0;
        ndc.y = -ndc.y;

        let tan_half_fov = utils::deg_to_rad(camera.fov_y_degrees * 0.5).tan();
        let up = camera.up * (tan_half_fov * ndc.y);
        let right = camera.right * (camera.aspect * tan_half_fov * ndc.x);
        let click_dir = up + right + camera.front;

        Ray::new(camera.position, click_dir, click_dir.norm())
    }

    /// Closest pickable body whose local box the ray passes through
    ///
    /// Bodies are ranked by the squared distance from `ray.start` to their
    /// origin. Returns `None` when nothing is hit.
    pub fn pick<L: CollisionLookup + ?Sized>(&self, ray: &Ray, lookup: &L) -> Option<PickHit> {
        let end = ray.point_at(self.max_distance);
        let mut cells: Vec<&HashCell> = Vec::new();
        lookup.grid().lookup_cells_for_line(&ray.start, &end, &mut cells);

        let mut closest: Option<PickHit> = None;
        for entry in cells.iter().flat_map(|cell| cell.nodes()) {
            let Some(body) = lookup.body_at(*entry) else {
                continue;
            };
            if !lookup.filter(body).is_some_and(|f| f.layer.intersects(self.required_layers)) {
                continue;
            }
            let Some(data) = lookup.collision_data(body) else {
                continue;
            };

            let model = data.world_transform();
            let distance_sq = (utils::translation_of(model) - ray.start).norm_squared();
            if closest.is_some_and(|c| distance_sq >= c.distance_sq) {
                continue;
            }

            let Some(inverse) = model.try_inverse() else {
                trace!("Skipping pick candidate {body:?} with a singular model matrix");
                continue;
            };
            let local_start = utils::transform_point(&inverse, &ray.start);
            let local_dir = utils::transform_vector(&inverse, &ray.dir);
            let Some(local_box) = Aabb::from_points(data.local_aabb()) else {
                continue;
            };

            if ray_hit_test_fast_aabb(&local_box.min, &local_box.max, &local_start, &local_dir) {
                closest = Some(PickHit { body, distance_sq });
            }
        }
        closest
    }
}

/// Slab test of a ray against an axis-aligned box
///
/// `dir` need not be normalized. A component of `dir` that is zero makes that
/// axis unconstrained when the start lies inside the slab, and a miss otherwise.
pub fn ray_hit_test_fast_aabb(box_low: &Vec3, box_max: &Vec3, start: &Vec3, dir: &Vec3) -> bool {
    ray_hit_distance_fast_aabb(box_low, box_max, start, dir).is_some()
}

/// Slab test returning the ray parameter where the ray enters the box
///
/// Returns `Some(0.0)` when the start is inside the box and `None` when the
/// box is missed or lies entirely behind the start.
pub fn ray_hit_distance_fast_aabb(box_low: &Vec3, box_max: &Vec3, start: &Vec3, dir: &Vec3) -> Option<f32> {
    let mut latest_entry = f32::NEG_INFINITY;
    let mut earliest_exit = f32::INFINITY;

    for axis in 0..3 {
        let (low, high, origin, d) = (box_low[axis], box_max[axis], start[axis], dir[axis]);
        if d.abs() < constants::EPSILON {
            if origin < low || origin > high {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let (t0, t1) = ((low - origin) * inv, (high - origin) * inv);
        let (entry, exit) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
        latest_entry = latest_entry.max(entry);
        earliest_exit = earliest_exit.min(exit);
    }

    let entry = latest_entry.max(0.0);
    (entry <= earliest_exit).then_some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::physics::collision_data::CollisionData;
    use crate::physics::collision_layers::CollisionFilter;
    use crate::physics::collision_system::CollisionWorld;
    use approx::assert_relative_eq;

    fn camera() -> CameraView {
        CameraView {
            position: Vec3::zeros(),
            up: Vec3::y(),
            right: Vec3::x(),
            front: -Vec3::z(),
            fov_y_degrees: 90.0,
            aspect: 2.0,
        }
    }

    fn body_at(world: &mut CollisionWorld, position: Vec3, filter: CollisionFilter) -> BodyKey {
        let mut data = CollisionData::unit_cube();
        data.update_to_new_world_transform(&Mat4::new_translation(&position));
        world.add_body(data, filter)
    }

    #[test]
    fn test_center_click_looks_forward() {
        let ray = ObjectPicker::generate_ray(Vec2::new(800.0, 400.0), Vec2::new(400.0, 200.0), &camera());
        assert_relative_eq!(ray.dir, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
        assert_relative_eq!(ray.t, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_corner_click_uses_fov_and_aspect() {
        // Top-left: ndc (-1, 1); tan(45) = 1, so the plane point is (-2, 1, -1)
        let ray = ObjectPicker::generate_ray(Vec2::new(800.0, 400.0), Vec2::zeros(), &camera());
        let expected = Vec3::new(-2.0, 1.0, -1.0);
        assert_relative_eq!(ray.dir, expected.normalize(), epsilon = 1e-5);
        assert_relative_eq!(ray.t, expected.norm(), epsilon = 1e-5);
    }

    #[test]
    fn test_ray_through_center_hits() {
        let low = Vec3::repeat(-1.0);
        let high = Vec3::repeat(1.0);
        assert!(ray_hit_test_fast_aabb(&low, &high, &Vec3::new(-5.0, 0.0, 0.0), &Vec3::new(1.0, 0.0, 0.0)));
        assert!(ray_hit_test_fast_aabb(&low, &high, &Vec3::new(-5.0, -5.0, -5.0), &Vec3::new(1.0, 1.0, 1.0)));
        assert_relative_eq!(
            ray_hit_distance_fast_aabb(&low, &high, &Vec3::new(-5.0, 0.0, 0.0), &Vec3::x()).unwrap(),
            4.0
        );
    }

    #[test]
    fn test_parallel_ray_outside_slab_misses() {
        let low = Vec3::repeat(-1.0);
        let high = Vec3::repeat(1.0);
        assert!(!ray_hit_test_fast_aabb(&low, &high, &Vec3::new(-5.0, 2.0, 0.0), &Vec3::x()));
        assert!(ray_hit_test_fast_aabb(&low, &high, &Vec3::new(-5.0, 0.5, 0.0), &Vec3::x()));
    }

    #[test]
    fn test_box_behind_ray_misses() {
        let low = Vec3::repeat(-1.0);
        let high = Vec3::repeat(1.0);
        assert!(!ray_hit_test_fast_aabb(&low, &high, &Vec3::new(5.0, 0.0, 0.0), &Vec3::x()));
        assert_eq!(ray_hit_distance_fast_aabb(&low, &high, &Vec3::zeros(), &Vec3::x()), Some(0.0));
    }

    #[test]
    fn test_pick_closest_body() {
        let mut world = CollisionWorld::with_cell_size(Vec3::repeat(4.0)).unwrap();
        let far = body_at(&mut world, Vec3::new(0.0, 0.0, -20.0), CollisionFilter::ship());
        let near = body_at(&mut world, Vec3::new(0.0, 0.0, -10.0), CollisionFilter::ship());
        body_at(&mut world, Vec3::new(5.0, 0.0, -5.0), CollisionFilter::ship());

        let picker = ObjectPicker::default();
        let ray = Ray::new(Vec3::zeros(), -Vec3::z(), 1.0);
        let hit = picker.pick(&ray, &world).unwrap();
        assert_eq!(hit.body, near);
        assert_relative_eq!(hit.distance_sq, 100.0);

        world.remove_body(near);
        assert_eq!(picker.pick(&ray, &world).unwrap().body, far);
    }

    #[test]
    fn test_pick_uses_local_space() {
        let mut world = CollisionWorld::with_cell_size(Vec3::repeat(4.0)).unwrap();
        let mut data = CollisionData::unit_cube();
        // Long thin box rotated to lie along x
        let model = Mat4::new_translation(&Vec3::new(0.0, 0.0, -10.0))
            * Mat4::from_euler_angles(0.0, 0.0, constants::PI * 0.5)
            * Mat4::new_nonuniform_scaling(&Vec3::new(0.2, 6.0, 0.2));
        data.update_to_new_world_transform(&model);
        let body = world.add_body(data, CollisionFilter::ship());

        let picker = ObjectPicker::default();
        let off_axis = Ray::new(Vec3::new(2.0, 0.0, 0.0), -Vec3::z(), 1.0);
        assert_eq!(picker.pick(&off_axis, &world).map(|h| h.body), Some(body));
        let above = Ray::new(Vec3::new(0.0, 2.0, 0.0), -Vec3::z(), 1.0);
        assert!(picker.pick(&above, &world).is_none());
    }

    #[test]
    fn test_unpickable_layers_are_ignored() {
        let mut world = CollisionWorld::with_cell_size(Vec3::repeat(4.0)).unwrap();
        body_at(&mut world, Vec3::new(0.0, 0.0, -10.0), CollisionFilter::trigger());
        let ray = Ray::new(Vec3::zeros(), -Vec3::z(), 1.0);
        assert!(ObjectPicker::default().pick(&ray, &world).is_none());
    }
}
