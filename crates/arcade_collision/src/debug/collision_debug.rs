//! Collision-specific debug visualization
//!
//! Turns grid cells, body boxes, fine shapes, projectile sweeps and pick rays
//! into [`DebugDraw`] calls.

use bitflags::bitflags;

use crate::debug::draw::{DebugDraw, DebugDrawSystem, DebugShape};
use crate::foundation::math::{utils, Mat4, Vec4};
use crate::physics::collision::{Ray, Shape, ShapeKind};
use crate::physics::collision_system::CollisionWorld;
use crate::physics::projectile::ProjectileSystem;
use crate::spatial::{Aabb, SpatialHashGrid};

bitflags! {
    /// What the visualizer draws
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CollisionDebugFlags: u32 {
        /// Occupied grid cells
        const CELLS = 1 << 0;
        /// Coarse world OBBs
        const OBBS = 1 << 1;
        /// Fine-grained SAT shapes
        const SHAPES = 1 << 2;
        /// Stretched projectile boxes and hit points
        const PROJECTILES = 1 << 3;
        /// Pick rays
        const PICK_RAYS = 1 << 4;
        /// MTV of each contact
        const CONTACTS = 1 << 5;
    }
}

impl Default for CollisionDebugFlags {
    fn default() -> Self {
        Self::OBBS | Self::SHAPES | Self::PROJECTILES
    }
}

/// Color scheme for collision visualization
#[derive(Clone, Debug)]
pub struct CollisionDebugColors {
    /// Occupied grid cells
    pub cell: Vec4,
    /// Shapes and boxes not currently colliding
    pub shape_default: Vec4,
    /// Shapes and boxes currently colliding
    pub shape_colliding: Vec4,
    /// Projectile boxes
    pub projectile: Vec4,
    /// Projectile hit points
    pub hit: Vec4,
    /// Pick rays that missed
    pub pick_miss: Vec4,
    /// Pick rays that selected a body
    pub pick_hit: Vec4,
}

impl Default for CollisionDebugColors {
    fn default() -> Self {
        Self {
            cell: Vec4::new(0.5, 0.8, 1.0, 0.15),
            shape_default: Vec4::new(0.0, 1.0, 0.0, 0.3),
            shape_colliding: Vec4::new(1.0, 0.0, 0.0, 0.5),
            projectile: Vec4::new(1.0, 0.6, 0.0, 1.0),
            hit: Vec4::new(1.0, 1.0, 0.0, 1.0),
            pick_miss: Vec4::new(0.6, 0.6, 0.6, 1.0),
            pick_hit: Vec4::new(0.0, 1.0, 1.0, 1.0),
        }
    }
}

/// Collision-specific debug visualizer
pub struct CollisionDebugVisualizer {
    debug_draw: DebugDrawSystem,
    colors: CollisionDebugColors,
    /// Enabled layers of the visualization
    pub flags: CollisionDebugFlags,
}

impl CollisionDebugVisualizer {
    /// Create a new collision debug visualizer
    pub fn new() -> Self {
        Self {
            debug_draw: DebugDrawSystem::new(),
            colors: CollisionDebugColors::default(),
            flags: CollisionDebugFlags::default(),
        }
    }

    /// Set custom color scheme
    pub fn with_colors(mut self, colors: CollisionDebugColors) -> Self {
        self.colors = colors;
        self
    }

    /// Set which layers are drawn
    pub fn with_flags(mut self, flags: CollisionDebugFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Draw every non-empty cell of a grid
    pub fn draw_grid_cells<T>(&mut self, grid: &SpatialHashGrid<T>) {
        if !self.flags.contains(CollisionDebugFlags::CELLS) {
            return;
        }
        for cell in grid.cells() {
            let bounds = grid.cell_bounds(&cell.index());
            self.debug_draw.cube(&aabb_model(&bounds), self.colors.cell);
        }
    }

    /// Draw the bodies of a collision world, highlighting current collisions
    pub fn draw_world(&mut self, world: &CollisionWorld) {
        let colliding: Vec<_> = world
            .current_collisions()
            .iter()
            .flat_map(|pair| [pair.body_a, pair.body_b])
            .collect();

        for (key, body) in world.bodies() {
            let color = if colliding.contains(&key) {
                self.colors.shape_colliding
            } else {
                self.colors.shape_default
            };
            let data = body.data();
            if self.flags.contains(CollisionDebugFlags::OBBS) {
                self.debug_draw.box_corners(data.world_obb(), color);
            }
            if self.flags.contains(CollisionDebugFlags::SHAPES) {
                for shape_data in data.shapes() {
                    self.draw_shape(&shape_data.shape, color);
                }
            }
        }

        if self.flags.contains(CollisionDebugFlags::CONTACTS) {
            for contact in world.contacts() {
                let Some(body) = world.body(contact.pair.body_a) else {
                    continue;
                };
                let origin = utils::translation_of(body.data().world_transform());
                self.debug_draw
                    .line(origin, origin + world.separation(contact), self.colors.shape_colliding);
            }
        }
    }

    /// Draw one SAT shape
    ///
    /// Cubes are drawn exactly; other shapes as their world bounds.
    pub fn draw_shape(&mut self, shape: &Shape, color: Vec4) {
        match shape.kind() {
            ShapeKind::Cube => self.debug_draw.cube(shape.transform(), color),
            _ => self.debug_draw.cube(&aabb_model(&shape.world_bounds()), color),
        }
    }

    /// Draw projectile sweep boxes and hit points
    pub fn draw_projectiles(&mut self, projectiles: &ProjectileSystem) {
        if !self.flags.contains(CollisionDebugFlags::PROJECTILES) {
            return;
        }
        for (_, projectile) in projectiles.iter() {
            self.debug_draw.cube(projectile.collision_transform(), self.colors.projectile);
            if let Some(location) = projectile.hit_location() {
                self.debug_draw.sphere(location, 0.25, self.colors.hit);
            }
        }
    }

    /// Draw a pick ray out to `length`
    pub fn draw_pick_ray(&mut self, ray: &Ray, length: f32, hit: bool) {
        if !self.flags.contains(CollisionDebugFlags::PICK_RAYS) {
            return;
        }
        let color = if hit { self.colors.pick_hit } else { self.colors.pick_miss };
        self.debug_draw.line(ray.start, ray.point_at(length), color);
    }

    /// Clear all visualization
    pub fn clear(&mut self) {
        self.debug_draw.clear();
    }

    /// Update debug system (expire temporary shapes)
    pub fn update(&mut self, delta_time: f32) {
        self.debug_draw.update(delta_time);
    }

    /// All debug shapes for rendering
    pub fn shapes(&self) -> impl Iterator<Item = &DebugShape> {
        self.debug_draw.shapes()
    }

    /// Enable/disable the entire debug system
    pub fn set_enabled(&mut self, enabled: bool) {
        self.debug_draw.enabled = enabled;
    }

    /// Check if debug system is enabled
    pub fn is_enabled(&self) -> bool {
        self.debug_draw.enabled
    }

    /// Underlying debug draw system
    pub fn debug_draw(&self) -> &DebugDrawSystem {
        &self.debug_draw
    }

    /// Mutable access to the underlying debug draw system
    pub fn debug_draw_mut(&mut self) -> &mut DebugDrawSystem {
        &mut self.debug_draw
    }
}

impl Default for CollisionDebugVisualizer {
    fn default() -> Self {
        Self::new()
    }
}

fn aabb_model(bounds: &Aabb) -> Mat4 {
    Mat4::new_translation(&bounds.center()) * Mat4::new_nonuniform_scaling(&bounds.size())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectileSettings;
    use crate::foundation::math::Vec3;
    use crate::physics::collision_data::CollisionData;
    use crate::physics::collision_layers::CollisionFilter;
    use crate::physics::projectile::ProjectileSpawn;
    use approx::assert_relative_eq;

    fn world_with_overlap() -> CollisionWorld {
        let mut world = CollisionWorld::with_cell_size(Vec3::repeat(4.0)).unwrap();
        for x in [0.0, 0.5] {
            let mut data = CollisionData::unit_cube();
            data.update_to_new_world_transform(&Mat4::new_translation(&Vec3::new(x, 0.0, 0.0)));
            world.add_body(data, CollisionFilter::ship());
        }
        world.detect_collisions();
        world
    }

    #[test]
    fn test_world_draws_obbs_and_shapes() {
        let world = world_with_overlap();
        let mut viz = CollisionDebugVisualizer::new().with_flags(CollisionDebugFlags::OBBS | CollisionDebugFlags::SHAPES);
        viz.draw_world(&world);

        // Two bodies, each 12 OBB edges plus one cube shape
        assert_eq!(viz.shapes().count(), 2 * 13);
        let colliding = CollisionDebugColors::default().shape_colliding;
        assert!(viz.shapes().all(|s| match s {
            DebugShape::Line { color, .. } | DebugShape::Box { color, .. } => *color == colliding,
            _ => false,
        }));
    }

    #[test]
    fn test_grid_cells_respect_flags() {
        let world = world_with_overlap();
        let mut viz = CollisionDebugVisualizer::new();
        viz.draw_grid_cells(crate::physics::CollisionLookup::grid(&world));
        assert_eq!(viz.shapes().count(), 0);

        viz.flags |= CollisionDebugFlags::CELLS;
        viz.draw_grid_cells(crate::physics::CollisionLookup::grid(&world));
        let first = viz.shapes().next().and_then(DebugShape::box_corners).unwrap();
        let bounds = Aabb::from_points(&first).unwrap();
        assert_relative_eq!(bounds.size(), Vec3::repeat(4.0), epsilon = 1e-5);
    }

    #[test]
    fn test_frame_shapes_expire() {
        let mut projectiles = ProjectileSystem::new(ProjectileSettings::default());
        projectiles.spawn(&ProjectileSpawn::default());
        let mut viz = CollisionDebugVisualizer::new();
        viz.draw_projectiles(&projectiles);
        assert_eq!(viz.shapes().count(), 1);

        viz.update(0.016);
        assert_eq!(viz.shapes().count(), 0);
    }
}
