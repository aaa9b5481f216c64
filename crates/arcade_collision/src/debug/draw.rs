//! Debug drawing primitives and system
//!
//! Collision code never talks to a renderer. It pushes lines, boxes and
//! spheres into a [`DebugDraw`] sink, and [`DebugDrawSystem`] keeps them
//! around (optionally for a duration) until the host renders them.

use std::collections::HashMap;

use crate::foundation::math::{utils, Mat4, Vec3, Vec4};
use crate::spatial::{BOX_EDGES, UNIT_CUBE_CORNERS};

/// Unique identifier for persistent debug shapes
pub type DebugShapeId = String;

/// Sink for debug draw calls
pub trait DebugDraw {
    /// Line segment
    fn line(&mut self, start: Vec3, end: Vec3, color: Vec4);

    /// Unit cube placed by `model`
    fn cube(&mut self, model: &Mat4, color: Vec4);

    /// Sphere
    fn sphere(&mut self, center: Vec3, radius: f32, color: Vec4);

    /// Wireframe through eight corners in unit-cube order
    fn box_corners(&mut self, corners: &[Vec3; 8], color: Vec4) {
        for (a, b) in BOX_EDGES {
            self.line(corners[a], corners[b], color);
        }
    }
}

/// Debug shape primitives that can be rendered for visualization
#[derive(Clone, Debug, PartialEq)]
pub enum DebugShape {
    /// Line segment from start to end
    Line {
        /// Start point
        start: Vec3,
        /// End point
        end: Vec3,
        /// RGBA color
        color: Vec4,
        /// Seconds left on screen
        duration: f32,
    },

    /// Sphere at center with radius
    Sphere {
        /// Center
        center: Vec3,
        /// Radius
        radius: f32,
        /// RGBA color
        color: Vec4,
        /// Seconds left on screen
        duration: f32,
    },

    /// Unit cube under a model matrix (AABB, OBB or stretched projectile box)
    Box {
        /// Model matrix applied to the unit cube
        transform: Mat4,
        /// RGBA color
        color: Vec4,
        /// Seconds left on screen
        duration: f32,
    },

    /// Point at position
    Point {
        /// Position
        position: Vec3,
        /// RGBA color
        color: Vec4,
        /// Point size in pixels
        size: f32,
        /// Seconds left on screen
        duration: f32,
    },
}

impl DebugShape {
    fn duration_mut(&mut self) -> &mut f32 {
        match self {
            Self::Line { duration, .. }
            | Self::Sphere { duration, .. }
            | Self::Box { duration, .. }
            | Self::Point { duration, .. } => duration,
        }
    }

    /// Get remaining duration
    pub fn duration(&self) -> f32 {
        match self {
            Self::Line { duration, .. }
            | Self::Sphere { duration, .. }
            | Self::Box { duration, .. }
            | Self::Point { duration, .. } => *duration,
        }
    }

    /// Set duration (returns modified shape)
    pub fn with_duration(mut self, new_duration: f32) -> Self {
        *self.duration_mut() = new_duration;
        self
    }

    /// Decrease duration by delta_time, returns true if expired
    pub fn tick(&mut self, delta_time: f32) -> bool {
        let duration = self.duration_mut();
        *duration -= delta_time;
        *duration <= 0.0
    }

    /// Corners of a box shape in world space
    pub fn box_corners(&self) -> Option<[Vec3; 8]> {
        match self {
            Self::Box { transform, .. } => Some(UNIT_CUBE_CORNERS.map(|c| utils::transform_point(transform, &c))),
            _ => None,
        }
    }
}

/// Collects debug shapes until the host renders them
///
/// Temporary shapes expire after their duration (zero means one frame).
/// Persistent shapes remain until removed.
pub struct DebugDrawSystem {
    temporary_shapes: Vec<DebugShape>,
    persistent_shapes: HashMap<DebugShapeId, DebugShape>,
    /// Master enable/disable flag
    pub enabled: bool,
    /// Duration given to shapes drawn through [`DebugDraw`]
    pub default_duration: f32,
}

impl DebugDrawSystem {
    /// Create a new debug draw system
    pub fn new() -> Self {
        Self {
            temporary_shapes: Vec::new(),
            persistent_shapes: HashMap::new(),
            enabled: true,
            default_duration: 0.0,
        }
    }

    /// Add a temporary shape
    pub fn push(&mut self, shape: DebugShape) {
        if self.enabled {
            self.temporary_shapes.push(shape);
        }
    }

    /// Draw a line segment (temporary)
    pub fn draw_line(&mut self, start: Vec3, end: Vec3, color: Vec4, duration: f32) {
        self.push(DebugShape::Line { start, end, color, duration });
    }

    /// Draw a sphere (temporary)
    pub fn draw_sphere(&mut self, center: Vec3, radius: f32, color: Vec4, duration: f32) {
        self.push(DebugShape::Sphere { center, radius, color, duration });
    }

    /// Draw a transformed unit cube (temporary)
    pub fn draw_box(&mut self, transform: Mat4, color: Vec4, duration: f32) {
        self.push(DebugShape::Box { transform, color, duration });
    }

    /// Draw a point (temporary)
    pub fn draw_point(&mut self, position: Vec3, color: Vec4, size: f32, duration: f32) {
        self.push(DebugShape::Point { position, color, size, duration });
    }

    /// Draw a persistent shape that remains until explicitly removed
    pub fn draw_persistent(&mut self, id: impl Into<String>, shape: DebugShape) {
        if self.enabled {
            self.persistent_shapes.insert(id.into(), shape);
        }
    }

    /// Remove a persistent shape
    pub fn clear_persistent(&mut self, id: &str) {
        self.persistent_shapes.remove(id);
    }

    /// Clear all persistent shapes
    pub fn clear_all_persistent(&mut self) {
        self.persistent_shapes.clear();
    }

    /// Update shape lifetimes and remove expired temporary shapes
    pub fn update(&mut self, delta_time: f32) {
        if !self.enabled {
            return;
        }
        self.temporary_shapes.retain_mut(|shape| !shape.tick(delta_time));
    }

    /// All shapes for rendering, temporary first
    pub fn shapes(&self) -> impl Iterator<Item = &DebugShape> {
        let visible = self.enabled;
        self.temporary_shapes
            .iter()
            .chain(self.persistent_shapes.values())
            .filter(move |_| visible)
    }

    /// Get the number of active shapes
    pub fn shape_count(&self) -> usize {
        self.temporary_shapes.len() + self.persistent_shapes.len()
    }

    /// Clear all shapes (temporary and persistent)
    pub fn clear(&mut self) {
        self.temporary_shapes.clear();
        self.persistent_shapes.clear();
    }
}

impl Default for DebugDrawSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugDraw for DebugDrawSystem {
    fn line(&mut self, start: Vec3, end: Vec3, color: Vec4) {
        self.draw_line(start, end, color, self.default_duration);
    }

    fn cube(&mut self, model: &Mat4, color: Vec4) {
        self.draw_box(*model, color, self.default_duration);
    }

    fn sphere(&mut self, center: Vec3, radius: f32, color: Vec4) {
        self.draw_sphere(center, radius, color, self.default_duration);
    }
}
