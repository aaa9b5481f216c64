//! Per-tick collision detection between registered bodies
//!
//! The detection is split into two phases. The broad phase asks the spatial
//! hash grid which bodies share a cell and drops pairs the layer filters
//! reject. The narrow phase runs SAT first on the coarse OBBs and then on every
//! pair of fine-grained shapes, recording the first MTV found.

use std::collections::HashSet;

use log::{debug, trace};

use crate::config::CollisionConfig;
use crate::foundation::collections::{new_key_type, SlotMap};
use crate::foundation::math::{Mat4, Vec3};
use crate::spatial::{EntryKey, HashEntry, SpatialHashGrid};
use super::collision::{collision_test_with, Mtv, SatScratch};
use super::collision_data::CollisionData;
use super::collision_layers::CollisionFilter;
use super::CollisionError;

new_key_type! {
    /// Handle of a body registered with a [`CollisionWorld`]
    pub struct BodyKey;
}

/// Two bodies that overlap; `body_a` always has the smaller key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionPair {
    /// First body
    pub body_a: BodyKey,
    /// Second body
    pub body_b: BodyKey,
}

impl CollisionPair {
    /// Create a pair in canonical order
    pub fn new(body_a: BodyKey, body_b: BodyKey) -> Self {
        if body_a < body_b {
            Self { body_a, body_b }
        } else {
            Self { body_a: body_b, body_b: body_a }
        }
    }

    /// True if `body` is either side of the pair
    pub fn involves(&self, body: BodyKey) -> bool {
        self.body_a == body || self.body_b == body
    }
}

/// Narrow-phase result for one pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// The overlapping bodies
    pub pair: CollisionPair,
    /// Moves `pair.body_a` out of `pair.body_b`
    pub mtv: Mtv,
}

/// A registered body
#[derive(Debug)]
pub struct Body {
    data: CollisionData,
    filter: CollisionFilter,
    entry: HashEntry<BodyKey>,
}

impl Body {
    /// Collision shapes and bounds
    pub fn data(&self) -> &CollisionData {
        &self.data
    }

    /// Layer filter
    pub fn filter(&self) -> CollisionFilter {
        self.filter
    }

    /// Grid entry holding the body's world OBB
    pub fn entry(&self) -> &HashEntry<BodyKey> {
        &self.entry
    }
}

/// Read access to the collision state, shared by projectile sweeps and picking
pub trait CollisionLookup {
    /// Grid whose elements are body handles
    fn grid(&self) -> &SpatialHashGrid<BodyKey>;

    /// Collision data of a body, if it is still registered
    fn collision_data(&self, body: BodyKey) -> Option<&CollisionData>;

    /// Layer filter of a body, if it is still registered
    fn filter(&self, body: BodyKey) -> Option<CollisionFilter>;

    /// Body stored at a grid entry
    fn body_at(&self, entry: EntryKey) -> Option<BodyKey> {
        self.grid().node(entry).map(|node| *node.element())
    }
}

/// Bodies, their grid placement and the overlap pairs of the last tick
pub struct CollisionWorld {
    grid: SpatialHashGrid<BodyKey>,
    bodies: SlotMap<BodyKey, Body>,
    current_pairs: HashSet<CollisionPair>,
    previous_pairs: HashSet<CollisionPair>,
    contacts: Vec<Contact>,
    mtv_correction_factor: f32,
    scratch: SatScratch,
    neighbours: Vec<EntryKey>,
}

impl CollisionWorld {
    /// Create an empty world from collision settings
    pub fn new(config: &CollisionConfig) -> Result<Self, CollisionError> {
        config.validate()?;
        Ok(Self {
            grid: SpatialHashGrid::from_config(&config.grid)?,
            bodies: SlotMap::with_key(),
            current_pairs: HashSet::new(),
            previous_pairs: HashSet::new(),
            contacts: Vec::new(),
            mtv_correction_factor: config.sat.mtv_correction_factor,
            scratch: SatScratch::new(),
            neighbours: Vec::new(),
        })
    }

    /// Create an empty world with default settings and the given cell size
    pub fn with_cell_size(cell_size: Vec3) -> Result<Self, CollisionError> {
        let mut config = CollisionConfig::default();
        config.grid.cell_size = cell_size;
        Self::new(&config)
    }

    /// Register a body; its current world transform decides its grid cells
    pub fn add_body(&mut self, mut data: CollisionData, filter: CollisionFilter) -> BodyKey {
        if data.ensure_shape() {
            debug!("Body registered without shapes; using its coarse box");
        }
        let grid = &mut self.grid;
        let key = self.bodies.insert_with_key(|key| {
            let entry = grid.insert_obb(key, data.world_obb());
            Body { data, filter, entry }
        });
        debug!("Registered collision body {key:?}");
        key
    }

    /// Move a body, then refresh its grid cells
    ///
    /// Returns `false` for an unknown body.
    pub fn set_body_transform(&mut self, body: BodyKey, world: &Mat4) -> bool {
        let Some(entry) = self.bodies.get_mut(body) else {
            return false;
        };
        entry.data.update_to_new_world_transform(world);
        self.grid.update_entry_obb(&entry.entry, entry.data.world_obb())
    }

    /// Unregister a body, returning its collision data
    pub fn remove_body(&mut self, body: BodyKey) -> Option<CollisionData> {
        let removed = self.bodies.remove(body)?;
        self.grid.remove(&removed.entry);
        self.current_pairs.retain(|pair| !pair.involves(body));
        self.contacts.retain(|contact| !contact.pair.involves(body));
        Some(removed.data)
    }

    /// Registered body
    pub fn body(&self, body: BodyKey) -> Option<&Body> {
        self.bodies.get(body)
    }

    /// All registered bodies
    pub fn bodies(&self) -> impl Iterator<Item = (BodyKey, &Body)> {
        self.bodies.iter()
    }

    /// Number of registered bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Factor applied to MTVs when pushing bodies apart
    pub fn mtv_correction_factor(&self) -> f32 {
        self.mtv_correction_factor
    }

    /// Push-out vector for `body_a` of a contact, including the correction factor
    pub fn separation(&self, contact: &Contact) -> Vec3 {
        contact.mtv.corrected(self.mtv_correction_factor)
    }

    /// Find all overlapping pairs for this tick
    pub fn detect_collisions(&mut self) -> &HashSet<CollisionPair> {
        std::mem::swap(&mut self.current_pairs, &mut self.previous_pairs);
        self.current_pairs.clear();
        self.contacts.clear();

        let candidates = self.broad_phase();
        self.narrow_phase(candidates);

        trace!(
            "Collision tick: {} bodies, {} pairs",
            self.bodies.len(),
            self.current_pairs.len()
        );
        &self.current_pairs
    }

    fn broad_phase(&mut self) -> Vec<CollisionPair> {
        let mut candidates = HashSet::new();
        for (key, body) in &self.bodies {
            self.neighbours.clear();
            self.grid.lookup_nodes_in_cells(&body.entry, &mut self.neighbours);
            for entry in &self.neighbours {
                let Some(other) = self.grid.node(*entry).map(|node| *node.element()) else {
                    continue;
                };
                let Some(other_body) = self.bodies.get(other) else {
                    continue;
                };
                if other != key && body.filter.should_collide(&other_body.filter) {
                    candidates.insert(CollisionPair::new(key, other));
                }
            }
        }
        candidates.into_iter().collect()
    }

    fn narrow_phase(&mut self, candidates: Vec<CollisionPair>) {
        for pair in candidates {
            let (Some(a), Some(b)) = (self.bodies.get(pair.body_a), self.bodies.get(pair.body_b)) else {
                continue;
            };
            if let Some(mtv) = narrow_phase_test(&mut self.scratch, &a.data, &b.data) {
                self.current_pairs.insert(pair);
                self.contacts.push(Contact { pair, mtv });
            }
        }
    }

    /// Pairs that started overlapping this tick
    pub fn collisions_entered(&self) -> Vec<CollisionPair> {
        self.current_pairs.difference(&self.previous_pairs).copied().collect()
    }

    /// Pairs that stopped overlapping this tick
    pub fn collisions_exited(&self) -> Vec<CollisionPair> {
        self.previous_pairs.difference(&self.current_pairs).copied().collect()
    }

    /// Pairs overlapping after the last [`detect_collisions`](Self::detect_collisions)
    pub fn current_collisions(&self) -> &HashSet<CollisionPair> {
        &self.current_pairs
    }

    /// Contacts found by the last detection
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Remove every body
    pub fn clear(&mut self) {
        self.grid.clear();
        self.bodies.clear();
        self.current_pairs.clear();
        self.previous_pairs.clear();
        self.contacts.clear();
    }
}

impl CollisionLookup for CollisionWorld {
    fn grid(&self) -> &SpatialHashGrid<BodyKey> {
        &self.grid
    }

    fn collision_data(&self, body: BodyKey) -> Option<&CollisionData> {
        self.bodies.get(body).map(|b| &b.data)
    }

    fn filter(&self, body: BodyKey) -> Option<CollisionFilter> {
        self.bodies.get(body).map(|b| b.filter)
    }
}

/// Two-level SAT test: coarse OBBs first, then each pair of fine shapes
///
/// The returned MTV moves `moving` out of `stationary`.
pub fn narrow_phase_test(scratch: &mut SatScratch, moving: &CollisionData, stationary: &CollisionData) -> Option<Mtv> {
    collision_test_with(scratch, moving.obb_shape(), stationary.obb_shape())?;
    moving.shapes().iter().find_map(|a| {
        stationary
            .shapes()
            .iter()
            .find_map(|b| collision_test_with(scratch, &a.shape, &b.shape))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision_layers::CollisionLayers;
    use approx::assert_relative_eq;

    fn cube_at(position: Vec3) -> CollisionData {
        let mut data = CollisionData::unit_cube();
        data.update_to_new_world_transform(&Mat4::new_translation(&position));
        data
    }

    fn world() -> CollisionWorld {
        CollisionWorld::with_cell_size(Vec3::repeat(4.0)).unwrap()
    }

    #[test]
    fn test_overlapping_bodies_collide() {
        let mut world = world();
        let a = world.add_body(cube_at(Vec3::zeros()), CollisionFilter::ship());
        let b = world.add_body(cube_at(Vec3::new(0.5, 0.0, 0.0)), CollisionFilter::ship());

        let pairs = world.detect_collisions();
        assert_eq!(pairs.len(), 1);
        assert!(pairs.contains(&CollisionPair::new(a, b)));

        let contact = world.contacts()[0];
        assert_relative_eq!(contact.mtv.depth, 0.5, epsilon = 1e-5);
        assert_relative_eq!(world.separation(&contact).norm(), 0.55, epsilon = 1e-5);
    }

    #[test]
    fn test_shapeless_body_collides_with_coarse_box() {
        let mut world = world();
        let mut bare = CollisionData::new();
        bare.update_to_new_world_transform(&Mat4::new_translation(&Vec3::new(0.5, 0.0, 0.0)));
        let a = world.add_body(bare, CollisionFilter::ship());
        let b = world.add_body(cube_at(Vec3::zeros()), CollisionFilter::ship());

        assert!(world.collision_data(a).unwrap().has_shapes());
        assert!(world.detect_collisions().contains(&CollisionPair::new(a, b)));
    }

    #[test]
    fn test_same_cell_without_overlap() {
        let mut world = world();
        world.add_body(cube_at(Vec3::new(0.6, 0.6, 0.6)), CollisionFilter::ship());
        world.add_body(cube_at(Vec3::new(2.6, 0.6, 0.6)), CollisionFilter::ship());
        assert!(world.detect_collisions().is_empty());
    }

    #[test]
    fn test_layer_filtering() {
        let mut world = world();
        world.add_body(cube_at(Vec3::zeros()), CollisionFilter::static_placement());
        world.add_body(cube_at(Vec3::new(0.5, 0.0, 0.0)), CollisionFilter::static_placement());
        assert!(world.detect_collisions().is_empty());

        let ship_only = CollisionFilter::new(CollisionLayers::SHIP, CollisionLayers::SHIP);
        world.add_body(cube_at(Vec3::new(0.0, 0.5, 0.0)), ship_only);
        // Statics are not in the ship's mask
        assert!(world.detect_collisions().is_empty());
    }

    #[test]
    fn test_entered_and_exited() {
        let mut world = world();
        let a = world.add_body(cube_at(Vec3::zeros()), CollisionFilter::ship());
        let b = world.add_body(cube_at(Vec3::new(3.0, 0.0, 0.0)), CollisionFilter::ship());

        world.detect_collisions();
        assert!(world.collisions_entered().is_empty());

        assert!(world.set_body_transform(b, &Mat4::new_translation(&Vec3::new(0.8, 0.0, 0.0))));
        world.detect_collisions();
        assert_eq!(world.collisions_entered(), vec![CollisionPair::new(a, b)]);

        world.set_body_transform(b, &Mat4::new_translation(&Vec3::new(9.0, 0.0, 0.0)));
        world.detect_collisions();
        assert_eq!(world.collisions_exited(), vec![CollisionPair::new(a, b)]);
        assert!(world.current_collisions().is_empty());
    }

    #[test]
    fn test_remove_body() {
        let mut world = world();
        let a = world.add_body(cube_at(Vec3::zeros()), CollisionFilter::ship());
        world.add_body(cube_at(Vec3::new(0.5, 0.0, 0.0)), CollisionFilter::ship());
        world.detect_collisions();

        assert!(world.remove_body(a).is_some());
        assert!(world.remove_body(a).is_none());
        assert!(!world.set_body_transform(a, &Mat4::identity()));
        assert!(world.current_collisions().is_empty());
        assert_eq!(world.grid().entry_count(), 1);
    }

    #[test]
    fn test_lookup_resolves_grid_entries() {
        let mut world = world();
        let a = world.add_body(cube_at(Vec3::zeros()), CollisionFilter::ship());
        let entry = world.body(a).unwrap().entry().key();
        assert_eq!(world.body_at(entry), Some(a));
        assert!(world.collision_data(a).is_some());
    }
}
