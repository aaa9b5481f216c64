//! Projectile sweeps against the collision grid
//!
//! Every tick a live projectile stretches its collision box from its old to
//! its new position, gathers candidates from the grid cells along that
//! segment and SAT-tests them. This is a per-tick approximation, not full
//! continuous collision: a box thinner than the sweep can still be missed when
//! it lies in a cell the segment does not touch.

use std::collections::HashSet;

use log::{debug, warn};

use crate::config::ProjectileSettings;
use crate::foundation::collections::{new_key_type, SlotMap};
use crate::foundation::math::{constants, utils, Mat4, Quat, Vec3};
use crate::spatial::HashCell;
use super::collision::{collision_test_with, SatScratch, Shape};
use super::collision_system::{BodyKey, CollisionLookup};

new_key_type! {
    /// Handle of a pooled projectile
    pub struct ProjectileKey;
}

/// Lifecycle of a projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileState {
    /// Travelling and testing for hits
    Alive,
    /// Stopped at a hit point, lingering for the grace period
    Hit {
        /// Ticks stepped since the hit
        ticks_since_hit: u32,
    },
    /// Ready to return to the pool
    Expired,
}

/// Details of a registered hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileHit {
    /// Projectile that hit
    pub projectile: ProjectileKey,
    /// Body that was hit
    pub body: BodyKey,
    /// Body that fired the projectile
    pub owner: Option<BodyKey>,
    /// World position where the sweep met the body
    pub location: Vec3,
    /// Travel direction at the hit
    pub direction: Vec3,
}

/// Receiver for projectile hits (damage, sound, particles)
pub trait ProjectileHitNotifiable {
    /// Called once per hit, in the tick the hit happened
    fn notify_projectile_hit(&mut self, hit: &ProjectileHit);
}

impl<F: FnMut(&ProjectileHit)> ProjectileHitNotifiable for F {
    fn notify_projectile_hit(&mut self, hit: &ProjectileHit) {
        self(hit);
    }
}

/// Parameters for firing a projectile
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSpawn {
    /// Launch position
    pub position: Vec3,
    /// Travel direction; normalized on spawn
    pub direction: Vec3,
    /// Units per second
    pub speed: f32,
    /// Seconds until expiry; the configured default when `None`
    pub lifetime: Option<f32>,
    /// Body that fired, never hit by its own projectile
    pub owner: Option<BodyKey>,
    /// Width and height of the collision box; z is the minimum box length
    pub extent: Vec3,
    /// Center of the launcher, usually its origin
    ///
    /// When set, sweeps start on the line fired from this point and the
    /// muzzle offset fades out over the configured correction distance.
    pub trace_start: Option<Vec3>,
}

impl Default for ProjectileSpawn {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            direction: constants::FORWARD,
            speed: 100.0,
            lifetime: None,
            owner: None,
            extent: Vec3::new(0.1, 0.1, 0.1),
            trace_start: None,
        }
    }
}

/// A projectile in flight
#[derive(Debug, Clone)]
pub struct Projectile {
    position: Vec3,
    direction: Vec3,
    rotation: Quat,
    speed: f32,
    time_alive: f32,
    lifetime: f32,
    extent: Vec3,
    owner: Option<BodyKey>,
    state: ProjectileState,
    collision_transform: Mat4,
    collision_box: Shape,
    hit: Option<ProjectileHit>,
    trace: Option<TraceCorrection>,
}

/// Blends a muzzle-offset launch onto the line fired from the launcher's center
#[derive(Debug, Clone, Copy, PartialEq)]
struct TraceCorrection {
    start: Vec3,
    lateral_offset: Vec3,
    fade_distance: f32,
}

impl TraceCorrection {
    fn new(trace_start: Vec3, spawn_position: Vec3, direction: &Vec3, fade_distance: f32) -> Self {
        let offset = spawn_position - trace_start;
        Self {
            start: trace_start,
            lateral_offset: offset - direction * offset.dot(direction),
            fade_distance: fade_distance.max(constants::EPSILON),
        }
    }

    /// Sweep start for a projectile currently at `position`
    ///
    /// The along-track part of `position` is kept and the lateral offset is
    /// scaled down linearly until the projectile is `fade_distance` along the line.
    fn corrected_start(&self, position: &Vec3, direction: &Vec3) -> Vec3 {
        let along = direction * (position - self.start).dot(direction);
        let blend = (1.0 - along.norm() / self.fade_distance).clamp(0.0, 1.0);
        self.start + along + self.lateral_offset * blend
    }
}

impl Projectile {
    /// Create a live projectile
    pub fn new(spawn: &ProjectileSpawn, settings: &ProjectileSettings) -> Self {
        let direction = utils::try_normalize(&spawn.direction).unwrap_or_else(|| {
            warn!("Projectile spawned without a direction; firing forward");
            constants::FORWARD
        });
        let mut projectile = Self {
            position: spawn.position,
            direction,
            rotation: utils::rotation_between(&constants::FORWARD, &direction),
            speed: spawn.speed,
            time_alive: 0.0,
            lifetime: spawn.lifetime.unwrap_or(settings.default_lifetime_secs),
            extent: spawn.extent,
            owner: spawn.owner,
            state: ProjectileState::Alive,
            collision_transform: Mat4::identity(),
            collision_box: Shape::cube(),
            hit: None,
            trace: spawn
                .trace_start
                .map(|start| TraceCorrection::new(start, spawn.position, &direction, settings.trace_correction_distance)),
        };
        projectile.stretch(spawn.position, 0.0);
        projectile
    }

    /// Stretch the collision box backwards from `end` over `distance`
    ///
    /// The box keeps its width and height; its length never drops below the
    /// base extent so a zero-length sweep still has volume.
    pub fn stretch(&mut self, end: Vec3, distance: f32) {
        let length = distance.max(self.extent.z).max(constants::EPSILON);
        // Local +Z points back along the travel direction
        self.collision_transform = Mat4::new_translation(&end)
            * self.rotation.to_homogeneous()
            * Mat4::new_translation(&Vec3::new(0.0, 0.0, length * 0.5))
            * Mat4::new_nonuniform_scaling(&Vec3::new(self.extent.x, self.extent.y, length));
        self.collision_box.update_transform(&self.collision_transform);
    }

    /// Current tip position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Unit travel direction
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Units per second
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Seconds stepped so far
    pub fn time_alive(&self) -> f32 {
        self.time_alive
    }

    /// Lifecycle state
    pub fn state(&self) -> ProjectileState {
        self.state
    }

    /// Firing body
    pub fn owner(&self) -> Option<BodyKey> {
        self.owner
    }

    /// Hit recorded by the stepper, if any
    pub fn hit(&self) -> Option<&ProjectileHit> {
        self.hit.as_ref()
    }

    /// Where the projectile stopped, if it hit something
    pub fn hit_location(&self) -> Option<Vec3> {
        self.hit.map(|hit| hit.location)
    }

    /// Model matrix of the stretched box, also used to draw the bolt
    pub fn collision_transform(&self) -> &Mat4 {
        &self.collision_transform
    }

    /// Stretched collision box
    pub fn collision_box(&self) -> &Shape {
        &self.collision_box
    }

    /// True until the projectile expires
    pub fn is_active(&self) -> bool {
        self.state != ProjectileState::Expired
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    body: BodyKey,
    origin_distance_sq: f32,
    entry_distance: f32,
}

/// Steps projectiles, reusing its scratch buffers between calls
#[derive(Debug, Default)]
pub struct ProjectileStepper {
    hit_grace_ticks: u32,
    seen: HashSet<BodyKey>,
    sat: SatScratch,
}

impl ProjectileStepper {
    /// Create a stepper that keeps hit projectiles for `hit_grace_ticks` ticks
    pub fn new(hit_grace_ticks: u32) -> Self {
        Self {
            hit_grace_ticks,
            seen: HashSet::new(),
            sat: SatScratch::new(),
        }
    }

    /// Advance one projectile by `dt` seconds
    pub fn step<L, N>(
        &mut self,
        key: ProjectileKey,
        projectile: &mut Projectile,
        dt: f32,
        lookup: &L,
        notifiable: &mut N,
    ) -> ProjectileState
    where
        L: CollisionLookup + ?Sized,
        N: ProjectileHitNotifiable + ?Sized,
    {
        projectile.time_alive += dt;
        let out_of_time = projectile.time_alive >= projectile.lifetime;

        match projectile.state {
            ProjectileState::Expired => {}
            ProjectileState::Hit { ticks_since_hit } => {
                let ticks_since_hit = ticks_since_hit + 1;
                projectile.state = if ticks_since_hit >= self.hit_grace_ticks || out_of_time {
                    ProjectileState::Expired
                } else {
                    ProjectileState::Hit { ticks_since_hit }
                };
            }
            ProjectileState::Alive if out_of_time => projectile.state = ProjectileState::Expired,
            ProjectileState::Alive => self.sweep(key, projectile, dt, lookup, notifiable),
        }
        projectile.state
    }

    fn sweep<L, N>(&mut self, key: ProjectileKey, projectile: &mut Projectile, dt: f32, lookup: &L, notifiable: &mut N)
    where
        L: CollisionLookup + ?Sized,
        N: ProjectileHitNotifiable + ?Sized,
    {
        let direction = projectile.direction;
        let start = match &projectile.trace {
            Some(trace) => trace.corrected_start(&projectile.position, &direction),
            None => projectile.position,
        };
        let end = projectile.position + direction * (projectile.speed * dt);
        let distance = (end - start).norm();

        projectile.stretch(end, distance);
        projectile.position = end;

        let Some(candidate) = self.closest_candidate(projectile, &start, &end, lookup) else {
            return;
        };

        let hit_distance = candidate.entry_distance.clamp(0.0, distance);
        let location = start + direction * hit_distance;
        projectile.stretch(location, hit_distance);
        projectile.position = location;
        projectile.state = ProjectileState::Hit { ticks_since_hit: 0 };

        let hit = ProjectileHit {
            projectile: key,
            body: candidate.body,
            owner: projectile.owner,
            location,
            direction,
        };
        debug!("Projectile {key:?} hit {:?} at {location:?}", candidate.body);
        projectile.hit = Some(hit);
        notifiable.notify_projectile_hit(&hit);
    }

    /// Among bodies the stretched box overlaps, the one whose matched shape origin is nearest `start`
    ///
    /// Shape origins stand in for true contact distance, which is exact only
    /// for single-shape bodies.
    fn closest_candidate<L>(&mut self, projectile: &Projectile, start: &Vec3, end: &Vec3, lookup: &L) -> Option<Candidate>
    where
        L: CollisionLookup + ?Sized,
    {
        let mut cells: Vec<&HashCell> = Vec::new();
        lookup.grid().lookup_cells_for_line(start, end, &mut cells);

        self.seen.clear();
        let mut best: Option<Candidate> = None;
        let sweep_box = &projectile.collision_box;

        for entry in cells.iter().flat_map(|cell| cell.nodes()) {
            let Some(body) = lookup.body_at(*entry) else {
                continue;
            };
            if !self.seen.insert(body) || projectile.owner == Some(body) {
                continue;
            }
            let (Some(data), Some(filter)) = (lookup.collision_data(body), lookup.filter(body)) else {
                continue;
            };
            if !filter.accepts_projectiles() {
                continue;
            }
            if collision_test_with(&mut self.sat, sweep_box, data.obb_shape()).is_none() {
                continue;
            }

            for shape_data in data.shapes() {
                if collision_test_with(&mut self.sat, sweep_box, &shape_data.shape).is_none() {
                    continue;
                }
                let origin_distance_sq = (shape_data.shape.origin() - start).norm_squared();
                if best.map_or(true, |b| origin_distance_sq < b.origin_distance_sq) {
                    best = Some(Candidate {
                        body,
                        origin_distance_sq,
                        entry_distance: entry_distance(&shape_data.shape, start, &projectile.direction),
                    });
                }
            }
        }

        best
    }
}

/// Distance along `direction` from `start` to the nearest point of `shape`
fn entry_distance(shape: &Shape, start: &Vec3, direction: &Vec3) -> f32 {
    shape
        .world_points()
        .iter()
        .map(|p| (p - start).dot(direction))
        .fold(f32::INFINITY, f32::min)
}

/// Pool of live projectiles
pub struct ProjectileSystem {
    projectiles: SlotMap<ProjectileKey, Projectile>,
    stepper: ProjectileStepper,
    settings: ProjectileSettings,
    expired: Vec<ProjectileKey>,
}

impl ProjectileSystem {
    /// Create an empty pool
    pub fn new(settings: ProjectileSettings) -> Self {
        Self {
            projectiles: SlotMap::with_key(),
            stepper: ProjectileStepper::new(settings.hit_grace_ticks),
            settings,
            expired: Vec::new(),
        }
    }

    /// Fire a projectile
    pub fn spawn(&mut self, spawn: &ProjectileSpawn) -> ProjectileKey {
        self.projectiles.insert(Projectile::new(spawn, &self.settings))
    }

    /// Step every projectile and release the ones that expired
    ///
    /// Returns the handles released this tick.
    pub fn tick<L, N>(&mut self, dt: f32, lookup: &L, notifiable: &mut N) -> &[ProjectileKey]
    where
        L: CollisionLookup + ?Sized,
        N: ProjectileHitNotifiable + ?Sized,
    {
        self.expired.clear();
        for (key, projectile) in &mut self.projectiles {
            if self.stepper.step(key, projectile, dt, lookup, notifiable) == ProjectileState::Expired {
                self.expired.push(key);
            }
        }
        for key in &self.expired {
            self.projectiles.remove(*key);
        }
        &self.expired
    }

    /// Remove a projectile immediately
    pub fn force_release(&mut self, key: ProjectileKey) -> Option<Projectile> {
        self.projectiles.remove(key)
    }

    /// Live projectile
    pub fn get(&self, key: ProjectileKey) -> Option<&Projectile> {
        self.projectiles.get(key)
    }

    /// All live projectiles
    pub fn iter(&self) -> impl Iterator<Item = (ProjectileKey, &Projectile)> {
        self.projectiles.iter()
    }

    /// Number of live projectiles
    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    /// True when no projectile is live
    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    /// Release every projectile
    pub fn clear(&mut self) {
        self.projectiles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision_data::CollisionData;
    use crate::physics::collision_layers::CollisionFilter;
    use crate::physics::collision_system::CollisionWorld;
    use approx::assert_relative_eq;

    fn target_world(center: Vec3, scale: Vec3) -> (CollisionWorld, BodyKey) {
        let mut world = CollisionWorld::with_cell_size(Vec3::repeat(4.0)).unwrap();
        let mut data = CollisionData::unit_cube();
        data.update_to_new_world_transform(&(Mat4::new_translation(&center) * Mat4::new_nonuniform_scaling(&scale)));
        let body = world.add_body(data, CollisionFilter::ship());
        (world, body)
    }

    fn bolt(position: Vec3) -> ProjectileSpawn {
        ProjectileSpawn {
            position,
            direction: Vec3::z(),
            speed: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_hit_stops_at_contact_point() {
        let (world, target) = target_world(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 1.0, 0.2));
        let mut system = ProjectileSystem::new(ProjectileSettings::default());
        let key = system.spawn(&bolt(Vec3::zeros()));

        let mut hits = Vec::new();
        system.tick(0.1, &world, &mut |hit: &ProjectileHit| hits.push(*hit));

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].body, target);
        assert_relative_eq!(hits[0].location.z, 0.9, epsilon = 1e-4);

        let projectile = system.get(key).unwrap();
        assert_eq!(projectile.state(), ProjectileState::Hit { ticks_since_hit: 0 });
        assert_relative_eq!(projectile.position().z, 0.9, epsilon = 1e-4);
        assert_relative_eq!(projectile.hit_location().unwrap().z, 0.9, epsilon = 1e-4);
    }

    #[test]
    fn test_hit_registers_on_first_overlapping_tick() {
        let (world, _) = target_world(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 1.0, 0.2));
        let mut system = ProjectileSystem::new(ProjectileSettings::default());
        system.spawn(&bolt(Vec3::new(0.0, 0.0, -2.0)));

        let mut hit_ticks = Vec::new();
        for tick in 0..3 {
            system.tick(0.1, &world, &mut |_: &ProjectileHit| hit_ticks.push(tick));
        }
        assert_eq!(hit_ticks, vec![2]);
    }

    #[test]
    fn test_grace_period_then_expiry() {
        let (world, _) = target_world(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 1.0, 0.2));
        let mut system = ProjectileSystem::new(ProjectileSettings::default());
        let key = system.spawn(&bolt(Vec3::zeros()));
        let mut ignore = |_: &ProjectileHit| {};

        system.tick(0.1, &world, &mut ignore);
        system.tick(0.1, &world, &mut ignore);
        system.tick(0.1, &world, &mut ignore);
        assert_eq!(system.get(key).unwrap().state(), ProjectileState::Hit { ticks_since_hit: 2 });

        let released = system.tick(0.1, &world, &mut ignore).to_vec();
        assert_eq!(released, vec![key]);
        assert!(system.is_empty());
    }

    #[test]
    fn test_lifetime_cuts_grace_period_short() {
        let (world, _) = target_world(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 1.0, 0.2));
        let mut system = ProjectileSystem::new(ProjectileSettings::default());
        let key = system.spawn(&ProjectileSpawn {
            lifetime: Some(0.15),
            ..bolt(Vec3::zeros())
        });
        let mut hits = 0;

        assert!(system.tick(0.1, &world, &mut |_: &ProjectileHit| hits += 1).is_empty());
        assert_eq!(system.get(key).unwrap().state(), ProjectileState::Hit { ticks_since_hit: 0 });
        assert_eq!(system.tick(0.1, &world, &mut |_: &ProjectileHit| hits += 1), &[key]);
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_lifetime_expiry() {
        let (world, _) = target_world(Vec3::new(50.0, 0.0, 0.0), Vec3::repeat(1.0));
        let mut system = ProjectileSystem::new(ProjectileSettings::default());
        let key = system.spawn(&ProjectileSpawn {
            lifetime: Some(0.25),
            ..bolt(Vec3::zeros())
        });
        let mut ignore = |_: &ProjectileHit| {};

        assert!(system.tick(0.1, &world, &mut ignore).is_empty());
        assert!(system.tick(0.1, &world, &mut ignore).is_empty());
        assert_eq!(system.tick(0.1, &world, &mut ignore), &[key]);
    }

    #[test]
    fn test_owner_is_never_hit() {
        let (world, ship) = target_world(Vec3::zeros(), Vec3::repeat(2.0));
        let mut system = ProjectileSystem::new(ProjectileSettings::default());
        system.spawn(&ProjectileSpawn {
            owner: Some(ship),
            ..bolt(Vec3::zeros())
        });

        let mut hits = 0;
        system.tick(0.1, &world, &mut |_: &ProjectileHit| hits += 1);
        assert_eq!(hits, 0);
    }

    #[test]
    fn test_closest_candidate_wins() {
        let mut world = CollisionWorld::with_cell_size(Vec3::repeat(4.0)).unwrap();
        for z in [1.5, 0.5] {
            let mut data = CollisionData::unit_cube();
            data.update_to_new_world_transform(&(Mat4::new_translation(&Vec3::new(0.0, 0.0, z)) * Mat4::new_scaling(0.5)));
            world.add_body(data, CollisionFilter::ship());
        }
        let mut system = ProjectileSystem::new(ProjectileSettings::default());
        system.spawn(&ProjectileSpawn {
            speed: 20.0,
            ..bolt(Vec3::zeros())
        });

        let mut hits = Vec::new();
        system.tick(0.1, &world, &mut |hit: &ProjectileHit| hits.push(*hit));
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].location.z, 0.25, epsilon = 1e-4);
    }

    #[test]
    fn test_trace_correction_never_reaches_behind_launcher() {
        let (world, _) = target_world(Vec3::new(0.0, 0.0, 10.0), Vec3::repeat(1.0));
        let mut system = ProjectileSystem::new(ProjectileSettings::default());
        let key = system.spawn(&ProjectileSpawn {
            direction: -Vec3::z(),
            trace_start: Some(Vec3::new(0.0, 0.0, 0.5)),
            ..bolt(Vec3::zeros())
        });

        let mut hits = 0;
        for _ in 0..5 {
            system.tick(1.0 / 60.0, &world, &mut |_: &ProjectileHit| hits += 1);
            assert!(system.get(key).unwrap().position().z <= 0.0);
        }
        assert_eq!(hits, 0);
    }

    #[test]
    fn test_trace_correction_fades_onto_center_line() {
        let settings = ProjectileSettings {
            trace_correction_distance: 5.0,
            ..Default::default()
        };
        let mut system = ProjectileSystem::new(settings);
        let key = system.spawn(&ProjectileSpawn {
            direction: -Vec3::z(),
            trace_start: Some(Vec3::zeros()),
            ..bolt(Vec3::new(1.0, 0.0, 0.0))
        });
        let world = CollisionWorld::with_cell_size(Vec3::repeat(4.0)).unwrap();
        let mut ignore = |_: &ProjectileHit| {};

        // The first sweep leaves from the muzzle; each later one is 1/5 closer to the center line
        system.tick(0.1, &world, &mut ignore);
        assert_relative_eq!(system.get(key).unwrap().position(), Vec3::new(1.0, 0.0, -1.0), epsilon = 1e-4);
        system.tick(0.1, &world, &mut ignore);
        assert_relative_eq!(system.get(key).unwrap().position(), Vec3::new(0.8, 0.0, -2.0), epsilon = 1e-4);
        for _ in 0..4 {
            system.tick(0.1, &world, &mut ignore);
        }
        assert_relative_eq!(system.get(key).unwrap().position(), Vec3::new(0.0, 0.0, -6.0), epsilon = 1e-4);
    }

    #[test]
    fn test_trace_correction_hits_target_on_center_line() {
        let settings = ProjectileSettings {
            trace_correction_distance: 5.0,
            ..Default::default()
        };
        let (world, target) = target_world(Vec3::new(0.0, 0.0, -8.0), Vec3::repeat(0.5));
        let fire = |trace_start: Option<Vec3>| {
            let mut system = ProjectileSystem::new(settings.clone());
            system.spawn(&ProjectileSpawn {
                direction: -Vec3::z(),
                trace_start,
                ..bolt(Vec3::new(1.0, 0.0, 0.0))
            });
            let mut hits = Vec::new();
            for _ in 0..10 {
                system.tick(0.1, &world, &mut |hit: &ProjectileHit| hits.push(*hit));
            }
            hits
        };

        assert!(fire(None).is_empty());
        let hits = fire(Some(Vec3::zeros()));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].body, target);
        assert_relative_eq!(hits[0].location, Vec3::new(0.0, 0.0, -7.75), epsilon = 1e-4);
    }

    #[test]
    fn test_zero_speed_sweep_is_finite() {
        let mut projectile = Projectile::new(
            &ProjectileSpawn {
                speed: 0.0,
                ..Default::default()
            },
            &ProjectileSettings::default(),
        );
        projectile.stretch(Vec3::zeros(), 0.0);
        assert!(projectile.collision_box().world_points().iter().all(|p| p.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn test_force_release() {
        let mut system = ProjectileSystem::new(ProjectileSettings::default());
        let key = system.spawn(&ProjectileSpawn::default());
        assert_eq!(system.len(), 1);
        assert!(system.force_release(key).is_some());
        assert!(system.force_release(key).is_none());
    }
}
