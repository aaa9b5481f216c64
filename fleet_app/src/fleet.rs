//! Shared setup for the headless demos: ship spawning and simple flight

use std::collections::HashMap;

use arcade_collision::prelude::*;
use arcade_collision::physics::CollisionShapeConfig;
use rand::Rng;

/// Errors raised while setting up a demo
#[derive(thiserror::Error, Debug)]
pub enum DemoError {
    /// Collision state could not be built
    #[error("collision setup failed: {0}")]
    Collision(#[from] CollisionError),

    /// A config file could not be loaded
    #[error("config error: {0}")]
    Config(#[from] arcade_collision::config::ConfigError),
}

/// Side a ship fights for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn enemy(self) -> Self {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

pub struct Ship {
    pub body: BodyKey,
    pub team: Team,
    pub transform: Transform,
    pub speed: f32,
    pub health: i32,
    pub fire_cooldown: f32,
}

impl Ship {
    pub fn model_matrix(&self) -> Mat4 {
        self.transform.to_matrix()
    }
}

/// Collision layout of the demo fighter: a capsule fuselage and a cube wing block
pub fn fighter_collision_config() -> SpawnCollisionConfig {
    SpawnCollisionConfig {
        shapes: vec![
            CollisionShapeConfig {
                shape: CollisionShapeType::PolyCapsule,
                scale: Vec3::new(0.6, 1.2, 0.6),
                rotation_degrees: Vec3::new(90.0, 0.0, 0.0),
                ..Default::default()
            },
            CollisionShapeConfig {
                shape: CollisionShapeType::Cube,
                scale: Vec3::new(2.4, 0.2, 0.6),
                position: Vec3::new(0.0, 0.0, 0.3),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

/// Load the fighter layout from a file, or use the built-in one
pub fn load_fighter_config(path: Option<&str>) -> Result<SpawnCollisionConfig, DemoError> {
    match path {
        Some(path) => {
            log::info!("Loading fighter collision config from {}", path);
            Ok(SpawnCollisionConfig::load_from_file(path)?)
        }
        None => Ok(fighter_collision_config()),
    }
}

/// Ships of both teams, facing each other across the arena
pub struct Fleet {
    pub ships: HashMap<BodyKey, Ship>,
}

impl Fleet {
    pub fn spawn(
        world: &mut CollisionWorld,
        factory: &ShapeFactory,
        fighter: &SpawnCollisionConfig,
        ships_per_team: usize,
        arena_radius: f32,
    ) -> Result<Self, DemoError> {
        let mut rng = rand::thread_rng();
        let mut ships = HashMap::new();

        for team in [Team::Red, Team::Blue] {
            let (side, yaw) = match team {
                Team::Red => (-1.0, 180.0),
                Team::Blue => (1.0, 0.0),
            };
            for _ in 0..ships_per_team {
                let position = Vec3::new(
                    rng.gen_range(-arena_radius..arena_radius) * 0.5,
                    rng.gen_range(-arena_radius..arena_radius) * 0.25,
                    side * arena_radius * rng.gen_range(0.6..1.0),
                );
                let transform = Transform::from_degrees(position, Vec3::new(0.0, yaw, 0.0), Vec3::repeat(1.0));

                let mut data = CollisionData::from_spawn_config(fighter, factory)?;
                data.update_to_new_world_transform(&transform.to_matrix());
                let body = world.add_body(data, CollisionFilter::ship());

                ships.insert(
                    body,
                    Ship {
                        body,
                        team,
                        transform,
                        speed: rng.gen_range(8.0..14.0),
                        health: 3,
                        fire_cooldown: rng.gen_range(0.0..1.0),
                    },
                );
            }
        }

        log::info!("Spawned {} ships", ships.len());
        Ok(Self { ships })
    }

    /// Fly every ship forward and wrap it back into the arena
    pub fn fly(&mut self, world: &mut CollisionWorld, dt: f32, arena_radius: f32) {
        for ship in self.ships.values_mut() {
            let forward = ship.transform.forward();
            ship.transform.position += forward * ship.speed * dt;
            if ship.transform.position.norm() > arena_radius * 1.5 {
                ship.transform.position = -ship.transform.position * 0.9;
            }
            world.set_body_transform(ship.body, &ship.model_matrix());
        }
    }

    /// Push overlapping ships apart along their contact MTVs
    pub fn separate(&mut self, world: &mut CollisionWorld) {
        let pushes: Vec<(BodyKey, Vec3)> = world
            .contacts()
            .iter()
            .map(|contact| (contact.pair.body_a, world.separation(contact)))
            .collect();
        for (body, push) in pushes {
            if let Some(ship) = self.ships.get_mut(&body) {
                ship.transform.position += push;
                world.set_body_transform(body, &ship.model_matrix());
            }
        }
    }

    pub fn alive(&self, team: Team) -> usize {
        self.ships.values().filter(|s| s.team == team).count()
    }
}

/// Applies projectile hits as damage
#[derive(Default)]
pub struct DamageLedger {
    pub hits: Vec<ProjectileHit>,
}

impl ProjectileHitNotifiable for DamageLedger {
    fn notify_projectile_hit(&mut self, hit: &ProjectileHit) {
        log::debug!("Projectile {:?} struck {:?} at {:?}", hit.projectile, hit.body, hit.location);
        self.hits.push(*hit);
    }
}
