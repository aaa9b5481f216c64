//! Headless fleet battle: two teams fly at each other and trade laser fire
//!
//! Usage: `fleet_battle [collision.toml|collision.ron] [fighter.ron]`

mod fleet;

use arcade_collision::foundation::logging;
use arcade_collision::prelude::*;
use fleet::{load_fighter_config, DamageLedger, DemoError, Fleet};
use rand::seq::IteratorRandom;

const SHIPS_PER_TEAM: usize = 12;
const ARENA_RADIUS: f32 = 60.0;
const TICK_RATE: f32 = 60.0;
const MAX_TICKS: u32 = 60 * 30;
const FIRE_INTERVAL: f32 = 0.75;
const LASER_SPEED: f32 = 120.0;
/// Wing gun position in ship space
const MUZZLE_OFFSET_X: f32 = 1.1;

fn run() -> Result<(), DemoError> {
    let args: Vec<String> = std::env::args().collect();
    let config = match args.get(1) {
        Some(path) => CollisionConfig::load_from_file(path)?,
        None => CollisionConfig::default(),
    };
    config.validate()?;

    let factory = ShapeFactory::from_config(&config.sat);
    let fighter = load_fighter_config(args.get(2).map(String::as_str))?;

    let mut world = CollisionWorld::new(&config)?;
    let mut fleet = Fleet::spawn(&mut world, &factory, &fighter, SHIPS_PER_TEAM, ARENA_RADIUS)?;
    let mut projectiles = ProjectileSystem::new(config.projectile.clone());
    let mut debug = CollisionDebugVisualizer::new();
    let mut ledger = DamageLedger::default();
    let mut rng = rand::thread_rng();
    let dt = 1.0 / TICK_RATE;

    for tick in 0..MAX_TICKS {
        fleet.fly(&mut world, dt, ARENA_RADIUS);
        world.detect_collisions();
        for pair in world.collisions_entered() {
            log::debug!("Ships {:?} and {:?} collided", pair.body_a, pair.body_b);
        }
        fleet.separate(&mut world);

        // Fire at a random living enemy
        let shooters: Vec<_> = fleet
            .ships
            .values_mut()
            .filter_map(|ship| {
                ship.fire_cooldown -= dt;
                (ship.fire_cooldown <= 0.0).then(|| {
                    ship.fire_cooldown = FIRE_INTERVAL;
                    let muzzle = ship.transform.transform_point(Vec3::new(MUZZLE_OFFSET_X, 0.0, -0.6));
                    (ship.body, ship.team, ship.transform.position, muzzle)
                })
            })
            .collect();
        for (body, team, center, muzzle) in shooters {
            let target = fleet
                .ships
                .values()
                .filter(|s| s.team == team.enemy())
                .choose(&mut rng)
                .map(|s| s.transform.position);
            if let Some(target) = target {
                projectiles.spawn(&ProjectileSpawn {
                    position: muzzle,
                    direction: target - center,
                    speed: LASER_SPEED,
                    owner: Some(body),
                    trace_start: Some(center),
                    ..Default::default()
                });
            }
        }

        projectiles.tick(dt, &world, &mut ledger);
        for hit in ledger.hits.drain(..) {
            let destroyed = match fleet.ships.get_mut(&hit.body) {
                Some(ship) => {
                    ship.health -= 1;
                    ship.health <= 0
                }
                None => false,
            };
            if destroyed {
                fleet.ships.remove(&hit.body);
                world.remove_body(hit.body);
                log::info!("Ship {:?} destroyed", hit.body);
            }
        }

        debug.update(dt);
        debug.draw_world(&world);
        debug.draw_projectiles(&projectiles);

        if tick % TICK_RATE as u32 == 0 {
            log::info!(
                "t={:>4.1}s red={} blue={} lasers={} cells={} debug_shapes={}",
                tick as f32 * dt,
                fleet.alive(fleet::Team::Red),
                fleet.alive(fleet::Team::Blue),
                projectiles.len(),
                world.grid().cell_count(),
                debug.shapes().count()
            );
        }

        if fleet.alive(fleet::Team::Red) == 0 || fleet.alive(fleet::Team::Blue) == 0 {
            log::info!("Battle over after {} ticks", tick + 1);
            break;
        }
    }

    log::info!(
        "Survivors: red={} blue={}",
        fleet.alive(fleet::Team::Red),
        fleet.alive(fleet::Team::Blue)
    );
    Ok(())
}

fn main() {
    logging::init_with_default("info");
    log::info!("Starting fleet battle");

    if let Err(e) = run() {
        log::error!("Fleet battle failed: {}", e);
        std::process::exit(1);
    }
}
