//! Headless picking demo: sweep clicks across a virtual screen over a field of asteroids

#![allow(dead_code)]

mod fleet;

use arcade_collision::foundation::logging;
use arcade_collision::prelude::*;
use fleet::DemoError;
use rand::Rng;

const SCREEN: (f32, f32) = (1280.0, 720.0);
const ASTEROIDS: usize = 40;
const CLICK_STEPS: usize = 8;

fn run() -> Result<(), DemoError> {
    let config = CollisionConfig::default();
    let mut world = CollisionWorld::new(&config)?;
    let mut rng = rand::thread_rng();

    for _ in 0..ASTEROIDS {
        let position = Vec3::new(
            rng.gen_range(-40.0..40.0),
            rng.gen_range(-20.0..20.0),
            rng.gen_range(-120.0..-20.0),
        );
        let scale = rng.gen_range(1.0..6.0);
        let transform = Transform::from_degrees(
            position,
            Vec3::new(rng.gen_range(0.0..360.0), rng.gen_range(0.0..360.0), 0.0),
            Vec3::repeat(scale),
        );
        let mut data = CollisionData::unit_cube();
        data.update_to_new_world_transform(&transform.to_matrix());
        world.add_body(data, CollisionFilter::static_placement());
    }

    let camera = CameraView {
        position: Vec3::zeros(),
        up: Vec3::y(),
        right: Vec3::x(),
        front: Vec3::new(0.0, 0.0, -1.0),
        fov_y_degrees: 45.0,
        aspect: SCREEN.0 / SCREEN.1,
    };
    let picker = ObjectPicker::new(&config.picking);
    let mut debug = CollisionDebugVisualizer::new()
        .with_flags(arcade_collision::debug::CollisionDebugFlags::PICK_RAYS);
    let mut picks = 0;

    for row in 0..CLICK_STEPS {
        for column in 0..CLICK_STEPS {
            let click = Vec2::new(
                (column as f32 + 0.5) / CLICK_STEPS as f32 * SCREEN.0,
                (row as f32 + 0.5) / CLICK_STEPS as f32 * SCREEN.1,
            );
            let ray = ObjectPicker::generate_ray(Vec2::new(SCREEN.0, SCREEN.1), click, &camera);
            let hit = picker.pick(&ray, &world);
            debug.draw_pick_ray(&ray, picker.max_distance(), hit.is_some());
            if let Some(hit) = hit {
                picks += 1;
                log::info!(
                    "Click ({:.0}, {:.0}) picked {:?} at {:.1} units",
                    click.x,
                    click.y,
                    hit.body,
                    hit.distance_sq.sqrt()
                );
            }
        }
    }

    log::info!(
        "{} of {} clicks picked an asteroid ({} debug rays)",
        picks,
        CLICK_STEPS * CLICK_STEPS,
        debug.shapes().count()
    );
    Ok(())
}

fn main() {
    logging::init_with_default("info");
    if let Err(e) = run() {
        log::error!("Pick demo failed: {}", e);
        std::process::exit(1);
    }
}
