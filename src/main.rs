mod scenes;
mod time_accumulator;

use log::{info, warn};
use physics::body::BodyHandle;
use physics::glam::Vec2;
use physics::world::World;
use std::time::Duration;
use time_accumulator::TimeAccumulator;

const SCENE_PATH: &str = "playground.json";
const RUN_SECONDS: u64 = 20;

// one step's worth of upward force, sized to launch the 10 kg player at
// roughly 6 m/s
const JUMP_FORCE: f32 = 3600.0;
const WALK_SPEED: f32 = 2.0;

/// Scripted input standing in for a keyboard: stroll back and forth, hop
/// whenever the player is standing on something.
fn drive_player(world: &mut World, player: BodyHandle, step_count: u64) {
    let body = world.body_mut(player);

    let stroll_right = (step_count / 180) % 2 == 0;
    body.velocity.x = if stroll_right { WALK_SPEED } else { -WALK_SPEED };

    if step_count % 240 == 0 && body.is_grounded() {
        body.add_force(Vec2::new(0.0, JUMP_FORCE));
    }
}

fn main() {
    env_logger::init();

    let scene = scenes::load_scene(SCENE_PATH).unwrap_or_else(|err| {
        info!("no scene at {} ({}), generating the default", SCENE_PATH, err);
        let scene = scenes::make_playground();
        if let Err(err) = scenes::save_scene(SCENE_PATH, &scene) {
            warn!("failed to save {}: {}", SCENE_PATH, err);
        }
        scene
    });

    let (mut world, handles, player) = scenes::spawn(&scene);
    info!(
        "spawned {} bodies and {} joints",
        handles.len(),
        world.joints().len()
    );

    let mut accumulator = TimeAccumulator::new();
    let frame_delta = Duration::from_secs(1) / 60;
    let mut step_count = 0u64;

    for frame in 0..RUN_SECONDS * 60 {
        accumulator.update(frame_delta);

        for _ in 0..accumulator.num_steps() {
            if let Some(player) = player {
                drive_player(&mut world, player, step_count);
            }
            world.step(accumulator.step_secs());
            step_count += 1;
        }

        if frame % 60 == 0 {
            let contacts = world.contacts().count();
            let arbiters = world.arbiters().count();
            if let Some(player) = player {
                let body = world.body(player);
                info!(
                    "t={:>3}s arbiters={:>2} contacts={:>2} player=({:>6.2}, {:>6.2}) grounded={}",
                    frame / 60,
                    arbiters,
                    contacts,
                    body.position.x,
                    body.position.y,
                    body.is_grounded(),
                );
            } else {
                info!("t={:>3}s arbiters={:>2} contacts={:>2}", frame / 60, arbiters, contacts);
            }
        }
    }

    for (index, body) in world.bodies().iter().enumerate() {
        if !body.has_infinite_mass() {
            info!(
                "body {:>2}: pos=({:>6.2}, {:>6.2}) rot={:>5.2} vel=({:>5.2}, {:>5.2})",
                index, body.position.x, body.position.y, body.rotation, body.velocity.x, body.velocity.y,
            );
        }
    }
    info!("simulated {} steps", step_count);
}
