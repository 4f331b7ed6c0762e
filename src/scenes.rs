use physics::body::{Body, BodyHandle};
use physics::glam::Vec2;
use physics::joint::Joint;
use physics::world::{World, WorldConfig};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fs::File,
    io::{BufReader, BufWriter},
};

// deterministic scene jitter
const SCENE_SEED: u64 = 0x5eed;

#[derive(Serialize, Deserialize)]
pub struct BoxDesc {
    pub position: Vec2,
    pub half_extents: Vec2,
    /// `None` marks an immovable body.
    pub mass: Option<f32>,
    #[serde(default)]
    pub friction: Option<f32>,
    #[serde(default)]
    pub rotation: f32,
}

#[derive(Serialize, Deserialize)]
pub struct JointDesc {
    pub body1: usize,
    pub body2: usize,
    pub anchor: Vec2,
}

#[derive(Serialize, Deserialize)]
pub struct SceneDesc {
    pub config: WorldConfig,
    pub boxes: Vec<BoxDesc>,
    pub joints: Vec<JointDesc>,
    /// Index of the box driven by scripted input, if any.
    pub player: Option<usize>,
}

pub fn load_scene(path: &str) -> Result<SceneDesc, Box<dyn Error>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let scene = serde_json::from_reader(reader)?;

    Ok(scene)
}

pub fn save_scene(path: &str, scene: &SceneDesc) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, scene)?;

    Ok(())
}

fn add_static(boxes: &mut Vec<BoxDesc>, position: Vec2, half_extents: Vec2) -> usize {
    boxes.push(BoxDesc {
        position,
        half_extents,
        mass: None,
        friction: None,
        rotation: 0.0,
    });
    boxes.len() - 1
}

fn add_dynamic(boxes: &mut Vec<BoxDesc>, position: Vec2, half_extents: Vec2, mass: f32) -> usize {
    boxes.push(BoxDesc {
        position,
        half_extents,
        mass: Some(mass),
        friction: None,
        rotation: 0.0,
    });
    boxes.len() - 1
}

/// The default playground: flat ground with a raised platform, a jittered
/// box stack, a two-link pendulum, and a player box.
pub fn make_playground() -> SceneDesc {
    let mut rng = Pcg32::seed_from_u64(SCENE_SEED);

    let mut boxes = Vec::new();
    let mut joints = Vec::new();

    add_static(&mut boxes, Vec2::new(0.0, -30.0), Vec2::new(20.0, 0.5));
    add_static(&mut boxes, Vec2::new(-12.0, -27.0), Vec2::new(0.5, 2.5));
    add_static(&mut boxes, Vec2::new(-6.0, -26.0), Vec2::new(3.0, 0.25));

    // stack of boxes, staggered a little so it topples interestingly
    const STACK_HEIGHT: usize = 6;
    for level in 0..STACK_HEIGHT {
        let jitter = rng.gen_range(-0.05..0.05);
        let index = add_dynamic(
            &mut boxes,
            Vec2::new(6.0 + jitter, -28.95 + level as f32 * 1.01),
            Vec2::new(0.5, 0.5),
            1.0,
        );
        boxes[index].friction = Some(rng.gen_range(0.1..0.4));
    }

    // pendulum hanging off a static block
    let anchor_block = add_static(&mut boxes, Vec2::new(0.0, -22.0), Vec2::new(0.25, 0.25));
    let link1 = add_dynamic(&mut boxes, Vec2::new(1.0, -22.0), Vec2::new(0.4, 0.1), 0.5);
    let link2 = add_dynamic(&mut boxes, Vec2::new(2.0, -22.0), Vec2::new(0.4, 0.1), 0.5);
    joints.push(JointDesc {
        body1: anchor_block,
        body2: link1,
        anchor: Vec2::new(0.5, -22.0),
    });
    joints.push(JointDesc {
        body1: link1,
        body2: link2,
        anchor: Vec2::new(1.5, -22.0),
    });

    let player = add_dynamic(&mut boxes, Vec2::new(-2.0, -28.8), Vec2::new(0.4, 0.6), 10.0);
    boxes[player].friction = Some(0.3);

    SceneDesc {
        config: WorldConfig::default(),
        boxes,
        joints,
        player: Some(player),
    }
}

/// Builds a world from the description. Returns the world, the handle of
/// every box in description order, and the player handle if one was marked.
pub fn spawn(desc: &SceneDesc) -> (World, Vec<BodyHandle>, Option<BodyHandle>) {
    let mut world = World::new(desc.config);

    let mut handles = Vec::with_capacity(desc.boxes.len());
    for box_desc in &desc.boxes {
        let mut body = Body::new(box_desc.half_extents, box_desc.mass.unwrap_or(f32::MAX));
        body.position = box_desc.position;
        body.rotation = box_desc.rotation;
        if let Some(friction) = box_desc.friction {
            body.friction = friction;
        }
        handles.push(world.add_body(body));
    }

    for joint_desc in &desc.joints {
        let joint = Joint::new(
            world.bodies(),
            handles[joint_desc.body1],
            handles[joint_desc.body2],
            joint_desc.anchor,
        );
        world.add_joint(joint);
    }

    let player = desc.player.map(|index| handles[index]);

    (world, handles, player)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_playground_spawns() {
        let scene = make_playground();
        let (world, handles, player) = spawn(&scene);
        assert_eq!(handles.len(), scene.boxes.len());
        assert_eq!(world.joints().len(), 2);
        assert!(player.is_some());
    }

    #[test]
    fn test_scene_roundtrip() {
        let scene = make_playground();
        let json = serde_json::to_string(&scene).unwrap();
        let parsed: SceneDesc = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.boxes.len(), scene.boxes.len());
        assert_eq!(parsed.joints.len(), scene.joints.len());
        // immovable bodies stay immovable through the round trip
        assert!(parsed.boxes[0].mass.is_none());
    }
}
