use crate::arbiter::{Arbiter, ArbiterKey};
use crate::body::{Body, BodyArena, BodyHandle};
use crate::contact::Contact;
use crate::joint::Joint;
use glam::Vec2;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Solver tunables, carried per world instance so that several simulations
/// can coexist in one process with different settings.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct WorldConfig {
    pub gravity: Vec2,
    pub iterations: u32,
    pub accumulate_impulses: bool,
    pub warm_starting: bool,
    pub position_correction: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.81),
            iterations: 10,
            accumulate_impulses: true,
            warm_starting: true,
            position_correction: true,
        }
    }
}

/// Owns the bodies, joints and the live contact manifolds, and advances the
/// simulation one step at a time. A step is one atomic transaction over that
/// state; `step` must not be called reentrantly, which the `&mut self`
/// receiver already enforces.
pub struct World {
    bodies: BodyArena,
    joints: Vec<Joint>,
    arbiters: BTreeMap<ArbiterKey, Arbiter>,
    pub config: WorldConfig,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            bodies: BodyArena::new(),
            joints: Vec::new(),
            arbiters: BTreeMap::new(),
            config,
        }
    }

    /// Registers a body and returns its stable handle.
    pub fn add_body(&mut self, body: Body) -> BodyHandle {
        self.bodies.add(body)
    }

    pub fn add_joint(&mut self, joint: Joint) {
        self.joints.push(joint);
    }

    pub fn body(&self, handle: BodyHandle) -> &Body {
        self.bodies.get_body(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> &mut Body {
        self.bodies.get_body_mut(handle)
    }

    pub fn bodies(&self) -> &BodyArena {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut BodyArena {
        &mut self.bodies
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn arbiters(&self) -> impl Iterator<Item = &Arbiter> {
        self.arbiters.values()
    }

    /// All live contact points, for debug visualisation.
    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.arbiters.values().flat_map(|arbiter| arbiter.contacts().iter())
    }

    /// Empties bodies, joints and manifolds unconditionally.
    pub fn clear(&mut self) {
        debug!(
            "clearing world: {} bodies, {} joints, {} arbiters",
            self.bodies.len(),
            self.joints.len(),
            self.arbiters.len()
        );
        self.bodies.clear();
        self.joints.clear();
        self.arbiters.clear();
    }

    // O(n^2) pairwise narrow phase over every movable pair; manifolds are
    // created, merged or dropped here.
    fn broad_phase(&mut self) {
        for i in 0..self.bodies.len() {
            let handle_i = BodyHandle(i as u32);

            for j in (i + 1)..self.bodies.len() {
                let handle_j = BodyHandle(j as u32);

                if self.bodies.get_body(handle_i).has_infinite_mass()
                    && self.bodies.get_body(handle_j).has_infinite_mass()
                {
                    continue;
                }

                let new_arbiter = Arbiter::new(&self.bodies, handle_i, handle_j);
                let key = ArbiterKey::new(handle_i, handle_j);

                if new_arbiter.num_contacts() > 0 {
                    match self.arbiters.entry(key) {
                        Entry::Vacant(entry) => {
                            trace!("new arbiter for pair ({}, {})", i, j);
                            entry.insert(new_arbiter);
                        }
                        Entry::Occupied(mut entry) => {
                            entry
                                .get_mut()
                                .update(new_arbiter.contacts(), self.config.warm_starting);
                        }
                    }
                } else {
                    // the manifold ends the moment the pair separates, and
                    // so does any resting state derived from it
                    self.bodies.get_body_mut(handle_i).grounded = false;
                    self.bodies.get_body_mut(handle_j).grounded = false;
                    if self.arbiters.remove(&key).is_some() {
                        trace!("dropped arbiter for pair ({}, {})", i, j);
                    }
                }
            }
        }
    }

    // A body rests when a two-point manifold lies along its bottom face and
    // is not degenerate in x, i.e. the surface under it is roughly
    // horizontal rather than a wall it is pressed against.
    fn update_resting_flags(&mut self) {
        for arbiter in self.arbiters.values() {
            if arbiter.num_contacts() < 2 {
                continue;
            }
            let c0 = arbiter.contacts()[0].position;
            let c1 = arbiter.contacts()[1].position;
            if c0.x == c1.x {
                continue;
            }

            let (handle1, handle2) = arbiter.body_handles();
            for handle in [handle1, handle2] {
                let body = self.bodies.get_body_mut(handle);
                if c0.y * 1.001 <= body.position.y - body.half_extents.y {
                    body.grounded = true;
                }
            }
        }
    }

    /// Advances the simulation by `dt` seconds: narrow phase, force
    /// integration, constraint pre-steps, the fixed-count impulse iterations
    /// and finally the velocity integration. A zero or negative `dt`
    /// disables the bias terms instead of faulting.
    pub fn step(&mut self, dt: f32) {
        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };

        self.broad_phase();

        // integrate forces
        for body in self.bodies.iter_mut() {
            if body.has_infinite_mass() {
                continue;
            }
            body.velocity += dt * (self.config.gravity + body.inv_mass * body.force);
            body.angular_velocity += dt * body.inv_inertia * body.torque;
        }

        self.update_resting_flags();

        // pre-steps
        for arbiter in self.arbiters.values_mut() {
            arbiter.pre_step(&mut self.bodies, inv_dt, &self.config);
        }
        for joint in &mut self.joints {
            joint.pre_step(&mut self.bodies, inv_dt, &self.config);
        }

        // fixed iteration count, contacts before joints in every pass
        for _ in 0..self.config.iterations {
            for arbiter in self.arbiters.values_mut() {
                arbiter.apply_impulse(&mut self.bodies, &self.config);
            }
            for joint in &mut self.joints {
                joint.apply_impulse(&mut self.bodies);
            }
        }

        // integrate velocities and consume the accumulated forces
        for body in self.bodies.iter_mut() {
            body.position += dt * body.velocity;
            body.rotation += dt * body.angular_velocity;

            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }
}
