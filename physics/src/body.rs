use glam::Vec2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

impl Default for BodyHandle {
    // default to invalid value
    fn default() -> Self {
        Self(u32::MAX)
    }
}

#[derive(Debug)]
pub struct BodyArena {
    bodies: Vec<Body>,
    handles: Vec<BodyHandle>,
}

impl Default for BodyArena {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyArena {
    pub fn new() -> Self {
        BodyArena {
            bodies: Vec::new(),
            handles: Vec::new(),
        }
    }

    pub fn add(&mut self, body: Body) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(body);
        self.handles.push(handle);
        handle
    }

    pub fn iter(&self) -> core::slice::Iter<Body> {
        self.bodies.iter()
    }

    pub fn iter_mut(&mut self) -> core::slice::IterMut<Body> {
        self.bodies.iter_mut()
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.handles.clear();
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    fn get_body_pair_mut_from_indices(
        &mut self,
        index_a: usize,
        index_b: usize,
    ) -> (&mut Body, &mut Body) {
        match index_a.cmp(&index_b) {
            std::cmp::Ordering::Less => {
                let mut iter = self.bodies.iter_mut();
                let body_a = iter.nth(index_a).unwrap();
                let body_b = iter.nth(index_b - index_a - 1).unwrap();
                (body_a, body_b)
            }
            std::cmp::Ordering::Greater => {
                let mut iter = self.bodies.iter_mut();
                let body_b = iter.nth(index_b).unwrap();
                let body_a = iter.nth(index_a - index_b - 1).unwrap();
                (body_a, body_b)
            }
            std::cmp::Ordering::Equal => {
                panic!("get_body_pair_mut called with the same index {}", index_a)
            }
        }
    }

    pub fn get_body_pair_mut(
        &mut self,
        handle_a: BodyHandle,
        handle_b: BodyHandle,
    ) -> (&mut Body, &mut Body) {
        self.get_body_pair_mut_from_indices(handle_a.0 as usize, handle_b.0 as usize)
    }

    pub fn get_body_mut(&mut self, handle: BodyHandle) -> &mut Body {
        &mut self.bodies[handle.0 as usize]
    }

    pub fn get_body(&self, handle: BodyHandle) -> &Body {
        &self.bodies[handle.0 as usize]
    }

    pub fn handles(&self) -> &Vec<BodyHandle> {
        &self.handles
    }
}

/// A rigid box. `half_extents` are the half widths along the local axes;
/// `mass == f32::MAX` marks the body as immovable.
#[derive(Clone, Debug)]
pub struct Body {
    pub position: Vec2,
    pub rotation: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub force: Vec2,
    pub torque: f32,
    pub half_extents: Vec2,
    pub friction: f32,
    pub mass: f32,
    pub inv_mass: f32,
    pub inertia: f32,
    pub inv_inertia: f32,
    pub grounded: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            half_extents: Vec2::new(0.5, 0.5),
            friction: 0.2,
            mass: f32::MAX,
            inv_mass: 0.0,
            inertia: f32::MAX,
            inv_inertia: 0.0,
            grounded: false,
        }
    }
}

impl Body {
    pub fn new(half_extents: Vec2, mass: f32) -> Self {
        let mut body = Body::default();
        body.set(half_extents, mass);
        body
    }

    /// Resets kinematic state and recomputes the mass properties. The
    /// rotational inertia is always derived from the mass and extents.
    pub fn set(&mut self, half_extents: Vec2, mass: f32) {
        self.position = Vec2::ZERO;
        self.rotation = 0.0;
        self.velocity = Vec2::ZERO;
        self.angular_velocity = 0.0;
        self.force = Vec2::ZERO;
        self.torque = 0.0;
        self.friction = 0.2;
        self.half_extents = half_extents;
        self.mass = mass;
        self.grounded = false;

        if mass < f32::MAX {
            let size = half_extents * 2.0;
            self.inv_mass = 1.0 / mass;
            self.inertia = mass * size.length_squared() / 12.0;
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inv_mass = 0.0;
            self.inertia = f32::MAX;
            self.inv_inertia = 0.0;
        }
    }

    /// Accumulates a force, consumed by the next world step.
    pub fn add_force(&mut self, force: Vec2) {
        self.force += force;
    }

    pub fn add_torque(&mut self, torque: f32) {
        self.torque += torque;
    }

    /// Applies an impulse at the offset `r` from the body centre. Does
    /// nothing to an immovable body since both inverse terms are zero.
    pub fn apply_impulse_at(&mut self, r: Vec2, impulse: Vec2) {
        self.velocity += self.inv_mass * impulse;
        self.angular_velocity += self.inv_inertia * r.perp_dot(impulse);
    }

    pub fn has_infinite_mass(&self) -> bool {
        self.inv_mass == 0.0
    }

    /// True while the body rests on a roughly horizontal surface; recomputed
    /// by the world from the live contact manifolds.
    pub fn is_grounded(&self) -> bool {
        self.grounded
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mass_properties() {
        let body = Body::new(Vec2::new(1.0, 2.0), 6.0);
        assert_eq!(body.inv_mass, 1.0 / 6.0);
        // I = m * (w^2 + h^2) / 12 for the full extents 2x4
        assert_eq!(body.inertia, 6.0 * (4.0 + 16.0) / 12.0);
        assert_eq!(body.inv_inertia, 1.0 / body.inertia);
    }

    #[test]
    fn test_infinite_mass_is_inert() {
        let mut body = Body::new(Vec2::new(1.0, 1.0), f32::MAX);
        assert!(body.has_infinite_mass());
        assert_eq!(body.inv_mass, 0.0);
        assert_eq!(body.inv_inertia, 0.0);

        body.apply_impulse_at(Vec2::new(1.0, 0.0), Vec2::new(0.0, 100.0));
        assert_eq!(body.velocity, Vec2::ZERO);
        assert_eq!(body.angular_velocity, 0.0);
    }

    #[test]
    fn test_get_body_pair_mut() {
        let mut arena = BodyArena::new();
        let a = arena.add(Body::new(Vec2::new(1.0, 1.0), 1.0));
        let b = arena.add(Body::new(Vec2::new(1.0, 1.0), 2.0));

        let (body_a, body_b) = arena.get_body_pair_mut(a, b);
        assert_eq!(body_a.mass, 1.0);
        assert_eq!(body_b.mass, 2.0);

        // reversed handles give back the same pairing
        let (body_b, body_a) = arena.get_body_pair_mut(b, a);
        assert_eq!(body_a.mass, 1.0);
        assert_eq!(body_b.mass, 2.0);
    }
}
