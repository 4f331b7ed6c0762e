use crate::body::{BodyArena, BodyHandle};
use crate::math::cross_sv;
use crate::world::WorldConfig;
use glam::{Mat2, Vec2};

/// A point-to-point constraint pinning an anchor on one body to an anchor on
/// the other. Bilateral: the impulse can push or pull, so nothing is
/// clamped.
#[derive(Clone, Debug)]
pub struct Joint {
    body1: BodyHandle,
    body2: BodyHandle,
    m: Mat2,
    local_anchor1: Vec2,
    local_anchor2: Vec2,
    r1: Vec2,
    r2: Vec2,
    bias: Vec2,
    p: Vec2,
    pub softness: f32,
    pub bias_factor: f32,
}

impl Joint {
    /// Anchors both bodies to the world-space point `anchor`, capturing the
    /// offsets in each body's local frame.
    pub fn new(bodies: &BodyArena, body1: BodyHandle, body2: BodyHandle, anchor: Vec2) -> Self {
        let b1 = bodies.get_body(body1);
        let b2 = bodies.get_body(body2);

        let rot1_t = Mat2::from_angle(b1.rotation).transpose();
        let rot2_t = Mat2::from_angle(b2.rotation).transpose();

        Self {
            body1,
            body2,
            m: Mat2::ZERO,
            local_anchor1: rot1_t * (anchor - b1.position),
            local_anchor2: rot2_t * (anchor - b2.position),
            r1: Vec2::ZERO,
            r2: Vec2::ZERO,
            bias: Vec2::ZERO,
            p: Vec2::ZERO,
            softness: 0.0,
            bias_factor: 0.2,
        }
    }

    pub fn body_handles(&self) -> (BodyHandle, BodyHandle) {
        (self.body1, self.body2)
    }

    /// The current world-space positions of the two anchors.
    pub fn anchor_points(&self, bodies: &BodyArena) -> (Vec2, Vec2) {
        let b1 = bodies.get_body(self.body1);
        let b2 = bodies.get_body(self.body2);
        let p1 = b1.position + Mat2::from_angle(b1.rotation) * self.local_anchor1;
        let p2 = b2.position + Mat2::from_angle(b2.rotation) * self.local_anchor2;
        (p1, p2)
    }

    /// Rebuilds the effective-mass matrix and the position bias, and warm
    /// starts from the accumulated impulse.
    pub(crate) fn pre_step(&mut self, bodies: &mut BodyArena, inv_dt: f32, config: &WorldConfig) {
        let (b1, b2) = bodies.get_body_pair_mut(self.body1, self.body2);

        let rot1 = Mat2::from_angle(b1.rotation);
        let rot2 = Mat2::from_angle(b2.rotation);

        self.r1 = rot1 * self.local_anchor1;
        self.r2 = rot2 * self.local_anchor2;

        // K = K1 + K2 + K3: linear terms plus each body's angular term
        let inv_mass_sum = b1.inv_mass + b2.inv_mass;
        let k1 = Mat2::from_cols(
            Vec2::new(inv_mass_sum, 0.0),
            Vec2::new(0.0, inv_mass_sum),
        );
        let k2 = Mat2::from_cols(
            Vec2::new(
                b1.inv_inertia * self.r1.y * self.r1.y,
                -b1.inv_inertia * self.r1.x * self.r1.y,
            ),
            Vec2::new(
                -b1.inv_inertia * self.r1.x * self.r1.y,
                b1.inv_inertia * self.r1.x * self.r1.x,
            ),
        );
        let k3 = Mat2::from_cols(
            Vec2::new(
                b2.inv_inertia * self.r2.y * self.r2.y,
                -b2.inv_inertia * self.r2.x * self.r2.y,
            ),
            Vec2::new(
                -b2.inv_inertia * self.r2.x * self.r2.y,
                b2.inv_inertia * self.r2.x * self.r2.x,
            ),
        );

        let mut k = k1 + k2 + k3;
        k.col_mut(0).x += self.softness;
        k.col_mut(1).y += self.softness;

        // singular only if both bodies are immovable, which is a contract
        // violation caught by the debug assertion inside inverse()
        self.m = k.inverse();

        let p1 = b1.position + self.r1;
        let p2 = b2.position + self.r2;
        let dp = p2 - p1;

        self.bias = if config.position_correction {
            -self.bias_factor * inv_dt * dp
        } else {
            Vec2::ZERO
        };

        if config.warm_starting {
            b1.apply_impulse_at(self.r1, -self.p);
            b2.apply_impulse_at(self.r2, self.p);
        } else {
            self.p = Vec2::ZERO;
        }
    }

    pub(crate) fn apply_impulse(&mut self, bodies: &mut BodyArena) {
        let (b1, b2) = bodies.get_body_pair_mut(self.body1, self.body2);

        let dv = b2.velocity + cross_sv(b2.angular_velocity, self.r2)
            - b1.velocity
            - cross_sv(b1.angular_velocity, self.r1);

        let impulse = self.m * (self.bias - dv - self.softness * self.p);

        b1.apply_impulse_at(self.r1, -impulse);
        b2.apply_impulse_at(self.r2, impulse);

        self.p += impulse;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::body::Body;
    use crate::world::World;

    #[test]
    fn test_dynamic_pair_anchors_stay_coincident() {
        let mut world = World::default();

        let mut left = Body::new(Vec2::new(0.5, 0.5), 2.0);
        left.position = Vec2::new(-1.0, 0.0);
        let left = world.add_body(left);

        let mut right = Body::new(Vec2::new(0.5, 0.5), 1.0);
        right.position = Vec2::new(1.0, 0.0);
        let right = world.add_body(right);

        let joint = Joint::new(world.bodies(), left, right, Vec2::ZERO);
        world.add_joint(joint);

        for _ in 0..100 {
            world.step(1.0 / 60.0);
            let (p1, p2) = world.joints()[0].anchor_points(world.bodies());
            assert!((p1 - p2).length() < 1e-2);
        }

        // both bodies actually fell
        assert!(world.body(left).position.y < -5.0);
        assert!(world.body(right).position.y < -5.0);
    }

    #[test]
    fn test_pendulum_anchors_hold_under_swing() {
        let mut world = World::default();

        // the pivot block sits above the anchor, clear of the swing path
        let mut pivot = Body::new(Vec2::new(0.25, 0.25), f32::MAX);
        pivot.position = Vec2::new(1.0, 1.0);
        let pivot = world.add_body(pivot);

        let mut bob = Body::new(Vec2::new(0.5, 0.25), 1.0);
        bob.position = Vec2::new(2.0, 0.0);
        let bob = world.add_body(bob);

        let joint = Joint::new(world.bodies(), pivot, bob, Vec2::new(1.0, 0.0));
        world.add_joint(joint);

        let dt = 1.0 / 60.0;
        for _ in 0..100 {
            world.step(dt);
            let (p1, p2) = world.joints()[0].anchor_points(world.bodies());
            // the fast part of the swing tolerates a little more drift than
            // the Baumgarte term corrects per step
            assert!(
                (p1 - p2).length() < 3e-2,
                "anchors drifted apart: {} vs {}",
                p1,
                p2
            );
        }

        // the pendulum actually swung
        let bob = world.body(bob);
        assert!(bob.position.y < 0.0);
    }
}
