use crate::body::{BodyArena, BodyHandle};
use crate::collide::collide;
use crate::contact::{Contact, MAX_CONTACT_POINTS};
use crate::math::{cross_sv, cross_vs};
use crate::world::WorldConfig;

const ALLOWED_PENETRATION: f32 = 0.01;

/// Canonical unordered body pair. The lower handle always comes first, so
/// `(a, b)` and `(b, a)` map to the same key, and the derived ordering gives
/// the arbiter map a stable, allocation-independent iteration order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArbiterKey {
    body1: BodyHandle,
    body2: BodyHandle,
}

impl ArbiterKey {
    pub fn new(handle_a: BodyHandle, handle_b: BodyHandle) -> Self {
        if handle_a < handle_b {
            Self {
                body1: handle_a,
                body2: handle_b,
            }
        } else {
            Self {
                body1: handle_b,
                body2: handle_a,
            }
        }
    }
}

/// The contact manifold between one pair of bodies, together with the solver
/// state that persists across frames.
#[derive(Clone, Debug)]
pub struct Arbiter {
    body1: BodyHandle,
    body2: BodyHandle,
    contacts: [Contact; MAX_CONTACT_POINTS],
    num_contacts: usize,
    friction: f32,
}

impl Arbiter {
    /// Runs the narrow phase for the pair. Handles are reordered so that
    /// `body1 < body2`, matching the arbiter key.
    pub(crate) fn new(bodies: &BodyArena, handle_a: BodyHandle, handle_b: BodyHandle) -> Self {
        let (body1, body2) = if handle_a < handle_b {
            (handle_a, handle_b)
        } else {
            (handle_b, handle_a)
        };

        let mut contacts = [Contact::default(); MAX_CONTACT_POINTS];
        let num_contacts = collide(
            &mut contacts,
            bodies.get_body(body1),
            bodies.get_body(body2),
        );

        let friction = (bodies.get_body(body1).friction * bodies.get_body(body2).friction).sqrt();

        Self {
            body1,
            body2,
            contacts,
            num_contacts,
            friction,
        }
    }

    pub fn body_handles(&self) -> (BodyHandle, BodyHandle) {
        (self.body1, self.body2)
    }

    pub fn num_contacts(&self) -> usize {
        self.num_contacts
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts[..self.num_contacts]
    }

    /// Replaces the manifold with freshly collided points, carrying the
    /// accumulated impulses over for every point whose feature pair is still
    /// present.
    pub(crate) fn update(&mut self, new_contacts: &[Contact], warm_starting: bool) {
        let mut merged = [Contact::default(); MAX_CONTACT_POINTS];

        for (i, new_contact) in new_contacts.iter().enumerate() {
            let old = self.contacts[..self.num_contacts]
                .iter()
                .find(|old| old.feature == new_contact.feature);

            merged[i] = *new_contact;
            if let Some(old) = old {
                if warm_starting {
                    merged[i].p_normal = old.p_normal;
                    merged[i].p_tangent = old.p_tangent;
                    merged[i].p_normal_bias = old.p_normal_bias;
                } else {
                    merged[i].p_normal = 0.0;
                    merged[i].p_tangent = 0.0;
                    merged[i].p_normal_bias = 0.0;
                }
            }
        }

        self.contacts = merged;
        self.num_contacts = new_contacts.len();
    }

    /// Computes the effective masses and the Baumgarte bias for every
    /// contact, and re-applies the carried impulses when accumulation is
    /// enabled (the warm start).
    pub(crate) fn pre_step(&mut self, bodies: &mut BodyArena, inv_dt: f32, config: &WorldConfig) {
        let bias_factor = if config.position_correction { 0.2 } else { 0.0 };

        let (b1, b2) = bodies.get_body_pair_mut(self.body1, self.body2);

        for contact in &mut self.contacts[..self.num_contacts] {
            let r1 = contact.position - b1.position;
            let r2 = contact.position - b2.position;

            let rn1 = r1.dot(contact.normal);
            let rn2 = r2.dot(contact.normal);
            let k_normal = b1.inv_mass
                + b2.inv_mass
                + b1.inv_inertia * (r1.dot(r1) - rn1 * rn1)
                + b2.inv_inertia * (r2.dot(r2) - rn2 * rn2);
            contact.mass_normal = 1.0 / k_normal;

            let tangent = cross_vs(contact.normal, 1.0);
            let rt1 = r1.dot(tangent);
            let rt2 = r2.dot(tangent);
            let k_tangent = b1.inv_mass
                + b2.inv_mass
                + b1.inv_inertia * (r1.dot(r1) - rt1 * rt1)
                + b2.inv_inertia * (r2.dot(r2) - rt2 * rt2);
            contact.mass_tangent = 1.0 / k_tangent;

            // only push back once the overlap exceeds the allowed slop, and
            // never pull separated bodies together
            contact.bias =
                -bias_factor * inv_dt * f32::min(0.0, contact.separation + ALLOWED_PENETRATION);

            if config.accumulate_impulses {
                let p = contact.p_normal * contact.normal + contact.p_tangent * tangent;
                b1.apply_impulse_at(r1, -p);
                b2.apply_impulse_at(r2, p);
            }
        }
    }

    /// One Gauss-Seidel pass over the manifold: normal impulse first, then
    /// friction clamped to the Coulomb cone around the current normal
    /// impulse.
    pub(crate) fn apply_impulse(&mut self, bodies: &mut BodyArena, config: &WorldConfig) {
        let friction = self.friction;
        let (b1, b2) = bodies.get_body_pair_mut(self.body1, self.body2);

        for contact in &mut self.contacts[..self.num_contacts] {
            contact.r1 = contact.position - b1.position;
            contact.r2 = contact.position - b2.position;

            // relative velocity at the contact point
            let dv = b2.velocity + cross_sv(b2.angular_velocity, contact.r2)
                - b1.velocity
                - cross_sv(b1.angular_velocity, contact.r1);

            let vn = dv.dot(contact.normal);
            let mut d_pn = contact.mass_normal * (-vn + contact.bias);

            if config.accumulate_impulses {
                // clamp the accumulated impulse, not the increment
                let pn0 = contact.p_normal;
                contact.p_normal = f32::max(pn0 + d_pn, 0.0);
                d_pn = contact.p_normal - pn0;
            } else {
                d_pn = f32::max(d_pn, 0.0);
            }

            let pn = d_pn * contact.normal;
            b1.apply_impulse_at(contact.r1, -pn);
            b2.apply_impulse_at(contact.r2, pn);

            // recompute the relative velocity for the friction solve
            let dv = b2.velocity + cross_sv(b2.angular_velocity, contact.r2)
                - b1.velocity
                - cross_sv(b1.angular_velocity, contact.r1);

            let tangent = cross_vs(contact.normal, 1.0);
            let vt = dv.dot(tangent);
            let mut d_pt = contact.mass_tangent * (-vt);

            if config.accumulate_impulses {
                let max_pt = friction * contact.p_normal;
                let old_tangent_impulse = contact.p_tangent;
                contact.p_tangent = (old_tangent_impulse + d_pt).clamp(-max_pt, max_pt);
                d_pt = contact.p_tangent - old_tangent_impulse;
            } else {
                let max_pt = friction * d_pn;
                d_pt = d_pt.clamp(-max_pt, max_pt);
            }

            let pt = d_pt * tangent;
            b1.apply_impulse_at(contact.r1, -pt);
            b2.apply_impulse_at(contact.r2, pt);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::body::Body;
    use glam::Vec2;

    fn overlapping_pair() -> (BodyArena, BodyHandle, BodyHandle) {
        let mut bodies = BodyArena::new();
        let a = bodies.add(Body::new(Vec2::new(1.0, 1.0), f32::MAX));
        let mut falling = Body::new(Vec2::new(1.0, 1.0), 1.0);
        falling.position = Vec2::new(0.0, 1.99);
        let b = bodies.add(falling);
        (bodies, a, b)
    }

    #[test]
    fn test_key_symmetry() {
        let a = BodyHandle(3);
        let b = BodyHandle(7);
        assert_eq!(ArbiterKey::new(a, b), ArbiterKey::new(b, a));
        assert!(ArbiterKey::new(a, b) < ArbiterKey::new(BodyHandle(4), BodyHandle(5)));
    }

    #[test]
    fn test_handles_are_ordered() {
        let (bodies, a, b) = overlapping_pair();
        let arbiter = Arbiter::new(&bodies, b, a);
        assert_eq!(arbiter.body_handles(), (a, b));
        assert!(arbiter.num_contacts() > 0);
    }

    #[test]
    fn test_update_carries_impulses_when_warm() {
        let (bodies, a, b) = overlapping_pair();
        let mut arbiter = Arbiter::new(&bodies, a, b);
        assert_eq!(arbiter.num_contacts(), 2);
        arbiter.contacts[0].p_normal = 1.5;
        arbiter.contacts[0].p_tangent = -0.25;
        arbiter.contacts[1].p_normal = 0.75;

        let fresh = Arbiter::new(&bodies, a, b);
        arbiter.update(fresh.contacts(), true);

        assert_eq!(arbiter.contacts[0].p_normal, 1.5);
        assert_eq!(arbiter.contacts[0].p_tangent, -0.25);
        assert_eq!(arbiter.contacts[1].p_normal, 0.75);
    }

    #[test]
    fn test_update_discards_impulses_when_cold() {
        let (bodies, a, b) = overlapping_pair();
        let mut arbiter = Arbiter::new(&bodies, a, b);
        arbiter.contacts[0].p_normal = 1.5;
        arbiter.contacts[0].p_tangent = -0.25;

        let fresh = Arbiter::new(&bodies, a, b);
        arbiter.update(fresh.contacts(), false);

        assert_eq!(arbiter.contacts[0].p_normal, 0.0);
        assert_eq!(arbiter.contacts[0].p_tangent, 0.0);
    }

    #[test]
    fn test_update_zeroes_unmatched_points() {
        let (bodies, a, b) = overlapping_pair();
        let mut arbiter = Arbiter::new(&bodies, a, b);
        arbiter.contacts[0].p_normal = 1.5;

        // unmatched features start from scratch even with warm starting on
        let mut fresh = Arbiter::new(&bodies, a, b);
        fresh.contacts[0].feature.flip();
        arbiter.update(fresh.contacts(), true);

        assert_eq!(arbiter.contacts[0].p_normal, 0.0);
    }
}
