use crate::body::Body;
use crate::contact::{Contact, Edge, FeaturePair, MAX_CONTACT_POINTS};
use crate::math::Mat2Ext;
use glam::{Mat2, Vec2};

// A candidate axis must beat the current best by this margin before it takes
// over as the reference face.
const RELATIVE_TOL: f32 = 0.95;
const ABSOLUTE_TOL: f32 = 0.01;

/// Which face supplies the reference normal for clipping.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Axis {
    FaceAX,
    FaceAY,
    FaceBX,
    FaceBY,
}

#[derive(Copy, Clone, Default)]
struct ClipVertex {
    v: Vec2,
    fp: FeaturePair,
}

/// The clipping setup derived from the chosen reference axis.
struct RefFace {
    front_normal: Vec2,
    front: f32,
    side_normal: Vec2,
    neg_side: f32,
    pos_side: f32,
    neg_edge: Edge,
    pos_edge: Edge,
}

fn clip_segment_to_line(
    v_in: [ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    clip_edge: Edge,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut num_out = 0;

    // distance of the end points to the line
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // keep the points behind the plane
    if distance0 <= 0.0 {
        v_out[num_out] = v_in[0];
        num_out += 1;
    }
    if distance1 <= 0.0 {
        v_out[num_out] = v_in[1];
        num_out += 1;
    }

    // if the points straddle the plane, emit the intersection point
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[num_out].v = v_in[0].v + interp * (v_in[1].v - v_in[0].v);
        if distance0 > 0.0 {
            v_out[num_out].fp = v_in[0].fp;
            v_out[num_out].fp.in_edge_1 = clip_edge;
            v_out[num_out].fp.in_edge_2 = Edge::None;
        } else {
            v_out[num_out].fp = v_in[1].fp;
            v_out[num_out].fp.out_edge_1 = clip_edge;
            v_out[num_out].fp.out_edge_2 = Edge::None;
        }
        num_out += 1;
    }

    (v_out, num_out)
}

/// Picks the edge of the incident box most anti-parallel to the reference
/// normal and returns its endpoints in world space, tagged with the edge ids
/// they came from.
fn compute_incident_edge(h: Vec2, pos: Vec2, rot: Mat2, normal: Vec2) -> [ClipVertex; 2] {
    let mut c = [ClipVertex::default(); 2];

    // the normal comes from the reference box; convert it to the incident
    // box's frame and flip its sign
    let n = -(rot.transpose() * normal);
    let n_abs = n.abs();

    if n_abs.x > n_abs.y {
        if n.x >= 0.0 {
            c[0].v = Vec2::new(h.x, -h.y);
            c[0].fp.in_edge_2 = Edge::Edge3;
            c[0].fp.out_edge_2 = Edge::Edge4;

            c[1].v = Vec2::new(h.x, h.y);
            c[1].fp.in_edge_2 = Edge::Edge4;
            c[1].fp.out_edge_2 = Edge::Edge1;
        } else {
            c[0].v = Vec2::new(-h.x, h.y);
            c[0].fp.in_edge_2 = Edge::Edge1;
            c[0].fp.out_edge_2 = Edge::Edge2;

            c[1].v = Vec2::new(-h.x, -h.y);
            c[1].fp.in_edge_2 = Edge::Edge2;
            c[1].fp.out_edge_2 = Edge::Edge3;
        }
    } else if n.y >= 0.0 {
        c[0].v = Vec2::new(h.x, h.y);
        c[0].fp.in_edge_2 = Edge::Edge4;
        c[0].fp.out_edge_2 = Edge::Edge1;

        c[1].v = Vec2::new(-h.x, h.y);
        c[1].fp.in_edge_2 = Edge::Edge1;
        c[1].fp.out_edge_2 = Edge::Edge2;
    } else {
        c[0].v = Vec2::new(-h.x, -h.y);
        c[0].fp.in_edge_2 = Edge::Edge2;
        c[0].fp.out_edge_2 = Edge::Edge3;

        c[1].v = Vec2::new(h.x, -h.y);
        c[1].fp.in_edge_2 = Edge::Edge3;
        c[1].fp.out_edge_2 = Edge::Edge4;
    }

    c[0].v = pos + rot * c[0].v;
    c[1].v = pos + rot * c[1].v;

    c
}

/// Box-box separating axis test. Writes up to two contact points and returns
/// how many were produced. The normal always points from `body_a` to
/// `body_b`.
pub(crate) fn collide(
    contacts: &mut [Contact; MAX_CONTACT_POINTS],
    body_a: &Body,
    body_b: &Body,
) -> usize {
    let h_a = body_a.half_extents;
    let h_b = body_b.half_extents;

    let pos_a = body_a.position;
    let pos_b = body_b.position;

    let rot_a = Mat2::from_angle(body_a.rotation);
    let rot_b = Mat2::from_angle(body_b.rotation);

    let rot_a_t = rot_a.transpose();
    let rot_b_t = rot_b.transpose();

    let dp = pos_b - pos_a;
    let d_a = rot_a_t * dp;
    let d_b = rot_b_t * dp;

    let c = rot_a_t * rot_b;
    let abs_c = c.abs();
    let abs_c_t = abs_c.transpose();

    // face separations in each box's own frame; positive means a separating
    // axis exists and the boxes do not touch
    let face_a = d_a.abs() - h_a - abs_c * h_b;
    if face_a.x > 0.0 || face_a.y > 0.0 {
        return 0;
    }
    let face_b = d_b.abs() - abs_c_t * h_a - h_b;
    if face_b.x > 0.0 || face_b.y > 0.0 {
        return 0;
    }

    // find the axis of least penetration, with hysteresis
    let mut axis = Axis::FaceAX;
    let mut separation = face_a.x;
    let mut normal = if d_a.x > 0.0 {
        rot_a.col(0)
    } else {
        -rot_a.col(0)
    };

    if face_a.y > RELATIVE_TOL * separation + ABSOLUTE_TOL * h_a.y {
        axis = Axis::FaceAY;
        separation = face_a.y;
        normal = if d_a.y > 0.0 {
            rot_a.col(1)
        } else {
            -rot_a.col(1)
        };
    }

    if face_b.x > RELATIVE_TOL * separation + ABSOLUTE_TOL * h_b.x {
        axis = Axis::FaceBX;
        separation = face_b.x;
        normal = if d_b.x > 0.0 {
            rot_b.col(0)
        } else {
            -rot_b.col(0)
        };
    }

    if face_b.y > RELATIVE_TOL * separation + ABSOLUTE_TOL * h_b.y {
        axis = Axis::FaceBY;
        normal = if d_b.y > 0.0 {
            rot_b.col(1)
        } else {
            -rot_b.col(1)
        };
    }

    // set up the clipping planes and the incident edge to be clipped
    let (face, incident_edge) = match axis {
        Axis::FaceAX => {
            let front_normal = normal;
            let side_normal = rot_a.col(1);
            let side = pos_a.dot(side_normal);
            (
                RefFace {
                    front_normal,
                    front: pos_a.dot(front_normal) + h_a.x,
                    side_normal,
                    neg_side: -side + h_a.y,
                    pos_side: side + h_a.y,
                    neg_edge: Edge::Edge3,
                    pos_edge: Edge::Edge1,
                },
                compute_incident_edge(h_b, pos_b, rot_b, front_normal),
            )
        }
        Axis::FaceAY => {
            let front_normal = normal;
            let side_normal = rot_a.col(0);
            let side = pos_a.dot(side_normal);
            (
                RefFace {
                    front_normal,
                    front: pos_a.dot(front_normal) + h_a.y,
                    side_normal,
                    neg_side: -side + h_a.x,
                    pos_side: side + h_a.x,
                    neg_edge: Edge::Edge2,
                    pos_edge: Edge::Edge4,
                },
                compute_incident_edge(h_b, pos_b, rot_b, front_normal),
            )
        }
        Axis::FaceBX => {
            let front_normal = -normal;
            let side_normal = rot_b.col(1);
            let side = pos_b.dot(side_normal);
            (
                RefFace {
                    front_normal,
                    front: pos_b.dot(front_normal) + h_b.x,
                    side_normal,
                    neg_side: -side + h_b.y,
                    pos_side: side + h_b.y,
                    neg_edge: Edge::Edge3,
                    pos_edge: Edge::Edge1,
                },
                compute_incident_edge(h_a, pos_a, rot_a, front_normal),
            )
        }
        Axis::FaceBY => {
            let front_normal = -normal;
            let side_normal = rot_b.col(0);
            let side = pos_b.dot(side_normal);
            (
                RefFace {
                    front_normal,
                    front: pos_b.dot(front_normal) + h_b.y,
                    side_normal,
                    neg_side: -side + h_b.x,
                    pos_side: side + h_b.x,
                    neg_edge: Edge::Edge2,
                    pos_edge: Edge::Edge4,
                },
                compute_incident_edge(h_a, pos_a, rot_a, front_normal),
            )
        }
    };

    // clip the incident edge against the two side planes of the reference
    // face
    let (clip_points1, np) =
        clip_segment_to_line(incident_edge, -face.side_normal, face.neg_side, face.neg_edge);
    if np < 2 {
        return 0;
    }

    let (clip_points2, np) =
        clip_segment_to_line(clip_points1, face.side_normal, face.pos_side, face.pos_edge);
    if np < 2 {
        return 0;
    }

    // due to roundoff it is possible that clipping removes all points
    let mut num_contacts = 0;
    for clip_vertex in &clip_points2 {
        let separation = face.front_normal.dot(clip_vertex.v) - face.front;

        if separation <= 0.0 {
            let contact = &mut contacts[num_contacts];
            *contact = Contact::default();
            contact.separation = separation;
            contact.normal = normal;
            // slide the contact point onto the reference face
            contact.position = clip_vertex.v - separation * face.front_normal;
            contact.feature = clip_vertex.fp;
            if axis == Axis::FaceBX || axis == Axis::FaceBY {
                contact.feature.flip();
            }
            num_contacts += 1;
        }
    }

    num_contacts
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::body::Body;

    fn collide_pair(body_a: &Body, body_b: &Body) -> ([Contact; MAX_CONTACT_POINTS], usize) {
        let mut contacts = [Contact::default(); MAX_CONTACT_POINTS];
        let num = collide(&mut contacts, body_a, body_b);
        (contacts, num)
    }

    #[test]
    fn test_face_overlap() {
        // 0.5 units of x overlap, 2 units of y overlap
        let body_a = Body::new(Vec2::new(1.0, 1.0), 1.0);
        let mut body_b = Body::new(Vec2::new(1.0, 1.0), 1.0);
        body_b.position = Vec2::new(1.5, 0.0);

        let (contacts, num) = collide_pair(&body_a, &body_b);
        assert_eq!(num, 2);
        for contact in &contacts[..num] {
            assert_eq!(contact.normal, Vec2::new(1.0, 0.0));
            assert!((contact.separation + 0.5).abs() < 1e-6);
            // points are projected onto the reference face of box a
            assert!((contact.position.x - 1.0).abs() < 1e-6);
        }
        assert_eq!(contacts[0].position.y, 1.0);
        assert_eq!(contacts[1].position.y, -1.0);
        assert_ne!(contacts[0].feature, contacts[1].feature);
    }

    #[test]
    fn test_separated_boxes() {
        let body_a = Body::new(Vec2::new(1.0, 1.0), 1.0);
        let mut body_b = Body::new(Vec2::new(1.0, 1.0), 1.0);
        body_b.position = Vec2::new(2.5, 0.0);

        let (_, num) = collide_pair(&body_a, &body_b);
        assert_eq!(num, 0);
    }

    #[test]
    fn test_rotated_corner_touch() {
        // a 45 degree diamond resting into the top face of a flat box
        let mut body_a = Body::new(Vec2::new(2.0, 0.5), f32::MAX);
        body_a.position = Vec2::new(0.0, -0.5);
        let mut body_b = Body::new(Vec2::new(0.5, 0.5), 1.0);
        body_b.rotation = std::f32::consts::FRAC_PI_4;
        // corner reaches down to roughly -sqrt(0.5); leave a little overlap
        body_b.position = Vec2::new(0.0, 0.65);

        let (contacts, num) = collide_pair(&body_a, &body_b);
        assert!(num >= 1);
        for contact in &contacts[..num] {
            assert!(contact.separation <= 0.0);
            // normal points from a towards b, i.e. upwards
            assert!(contact.normal.y > 0.9);
        }
    }

    #[test]
    fn test_feature_ids_stable_across_drift() {
        // the same geometric situation shifted slightly keeps the same
        // feature pairs, which is what manifold merging relies on
        let body_a = Body::new(Vec2::new(1.0, 1.0), f32::MAX);
        let mut body_b = Body::new(Vec2::new(1.0, 1.0), 1.0);
        body_b.position = Vec2::new(1.5, 0.0);

        let (before, num_before) = collide_pair(&body_a, &body_b);
        body_b.position = Vec2::new(1.52, 0.0);
        let (after, num_after) = collide_pair(&body_a, &body_b);

        assert_eq!(num_before, 2);
        assert_eq!(num_after, 2);
        assert_eq!(before[0].feature, after[0].feature);
        assert_eq!(before[1].feature, after[1].feature);
    }
}
