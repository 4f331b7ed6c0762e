use glam::{Mat2, Vec2};

pub trait Mat2Ext {
    /// Element-wise absolute value.
    fn abs(&self) -> Mat2;
}

impl Mat2Ext for Mat2 {
    fn abs(&self) -> Mat2 {
        Mat2::from_cols(self.col(0).abs(), self.col(1).abs())
    }
}

/// cross(v, s) = (s * v.y, -s * v.x)
#[inline]
pub(crate) fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// cross(s, v) = (-s * v.y, s * v.x)
#[inline]
pub(crate) fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

#[test]
fn test_mat2_abs() {
    let m = Mat2::from_cols(Vec2::new(-1.0, 2.0), Vec2::new(3.0, -4.0));
    let a = m.abs();
    assert_eq!(a.col(0), Vec2::new(1.0, 2.0));
    assert_eq!(a.col(1), Vec2::new(3.0, 4.0));
}

#[test]
fn test_cross_helpers() {
    let v = Vec2::new(2.0, 3.0);
    // cross(v, s) and cross(s, v) are antisymmetric
    assert_eq!(cross_vs(v, 1.0), Vec2::new(3.0, -2.0));
    assert_eq!(cross_sv(1.0, v), Vec2::new(-3.0, 2.0));
    assert_eq!(cross_vs(v, 2.0), -cross_sv(2.0, v));
    // rotating the x axis by a quarter turn gives the y axis
    assert_eq!(cross_sv(1.0, Vec2::X), Vec2::Y);
}
