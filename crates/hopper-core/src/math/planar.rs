//! Planar (x, z) geometry
//!
//! Angles are measured about the axis pointing into the sagittal plane, so
//! a positive body angle pitches the body forward.

use crate::Vec2;

/// Scalar cross product `a × b = a_x b_z - a_z b_x`
///
/// A force `f` applied at lever arm `p` produces torque `p × f`.
pub fn cross2(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Tangent direction of a surface with outward normal `n`
pub fn tangent(normal: &Vec2) -> Vec2 {
    Vec2::new(normal.y, -normal.x)
}

/// Express a body-frame offset in the world frame
///
/// ```text
/// x = o_x cos θ + o_z sin θ
/// z = o_z cos θ - o_x sin θ
/// ```
pub fn body_to_world(offset: &Vec2, theta: f64) -> Vec2 {
    rotate_with(offset, theta.cos(), theta.sin())
}

/// [`body_to_world`] with the cosine and sine supplied separately
///
/// The trajectory model carries `cos θ` and `sin θ` as their own variables.
pub fn rotate_with(offset: &Vec2, cos: f64, sin: f64) -> Vec2 {
    Vec2::new(offset.x * cos + offset.y * sin, offset.y * cos - offset.x * sin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_cross2_sign() {
        let ex = Vec2::new(1.0, 0.0);
        let ez = Vec2::new(0.0, 1.0);
        assert_relative_eq!(cross2(&ex, &ez), 1.0);
        assert_relative_eq!(cross2(&ez, &ex), -1.0);
        assert_relative_eq!(cross2(&ex, &ex), 0.0);
    }

    #[test]
    fn test_tangent_is_orthogonal() {
        let n = Vec2::new(0.6, 0.8);
        let t = tangent(&n);
        assert_relative_eq!(t.dot(&n), 0.0);
        assert_relative_eq!(t.norm(), 1.0);

        let floor = tangent(&Vec2::new(0.0, 1.0));
        assert_relative_eq!(floor, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_body_to_world_quarter_turn() {
        let hip = Vec2::new(0.0, -0.5);
        assert_relative_eq!(body_to_world(&hip, 0.0), hip);

        let turned = body_to_world(&hip, FRAC_PI_2);
        assert_relative_eq!(turned, Vec2::new(-0.5, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_body_to_world_preserves_length() {
        let offset = Vec2::new(0.3, -0.4);
        for k in 0..12 {
            let theta = -PI + k as f64 * PI / 6.0;
            assert_relative_eq!(body_to_world(&offset, theta).norm(), 0.5, epsilon = 1e-12);
        }
    }
}
