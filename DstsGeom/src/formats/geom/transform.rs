//! Bone transforms and the matrix math behind bind poses.
//!
//! Matrices are glam's column-major `Mat4`. On disk a bind-pose matrix is the
//! top three rows of the affine matrix, row-major.

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

use crate::error::{Error, Result};

const SINGULAR_EPSILON: f32 = 1e-9;

/// Rotation, translation and scale of one bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub rotation: Quat,
    pub position: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rotation: Quat::IDENTITY,
        position: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn from_translation(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Affine matrix applying scale, then rotation, then translation.
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Split an affine matrix back into scale, rotation and translation.
    #[must_use]
    pub fn from_matrix(m: &Mat4) -> Self {
        let position = m.w_axis.truncate();
        let columns = [m.x_axis.truncate(), m.y_axis.truncate(), m.z_axis.truncate()];
        let scale = Vec3::new(
            columns[0].length(),
            columns[1].length(),
            columns[2].length(),
        );

        let normalise = |c: Vec3, s: f32| if s > f32::EPSILON { c / s } else { c };
        let rotation = Mat3::from_cols(
            normalise(columns[0], scale.x),
            normalise(columns[1], scale.y),
            normalise(columns[2], scale.z),
        );

        Self {
            rotation: quat_from_rotation(&rotation),
            position,
            scale,
        }
    }

    /// Per-component comparison. `q` and `-q` are treated as the same rotation.
    pub fn approx_eq(&self, other: &Transform, tolerance: f32) -> bool {
        let q = Vec4::from(self.rotation);
        let r = Vec4::from(other.rotation);
        (q.abs_diff_eq(r, tolerance) || q.abs_diff_eq(-r, tolerance))
            && self.position.abs_diff_eq(other.position, tolerance)
            && self.scale.abs_diff_eq(other.scale, tolerance)
    }
}

/// Convert a pure rotation matrix to a unit quaternion.
///
/// Picks the branch on the trace or the largest diagonal element, whichever
/// keeps the square root argument away from zero.
#[must_use]
pub fn quat_from_rotation(m: &Mat3) -> Quat {
    let e = |row: usize, col: usize| m.col(col)[row];
    let (m00, m11, m22) = (e(0, 0), e(1, 1), e(2, 2));
    let trace = m00 + m11 + m22;

    let (x, y, z, w) = if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        (
            (e(2, 1) - e(1, 2)) / s,
            (e(0, 2) - e(2, 0)) / s,
            (e(1, 0) - e(0, 1)) / s,
            0.25 * s,
        )
    } else if m00 > m11 && m00 > m22 {
        let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
        (
            0.25 * s,
            (e(0, 1) + e(1, 0)) / s,
            (e(0, 2) + e(2, 0)) / s,
            (e(2, 1) - e(1, 2)) / s,
        )
    } else if m11 > m22 {
        let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
        (
            (e(0, 1) + e(1, 0)) / s,
            0.25 * s,
            (e(1, 2) + e(2, 1)) / s,
            (e(0, 2) - e(2, 0)) / s,
        )
    } else {
        let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
        (
            (e(0, 2) + e(2, 0)) / s,
            (e(1, 2) + e(2, 1)) / s,
            0.25 * s,
            (e(1, 0) - e(0, 1)) / s,
        )
    };

    Quat::from_xyzw(x, y, z, w).normalize()
}

/// Invert an affine matrix (bottom row `0 0 0 1`).
pub fn invert_affine(m: &Mat4) -> Result<Mat4> {
    let linear = Mat3::from_mat4(*m);
    let det = linear.determinant();
    if det.abs() < SINGULAR_EPSILON {
        return Err(Error::inconsistent(
            None,
            format!("matrix is not invertible (determinant {det})"),
        ));
    }
    let inv = linear.inverse();
    let translation = -(inv * m.w_axis.truncate());
    Ok(Mat4::from_cols(
        inv.x_axis.extend(0.0),
        inv.y_axis.extend(0.0),
        inv.z_axis.extend(0.0),
        translation.extend(1.0),
    ))
}

/// Element-wise comparison of two matrices.
pub fn matrices_approx_eq(a: &Mat4, b: &Mat4, tolerance: f32) -> bool {
    a.abs_diff_eq(*b, tolerance)
}

/// Top three rows of `m`, row-major, as stored in the bind-pose table.
#[must_use]
pub fn to_rows(m: &Mat4) -> [f32; 12] {
    let mut out = [0.0f32; 12];
    for row in 0..3 {
        let r = m.row(row);
        out[row * 4..row * 4 + 4].copy_from_slice(&r.to_array());
    }
    out
}

/// Rebuild an affine matrix from its stored top three rows.
#[must_use]
pub fn from_rows(rows: &[f32; 12]) -> Mat4 {
    Mat4::from_cols_array_2d(&[
        [rows[0], rows[4], rows[8], 0.0],
        [rows[1], rows[5], rows[9], 0.0],
        [rows[2], rows[6], rows[10], 0.0],
        [rows[3], rows[7], rows[11], 1.0],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f32 = 1e-4;

    #[test]
    fn test_translation_bind_pose() {
        let t = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let world = t.to_matrix();
        assert!(matrices_approx_eq(
            &world,
            &Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            TOL
        ));

        let ibpm = invert_affine(&world).unwrap();
        assert!(matrices_approx_eq(
            &ibpm,
            &Mat4::from_translation(Vec3::new(-1.0, -2.0, -3.0)),
            TOL
        ));

        let back = Transform::from_matrix(&invert_affine(&ibpm).unwrap());
        assert!(back.approx_eq(&t, TOL));
    }

    #[test]
    fn test_decompose_each_branch() {
        let rotations = [
            Quat::from_rotation_y(0.3),
            Quat::from_rotation_x(std::f32::consts::PI),
            Quat::from_rotation_y(std::f32::consts::PI),
            Quat::from_rotation_z(std::f32::consts::PI),
            Quat::from_euler(glam::EulerRot::XYZ, 2.5, -1.0, 2.9),
        ];
        for rotation in rotations {
            let t = Transform {
                rotation,
                position: Vec3::new(-4.0, 0.5, 10.0),
                scale: Vec3::new(2.0, 0.5, 1.5),
            };
            let m = t.to_matrix();
            let d = Transform::from_matrix(&m);
            assert!(d.approx_eq(&t, TOL), "{t:?} vs {d:?}");
            assert!(matrices_approx_eq(&d.to_matrix(), &m, TOL));
        }
    }

    #[test]
    fn test_invert_rejects_singular() {
        let m = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(invert_affine(&m).is_err());
    }

    #[test]
    fn test_rows_layout() {
        let m = Mat4::from_translation(Vec3::new(7.0, 8.0, 9.0));
        let rows = to_rows(&m);
        assert_eq!(
            rows,
            [1.0, 0.0, 0.0, 7.0, 0.0, 1.0, 0.0, 8.0, 0.0, 0.0, 1.0, 9.0]
        );
        assert_eq!(from_rows(&rows), m);
    }
}
