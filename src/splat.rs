use crate::camera::CameraParams;
use crate::math::{
    mat3_mul, mat3_transpose, quat_to_rotation_matrix, scale_to_matrix, Mat3, Vec3,
};

/// Screen-space blur added to both covariance diagonals: anti-aliasing
/// floor against degenerate zero-area splats.
pub const COV2D_BLUR: f32 = 0.3;

/// Floor for the eigenvalue discriminant; guards the sqrt against small
/// negative values from floating-point cancellation.
pub const EIGEN_DISC_FLOOR: f32 = 0.1;

/// Minimum view-space depth used for the perspective divide.
pub const MIN_VIEW_Z: f32 = 1e-6;

/// Bounding radius in standard deviations of the projected gaussian.
pub const RADIUS_SIGMA: f32 = 3.0;

/// One anisotropic 3D gaussian in canonical (log-scale, logit-opacity)
/// form, as stored by 3DGS training output.
#[derive(Debug, Clone, Copy)]
pub struct Splat {
    pub mean: Vec3,
    pub log_scale: Vec3,
    /// Unit quaternion, (w, x, y, z).
    pub rotation: [f32; 4],
    pub color: [f32; 3],
    pub opacity_logit: f32,
}

/// World covariance `V = M * M^T` with `M = R * diag(exp(log_scale))`.
/// Rebuilt fresh each dispatch; derived covariance is never cached.
pub fn compute_3d_covariance(log_scale: Vec3, rotation: [f32; 4]) -> Mat3 {
    let r = quat_to_rotation_matrix(rotation);
    let s = scale_to_matrix(log_scale.exp());
    let m = mat3_mul(r, s);
    mat3_mul(m, mat3_transpose(m))
}

/// EWA projection of a world covariance into screen space.
///
/// The perspective map is linearized at the view-space point: the tangent
/// point is clamped to 1.3x the frustum's tangent half-angles so extreme
/// peripheral splats do not blow up the estimate, then `T = J * W` carries
/// the covariance through `T * V * T^T`. Returns the symmetric 2x2 block
/// as `(a, b, c)` with the blur constant already applied.
pub fn project_covariance_to_2d(
    cov_3d: Mat3,
    params: &CameraParams,
    p_view: Vec3,
) -> (f32, f32, f32) {
    let z = p_view.z.max(MIN_VIEW_Z);

    let lim_x = 1.3 * params.tan_fov_x;
    let lim_y = 1.3 * params.tan_fov_y;
    let tx = (p_view.x / z).clamp(-lim_x, lim_x) * z;
    let ty = (p_view.y / z).clamp(-lim_y, lim_y) * z;

    let inv_z = 1.0 / z;
    let inv_z2 = inv_z * inv_z;
    let jac = [
        [params.fx * inv_z, 0.0, -params.fx * tx * inv_z2],
        [0.0, params.fy * inv_z, -params.fy * ty * inv_z2],
        [0.0, 0.0, 0.0],
    ];

    let t = mat3_mul(jac, params.view_rot);
    let cov_2d = mat3_mul(mat3_mul(t, cov_3d), mat3_transpose(t));

    (
        cov_2d[0][0] + COV2D_BLUR,
        cov_2d[0][1],
        cov_2d[1][1] + COV2D_BLUR,
    )
}

/// Analytic eigenvalues of the symmetric 2x2 `[[a, b], [b, c]]`,
/// largest first.
pub fn cov2d_eigenvalues(cov_a: f32, cov_b: f32, cov_c: f32) -> (f32, f32) {
    let mid = 0.5 * (cov_a + cov_c);
    let det = cov_a * cov_c - cov_b * cov_b;
    let disc = (mid * mid - det).max(EIGEN_DISC_FLOOR).sqrt();
    (mid + disc, mid - disc)
}

/// Conservative circular bound: ceil of three standard deviations along
/// the major eigenvector, in pixels. Zero means the splat is culled.
pub fn bounding_radius(cov_a: f32, cov_b: f32, cov_c: f32) -> u32 {
    let (lambda1, lambda2) = cov2d_eigenvalues(cov_a, cov_b, cov_c);
    let max_lambda = lambda1.max(lambda2).max(0.0);
    (RADIUS_SIGMA * max_lambda.sqrt()).ceil() as u32
}

/// Pinhole projection of a view-space point to pixel coordinates.
pub fn project_to_pixel(p_view: Vec3, params: &CameraParams) -> [f32; 2] {
    let inv_z = 1.0 / p_view.z.max(MIN_VIEW_Z);
    [
        p_view.x * inv_z * params.fx + params.cx,
        p_view.y * inv_z * params.fy + params.cy,
    ]
}

/// Spread of the 3D gaussian used for scene framing: mean plus the
/// largest axis scale.
pub fn world_extent(splat: &Splat) -> f32 {
    let s = splat.log_scale.exp();
    s.x.max(s.y).max(s.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraParams;

    fn pinhole_params() -> CameraParams {
        let view = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        CameraParams::from_view_matrix(
            view,
            (1000.0, 1000.0),
            (400.0, 300.0),
            (800, 600),
            16,
            0.01,
        )
    }

    #[test]
    fn isotropic_covariance_radius_is_three_sigma() {
        // diag(s, s): discriminant is zero, the 0.1 floor contributes
        // sqrt(0.1) to the eigenvalue; pick s where the ceil absorbs it.
        for &s in &[2.0_f32, 50.0, 123.4] {
            let expected = (3.0 * s.sqrt()).ceil() as u32;
            assert_eq!(bounding_radius(s, 0.0, s), expected, "s = {s}");
        }
    }

    #[test]
    fn anisotropic_radius_follows_major_axis() {
        // diag(95, 1): major eigenvalue 95, minor 1.
        let (l1, l2) = cov2d_eigenvalues(95.0, 0.0, 1.0);
        assert!((l1 - 95.0).abs() < 0.1);
        assert!((l2 - 1.0).abs() < 0.1);
        // 3 * sqrt(95) = 29.24
        assert_eq!(bounding_radius(95.0, 0.0, 1.0), 30);
    }

    #[test]
    fn near_degenerate_discriminant_is_floored() {
        // a*c ~ b^2 makes the discriminant cancel to ~0; the floor keeps
        // the sqrt argument positive.
        let (l1, l2) = cov2d_eigenvalues(4.0, 4.0, 4.0);
        assert!(l1.is_finite() && l2.is_finite());
        assert!(l1 >= l2);
    }

    #[test]
    fn centered_isotropic_splat_projects_to_expected_covariance() {
        let params = pinhole_params();
        let cov_3d = compute_3d_covariance(
            Vec3::new(0.1_f32.ln(), 0.1_f32.ln(), 0.1_f32.ln()),
            [1.0, 0.0, 0.0, 0.0],
        );
        let p_view = Vec3::new(0.0, 0.0, 5.0);
        let (a, b, c) = project_covariance_to_2d(cov_3d, &params, p_view);

        // sigma_screen = 0.1 / 5 * 1000 = 20 px, variance 400 (+ blur).
        assert!((a - 400.0 - COV2D_BLUR).abs() < 0.5, "a = {a}");
        assert!(b.abs() < 1e-3, "b = {b}");
        assert!((c - 400.0 - COV2D_BLUR).abs() < 0.5, "c = {c}");
    }

    #[test]
    fn rotation_leaves_isotropic_covariance_unchanged() {
        let log_s = Vec3::new(-1.0, -1.0, -1.0);
        let plain = compute_3d_covariance(log_s, [1.0, 0.0, 0.0, 0.0]);
        let turned = compute_3d_covariance(log_s, [0.7071, 0.0, 0.7071, 0.0]);
        for i in 0..3 {
            for j in 0..3 {
                assert!((plain[i][j] - turned[i][j]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn tangent_clamp_bounds_peripheral_covariance() {
        let params = pinhole_params();
        let cov_3d = compute_3d_covariance(Vec3::ZERO, [1.0, 0.0, 0.0, 0.0]);

        // Far outside the frustum: the clamped tangent point must keep
        // the projected covariance finite and no larger than at the clamp
        // boundary itself.
        let p_edge = Vec3::new(1.3 * params.tan_fov_x * 5.0, 0.0, 5.0);
        let p_far = Vec3::new(100.0, 0.0, 5.0);
        let (a_edge, ..) = project_covariance_to_2d(cov_3d, &params, p_edge);
        let (a_far, ..) = project_covariance_to_2d(cov_3d, &params, p_far);
        assert!(a_far.is_finite());
        assert!((a_far - a_edge).abs() < 1e-2);
    }

    #[test]
    fn center_projection_hits_principal_point() {
        let params = pinhole_params();
        let xy = project_to_pixel(Vec3::new(0.0, 0.0, 5.0), &params);
        assert!((xy[0] - 400.0).abs() < 1e-4);
        assert!((xy[1] - 300.0).abs() < 1e-4);
    }
}
