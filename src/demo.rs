use std::f32::consts::TAU;

use rand::Rng;

use crate::math::{hsv_to_rgb, logit, Vec3};
use crate::splat::Splat;

// --- Procedural demo clouds ---

fn random_sphere_point(rng: &mut impl Rng) -> Vec3 {
    let z = rng.random_range(-1.0_f32..1.0_f32);
    let theta = rng.random_range(0.0_f32..TAU);
    let r = (1.0 - z * z).sqrt();
    Vec3::new(r * theta.cos(), z, r * theta.sin())
}

fn log_scale(rng: &mut impl Rng, base: f32) -> Vec3 {
    let s = base.max(1e-4).ln();
    Vec3::new(s, s + rng.random_range(-0.2_f32..0.2_f32), s)
}

fn generate_torus_knot_splats(count: usize) -> Vec<Splat> {
    let mut rng = rand::rng();
    let mut splats = Vec::with_capacity(count);

    let p = 2.0;
    let q = 3.0;
    let major = 1.4;
    let minor = 0.38;

    for i in 0..count {
        let t = i as f32 / count.max(1) as f32 * TAU * 2.0;

        // Lay the knot in the XZ plane so a camera looking along -Z sees
        // the full loop structure.
        let base = Vec3::new(
            (major + minor * (q * t).cos()) * (p * t).cos(),
            minor * (q * t).sin(),
            (major + minor * (q * t).cos()) * (p * t).sin(),
        );

        let jitter = Vec3::new(
            rng.random_range(-0.04_f32..0.04_f32),
            rng.random_range(-0.04_f32..0.04_f32),
            rng.random_range(-0.04_f32..0.04_f32),
        );

        let hue = ((q * t).sin() * 0.5 + 0.5) * 360.0;
        let base_scale = rng.random_range(0.018_f32..0.042_f32);

        splats.push(Splat {
            mean: base + jitter,
            log_scale: log_scale(&mut rng, base_scale),
            rotation: [1.0, 0.0, 0.0, 0.0],
            color: hsv_to_rgb(hue, 0.80, 0.95),
            opacity_logit: logit(rng.random_range(0.68_f32..0.95_f32)),
        });
    }

    splats
}

fn generate_sphere_cluster_splats(count: usize) -> Vec<Splat> {
    let mut rng = rand::rng();
    let mut splats = Vec::with_capacity(count);

    // Clusters sit within the default framing (camera pulled back along +z).
    let centers = [
        Vec3::new(1.8, 0.3, 0.4),
        Vec3::new(-1.6, -0.2, 0.8),
        Vec3::new(0.3, 1.2, -1.6),
        Vec3::new(-0.5, -1.0, -1.4),
    ];

    let palette = [
        [1.0, 0.47, 0.31],
        [0.39, 0.82, 1.0],
        [0.63, 1.0, 0.51],
        [1.0, 0.86, 0.35],
    ];

    for i in 0..count {
        let cluster = i % centers.len();
        let center = centers[cluster];
        let base_color = palette[cluster];

        let dir = random_sphere_point(&mut rng);
        let radius = rng.random::<f32>().cbrt() * rng.random_range(0.5_f32..1.4_f32);

        let mean = center
            + dir * radius
            + Vec3::new(
                rng.random_range(-0.03_f32..0.03_f32),
                rng.random_range(-0.03_f32..0.03_f32),
                rng.random_range(-0.03_f32..0.03_f32),
            );

        let color = [
            (base_color[0] + rng.random_range(-0.1_f32..0.1_f32)).clamp(0.0, 1.0),
            (base_color[1] + rng.random_range(-0.1_f32..0.1_f32)).clamp(0.0, 1.0),
            (base_color[2] + rng.random_range(-0.1_f32..0.1_f32)).clamp(0.0, 1.0),
        ];

        let base_scale = rng.random_range(0.02_f32..0.06_f32);
        splats.push(Splat {
            mean,
            log_scale: log_scale(&mut rng, base_scale),
            rotation: [1.0, 0.0, 0.0, 0.0],
            color,
            opacity_logit: logit(rng.random_range(0.60_f32..0.95_f32)),
        });
    }

    splats
}

pub fn generate_demo_splats(count: usize) -> Vec<Splat> {
    // Two thirds torus knot, one third sphere clusters.
    let knot = count * 2 / 3;
    let mut splats = generate_torus_knot_splats(knot);
    splats.extend(generate_sphere_cluster_splats(count - knot));
    splats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::sigmoid;

    #[test]
    fn demo_cloud_has_requested_size_and_sane_fields() {
        let splats = generate_demo_splats(300);
        assert_eq!(splats.len(), 300);

        for s in &splats {
            assert!(s.mean.length() < 4.0);
            // Scales stay within the generators' drawn log range.
            assert!(s.log_scale.x > -4.1 && s.log_scale.x < -2.7);
            let alpha = sigmoid(s.opacity_logit);
            assert!(alpha > 0.5 && alpha < 1.0);
            for c in s.color {
                assert!((0.0..=1.0).contains(&c));
            }
        }
    }
}
