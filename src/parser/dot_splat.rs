use std::fs;
use std::path::Path;

use crate::math::{logit, quat_normalize, Vec3};
use crate::splat::Splat;

use crate::AppResult;

fn read_vec3_f32(bytes: &[u8]) -> Vec3 {
    let x = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let y = f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let z = f32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    Vec3::new(x, y, z)
}

/// Some exporters store linear scales, others log scales (negative
/// values). Normalize to log domain, flooring tiny linear scales.
fn decode_log_scale(v: f32) -> f32 {
    if v > 0.0 {
        v.max(1e-4).ln()
    } else {
        v
    }
}

pub fn load_splat_file(path: &str) -> AppResult<Vec<Splat>> {
    let data = fs::read(path)
        .map_err(|e| format!("failed to read '{}': {}", Path::new(path).display(), e))?;
    parse_splat_bytes(&data)
}

/// Parse the 32-byte-record `.splat` format: position (3 f32), scale
/// (3 f32), RGBA color (4 u8), quaternion (4 u8, biased). The linear
/// color/opacity of the format is converted back to the canonical
/// logit-opacity form.
pub fn parse_splat_bytes(data: &[u8]) -> AppResult<Vec<Splat>> {
    const RECORD_SIZE: usize = 32;

    if data.is_empty() {
        return Err("SPLAT parse error: file is empty".into());
    }
    if data.len() % RECORD_SIZE != 0 {
        return Err(format!(
            "Invalid .splat file: size {} is not a multiple of {RECORD_SIZE} bytes",
            data.len()
        )
        .into());
    }

    let mut splats = Vec::with_capacity(data.len() / RECORD_SIZE);
    for chunk in data.chunks_exact(RECORD_SIZE) {
        let mean = read_vec3_f32(&chunk[0..12]);
        let scale_raw = read_vec3_f32(&chunk[12..24]);
        let color = [
            chunk[24] as f32 / 255.0,
            chunk[25] as f32 / 255.0,
            chunk[26] as f32 / 255.0,
        ];
        let opacity_logit = logit(chunk[27] as f32 / 255.0);

        let rotation = quat_normalize([
            chunk[28] as f32 / 127.5 - 1.0,
            chunk[29] as f32 / 127.5 - 1.0,
            chunk[30] as f32 / 127.5 - 1.0,
            chunk[31] as f32 / 127.5 - 1.0,
        ]);

        splats.push(Splat {
            mean,
            log_scale: Vec3::new(
                decode_log_scale(scale_raw.x),
                decode_log_scale(scale_raw.y),
                decode_log_scale(scale_raw.z),
            ),
            rotation,
            color,
            opacity_logit,
        });
    }

    Ok(splats)
}
