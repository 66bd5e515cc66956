//! Tile-grid geometry for the splat footprint stage.
//!
//! The image is partitioned into fixed-size square tiles; a projected splat
//! is bounded by a circle of `radius` pixels around its center. These
//! helpers map that circle to tile indices and test genuine overlap.

/// Inclusive-min / exclusive-max tile-index bounds covering a bounding
/// circle, clamped to the tile grid.
pub fn tile_bbox(
    center: [f32; 2],
    radius: u32,
    tile_bounds: (u32, u32),
    tile_size: u32,
) -> ((u32, u32), (u32, u32)) {
    let r = radius as f32;
    let ts = tile_size as f32;

    let min_x = ((center[0] - r) / ts).floor().max(0.0) as u32;
    let min_y = ((center[1] - r) / ts).floor().max(0.0) as u32;
    let max_x = (((center[0] + r + ts - 1.0) / ts) as u32).min(tile_bounds.0);
    let max_y = (((center[1] + r + ts - 1.0) / ts) as u32).min(tile_bounds.1);

    (
        (min_x.min(tile_bounds.0), min_y.min(tile_bounds.1)),
        (max_x, max_y),
    )
}

/// Exact circle-vs-tile intersection: distance from the circle center to
/// the closest point of the tile rectangle, compared against the radius.
/// The bounding box alone overcounts tiles near the circle's corners.
pub fn tile_overlaps(tile: (u32, u32), center: [f32; 2], radius: u32, tile_size: u32) -> bool {
    let ts = tile_size as f32;
    let x0 = tile.0 as f32 * ts;
    let y0 = tile.1 as f32 * ts;

    let nearest_x = center[0].clamp(x0, x0 + ts);
    let nearest_y = center[1].clamp(y0, y0 + ts);

    let dx = center[0] - nearest_x;
    let dy = center[1] - nearest_y;
    let r = radius as f32;

    dx * dx + dy * dy <= r * r
}

/// Number of grid tiles genuinely intersected by the bounding circle.
pub fn count_tile_hits(
    center: [f32; 2],
    radius: u32,
    tile_bounds: (u32, u32),
    tile_size: u32,
) -> u32 {
    let (min, max) = tile_bbox(center, radius, tile_bounds, tile_size);

    let mut hits = 0;
    for ty in min.1..max.1 {
        for tx in min.0..max.0 {
            if tile_overlaps((tx, ty), center, radius, tile_size) {
                hits += 1;
            }
        }
    }
    hits
}
