pub mod kernel;

use std::sync::atomic::{AtomicU32, Ordering};

/// Depth default written by the pre-pass; consumers reading by original
/// index see "not visible" for anything the dispatch culled.
pub const DEPTH_SENTINEL: f32 = f32::INFINITY;

/// Host-owned dense output arrays for one projection dispatch.
///
/// All arrays share one capacity, which must be at least the primitive
/// count. After a dispatch the first `visible()` entries of each array
/// hold the compacted survivors; entries past that keep the pre-pass
/// defaults (`radius`/`tile_hits` zero, `depth` sentinel) and are
/// otherwise unspecified.
#[derive(Debug)]
pub struct ForwardBuffers {
    /// Slot self-index; retained legacy field of the output record.
    pub compact_id: Vec<u32>,
    /// Backreference to the original (sparse) primitive index.
    pub remap_id: Vec<u32>,
    /// Projected pixel center.
    pub xy: Vec<[f32; 2]>,
    /// View-space depth.
    pub depth: Vec<f32>,
    /// RGB carried through, alpha = sigmoid(opacity logit).
    pub color: Vec<[f32; 4]>,
    /// Conservative 3-sigma bounding radius, pixels.
    pub radius: Vec<u32>,
    /// Screen covariance packed as (a, b, c, 1.0).
    pub cov2d: Vec<[f32; 4]>,
    /// Number of grid tiles the splat genuinely overlaps.
    pub tile_hits: Vec<u32>,
    /// Shared compaction counter; the only cross-lane state.
    pub visible_count: AtomicU32,
}

impl ForwardBuffers {
    pub fn for_count(count: usize) -> Self {
        Self {
            compact_id: vec![0; count],
            remap_id: vec![0; count],
            xy: vec![[0.0; 2]; count],
            depth: vec![DEPTH_SENTINEL; count],
            color: vec![[0.0; 4]; count],
            radius: vec![0; count],
            cov2d: vec![[0.0; 4]; count],
            tile_hits: vec![0; count],
            visible_count: AtomicU32::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.depth.len()
    }

    /// Pre-pass reset run before any kernel stage: every entry (surviving
    /// or not) gets the "not visible" defaults, and the counter restarts.
    pub fn reset(&mut self) {
        self.radius.fill(0);
        self.tile_hits.fill(0);
        self.depth.fill(DEPTH_SENTINEL);
        self.visible_count.store(0, Ordering::Relaxed);
    }

    pub fn visible(&self) -> usize {
        self.visible_count.load(Ordering::Acquire) as usize
    }
}
