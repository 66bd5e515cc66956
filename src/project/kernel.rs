use std::marker::PhantomData;
use std::sync::atomic::Ordering;

use rayon::prelude::*;

use crate::camera::CameraParams;
use crate::math::sigmoid;
use crate::splat::{
    bounding_radius, compute_3d_covariance, project_covariance_to_2d, project_to_pixel, Splat,
};
use crate::tiles::count_tile_hits;

use super::ForwardBuffers;

/// Output slice shared across parallel lanes and written at disjoint
/// indices, the CPU equivalent of a GPU scatter write.
struct LaneSlice<'a, T> {
    ptr: *mut T,
    _backing: PhantomData<&'a mut [T]>,
}

// SAFETY: lanes only write through `LaneSlice`, each at an index no other
// lane writes (slot indices come from a single fetch_add counter), so no
// element is ever aliased. The exclusive borrow of the backing slice is
// held for the wrapper's lifetime.
unsafe impl<T: Send> Sync for LaneSlice<'_, T> {}

impl<'a, T> LaneSlice<'a, T> {
    fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            _backing: PhantomData,
        }
    }

    /// SAFETY: `index` must be in bounds and claimed by exactly one lane.
    unsafe fn write(&self, index: usize, value: T) {
        unsafe { *self.ptr.add(index) = value }
    }
}

/// One projection dispatch: runs the four per-primitive stages over every
/// splat in parallel and compacts the survivors into `out`.
///
/// Stages per lane, each an early exit: world-to-view transform with
/// near-clip rejection; covariance projection and bounding radius; tile
/// footprint count; atomic slot claim + output writes. Culls are silent
/// and expected. The shared counter is the only cross-lane state, so no
/// ordering is guaranteed beyond slot uniqueness.
///
/// Returns the number of visible splats.
pub fn project_and_compact_splats(
    splats: &[Splat],
    params: &CameraParams,
    out: &mut ForwardBuffers,
) -> usize {
    assert!(
        out.capacity() >= splats.len(),
        "output buffers hold {} entries but {} splats were dispatched",
        out.capacity(),
        splats.len()
    );
    out.reset();

    let compact_id = LaneSlice::new(&mut out.compact_id);
    let remap_id = LaneSlice::new(&mut out.remap_id);
    let xy = LaneSlice::new(&mut out.xy);
    let depth = LaneSlice::new(&mut out.depth);
    let color = LaneSlice::new(&mut out.color);
    let radius = LaneSlice::new(&mut out.radius);
    let cov2d = LaneSlice::new(&mut out.cov2d);
    let tile_hits = LaneSlice::new(&mut out.tile_hits);
    let visible_count = &out.visible_count;

    splats.par_iter().enumerate().for_each(|(index, splat)| {
        // Stage 1: camera projection and near-clip rejection.
        let p_view = params.world_to_view(splat.mean);
        if p_view.z <= params.clip_thresh {
            return;
        }

        // Stage 2: covariance propagation and bounding radius.
        let cov_3d = compute_3d_covariance(splat.log_scale, splat.rotation);
        let (cov_a, cov_b, cov_c) = project_covariance_to_2d(cov_3d, params, p_view);
        let radius_px = bounding_radius(cov_a, cov_b, cov_c);
        if radius_px == 0 {
            return;
        }

        // Stage 3: exact tile footprint.
        let center = project_to_pixel(p_view, params);
        let hit_count = count_tile_hits(center, radius_px, params.tile_bounds, params.tile_size);
        if hit_count == 0 {
            return;
        }

        // Stage 4: claim a dense slot; all writes target that slot only.
        let slot = visible_count.fetch_add(1, Ordering::Relaxed) as usize;

        // SAFETY: `slot` is unique per surviving lane (single shared
        // counter) and the survivor count cannot exceed the splat count,
        // which the capacity assert bounds.
        unsafe {
            compact_id.write(slot, slot as u32);
            remap_id.write(slot, index as u32);
            xy.write(slot, center);
            depth.write(slot, p_view.z);
            color.write(
                slot,
                [
                    splat.color[0],
                    splat.color[1],
                    splat.color[2],
                    sigmoid(splat.opacity_logit),
                ],
            );
            radius.write(slot, radius_px);
            cov2d.write(slot, [cov_a, cov_b, cov_c, 1.0]);
            tile_hits.write(slot, hit_count);
        }
    });

    out.visible()
}
