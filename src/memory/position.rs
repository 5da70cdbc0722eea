//! Memory geometry and the reference-index derivation ("index-alpha").
//!
//! Both are pure: given the layout, the position being filled and the first word
//! of the previous block, the reference block is fully determined. The arithmetic
//! follows Argon2 v1.3 exactly; any deviation would change every later block.

use crate::config::{Config, SYNC_POINTS};

/// Shape of the block store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryGeometry {
    /// Number of lanes.
    pub lanes: usize,
    /// Blocks per segment.
    pub segment_length: usize,
    /// Blocks per lane (`4 * segment_length`).
    pub lane_length: usize,
    /// Number of passes.
    pub passes: usize,
}

impl MemoryGeometry {
    /// Derives the geometry of a validated configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            lanes: config.lanes as usize,
            segment_length: config.segment_length(),
            lane_length: config.lane_length(),
            passes: config.passes as usize,
        }
    }

    /// Total number of blocks.
    pub fn block_count(&self) -> usize {
        self.lanes * self.lane_length
    }

    /// Absolute index of the first block of `slice` in `lane`.
    pub fn segment_start(&self, lane: usize, slice: usize) -> usize {
        lane * self.lane_length + slice * self.segment_length
    }

    /// Locates an absolute block index inside the first pass.
    pub fn locate(&self, block_index: usize) -> FillPosition {
        let lane = block_index / self.lane_length;
        let in_lane = block_index % self.lane_length;
        FillPosition {
            pass: 0,
            lane,
            slice: in_lane / self.segment_length,
            index: in_lane % self.segment_length,
        }
    }

    /// True for the two blocks per lane written directly from the prehash.
    pub fn is_seed(&self, block_index: usize) -> bool {
        block_index % self.lane_length < 2
    }
}

/// The block about to be produced: `(pass, lane, slice, index within segment)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillPosition {
    /// Pass number, starting at 0.
    pub pass: usize,
    /// Lane number.
    pub lane: usize,
    /// Sync point, `0..4`.
    pub slice: usize,
    /// Index within the segment.
    pub index: usize,
}

impl FillPosition {
    /// Absolute index of this position in the block store.
    pub fn absolute(&self, geometry: &MemoryGeometry) -> usize {
        geometry.segment_start(self.lane, self.slice) + self.index
    }

    /// Absolute index of the block this position chains from.
    ///
    /// The first block of a lane chains from the last block of the same lane.
    pub fn previous(&self, geometry: &MemoryGeometry) -> usize {
        let current = self.absolute(geometry);
        if current % geometry.lane_length == 0 {
            current + geometry.lane_length - 1
        } else {
            current - 1
        }
    }
}

/// Maps the low half of the pseudo-random word to a block index inside the lane
/// of the reference.
///
/// Only blocks that are complete under the sync-point rules are eligible: in the
/// first pass, earlier blocks of the current segment (same lane) and finished
/// segments; afterwards, everything except the in-progress segment of other lanes.
/// The square-and-shift skew favours recent blocks.
pub fn index_alpha(
    geometry: &MemoryGeometry,
    position: FillPosition,
    pseudo_rand: u32,
    same_lane: bool,
) -> usize {
    let FillPosition {
        pass, slice, index, ..
    } = position;
    let segment_length = geometry.segment_length;

    let reference_area_size = if pass == 0 {
        if slice == 0 {
            index - 1
        } else if same_lane {
            slice * segment_length + index - 1
        } else if index == 0 {
            slice * segment_length - 1
        } else {
            slice * segment_length
        }
    } else if same_lane {
        geometry.lane_length - segment_length + index - 1
    } else if index == 0 {
        geometry.lane_length - segment_length - 1
    } else {
        geometry.lane_length - segment_length
    };

    let area = reference_area_size as u64;
    let mut relative = pseudo_rand as u64;
    relative = (relative * relative) >> 32;
    let relative = area - 1 - ((area * relative) >> 32);

    let start = if pass != 0 && slice != SYNC_POINTS - 1 {
        (slice + 1) * segment_length
    } else {
        0
    };

    (start + relative as usize) % geometry.lane_length
}

/// Absolute index of the reference block for `position`, given the first word of
/// the previous block.
///
/// The high half of `pseudo_rand` chooses the lane, except in the very first
/// segment where other lanes have nothing written yet.
pub fn reference_block(
    geometry: &MemoryGeometry,
    position: FillPosition,
    pseudo_rand: u64,
) -> usize {
    let reference_lane = if position.pass == 0 && position.slice == 0 {
        position.lane
    } else {
        ((pseudo_rand >> 32) % geometry.lanes as u64) as usize
    };

    let index = index_alpha(
        geometry,
        position,
        pseudo_rand as u32,
        reference_lane == position.lane,
    );

    reference_lane * geometry.lane_length + index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(lanes: usize, segment_length: usize, passes: usize) -> MemoryGeometry {
        MemoryGeometry {
            lanes,
            segment_length,
            lane_length: segment_length * SYNC_POINTS,
            passes,
        }
    }

    fn positions(geometry: &MemoryGeometry) -> impl Iterator<Item = FillPosition> + '_ {
        (0..geometry.passes).flat_map(move |pass| {
            (0..SYNC_POINTS).flat_map(move |slice| {
                (0..geometry.lanes).flat_map(move |lane| {
                    let first = if pass == 0 && slice == 0 { 2 } else { 0 };
                    (first..geometry.segment_length).map(move |index| FillPosition {
                        pass,
                        lane,
                        slice,
                        index,
                    })
                })
            })
        })
    }

    /// Whether `candidate` has been fully written when `position` is being filled
    /// under the sync-point barrier discipline.
    fn is_complete(geometry: &MemoryGeometry, position: FillPosition, candidate: usize) -> bool {
        let candidate_lane = candidate / geometry.lane_length;
        let candidate_slice = (candidate % geometry.lane_length) / geometry.segment_length;
        let current = position.absolute(geometry);

        if candidate_slice == position.slice {
            // in-progress segments: only our own, and only what is already produced
            return candidate_lane == position.lane && candidate < current;
        }
        position.pass > 0 || candidate_slice < position.slice
    }

    #[test]
    fn first_computed_block_references_first_seed() {
        let geometry = geometry(1, 4, 1);
        let position = FillPosition {
            pass: 0,
            lane: 0,
            slice: 0,
            index: 2,
        };
        for pseudo_rand in [0, 1, u64::MAX, 0xDEAD_BEEF_CAFE_BABE] {
            assert_eq!(reference_block(&geometry, position, pseudo_rand), 0);
        }
    }

    #[test]
    fn reference_is_in_range_and_complete() {
        for (lanes, segment_length, passes) in [(1, 2, 2), (1, 5, 3), (3, 2, 2), (4, 7, 2)] {
            let geometry = geometry(lanes, segment_length, passes);
            for position in positions(&geometry) {
                for pseudo_rand in [
                    0u64,
                    1,
                    u32::MAX as u64,
                    u64::MAX,
                    0x0123_4567_89AB_CDEF,
                    0xFEDC_BA98_7654_3210,
                    0x0000_0003_8000_0000,
                ] {
                    let reference = reference_block(&geometry, position, pseudo_rand);
                    assert!(reference < geometry.block_count(), "{position:?}");
                    assert!(
                        is_complete(&geometry, position, reference),
                        "{position:?} references incomplete block {reference}"
                    );
                    assert_ne!(reference, position.absolute(&geometry));
                }
            }
        }
    }

    #[test]
    fn zero_randomness_picks_most_recent_eligible_block() {
        let geometry = geometry(2, 8, 1);
        // same lane, slice 2, index 3: area = 2 * 8 + 3 - 1 = 18, newest = 17
        let position = FillPosition {
            pass: 0,
            lane: 1,
            slice: 2,
            index: 3,
        };
        assert_eq!(index_alpha(&geometry, position, 0, true), 17);
        // other lane: area = 16, newest = 15
        assert_eq!(index_alpha(&geometry, position, 0, false), 15);
        // other lane at index 0 also excludes the block just before the segment
        let position = FillPosition { index: 0, ..position };
        assert_eq!(index_alpha(&geometry, position, 0, false), 14);
    }

    #[test]
    fn later_passes_start_after_current_segment() {
        let geometry = geometry(1, 8, 2);
        let position = FillPosition {
            pass: 1,
            lane: 0,
            slice: 1,
            index: 0,
        };
        // area = 32 - 8 + 0 - 1 = 23, max skew picks the oldest block at the window start
        assert_eq!(index_alpha(&geometry, position, u32::MAX, true), 16);
        // and the window wraps around the lane
        assert_eq!(index_alpha(&geometry, position, 0, true), (16 + 22) % 32);

        let last_slice = FillPosition {
            slice: SYNC_POINTS - 1,
            ..position
        };
        assert_eq!(index_alpha(&geometry, last_slice, u32::MAX, true), 0);
    }

    #[test]
    fn previous_wraps_to_lane_end() {
        let geometry = geometry(2, 4, 2);
        let position = FillPosition {
            pass: 1,
            lane: 1,
            slice: 0,
            index: 0,
        };
        assert_eq!(position.absolute(&geometry), 16);
        assert_eq!(position.previous(&geometry), 31);

        let position = FillPosition { index: 1, ..position };
        assert_eq!(position.previous(&geometry), 16);
    }

    #[test]
    fn locate_inverts_absolute() {
        let geometry = geometry(3, 4, 1);
        for block_index in 0..geometry.block_count() {
            let position = geometry.locate(block_index);
            assert_eq!(position.absolute(&geometry), block_index);
        }
        assert!(geometry.is_seed(16));
        assert!(geometry.is_seed(17));
        assert!(!geometry.is_seed(18));
    }
}
