// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Motion vector predictor derivation from spatial neighbours and the
//! collocated picture.

use crate::api::SliceType;
use crate::context::*;
use crate::frame::Picture;
use crate::mc::MotionVector;
use crate::reference::RefLists;
use crate::util::Pixel;

/// Number of spatial and temporal predictors gathered per list.
pub const MAX_NUM_MVP: usize = 4;

/// Block-grid state of the picture being coded, as read by the predictor
/// derivation.
#[derive(Clone, Copy, Debug)]
pub struct MotionMaps<'a> {
  pub view: NeighborView<'a>,
  pub refi: &'a BlockMap<[i8; 2]>,
  pub mv: &'a BlockMap<[MotionVector; 2]>,
  pub unrefined_mv: &'a BlockMap<[MotionVector; 2]>,
}

impl<'a> MotionMaps<'a> {
  pub fn new<T: Pixel>(view: NeighborView<'a>, pic: &'a Picture<T>) -> Self {
    debug_assert_eq!(view.grid(), pic.grid());
    MotionMaps {
      view,
      refi: &pic.refi,
      mv: &pic.mv,
      unrefined_mv: &pic.unrefined_mv,
    }
  }

  /// Reference index stored at `idx`, `INVALID_REFI` if none.
  #[inline]
  fn refi_at(&self, idx: ScuIdx, list: RefList) -> i8 {
    match self.refi.get(idx) {
      Some(r) if refi_is_valid(r[list.idx()]) => r[list.idx()],
      _ => INVALID_REFI,
    }
  }

  /// Motion vector a neighbour exposes to its successors: the unrefined
  /// one when decoder-side refinement changed it.
  #[inline]
  fn exposed_mv(&self, idx: ScuIdx, list: RefList) -> MotionVector {
    let refined = self.view.status.get(idx).map_or(false, |s| s.dmvr);
    let map = if refined { self.unrefined_mv } else { self.mv };
    map.get(idx).map_or(MotionVector::default(), |m| m[list.idx()])
  }

  #[inline]
  fn stored_mv(&self, idx: Option<ScuIdx>, list: RefList) -> MotionVector {
    idx
      .and_then(|i| self.mv.get(i))
      .map_or(MotionVector::UNAVAILABLE, |m| m[list.idx()])
  }
}

/// Outcome of the default motion vote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultMotion {
  /// `None` when neither primary candidate carries a valid reference.
  pub refi: Option<i8>,
  pub mv: MotionVector,
}

/// Votes a default motion out of the first two candidate slots of `set`.
///
/// A candidate referencing `cur_refi` wins; failing that, the first one
/// with any valid reference does.
pub fn default_motion(
  set: &NeighborSet, cur_refi: i8, list: RefList, maps: &MotionMaps<'_>,
) -> DefaultMotion {
  let primary = || (0..2).filter_map(|k| set.usable(k));

  let pick = primary()
    .find(|&n| {
      let refi = maps.refi_at(n, list);
      refi_is_valid(refi) && refi == cur_refi
    })
    .or_else(|| primary().find(|&n| refi_is_valid(maps.refi_at(n, list))));

  match pick {
    Some(n) => DefaultMotion {
      refi: Some(maps.refi_at(n, list)),
      mv: maps.exposed_mv(n, list),
    },
    None => DefaultMotion::default(),
  }
}

/// Reference index of list `list` signalled alongside motion vector
/// resolution `mvr_idx`, which selects the candidate slot to inherit it
/// from.
pub fn first_ref_index(
  cu: &CodingUnit, layout: NeighborLayout, mvr_idx: usize, list: RefList,
  maps: &MotionMaps<'_>,
) -> i8 {
  let set = maps.view.motion_candidates(cu, layout, 1, false);
  let vote = default_motion(&set, 0, list, maps);
  let fallback = vote.refi.unwrap_or(0);

  debug_assert!(mvr_idx < MAX_NUM_POSSIBLE_SCAND);
  if mvr_idx >= MAX_NUM_POSSIBLE_SCAND {
    warn!("motion vector resolution index {} out of range", mvr_idx);
    return fallback;
  }

  match set.usable(mvr_idx) {
    Some(n) => {
      let refi = maps.refi_at(n, list);
      if refi_is_valid(refi) {
        refi
      } else {
        fallback
      }
    }
    None => fallback,
  }
}

/// A motion vector predictor with the reference index it applies to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MvCandidate {
  pub refi: i8,
  pub mv: MotionVector,
}

/// Spatial predictors of list `list`: left, above and above-right
/// neighbours, then the motion the first reference of the list stored at
/// the position of `cu`.
///
/// Neighbours missing from `avail` yield the `(1, 1)` placeholder.
pub fn spatial_motion<T: Pixel>(
  cu: &CodingUnit, avail: AvailMask, list: RefList, maps: &MotionMaps<'_>,
  refs: &RefLists<T>,
) -> [MvCandidate; MAX_NUM_MVP] {
  let grid = maps.view.grid();
  let (x, y) = (cu.pos.x as isize, cu.pos.y as isize);
  let scuw = cu.scuw() as isize;

  let neighbor = |dir: AvailMask, dx: isize, dy: isize| {
    let idx = if avail.contains(dir) {
      grid.checked_index(x + dx, y + dy)
    } else {
      None
    };
    MvCandidate { refi: 0, mv: maps.stored_mv(idx, list) }
  };

  let scup = grid.index(cu.pos);
  let collocated = refs
    .first(list)
    .and_then(|r| r.pic.mv.get(scup))
    .map_or(MotionVector::default(), |m| m[RefList::L0.idx()]);

  [
    neighbor(AvailMask::LE, -1, 0),
    neighbor(AvailMask::UP, 0, -1),
    neighbor(AvailMask::UP_RI, scuw, -1),
    MvCandidate { refi: 0, mv: collocated },
  ]
}

/// Predictors of a skipped coding unit, per list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkipMotion {
  pub refi: [[i8; MAX_NUM_MVP]; 2],
  pub mv: [[MotionVector; MAX_NUM_MVP]; 2],
}

impl Default for SkipMotion {
  fn default() -> Self {
    SkipMotion {
      refi: [[INVALID_REFI; MAX_NUM_MVP]; 2],
      mv: [[MotionVector::default(); MAX_NUM_MVP]; 2],
    }
  }
}

/// Spatial predictors of a skipped coding unit. List 1 is only derived in
/// B slices and stays invalid otherwise.
pub fn skip_motion<T: Pixel>(
  slice_type: SliceType, cu: &CodingUnit, avail: AvailMask,
  maps: &MotionMaps<'_>, refs: &RefLists<T>,
) -> SkipMotion {
  let mut skip = SkipMotion::default();
  let lists: &[RefList] =
    if slice_type.has_l1() { &RefList::ALL } else { &[RefList::L0] };
  for &list in lists {
    let cands = spatial_motion(cu, avail, list, maps, refs);
    for (k, c) in cands.iter().enumerate() {
      skip.refi[list.idx()][k] = c.refi;
      skip.mv[list.idx()][k] = c.mv;
    }
  }
  skip
}

/// Whether a coding unit of `cuw` x `cuh` may be bi-predicted.
#[inline]
pub fn bi_applicable(
  slice_type: SliceType, admvp: bool, cuw: usize, cuh: usize,
) -> bool {
  slice_type == SliceType::B && (!admvp || cuw + cuh > 12)
}

/// Temporal predictors at `scup`, scaling the motion the first list 1
/// reference stored there by the ratio of POC distances.
///
/// Both predictors are zero when the collocated picture referenced itself,
/// or when either list is empty.
pub fn collocated_motion<T: Pixel>(
  refs: &RefLists<T>, poc: i32, scup: ScuIdx,
) -> [MotionVector; 2] {
  let zero = [MotionVector::default(); 2];
  let (l0, col) = match (refs.first(RefList::L0), refs.first(RefList::L1)) {
    (Some(l0), Some(col)) => (l0, col),
    _ => return zero,
  };
  let (mvc, col_ref_poc) =
    match (col.pic.mv.get(scup), col.list_poc().first()) {
      (Some(m), Some(&p)) => (m[RefList::L0.idx()], p),
      _ => return zero,
    };

  let dpoc_co = col.poc - col_ref_poc;
  if dpoc_co == 0 {
    return zero;
  }
  let dpoc_l0 = poc - l0.poc;
  let dpoc_l1 = col.poc - poc;
  [mvc.scale(dpoc_l0, dpoc_co), mvc.scale(-dpoc_l1, dpoc_co)]
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::context::test::{maps, INTER};
  use crate::reference::{PicturePool, SlidingWindow};
  use crate::util::ChromaSampling;

  const W: usize = 64;

  fn picture() -> Picture<u8> {
    Picture::new(W, W, ChromaSampling::Cs420, 8).unwrap()
  }

  fn at(x: usize, y: usize) -> ScuOffset {
    ScuOffset { x, y }
  }

  /// Marks the SCU at (`x`, `y`) as inter coded with `refi` and `mv` in
  /// list 0.
  fn code(
    status: &mut StatusMap, pic: &mut Picture<u8>, x: usize, y: usize,
    refi: i8, mv: MotionVector,
  ) {
    status[at(x, y)] = INTER;
    pic.refi[at(x, y)] = [refi, INVALID_REFI];
    pic.mv[at(x, y)] = [mv, MotionVector::default()];
  }

  // 8x8 CU at SCU (4, 4): with no right neighbour, slot 0 is the left
  // neighbour of the bottom row and slot 1 the above neighbour of the
  // rightmost column.
  fn cu() -> CodingUnit {
    CodingUnit::new(at(4, 4), 8, 8)
  }

  #[test]
  fn vote_prefers_matching_reference() {
    let (mut status, tiles) = maps(W / 4, W / 4);
    let mut pic = picture();
    code(&mut status, &mut pic, 3, 5, 2, MotionVector::new(4, 4));
    code(&mut status, &mut pic, 5, 3, INVALID_REFI, MotionVector::new(8, 8));

    let view = NeighborView::new(&status, &tiles);
    let maps = MotionMaps::new(view, &pic);
    let set = view.motion_candidates(&cu(), NeighborLayout::Left, 1, false);
    assert!(set.valid[0] && set.valid[1]);

    let vote = default_motion(&set, 2, RefList::L0, &maps);
    let mv = MotionVector::new(4, 4);
    assert_eq!(vote, DefaultMotion { refi: Some(2), mv });
  }

  #[test]
  fn vote_falls_back_to_first_valid() {
    let (mut status, tiles) = maps(W / 4, W / 4);
    let mut pic = picture();
    code(&mut status, &mut pic, 3, 5, 5, MotionVector::new(-2, 6));
    code(&mut status, &mut pic, 5, 3, 7, MotionVector::new(1, 1));

    let view = NeighborView::new(&status, &tiles);
    let maps = MotionMaps::new(view, &pic);
    let set = view.motion_candidates(&cu(), NeighborLayout::Left, 1, false);
    let vote = default_motion(&set, 3, RefList::L0, &maps);
    let mv = MotionVector::new(-2, 6);
    assert_eq!(vote, DefaultMotion { refi: Some(5), mv });

    let empty = NeighborSet::default();
    assert_eq!(
      default_motion(&empty, 0, RefList::L0, &maps),
      DefaultMotion::default()
    );
  }

  #[test]
  fn vote_reads_unrefined_motion() {
    let (mut status, tiles) = maps(W / 4, W / 4);
    let mut pic = picture();
    code(&mut status, &mut pic, 3, 5, 0, MotionVector::new(9, 9));
    status[at(3, 5)].dmvr = true;
    pic.unrefined_mv[at(3, 5)] = [MotionVector::new(7, -7); 2];

    let view = NeighborView::new(&status, &tiles);
    let maps = MotionMaps::new(view, &pic);
    let set = view.motion_candidates(&cu(), NeighborLayout::Left, 1, false);
    let vote = default_motion(&set, 0, RefList::L0, &maps);
    assert_eq!(vote.mv, MotionVector::new(7, -7));
  }

  #[test]
  fn first_ref_index_follows_slot() {
    let (mut status, tiles) = maps(W / 4, W / 4);
    let mut pic = picture();
    code(&mut status, &mut pic, 3, 5, 1, MotionVector::default());
    // above right
    code(&mut status, &mut pic, 6, 3, 3, MotionVector::default());
    // lower left, coded but without a list 0 reference
    code(&mut status, &mut pic, 3, 6, INVALID_REFI, MotionVector::default());

    let view = NeighborView::new(&status, &tiles);
    let maps = MotionMaps::new(view, &pic);
    let layout = NeighborLayout::Left;
    assert_eq!(first_ref_index(&cu(), layout, 2, RefList::L0, &maps), 3);
    assert_eq!(first_ref_index(&cu(), layout, 3, RefList::L0, &maps), 1);
    // slot 4 (above left) is not coded
    assert_eq!(first_ref_index(&cu(), layout, 4, RefList::L0, &maps), 1);
    assert_eq!(first_ref_index(&cu(), layout, 0, RefList::L1, &maps), 0);
  }

  #[test]
  fn spatial_motion_uses_sentinel() {
    let (mut status, tiles) = maps(W / 4, W / 4);
    let mut pic = picture();
    code(&mut status, &mut pic, 3, 4, 0, MotionVector::new(2, 3));
    code(&mut status, &mut pic, 6, 3, 0, MotionVector::new(-4, 1));

    let view = NeighborView::new(&status, &tiles);
    let maps = MotionMaps::new(view, &pic);
    let refs = RefLists::<u8>::default();
    let avail = AvailMask::LE | AvailMask::UP_RI;
    let cands = spatial_motion(&cu(), avail, RefList::L0, &maps, &refs);
    assert_eq!(
      cands.iter().map(|c| c.mv).collect::<Vec<_>>(),
      vec![
        MotionVector::new(2, 3),
        MotionVector::UNAVAILABLE,
        MotionVector::new(-4, 1),
        MotionVector::default(),
      ]
    );
    assert!(cands.iter().all(|c| c.refi == 0));
  }

  fn ref_lists(
    col_list_poc: i32, col_mv: MotionVector,
  ) -> (PicturePool<u8>, RefLists<u8>) {
    let mut pool = PicturePool::new(
      4,
      W,
      W,
      ChromaSampling::Cs420,
      8,
      Box::new(SlidingWindow { max_refs: 4 }),
    );
    let past = pool.get_empty().unwrap();
    pool.put(past, 0, 0, true, false);
    let mut col = pool.get_empty().unwrap();
    col.mv.fill([col_mv, MotionVector::default()]);
    col.list_poc.push(col_list_poc);
    pool.put(col, 8, 0, true, false);
    let lists = pool.reference_lists(4, SliceType::B, 2);
    (pool, lists)
  }

  #[test]
  fn collocated_scales_by_poc_distance() {
    let (_pool, refs) = ref_lists(0, MotionVector::new(16, -9));
    let scup = ScuIdx(17);
    let [l0, l1] = collocated_motion(&refs, 4, scup);
    assert_eq!(l0, MotionVector::new(8, -4));
    assert_eq!(l1, MotionVector::new(-8, 4));
  }

  #[test]
  fn collocated_zero_distance_is_zero() {
    let (_pool, refs) = ref_lists(8, MotionVector::new(16, -9));
    let zero = [MotionVector::default(); 2];
    assert_eq!(collocated_motion(&refs, 4, ScuIdx(0)), zero);
    let empty = RefLists::<u8>::default();
    assert_eq!(collocated_motion(&empty, 4, ScuIdx(0)), zero);
  }

  #[test]
  fn skip_motion_per_slice_type() {
    let (status, tiles) = maps(W / 4, W / 4);
    let pic = picture();
    let view = NeighborView::new(&status, &tiles);
    let maps = MotionMaps::new(view, &pic);
    let (_pool, refs) = ref_lists(0, MotionVector::new(5, 5));

    let p = skip_motion(SliceType::P, &cu(), AvailMask::NONE, &maps, &refs);
    assert_eq!(p.refi[0], [0; MAX_NUM_MVP]);
    assert_eq!(p.refi[1], [INVALID_REFI; MAX_NUM_MVP]);
    assert_eq!(p.mv[1], [MotionVector::default(); MAX_NUM_MVP]);
    assert_eq!(p.mv[0][0], MotionVector::UNAVAILABLE);
    // list 0 of a P slice at poc 4 starts with poc 0, which stored no motion
    assert_eq!(p.mv[0][3], MotionVector::default());

    let b = skip_motion(SliceType::B, &cu(), AvailMask::NONE, &maps, &refs);
    assert_eq!(b.refi[1], [0; MAX_NUM_MVP]);
    assert_eq!(b.mv[1][3], MotionVector::new(5, 5));
  }

  #[test]
  fn bi_prediction_size_gate() {
    assert!(bi_applicable(SliceType::B, false, 4, 4));
    assert!(!bi_applicable(SliceType::B, true, 4, 8));
    assert!(bi_applicable(SliceType::B, true, 8, 8));
    assert!(!bi_applicable(SliceType::P, false, 64, 64));
  }
}
