// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::block_unit::*;
use crate::api::SliceType;

pub const NUM_CTX_SKIP_FLAG: u8 = 2;
pub const NUM_CTX_PRED_MODE: u8 = 3;
pub const NUM_CTX_AFFINE_FLAG: u8 = 2;
pub const NUM_CTX_IBC_FLAG: u8 = 2;

/// Which horizontal neighbours of a coding unit are already coded, as
/// dictated by the split it came out of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborLayout {
  None = 0,
  Left = 1,
  Right = 2,
  Both = 3,
}

impl NeighborLayout {
  #[inline]
  const fn from_bits(left: bool, right: bool) -> Self {
    match (left, right) {
      (false, false) => NeighborLayout::None,
      (true, false) => NeighborLayout::Left,
      (false, true) => NeighborLayout::Right,
      (true, true) => NeighborLayout::Both,
    }
  }
}

/// Neighbour addresses of a motion candidate scan and whether each may be
/// used. An address is `None` when the position falls outside the picture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NeighborSet {
  pub addr: [Option<ScuIdx>; MAX_NUM_POSSIBLE_SCAND],
  pub valid: [bool; MAX_NUM_POSSIBLE_SCAND],
}

impl NeighborSet {
  /// Address of slot `k` if it holds a usable candidate.
  #[inline]
  pub fn usable(&self, k: usize) -> Option<ScuIdx> {
    match (self.valid.get(k), self.addr.get(k)) {
      (Some(true), Some(addr)) => *addr,
      _ => None,
    }
  }

  pub fn count_valid(&self) -> usize {
    self.valid.iter().filter(|&&v| v).count()
  }
}

/// Set of available neighbour directions of a coding unit.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AvailMask(u16);

impl AvailMask {
  pub const NONE: AvailMask = AvailMask(0);
  /// Left.
  pub const LE: AvailMask = AvailMask(1 << 0);
  /// Above.
  pub const UP: AvailMask = AvailMask(1 << 1);
  /// Above right, past the coding unit's right edge.
  pub const UP_RI: AvailMask = AvailMask(1 << 2);
  /// Above left corner.
  pub const UP_LE: AvailMask = AvailMask(1 << 3);
  /// Below left.
  pub const LO_LE: AvailMask = AvailMask(1 << 4);
  /// Right.
  pub const RI: AvailMask = AvailMask(1 << 5);
  /// Below right.
  pub const LO_RI: AvailMask = AvailMask(1 << 6);
  /// Above the coding unit's last column.
  pub const RI_UP: AvailMask = AvailMask(1 << 7);

  #[inline(always)]
  pub const fn contains(self, other: AvailMask) -> bool {
    self.0 & other.0 == other.0
  }

  #[inline(always)]
  pub fn insert(&mut self, other: AvailMask) {
    self.0 |= other.0;
  }

  #[inline(always)]
  pub const fn bits(self) -> u16 {
    self.0
  }

  #[inline(always)]
  pub const fn is_empty(self) -> bool {
    self.0 == 0
  }
}

impl BitOr for AvailMask {
  type Output = AvailMask;
  #[inline(always)]
  fn bitor(self, rhs: AvailMask) -> AvailMask {
    AvailMask(self.0 | rhs.0)
  }
}

impl BitOrAssign for AvailMask {
  #[inline(always)]
  fn bitor_assign(&mut self, rhs: AvailMask) {
    self.insert(rhs);
  }
}

impl fmt::Debug for AvailMask {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    const NAMES: [(AvailMask, &str); 8] = [
      (AvailMask::LE, "LE"),
      (AvailMask::UP, "UP"),
      (AvailMask::UP_RI, "UP_RI"),
      (AvailMask::UP_LE, "UP_LE"),
      (AvailMask::LO_LE, "LO_LE"),
      (AvailMask::RI, "RI"),
      (AvailMask::LO_RI, "LO_RI"),
      (AvailMask::RI_UP, "RI_UP"),
    ];
    let mut set = f.debug_set();
    for (bit, name) in NAMES.iter() {
      if self.contains(*bit) {
        set.entry(name);
      }
    }
    set.finish()
  }
}

/// Context indices derived from the coded neighbours of a coding unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CtxFlags {
  pub skip: u8,
  pub pred_mode: u8,
  pub mode_cons: u8,
  pub affine: u8,
  pub ibc: u8,
}

/// Read-only view over the maps availability is decided from.
///
/// Callers must only query positions whose neighbours are final, either
/// because the picture is coded in raster order or because the wavefront
/// row flag for the row above has been observed.
#[derive(Clone, Copy, Debug)]
pub struct NeighborView<'a> {
  pub status: &'a StatusMap,
  pub tiles: &'a TileIdMap,
  /// Slice of the units being queried; neighbours of other slices are
  /// unavailable.
  pub slice: u16,
}

impl<'a> NeighborView<'a> {
  pub fn new(status: &'a StatusMap, tiles: &'a TileIdMap) -> Self {
    debug_assert_eq!(status.grid(), tiles.grid());
    NeighborView { status, tiles, slice: 0 }
  }

  /// The same view, for units of slice `slice`.
  #[inline]
  pub const fn in_slice(self, slice: u16) -> Self {
    NeighborView { slice, ..self }
  }

  #[inline(always)]
  pub fn grid(&self) -> GridSize {
    self.status.grid()
  }

  /// Status at `idx`; positions outside the map read as never coded.
  #[inline(always)]
  fn status_at(&self, idx: ScuIdx) -> CodingStatus {
    self.status.get(idx).copied().unwrap_or_default()
  }

  #[inline(always)]
  fn same_tile(&self, a: ScuIdx, b: ScuIdx) -> bool {
    match (self.tiles.get(a), self.tiles.get(b)) {
      (Some(ta), Some(tb)) => ta == tb,
      _ => false,
    }
  }

  /// `n` shares the tile of `scup` and belongs to the queried slice.
  #[inline(always)]
  fn same_region(&self, scup: ScuIdx, n: ScuIdx) -> bool {
    self.same_tile(scup, n) && self.status_at(n).slice == self.slice
  }

  #[inline(always)]
  fn coded_in_region(&self, scup: ScuIdx, n: ScuIdx) -> bool {
    self.status_at(n).coded && self.same_region(scup, n)
  }

  /// Neighbour of `cu` at (`dx`, `dy`) SCUs from its top-left corner,
  /// provided `cond` holds and the position is inside the grid.
  #[inline(always)]
  fn at(
    &self, cu: &CodingUnit, dx: isize, dy: isize, cond: bool,
  ) -> Option<ScuIdx> {
    if !cond {
      return None;
    }
    self.grid().checked_index(cu.pos.x as isize + dx, cu.pos.y as isize + dy)
  }

  /// Classifies which horizontal neighbours of `cu` are coded in its tile
  /// and slice.
  pub fn neighbor_layout(&self, cu: &CodingUnit) -> NeighborLayout {
    let grid = self.grid();
    let scup = grid.index(cu.pos);
    let scuw = cu.scuw() as isize;

    let left = self
      .at(cu, -1, 0, cu.pos.x > 0)
      .map_or(false, |n| self.coded_in_region(scup, n));
    let right = self
      .at(cu, scuw, 0, cu.pos.x + cu.scuw() < grid.cols)
      .map_or(false, |n| self.coded_in_region(scup, n));

    NeighborLayout::from_bits(left, right)
  }

  /// Fills the candidate slots of a motion vector predictor scan.
  ///
  /// Slots 0 to 2 are always filled; slots 3 and 4 only when a single
  /// predictor is requested (`num_mvp == 1`). A slot is valid when it lies
  /// inside the picture, is coded, shares the tile and slice of `cu` and
  /// matches the prediction kind: block copy candidates only come from
  /// block copy neighbours, inter candidates only from inter neighbours.
  pub fn motion_candidates(
    &self, cu: &CodingUnit, layout: NeighborLayout, num_mvp: usize,
    is_ibc: bool,
  ) -> NeighborSet {
    let grid = self.grid();
    let scup = grid.index(cu.pos);
    let (x, y) = (cu.pos.x, cu.pos.y);
    let (w, h) = (grid.cols, grid.rows);
    let (scuw, scuh) = (cu.scuw(), cu.scuh());
    let (iw, ih) = (scuw as isize, scuh as isize);

    let has_left = x > 0;
    let has_up = y > 0;
    let has_right = x + scuw < w;
    let has_below = y + scuh < h;

    let mut set = NeighborSet::default();
    let (head, tail) = match layout {
      NeighborLayout::Both => (
        [
          self.at(cu, -1, ih - 1, has_left),
          self.at(cu, iw, ih - 1, has_right),
          self.at(cu, 0, -1, has_up),
        ],
        [
          self.at(cu, iw, -1, has_up && has_right),
          self.at(cu, -1, -1, has_left && has_up),
        ],
      ),
      NeighborLayout::Right => (
        [
          self.at(cu, iw, ih - 1, has_right),
          self.at(cu, 0, -1, has_up),
          self.at(cu, -1, -1, has_up && has_left),
        ],
        [
          self.at(cu, iw, ih, has_below && has_right),
          self.at(cu, iw, -1, has_up && has_right),
        ],
      ),
      NeighborLayout::Left | NeighborLayout::None => (
        [
          self.at(cu, -1, ih - 1, has_left),
          self.at(cu, iw - 1, -1, has_up),
          self.at(cu, iw, -1, has_up && has_right),
        ],
        [
          self.at(cu, -1, ih, has_below && has_left),
          self.at(cu, -1, -1, has_up && has_left),
        ],
      ),
    };

    set.addr[..3].copy_from_slice(&head);
    if num_mvp == 1 {
      set.addr[3..].copy_from_slice(&tail);
    }

    for (valid, addr) in set.valid.iter_mut().zip(set.addr.iter()) {
      *valid = addr.map_or(false, |n| {
        let s = self.status_at(n);
        s.coded
          && self.same_region(scup, n)
          && if is_ibc { s.ibc } else { !s.intra && !s.ibc }
      });
    }

    set
  }

  /// Neighbour directions usable for inter prediction of `cu`.
  pub fn avail_inter(&self, cu: &CodingUnit) -> AvailMask {
    let grid = self.grid();
    let scup = grid.index(cu.pos);
    let (x, y) = (cu.pos.x, cu.pos.y);
    let (scuw, scuh) = (cu.scuw(), cu.scuh());
    let (iw, ih) = (scuw as isize, scuh as isize);
    let has_right = x + scuw < grid.cols;
    let has_below = y + scuh < grid.rows;

    let not_intra = |n: ScuIdx| {
      let s = self.status_at(n);
      !s.intra && !s.ibc && self.same_region(scup, n)
    };
    let inter = |n: ScuIdx| self.status_at(n).coded && not_intra(n);

    let mut avail = AvailMask::NONE;

    if self.at(cu, -1, 0, x > 0).map_or(false, inter) {
      avail |= AvailMask::LE;
      if self.at(cu, -1, ih, has_below).map_or(false, inter) {
        avail |= AvailMask::LO_LE;
      }
    }

    if y > 0 {
      // the row above is complete by the time a CU is coded
      if self.at(cu, 0, -1, true).map_or(false, not_intra) {
        avail |= AvailMask::UP;
      }
      if self.at(cu, iw - 1, -1, true).map_or(false, not_intra) {
        avail |= AvailMask::RI_UP;
      }
      if self.at(cu, -1, -1, x > 0).map_or(false, inter) {
        avail |= AvailMask::UP_LE;
      }
      let up_right = self.at(cu, iw, -1, has_right).map_or(false, |n| {
        let s = self.status_at(n);
        s.coded && !s.intra && self.same_region(scup, n)
      });
      if up_right {
        avail |= AvailMask::UP_RI;
      }
    }

    if self.at(cu, iw, 0, has_right).map_or(false, inter) {
      avail |= AvailMask::RI;
      if self.at(cu, iw, ih, has_below).map_or(false, inter) {
        avail |= AvailMask::LO_RI;
      }
    }

    avail
  }

  /// Neighbour directions usable as intra reference samples for `cu`.
  ///
  /// The lower left and lower right directions reach as far below the
  /// coding unit as it is wide, the extent of diagonal intra modes.
  pub fn avail_intra(&self, cu: &CodingUnit) -> AvailMask {
    let grid = self.grid();
    let scup = grid.index(cu.pos);
    let (x, y) = (cu.pos.x, cu.pos.y);
    let (scuw, scuh) = (cu.scuw(), cu.scuh());
    let (iw, ih) = (scuw as isize, scuh as isize);
    let has_right = x + scuw < grid.cols;
    let reaches_below = y + scuh + scuw - 1 < grid.rows;
    let coded = |n: ScuIdx| self.coded_in_region(scup, n);

    let mut avail = AvailMask::NONE;

    if self.at(cu, -1, 0, x > 0).map_or(false, coded) {
      avail |= AvailMask::LE;
      if self.at(cu, -1, iw + ih - 1, reaches_below).map_or(false, coded) {
        avail |= AvailMask::LO_LE;
      }
    }

    if y > 0 {
      let in_region = |n: ScuIdx| self.same_region(scup, n);
      if self.at(cu, 0, -1, true).map_or(false, in_region) {
        avail |= AvailMask::UP;
      }
      if self.at(cu, iw - 1, -1, true).map_or(false, in_region) {
        avail |= AvailMask::RI_UP;
      }
      if self.at(cu, -1, -1, x > 0).map_or(false, coded) {
        avail |= AvailMask::UP_LE;
      }
      if self.at(cu, iw, -1, has_right).map_or(false, coded) {
        avail |= AvailMask::UP_RI;
      }
    }

    if self.at(cu, iw, 0, has_right).map_or(false, coded) {
      avail |= AvailMask::RI;
      if self.at(cu, iw, iw + ih - 1, reaches_below).map_or(false, coded) {
        avail |= AvailMask::LO_RI;
      }
    }

    avail
  }

  /// Context indices for the mode flags of `cu`, summed over the coded
  /// neighbours above, left of the bottom row and right of the bottom row.
  ///
  /// Returns `None` when no mode flag is coded for the unit: intra slices
  /// without block copy, or units too large for block copy. Sums are
  /// clamped to each table size when `cm_init` is set and collapse to 0
  /// otherwise.
  pub fn ctx_flags(
    &self, cu: &CodingUnit, slice_type: SliceType, cm_init: bool, ibc: bool,
    ibc_log_max_size: usize,
  ) -> Option<CtxFlags> {
    let is_intra = slice_type == SliceType::I;
    let ibc_max = 1usize << ibc_log_max_size;
    if is_intra && (!ibc || cu.width > ibc_max || cu.height > ibc_max) {
      return None;
    }

    let grid = self.grid();
    let scup = grid.index(cu.pos);
    let (iw, ih) = (cu.scuw() as isize, cu.scuh() as isize);
    let neighbors = [
      self.at(cu, 0, -1, cu.pos.y > 0),
      self.at(cu, -1, ih - 1, cu.pos.x > 0),
      self.at(cu, iw, ih - 1, cu.pos.x + cu.scuw() < grid.cols),
    ];

    let mut sum = CtxFlags::default();
    let mut num_avail = 0;
    for n in neighbors.iter().flatten() {
      if !self.status_at(*n).coded || !self.same_tile(scup, *n) {
        continue;
      }
      let s = self.status_at(*n);
      sum.skip += s.skip as u8;
      sum.pred_mode += s.intra as u8;
      if !is_intra {
        sum.affine += s.affine as u8;
      }
      if ibc {
        sum.ibc += s.ibc as u8;
      }
      num_avail += 1;
    }

    if num_avail == 0 || !cm_init {
      return Some(CtxFlags::default());
    }

    Some(CtxFlags {
      skip: sum.skip.min(NUM_CTX_SKIP_FLAG - 1),
      pred_mode: sum.pred_mode.min(NUM_CTX_PRED_MODE - 1),
      mode_cons: 0,
      affine: sum.affine.min(NUM_CTX_AFFINE_FLAG - 1),
      ibc: sum.ibc.min(NUM_CTX_IBC_FLAG - 1),
    })
  }
}
