// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::ops::{Index, IndexMut};

use crate::util::{AllocError, Fixed};

/// log2 of the smallest coding unit, the granularity of every block map.
pub const MIN_CU_LOG2: usize = 2;
pub const MIN_CU_SIZE: usize = 1 << MIN_CU_LOG2;
pub const MAX_CU_LOG2: usize = 7;
pub const MAX_CU_SIZE: usize = 1 << MAX_CU_LOG2;

/// Number of neighbour slots a motion candidate scan fills.
pub const MAX_NUM_POSSIBLE_SCAND: usize = 5;

/// Reference index stored for blocks without a reference in a list.
pub const INVALID_REFI: i8 = -1;

#[inline(always)]
pub const fn refi_is_valid(refi: i8) -> bool {
  refi >= 0
}

/// Reference picture list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefList {
  L0 = 0,
  L1 = 1,
}

impl RefList {
  pub const ALL: [RefList; 2] = [RefList::L0, RefList::L1];

  #[inline(always)]
  pub const fn idx(self) -> usize {
    self as usize
  }
}

/// Absolute offset in smallest coding units (SCU), where an SCU is a
/// `MIN_CU_SIZE * MIN_CU_SIZE` square of luma samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScuOffset {
  pub x: usize,
  pub y: usize,
}

impl ScuOffset {
  /// SCU covering the luma sample at (`x`, `y`).
  #[inline]
  pub const fn from_luma(x: usize, y: usize) -> Self {
    ScuOffset { x: x >> MIN_CU_LOG2, y: y >> MIN_CU_LOG2 }
  }
}

/// Raster index of an SCU inside a block map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScuIdx(pub usize);

/// Dimensions of the SCU grid of a picture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridSize {
  pub cols: usize,
  pub rows: usize,
}

impl GridSize {
  /// Grid covering a luma area of `width` x `height` samples.
  #[inline]
  pub fn from_luma(width: usize, height: usize) -> Self {
    GridSize {
      cols: width.align_power_of_two_and_shift(MIN_CU_LOG2),
      rows: height.align_power_of_two_and_shift(MIN_CU_LOG2),
    }
  }

  #[inline]
  pub const fn len(self) -> usize {
    self.cols * self.rows
  }

  #[inline]
  pub const fn is_empty(self) -> bool {
    self.len() == 0
  }

  #[inline]
  pub const fn contains(self, off: ScuOffset) -> bool {
    off.x < self.cols && off.y < self.rows
  }

  #[inline(always)]
  pub const fn index(self, off: ScuOffset) -> ScuIdx {
    ScuIdx(off.y * self.cols + off.x)
  }

  /// Index of the SCU at (`x`, `y`), or `None` outside the grid.
  #[inline]
  pub fn checked_index(self, x: isize, y: isize) -> Option<ScuIdx> {
    if x < 0 || y < 0 {
      return None;
    }
    let off = ScuOffset { x: x as usize, y: y as usize };
    self.contains(off).then(|| self.index(off))
  }

  #[inline]
  pub const fn offset(self, idx: ScuIdx) -> ScuOffset {
    ScuOffset { x: idx.0 % self.cols, y: idx.0 / self.cols }
  }
}

/// A coding unit: its top-left SCU and its luma size in samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodingUnit {
  pub pos: ScuOffset,
  pub width: usize,
  pub height: usize,
}

impl CodingUnit {
  pub const fn new(pos: ScuOffset, width: usize, height: usize) -> Self {
    CodingUnit { pos, width, height }
  }

  /// Width in SCUs.
  #[inline(always)]
  pub const fn scuw(&self) -> usize {
    self.width >> MIN_CU_LOG2
  }

  /// Height in SCUs.
  #[inline(always)]
  pub const fn scuh(&self) -> usize {
    self.height >> MIN_CU_LOG2
  }

  /// SCU at the centre of the coding unit.
  #[inline]
  pub const fn luma_center(&self, grid: GridSize) -> ScuIdx {
    grid.index(ScuOffset {
      x: self.pos.x + (self.scuw() >> 1),
      y: self.pos.y + (self.scuh() >> 1),
    })
  }
}

/// Per-SCU coding state written by mode decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodingStatus {
  /// The SCU has been coded in the current picture.
  pub coded: bool,
  pub intra: bool,
  pub ibc: bool,
  pub skip: bool,
  pub affine: bool,
  /// Motion of this SCU was refined; neighbours should read the unrefined
  /// vector.
  pub dmvr: bool,
  /// Slice the SCU belongs to.
  pub slice: u16,
}

impl CodingStatus {
  /// Coded and inter predicted from another picture.
  #[inline(always)]
  pub const fn is_inter(&self) -> bool {
    self.coded && !self.intra && !self.ibc
  }
}

/// Flat arena with one entry per SCU of a picture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockMap<T> {
  data: Box<[T]>,
  grid: GridSize,
}

impl<T: Copy> BlockMap<T> {
  /// Allocates a map with every entry set to `fill`.
  pub fn new(grid: GridSize, fill: T) -> Result<Self, AllocError> {
    let len = grid.len();
    let mut data = Vec::new();
    data
      .try_reserve_exact(len)
      .map_err(|_| AllocError { bytes: len * std::mem::size_of::<T>() })?;
    data.resize(len, fill);

    Ok(BlockMap { data: data.into_boxed_slice(), grid })
  }

  #[inline(always)]
  pub const fn grid(&self) -> GridSize {
    self.grid
  }

  pub fn fill(&mut self, value: T) {
    self.data.fill(value);
  }

  #[inline]
  pub fn get(&self, idx: ScuIdx) -> Option<&T> {
    self.data.get(idx.0)
  }

  #[inline]
  pub fn get_mut(&mut self, idx: ScuIdx) -> Option<&mut T> {
    self.data.get_mut(idx.0)
  }

  /// Sets every entry covered by `cu` to `value`.
  pub fn fill_cu(&mut self, cu: &CodingUnit, value: T) {
    let x0 = cu.pos.x.min(self.grid.cols);
    let x1 = (cu.pos.x + cu.scuw()).min(self.grid.cols);
    let y1 = (cu.pos.y + cu.scuh()).min(self.grid.rows);
    for y in cu.pos.y..y1 {
      self[y][x0..x1].fill(value);
    }
  }

  #[inline]
  pub fn as_slice(&self) -> &[T] {
    &self.data
  }
}

impl<T> Index<usize> for BlockMap<T> {
  type Output = [T];
  #[inline]
  fn index(&self, index: usize) -> &Self::Output {
    let cols = self.grid.cols;
    &self.data[index * cols..(index + 1) * cols]
  }
}

impl<T> IndexMut<usize> for BlockMap<T> {
  #[inline]
  fn index_mut(&mut self, index: usize) -> &mut Self::Output {
    let cols = self.grid.cols;
    &mut self.data[index * cols..(index + 1) * cols]
  }
}

impl<T> Index<ScuIdx> for BlockMap<T> {
  type Output = T;
  #[inline(always)]
  fn index(&self, idx: ScuIdx) -> &Self::Output {
    &self.data[idx.0]
  }
}

impl<T> IndexMut<ScuIdx> for BlockMap<T> {
  #[inline(always)]
  fn index_mut(&mut self, idx: ScuIdx) -> &mut Self::Output {
    &mut self.data[idx.0]
  }
}

// for convenience, also index by ScuOffset

impl<T> Index<ScuOffset> for BlockMap<T> {
  type Output = T;
  #[inline]
  fn index(&self, off: ScuOffset) -> &Self::Output {
    &self[off.y][off.x]
  }
}

impl<T> IndexMut<ScuOffset> for BlockMap<T> {
  #[inline]
  fn index_mut(&mut self, off: ScuOffset) -> &mut Self::Output {
    &mut self[off.y][off.x]
  }
}

/// Coding status of every SCU of the picture being coded.
pub type StatusMap = BlockMap<CodingStatus>;

/// Tile each SCU belongs to.
pub type TileIdMap = BlockMap<u8>;
