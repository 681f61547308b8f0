// Copyright (c) 2019-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

use crate::context::*;
use crate::util::*;
use picbuf::image::ImageBuffer;

pub const MAX_TILE_COLS: usize = 20;
pub const MAX_TILE_ROWS: usize = 22;
pub const MAX_TILES: usize = 64;

/// Tiling information
///
/// Tiles are spread uniformly over the CTU grid: column `i` starts at CTU
/// `i * ctu_cols / cols`, and rows likewise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingInfo {
  pub frame_width: usize,
  pub frame_height: usize,
  pub ctu_size_log2: usize,
  pub cols: usize, // number of columns of tiles within the whole frame
  pub rows: usize, // number of rows of tiles within the whole frame
}

impl TilingInfo {
  /// Splits a frame into `cols` x `rows` tiles. The counts are clamped to
  /// the number of CTUs along each axis.
  pub fn new(
    ctu_size_log2: usize, frame_width: usize, frame_height: usize,
    cols: usize, rows: usize,
  ) -> Self {
    let ctu_cols = frame_width.align_power_of_two_and_shift(ctu_size_log2);
    let ctu_rows = frame_height.align_power_of_two_and_shift(ctu_size_log2);

    Self {
      frame_width,
      frame_height,
      ctu_size_log2,
      cols: cols.clamp(1, ctu_cols.clamp(1, MAX_TILE_COLS)),
      rows: rows.clamp(1, ctu_rows.clamp(1, MAX_TILE_ROWS)),
    }
  }

  #[inline(always)]
  pub fn ctu_cols(&self) -> usize {
    self.frame_width.align_power_of_two_and_shift(self.ctu_size_log2)
  }

  #[inline(always)]
  pub fn ctu_rows(&self) -> usize {
    self.frame_height.align_power_of_two_and_shift(self.ctu_size_log2)
  }

  #[inline(always)]
  pub fn tile_count(&self) -> usize {
    self.cols * self.rows
  }

  /// First CTU column of tile column `i`; `i == cols` gives the end.
  #[inline]
  fn col_boundary(&self, i: usize) -> usize {
    i * self.ctu_cols() / self.cols
  }

  #[inline]
  fn row_boundary(&self, i: usize) -> usize {
    i * self.ctu_rows() / self.rows
  }

  /// CTU rectangle of tile `index` in raster order.
  pub fn tile_rect_ctu(&self, index: usize) -> Rect {
    let (tx, ty) = (index % self.cols, index / self.cols);
    let x = self.col_boundary(tx);
    let y = self.row_boundary(ty);
    Rect {
      x,
      y,
      width: self.col_boundary(tx + 1) - x,
      height: self.row_boundary(ty + 1) - y,
    }
  }

  /// Luma rectangle of tile `index`, clipped to the frame.
  pub fn tile_rect(&self, index: usize) -> TileRect {
    let ctu = self.tile_rect_ctu(index);
    let x = ctu.x << self.ctu_size_log2;
    let y = ctu.y << self.ctu_size_log2;
    TileRect {
      x,
      y,
      width: (ctu.width << self.ctu_size_log2).min(self.frame_width - x),
      height: (ctu.height << self.ctu_size_log2).min(self.frame_height - y),
    }
  }

  /// Splits `img` into its tiles, for parallel processing.
  pub fn tile_iter_mut<'a, T: Pixel>(
    &self, img: &'a mut ImageBuffer<T>,
  ) -> TileMutIter<'a, T> {
    TileMutIter::new(img, *self)
  }
}

impl TileIdMap {
  /// Tile index of every SCU of the frame.
  pub fn from_tiling(tiling: &TilingInfo) -> Result<Self, AllocError> {
    debug_assert!(tiling.tile_count() <= u8::MAX as usize + 1);
    let grid = GridSize::from_luma(tiling.frame_width, tiling.frame_height);
    let mut map = BlockMap::new(grid, 0u8)?;
    for index in 0..tiling.tile_count() {
      let r = tiling.tile_rect(index).to_scu_rect();
      let cu = CodingUnit::new(
        ScuOffset { x: r.x, y: r.y },
        r.width << MIN_CU_LOG2,
        r.height << MIN_CU_LOG2,
      );
      map.fill_cu(&cu, index as u8);
    }
    Ok(map)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::util::ChromaSampling;
  use interpolate_name::interpolate_test;

  #[test]
  fn uniform_spacing() {
    // 5 x 3 CTUs of 64 samples, the last ones partial
    let ti = TilingInfo::new(6, 300, 136, 2, 2);
    assert_eq!((ti.ctu_cols(), ti.ctu_rows()), (5, 3));
    assert_eq!(ti.tile_rect_ctu(0), Rect { x: 0, y: 0, width: 2, height: 1 });
    assert_eq!(ti.tile_rect_ctu(3), Rect { x: 2, y: 1, width: 3, height: 2 });
    assert_eq!(
      ti.tile_rect(3),
      TileRect { x: 128, y: 64, width: 172, height: 72 }
    );
  }

  #[interpolate_test(one, 1, 1)]
  #[interpolate_test(cols, 4, 1)]
  #[interpolate_test(grid, 3, 2)]
  #[interpolate_test(clamped, 40, 40)]
  fn tiles_cover_frame(cols: usize, rows: usize) {
    let ti = TilingInfo::new(5, 200, 72, cols, rows);
    let area: usize = (0..ti.tile_count())
      .map(|i| {
        let r = ti.tile_rect(i);
        r.width * r.height
      })
      .sum();
    assert_eq!(area, 200 * 72);
    assert!(ti.cols <= ti.ctu_cols() && ti.rows <= ti.ctu_rows());
  }

  #[test]
  fn tile_id_map_follows_rects() {
    let ti = TilingInfo::new(5, 128, 64, 2, 2);
    let map = TileIdMap::from_tiling(&ti).unwrap();
    assert_eq!(map[ScuOffset { x: 0, y: 0 }], 0);
    assert_eq!(map[ScuOffset { x: 16, y: 0 }], 1);
    assert_eq!(map[ScuOffset { x: 15, y: 8 }], 2);
    assert_eq!(map[ScuOffset { x: 31, y: 15 }], 3);
    assert!(ti.tile_rect(1).contains(ScuOffset { x: 16, y: 7 }));
    assert!(!ti.tile_rect(1).contains(ScuOffset { x: 16, y: 8 }));
  }

  #[test]
  fn tiles_are_disjoint_views() {
    let mut img = ImageBuffer::<u8>::new(
      128,
      64,
      ChromaSampling::Cs420,
      8,
      [0; 3],
      [2; 3],
    )
    .unwrap();
    let ti = TilingInfo::new(5, 128, 64, 2, 2);
    for mut tile in ti.tile_iter_mut(&mut img) {
      let v = tile.index as u8 + 1;
      for plane in tile.planes.iter_mut() {
        for row in plane.rows_iter_mut() {
          row.fill(v);
        }
      }
    }
    assert_eq!(img.planes[0].p(0, 0), 1);
    assert_eq!(img.planes[0].p(64, 31), 2);
    assert_eq!(img.planes[1].p(31, 16), 3);
    assert_eq!(img.planes[2].p(63, 31), 4);
  }
}
