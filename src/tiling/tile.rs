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
use picbuf::image::{ImageBuffer, MAX_PLANES};

use arrayvec::ArrayVec;
use std::marker::PhantomData;

/// Rectangle of a tile, in luma samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
  pub x: usize,
  pub y: usize,
  pub width: usize,
  pub height: usize,
}

impl TileRect {
  /// The SCU-aligned part of the grid this tile covers.
  #[inline]
  pub fn to_scu_rect(&self) -> Rect {
    Rect {
      x: self.x >> MIN_CU_LOG2,
      y: self.y >> MIN_CU_LOG2,
      width: self.width.align_power_of_two_and_shift(MIN_CU_LOG2),
      height: self.height.align_power_of_two_and_shift(MIN_CU_LOG2),
    }
  }

  /// Whether the SCU at `off` lies inside the tile.
  #[inline]
  pub fn contains(&self, off: ScuOffset) -> bool {
    let r = self.to_scu_rect();
    (r.x..r.x + r.width).contains(&off.x)
      && (r.y..r.y + r.height).contains(&off.y)
  }
}

impl From<TileRect> for Rect {
  #[inline(always)]
  fn from(tile_rect: TileRect) -> Rect {
    Rect {
      x: tile_rect.x,
      y: tile_rect.y,
      width: tile_rect.width,
      height: tile_rect.height,
    }
  }
}

/// Mutable tiled view of a picture
#[derive(Debug)]
pub struct TileMut<'a, T: Pixel> {
  /// Index of the tile in raster order.
  pub index: usize,
  pub rect: TileRect,
  pub planes: ArrayVec<PlaneRegionMut<'a, T>, MAX_PLANES>,
}

impl<'a, T: Pixel> TileMut<'a, T> {
  /// View of the whole of `img` as a single tile.
  pub fn whole(img: &'a mut ImageBuffer<T>) -> Self {
    let rect =
      TileRect { x: 0, y: 0, width: img.width(), height: img.height() };
    let planes = img
      .planes
      .iter_mut()
      .map(|plane| {
        let r = Rect::from(rect).decimated(plane.cfg.xdec, plane.cfg.ydec);
        PlaneRegionMut::new(plane, r)
      })
      .collect();
    TileMut { index: 0, rect, planes }
  }
}

/// Iterator over the disjoint mutable tiles of a picture.
#[derive(Debug)]
pub struct TileMutIter<'a, T: Pixel> {
  img: *mut ImageBuffer<T>,
  tiling: TilingInfo,
  next: usize,
  phantom: PhantomData<&'a mut ImageBuffer<T>>,
}

impl<'a, T: Pixel> TileMutIter<'a, T> {
  pub(crate) fn new(img: &'a mut ImageBuffer<T>, tiling: TilingInfo) -> Self {
    TileMutIter { img, tiling, next: 0, phantom: PhantomData }
  }
}

impl<'a, T: Pixel> Iterator for TileMutIter<'a, T> {
  type Item = TileMut<'a, T>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.next >= self.tiling.tile_count() {
      return None;
    }
    let index = self.next;
    self.next += 1;
    let rect = self.tiling.tile_rect(index);

    // SAFETY: tile rectangles never overlap, so the regions handed out
    // alias no sample, and the iterator holds the exclusive borrow of the
    // image for 'a.
    let img = unsafe { &mut *self.img };
    let planes = img
      .planes
      .iter_mut()
      .map(|plane| {
        let (xdec, ydec) = (plane.cfg.xdec, plane.cfg.ydec);
        let r = Rect::from(rect)
          .decimated(xdec, ydec)
          .clipped(plane.cfg.width, plane.cfg.height);
        PlaneRegionMut::new(plane, r)
      })
      .collect();
    Some(TileMut { index, rect, planes })
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let remaining = self.tiling.tile_count() - self.next;
    (remaining, Some(remaining))
  }
}

impl<T: Pixel> ExactSizeIterator for TileMutIter<'_, T> {}

unsafe impl<T: Pixel> Send for TileMutIter<'_, T> {}
