// Copyright (c) 2019-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::util::*;
use picbuf::plane::{Plane, PlaneConfig};

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::slice;

/// Rectangle of a plane region, in samples of that plane, relative to the
/// plane origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
  pub x: usize,
  pub y: usize,
  pub width: usize,
  pub height: usize,
}

impl Rect {
  #[inline(always)]
  pub const fn decimated(&self, xdec: usize, ydec: usize) -> Self {
    Self {
      x: self.x >> xdec,
      y: self.y >> ydec,
      width: self.width >> xdec,
      height: self.height >> ydec,
    }
  }

  /// Clips the rectangle to a `width` x `height` area.
  #[inline]
  pub fn clipped(&self, width: usize, height: usize) -> Self {
    let x = self.x.min(width);
    let y = self.y.min(height);
    Self {
      x,
      y,
      width: self.width.min(width - x),
      height: self.height.min(height - y),
    }
  }
}

/// Writable window over the samples of one tile in one plane.
///
/// Windows over disjoint rectangles of the same plane may be alive at the
/// same time and be sent to different threads.
#[derive(Debug)]
pub struct PlaneRegionMut<'a, T: Pixel> {
  /// First sample of the window, at (`rect.x`, `rect.y`).
  origin: *mut T,
  stride: usize,
  rect: Rect,
  phantom: PhantomData<&'a mut T>,
}

unsafe impl<T: Pixel> Send for PlaneRegionMut<'_, T> {}
unsafe impl<T: Pixel> Sync for PlaneRegionMut<'_, T> {}

impl<'a, T: Pixel> PlaneRegionMut<'a, T> {
  /// Window of `plane` at `rect`, which must lie within the allocation.
  pub fn new(plane: &'a mut Plane<T>, rect: Rect) -> Self {
    let PlaneConfig { xorigin, yorigin, stride, alloc_height, .. } =
      plane.cfg;
    assert!(xorigin + rect.x + rect.width <= stride);
    assert!(yorigin + rect.y + rect.height <= alloc_height);
    let offset = (yorigin + rect.y) * stride + xorigin + rect.x;
    let origin = plane.data[offset..].as_mut_ptr();
    PlaneRegionMut { origin, stride, rect, phantom: PhantomData }
  }

  #[inline(always)]
  pub const fn rect(&self) -> &Rect {
    &self.rect
  }

  /// Rows of the window, top to bottom.
  pub fn rows_iter_mut(&mut self) -> impl Iterator<Item = &mut [T]> + '_ {
    let (origin, stride, width) = (self.origin, self.stride, self.rect.width);
    // SAFETY: rows are `stride` apart and `width <= stride`, so the slices
    // are disjoint, and `&mut self` is held for as long as they live.
    (0..self.rect.height).map(move |y| unsafe {
      slice::from_raw_parts_mut(origin.add(y * stride), width)
    })
  }
}

impl<T: Pixel> Index<usize> for PlaneRegionMut<'_, T> {
  type Output = [T];

  #[inline(always)]
  fn index(&self, y: usize) -> &[T] {
    assert!(y < self.rect.height);
    // SAFETY: the row lies within the window checked in `new`.
    unsafe {
      slice::from_raw_parts(self.origin.add(y * self.stride), self.rect.width)
    }
  }
}

impl<T: Pixel> IndexMut<usize> for PlaneRegionMut<'_, T> {
  #[inline(always)]
  fn index_mut(&mut self, y: usize) -> &mut [T] {
    assert!(y < self.rect.height);
    // SAFETY: as for `index`, with `&mut self` held.
    unsafe {
      slice::from_raw_parts_mut(
        self.origin.add(y * self.stride),
        self.rect.width,
      )
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn region_rows_are_offset() {
    let mut plane = Plane::<u8>::new(8, 8, 0, 0, 2, 0).unwrap();
    for y in 0..8 {
      for (x, v) in plane.row_mut(y).iter_mut().enumerate() {
        *v = (y * 8 + x) as u8;
      }
    }
    let rect = Rect { x: 4, y: 2, width: 4, height: 3 };
    {
      let mut region = PlaneRegionMut::new(&mut plane, rect);
      assert_eq!(&region[0], &[20, 21, 22, 23]);
      region[2][3] = 99;
      let rows: Vec<Vec<u8>> =
        region.rows_iter_mut().map(|row| row.to_vec()).collect();
      assert_eq!(rows.len(), 3);
      assert_eq!(rows[2], vec![36, 37, 38, 99]);
    }
    assert_eq!(plane.p(7, 4), 99);
  }

  #[test]
  fn clipping() {
    let r = Rect { x: 56, y: 0, width: 16, height: 16 };
    assert_eq!(r.clipped(64, 8), Rect { x: 56, y: 0, width: 8, height: 8 });
    assert_eq!(r.decimated(1, 1), Rect { x: 28, y: 0, width: 8, height: 8 });
  }
}
