// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::alloc::{alloc, dealloc, Layout};
use std::fmt::{Debug, Formatter};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::mem;
use std::ops::Range;

use thiserror::Error;

use crate::math::*;
use crate::pixel::*;
use crate::serialize::{Deserialize, Serialize};

/// A plane allocation could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("failed to allocate {bytes} bytes of plane data")]
pub struct AllocError {
  /// Size of the rejected request.
  pub bytes: usize,
}

/// Plane-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneConfig {
  /// Data stride in samples.
  pub stride: usize,
  /// Allocated height in rows, padding included.
  pub alloc_height: usize,
  /// Width in pixels.
  pub width: usize,
  /// Height in pixels.
  pub height: usize,
  /// Width rounded up to the plane alignment.
  pub aligned_width: usize,
  /// Height rounded up to the plane alignment.
  pub aligned_height: usize,
  /// Decimator along the X axis.
  ///
  /// For example, for chroma planes in a 4:2:0 configuration this would be 1.
  pub xdec: usize,
  /// Decimator along the Y axis.
  pub ydec: usize,
  /// Number of padding pixels on the right of the aligned area.
  pub xpad: usize,
  /// Number of padding rows below the aligned area.
  pub ypad: usize,
  /// X where the data starts, i.e. the left padding.
  pub xorigin: usize,
  /// Y where the data starts, i.e. the top padding.
  pub yorigin: usize,
}

impl PlaneConfig {
  /// Geometry of a plane of `width` x `height` samples, rounded up to
  /// `1 << align_log2` and surrounded by `pad` samples on every side.
  #[inline]
  pub fn new(
    width: usize, height: usize, xdec: usize, ydec: usize, pad: usize,
    align_log2: usize,
  ) -> Self {
    let aligned_width = width.align_power_of_two(align_log2);
    let aligned_height = height.align_power_of_two(align_log2);
    let stride = pad + aligned_width + pad;
    let alloc_height = pad + aligned_height + pad;

    PlaneConfig {
      stride,
      alloc_height,
      width,
      height,
      aligned_width,
      aligned_height,
      xdec,
      ydec,
      xpad: pad,
      ypad: pad,
      xorigin: pad,
      yorigin: pad,
    }
  }

  /// Number of samples the backing allocation holds.
  #[inline]
  pub const fn len(&self) -> usize {
    self.stride * self.alloc_height
  }
}

/// Backing buffer for the Plane data
///
/// The buffer is aligned for vector loads. Allocation is fallible so that
/// running out of memory surfaces as an [`AllocError`] instead of an abort.
pub struct PlaneData<T: Pixel> {
  ptr: std::ptr::NonNull<T>,
  _marker: PhantomData<T>,
  len: usize,
}

unsafe impl<T: Pixel + Send> Send for PlaneData<T> {}
unsafe impl<T: Pixel + Sync> Sync for PlaneData<T> {}

impl<T: Pixel> std::ops::Deref for PlaneData<T> {
  type Target = [T];

  fn deref(&self) -> &[T] {
    // SAFETY: ptr is valid for len initialized elements (or dangling with
    // len 0).
    unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
  }
}

impl<T: Pixel> std::ops::DerefMut for PlaneData<T> {
  fn deref_mut(&mut self) -> &mut [T] {
    // SAFETY: see Deref; &mut self guarantees exclusive access.
    unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
  }
}

impl<T: Pixel> std::ops::Drop for PlaneData<T> {
  fn drop(&mut self) {
    if let Some(layout) = Self::layout(self.len) {
      // SAFETY: the pointer was returned by alloc with this exact layout.
      unsafe {
        dealloc(self.ptr.as_ptr() as *mut u8, layout);
      }
    }
  }
}

impl<T: Pixel> Debug for PlaneData<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "PlaneData {{ len: {} }}", self.len)
  }
}

impl<T: Pixel> PlaneData<T> {
  // Data alignment in bytes.
  cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
      // FIXME: wasm32 allocator fails for alignment larger than 3
      const DATA_ALIGNMENT_LOG2: usize = 3;
    } else {
      const DATA_ALIGNMENT_LOG2: usize = 6;
    }
  }

  /// Layout of a non-empty allocation, `None` for zero length.
  fn layout(len: usize) -> Option<Layout> {
    if len == 0 {
      return None;
    }
    let bytes = len.checked_mul(mem::size_of::<T>())?;
    Layout::from_size_align(bytes, 1 << Self::DATA_ALIGNMENT_LOG2).ok()
  }

  /// Allocates `len` samples, all set to `fill`.
  pub fn new(len: usize, fill: T) -> Result<Self, AllocError> {
    let bytes = len.saturating_mul(mem::size_of::<T>());
    let ptr = if len == 0 {
      std::ptr::NonNull::dangling()
    } else {
      let layout = Self::layout(len).ok_or(AllocError { bytes })?;
      // SAFETY: layout has a non-zero size.
      let raw = unsafe { alloc(layout) } as *mut T;
      let ptr = std::ptr::NonNull::new(raw).ok_or(AllocError { bytes })?;
      // SAFETY: the allocation holds len elements of T.
      unsafe {
        for i in 0..len {
          ptr.as_ptr().add(i).write(fill);
        }
      }
      ptr
    };

    Ok(PlaneData { ptr, len, _marker: PhantomData })
  }

  pub fn from_slice(data: &[T]) -> Result<Self, AllocError> {
    let mut pd = Self::new(data.len(), T::default())?;
    pd.copy_from_slice(data);
    Ok(pd)
  }
}

/// One data plane of an image.
///
/// For example, a plane can be a Y luma plane or a U or V chroma plane.
pub struct Plane<T: Pixel> {
  pub data: PlaneData<T>,
  /// Plane configuration.
  pub cfg: PlaneConfig,
}

impl<T: Pixel> Debug for Plane<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "Plane {{ data: {:?}, cfg: {:?} }}", self.data, self.cfg)
  }
}

impl<T: Pixel> Plane<T> {
  /// Allocates and returns a new zeroed plane.
  pub fn new(
    width: usize, height: usize, xdec: usize, ydec: usize, pad: usize,
    align_log2: usize,
  ) -> Result<Self, AllocError> {
    let cfg = PlaneConfig::new(width, height, xdec, ydec, pad, align_log2);
    let data = PlaneData::new(cfg.len(), T::default())?;

    Ok(Plane { data, cfg })
  }

  /// Wraps an unpadded buffer of `stride`-wide rows.
  pub fn from_slice(data: &[T], stride: usize) -> Result<Self, AllocError> {
    let len = data.len();

    assert!(stride > 0 && len % stride == 0);

    Ok(Self {
      data: PlaneData::from_slice(data)?,
      cfg: PlaneConfig {
        stride,
        alloc_height: len / stride,
        width: stride,
        height: len / stride,
        aligned_width: stride,
        aligned_height: len / stride,
        xdec: 0,
        ydec: 0,
        xpad: 0,
        ypad: 0,
        xorigin: 0,
        yorigin: 0,
      },
    })
  }

  /// Replicates the edge samples of the visible area outwards.
  ///
  /// Each of the `height` visible rows gets `hexp` copies of its first and
  /// last sample. Afterwards `vexp` rows above and below are filled with
  /// the already extended first and last rows. Expansion never reaches past
  /// the allocation.
  pub fn expand(&mut self, hexp: usize, vexp: usize) {
    let PlaneConfig { stride, alloc_height, xorigin, yorigin, .. } = self.cfg;
    let width = self.cfg.width;
    let height = self.cfg.height;
    if width == 0 || height == 0 {
      return;
    }

    let left = hexp.min(xorigin);
    let right = hexp.min(stride - xorigin - width);
    for y in 0..height {
      let base = (yorigin + y) * stride + xorigin;
      let row = &mut self.data[base - left..base + width + right];
      let first = row[left];
      let last = row[left + width - 1];
      row[..left].fill(first);
      row[left + width..].fill(last);
    }

    let above = vexp.min(yorigin);
    if above > 0 {
      let (top, rest) = self.data.split_at_mut(yorigin * stride);
      let src = &rest[..stride];
      for dst in top[(yorigin - above) * stride..].chunks_exact_mut(stride) {
        dst.copy_from_slice(src);
      }
    }

    let below = vexp.min(alloc_height - yorigin - height);
    if below > 0 {
      let (top, rest) = self.data.split_at_mut((yorigin + height) * stride);
      let src = &top[(yorigin + height - 1) * stride..];
      for dst in rest[..below * stride].chunks_exact_mut(stride) {
        dst.copy_from_slice(src);
      }
    }
  }

  /// Minimally test that the plane has been expanded by `exp` samples.
  pub fn is_padded(&self, exp: usize) -> bool {
    let PlaneConfig { xorigin, yorigin, stride, width, height, .. } =
      self.cfg;
    let corner = (yorigin + height - 1) * stride + xorigin + width - 1;
    let corner_value = self.data[corner];
    let exp_x = exp.min(stride - xorigin - width);
    let exp_y = exp.min(self.cfg.alloc_height - yorigin - height);

    self.data[corner + exp_x] == corner_value
      && self.data[corner + exp_y * stride] == corner_value
      && self.data[corner + exp_y * stride + exp_x] == corner_value
  }

  #[inline]
  fn index(&self, x: usize, y: usize) -> usize {
    (y + self.cfg.yorigin) * self.cfg.stride + (x + self.cfg.xorigin)
  }

  /// Range of the visible part of row `y`.
  #[inline]
  pub fn row_range(&self, y: usize) -> Range<usize> {
    let base = self.index(0, y);
    base..base + self.cfg.width
  }

  /// Returns the pixel at the given coordinates.
  pub fn p(&self, x: usize, y: usize) -> T {
    self.data[self.index(x, y)]
  }

  /// Returns the visible samples of row `y`.
  pub fn row(&self, y: usize) -> &[T] {
    let range = self.row_range(y);
    &self.data[range]
  }

  /// Returns the visible samples of row `y` for writing.
  pub fn row_mut(&mut self, y: usize) -> &mut [T] {
    let range = self.row_range(y);
    &mut self.data[range]
  }

  /// Copies `width` x `height` samples from `src`, converting from
  /// `src_depth` bits to `dst_depth` bits per sample.
  ///
  /// Widening shifts left. Narrowing rounds to nearest and clips to the
  /// destination range.
  pub fn copy_converted<U: Pixel>(
    &mut self, src: &Plane<U>, width: usize, height: usize,
    src_depth: usize, dst_depth: usize,
  ) {
    let max = max_sample(dst_depth);
    for y in 0..height {
      let s_row = &src.data[src.index(0, y)..src.index(width, y)];
      let base = self.index(0, y);
      let d_row = &mut self.data[base..base + width];
      if src_depth <= dst_depth {
        let shift = dst_depth - src_depth;
        for (d, &s) in d_row.iter_mut().zip(s_row) {
          let v: u32 = s.into();
          *d = T::cast_from(clamp(v << shift, 0, max));
        }
      } else {
        let shift = src_depth - dst_depth;
        for (d, &s) in d_row.iter_mut().zip(s_row) {
          let v: u32 = s.into();
          *d = T::cast_from(clamp(round_shift(v, shift), 0, max));
        }
      }
    }
  }

  /// Iterates over the lines of the plane
  pub fn rows_iter(&self) -> RowsIter<'_, T> {
    RowsIter { plane: self, y: 0 }
  }
}

pub struct RowsIter<'a, T: Pixel> {
  plane: &'a Plane<T>,
  y: usize,
}

impl<'a, T: Pixel> Iterator for RowsIter<'a, T> {
  type Item = &'a [T];

  fn next(&mut self) -> Option<Self::Item> {
    if self.plane.cfg.height > self.y {
      // cannot directly return self.plane.row(y) due to lifetime issue
      let range = self.plane.row_range(self.y);
      self.y += 1;
      Some(&self.plane.data[range])
    } else {
      None
    }
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let remaining = self.plane.cfg.height - self.y;

    (remaining, Some(remaining))
  }
}

impl<'a, T: Pixel> ExactSizeIterator for RowsIter<'a, T> {}
impl<'a, T: Pixel> FusedIterator for RowsIter<'a, T> {}
