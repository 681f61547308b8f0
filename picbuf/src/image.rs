// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::sync::Arc;

use arrayvec::ArrayVec;

use crate::pixel::*;
use crate::plane::*;

/// Maximum number of planes an image carries.
pub const MAX_PLANES: usize = 3;

/// A multi-plane image with padding, alignment and bit depth metadata.
///
/// Holders share an image through `Arc<ImageBuffer<T>>`: cloning the handle
/// is the add-ref, dropping it the release, and the planes are freed once,
/// when the last handle goes away.
#[derive(Debug)]
pub struct ImageBuffer<T: Pixel> {
  /// Planes constituting the image, one for monochrome, three otherwise.
  pub planes: ArrayVec<Plane<T>, MAX_PLANES>,
  pub chroma_sampling: ChromaSampling,
  pub bit_depth: usize,
  /// Per-plane crop offset of the visible area.
  pub crop: [(usize, usize); MAX_PLANES],
  /// Presentation timestamps, carried along untouched.
  pub ts: [u64; 4],
}

impl<T: Pixel> ImageBuffer<T> {
  /// Allocates an image of `width` x `height` luma samples.
  ///
  /// Plane `i` is padded by `pad[i]` samples on every side and its size is
  /// rounded up to `1 << align_log2[i]`. Chroma dimensions derive from the
  /// luma ones through `chroma_sampling`. If any plane cannot be allocated,
  /// the planes that were already allocated are dropped and the error is
  /// returned.
  pub fn new(
    width: usize, height: usize, chroma_sampling: ChromaSampling,
    bit_depth: usize, pad: [usize; MAX_PLANES],
    align_log2: [usize; MAX_PLANES],
  ) -> Result<Self, AllocError> {
    debug_assert!(bit_depth <= T::max_bit_depth());

    let (xdec, ydec) = chroma_sampling.get_decimation().unwrap_or((0, 0));
    let (chroma_width, chroma_height) =
      chroma_sampling.get_chroma_dimensions(width, height);

    let mut planes = ArrayVec::new();
    planes.push(Plane::new(width, height, 0, 0, pad[0], align_log2[0])?);
    for p in 1..chroma_sampling.plane_count() {
      planes.push(Plane::new(
        chroma_width,
        chroma_height,
        xdec,
        ydec,
        pad[p],
        align_log2[p],
      )?);
    }

    Ok(ImageBuffer {
      planes,
      chroma_sampling,
      bit_depth,
      crop: [(0, 0); MAX_PLANES],
      ts: [0; 4],
    })
  }

  /// Luma width in samples.
  #[inline]
  pub fn width(&self) -> usize {
    self.planes[0].cfg.width
  }

  /// Luma height in samples.
  #[inline]
  pub fn height(&self) -> usize {
    self.planes[0].cfg.height
  }

  /// Number of live handles to a shared image.
  #[inline]
  pub fn refcount(this: &Arc<Self>) -> usize {
    Arc::strong_count(this)
  }

  /// Replicates the edges of every plane into its padding.
  ///
  /// Luma is expanded by `luma_exp` samples, chroma by the same amount
  /// scaled down by the subsampling of each axis.
  pub fn expand(&mut self, luma_exp: usize) {
    for plane in self.planes.iter_mut() {
      let hexp = luma_exp >> plane.cfg.xdec;
      let vexp = luma_exp >> plane.cfg.ydec;
      plane.expand(hexp, vexp);
    }
  }

  /// Copies the content of `src` into this image.
  ///
  /// Images of the same bit depth are copied row by row over their aligned
  /// areas. Otherwise each sample of the visible area is shifted to the
  /// destination depth, narrowing with rounding and clipping. Crop offsets,
  /// visible dimensions and timestamps follow the source.
  pub fn copy_from<U: Pixel>(&mut self, src: &ImageBuffer<U>) {
    let same_depth = src.bit_depth == self.bit_depth;
    for (dst, s) in self.planes.iter_mut().zip(src.planes.iter()) {
      let (w, h) = if same_depth {
        (
          s.cfg.aligned_width.min(dst.cfg.aligned_width),
          s.cfg.aligned_height.min(dst.cfg.aligned_height),
        )
      } else {
        (
          s.cfg.width.min(dst.cfg.aligned_width),
          s.cfg.height.min(dst.cfg.aligned_height),
        )
      };
      dst.copy_converted(s, w, h, src.bit_depth, self.bit_depth);
      dst.cfg.width = s.cfg.width.min(dst.cfg.aligned_width);
      dst.cfg.height = s.cfg.height.min(dst.cfg.aligned_height);
    }
    self.crop = src.crop;
    self.ts = src.ts;
  }
}
