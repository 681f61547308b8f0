// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::sync::Arc;

use crate::api::EncoderStatus;
use crate::context::MIN_CU_LOG2;
use crate::util::*;
use picbuf::image::{ImageBuffer, MAX_PLANES};

/// Upper bound on the number of input buffers alive at once.
pub const MAX_INBUF_CNT: usize = 32;

/// Recycles the buffers source frames are copied into.
///
/// A buffer is free again once the pool holds its only handle, which
/// happens when the coded picture that read it has been finished.
#[derive(Debug)]
pub struct InputPool<T: Pixel> {
  bufs: Vec<Arc<ImageBuffer<T>>>,
  width: usize,
  height: usize,
  chroma_sampling: ChromaSampling,
  bit_depth: usize,
}

impl<T: Pixel> InputPool<T> {
  pub fn new(
    width: usize, height: usize, chroma_sampling: ChromaSampling,
    bit_depth: usize,
  ) -> Self {
    InputPool {
      bufs: Vec::new(),
      width,
      height,
      chroma_sampling,
      bit_depth,
    }
  }

  /// Buffers allocated so far.
  #[inline]
  pub fn allocated(&self) -> usize {
    self.bufs.len()
  }

  /// Buffers currently held outside the pool.
  pub fn in_use(&self) -> usize {
    self.bufs.iter().filter(|b| ImageBuffer::refcount(b) > 1).count()
  }

  /// Copies `src` into a free buffer, converting its bit depth, and returns
  /// a shared handle to it.
  pub fn fill_from<U: Pixel>(
    &mut self, src: &ImageBuffer<U>,
  ) -> Result<Arc<ImageBuffer<T>>, EncoderStatus> {
    let idx = match self.bufs.iter_mut().position(|b| Arc::get_mut(b).is_some())
    {
      Some(idx) => idx,
      None => self.alloc()?,
    };

    let buf = Arc::get_mut(&mut self.bufs[idx]).ok_or(EncoderStatus::Failure)?;
    buf.copy_from(src);
    Ok(Arc::clone(&self.bufs[idx]))
  }

  fn alloc(&mut self) -> Result<usize, EncoderStatus> {
    if self.bufs.len() >= MAX_INBUF_CNT {
      warn!("all {} input buffers are in use", MAX_INBUF_CNT);
      return Err(EncoderStatus::EnoughData);
    }
    let buf = ImageBuffer::new(
      self.width,
      self.height,
      self.chroma_sampling,
      self.bit_depth,
      [0; MAX_PLANES],
      [MIN_CU_LOG2; MAX_PLANES],
    )?;
    self.bufs.push(Arc::new(buf));
    trace!("allocated input buffer {}", self.bufs.len());
    Ok(self.bufs.len() - 1)
  }
}
