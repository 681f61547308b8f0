// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.
#![deny(missing_docs)]

use crate::frame::Picture;
use crate::serialize::{Deserialize, Serialize};
use crate::util::{AllocError, Pixel};

use std::fmt;
use std::sync::Arc;

use thiserror::*;

/// Possible types of a slice.
#[derive(
  Debug, Default, Eq, PartialEq, Clone, Copy, Hash, Serialize, Deserialize,
)]
#[repr(C)]
pub enum SliceType {
  /// Intra slice, no temporal reference.
  I,
  /// Predicted from list 0 only.
  P,
  /// Bi-predicted from lists 0 and 1.
  #[default]
  B,
}

impl SliceType {
  /// Returns whether the slice carries only intra blocks.
  #[inline]
  pub fn is_intra(self) -> bool {
    self == SliceType::I
  }

  /// Returns whether the slice may reference list 1.
  #[inline]
  pub fn has_l1(self) -> bool {
    self == SliceType::B
  }
}

impl fmt::Display for SliceType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    use self::SliceType::*;
    match self {
      I => write!(f, "I slice"),
      P => write!(f, "P slice"),
      B => write!(f, "B slice"),
    }
  }
}

/// Status that can be returned by [`Context`] functions.
///
/// [`Context`]: struct.Context.html
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum EncoderStatus {
  /// The encoder needs more frames before the next picture can be coded.
  ///
  /// May be emitted by [`Context::encode_picture()`] while the frame delay
  /// is not satisfied.
  ///
  /// [`Context::encode_picture()`]: struct.Context.html#method.encode_picture
  #[error("need more data")]
  NeedMoreData,
  /// The input ring cannot take another frame.
  ///
  /// May be emitted by [`Context::send_frame()`] when the ring slot of the
  /// frame is still in use, or when a frame is sent after a flush.
  ///
  /// [`Context::send_frame()`]: struct.Context.html#method.send_frame
  #[error("enough data")]
  EnoughData,
  /// Every frame sent before the flush has been coded.
  #[error("limit reached")]
  LimitReached,
  /// A picture was coded.
  #[error("encoded")]
  Encoded,
  /// A buffer, map or pool slot could not be allocated.
  #[error("out of memory")]
  OutOfMemory,
  /// Generic fatal error, raised by a collaborator or a broken invariant.
  #[error("failure")]
  Failure,
}

impl From<AllocError> for EncoderStatus {
  fn from(_: AllocError) -> Self {
    EncoderStatus::OutOfMemory
  }
}

/// Statistics of a coded picture.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureStats {
  /// Slice type the picture was coded with.
  pub slice_type: SliceType,
  /// Coding order index.
  pub coding_index: u64,
  /// Picture order count as signalled.
  pub poc: i32,
  /// Temporal layer.
  pub temporal_id: u8,
  /// Quantizer the picture was coded with.
  pub qp: u8,
  /// Whether the picture was kept as a reference.
  pub is_ref: bool,
  /// Picture order counts of the references, per list.
  pub ref_pocs: [Vec<i32>; 2],
}

/// A coded picture returned by [`Context::encode_picture()`].
///
/// [`Context::encode_picture()`]: struct.Context.html#method.encode_picture
#[derive(Debug)]
pub struct EncodedPicture<T: Pixel> {
  /// The reconstruction, shared with the reference pool.
  pub recon: Arc<Picture<T>>,
  /// Statistics of the picture.
  pub stats: PictureStats,
  /// Timestamps carried over from the input frame.
  pub ts: [u64; 4],
}

impl<T: Pixel> fmt::Display for EncodedPicture<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Picture {} - {} - poc {} - tid {} - qp {}",
      self.stats.coding_index,
      self.stats.slice_type,
      self.stats.poc,
      self.stats.temporal_id,
      self.stats.qp,
    )
  }
}
