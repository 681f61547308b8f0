// Copyright (c) 2020-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use itertools::*;

use crate::api::SliceType;
use crate::gop::GopConfig;
use crate::serialize::{Deserialize, Serialize};
use crate::util::ChromaSampling;

use std::fmt;

/// Encoder settings which impact the coded pictures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
  // output size
  /// Width of the frames in pixels.
  pub width: usize,
  /// Height of the frames in pixels.
  pub height: usize,

  // data format
  /// Bit depth.
  pub bit_depth: usize,
  /// Chroma subsampling.
  pub chroma_sampling: ChromaSampling,

  // picture structure
  /// Quantizer used for every picture unless the rate control changes it.
  pub qp: u8,
  /// Distance between intra pictures, 0 for a single intra picture.
  pub i_period: u32,
  /// Number of pictures between two anchors.
  pub max_b_frames: u32,
  /// Temporal layering period of low delay streams, 0 for the default.
  pub ref_pic_gap_length: u32,
  /// Dyadic temporal layering of the pictures between anchors.
  pub hierarchical: bool,
  /// Intra pictures restart the picture order count.
  pub closed_gop: bool,
  /// Slice type of inter pictures, P or B.
  pub inter_slice_type: SliceType,
  /// Frames kept ahead of the coded one, beyond the reordering window.
  pub lookahead: u32,
  /// Maximum number of pictures kept for reference.
  pub max_refs: usize,

  // block structure
  /// Log2 of the coding tree unit size.
  pub ctu_size_log2: usize,
  /// Number of tile columns.
  pub tile_cols: usize,
  /// Number of tile rows.
  pub tile_rows: usize,

  // coding tools
  /// Enable the loop filter.
  pub loop_filter: bool,
  /// Filter the edges lying on tile boundaries.
  pub loop_filter_across_tiles: bool,
  /// Derive mode flag contexts from the neighbours.
  pub cm_init: bool,
  /// Enable intra block copy.
  pub ibc: bool,
  /// Log2 of the largest unit predicted with intra block copy.
  pub ibc_log_max_size: usize,
  /// Enable the advanced motion vector prediction tools.
  pub admvp: bool,
}

/// Default preset for EncoderConfig: it is a balance between quality and
/// delay.
impl Default for EncoderConfig {
  fn default() -> Self {
    EncoderConfig {
      width: 640,
      height: 480,

      bit_depth: 8,
      chroma_sampling: ChromaSampling::Cs420,

      qp: 32,
      i_period: 0,
      max_b_frames: 15,
      ref_pic_gap_length: 0,
      hierarchical: true,
      closed_gop: false,
      inter_slice_type: SliceType::B,
      lookahead: 0,
      max_refs: 8,

      ctu_size_log2: 6,
      tile_cols: 1,
      tile_rows: 1,

      loop_filter: true,
      loop_filter_across_tiles: true,
      cm_init: true,
      ibc: false,
      ibc_log_max_size: 6,
      admvp: true,
    }
  }
}

impl EncoderConfig {
  /// Low delay preset: no reordering, every inter picture predicts from
  /// the past only.
  pub fn low_delay() -> Self {
    EncoderConfig {
      max_b_frames: 0,
      ref_pic_gap_length: 4,
      inter_slice_type: SliceType::P,
      ..Default::default()
    }
  }

  /// Number of pictures in a group of pictures.
  #[inline]
  pub const fn gop_size(&self) -> u32 {
    self.max_b_frames + 1
  }

  /// Scheduling parameters derived from this configuration.
  pub fn gop_config(&self) -> GopConfig {
    let ref_pic_gap_length =
      if self.max_b_frames == 0 && self.ref_pic_gap_length == 0 {
        1
      } else {
        self.ref_pic_gap_length
      };
    GopConfig {
      max_b_frames: self.max_b_frames,
      i_period: self.i_period,
      hierarchical: self.hierarchical,
      closed_gop: self.closed_gop,
      ref_pic_gap_length,
      inter_slice_type: self.inter_slice_type,
      lookahead: self.lookahead,
    }
  }

  /// Pictures the reference pool may hold: the references, the picture
  /// being coded and the ones not yet released by the caller.
  #[inline]
  pub const fn pool_capacity(&self) -> usize {
    self.max_refs + 4
  }
}

impl fmt::Display for EncoderConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let pairs = [
      ("size", format!("{}x{}", self.width, self.height)),
      ("bit_depth", self.bit_depth.to_string()),
      ("chroma_sampling", format!("{:?}", self.chroma_sampling)),
      ("qp", self.qp.to_string()),
      ("i_period", self.i_period.to_string()),
      ("max_b_frames", self.max_b_frames.to_string()),
      ("ref_pic_gap_length", self.ref_pic_gap_length.to_string()),
      ("hierarchical", self.hierarchical.to_string()),
      ("closed_gop", self.closed_gop.to_string()),
      ("inter_slice_type", format!("{:?}", self.inter_slice_type)),
      ("lookahead", self.lookahead.to_string()),
      ("max_refs", self.max_refs.to_string()),
      ("ctu_size", (1usize << self.ctu_size_log2).to_string()),
      ("tiles", format!("{}x{}", self.tile_cols, self.tile_rows)),
      ("loop_filter", self.loop_filter.to_string()),
      ("loop_filter_across_tiles", self.loop_filter_across_tiles.to_string()),
      ("ibc", self.ibc.to_string()),
    ];
    write!(
      f,
      "{}",
      pairs.iter().map(|pair| format!("{}: {}", pair.0, pair.1)).join(", ")
    )
  }
}
