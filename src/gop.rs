// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Picture type and picture order count decisions.
//!
//! Input frames arrive in display order and are coded in a hierarchical
//! order: the last frame of each group of pictures (GOP) first, then the
//! frames between it and the previous anchor, split in halves layer by
//! layer.

use crate::api::{EncoderStatus, SliceType};

/// Scheduling parameters, derived from the encoder configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GopConfig {
  /// Number of frames between two anchors; the GOP size is one more.
  pub max_b_frames: u32,
  /// Distance between intra pictures, 0 for a single intra picture.
  pub i_period: u32,
  /// Dyadic temporal layering of the GOP interior.
  pub hierarchical: bool,
  /// Every intra picture starts a new picture order count sequence.
  pub closed_gop: bool,
  /// Low delay layering period when no frames are reordered.
  pub ref_pic_gap_length: u32,
  /// Slice type of inter pictures.
  pub inter_slice_type: SliceType,
  /// Frames kept ahead of the coded one.
  pub lookahead: u32,
}

impl Default for GopConfig {
  fn default() -> Self {
    GopConfig {
      max_b_frames: 15,
      i_period: 0,
      hierarchical: true,
      closed_gop: false,
      ref_pic_gap_length: 1,
      inter_slice_type: SliceType::B,
      lookahead: 0,
    }
  }
}

impl GopConfig {
  #[inline]
  pub const fn gop_size(&self) -> u32 {
    self.max_b_frames + 1
  }

  /// Number of input frames buffered for reordering. Without lookahead
  /// this is `1 + 2 * max_b_frames`.
  pub fn ring_capacity(&self) -> usize {
    if self.gop_size() == 1 && self.i_period != 1 {
      1
    } else {
      let window = (self.frame_delay() as usize).max(self.gop_size() as usize);
      self.max_b_frames as usize + window
    }
  }

  /// Frames that must be pushed before the first picture is coded.
  pub fn frame_delay(&self) -> u64 {
    if self.max_b_frames > 0 {
      (self.max_b_frames + 1).max(self.lookahead) as u64
    } else {
      0
    }
  }
}

/// Temporal layer of the interior picture at `pos` (0-based, the anchor
/// excluded) of a hierarchical GOP.
#[inline]
pub const fn interior_depth(pos: u32) -> u8 {
  2 + (pos + 1).ilog2() as u8
}

/// Deepest interior layer of a GOP of `gop_size` pictures. Pictures on that
/// layer are never referenced.
#[inline]
pub const fn max_interior_depth(gop_size: u32) -> u8 {
  if gop_size < 2 {
    return 0;
  }
  interior_depth(gop_size - 2)
}

/// Layer of the `m`-th inter picture after an intra picture in low delay
/// mode, repeating every `gap` pictures.
#[inline]
pub fn low_delay_depth(m: u64, gap: u32) -> u8 {
  let gap = gap.max(1) as u64;
  let k = ((m.max(1) - 1) % gap) + 1;
  1 + gap.ilog2() as u8 - k.trailing_zeros() as u8
}

/// Temporal id a decoding order offset in a sub-GOP maps to.
#[inline]
const fn temporal_id_of_offset(doc_offset: u32) -> u8 {
  if doc_offset == 0 {
    0
  } else {
    1 + doc_offset.ilog2() as u8
  }
}

/// Picture order count state carried between decisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PocState {
  pub poc_val: i32,
  pub prev_poc_val: i32,
  pub prev_doc_offset: u32,
  pub prev_idr_poc: i32,
}

impl PocState {
  #[inline]
  fn anchor(&mut self, poc: i32) {
    self.poc_val = poc;
    self.prev_poc_val = poc;
    self.prev_doc_offset = 0;
  }

  /// Assigns the picture order count of the next picture of temporal layer
  /// `tid` within a sub-GOP of `sub_gop` pictures.
  ///
  /// The decoding order offset walks forward from the previous one until
  /// it lands on an offset of layer `tid`; the picture is then placed at
  /// the matching dyadic position relative to the last anchor.
  pub fn derive(&mut self, sub_gop: u32, tid: u8) {
    debug_assert!(sub_gop.is_power_of_two());
    let step = sub_gop as i32;

    if tid == 0 {
      let poc = self.prev_poc_val + step;
      self.anchor(poc);
      return;
    }

    let mut doc_offset = (self.prev_doc_offset + 1) % sub_gop;
    if doc_offset == 0 {
      self.prev_poc_val += step;
    }
    let mut expected = temporal_id_of_offset(doc_offset);
    let mut steps = 0;
    while expected != tid && steps < sub_gop {
      doc_offset = (doc_offset + 1) % sub_gop;
      expected = temporal_id_of_offset(doc_offset);
      steps += 1;
    }
    debug_assert_eq!(expected, tid, "no layer {} offset in {}", tid, sub_gop);

    let offset = sub_gop as f64
      * ((2.0 * doc_offset as f64 + 1.0) / (1u32 << tid) as f64 - 2.0);
    self.poc_val = self.prev_poc_val + offset as i32;
    self.prev_doc_offset = doc_offset;
  }
}

/// Where and how the next picture is coded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PictureDecision {
  pub slice_type: SliceType,
  pub depth: u8,
  pub temporal_id: u8,
  /// Picture order count as signalled, relative to the last IDR picture in
  /// closed GOP mode.
  pub poc: i32,
  /// Position of the picture in the input stream.
  pub display_index: u64,
  /// Position of the picture in coding order.
  pub coding_index: u64,
  pub is_ref: bool,
  pub is_idr: bool,
  /// Input ring slot holding the original frame.
  pub ring_slot: usize,
}

#[derive(Clone, Copy, Debug)]
struct SlotDecision {
  slice_type: SliceType,
  depth: u8,
  is_ref: bool,
}

impl SlotDecision {
  const INTRA: SlotDecision =
    SlotDecision { slice_type: SliceType::I, depth: 0, is_ref: true };
}

/// Chooses the input frame coded next, its slice type, temporal layer and
/// picture order count.
#[derive(Clone, Debug)]
pub struct GopScheduler {
  cfg: GopConfig,
  poc: PocState,
  /// Pictures coded so far.
  pic_cnt: u64,
  /// Frames pushed so far.
  pushed: u64,
  /// Forced output slots already consumed by the final partial GOP.
  force_ignored: u32,
  flushing: bool,
}

impl GopScheduler {
  pub fn new(cfg: GopConfig) -> Self {
    debug_assert!(cfg.gop_size().is_power_of_two());
    GopScheduler {
      cfg,
      poc: PocState::default(),
      pic_cnt: 0,
      pushed: 0,
      force_ignored: 0,
      flushing: false,
    }
  }

  #[inline]
  pub const fn config(&self) -> &GopConfig {
    &self.cfg
  }

  #[inline]
  pub const fn poc_state(&self) -> &PocState {
    &self.poc
  }

  #[inline]
  pub const fn pictures_coded(&self) -> u64 {
    self.pic_cnt
  }

  #[inline]
  pub const fn frames_pushed(&self) -> u64 {
    self.pushed
  }

  #[inline]
  pub const fn is_flushing(&self) -> bool {
    self.flushing
  }

  /// Accounts for a new input frame and returns its display index.
  pub fn push(&mut self) -> Result<u64, EncoderStatus> {
    if self.flushing {
      return Err(EncoderStatus::EnoughData);
    }
    let idx = self.pushed;
    self.pushed += 1;
    Ok(idx)
  }

  /// No more frames will be pushed; remaining frames are forced out.
  pub fn flush(&mut self) {
    self.flushing = true;
  }

  /// Whether enough frames were pushed for the next decision.
  pub fn ready(&self) -> bool {
    if self.pushed <= self.pic_cnt {
      return false;
    }
    self.flushing
      || (self.pushed > self.pic_cnt + self.cfg.max_b_frames as u64
        && self.pushed >= self.pic_cnt + self.cfg.frame_delay())
  }

  /// Whether every pushed frame has been coded after a flush.
  pub fn is_drained(&self) -> bool {
    self.flushing && self.pic_cnt >= self.pushed
  }

  /// Marks the last decided picture as coded.
  pub fn finish_picture(&mut self) {
    self.pic_cnt += 1;
  }

  fn decide_normal_gop(&mut self, n: u64) -> SlotDecision {
    let g = self.cfg.gop_size() as u64;
    let i_period = self.cfg.i_period as u64;

    if (i_period == 0 && n == 0) || (i_period != 0 && n % i_period == 0) {
      self.poc.anchor(n as i32);
      return SlotDecision::INTRA;
    }

    let slice_type = self.cfg.inter_slice_type;
    if n % g == 0 {
      self.poc.anchor(n as i32);
      return SlotDecision { slice_type, depth: 1, is_ref: true };
    }

    let pos = (n % g) as u32 - 1;
    if self.cfg.hierarchical {
      let depth = interior_depth(pos);
      self.poc.derive(g as u32, depth - 1);
      let is_ref = depth != max_interior_depth(g as u32);
      SlotDecision { slice_type, depth, is_ref }
    } else {
      self.poc.poc_val = ((n / g) * g) as i32 - g as i32 + pos as i32 + 1;
      SlotDecision { slice_type, depth: 2, is_ref: false }
    }
  }

  fn decide_low_delay(&mut self, n: u64) -> SlotDecision {
    let i_period = self.cfg.i_period as u64;
    let pic_cnt = self.pic_cnt;

    if i_period == 1 {
      self.poc.poc_val = n as i32;
      return SlotDecision { is_ref: false, ..SlotDecision::INTRA };
    }

    let m = if i_period > 0 { n % i_period } else { n };
    let slot = if m == 0 {
      SlotDecision::INTRA
    } else {
      let depth = if self.cfg.hierarchical {
        low_delay_depth(m, self.cfg.ref_pic_gap_length)
      } else {
        1
      };
      let slice_type = self.cfg.inter_slice_type;
      SlotDecision { slice_type, depth, is_ref: true }
    };

    self.poc.poc_val = if self.cfg.closed_gop && i_period > 0 {
      (pic_cnt % i_period) as i32
    } else {
      pic_cnt as i32
    };
    slot
  }

  /// Decides the next picture to code. Call only when [`ready`] holds, and
  /// follow with [`finish_picture`] once the picture is coded.
  ///
  /// [`ready`]: #method.ready
  /// [`finish_picture`]: #method.finish_picture
  pub fn decide(&mut self) -> PictureDecision {
    debug_assert!(self.ready());

    let g = self.cfg.gop_size() as u64;
    let n = self.pic_cnt + self.cfg.max_b_frames as u64;

    let (slot, display_index) = if g == 1 {
      (self.decide_low_delay(n), n)
    } else if n == g - 1 {
      self.poc.anchor(0);
      (SlotDecision::INTRA, 0)
    } else {
      let last = self.pushed.saturating_sub(1);
      let remaining = last + 1 - self.pic_cnt.min(last + 1);
      let slot = if self.flushing && last % g >= remaining {
        self.decide_forced(n, last)
      } else {
        self.decide_normal_gop(n)
      };
      (slot, self.poc.poc_val.max(0) as u64)
    };

    let is_idr = slot.slice_type == SliceType::I && self.cfg.closed_gop;
    if is_idr {
      self.poc.prev_idr_poc = self.poc.poc_val;
    }

    let temporal_id = if self.cfg.hierarchical && g > 1 {
      slot.depth - (slot.depth > 0) as u8
    } else {
      0
    };
    let poc = if g > 1 {
      self.poc.poc_val - self.poc.prev_idr_poc
    } else {
      self.poc.poc_val
    };

    let decision = PictureDecision {
      slice_type: slot.slice_type,
      depth: slot.depth,
      temporal_id,
      poc,
      display_index,
      coding_index: self.pic_cnt,
      is_ref: slot.is_ref,
      is_idr,
      ring_slot: (display_index % self.cfg.ring_capacity() as u64) as usize,
    };
    debug!(
      "picture {}: {} frame {} poc {} depth {} tid {} ref {} slot {}",
      decision.coding_index,
      decision.slice_type,
      decision.display_index,
      decision.poc,
      decision.depth,
      decision.temporal_id,
      decision.is_ref,
      decision.ring_slot
    );
    decision
  }

  /// Walks the slots of the final partial GOP until one falls on a frame
  /// that was actually pushed. Rejected slots still advance the picture
  /// order count state.
  fn decide_forced(&mut self, n: u64, last: u64) -> SlotDecision {
    let g = self.cfg.gop_size();
    let mut force_cnt = self.force_ignored;
    let mut found = None;
    while force_cnt < g {
      let slot = self.decide_normal_gop(n + force_cnt as u64);
      if self.poc.poc_val as i64 <= last as i64 {
        found = Some(slot);
        break;
      }
      force_cnt += 1;
    }
    self.force_ignored = force_cnt;

    match found {
      Some(slot) => slot,
      None => {
        warn!("no pushed frame left in the final GOP after frame {}", last);
        self.decide_normal_gop(n)
      }
    }
  }
}
