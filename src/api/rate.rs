// Copyright (c) 2019-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::fmt;

use crate::api::PictureStats;
use crate::gop::PictureDecision;

/// Chooses the quantizer of every picture.
pub trait RateControl: fmt::Debug + Send {
  /// Quantizer for the picture about to be coded.
  fn qp(&self, decision: &PictureDecision) -> u8;

  /// Overrides the quantizer of the next pictures.
  fn set_qp(&mut self, qp: u8);

  /// Called once a picture is coded.
  fn update(&mut self, _stats: &PictureStats) {}
}

/// Codes every picture with the same quantizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstantQp {
  qp: u8,
}

impl ConstantQp {
  /// Creates a rate control returning `qp`.
  pub const fn new(qp: u8) -> Self {
    ConstantQp { qp }
  }
}

impl RateControl for ConstantQp {
  fn qp(&self, _decision: &PictureDecision) -> u8 {
    self.qp
  }

  fn set_qp(&mut self, qp: u8) {
    self.qp = qp;
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::api::SliceType;

  #[test]
  fn constant_qp_follows_overrides() {
    let decision = PictureDecision {
      slice_type: SliceType::B,
      depth: 3,
      temporal_id: 2,
      poc: 5,
      display_index: 5,
      coding_index: 4,
      is_ref: false,
      is_idr: false,
      ring_slot: 5,
    };
    let mut rc = ConstantQp::new(30);
    assert_eq!(rc.qp(&decision), 30);
    rc.set_qp(37);
    rc.update(&PictureStats::default());
    assert_eq!(rc.qp(&decision), 37);
  }
}
