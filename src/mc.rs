// Copyright (c) 2019-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::ops;

/// Motion vector; `col` is the horizontal component and `row` the vertical
/// one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MotionVector {
  pub row: i16,
  pub col: i16,
}

impl MotionVector {
  /// Placeholder predictor for unavailable neighbours.
  pub const UNAVAILABLE: MotionVector = MotionVector { row: 1, col: 1 };

  #[inline]
  pub const fn new(col: i16, row: i16) -> Self {
    MotionVector { row, col }
  }

  /// Scales by `num / den` with truncating division.
  ///
  /// Returns the zero vector when `den` is 0.
  #[inline]
  pub fn scale(self, num: i32, den: i32) -> Self {
    if den == 0 {
      return MotionVector::default();
    }
    let scale = |v: i16| {
      let s = num as i64 * v as i64 / den as i64;
      s.clamp(i16::MIN as i64, i16::MAX as i64) as i16
    };
    MotionVector { row: scale(self.row), col: scale(self.col) }
  }
}

impl ops::Neg for MotionVector {
  type Output = MotionVector;

  #[inline]
  fn neg(self) -> MotionVector {
    MotionVector { row: self.row.wrapping_neg(), col: self.col.wrapping_neg() }
  }
}
