// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use num_traits::PrimInt;
use std::mem::size_of;

pub trait Fixed {
  fn floor_log2(&self, n: usize) -> usize;
  fn ceil_log2(&self, n: usize) -> usize;
  fn align_power_of_two(&self, n: usize) -> usize;
  fn align_power_of_two_and_shift(&self, n: usize) -> usize;
}

impl Fixed for usize {
  #[inline]
  fn floor_log2(&self, n: usize) -> usize {
    self & !((1 << n) - 1)
  }
  #[inline]
  fn ceil_log2(&self, n: usize) -> usize {
    (self + (1 << n) - 1).floor_log2(n)
  }
  #[inline]
  fn align_power_of_two(&self, n: usize) -> usize {
    self.ceil_log2(n)
  }
  #[inline]
  fn align_power_of_two_and_shift(&self, n: usize) -> usize {
    (self + (1 << n) - 1) >> n
  }
}

pub fn clamp<T: PartialOrd>(input: T, min: T, max: T) -> T {
  if input < min {
    min
  } else if input > max {
    max
  } else {
    input
  }
}

/// Number of bits needed to represent `v`, 0 for 0.
#[inline(always)]
pub fn bit_length<T: PrimInt>(v: T) -> usize {
  size_of::<T>() * 8 - v.leading_zeros() as usize
}

/// Largest sample value representable with `bit_depth` bits.
#[inline(always)]
pub const fn max_sample(bit_depth: usize) -> u32 {
  (1 << bit_depth) - 1
}

/// Rounded right shift used when narrowing sample bit depth.
#[inline(always)]
pub const fn round_shift(value: u32, bit: usize) -> u32 {
  if bit == 0 {
    value
  } else {
    (value + (1 << (bit - 1))) >> bit
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn align_and_shift() {
    assert_eq!(13usize.align_power_of_two(2), 16);
    assert_eq!(16usize.align_power_of_two(2), 16);
    assert_eq!(13usize.align_power_of_two_and_shift(2), 4);
    assert_eq!(1usize.align_power_of_two_and_shift(2), 1);
  }

  #[test]
  fn bit_length_of_small_values() {
    assert_eq!(bit_length(0u32), 0);
    assert_eq!(bit_length(1u32), 1);
    assert_eq!(bit_length(8u32), 4);
    assert_eq!(bit_length(15usize), 4);
  }

  #[test]
  fn round_shift_rounds_half_up() {
    assert_eq!(round_shift(2, 2), 1);
    assert_eq!(round_shift(1, 2), 0);
    assert_eq!(round_shift(1023, 2), 256);
    assert_eq!(round_shift(7, 0), 7);
    assert_eq!(max_sample(8), 255);
    assert_eq!(max_sample(10), 1023);
  }
}
