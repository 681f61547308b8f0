// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::serialize::{Deserialize, Serialize};

use num_derive::FromPrimitive;
use num_traits::{AsPrimitive, FromPrimitive, PrimInt};

use std::fmt;
use std::fmt::{Debug, Display};
use std::mem::size_of;

/// Trait for casting between primitive types.
pub trait CastFromPrimitive<T>: Copy + 'static {
  /// Casts the given value into `Self`.
  fn cast_from(v: T) -> Self;
}

macro_rules! impl_cast_from_primitive {
  ( $T:ty => $U:ty ) => {
    impl CastFromPrimitive<$U> for $T {
      #[inline(always)]
      fn cast_from(v: $U) -> Self { v as Self }
    }
  };
  ( $T:ty => { $( $U:ty ),* } ) => {
    $( impl_cast_from_primitive!($T => $U); )*
  };
}

// casts to { u8, u16 } are implemented separately using Pixel, so that the
// compiler understands that CastFromPrimitive<T: Pixel> is always implemented
impl_cast_from_primitive!(u8 => { u32, u64, usize });
impl_cast_from_primitive!(u16 => { u32, u64, usize });
impl_cast_from_primitive!(i32 => { u32, u64, usize });

pub trait RegisteredPrimitive:
  PrimInt
  + AsPrimitive<u8>
  + AsPrimitive<u16>
  + AsPrimitive<i32>
  + AsPrimitive<u32>
  + CastFromPrimitive<u8>
  + CastFromPrimitive<u16>
  + CastFromPrimitive<i32>
  + CastFromPrimitive<u32>
{
}

impl RegisteredPrimitive for u8 {}
impl RegisteredPrimitive for u16 {}
impl RegisteredPrimitive for i32 {}

macro_rules! impl_cast_from_pixel_to_primitive {
  ( $T:ty ) => {
    impl<T: RegisteredPrimitive> CastFromPrimitive<T> for $T {
      #[inline(always)]
      fn cast_from(v: T) -> Self {
        v.as_()
      }
    }
  };
}

impl_cast_from_pixel_to_primitive!(u8);
impl_cast_from_pixel_to_primitive!(u16);
impl_cast_from_pixel_to_primitive!(i32);

/// Storage width of a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelType {
  /// Up to 8 bits per sample, stored in a `u8`.
  U8,
  /// Up to 16 bits per sample, stored in a `u16`.
  U16,
}

/// A type that can be used as a sample type.
pub trait Pixel:
  RegisteredPrimitive
  + Into<u32>
  + Into<i32>
  + Debug
  + Display
  + Default
  + Send
  + Sync
  + 'static
{
  /// Returns a [`PixelType`] variant corresponding to this type.
  fn type_enum() -> PixelType;

  /// Widest bit depth this storage type can carry.
  #[inline]
  fn max_bit_depth() -> usize {
    8 * size_of::<Self>()
  }
}

impl Pixel for u8 {
  #[inline]
  fn type_enum() -> PixelType {
    PixelType::U8
  }
}

impl Pixel for u16 {
  #[inline]
  fn type_enum() -> PixelType {
    PixelType::U16
  }
}

/// Chroma subsampling format.
///
/// The discriminants match the `chroma_format_idc` signalled in sequence
/// headers.
#[derive(
  Copy,
  Clone,
  Debug,
  Default,
  PartialEq,
  Eq,
  FromPrimitive,
  Serialize,
  Deserialize,
)]
#[repr(C)]
pub enum ChromaSampling {
  /// Monochrome.
  Cs400 = 0,
  /// Both vertically and horizontally subsampled.
  #[default]
  Cs420 = 1,
  /// Horizontally subsampled.
  Cs422 = 2,
  /// Not subsampled.
  Cs444 = 3,
}

impl fmt::Display for ChromaSampling {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(
      f,
      "{}",
      match self {
        ChromaSampling::Cs420 => "4:2:0",
        ChromaSampling::Cs422 => "4:2:2",
        ChromaSampling::Cs444 => "4:4:4",
        ChromaSampling::Cs400 => "Monochrome",
      }
    )
  }
}

impl ChromaSampling {
  /// Looks up the format for a `chroma_format_idc` value.
  pub fn from_format_idc(idc: u8) -> Option<Self> {
    Self::from_u8(idc)
  }

  /// Provides the amount to right shift the luma plane dimensions to get the
  ///  chroma plane dimensions.
  /// Only values 0 or 1 are ever returned.
  /// Cs400 returns None, as there are no chroma planes.
  pub fn get_decimation(self) -> Option<(usize, usize)> {
    use self::ChromaSampling::*;
    match self {
      Cs420 => Some((1, 1)),
      Cs422 => Some((1, 0)),
      Cs444 => Some((0, 0)),
      Cs400 => None,
    }
  }

  /// Calculates the size of a chroma plane for this sampling type, given the
  /// luma plane dimensions. Odd luma sizes round up.
  pub fn get_chroma_dimensions(
    self, luma_width: usize, luma_height: usize,
  ) -> (usize, usize) {
    if let Some((ss_x, ss_y)) = self.get_decimation() {
      ((luma_width + ss_x) >> ss_x, (luma_height + ss_y) >> ss_y)
    } else {
      (0, 0)
    }
  }

  /// Number of planes an image in this format carries.
  pub const fn plane_count(self) -> usize {
    match self {
      ChromaSampling::Cs400 => 1,
      _ => 3,
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn format_idc_round_trips_to_sampling() {
    assert_eq!(ChromaSampling::from_format_idc(0), Some(ChromaSampling::Cs400));
    assert_eq!(ChromaSampling::from_format_idc(1), Some(ChromaSampling::Cs420));
    assert_eq!(ChromaSampling::from_format_idc(3), Some(ChromaSampling::Cs444));
    assert_eq!(ChromaSampling::from_format_idc(4), None);
  }

  #[test]
  fn chroma_dimensions_round_up() {
    assert_eq!(ChromaSampling::Cs420.get_chroma_dimensions(17, 9), (9, 5));
    assert_eq!(ChromaSampling::Cs422.get_chroma_dimensions(17, 9), (9, 9));
    assert_eq!(ChromaSampling::Cs444.get_chroma_dimensions(17, 9), (17, 9));
    assert_eq!(ChromaSampling::Cs400.get_chroma_dimensions(17, 9), (0, 0));
    assert_eq!(ChromaSampling::Cs400.plane_count(), 1);
    assert_eq!(ChromaSampling::Cs422.plane_count(), 3);
  }

  #[test]
  fn storage_depth() {
    assert_eq!(u8::max_bit_depth(), 8);
    assert_eq!(u16::max_bit_depth(), 16);
    assert_eq!(u16::type_enum(), PixelType::U16);
  }
}
