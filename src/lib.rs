// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Frame orchestration for a block-based video encoder.
//!
//! The crate decides which input frame is coded next and in what temporal
//! role ([`gop`]), manages reconstructed and reference pictures
//! ([`frame`], [`reference`]), and derives the neighbour availability and
//! motion vector predictors a coding unit may use ([`context`],
//! [`mvpred`]). Entropy coding, mode decision and filter math are left to
//! collaborators plugged in through [`api::PictureCoder`] and
//! [`deblock::Deblocker`].

#![deny(bare_trait_objects)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_arguments)]
#![warn(clippy::needless_range_loop)]
#![warn(missing_debug_implementations)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

#[macro_use]
extern crate log;

mod serialize {
  cfg_if::cfg_if! {
    if #[cfg(feature="serialize")] {
      pub use serde::*;
    } else {
      pub use noop_proc_macro::{Deserialize, Serialize};
    }
  }
}

pub mod util;

/// Encoder API
pub mod api;
pub mod context;
pub mod deblock;
pub mod frame;
pub mod gop;
pub mod mc;
pub mod mvpred;
pub mod reference;
pub mod scan;
pub mod tiling;

pub use crate::api::{
  CodingPicture, Config, Context, EncodedPicture, EncoderConfig,
  EncoderStatus, InvalidConfig, PictureCoder, PictureStats, SliceType,
};
pub use crate::frame::Picture;
pub use crate::util::{CastFromPrimitive, ChromaSampling, Pixel, PixelType};
pub use picbuf::image::ImageBuffer;

/// Commonly used types and traits.
pub mod prelude {
  pub use crate::api::*;
  pub use crate::context::*;
  pub use crate::deblock::*;
  pub use crate::frame::*;
  pub use crate::gop::*;
  pub use crate::mc::MotionVector;
  pub use crate::mvpred::*;
  pub use crate::reference::*;
  pub use crate::tiling::*;
  pub use crate::util::*;
  pub use picbuf::image::ImageBuffer;
}
