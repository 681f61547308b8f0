// Copyright (c) 2020-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Padded picture planes and the reference-counted image buffers built on
//! top of them.

pub mod image;
pub mod math;
pub mod pixel;
pub mod plane;

mod serialize {
  cfg_if::cfg_if! {
     if #[cfg(feature="serialize")] {
       pub use serde::*;
      } else {
        pub use noop_proc_macro::{Deserialize, Serialize};
     }
  }
}

pub mod prelude {
  pub use crate::image::*;
  pub use crate::math::*;
  pub use crate::pixel::*;
  pub use crate::plane::*;
}
