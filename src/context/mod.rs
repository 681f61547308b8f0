// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Block-grid addressing and the neighbour availability rules a coding unit
//! is predicted under.

mod block_unit;
pub use block_unit::*;

mod availability;
pub use availability::*;

#[cfg(test)]
pub(crate) use availability::test;
