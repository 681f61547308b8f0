// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Coefficient scan orders, built on first use and shared afterwards.

use std::sync::OnceLock;

use crate::context::MAX_CU_LOG2;

/// Smallest block side covered by the tables, as log2.
pub const MIN_SCAN_LOG2: usize = 1;
/// Largest block side covered by the tables, as log2.
pub const MAX_SCAN_LOG2: usize = MAX_CU_LOG2 - 1;

const NUM_SCAN_SIZES: usize = MAX_SCAN_LOG2 - MIN_SCAN_LOG2 + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScanType {
  ZigZag,
}

/// Scan order of a block and its inverse.
#[derive(Debug)]
pub struct ScanTable {
  /// Raster position of the `i`-th scanned coefficient.
  pub scan: Box<[u16]>,
  /// Scan position of each raster position.
  pub inverse: Box<[u16]>,
}

type Tables = [[ScanTable; NUM_SCAN_SIZES]; NUM_SCAN_SIZES];

static ZIGZAG: OnceLock<Tables> = OnceLock::new();

/// Zig-zag over anti-diagonals, starting at the top-left corner and
/// flipping direction on every diagonal. Odd diagonals run from top-right
/// to bottom-left.
fn zigzag(width: usize, height: usize) -> Vec<u16> {
  let mut scan = Vec::with_capacity(width * height);
  scan.push(0);

  for line in 1..width + height - 1 {
    if line % 2 == 1 {
      let mut x = line.min(width - 1) as isize;
      let mut y = line.saturating_sub(width - 1);
      while x >= 0 && y < height {
        scan.push((y * width + x as usize) as u16);
        x -= 1;
        y += 1;
      }
    } else {
      let mut y = line.min(height - 1) as isize;
      let mut x = line.saturating_sub(height - 1);
      while y >= 0 && x < width {
        scan.push((y as usize * width + x) as u16);
        x += 1;
        y -= 1;
      }
    }
  }

  scan
}

fn build(width: usize, height: usize) -> ScanTable {
  let scan = zigzag(width, height);
  let mut inverse = vec![0u16; scan.len()];
  for (pos, &raster) in scan.iter().enumerate() {
    inverse[raster as usize] = pos as u16;
  }
  ScanTable {
    scan: scan.into_boxed_slice(),
    inverse: inverse.into_boxed_slice(),
  }
}

/// Scan table of a `1 << log2w` x `1 << log2h` block.
///
/// Sizes outside `MIN_SCAN_LOG2..=MAX_SCAN_LOG2` are clamped into range.
pub fn scan_table(
  scan_type: ScanType, log2w: usize, log2h: usize,
) -> &'static ScanTable {
  debug_assert!((MIN_SCAN_LOG2..=MAX_SCAN_LOG2).contains(&log2w));
  debug_assert!((MIN_SCAN_LOG2..=MAX_SCAN_LOG2).contains(&log2h));

  let tables = match scan_type {
    ScanType::ZigZag => ZIGZAG.get_or_init(|| {
      std::array::from_fn(|x| {
        std::array::from_fn(|y| {
          build(1 << (x + MIN_SCAN_LOG2), 1 << (y + MIN_SCAN_LOG2))
        })
      })
    }),
  };

  let xi = log2w.clamp(MIN_SCAN_LOG2, MAX_SCAN_LOG2) - MIN_SCAN_LOG2;
  let yi = log2h.clamp(MIN_SCAN_LOG2, MAX_SCAN_LOG2) - MIN_SCAN_LOG2;
  &tables[xi][yi]
}
