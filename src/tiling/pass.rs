// Copyright (c) 2019-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use rayon::ThreadPool;
use thiserror::Error;

/// First failure of a tile pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tile {tile} failed: {error}")]
pub struct TileError<E: fmt::Debug + fmt::Display> {
  /// Raster index of the failing tile.
  pub tile: usize,
  pub error: E,
}

/// Runs `f` on every work item of a pass, in parallel on `pool` or on the
/// global pool when none is given.
///
/// Every item runs to completion even when a sibling fails. The error of
/// the lowest failing tile is returned once all of them are done.
pub fn run_tile_pass<I, F, E>(
  pool: Option<&ThreadPool>, items: Vec<I>, f: F,
) -> Result<(), TileError<E>>
where
  I: Send,
  F: Fn(usize, I) -> Result<(), E> + Sync + Send,
  E: fmt::Debug + fmt::Display + Send,
{
  let run = || {
    items
      .into_par_iter()
      .enumerate()
      .map(|(tile, item)| {
        f(tile, item).map_err(|error| TileError { tile, error })
      })
      .collect::<Vec<_>>()
  };
  let results = match pool {
    Some(pool) => pool.install(run),
    None => run(),
  };

  let failed = results.iter().filter(|r| r.is_err()).count();
  if failed > 1 {
    debug!("{} tiles failed in the same pass", failed);
  }
  results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
}

/// Per CTU row completion flags for wavefront processing.
///
/// The worker coding a row publishes it once its side maps are final; a
/// worker on the next row observes the flag before reading across.
#[derive(Debug, Default)]
pub struct RowSync {
  rows: Box<[AtomicBool]>,
}

impl RowSync {
  pub fn new(rows: usize) -> Self {
    RowSync { rows: (0..rows).map(|_| AtomicBool::new(false)).collect() }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.rows.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Clears every flag before a new picture.
  pub fn reset(&mut self) {
    for row in self.rows.iter_mut() {
      *row.get_mut() = false;
    }
  }

  #[inline]
  pub fn publish(&self, row: usize) {
    if let Some(flag) = self.rows.get(row) {
      flag.store(true, Ordering::Release);
    }
  }

  /// Whether `row` was published. Rows past the end read as done.
  #[inline]
  pub fn is_done(&self, row: usize) -> bool {
    self.rows.get(row).map_or(true, |flag| flag.load(Ordering::Acquire))
  }

  /// Blocks until `row` is published.
  pub fn wait(&self, row: usize) {
    while !self.is_done(row) {
      std::hint::spin_loop();
      std::thread::yield_now();
    }
  }
}
