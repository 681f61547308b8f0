// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Loop filter scheduling over the tiles of a picture.

use std::convert::Infallible;
use std::fmt;

use rayon::ThreadPool;

use crate::api::SliceType;
use crate::context::*;
use crate::frame::Picture;
use crate::mc::MotionVector;
use crate::tiling::*;
use crate::util::Pixel;

/// Per-picture loop filter switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeblockParams {
  pub enabled: bool,
  /// Filter the edges lying on tile boundaries in a second pass.
  pub across_tiles: bool,
}

/// Coding decisions of the picture the filter strength derives from.
#[derive(Clone, Copy, Debug)]
pub struct DeblockInput<'a> {
  pub status: &'a StatusMap,
  pub refi: &'a BlockMap<[i8; 2]>,
  pub mv: &'a BlockMap<[MotionVector; 2]>,
  pub slice_type: SliceType,
  pub qp: u8,
  pub bit_depth: usize,
}

/// Edge filter kernels.
pub trait Deblocker<T: Pixel>: Sync {
  type Error: fmt::Debug + fmt::Display + Send;

  /// Filters the edges inside `tile`, leaving those on its boundary alone.
  /// Called concurrently for disjoint tiles.
  fn filter_tile(
    &self, tile: &mut TileMut<'_, T>, input: &DeblockInput<'_>,
  ) -> Result<(), Self::Error>;

  /// Filters the edges on the boundary of the tile at `rect`. `frame`
  /// spans the whole picture.
  fn filter_tile_boundary(
    &self, frame: &mut TileMut<'_, T>, rect: TileRect,
    input: &DeblockInput<'_>,
  ) -> Result<(), Self::Error>;
}

/// Leaves the reconstruction untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDeblock;

impl<T: Pixel> Deblocker<T> for NoDeblock {
  type Error = Infallible;

  fn filter_tile(
    &self, _tile: &mut TileMut<'_, T>, _input: &DeblockInput<'_>,
  ) -> Result<(), Infallible> {
    Ok(())
  }

  fn filter_tile_boundary(
    &self, _frame: &mut TileMut<'_, T>, _rect: TileRect,
    _input: &DeblockInput<'_>,
  ) -> Result<(), Infallible> {
    Ok(())
  }
}

/// Runs the loop filter over `pic`.
///
/// Tiles are filtered in parallel and every one of them runs even when a
/// sibling fails. Tile boundaries are then filtered one tile after the
/// other, stopping at the first failure.
#[profiling::function]
pub fn loop_filter<T: Pixel, D: Deblocker<T>>(
  pool: Option<&ThreadPool>, deblocker: &D, pic: &mut Picture<T>,
  status: &StatusMap, tiling: &TilingInfo, params: DeblockParams,
  slice_type: SliceType, qp: u8,
) -> Result<(), TileError<D::Error>> {
  if !params.enabled {
    return Ok(());
  }

  let Picture { recon, refi, mv, .. } = pic;
  let input = DeblockInput {
    status,
    refi,
    mv,
    slice_type,
    qp,
    bit_depth: recon.bit_depth,
  };

  let tiles: Vec<_> = tiling.tile_iter_mut(recon).collect();
  run_tile_pass(pool, tiles, |_, mut tile| {
    deblocker.filter_tile(&mut tile, &input)
  })?;

  if params.across_tiles {
    let mut frame = TileMut::whole(recon);
    for tile in 0..tiling.tile_count() {
      deblocker
        .filter_tile_boundary(&mut frame, tiling.tile_rect(tile), &input)
        .map_err(|error| TileError { tile, error })?;
    }
  }

  Ok(())
}
