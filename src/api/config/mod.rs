// Copyright (c) 2020-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use thiserror::Error;

use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

use crate::api::{Context, ContextInner};
use crate::context::MAX_CU_LOG2;
use crate::frame::{MAX_INBUF_CNT, MAX_NUM_REFS};
use crate::util::Pixel;

mod encoder;
pub use encoder::*;

pub use crate::tiling::{TilingInfo, MAX_TILES, MAX_TILE_COLS, MAX_TILE_ROWS};

/// Largest quantizer.
pub const MAX_QP: u8 = 51;
/// Largest number of worker threads.
pub const MAX_THREADS: usize = 8;

/// Enumeration of possible invalid configuration errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum InvalidConfig {
  /// The width is invalid.
  #[error("invalid width {0} (expected > 0, multiple of 8)")]
  InvalidWidth(usize),
  /// The height is invalid.
  #[error("invalid height {0} (expected > 0, multiple of 8)")]
  InvalidHeight(usize),
  /// The quantizer is out of range.
  #[error("invalid qp {actual} (expected <= {max})")]
  InvalidQp {
    /// The actual value.
    actual: u8,
    /// The maximal supported value.
    max: u8,
  },
  /// Too many worker threads were requested.
  #[error("invalid thread count {actual} (expected <= {max})")]
  InvalidThreads {
    /// The actual value.
    actual: usize,
    /// The maximal supported value.
    max: usize,
  },
  /// The bit depth is not supported.
  #[error("invalid bit depth {0} (expected 8, 10 or 12)")]
  InvalidBitDepth(usize),
  /// The pixel type cannot hold samples of the configured bit depth.
  #[error("pixel type of {pixel_bits} bits cannot hold {bit_depth} bits")]
  PixelTypeMismatch {
    /// The configured bit depth.
    bit_depth: usize,
    /// Size of the pixel type in bits.
    pixel_bits: usize,
  },
  /// The number of pictures between anchors is invalid.
  #[error("invalid max b frames {0} (expected 0, 1, 3, 7 or 15)")]
  InvalidMaxBFrames(u32),
  /// The intra period does not fall on a GOP boundary.
  #[error("invalid intra period {actual} (expected a multiple of {gop_size})")]
  InvalidIntraPeriod {
    /// The actual value.
    actual: u32,
    /// The GOP size the period must be a multiple of.
    gop_size: u32,
  },
  /// The low delay layering period is invalid.
  #[error(
    "invalid ref pic gap length {0} (expected 1, 2, 4, 8 or 16, \
     without b frames)"
  )]
  InvalidRefPicGapLength(u32),
  /// Inter pictures must be P or B slices.
  #[error("invalid inter slice type {0}")]
  InvalidInterSliceType(crate::api::SliceType),
  /// The lookahead does not fit in the input buffers.
  #[error("invalid lookahead {actual} (expected <= {max})")]
  InvalidLookahead {
    /// The actual value.
    actual: u32,
    /// The maximal supported value.
    max: u32,
  },
  /// The reference count is invalid.
  #[error("invalid max refs {actual} (expected >= 1, <= {max})")]
  InvalidMaxRefs {
    /// The actual value.
    actual: usize,
    /// The maximal supported value.
    max: usize,
  },
  /// The coding tree unit size is invalid.
  #[error("invalid ctu size log2 {0} (expected >= 5, <= 7)")]
  InvalidCtuSize(usize),
  /// The intra block copy size is invalid.
  #[error("invalid ibc max size log2 {0} (expected >= 2, <= 6)")]
  InvalidIbcMaxSize(usize),
  /// Tile columns is invalid.
  #[error("invalid tile cols {actual} (expected >= 1, <= {max})")]
  InvalidTileCols {
    /// The actual value.
    actual: usize,
    /// The maximal supported value.
    max: usize,
  },
  /// Tile rows is invalid.
  #[error("invalid tile rows {actual} (expected >= 1, <= {max})")]
  InvalidTileRows {
    /// The actual value.
    actual: usize,
    /// The maximal supported value.
    max: usize,
  },
  /// The tile grid has too many tiles.
  #[error("invalid tile count {0} (expected <= 64)")]
  InvalidTileCount(usize),
  /// A closed GOP needs intra pictures to close on.
  #[error("closed gop requires an intra period")]
  ClosedGopWithoutIntraPeriod,
  /// The picture maps could not be allocated.
  #[error("cannot allocate the picture maps")]
  OutOfMemory,
}

/// Contains the encoder configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
  /// Settings which impact the coded pictures.
  pub(crate) enc: EncoderConfig,
  /// The number of threads in the threadpool.
  pub(crate) threads: usize,
  /// Shared thread pool
  pub(crate) pool: Option<Arc<ThreadPool>>,
}

impl Config {
  /// Create a default configuration
  ///
  /// same as `Default::default()`
  pub fn new() -> Self {
    Config::default()
  }

  /// Set the encoder configuration
  ///
  /// `EncoderConfig` contains the settings impacting the coded pictures.
  pub fn with_encoder_config(mut self, enc: EncoderConfig) -> Self {
    self.enc = enc;
    self
  }

  /// Set the number of workers in the threadpool
  ///
  /// The threadpool is shared across all the tile passes of the encoder.
  ///
  /// If it is left unset, the encoder will use the default global
  /// threadpool provided by Rayon instead.
  pub const fn with_threads(mut self, threads: usize) -> Self {
    self.threads = threads;
    self
  }

  /// Use the provided threadpool
  ///
  /// It takes priority over `with_threads()`
  pub fn with_thread_pool(mut self, pool: Arc<ThreadPool>) -> Self {
    self.pool = Some(pool);
    self
  }

  /// The encoder settings.
  #[inline]
  pub const fn encoder_config(&self) -> &EncoderConfig {
    &self.enc
  }

  pub(crate) fn new_inner<T: Pixel>(
    &self,
  ) -> Result<ContextInner<T>, InvalidConfig> {
    let pixel_bits = T::max_bit_depth();
    if pixel_bits < self.enc.bit_depth {
      return Err(InvalidConfig::PixelTypeMismatch {
        bit_depth: self.enc.bit_depth,
        pixel_bits,
      });
    }

    self.validate()?;

    ContextInner::new(&self.enc).map_err(|_| InvalidConfig::OutOfMemory)
  }

  /// Create a new threadpool with this configuration if set,
  /// or return `None` if global threadpool should be used instead.
  pub(crate) fn new_thread_pool(&self) -> Option<Arc<ThreadPool>> {
    if let Some(ref p) = self.pool {
      Some(p.clone())
    } else if self.threads != 0 {
      match ThreadPoolBuilder::new().num_threads(self.threads).build() {
        Ok(pool) => Some(Arc::new(pool)),
        Err(e) => {
          warn!("falling back to the global thread pool: {}", e);
          None
        }
      }
    } else {
      None
    }
  }

  /// Creates a [`Context`] with this configuration.
  ///
  /// # Errors
  ///
  /// Returns `InvalidConfig` if the config is invalid.
  ///
  /// # Examples
  ///
  /// ```
  /// use framecore::prelude::*;
  ///
  /// # fn main() -> Result<(), InvalidConfig> {
  /// let cfg = Config::default();
  /// let ctx: Context<u8> = cfg.new_context()?;
  /// # Ok(())
  /// # }
  /// ```
  ///
  /// [`Context`]: struct.Context.html
  pub fn new_context<T: Pixel>(&self) -> Result<Context<T>, InvalidConfig> {
    let inner = self.new_inner()?;
    let pool = self.new_thread_pool();

    info!("new context: {}", self.enc);
    Ok(Context { inner, pool, config: self.enc })
  }

  /// Validates the configuration.
  ///
  /// # Errors
  ///
  /// Returns the first setting found out of range.
  pub fn validate(&self) -> Result<(), InvalidConfig> {
    use InvalidConfig::*;

    let config = &self.enc;

    if config.width == 0 || config.width % 8 != 0 {
      return Err(InvalidWidth(config.width));
    }
    if config.height == 0 || config.height % 8 != 0 {
      return Err(InvalidHeight(config.height));
    }

    if config.qp > MAX_QP {
      return Err(InvalidQp { actual: config.qp, max: MAX_QP });
    }

    if self.pool.is_none() && self.threads > MAX_THREADS {
      return Err(InvalidThreads { actual: self.threads, max: MAX_THREADS });
    }

    if ![8, 10, 12].contains(&config.bit_depth) {
      return Err(InvalidBitDepth(config.bit_depth));
    }

    let gop_size = config.gop_size();
    if !gop_size.is_power_of_two() || gop_size > 16 {
      return Err(InvalidMaxBFrames(config.max_b_frames));
    }
    if gop_size > 1 && config.i_period % gop_size != 0 {
      return Err(InvalidIntraPeriod { actual: config.i_period, gop_size });
    }
    if gop_size > 1 {
      if config.ref_pic_gap_length != 0 {
        return Err(InvalidRefPicGapLength(config.ref_pic_gap_length));
      }
    } else {
      let gap = config.gop_config().ref_pic_gap_length;
      if !gap.is_power_of_two() || gap > 16 {
        return Err(InvalidRefPicGapLength(config.ref_pic_gap_length));
      }
    }
    if config.inter_slice_type.is_intra() {
      return Err(InvalidInterSliceType(config.inter_slice_type));
    }
    if config.closed_gop && config.i_period == 0 {
      return Err(ClosedGopWithoutIntraPeriod);
    }

    // every frame of the reordering window holds an input buffer
    let max_lookahead = MAX_INBUF_CNT as u32 - config.max_b_frames;
    if config.gop_config().ring_capacity() > MAX_INBUF_CNT {
      return Err(InvalidLookahead {
        actual: config.lookahead,
        max: max_lookahead,
      });
    }

    if config.max_refs == 0 || config.max_refs > MAX_NUM_REFS {
      return Err(InvalidMaxRefs {
        actual: config.max_refs,
        max: MAX_NUM_REFS,
      });
    }

    if !(5..=MAX_CU_LOG2).contains(&config.ctu_size_log2) {
      return Err(InvalidCtuSize(config.ctu_size_log2));
    }
    if !(2..=6).contains(&config.ibc_log_max_size) {
      return Err(InvalidIbcMaxSize(config.ibc_log_max_size));
    }

    let tiling = TilingInfo::new(
      config.ctu_size_log2,
      config.width,
      config.height,
      usize::MAX,
      usize::MAX,
    );
    if config.tile_cols == 0 || config.tile_cols > tiling.cols {
      let actual = config.tile_cols;
      return Err(InvalidTileCols { actual, max: tiling.cols });
    }
    if config.tile_rows == 0 || config.tile_rows > tiling.rows {
      let actual = config.tile_rows;
      return Err(InvalidTileRows { actual, max: tiling.rows });
    }
    if config.tile_cols * config.tile_rows > MAX_TILES {
      return Err(InvalidTileCount(config.tile_cols * config.tile_rows));
    }

    Ok(())
  }
}
