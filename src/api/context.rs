// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.
#![deny(missing_docs)]

use crate::api::config::*;
use crate::api::internal::*;
use crate::api::rate::RateControl;
use crate::api::util::*;

use crate::context::*;
use crate::deblock::Deblocker;
use crate::frame::Picture;
use crate::gop::PictureDecision;
use crate::mc::MotionVector;
use crate::mvpred::MotionMaps;
use crate::reference::{RefLists, RefState};
use crate::tiling::{RowSync, TilingInfo};
use crate::util::Pixel;

use picbuf::image::ImageBuffer;
use rayon::ThreadPool;

use std::sync::Arc;

/// Everything a [`PictureCoder`] needs to code one picture.
///
/// [`PictureCoder`]: trait.PictureCoder.html
#[derive(Debug)]
pub struct CodingPicture<'a, T: Pixel> {
  /// Slice type, temporal layer and picture order count.
  pub decision: PictureDecision,
  /// Quantizer chosen by the rate control.
  pub qp: u8,
  /// Settings of the sequence.
  pub config: &'a EncoderConfig,
  /// The input frame.
  pub orig: &'a ImageBuffer<T>,
  /// Reconstruction and motion maps to fill.
  pub pic: &'a mut Picture<T>,
  /// Coding status of every SCU, cleared before coding starts.
  pub status: &'a mut StatusMap,
  /// Tile of every SCU.
  pub tile_ids: &'a TileIdMap,
  /// Tile grid of the picture.
  pub tiling: &'a TilingInfo,
  /// Reference pictures per list.
  pub refs: &'a RefLists<T>,
  /// Row completion flags for wavefront coding, cleared before coding
  /// starts.
  pub row_sync: &'a RowSync,
}

impl<'a, T: Pixel> CodingPicture<'a, T> {
  /// Availability view over the units coded so far.
  #[inline]
  pub fn neighbors(&self) -> NeighborView<'_> {
    NeighborView::new(&*self.status, self.tile_ids)
  }

  /// Motion of the units coded so far.
  #[inline]
  pub fn motion_maps(&self) -> MotionMaps<'_> {
    MotionMaps::new(self.neighbors(), &*self.pic)
  }

  /// Mode flag contexts of `cu` under the sequence settings.
  pub fn ctx_flags(&self, cu: &CodingUnit) -> Option<CtxFlags> {
    self.neighbors().ctx_flags(
      cu,
      self.decision.slice_type,
      self.config.cm_init,
      self.config.ibc,
      self.config.ibc_log_max_size,
    )
  }

  /// Whether `cu` may use bi-prediction under the sequence settings.
  #[inline]
  pub fn bi_applicable(&self, cu: &CodingUnit) -> bool {
    crate::mvpred::bi_applicable(
      self.decision.slice_type,
      self.config.admvp,
      cu.width,
      cu.height,
    )
  }

  /// Records a coded unit, making it visible to the units coded after it.
  pub fn commit(
    &mut self, cu: &CodingUnit, status: CodingStatus, refi: [i8; 2],
    mv: [MotionVector; 2], unrefined_mv: [MotionVector; 2],
  ) {
    self.status.fill_cu(cu, status);
    self.pic.store_motion(cu, refi, mv, unrefined_mv);
  }
}

/// Codes pictures: mode decision, reconstruction and entropy coding.
pub trait PictureCoder<T: Pixel>: Send {
  /// Loop filter applied to the reconstruction once coded.
  type Deblocker: Deblocker<T>;

  /// Codes `pic`, filling its reconstruction, status and motion maps.
  ///
  /// # Errors
  ///
  /// Any error aborts the picture and is returned by
  /// [`Context::encode_picture()`].
  ///
  /// [`Context::encode_picture()`]: struct.Context.html#method.encode_picture
  fn code_picture(
    &mut self, pic: &mut CodingPicture<'_, T>,
  ) -> Result<(), EncoderStatus>;

  /// The loop filter kernels.
  fn deblocker(&self) -> &Self::Deblocker;
}

/// The encoder context.
///
/// Contains the encoding state.
#[derive(Debug)]
pub struct Context<T: Pixel> {
  pub(crate) inner: ContextInner<T>,
  pub(crate) config: EncoderConfig,
  pub(crate) pool: Option<Arc<ThreadPool>>,
}

impl<T: Pixel> Context<T> {
  /// Sends a frame for encoding.
  ///
  /// The frame is copied into an input buffer, converting its bit depth to
  /// the configured one. Passing `None` is equivalent to calling
  /// [`flush`].
  ///
  /// # Errors
  ///
  /// [`EncoderStatus::EnoughData`] is returned when the frame is sent after
  /// a flush or when the reordering ring is full; code pictures with
  /// [`encode_picture`] and send the frame again.
  /// [`EncoderStatus::Failure`] is returned when the frame does not match
  /// the configured geometry.
  ///
  /// # Examples
  ///
  /// ```
  /// use framecore::prelude::*;
  ///
  /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
  /// let enc = EncoderConfig { width: 64, height: 64, ..Default::default() };
  /// let cfg = Config::new().with_encoder_config(enc);
  /// let mut ctx: Context<u8> = cfg.new_context()?;
  /// let frame = ImageBuffer::<u8>::new(
  ///   64, 64, ChromaSampling::Cs420, 8, [0; 3], [0; 3],
  /// )?;
  ///
  /// ctx.send_frame(Some(&frame))?;
  /// ctx.send_frame::<u8>(None)?;
  /// # Ok(())
  /// # }
  /// ```
  ///
  /// [`flush`]: #method.flush
  /// [`encode_picture`]: #method.encode_picture
  /// [`EncoderStatus::EnoughData`]: enum.EncoderStatus.html#variant.EnoughData
  /// [`EncoderStatus::Failure`]: enum.EncoderStatus.html#variant.Failure
  #[inline]
  pub fn send_frame<U: Pixel>(
    &mut self, frame: Option<&ImageBuffer<U>>,
  ) -> Result<(), EncoderStatus> {
    match frame {
      Some(frame) => self.inner.send_frame(frame),
      None => {
        self.flush();
        Ok(())
      }
    }
  }

  /// Flushes the encoder.
  ///
  /// Flushing signals the end of the video. After the encoder has been
  /// flushed, no additional frames are accepted and the pictures left in
  /// the last group are coded in the order the pushed frames allow.
  #[inline]
  pub fn flush(&mut self) {
    self.inner.flush();
  }

  /// Codes the next picture in coding order with `coder`.
  ///
  /// # Errors
  ///
  /// - [`EncoderStatus::NeedMoreData`]: send more frames, or flush.
  /// - [`EncoderStatus::LimitReached`]: every frame was coded after a
  ///   flush.
  /// - [`EncoderStatus::OutOfMemory`]: every picture of the pool is still
  ///   held; drop some of the returned reconstructions.
  /// - Any error of `coder`, or [`EncoderStatus::Failure`] when the loop
  ///   filter fails. The context cannot be used any further.
  ///
  /// # Examples
  ///
  /// ```
  /// use framecore::prelude::*;
  ///
  /// struct Skip;
  ///
  /// impl PictureCoder<u8> for Skip {
  ///   type Deblocker = NoDeblock;
  ///
  ///   fn code_picture(
  ///     &mut self, _pic: &mut CodingPicture<'_, u8>,
  ///   ) -> Result<(), EncoderStatus> {
  ///     Ok(())
  ///   }
  ///
  ///   fn deblocker(&self) -> &NoDeblock {
  ///     &NoDeblock
  ///   }
  /// }
  ///
  /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
  /// let enc = EncoderConfig { width: 64, height: 64, ..Default::default() };
  /// let mut ctx: Context<u8> =
  ///   Config::new().with_encoder_config(enc).new_context()?;
  /// let frame = ImageBuffer::<u8>::new(
  ///   64, 64, ChromaSampling::Cs420, 8, [0; 3], [0; 3],
  /// )?;
  /// ctx.send_frame(Some(&frame))?;
  /// ctx.flush();
  ///
  /// loop {
  ///   match ctx.encode_picture(&mut Skip) {
  ///     Ok(picture) => println!("{}", picture),
  ///     Err(EncoderStatus::LimitReached) => break,
  ///     Err(err) => Err(err)?,
  ///   }
  /// }
  /// # Ok(())
  /// # }
  /// ```
  ///
  /// [`EncoderStatus::NeedMoreData`]: enum.EncoderStatus.html#variant.NeedMoreData
  /// [`EncoderStatus::LimitReached`]: enum.EncoderStatus.html#variant.LimitReached
  /// [`EncoderStatus::OutOfMemory`]: enum.EncoderStatus.html#variant.OutOfMemory
  /// [`EncoderStatus::Failure`]: enum.EncoderStatus.html#variant.Failure
  #[inline]
  pub fn encode_picture<C: PictureCoder<T>>(
    &mut self, coder: &mut C,
  ) -> Result<EncodedPicture<T>, EncoderStatus> {
    let inner = &mut self.inner;
    match self.pool {
      Some(ref pool) => pool.install(move || inner.encode_picture(coder)),
      None => inner.encode_picture(coder),
    }
  }

  /// Replaces the rate control, which starts out as a constant quantizer.
  pub fn set_rate_control(&mut self, rc: Box<dyn RateControl>) {
    self.inner.rc = rc;
  }

  /// The rate control in use.
  pub fn rate_control_mut(&mut self) -> &mut dyn RateControl {
    self.inner.rc.as_mut()
  }

  /// The configuration the context was created with.
  #[inline]
  pub const fn config(&self) -> &EncoderConfig {
    &self.config
  }

  /// Number of pictures coded so far.
  #[inline]
  pub fn pictures_coded(&self) -> u64 {
    self.inner.scheduler.pictures_coded()
  }

  /// Number of frames sent so far.
  #[inline]
  pub fn frames_sent(&self) -> u64 {
    self.inner.scheduler.frames_pushed()
  }

  /// Tags of the pictures held by the reference pool.
  pub fn references(&self) -> Vec<RefState> {
    self.inner.refs.states()
  }
}
