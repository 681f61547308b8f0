// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.
#![deny(missing_docs)]

use crate::api::*;
use crate::context::*;
use crate::deblock::{loop_filter, DeblockParams};
use crate::frame::*;
use crate::gop::*;
use crate::reference::*;
use crate::tiling::*;
use crate::util::{AllocError, Pixel};

use picbuf::image::ImageBuffer;

use std::sync::Arc;

/// An input frame waiting in the reordering ring.
#[derive(Debug)]
pub(crate) struct InputFrame<T: Pixel> {
  pub(crate) frame: Arc<ImageBuffer<T>>,
  pub(crate) display_index: u64,
}

/// Encoding state shared by every picture of a sequence.
#[derive(Debug)]
pub(crate) struct ContextInner<T: Pixel> {
  pub(crate) config: EncoderConfig,
  pub(crate) scheduler: GopScheduler,
  inputs: InputPool<T>,
  /// Frames pushed and not coded yet, at `display_index % len`.
  ring: Vec<Option<InputFrame<T>>>,
  pub(crate) refs: PicturePool<T>,
  status: StatusMap,
  tile_ids: TileIdMap,
  tiling: TilingInfo,
  row_sync: RowSync,
  pub(crate) rc: Box<dyn RateControl>,
}

impl<T: Pixel> ContextInner<T> {
  pub fn new(enc: &EncoderConfig) -> Result<Self, AllocError> {
    let gop = enc.gop_config();
    let grid = GridSize::from_luma(enc.width, enc.height);
    let tiling = TilingInfo::new(
      enc.ctu_size_log2,
      enc.width,
      enc.height,
      enc.tile_cols,
      enc.tile_rows,
    );
    let policy = Box::new(SlidingWindow { max_refs: enc.max_refs });

    Ok(ContextInner {
      config: *enc,
      scheduler: GopScheduler::new(gop),
      inputs: InputPool::new(
        enc.width,
        enc.height,
        enc.chroma_sampling,
        enc.bit_depth,
      ),
      ring: (0..gop.ring_capacity()).map(|_| None).collect(),
      refs: PicturePool::new(
        enc.pool_capacity(),
        enc.width,
        enc.height,
        enc.chroma_sampling,
        enc.bit_depth,
        policy,
      ),
      status: StatusMap::new(grid, CodingStatus::default())?,
      tile_ids: TileIdMap::from_tiling(&tiling)?,
      tiling,
      row_sync: RowSync::new(tiling.ctu_rows()),
      rc: Box::new(ConstantQp::new(enc.qp)),
    })
  }

  #[inline]
  fn ring_slot(&self, display_index: u64) -> usize {
    (display_index % self.ring.len() as u64) as usize
  }

  pub fn send_frame<U: Pixel>(
    &mut self, frame: &ImageBuffer<U>,
  ) -> Result<(), EncoderStatus> {
    if frame.width() != self.config.width
      || frame.height() != self.config.height
      || frame.chroma_sampling != self.config.chroma_sampling
    {
      warn!(
        "frame of {}x{} {:?} sent to a {}x{} {:?} encoder",
        frame.width(),
        frame.height(),
        frame.chroma_sampling,
        self.config.width,
        self.config.height,
        self.config.chroma_sampling
      );
      return Err(EncoderStatus::Failure);
    }
    if self.scheduler.is_flushing() {
      return Err(EncoderStatus::EnoughData);
    }

    let display_index = self.scheduler.frames_pushed();
    let slot = self.ring_slot(display_index);
    if self.ring[slot].is_some() {
      return Err(EncoderStatus::EnoughData);
    }

    let frame = self.inputs.fill_from(frame)?;
    self.scheduler.push()?;
    self.ring[slot] = Some(InputFrame { frame, display_index });
    debug!("frame {} queued in slot {}", display_index, slot);
    Ok(())
  }

  #[inline]
  pub fn flush(&mut self) {
    self.scheduler.flush();
  }

  /// Takes the input frame a decision codes out of the ring.
  fn take_input(
    &mut self, decision: &PictureDecision,
  ) -> Option<InputFrame<T>> {
    let slot = self.ring.get_mut(decision.ring_slot)?;
    let matches = slot
      .as_ref()
      .map_or(false, |input| input.display_index == decision.display_index);
    if matches {
      slot.take()
    } else {
      None
    }
  }

  /// Codes the next picture in coding order.
  ///
  /// The picture goes through four steps: the scheduling decision and the
  /// picture buffers are prepared, `coder` codes it, the loop filter runs,
  /// and the reconstruction is stored in the reference pool.
  #[profiling::function]
  pub fn encode_picture<C: PictureCoder<T>>(
    &mut self, coder: &mut C,
  ) -> Result<EncodedPicture<T>, EncoderStatus> {
    if self.scheduler.is_drained() {
      return Err(EncoderStatus::LimitReached);
    }
    if !self.scheduler.ready() {
      return Err(EncoderStatus::NeedMoreData);
    }

    let mut pic = self.refs.get_empty()?;
    let decision = self.scheduler.decide();
    let input = match self.take_input(&decision) {
      Some(input) => input,
      None => {
        warn!(
          "frame {} is missing from ring slot {}",
          decision.display_index, decision.ring_slot
        );
        self.refs.give_back(pic);
        return Err(EncoderStatus::Failure);
      }
    };

    self.status.fill(CodingStatus::default());
    self.row_sync.reset();
    let qp = self.rc.qp(&decision);
    let lists = self.refs.reference_lists(
      decision.poc,
      decision.slice_type,
      self.config.max_refs,
    );
    pic.poc = decision.poc;
    pic.temporal_id = decision.temporal_id;
    pic.list_poc = lists.get(RefList::L0).iter().map(|r| r.poc).collect();

    let coded = coder.code_picture(&mut CodingPicture {
      decision,
      qp,
      config: &self.config,
      orig: &input.frame,
      pic: &mut pic,
      status: &mut self.status,
      tile_ids: &self.tile_ids,
      tiling: &self.tiling,
      refs: &lists,
      row_sync: &self.row_sync,
    });
    if let Err(e) = coded {
      error!("picture {} was not coded: {}", decision.coding_index, e);
      self.refs.give_back(pic);
      return Err(e);
    }

    let params = DeblockParams {
      enabled: self.config.loop_filter,
      across_tiles: self.config.loop_filter_across_tiles,
    };
    let filtered = loop_filter(
      None,
      coder.deblocker(),
      &mut pic,
      &self.status,
      &self.tiling,
      params,
      decision.slice_type,
      qp,
    );
    if let Err(e) = filtered {
      error!("picture {}: loop filter {}", decision.coding_index, e);
      self.refs.give_back(pic);
      return Err(EncoderStatus::Failure);
    }

    pic.expand();
    let stats = PictureStats {
      slice_type: decision.slice_type,
      coding_index: decision.coding_index,
      poc: decision.poc,
      temporal_id: decision.temporal_id,
      qp,
      is_ref: decision.is_ref,
      ref_pocs: [lists.pocs(RefList::L0), lists.pocs(RefList::L1)],
    };
    drop(lists);

    let recon = self.refs.put(
      pic,
      decision.poc,
      decision.temporal_id,
      decision.is_ref,
      decision.is_idr,
    );
    self.rc.update(&stats);
    self.scheduler.finish_picture();

    Ok(EncodedPicture { recon, stats, ts: input.frame.ts })
  }
}
