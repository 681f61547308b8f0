// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::prelude::*;

use interpolate_name::interpolate_test;

use std::sync::Arc;

fn setup_config(
  w: usize, h: usize, max_b_frames: u32, i_period: u32, closed_gop: bool,
) -> Config {
  let enc = EncoderConfig {
    width: w,
    height: h,
    max_b_frames,
    i_period,
    closed_gop,
    ..Default::default()
  };
  Config::new().with_encoder_config(enc)
}

fn frame<T: Pixel>(
  w: usize, h: usize, bit_depth: usize, value: u16,
) -> ImageBuffer<T> {
  let mut img = ImageBuffer::<T>::new(
    w,
    h,
    ChromaSampling::Cs420,
    bit_depth,
    [0; 3],
    [0; 3],
  )
  .unwrap();
  for plane in img.planes.iter_mut() {
    for y in 0..plane.cfg.height {
      plane.row_mut(y).fill(T::cast_from(value));
    }
  }
  img
}

/// Codes nothing and records what it was asked to code.
#[derive(Debug, Default)]
struct Recorder {
  seen: Vec<PictureDecision>,
  orig_samples: Vec<u32>,
  small_bi: Vec<bool>,
  fail_at: Option<u64>,
}

impl<T: Pixel> PictureCoder<T> for Recorder {
  type Deblocker = NoDeblock;

  fn code_picture(
    &mut self, pic: &mut CodingPicture<'_, T>,
  ) -> Result<(), EncoderStatus> {
    if self.fail_at == Some(pic.decision.coding_index) {
      return Err(EncoderStatus::Failure);
    }
    assert!(pic.status.as_slice().iter().all(|s| !s.coded));
    assert_eq!(pic.pic.poc, pic.decision.poc);
    self.seen.push(pic.decision);
    self.orig_samples.push(pic.orig.planes[0].p(0, 0).into());
    let small = CodingUnit::new(ScuOffset { x: 0, y: 0 }, 4, 8);
    self.small_bi.push(pic.bi_applicable(&small));

    let cu = CodingUnit::new(ScuOffset { x: 0, y: 0 }, 8, 8);
    let status = CodingStatus {
      coded: true,
      intra: pic.decision.slice_type.is_intra(),
      ..Default::default()
    };
    pic.commit(
      &cu,
      status,
      [0, INVALID_REFI],
      [MotionVector::new(4, -4), MotionVector::default()],
      [MotionVector::new(4, -4), MotionVector::default()],
    );
    let next = CodingUnit::new(ScuOffset { x: 2, y: 0 }, 8, 8);
    assert!(pic.neighbors().avail_intra(&next).contains(AvailMask::LE));
    let maps = pic.motion_maps();
    assert_eq!(maps.refi[ScuIdx(0)], [0, INVALID_REFI]);
    Ok(())
  }

  fn deblocker(&self) -> &NoDeblock {
    &NoDeblock
  }
}

/// Sends `frames` frames as the context asks for them, then flushes and
/// drains it.
fn encode_all<T: Pixel>(
  ctx: &mut Context<T>, coder: &mut Recorder, frames: u16,
) -> Vec<EncodedPicture<T>> {
  let (w, h) = (ctx.config().width, ctx.config().height);
  let mut sent = 0;
  let mut out = Vec::new();
  loop {
    match ctx.encode_picture(coder) {
      Ok(picture) => out.push(picture),
      Err(EncoderStatus::NeedMoreData) => {
        if sent < frames {
          let mut src = frame::<u8>(w, h, 8, sent);
          src.ts = [sent as u64; 4];
          ctx.send_frame(Some(&src)).unwrap();
          sent += 1;
        } else {
          ctx.flush();
        }
      }
      Err(EncoderStatus::LimitReached) => break,
      Err(e) => panic!("unexpected status {:?}", e),
    }
  }
  out
}

#[test]
fn default_config_is_valid() {
  assert_eq!(Config::default().validate(), Ok(()));
  let low_delay = Config::new().with_encoder_config(EncoderConfig::low_delay());
  assert_eq!(low_delay.validate(), Ok(()));
}

#[test]
fn invalid_configs_are_rejected() {
  use InvalidConfig::*;

  let base = EncoderConfig { width: 128, height: 64, ..Default::default() };
  let cases: Vec<(EncoderConfig, InvalidConfig)> = vec![
    (EncoderConfig { width: 0, ..base }, InvalidWidth(0)),
    (EncoderConfig { height: 36, ..base }, InvalidHeight(36)),
    (EncoderConfig { qp: 52, ..base }, InvalidQp { actual: 52, max: 51 }),
    (EncoderConfig { bit_depth: 9, ..base }, InvalidBitDepth(9)),
    (EncoderConfig { max_b_frames: 5, ..base }, InvalidMaxBFrames(5)),
    (
      EncoderConfig { i_period: 12, max_b_frames: 7, ..base },
      InvalidIntraPeriod { actual: 12, gop_size: 8 },
    ),
    (
      EncoderConfig { ref_pic_gap_length: 2, ..base },
      InvalidRefPicGapLength(2),
    ),
    (
      EncoderConfig { ref_pic_gap_length: 3, ..EncoderConfig::low_delay() },
      InvalidRefPicGapLength(3),
    ),
    (
      EncoderConfig { inter_slice_type: SliceType::I, ..base },
      InvalidInterSliceType(SliceType::I),
    ),
    (EncoderConfig { closed_gop: true, ..base }, ClosedGopWithoutIntraPeriod),
    (
      EncoderConfig { lookahead: 18, ..base },
      InvalidLookahead { actual: 18, max: 17 },
    ),
    (
      EncoderConfig { max_refs: 0, ..base },
      InvalidMaxRefs { actual: 0, max: 16 },
    ),
    (EncoderConfig { ctu_size_log2: 8, ..base }, InvalidCtuSize(8)),
    (EncoderConfig { ibc_log_max_size: 7, ..base }, InvalidIbcMaxSize(7)),
    (
      EncoderConfig { tile_cols: 3, ..base },
      InvalidTileCols { actual: 3, max: 2 },
    ),
    (
      EncoderConfig { tile_rows: 0, ..base },
      InvalidTileRows { actual: 0, max: 1 },
    ),
  ];
  for (enc, err) in cases {
    let cfg = Config::new().with_encoder_config(enc);
    assert_eq!(cfg.validate(), Err(err), "{}", enc);
  }

  let threads = Config::new().with_encoder_config(base).with_threads(9);
  assert_eq!(
    threads.validate(),
    Err(InvalidThreads { actual: 9, max: MAX_THREADS })
  );
}

#[test]
fn too_many_tiles() {
  let enc = EncoderConfig {
    width: 1024,
    height: 1024,
    ctu_size_log2: 5,
    tile_cols: 16,
    tile_rows: 8,
    ..Default::default()
  };
  let cfg = Config::new().with_encoder_config(enc);
  assert_eq!(cfg.validate(), Err(InvalidConfig::InvalidTileCount(128)));
}

#[test]
fn pixel_type_must_hold_bit_depth() {
  let enc = EncoderConfig { bit_depth: 10, ..Default::default() };
  let cfg = Config::new().with_encoder_config(enc);
  assert_eq!(
    cfg.new_context::<u8>().err(),
    Some(InvalidConfig::PixelTypeMismatch { bit_depth: 10, pixel_bits: 8 })
  );
  assert!(cfg.new_context::<u16>().is_ok());
}

#[test]
fn hierarchical_gop_order() {
  let mut ctx: Context<u8> =
    setup_config(64, 64, 3, 8, false).new_context().unwrap();
  let mut coder = Recorder::default();
  let out = encode_all(&mut ctx, &mut coder, 8);

  let order: Vec<_> = out.iter().map(|p| p.stats.poc).collect();
  assert_eq!(order, vec![0, 4, 2, 1, 3, 6, 5, 7]);
  // every picture was coded from its own input frame
  let displayed: Vec<_> =
    coder.seen.iter().map(|d| d.display_index as u32).collect();
  assert_eq!(coder.orig_samples, displayed);
  assert!(out.iter().all(|p| p.ts == [p.stats.poc as u64; 4]));

  let stats = &out[2].stats;
  assert_eq!((stats.slice_type, stats.temporal_id), (SliceType::B, 1));
  assert_eq!(stats.ref_pocs, [vec![0, 4], vec![4, 0]]);
  assert!(out[0].stats.ref_pocs.iter().all(Vec::is_empty));
  assert_eq!(out[0].recon.list_poc.len(), 0);
  assert_eq!(out[3].recon.list_poc.as_slice(), &[0, 2, 4]);
  assert_eq!(ctx.pictures_coded(), 8);
}

#[test]
fn closed_gop_restarts_poc() {
  let mut ctx: Context<u8> =
    setup_config(64, 64, 3, 4, true).new_context().unwrap();
  let mut coder = Recorder::default();
  let out = encode_all(&mut ctx, &mut coder, 6);

  let tagged: Vec<_> =
    out.iter().map(|p| (p.stats.slice_type, p.stats.poc)).collect();
  use SliceType::*;
  assert_eq!(tagged, vec![(I, 0), (I, 0), (B, -2), (B, -3), (B, -1), (B, 1)]);
  // the second IDR dropped the first one from the references
  let leading = &out[2].stats;
  assert_eq!(leading.ref_pocs, [vec![0], vec![0]]);
}

#[test]
fn recon_is_stored_with_motion() {
  let mut ctx: Context<u8> =
    setup_config(64, 64, 0, 0, false).new_context().unwrap();
  let mut coder = Recorder::default();
  let out = encode_all(&mut ctx, &mut coder, 3);

  assert_eq!(out.len(), 3);
  let p = &out[1];
  assert_eq!(p.stats.slice_type, SliceType::B);
  assert_eq!(p.recon.refi[ScuOffset { x: 1, y: 1 }], [0, INVALID_REFI]);
  let mv = p.recon.mv[ScuOffset { x: 1, y: 1 }];
  assert_eq!(mv[0], MotionVector::new(4, -4));
  assert_eq!(p.recon.refi[ScuOffset { x: 2, y: 0 }], [INVALID_REFI; 2]);
  // padding is filled so the picture can be referenced
  assert!(p.recon.recon.planes[0].is_padded(PIC_PAD_LUMA));
  assert!(ctx.references().iter().all(|r| r.is_ref));
}

#[test]
fn converts_input_bit_depth() {
  let enc = EncoderConfig {
    width: 64,
    height: 64,
    bit_depth: 10,
    ..EncoderConfig::low_delay()
  };
  let mut ctx: Context<u16> =
    Config::new().with_encoder_config(enc).new_context().unwrap();
  let mut coder = Recorder::default();
  ctx.send_frame(Some(&frame::<u8>(64, 64, 8, 100))).unwrap();
  ctx.encode_picture(&mut coder).unwrap();
  assert_eq!(coder.orig_samples, vec![400]);
}

#[test]
fn send_after_flush_is_refused() {
  let mut ctx: Context<u8> =
    setup_config(64, 64, 3, 0, false).new_context().unwrap();
  let src = frame::<u8>(64, 64, 8, 0);
  ctx.send_frame(Some(&src)).unwrap();
  ctx.send_frame::<u8>(None).unwrap();
  assert_eq!(ctx.send_frame(Some(&src)), Err(EncoderStatus::EnoughData));
  assert_eq!(ctx.frames_sent(), 1);
}

#[test]
fn mismatched_frame_is_refused() {
  let mut ctx: Context<u8> =
    setup_config(64, 64, 3, 0, false).new_context().unwrap();
  let src = frame::<u8>(64, 32, 8, 0);
  assert_eq!(ctx.send_frame(Some(&src)), Err(EncoderStatus::Failure));
  assert_eq!(ctx.frames_sent(), 0);
}

#[interpolate_test(gop_2, 1, 3)]
#[interpolate_test(gop_4, 3, 7)]
#[interpolate_test(gop_8, 7, 15)]
fn full_ring_pushes_back(max_b_frames: u32, ring: u16) {
  let mut ctx: Context<u8> =
    setup_config(64, 64, max_b_frames, 0, false).new_context().unwrap();
  let src = frame::<u8>(64, 64, 8, 0);
  for _ in 0..ring {
    ctx.send_frame(Some(&src)).unwrap();
  }
  assert_eq!(ctx.send_frame(Some(&src)), Err(EncoderStatus::EnoughData));

  // coding the first picture frees its slot
  let mut coder = Recorder::default();
  ctx.encode_picture(&mut coder).unwrap();
  assert!(ctx.send_frame(Some(&src)).is_ok());
}

#[test]
fn need_more_data_until_delay_is_met() {
  let mut ctx: Context<u8> =
    setup_config(64, 64, 3, 0, false).new_context().unwrap();
  let mut coder = Recorder::default();
  let src = frame::<u8>(64, 64, 8, 0);
  for _ in 0..3 {
    ctx.send_frame(Some(&src)).unwrap();
    assert_eq!(
      ctx.encode_picture(&mut coder).err(),
      Some(EncoderStatus::NeedMoreData)
    );
  }
  ctx.send_frame(Some(&src)).unwrap();
  assert!(ctx.encode_picture(&mut coder).is_ok());
}

#[test]
fn coder_errors_abort_the_picture() {
  let mut ctx: Context<u8> =
    setup_config(64, 64, 0, 0, false).new_context().unwrap();
  let mut coder = Recorder { fail_at: Some(0), ..Default::default() };
  ctx.send_frame(Some(&frame::<u8>(64, 64, 8, 0))).unwrap();
  assert_eq!(
    ctx.encode_picture(&mut coder).err(),
    Some(EncoderStatus::Failure)
  );
  assert_eq!(ctx.pictures_coded(), 0);
}

#[test]
fn rate_control_sets_qp() {
  let mut ctx: Context<u8> =
    setup_config(64, 64, 0, 0, false).new_context().unwrap();
  let mut coder = Recorder::default();
  ctx.rate_control_mut().set_qp(40);
  ctx.send_frame(Some(&frame::<u8>(64, 64, 8, 0))).unwrap();
  let picture = ctx.encode_picture(&mut coder).unwrap();
  assert_eq!(picture.stats.qp, 40);

  ctx.set_rate_control(Box::new(ConstantQp::new(22)));
  ctx.send_frame(Some(&frame::<u8>(64, 64, 8, 0))).unwrap();
  assert_eq!(ctx.encode_picture(&mut coder).unwrap().stats.qp, 22);
}

#[interpolate_test(admvp, true)]
#[interpolate_test(no_admvp, false)]
fn small_blocks_bi_prediction(admvp: bool) {
  let enc = EncoderConfig {
    width: 64,
    height: 64,
    max_b_frames: 1,
    admvp,
    ..Default::default()
  };
  let mut ctx: Context<u8> =
    Config::new().with_encoder_config(enc).new_context().unwrap();
  let mut coder = Recorder::default();
  encode_all(&mut ctx, &mut coder, 3);

  let b: Vec<_> =
    coder.seen.iter().map(|d| d.slice_type == SliceType::B).collect();
  assert_eq!(b, vec![false, true, true]);
  let expected: Vec<_> = b.iter().map(|&b| b && !admvp).collect();
  assert_eq!(coder.small_bi, expected);
}

#[test]
fn shares_a_given_thread_pool() {
  let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
  let cfg = setup_config(64, 64, 0, 0, false)
    .with_threads(100)
    .with_thread_pool(Arc::new(pool));
  assert_eq!(cfg.encoder_config().max_b_frames, 0);
  let mut ctx: Context<u8> = cfg.new_context().unwrap();
  let out = encode_all(&mut ctx, &mut Recorder::default(), 2);
  assert_eq!(out.len(), 2);
}

#[test]
fn runs_on_own_thread_pool() {
  let mut ctx: Context<u8> = setup_config(64, 64, 1, 0, false)
    .with_threads(2)
    .new_context()
    .unwrap();
  let mut coder = Recorder::default();
  let out = encode_all(&mut ctx, &mut coder, 5);
  let order: Vec<_> = out.iter().map(|p| p.stats.poc).collect();
  assert_eq!(order, vec![0, 2, 1, 4, 3]);
}
