// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use framecore::prelude::*;

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};

const WIDTH: usize = 128;
const HEIGHT: usize = 64;
const FRAMES: usize = 17;

#[derive(Debug, Default)]
struct CountingFilter {
  tiles: AtomicUsize,
  boundaries: AtomicUsize,
}

impl Deblocker<u8> for CountingFilter {
  type Error = Infallible;

  fn filter_tile(
    &self, tile: &mut TileMut<'_, u8>, _input: &DeblockInput<'_>,
  ) -> Result<(), Infallible> {
    assert_eq!(tile.rect.width, WIDTH / 2);
    self.tiles.fetch_add(1, Ordering::Relaxed);
    Ok(())
  }

  fn filter_tile_boundary(
    &self, frame: &mut TileMut<'_, u8>, _rect: TileRect,
    input: &DeblockInput<'_>,
  ) -> Result<(), Infallible> {
    assert_eq!(frame.rect.width, WIDTH);
    assert!(input.status.as_slice().iter().all(|s| s.coded));
    self.boundaries.fetch_add(1, Ordering::Relaxed);
    Ok(())
  }
}

/// Codes every picture with 16x16 units in raster order.
#[derive(Debug, Default)]
struct RasterCoder {
  filter: CountingFilter,
}

impl PictureCoder<u8> for RasterCoder {
  type Deblocker = CountingFilter;

  fn code_picture(
    &mut self, pic: &mut CodingPicture<'_, u8>,
  ) -> Result<(), EncoderStatus> {
    let intra = pic.decision.slice_type.is_intra();
    if !intra {
      assert!(!pic.refs.get(RefList::L0).is_empty());
    }

    for y in (0..HEIGHT).step_by(16) {
      for x in (0..WIDTH).step_by(16) {
        let cu = CodingUnit::new(ScuOffset::from_luma(x, y), 16, 16);
        if (x, y) == (WIDTH / 2, 0) {
          let view = pic.neighbors();
          let layout = view.neighbor_layout(&cu);
          let set = view.motion_candidates(&cu, layout, 1, false);
          // the left neighbour lies in the other tile
          assert!(set.usable(0).is_none());
        }

        let status = CodingStatus { coded: true, intra, ..Default::default() };
        let refi = if intra { [INVALID_REFI; 2] } else { [0, INVALID_REFI] };
        let mv =
          [MotionVector::new(x as i16, y as i16), MotionVector::default()];
        pic.commit(&cu, status, refi, mv, mv);
      }
    }
    Ok(())
  }

  fn deblocker(&self) -> &CountingFilter {
    &self.filter
  }
}

fn drain(
  ctx: &mut Context<u8>, coder: &mut RasterCoder, out: &mut Vec<PictureStats>,
) {
  loop {
    match ctx.encode_picture(coder) {
      Ok(picture) => {
        assert_eq!(picture.recon.poc, picture.stats.poc);
        out.push(picture.stats);
      }
      Err(EncoderStatus::NeedMoreData) | Err(EncoderStatus::LimitReached) => {
        break
      }
      Err(e) => panic!("picture failed: {}", e),
    }
  }
}

#[test]
fn codes_every_frame_once() -> Result<(), Box<dyn std::error::Error>> {
  let enc = EncoderConfig {
    width: WIDTH,
    height: HEIGHT,
    max_b_frames: 7,
    tile_cols: 2,
    ..Default::default()
  };
  let mut ctx: Context<u8> =
    Config::new().with_encoder_config(enc).with_threads(2).new_context()?;
  let mut coder = RasterCoder::default();
  let mut out = Vec::new();

  for i in 0..FRAMES {
    let mut frame = ImageBuffer::<u8>::new(
      WIDTH,
      HEIGHT,
      ChromaSampling::Cs420,
      8,
      [0; 3],
      [0; 3],
    )?;
    frame.ts[0] = i as u64;
    ctx.send_frame(Some(&frame))?;
    drain(&mut ctx, &mut coder, &mut out);
  }
  assert!(out.len() < FRAMES);

  ctx.send_frame::<u8>(None)?;
  drain(&mut ctx, &mut coder, &mut out);
  assert_eq!(
    ctx.encode_picture(&mut coder).err(),
    Some(EncoderStatus::LimitReached)
  );

  assert_eq!(out.len(), FRAMES);
  assert_eq!(ctx.pictures_coded(), FRAMES as u64);
  assert_eq!(ctx.frames_sent(), FRAMES as u64);

  let pocs: BTreeSet<i32> = out.iter().map(|s| s.poc).collect();
  assert_eq!(pocs, (0..FRAMES as i32).collect());
  assert_eq!((out[0].slice_type, out[0].poc), (SliceType::I, 0));
  assert_eq!(out[1].poc, 8);
  assert!(out[1..].iter().all(|s| s.slice_type == SliceType::B));

  for (k, s) in out.iter().enumerate() {
    assert_eq!(s.coding_index, k as u64);
    let earlier: BTreeSet<i32> = out[..k].iter().map(|s| s.poc).collect();
    for poc in s.ref_pocs.iter().flatten() {
      assert!(earlier.contains(poc), "poc {} refers to {}", s.poc, poc);
    }
  }

  assert_eq!(coder.filter.tiles.load(Ordering::Relaxed), 2 * FRAMES);
  assert_eq!(coder.filter.boundaries.load(Ordering::Relaxed), 2 * FRAMES);
  Ok(())
}
