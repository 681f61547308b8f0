// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use arrayvec::ArrayVec;

use crate::context::*;
use crate::mc::MotionVector;
use crate::util::*;
use picbuf::image::{ImageBuffer, MAX_PLANES};

mod input;
pub use input::*;

/// Padding around the luma plane of a reconstructed picture, wide enough
/// for motion compensation to read a full coding unit out of bounds.
pub const PIC_PAD_LUMA: usize = MAX_CU_SIZE + 16;

/// Maximum number of reference pictures a list may hold.
pub const MAX_NUM_REFS: usize = 16;

/// A reconstructed picture with its block-grid side information.
///
/// Once coded, a picture is shared read-only through `Arc<Picture<T>>` by
/// the reference pool and every picture predicting from it.
#[derive(Debug)]
pub struct Picture<T: Pixel> {
  pub recon: ImageBuffer<T>,
  /// Reference index per list of every SCU.
  pub refi: BlockMap<[i8; 2]>,
  /// Final motion vector per list of every SCU.
  pub mv: BlockMap<[MotionVector; 2]>,
  /// Motion vector per list before decoder-side refinement.
  pub unrefined_mv: BlockMap<[MotionVector; 2]>,
  pub poc: i32,
  pub temporal_id: u8,
  /// POCs of the list 0 references this picture was predicted from.
  pub list_poc: ArrayVec<i32, MAX_NUM_REFS>,
}

impl<T: Pixel> Picture<T> {
  /// Allocates a picture of `width` x `height` luma samples.
  ///
  /// Every side map is reserved before it is initialised; if any of the
  /// allocations fails, whatever was already allocated is dropped and the
  /// error is returned.
  pub fn new(
    width: usize, height: usize, chroma_sampling: ChromaSampling,
    bit_depth: usize,
  ) -> Result<Self, AllocError> {
    let (xdec, _) = chroma_sampling.get_decimation().unwrap_or((0, 0));
    let chroma_pad = PIC_PAD_LUMA >> xdec;
    let chroma_align = MIN_CU_LOG2.saturating_sub(xdec);
    let mut pad = [chroma_pad; MAX_PLANES];
    pad[0] = PIC_PAD_LUMA;
    let mut align = [chroma_align; MAX_PLANES];
    align[0] = MIN_CU_LOG2;

    let recon = ImageBuffer::new(
      width,
      height,
      chroma_sampling,
      bit_depth,
      pad,
      align,
    )?;

    let grid = GridSize::from_luma(width, height);
    let refi = BlockMap::new(grid, [INVALID_REFI; 2])?;
    let mv = BlockMap::new(grid, [MotionVector::default(); 2])?;
    let unrefined_mv = BlockMap::new(grid, [MotionVector::default(); 2])?;

    Ok(Picture {
      recon,
      refi,
      mv,
      unrefined_mv,
      poc: 0,
      temporal_id: 0,
      list_poc: ArrayVec::new(),
    })
  }

  #[inline]
  pub fn grid(&self) -> GridSize {
    self.refi.grid()
  }

  /// Luma dimensions.
  #[inline]
  pub fn dimensions(&self) -> (usize, usize) {
    (self.recon.width(), self.recon.height())
  }

  /// Clears the side maps and tags of a recycled picture.
  pub fn reset_maps(&mut self) {
    self.refi.fill([INVALID_REFI; 2]);
    self.mv.fill([MotionVector::default(); 2]);
    self.unrefined_mv.fill([MotionVector::default(); 2]);
    self.poc = 0;
    self.temporal_id = 0;
    self.list_poc.clear();
  }

  /// Fills the reconstruction padding so the picture can serve as a
  /// reference.
  pub fn expand(&mut self) {
    self.recon.expand(PIC_PAD_LUMA);
  }

  /// Records the motion of a coded unit in both lists.
  pub fn store_motion(
    &mut self, cu: &CodingUnit, refi: [i8; 2], mv: [MotionVector; 2],
    unrefined: [MotionVector; 2],
  ) {
    self.refi.fill_cu(cu, refi);
    self.mv.fill_cu(cu, mv);
    self.unrefined_mv.fill_cu(cu, unrefined);
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn picture_geometry() {
    let pic = Picture::<u16>::new(66, 34, ChromaSampling::Cs420, 10).unwrap();
    assert_eq!(pic.grid(), GridSize { cols: 17, rows: 9 });
    assert_eq!(pic.refi.as_slice().len(), 17 * 9);
    assert!(pic.refi.as_slice().iter().all(|r| *r == [INVALID_REFI; 2]));

    let luma = &pic.recon.planes[0].cfg;
    assert_eq!((luma.width, luma.aligned_width), (66, 68));
    assert_eq!(luma.xorigin, PIC_PAD_LUMA);
    let chroma = &pic.recon.planes[1].cfg;
    assert_eq!((chroma.width, chroma.height), (33, 17));
    assert_eq!(chroma.xorigin, PIC_PAD_LUMA / 2);
  }

  #[test]
  fn reset_clears_side_maps() {
    let mut pic = Picture::<u8>::new(32, 32, ChromaSampling::Cs420, 8).unwrap();
    let cu = CodingUnit::new(ScuOffset { x: 2, y: 2 }, 8, 8);
    let mv = [MotionVector::new(3, -1), MotionVector::new(-5, 2)];
    pic.store_motion(&cu, [0, 1], mv, [MotionVector::default(); 2]);
    pic.poc = 7;
    pic.list_poc.push(6);
    assert_eq!(pic.mv[ScuOffset { x: 3, y: 3 }], mv);
    assert_eq!(pic.refi[ScuOffset { x: 4, y: 3 }], [INVALID_REFI; 2]);

    pic.reset_maps();
    assert_eq!(pic.mv[ScuOffset { x: 3, y: 3 }], [MotionVector::default(); 2]);
    assert_eq!(pic.refi[ScuOffset { x: 2, y: 2 }], [INVALID_REFI; 2]);
    assert_eq!((pic.poc, pic.list_poc.len()), (0, 0));
  }

  #[test]
  fn expand_fills_reference_padding() {
    let mut pic = Picture::<u8>::new(16, 16, ChromaSampling::Cs420, 8).unwrap();
    for plane in pic.recon.planes.iter_mut() {
      for y in 0..plane.cfg.height {
        for (x, v) in plane.row_mut(y).iter_mut().enumerate() {
          *v = (9 + x + 16 * y) as u8;
        }
      }
    }
    pic.expand();
    assert!(pic.recon.planes[0].is_padded(PIC_PAD_LUMA));
    assert!(pic.recon.planes[2].is_padded(PIC_PAD_LUMA / 2));
    assert_eq!(pic.recon.planes[0].data[0], 9);

    // expanding again leaves every sample as it was
    let once: Vec<Vec<u8>> =
      pic.recon.planes.iter().map(|p| p.data.to_vec()).collect();
    pic.expand();
    for (plane, data) in pic.recon.planes.iter().zip(once.iter()) {
      assert_eq!(&plane.data[..], &data[..]);
    }
  }
}
