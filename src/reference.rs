// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Reconstructed picture storage and reference marking.

use std::fmt;
use std::sync::Arc;

use itertools::Itertools;

use crate::api::{EncoderStatus, SliceType};
use crate::context::RefList;
use crate::frame::Picture;
use crate::util::*;

/// Reference tags of a pooled picture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefState {
  pub poc: i32,
  pub temporal_id: u8,
  pub is_ref: bool,
}

/// Decides which references stop being used when a new picture enters
/// the pool.
pub trait EvictionPolicy: fmt::Debug + Send {
  /// POCs of the pictures in `live` to unmark before `incoming` is stored.
  fn victims(&mut self, live: &[RefState], incoming: &RefState) -> Vec<i32>;
}

/// Keeps at most `max_refs` references, dropping the oldest first.
#[derive(Clone, Copy, Debug)]
pub struct SlidingWindow {
  pub max_refs: usize,
}

impl EvictionPolicy for SlidingWindow {
  fn victims(&mut self, live: &[RefState], incoming: &RefState) -> Vec<i32> {
    if !incoming.is_ref {
      return Vec::new();
    }
    let refs = live.iter().filter(|s| s.is_ref).map(|s| s.poc).sorted();
    let keep = self.max_refs.saturating_sub(1);
    let excess = refs.len().saturating_sub(keep);
    refs.take(excess).collect()
  }
}

/// A reference picture as seen from a list of the current picture.
#[derive(Debug)]
pub struct RefPicture<T: Pixel> {
  pub pic: Arc<Picture<T>>,
  pub poc: i32,
}

impl<T: Pixel> Clone for RefPicture<T> {
  fn clone(&self) -> Self {
    RefPicture { pic: Arc::clone(&self.pic), poc: self.poc }
  }
}

impl<T: Pixel> RefPicture<T> {
  /// POCs of the list 0 references of this picture.
  #[inline]
  pub fn list_poc(&self) -> &[i32] {
    &self.pic.list_poc
  }
}

/// Reference lists of the picture being coded.
#[derive(Debug)]
pub struct RefLists<T: Pixel> {
  lists: [Vec<RefPicture<T>>; 2],
}

impl<T: Pixel> Default for RefLists<T> {
  fn default() -> Self {
    RefLists { lists: [Vec::new(), Vec::new()] }
  }
}

impl<T: Pixel> RefLists<T> {
  #[inline]
  pub fn get(&self, list: RefList) -> &[RefPicture<T>] {
    &self.lists[list.idx()]
  }

  /// Reference at index `refi` of `list`.
  #[inline]
  pub fn entry(&self, list: RefList, refi: i8) -> Option<&RefPicture<T>> {
    usize::try_from(refi).ok().and_then(|i| self.lists[list.idx()].get(i))
  }

  #[inline]
  pub fn first(&self, list: RefList) -> Option<&RefPicture<T>> {
    self.lists[list.idx()].first()
  }

  pub fn pocs(&self, list: RefList) -> Vec<i32> {
    self.lists[list.idx()].iter().map(|r| r.poc).collect()
  }
}

#[derive(Debug)]
struct PoolEntry<T: Pixel> {
  pic: Arc<Picture<T>>,
  state: RefState,
}

/// Owns the reconstructed pictures of a sequence.
///
/// A picture leaves the pool through [`get_empty`] for coding and comes
/// back through [`put`], after which it is shared. The pool never holds
/// more than `capacity` pictures, counting those being coded.
///
/// [`get_empty`]: #method.get_empty
/// [`put`]: #method.put
#[derive(Debug)]
pub struct PicturePool<T: Pixel> {
  entries: Vec<PoolEntry<T>>,
  /// Pictures handed out by `get_empty` and not yet returned.
  outstanding: usize,
  capacity: usize,
  width: usize,
  height: usize,
  chroma_sampling: ChromaSampling,
  bit_depth: usize,
  policy: Box<dyn EvictionPolicy>,
}

impl<T: Pixel> PicturePool<T> {
  pub fn new(
    capacity: usize, width: usize, height: usize,
    chroma_sampling: ChromaSampling, bit_depth: usize,
    policy: Box<dyn EvictionPolicy>,
  ) -> Self {
    PicturePool {
      entries: Vec::with_capacity(capacity),
      outstanding: 0,
      capacity,
      width,
      height,
      chroma_sampling,
      bit_depth,
      policy,
    }
  }

  #[inline]
  pub const fn capacity(&self) -> usize {
    self.capacity
  }

  /// Pictures stored in the pool.
  #[inline]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Tags of the stored pictures.
  pub fn states(&self) -> Vec<RefState> {
    self.entries.iter().map(|e| e.state).collect()
  }

  /// Number of pictures currently marked as reference.
  pub fn num_refs(&self) -> usize {
    self.entries.iter().filter(|e| e.state.is_ref).count()
  }

  fn recyclable(&self) -> Option<usize> {
    self
      .entries
      .iter()
      .position(|e| !e.state.is_ref && Arc::strong_count(&e.pic) == 1)
  }

  /// Whether [`get_empty`] would hand out a picture.
  ///
  /// [`get_empty`]: #method.get_empty
  pub fn query_empty(&self) -> bool {
    self.recyclable().is_some()
      || self.entries.len() + self.outstanding < self.capacity
  }

  /// Hands out a picture to code into, recycling an unused one when
  /// possible.
  pub fn get_empty(&mut self) -> Result<Picture<T>, EncoderStatus> {
    if let Some(idx) = self.recyclable() {
      let entry = self.entries.swap_remove(idx);
      let mut pic = match Arc::try_unwrap(entry.pic) {
        Ok(pic) => pic,
        Err(pic) => {
          self.entries.push(PoolEntry { pic, state: entry.state });
          return Err(EncoderStatus::Failure);
        }
      };
      pic.reset_maps();
      self.outstanding += 1;
      trace!("recycled picture of poc {}", entry.state.poc);
      return Ok(pic);
    }

    if self.entries.len() + self.outstanding >= self.capacity {
      return Err(EncoderStatus::OutOfMemory);
    }
    let pic = Picture::new(
      self.width,
      self.height,
      self.chroma_sampling,
      self.bit_depth,
    )?;
    self.outstanding += 1;
    trace!("allocated picture {}", self.entries.len() + self.outstanding);
    Ok(pic)
  }

  /// Stores a coded picture and returns the shared handle to it.
  ///
  /// An IDR picture unmarks every stored reference first. The eviction
  /// policy then picks the references to drop to make room.
  pub fn put(
    &mut self, mut pic: Picture<T>, poc: i32, temporal_id: u8, is_ref: bool,
    is_idr: bool,
  ) -> Arc<Picture<T>> {
    self.outstanding = self.outstanding.saturating_sub(1);
    pic.poc = poc;
    pic.temporal_id = temporal_id;

    if is_idr {
      for e in self.entries.iter_mut() {
        e.state.is_ref = false;
      }
    }

    let state = RefState { poc, temporal_id, is_ref };
    let victims = self.policy.victims(&self.states(), &state);
    for poc in victims {
      self.evict(poc);
    }

    let pic = Arc::new(pic);
    self.entries.push(PoolEntry { pic: Arc::clone(&pic), state });
    trace!("stored poc {} tid {} ref {}", poc, temporal_id, is_ref);
    pic
  }

  /// Takes back a picture from [`get_empty`] that will not be stored.
  ///
  /// [`get_empty`]: #method.get_empty
  pub fn give_back(&mut self, pic: Picture<T>) {
    self.outstanding = self.outstanding.saturating_sub(1);
    let state =
      RefState { poc: pic.poc, temporal_id: pic.temporal_id, is_ref: false };
    self.entries.push(PoolEntry { pic: Arc::new(pic), state });
  }

  /// Stops using the reference of POC `poc`. Returns whether one was
  /// marked.
  pub fn evict(&mut self, poc: i32) -> bool {
    match self.entries.iter_mut().find(|e| e.state.is_ref && e.state.poc == poc)
    {
      Some(e) => {
        e.state.is_ref = false;
        trace!("unmarked reference poc {}", poc);
        true
      }
      None => false,
    }
  }

  /// Builds the reference lists of a picture of POC `poc`.
  ///
  /// List 0 holds the past references closest first, then the future ones;
  /// list 1 the other way around. Both are cut to `num_active` entries.
  /// Intra slices get no list and P slices no list 1.
  pub fn reference_lists(
    &self, poc: i32, slice_type: SliceType, num_active: usize,
  ) -> RefLists<T> {
    let mut lists = RefLists::default();
    if slice_type.is_intra() {
      return lists;
    }

    let refs = self
      .entries
      .iter()
      .filter(|e| e.state.is_ref && e.state.poc != poc)
      .map(|e| RefPicture { pic: Arc::clone(&e.pic), poc: e.state.poc });
    let (past, future): (Vec<_>, Vec<_>) = refs.partition(|r| r.poc < poc);
    let past = past.into_iter().sorted_by_key(|r| -r.poc).collect_vec();
    let future = future.into_iter().sorted_by_key(|r| r.poc).collect_vec();

    lists.lists[0] =
      past.iter().chain(future.iter()).take(num_active).cloned().collect();
    if slice_type.has_l1() {
      lists.lists[1] =
        future.iter().chain(past.iter()).take(num_active).cloned().collect();
    }
    lists
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn pool(capacity: usize, max_refs: usize) -> PicturePool<u8> {
    PicturePool::new(
      capacity,
      16,
      16,
      ChromaSampling::Cs420,
      8,
      Box::new(SlidingWindow { max_refs }),
    )
  }

  fn store(pool: &mut PicturePool<u8>, poc: i32, is_ref: bool) {
    let pic = pool.get_empty().unwrap();
    pool.put(pic, poc, 0, is_ref, false);
  }

  #[test]
  fn capacity_bounds_allocation() {
    let mut pool = pool(2, 4);
    let a = pool.get_empty().unwrap();
    assert!(pool.query_empty());
    let b = pool.get_empty().unwrap();
    assert!(!pool.query_empty());
    assert_eq!(pool.get_empty().err(), Some(EncoderStatus::OutOfMemory));

    pool.put(a, 0, 0, true, false);
    let held = pool.put(b, 1, 0, false, false);
    assert!(!pool.query_empty());
    drop(held);
    assert!(pool.query_empty());
    let mut recycled = pool.get_empty().unwrap();
    assert_eq!(recycled.poc, 0);
    recycled.poc = 5;
    pool.give_back(recycled);
    assert_eq!(pool.len(), 2);
  }

  #[test]
  fn sliding_window_drops_oldest() {
    let mut pool = pool(8, 3);
    for poc in [0, 4, 2, 1] {
      store(&mut pool, poc, true);
    }
    let refs: Vec<_> =
      pool.states().iter().filter(|s| s.is_ref).map(|s| s.poc).collect();
    assert_eq!(refs, vec![4, 2, 1]);

    store(&mut pool, 3, false);
    assert_eq!(pool.num_refs(), 3);
  }

  #[test]
  fn idr_unmarks_every_reference() {
    let mut pool = pool(8, 4);
    store(&mut pool, 0, true);
    store(&mut pool, 4, true);
    let pic = pool.get_empty().unwrap();
    pool.put(pic, 0, 0, true, true);
    assert_eq!(pool.num_refs(), 1);
    assert!(!pool.evict(4));
    assert!(pool.evict(0));
    assert_eq!(pool.num_refs(), 0);
  }

  #[test]
  fn lists_order_by_distance() {
    let mut pool = pool(8, 8);
    for poc in [0, 8, 4, 2] {
      store(&mut pool, poc, true);
    }
    store(&mut pool, 1, false);

    let lists = pool.reference_lists(3, SliceType::B, 4);
    assert_eq!(lists.pocs(RefList::L0), vec![2, 0, 4, 8]);
    assert_eq!(lists.pocs(RefList::L1), vec![4, 8, 2, 0]);

    let lists = pool.reference_lists(6, SliceType::B, 2);
    assert_eq!(lists.pocs(RefList::L0), vec![4, 2]);
    assert_eq!(lists.pocs(RefList::L1), vec![8, 4]);
    assert_eq!(lists.entry(RefList::L1, 1).map(|r| r.poc), Some(4));
    assert!(lists.entry(RefList::L1, -1).is_none());

    let lists = pool.reference_lists(9, SliceType::P, 2);
    assert_eq!(lists.pocs(RefList::L0), vec![8, 4]);
    assert!(lists.get(RefList::L1).is_empty());

    let lists = pool.reference_lists(9, SliceType::I, 2);
    assert!(lists.first(RefList::L0).is_none());
  }
}
