use crate::error::{ObsidianError, Result};
use crate::track::{Playable, Track};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Loop behaviour of a [`PointerBasedQueue`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopType {
    #[default]
    None,
    Track,
    Queue,
}

/// Double-ended track queue with an optional capacity
///
/// Adding past capacity fails with [`ObsidianError::QueueFull`] instead of
/// evicting.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: VecDeque<Track>,
    max_size: Option<usize>,
}

impl Queue {
    /// Create an empty queue; `None` means unbounded
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            tracks: VecDeque::new(),
            max_size,
        }
    }

    /// Get the capacity, if any
    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Get the number of queued tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Whether another add would fail
    pub fn is_full(&self) -> bool {
        self.max_size.is_some_and(|max| self.tracks.len() >= max)
    }

    /// Whether `track` is queued
    pub fn contains(&self, track: &Track) -> bool {
        self.tracks.contains(track)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Get the track at `index`
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    fn check_capacity(&self) -> Result<()> {
        match self.max_size {
            Some(max_size) if self.tracks.len() >= max_size => Err(ObsidianError::QueueFull { max_size }),
            _ => Ok(()),
        }
    }

    /// Append a track to the back
    pub fn add(&mut self, track: Track) -> Result<()> {
        self.check_capacity()?;
        self.tracks.push_back(track);
        Ok(())
    }

    /// Push a track to the front
    pub fn add_front(&mut self, track: Track) -> Result<()> {
        self.check_capacity()?;
        self.tracks.push_front(track);
        Ok(())
    }

    /// Append a track, or every track of a playlist
    ///
    /// Playlist tracks are added one by one; on overflow the tracks that fit
    /// stay queued and the error is returned.
    pub fn enqueue(&mut self, item: impl Into<Playable>) -> Result<()> {
        match item.into() {
            Playable::Track(track) => self.add(track),
            Playable::Playlist(playlist) => self.extend(playlist.tracks().iter().cloned()),
        }
    }

    /// Append tracks in order, stopping at the first one that does not fit
    pub fn extend(&mut self, tracks: impl IntoIterator<Item = Track>) -> Result<()> {
        for track in tracks {
            self.add(track)?;
        }
        Ok(())
    }

    /// Insert a track at `index`, which may be the current length
    pub fn insert(&mut self, index: usize, track: Track) -> Result<()> {
        if index > self.tracks.len() {
            return Err(ObsidianError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            });
        }
        self.check_capacity()?;
        self.tracks.insert(index, track);
        Ok(())
    }

    /// Replace the track at `index`
    pub fn set(&mut self, index: usize, track: Track) -> Result<()> {
        let len = self.tracks.len();
        let slot = self
            .tracks
            .get_mut(index)
            .ok_or(ObsidianError::IndexOutOfRange { index, len })?;
        *slot = track;
        Ok(())
    }

    /// Remove and return the track at `index`
    pub fn remove(&mut self, index: usize) -> Result<Track> {
        let len = self.tracks.len();
        self.tracks
            .remove(index)
            .ok_or(ObsidianError::IndexOutOfRange { index, len })
    }

    /// Index of the first occurrence of `track`
    pub fn position(&self, track: &Track) -> Option<usize> {
        self.tracks.iter().position(|t| t == track)
    }

    /// Pop from the front
    pub fn pop(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    /// Pop from the back
    pub fn pop_back(&mut self) -> Option<Track> {
        self.tracks.pop_back()
    }

    /// Remove every track
    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

impl<'a> IntoIterator for &'a Queue {
    type Item = &'a Track;
    type IntoIter = std::collections::vec_deque::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}

/// Queue that advances a cursor over a stable list
///
/// `get` and `skip` never remove tracks, which is what makes track and
/// queue looping possible. The pointer is `None` before the first advance.
/// Once the queue runs dry it parks on the first slot past the end, so a
/// track appended afterwards is the next one handed out.
#[derive(Debug, Clone, Default)]
pub struct PointerBasedQueue {
    queue: Queue,
    pointer: Option<usize>,
    exhausted: bool,
    loop_type: LoopType,
}

impl PointerBasedQueue {
    /// Create an empty queue that does not loop
    ///
    /// # Example
    ///
    /// ```
    /// # use obsidian_client::{LoopType, PointerBasedQueue};
    /// let mut queue = PointerBasedQueue::new(Some(100));
    /// queue.set_loop_type(LoopType::Queue);
    /// assert!(queue.get().is_none());
    /// ```
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            queue: Queue::new(max_size),
            pointer: None,
            exhausted: false,
            loop_type: LoopType::None,
        }
    }

    /// Index of the current track, `None` before the first advance or once
    /// the queue has run dry
    pub fn pointer(&self) -> Option<usize> {
        self.pointer.filter(|_| !self.exhausted)
    }

    /// Whether the last advance ran past the end without looping
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Get the loop behaviour
    pub fn loop_type(&self) -> LoopType {
        self.loop_type
    }

    /// Set the loop behaviour; the pointer is left where it is
    pub fn set_loop_type(&mut self, loop_type: LoopType) {
        self.loop_type = loop_type;
    }

    /// Get the number of tracks, played or not
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get the underlying track list
    pub fn tracks(&self) -> &Queue {
        &self.queue
    }

    /// Track under the pointer
    pub fn current(&self) -> Option<&Track> {
        self.pointer().and_then(|p| self.queue.get(p))
    }

    /// Tracks that have not been handed out yet
    pub fn upcoming(&self) -> impl Iterator<Item = &Track> {
        let start = match self.pointer {
            None => 0,
            Some(p) if self.exhausted => p,
            Some(p) => p + 1,
        };
        self.queue.iter().skip(start)
    }

    /// Append a track without moving the pointer
    pub fn add(&mut self, track: Track) -> Result<()> {
        self.queue.add(track)
    }

    /// Append a track or every track of a playlist
    pub fn enqueue(&mut self, item: impl Into<Playable>) -> Result<()> {
        self.queue.enqueue(item)
    }

    /// Next track according to the loop type
    pub fn get(&mut self) -> Option<Track> {
        self.advance(self.loop_type != LoopType::Track)
    }

    /// Next track regardless of track looping
    pub fn skip(&mut self) -> Option<Track> {
        self.advance(true)
    }

    fn advance(&mut self, step: bool) -> Option<Track> {
        let len = self.queue.len();
        let pointer = match self.pointer {
            None => 0,
            Some(p) if self.exhausted => p,
            Some(p) if step => p + 1,
            Some(p) => p,
        }
        .min(len);
        self.pointer = Some(pointer);

        if let Some(track) = self.queue.get(pointer) {
            self.exhausted = false;
            return Some(track.clone());
        }

        if self.loop_type == LoopType::Queue && !self.queue.is_empty() {
            self.pointer = Some(0);
            self.exhausted = false;
            return self.queue.get(0).cloned();
        }

        self.exhausted = true;
        None
    }

    /// Remove the track at `index`, keeping the next-up track stable
    ///
    /// Removing at or before the pointer shifts the pointer back by one;
    /// removing after it leaves the pointer alone.
    pub fn remove(&mut self, index: usize) -> Result<Track> {
        let removed = self.queue.remove(index)?;
        if let Some(p) = self.pointer {
            if index <= p {
                self.pointer = p.checked_sub(1);
            }
        }
        Ok(removed)
    }

    /// Remove the first occurrence of `track`
    pub fn remove_track(&mut self, track: &Track) -> Result<Track> {
        let len = self.queue.len();
        let index = self
            .queue
            .position(track)
            .ok_or(ObsidianError::IndexOutOfRange { index: len, len })?;
        self.remove(index)
    }

    /// Insert a track; inserting at or before the pointer keeps the pointer on
    /// the same track
    ///
    /// On an exhausted queue, inserting at the parked slot makes the new track
    /// the next one handed out.
    pub fn insert(&mut self, index: usize, track: Track) -> Result<()> {
        self.queue.insert(index, track)?;
        if let Some(p) = self.pointer {
            if index < p || (index == p && !self.exhausted) {
                self.pointer = Some(p + 1);
            }
        }
        Ok(())
    }

    /// Move the pointer straight to `index`
    pub fn jump(&mut self, index: usize) -> Result<&Track> {
        let len = self.queue.len();
        if index >= len {
            return Err(ObsidianError::IndexOutOfRange { index, len });
        }
        self.pointer = Some(index);
        self.exhausted = false;
        self.queue.get(index).ok_or(ObsidianError::IndexOutOfRange { index, len })
    }

    /// Remove every track and rewind the pointer
    pub fn clear(&mut self) {
        self.queue.clear();
        self.pointer = None;
        self.exhausted = false;
    }
}
