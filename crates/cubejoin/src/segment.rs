//! Segment-chained LIFO and FIFO containers.
//!
//! Both containers store entries in fixed-capacity segments. A segment that
//! drains empty is parked on a per-container backlog and handed out again
//! before any fresh segment is allocated, so the bursty push/pop pattern of
//! a deep tree descent settles into a steady set of segments.

use std::collections::VecDeque;

use cubejoin_error::{JoinError, Result};
use serde::Serialize;

/// Allocation counters for one container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SegmentStats {
    /// Segments obtained from the allocator.
    pub allocated: u64,
    /// Segments reused from the backlog.
    pub recycled: u64,
}

impl SegmentStats {
    #[must_use]
    pub fn merged(self, other: Self) -> Self {
        Self {
            allocated: self.allocated + other.allocated,
            recycled: self.recycled + other.recycled,
        }
    }
}

trait Segment: Sized {
    fn try_with_capacity(capacity: usize) -> Result<Self>;
    fn is_empty(&self) -> bool;
}

impl<T> Segment for Vec<T> {
    fn try_with_capacity(capacity: usize) -> Result<Self> {
        let mut segment = Vec::new();
        segment
            .try_reserve_exact(capacity)
            .map_err(|_| JoinError::OutOfMemory)?;
        Ok(segment)
    }

    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

impl<T> Segment for VecDeque<T> {
    fn try_with_capacity(capacity: usize) -> Result<Self> {
        let mut segment = VecDeque::new();
        segment
            .try_reserve_exact(capacity)
            .map_err(|_| JoinError::OutOfMemory)?;
        Ok(segment)
    }

    fn is_empty(&self) -> bool {
        VecDeque::is_empty(self)
    }
}

/// Free segments awaiting reuse.
#[derive(Debug)]
struct Backlog<S> {
    free: Vec<S>,
    stats: SegmentStats,
}

impl<S: Segment> Backlog<S> {
    fn new() -> Self {
        Self {
            free: Vec::new(),
            stats: SegmentStats::default(),
        }
    }

    fn obtain(&mut self, capacity: usize) -> Result<S> {
        if let Some(segment) = self.free.pop() {
            self.stats.recycled += 1;
            return Ok(segment);
        }
        let segment = S::try_with_capacity(capacity)?;
        self.stats.allocated += 1;
        Ok(segment)
    }

    fn release(&mut self, segment: S) {
        debug_assert!(segment.is_empty());
        self.free.push(segment);
    }
}

// ---------------------------------------------------------------------------
// SegmentedStack
// ---------------------------------------------------------------------------

/// LIFO container built from fixed-capacity segments.
#[derive(Debug)]
pub struct SegmentedStack<T> {
    /// Non-empty segments, oldest first; the last one holds the top.
    chain: Vec<Vec<T>>,
    backlog: Backlog<Vec<T>>,
    capacity: usize,
    len: usize,
}

impl<T> SegmentedStack<T> {
    /// A stack whose segments hold `capacity` entries (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            chain: Vec::new(),
            backlog: Backlog::new(),
            capacity: capacity.max(1),
            len: 0,
        }
    }

    pub fn push(&mut self, item: T) -> Result<()> {
        let full = self
            .chain
            .last()
            .is_none_or(|top| top.len() == self.capacity);
        if full {
            self.chain
                .try_reserve(1)
                .map_err(|_| JoinError::OutOfMemory)?;
            let segment = self.backlog.obtain(self.capacity)?;
            self.chain.push(segment);
        }
        if let Some(top) = self.chain.last_mut() {
            top.push(item);
            self.len += 1;
        }
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        let top = self.chain.last_mut()?;
        let item = top.pop();
        if top.is_empty() {
            if let Some(segment) = self.chain.pop() {
                self.backlog.release(segment);
            }
        }
        if item.is_some() {
            self.len -= 1;
        }
        item
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn stats(&self) -> SegmentStats {
        self.backlog.stats
    }
}

// ---------------------------------------------------------------------------
// SegmentedQueue
// ---------------------------------------------------------------------------

/// FIFO container built from fixed-capacity segments.
#[derive(Debug)]
pub struct SegmentedQueue<T> {
    /// Non-empty segments; entries leave from the front segment and arrive
    /// at the back one.
    chain: VecDeque<VecDeque<T>>,
    backlog: Backlog<VecDeque<T>>,
    capacity: usize,
    len: usize,
}

impl<T> SegmentedQueue<T> {
    /// A queue whose segments hold `capacity` entries (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            chain: VecDeque::new(),
            backlog: Backlog::new(),
            capacity: capacity.max(1),
            len: 0,
        }
    }

    pub fn enqueue(&mut self, item: T) -> Result<()> {
        let full = self
            .chain
            .back()
            .is_none_or(|tail| tail.len() == self.capacity);
        if full {
            self.chain
                .try_reserve(1)
                .map_err(|_| JoinError::OutOfMemory)?;
            let segment = self.backlog.obtain(self.capacity)?;
            self.chain.push_back(segment);
        }
        if let Some(tail) = self.chain.back_mut() {
            tail.push_back(item);
            self.len += 1;
        }
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<T> {
        let head = self.chain.front_mut()?;
        let item = head.pop_front();
        if head.is_empty() {
            if let Some(segment) = self.chain.pop_front() {
                self.backlog.release(segment);
            }
        }
        if item.is_some() {
            self.len -= 1;
        }
        item
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn stats(&self) -> SegmentStats {
        self.backlog.stats
    }
}
