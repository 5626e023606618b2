//! Ordered node list
//!
//! Nodes live in an index-stable arena. Slot 0 is the head sentinel; every
//! slot carries a two-entry neighbour array indexed by [`Direction`], which
//! forms two circular rings (forward and backward) over the same storage.
//!
//! Each linked node also carries an `i64` position that strictly increases
//! along the forward ring. Appends leave an [`APPEND_INTERVAL`] gap so later
//! insertions can take a midpoint; when no integer is left between two
//! neighbours, a window around the insertion point is renumbered.
//!
//! The arena is append-only: removing a node detaches its slot but never
//! frees it, so a stale [`NodeId`] keeps failing with `DetachedNode` instead
//! of aliasing a later node. Memory grows with the number of insertions,
//! not with the number of live nodes.

use crate::error::{FixqError, FixqResult};
use std::fmt;

/// Gap left between consecutive appended nodes (2^40)
pub const APPEND_INTERVAL: i64 = 1 << 40;

/// Position given to the first node of an empty list
pub const MID_POSITION: i64 = 0;

pub const POSITION_UPPER_BOUND: i64 = i64::MAX;
pub const POSITION_LOWER_BOUND: i64 = i64::MIN;

/// Traversal direction, used as index into the neighbour array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Backward = 0,
    Forward = 1,
}

impl Direction {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Backward => Direction::Forward,
            Direction::Forward => Direction::Backward,
        }
    }
}

/// Stable index of a slot in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The head sentinel anchoring both rings
    pub const HEAD: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_head(self) -> bool {
        self == NodeId::HEAD
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_head() {
            write!(f, "#head")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    neighbors: [NodeId; 2],
    position: i64,
    linked: bool,
    value: Option<T>,
}

/// Arena-backed doubly linked list with dual rings and ordering keys
#[derive(Debug, Clone)]
pub struct NodeList<T> {
    /// Append-only; detached slots are never reused
    slots: Vec<Slot<T>>,
    len: usize,
    /// Inclusive range available to positions
    lower: i64,
    upper: i64,
    /// Bumped on every structural change
    revision: u64,
    rebalances: u64,
}

impl<T> Default for NodeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeList<T> {
    pub fn new() -> Self {
        let head = Slot {
            neighbors: [NodeId::HEAD, NodeId::HEAD],
            position: MID_POSITION,
            linked: true,
            value: None,
        };
        Self {
            slots: vec![head],
            len: 0,
            lower: POSITION_LOWER_BOUND,
            upper: POSITION_UPPER_BOUND,
            revision: 0,
            rebalances: 0,
        }
    }

    /// Empty list whose positions stay within `lower..=upper`
    pub fn with_position_bounds(lower: i64, upper: i64) -> FixqResult<Self> {
        if lower > upper {
            return Err(FixqError::invalid_input(format!(
                "position bounds {}..={} are empty",
                lower, upper
            )));
        }
        let mut list = Self::new();
        list.lower = lower;
        list.upper = upper;
        Ok(list)
    }

    /// Number of slots ever allocated, detached ones included
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Modification counter, used by [`NodeCursor`] to detect concurrent changes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of renumbering passes performed so far
    pub fn rebalance_count(&self) -> u64 {
        self.rebalances
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slot(id).filter(|s| s.linked).and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots
            .get_mut(id.0)
            .filter(|s| s.linked)
            .and_then(|s| s.value.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        !id.is_head() && self.slot(id).map(|s| s.linked).unwrap_or(false)
    }

    /// Ordering key of a linked node. The sentinel has no position.
    pub fn position(&self, id: NodeId) -> Option<i64> {
        if id.is_head() {
            return None;
        }
        self.slot(id).filter(|s| s.linked).map(|s| s.position)
    }

    /// Raw neighbour link; may return the head sentinel
    pub fn neighbor(&self, id: NodeId, direction: Direction) -> FixqResult<NodeId> {
        let slot = self.linked_slot(id)?;
        Ok(slot.neighbors[direction.index()])
    }

    /// First node when walking from the head in `direction`
    pub fn first(&self, direction: Direction) -> Option<NodeId> {
        let id = self.slots[0].neighbors[direction.index()];
        (!id.is_head()).then_some(id)
    }

    /// Append at the forward tail
    pub fn push_back(&mut self, value: T) -> FixqResult<NodeId> {
        self.insert_after(NodeId::HEAD, value, Direction::Backward)
    }

    /// Splice `value` after `anchor` when walking in `direction`.
    ///
    /// With `Direction::Backward` the new node lands before `anchor` in
    /// forward order. Anchoring on the head inserts at the front of the
    /// chosen direction.
    pub fn insert_after(
        &mut self,
        anchor: NodeId,
        value: T,
        direction: Direction,
    ) -> FixqResult<NodeId> {
        let anchor_slot = self.linked_slot(anchor)?;
        let (prev, next) = match direction {
            Direction::Forward => (anchor, anchor_slot.neighbors[Direction::Forward.index()]),
            Direction::Backward => (anchor_slot.neighbors[Direction::Backward.index()], anchor),
        };

        let planned = self.position_between(prev, next);
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            neighbors: [prev, next],
            position: planned.unwrap_or(MID_POSITION),
            linked: true,
            value: Some(value),
        });
        self.slots[prev.0].neighbors[Direction::Forward.index()] = id;
        self.slots[next.0].neighbors[Direction::Backward.index()] = id;
        self.len += 1;
        self.revision += 1;

        if planned.is_none() {
            if let Err(e) = self.rebalance_around(id) {
                self.unlink(id);
                self.slots.pop();
                return Err(e);
            }
        }

        Ok(id)
    }

    /// Unlink `id` from both rings and return its value
    pub fn remove(&mut self, id: NodeId) -> FixqResult<T> {
        if id.is_head() {
            return Err(FixqError::HeadSentinel);
        }
        self.linked_slot(id)?;
        self.unlink(id);
        self.slots[id.0]
            .value
            .take()
            .ok_or(FixqError::DetachedNode(id.0))
    }

    /// Lazy traversal starting at the head (all nodes) or at a node (ring rotation)
    pub fn iter_from(&self, start: NodeId, direction: Direction) -> Iter<'_, T> {
        let next = if start.is_head() {
            self.first(direction)
        } else if self.contains(start) {
            Some(start)
        } else {
            None
        };
        Iter {
            list: self,
            start,
            next,
            direction,
            remaining: self.len,
        }
    }

    pub fn iter(&self, direction: Direction) -> Iter<'_, T> {
        self.iter_from(NodeId::HEAD, direction)
    }

    /// Detached cursor that fails if the list changes underneath it
    pub fn cursor(&self, start: NodeId, direction: Direction) -> NodeCursor {
        let next = if start.is_head() {
            self.first(direction)
        } else if self.contains(start) {
            Some(start)
        } else {
            None
        };
        NodeCursor {
            start,
            next,
            direction,
            revision: self.revision,
        }
    }

    /// True when positions strictly increase along the forward ring
    pub fn check_positions(&self) -> bool {
        let mut last: Option<i64> = None;
        for (id, _) in self.iter(Direction::Forward) {
            let Some(pos) = self.position(id) else {
                return false;
            };
            if let Some(prev) = last {
                if pos <= prev {
                    return false;
                }
            }
            last = Some(pos);
        }
        true
    }

    fn slot(&self, id: NodeId) -> Option<&Slot<T>> {
        self.slots.get(id.0)
    }

    fn linked_slot(&self, id: NodeId) -> FixqResult<&Slot<T>> {
        self.slot(id)
            .filter(|s| s.linked)
            .ok_or(FixqError::DetachedNode(id.0))
    }

    /// Walk one step, skipping the sentinel
    fn step(&self, id: NodeId, direction: Direction) -> NodeId {
        let next = self.slots[id.0].neighbors[direction.index()];
        if next.is_head() {
            self.slots[0].neighbors[direction.index()]
        } else {
            next
        }
    }

    fn unlink(&mut self, id: NodeId) {
        let [prev, next] = self.slots[id.0].neighbors;
        self.slots[prev.0].neighbors[Direction::Forward.index()] = next;
        self.slots[next.0].neighbors[Direction::Backward.index()] = prev;
        let slot = &mut self.slots[id.0];
        slot.neighbors = [id, id];
        slot.linked = false;
        self.len -= 1;
        self.revision += 1;
    }

    /// Exclusive lower bound for the key following `id` in forward order
    fn lower_bound(&self, id: NodeId) -> i128 {
        if id.is_head() {
            self.lower as i128 - 1
        } else {
            self.slots[id.0].position as i128
        }
    }

    /// Exclusive upper bound for the key preceding `id` in forward order
    fn upper_bound(&self, id: NodeId) -> i128 {
        if id.is_head() {
            self.upper as i128 + 1
        } else {
            self.slots[id.0].position as i128
        }
    }

    fn position_between(&self, prev: NodeId, next: NodeId) -> Option<i64> {
        match (prev.is_head(), next.is_head()) {
            (true, true) => {
                if (self.lower..=self.upper).contains(&MID_POSITION) {
                    Some(MID_POSITION)
                } else {
                    midpoint(self.lower_bound(prev), self.upper_bound(next))
                }
            }
            (false, true) => {
                let last = self.slots[prev.0].position;
                last.checked_add(APPEND_INTERVAL)
                    .filter(|p| *p <= self.upper)
                    .or_else(|| midpoint(self.lower_bound(prev), self.upper_bound(next)))
            }
            (true, false) => {
                let first = self.slots[next.0].position;
                first
                    .checked_sub(APPEND_INTERVAL)
                    .filter(|p| *p >= self.lower)
                    .or_else(|| midpoint(self.lower_bound(prev), self.upper_bound(next)))
            }
            (false, false) => midpoint(self.lower_bound(prev), self.upper_bound(next)),
        }
    }

    /// Renumber a window around `id` once no key fits between its neighbours.
    ///
    /// The window grows on both sides until the keys outside it leave at
    /// least two units per node, or until it spans the whole list.
    fn rebalance_around(&mut self, id: NodeId) -> FixqResult<()> {
        let backward = Direction::Backward.index();
        let forward = Direction::Forward.index();
        let mut left = id;
        let mut right = id;
        let mut count: i128 = 1;

        loop {
            let outer_left = self.slots[left.0].neighbors[backward];
            let outer_right = self.slots[right.0].neighbors[forward];
            let lo = self.lower_bound(outer_left);
            let hi = self.upper_bound(outer_right);
            let step = (hi - lo) / (count + 1);
            let whole_list = outer_left.is_head() && outer_right.is_head();

            if step >= 2 || (whole_list && step >= 1) {
                let mut cursor = left;
                for k in 1..=count {
                    self.slots[cursor.0].position = (lo + step * k) as i64;
                    cursor = self.slots[cursor.0].neighbors[forward];
                }
                self.rebalances += 1;
                self.revision += 1;
                log::debug!(
                    "rebalanced {} node positions around slot {}",
                    count,
                    id.0
                );
                return Ok(());
            }
            if whole_list {
                return Err(FixqError::PositionSpaceExhausted(format!("slot {}", id.0)));
            }

            let grow = count;
            for _ in 0..grow {
                let candidate = self.slots[left.0].neighbors[backward];
                if candidate.is_head() {
                    break;
                }
                left = candidate;
                count += 1;
            }
            for _ in 0..grow {
                let candidate = self.slots[right.0].neighbors[forward];
                if candidate.is_head() {
                    break;
                }
                right = candidate;
                count += 1;
            }
        }
    }
}

fn midpoint(lo: i128, hi: i128) -> Option<i64> {
    if hi - lo < 2 {
        None
    } else {
        Some((lo + (hi - lo) / 2) as i64)
    }
}

/// Borrowing iterator over `(NodeId, &T)`
pub struct Iter<'a, T> {
    list: &'a NodeList<T>,
    start: NodeId,
    next: Option<NodeId>,
    direction: Direction,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        if self.remaining == 0 {
            self.next = None;
            return None;
        }
        self.remaining -= 1;

        let following = if self.start.is_head() {
            self.list.slots[current.0].neighbors[self.direction.index()]
        } else {
            self.list.step(current, self.direction)
        };
        self.next = if following.is_head() || following == self.start {
            None
        } else {
            Some(following)
        };

        self.list.get(current).map(|value| (current, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Traversal state detached from the list borrow.
///
/// Each call to [`NodeCursor::advance`] checks the list revision captured at
/// creation and fails instead of skipping or looping when it changed.
#[derive(Debug, Clone)]
pub struct NodeCursor {
    start: NodeId,
    next: Option<NodeId>,
    direction: Direction,
    revision: u64,
}

impl NodeCursor {
    pub fn advance<T>(&mut self, list: &NodeList<T>) -> FixqResult<Option<NodeId>> {
        if list.revision != self.revision {
            return Err(FixqError::ConcurrentModification {
                expected: self.revision,
                found: list.revision,
            });
        }
        let Some(current) = self.next else {
            return Ok(None);
        };

        let following = if self.start.is_head() {
            list.slots[current.0].neighbors[self.direction.index()]
        } else {
            list.step(current, self.direction)
        };
        self.next = if following.is_head() || following == self.start {
            None
        } else {
            Some(following)
        };
        Ok(Some(current))
    }
}
