//! Queue of drivers ready to load and start.

use alloc::collections::VecDeque;

use crate::handle::DriverId;

/// FIFO of scheduled drivers.
///
/// Holds a driver exactly while its state is
/// [`DriverState::Scheduled`](crate::DriverState::Scheduled); the dispatcher
/// keeps the two in step under its lock.
#[derive(Debug, Default)]
pub struct ScheduledQueue {
    order: VecDeque<DriverId>,
}

impl ScheduledQueue {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    /// Number of queued drivers.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The driver that runs next.
    pub fn front(&self) -> Option<DriverId> {
        self.order.front().copied()
    }

    /// Returns `true` if `id` is queued.
    pub fn contains(&self, id: DriverId) -> bool {
        self.order.contains(&id)
    }

    /// Iterates over queued drivers in run order.
    pub fn iter(&self) -> impl Iterator<Item = DriverId> + '_ {
        self.order.iter().copied()
    }

    pub(crate) fn push_back(&mut self, id: DriverId) {
        debug_assert!(!self.contains(id), "driver {id} queued twice");
        self.order.push_back(id);
    }

    /// Removes `id`, wherever it sits. Returns `false` if it was not queued.
    pub(crate) fn remove(&mut self, id: DriverId) -> bool {
        match self.order.iter().position(|&queued| queued == id) {
            Some(pos) => {
                self.order.remove(pos);
                true
            }
            None => false,
        }
    }
}
