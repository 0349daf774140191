//! The two hand-off queues between the bridge's threads.
//!
//! Traffic flows through the bridge in both directions at once, and each
//! direction has its own queue with its own wake-up discipline:
//!
//! - [`ActionQueue`] carries outbound [`WriteAction`]s (key events, update
//!   requests) from the display side to the session writer thread.  The
//!   writer blocks on a condition variable when the queue is empty.
//!
//! - [`UpdateQueue`] carries [`DisplayUpdate`]s (dirty rectangles,
//!   framebuffer swaps, name changes) from the session reader to the
//!   display pump, which drains it once per pump iteration.  Its mutex
//!   doubles as the fence that orders framebuffer pixel writes before the
//!   display side observes the matching dirty rectangle.
//!
//! Both queues are unbounded and strictly FIFO.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};

use aten_core::WriteAction;

use crate::display::DisplayUpdate;

/// Unbounded FIFO of outbound actions, drained by the writer thread.
#[derive(Default)]
pub struct ActionQueue {
    inner: Mutex<VecDeque<WriteAction>>,
    ready: Condvar,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action and wakes a blocked writer.
    pub fn push(&self, action: WriteAction) {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.push_back(action);
        self.ready.notify_all();
    }

    /// Removes and returns the oldest action, blocking until one exists.
    pub fn pop_blocking(&self) -> WriteAction {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(action) = queue.pop_front() {
                return action;
            }
            queue = self.ready.wait(queue).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Unbounded FIFO of display updates, drained by the display pump.
#[derive(Default)]
pub struct UpdateQueue {
    inner: Mutex<VecDeque<DisplayUpdate>>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an update for the display pump to apply.
    pub fn push(&self, update: DisplayUpdate) {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.push_back(update);
    }

    /// Takes every queued update at once, oldest first.
    pub fn drain(&self) -> Vec<DisplayUpdate> {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.drain(..).collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DirtyRect;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_action_queue_preserves_fifo_order() {
        // Arrange: tag each action with a monotonically increasing keysym.
        let queue = ActionQueue::new();
        for tag in 0..100u32 {
            queue.push(WriteAction::Key {
                down: true,
                keysym: tag,
            });
        }

        // Assert: drained tags come back in push order.
        for tag in 0..100u32 {
            assert_eq!(
                queue.pop_blocking(),
                WriteAction::Key {
                    down: true,
                    keysym: tag
                }
            );
        }
    }

    #[test]
    fn test_pop_blocking_wakes_on_push_from_another_thread() {
        let queue = Arc::new(ActionQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_blocking())
        };

        // Give the consumer a moment to park on the condvar first.
        thread::sleep(std::time::Duration::from_millis(20));
        queue.push(WriteAction::Ping);

        assert_eq!(consumer.join().expect("consumer"), WriteAction::Ping);
    }

    #[test]
    fn test_update_queue_drains_in_push_order() {
        let queue = UpdateQueue::new();
        for tag in 0..10u16 {
            queue.push(DisplayUpdate::MarkRect(DirtyRect {
                x1: tag,
                y1: 0,
                x2: tag + 1,
                y2: 1,
            }));
        }

        let drained = queue.drain();
        assert_eq!(drained.len(), 10);
        for (tag, update) in drained.into_iter().enumerate() {
            match update {
                DisplayUpdate::MarkRect(rect) => assert_eq!(rect.x1, tag as u16),
                other => panic!("unexpected update: {other:?}"),
            }
        }
    }

    #[test]
    fn test_update_queue_drain_leaves_the_queue_empty() {
        let queue = UpdateQueue::new();
        queue.push(DisplayUpdate::SetDesktopName("host-a".to_string()));

        assert_eq!(queue.drain().len(), 1);
        assert!(queue.drain().is_empty());
    }
}
