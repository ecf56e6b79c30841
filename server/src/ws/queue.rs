//! The bounded, drop-oldest stream queue used for screencast frames and
//! health samples. Unlike the control queue (a plain bounded `mpsc`, which
//! never drops and instead marks the session unhealthy when full), the
//! stream queue silently discards its oldest frame to make room for the
//! newest one — a slow admin must never block or disconnect the device.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

pub struct StreamQueue {
    capacity: usize,
    items: Mutex<VecDeque<protocol::Event>>,
    notify: Notify,
}

impl StreamQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
        }
    }

    /// Enqueues `event`, dropping the oldest queued item if at capacity.
    /// Returns `true` if a drop occurred.
    pub fn push(&self, event: protocol::Event) -> bool {
        let dropped = {
            let mut items = self.items.lock().expect("stream queue poisoned");
            let dropped = if items.len() >= self.capacity {
                items.pop_front();
                true
            } else {
                false
            };
            items.push_back(event);
            dropped
        };
        self.notify.notify_one();
        dropped
    }

    /// Waits for and pops the oldest queued item.
    pub async fn recv(&self) -> protocol::Event {
        loop {
            {
                let mut items = self.items.lock().expect("stream queue poisoned");
                if let Some(event) = items.pop_front() {
                    return event;
                }
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drops_oldest_when_full() {
        let q = StreamQueue::new(2);
        q.push(protocol::Event::ScreencastStop {});
        q.push(protocol::Event::ScreencastStart {});
        let dropped = q.push(protocol::Event::DisplayRefresh {});
        assert!(dropped);

        let first = q.recv().await;
        assert!(matches!(first, protocol::Event::ScreencastStart {}));
    }
}
