use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

// ============================================================================
// Mailbox - unbounded multi-producer / single-consumer FIFO
// ============================================================================
//
// Producers call offer() from any thread; it never blocks and never fails.
// The single consumer (the owning execution loop) claims the receiving half
// once and then blocks in take() until a message arrives.
//
// clear() may keep selected messages; they are served again, in their
// original order, before anything still in the channel.
//
// ============================================================================

/// The receiving half was dropped or every sender is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("mailbox closed")]
pub(crate) struct MailboxClosed;

/// Unbounded FIFO queue of pending messages for one actor
pub(crate) struct Mailbox<M> {
    sender: UnboundedSender<M>,
    receiver: Mutex<Option<MailboxReceiver<M>>>,
}

impl<M> Mailbox<M> {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(MailboxReceiver {
                receiver,
                requeued: VecDeque::new(),
            })),
        }
    }

    /// Enqueues a message. Once the consumer is gone the message is dropped.
    pub(crate) fn offer(&self, message: M) {
        if self.sender.send(message).is_err() {
            tracing::trace!("Message offered to a closed mailbox was dropped");
        }
    }

    /// Claims the consuming half. Only the first call gets it.
    pub(crate) fn receiver(&self) -> Option<MailboxReceiver<M>> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<M> Default for Mailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Consuming half of a [`Mailbox`], owned by the execution loop
pub(crate) struct MailboxReceiver<M> {
    receiver: UnboundedReceiver<M>,
    requeued: VecDeque<M>,
}

impl<M> MailboxReceiver<M> {
    /// Blocks until a message is available and returns it.
    ///
    /// Must not be called from inside an async task.
    pub(crate) fn take(&mut self) -> Result<M, MailboxClosed> {
        if let Some(message) = self.requeued.pop_front() {
            return Ok(message);
        }
        self.receiver.blocking_recv().ok_or(MailboxClosed)
    }

    /// Discards every queued message `keep` rejects and returns how many
    /// were dropped. Kept messages stay at the head of the queue.
    pub(crate) fn clear(&mut self, mut keep: impl FnMut(&M) -> bool) -> usize {
        let mut queued = std::mem::take(&mut self.requeued);
        loop {
            match self.receiver.try_recv() {
                Ok(message) => queued.push_back(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let before = queued.len();
        queued.retain(|message| keep(message));
        self.requeued = queued;
        before - self.requeued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let mailbox = Mailbox::new();
        for i in 0..10 {
            mailbox.offer(i);
        }

        let mut receiver = mailbox.receiver().unwrap();
        let taken: Vec<i32> = (0..10).map(|_| receiver.take().unwrap()).collect();
        assert_eq!(taken, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_receiver_claimed_once() {
        let mailbox: Mailbox<()> = Mailbox::new();
        assert!(mailbox.receiver().is_some());
        assert!(mailbox.receiver().is_none());
    }

    #[test]
    fn test_clear_discards_pending() {
        let mailbox = Mailbox::new();
        let mut receiver = mailbox.receiver().unwrap();
        mailbox.offer("a");
        mailbox.offer("b");
        mailbox.offer("c");

        assert_eq!(receiver.clear(|_| false), 3);

        mailbox.offer("d");
        assert_eq!(receiver.take().unwrap(), "d");
    }

    #[test]
    fn test_clear_keeps_selected_messages_ahead_of_new_ones() {
        let mailbox = Mailbox::new();
        let mut receiver = mailbox.receiver().unwrap();
        for i in 1..=6 {
            mailbox.offer(i);
        }

        assert_eq!(receiver.clear(|m| m % 2 == 0), 3);
        mailbox.offer(7);
        assert_eq!(receiver.clear(|m| *m != 4), 1);
        mailbox.offer(8);

        let taken: Vec<i32> = (0..4).map(|_| receiver.take().unwrap()).collect();
        assert_eq!(taken, vec![2, 6, 7, 8]);
    }

    #[test]
    fn test_take_blocks_until_offer() {
        let mailbox = Arc::new(Mailbox::new());
        let mut receiver = mailbox.receiver().unwrap();

        let producer = {
            let mailbox = mailbox.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                mailbox.offer(42u32);
            })
        };

        assert_eq!(receiver.take().unwrap(), 42);
        producer.join().unwrap();
    }

    #[test]
    fn test_per_sender_order_with_concurrent_producers() {
        let mailbox = Arc::new(Mailbox::new());
        let mut receiver = mailbox.receiver().unwrap();

        let producers: Vec<_> = (0..4u32)
            .map(|sender| {
                let mailbox = mailbox.clone();
                std::thread::spawn(move || {
                    for seq in 0..250u32 {
                        mailbox.offer((sender, seq));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut last_seen = [None::<u32>; 4];
        for _ in 0..1000 {
            let (sender, seq) = receiver.take().unwrap();
            if let Some(prev) = last_seen[sender as usize] {
                assert!(seq > prev, "sender {sender} delivered out of order");
            }
            last_seen[sender as usize] = Some(seq);
        }
    }

    #[test]
    fn test_offer_after_receiver_dropped_is_silent() {
        let mailbox = Mailbox::new();
        drop(mailbox.receiver());
        mailbox.offer(1);
    }
}
