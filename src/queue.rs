//! The shared outbound command queue.

use futures::channel::mpsc;
use parking_lot::Mutex;

use crate::errors::Error;
use crate::payload::Message;

type Result<T> = std::result::Result<T, Error>;

/// Producer side of the outbound queue, shared by every device handle and
/// the scan scheduler. The dispatcher owns the only receiver.
///
/// Enqueueing never waits: a full or closed queue is reported to the
/// caller straight away.
#[derive(Debug)]
pub(crate) struct OutboundQueue {
    sender: Mutex<Option<mpsc::Sender<Message>>>,
}

impl OutboundQueue {
    pub(crate) fn new(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let queue = OutboundQueue {
            sender: Mutex::new(Some(sender)),
        };
        (queue, receiver)
    }

    pub(crate) fn enqueue(&self, message: Message) -> Result<()> {
        let mut guard = self.sender.lock();
        let Some(sender) = guard.as_mut() else {
            return Err(Error::queue_unavailable(
                &message.destination,
                message.request.command().into(),
                "closed",
            ));
        };

        sender.try_send(message).map_err(|err| {
            let reason = if err.is_full() { "full" } else { "closed" };
            let message = err.into_inner();
            Error::queue_unavailable(
                &message.destination,
                message.request.command().into(),
                reason,
            )
        })
    }

    /// Close the queue. Messages already queued are still delivered to the
    /// receiver, which then observes the end of the stream.
    pub(crate) fn close(&self) {
        if let Some(mut sender) = self.sender.lock().take() {
            sender.close_channel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Request;
    use futures::StreamExt;
    use std::net::Ipv4Addr;

    fn message() -> Message {
        Message::new(Ipv4Addr::new(10, 0, 0, 5), Request::DevStatus)
    }

    #[tokio::test]
    async fn test_enqueue_then_drain_after_close() {
        let (queue, mut receiver) = OutboundQueue::new(4);
        queue.enqueue(message()).unwrap();
        queue.close();

        assert_eq!(receiver.next().await, Some(message()));
        assert_eq!(receiver.next().await, None);
    }

    #[test]
    fn test_enqueue_after_close_fails() {
        let (queue, _receiver) = OutboundQueue::new(4);
        queue.close();
        let err = queue.enqueue(message()).unwrap_err();
        assert!(matches!(err, Error::QueueUnavailable { ref reason, .. } if reason == "closed"));
    }

    #[test]
    fn test_full_queue_fails_immediately() {
        // A single sender gets `capacity + 1` slots.
        let (queue, _receiver) = OutboundQueue::new(1);
        queue.enqueue(message()).unwrap();
        queue.enqueue(message()).unwrap();
        let err = queue.enqueue(message()).unwrap_err();
        assert!(matches!(err, Error::QueueUnavailable { ref reason, .. } if reason == "full"));
    }

    #[test]
    fn test_dropped_receiver_reports_closed() {
        let (queue, receiver) = OutboundQueue::new(1);
        drop(receiver);
        let err = queue.enqueue(message()).unwrap_err();
        assert!(matches!(err, Error::QueueUnavailable { ref reason, .. } if reason == "closed"));
    }
}
