//! Outbound datagram delivery.

use std::net::{Ipv4Addr, SocketAddrV4};

use futures::StreamExt;
use futures::channel::mpsc;
use log::{debug, error, trace};

use crate::errors::Error;
use crate::payload::Message;
use crate::runtime::{AsyncUdpSocket, UdpSocket};

type Result<T> = std::result::Result<T, Error>;

/// Drains the outbound queue, sending one datagram per message.
///
/// Scan requests addressed to the multicast group go to the scan port;
/// everything else goes to the device's command port. Send failures are
/// logged and the message is dropped.
pub(crate) struct Dispatcher {
    queue: mpsc::Receiver<Message>,
    multicast_group: Ipv4Addr,
    scan_port: u16,
    command_port: u16,
}

impl Dispatcher {
    pub(crate) fn new(
        queue: mpsc::Receiver<Message>,
        multicast_group: Ipv4Addr,
        scan_port: u16,
        command_port: u16,
    ) -> Self {
        Dispatcher {
            queue,
            multicast_group,
            scan_port,
            command_port,
        }
    }

    /// Run until the queue is closed and drained.
    pub(crate) async fn run(mut self) {
        while let Some(message) = self.queue.next().await {
            let target = self.target_for(message.destination);
            if let Err(err) = deliver(target, &message).await {
                error!(
                    "Failed to send {} to {}: {}",
                    message.request.command(),
                    message.destination,
                    err
                );
            }
        }
        debug!("Outbound queue closed, dispatcher exiting");
    }

    pub(crate) fn target_for(&self, destination: Ipv4Addr) -> SocketAddrV4 {
        if destination == self.multicast_group {
            SocketAddrV4::new(destination, self.scan_port)
        } else {
            SocketAddrV4::new(destination, self.command_port)
        }
    }
}

async fn deliver(target: SocketAddrV4, message: &Message) -> Result<()> {
    let bytes = message.request.encode()?;

    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| Error::socket("bind", e))?;
    socket
        .connect(&target.to_string())
        .await
        .map_err(|e| Error::socket("connect", e))?;
    socket
        .send(&bytes)
        .await
        .map_err(|e| Error::socket("send", e))?;

    trace!("Sent {} bytes to {}", bytes.len(), target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Request, decode};
    use crate::queue::OutboundQueue;
    use crate::types::PowerState;
    use std::time::Duration;

    const GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

    fn dispatcher(command_port: u16) -> (OutboundQueue, Dispatcher) {
        let (queue, receiver) = OutboundQueue::new(8);
        (queue, Dispatcher::new(receiver, GROUP, 4001, command_port))
    }

    #[test]
    fn test_target_for() {
        let (_queue, dispatcher) = dispatcher(4003);
        assert_eq!(dispatcher.target_for(GROUP), SocketAddrV4::new(GROUP, 4001));
        let device = Ipv4Addr::new(192, 168, 1, 23);
        assert_eq!(dispatcher.target_for(device), SocketAddrV4::new(device, 4003));
    }

    #[tokio::test]
    async fn test_delivers_to_command_port() {
        let receiver = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let (queue, dispatcher) = dispatcher(port);
        let task = tokio::spawn(dispatcher.run());

        queue
            .enqueue(Message::new(Ipv4Addr::LOCALHOST, Request::Turn(PowerState::On)))
            .unwrap();

        let mut buffer = [0u8; 1024];
        let received = receiver.recv_from(&mut buffer);
        let (size, _) = tokio::time::timeout(Duration::from_secs(1), received)
            .await
            .unwrap()
            .unwrap();
        let (cmd, data) = decode(&buffer[..size]).unwrap();
        assert_eq!(cmd, "turn");
        assert_eq!(data["value"], 1);

        queue.close();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_drains_queue_after_close() {
        let receiver = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let (queue, dispatcher) = dispatcher(port);
        queue
            .enqueue(Message::new(Ipv4Addr::LOCALHOST, Request::DevStatus))
            .unwrap();
        queue.close();

        tokio::time::timeout(Duration::from_secs(1), dispatcher.run())
            .await
            .unwrap();

        let mut buffer = [0u8; 1024];
        let received = receiver.recv_from(&mut buffer);
        let (size, _) = tokio::time::timeout(Duration::from_secs(1), received)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decode(&buffer[..size]).unwrap().0, "devStatus");
    }
}
