//! Control channel between the server and housekeeping roles.
//!
//! Wire format: exactly one byte per message, no framing, no
//! acknowledgement. `'h'` asks housekeeping to reload its configuration,
//! `'t'` asks it to terminate. Delivery is best-effort over a reliable
//! local pipe; a broken channel is logged, never fatal.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// A command forwarded from the server role to the housekeeping role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Re-read configuration and keep going.
    Reload,
    /// Finish up and exit.
    Terminate,
}

impl ControlMessage {
    /// The single-byte wire encoding.
    pub const fn as_byte(self) -> u8 {
        match self {
            ControlMessage::Reload => b'h',
            ControlMessage::Terminate => b't',
        }
    }

    /// Decode a wire byte; unknown bytes are not messages.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'h' => Some(ControlMessage::Reload),
            b't' => Some(ControlMessage::Terminate),
            _ => None,
        }
    }
}

/// Server-role end of the control channel.
#[derive(Debug)]
pub struct ControlSender<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> ControlSender<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Send one control message.
    pub async fn send(&mut self, message: ControlMessage) -> io::Result<()> {
        self.inner.write_all(&[message.as_byte()]).await?;
        self.inner.flush().await
    }
}

/// Result of one bounded poll on the housekeeping end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPoll {
    /// A message arrived.
    Message(ControlMessage),
    /// Nothing arrived within the wait.
    Empty,
    /// The channel is gone (server end closed).
    Closed,
}

/// Housekeeping-role end of the control channel.
#[derive(Debug)]
pub struct ControlReceiver<R> {
    inner: R,
    closed: bool,
}

impl<R: AsyncRead + Unpin> ControlReceiver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    /// Wait up to `wait` for the next control message.
    ///
    /// Once the channel has closed, this sleeps out the wait instead of
    /// spinning on EOF; the caller keeps its timer-driven loop.
    pub async fn poll_next(&mut self, wait: Duration) -> io::Result<ControlPoll> {
        if self.closed {
            tokio::time::sleep(wait).await;
            return Ok(ControlPoll::Closed);
        }

        let mut byte = [0u8; 1];
        match timeout(wait, self.inner.read(&mut byte)).await {
            Err(_) => Ok(ControlPoll::Empty),
            Ok(Ok(0)) => {
                self.closed = true;
                Ok(ControlPoll::Closed)
            }
            Ok(Ok(_)) => match ControlMessage::from_byte(byte[0]) {
                Some(message) => Ok(ControlPoll::Message(message)),
                None => {
                    tracing::warn!(byte = byte[0], "Ignoring unknown control byte");
                    Ok(ControlPoll::Empty)
                }
            },
            Ok(Err(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_encoding_round_trips() {
        for message in [ControlMessage::Reload, ControlMessage::Terminate] {
            assert_eq!(ControlMessage::from_byte(message.as_byte()), Some(message));
        }
        assert_eq!(ControlMessage::Reload.as_byte(), b'h');
        assert_eq!(ControlMessage::Terminate.as_byte(), b't');
    }

    #[test]
    fn unknown_bytes_are_not_messages() {
        assert_eq!(ControlMessage::from_byte(b'x'), None);
        assert_eq!(ControlMessage::from_byte(0), None);
    }

    #[tokio::test]
    async fn sender_and_receiver_agree() {
        let (client, server) = tokio::io::duplex(8);
        let mut sender = ControlSender::new(client);
        let mut receiver = ControlReceiver::new(server);

        sender.send(ControlMessage::Reload).await.unwrap();
        sender.send(ControlMessage::Terminate).await.unwrap();

        assert_eq!(
            receiver.poll_next(Duration::from_millis(100)).await.unwrap(),
            ControlPoll::Message(ControlMessage::Reload)
        );
        assert_eq!(
            receiver.poll_next(Duration::from_millis(100)).await.unwrap(),
            ControlPoll::Message(ControlMessage::Terminate)
        );
    }

    #[tokio::test]
    async fn empty_channel_times_out() {
        let (_client, server) = tokio::io::duplex(8);
        let mut receiver = ControlReceiver::new(server);
        assert_eq!(
            receiver.poll_next(Duration::from_millis(10)).await.unwrap(),
            ControlPoll::Empty
        );
    }

    #[tokio::test]
    async fn dropped_sender_reports_closed() {
        let (client, server) = tokio::io::duplex(8);
        drop(client);
        let mut receiver = ControlReceiver::new(server);
        assert_eq!(
            receiver.poll_next(Duration::from_millis(10)).await.unwrap(),
            ControlPoll::Closed
        );
        // Stays closed on later polls.
        assert_eq!(
            receiver.poll_next(Duration::from_millis(1)).await.unwrap(),
            ControlPoll::Closed
        );
    }
}
