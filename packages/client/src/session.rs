//! Chat relay client session.
//!
//! A background task reads replies off the socket and queues them, so waiting
//! for the next reply can be raced against keyboard input without losing a
//! half-read frame.

use chatrelay_shared::protocol::{
    DEFAULT_MAX_PAYLOAD, GroupSummary, ProtocolError, Reply, Request, read_packet, write_packet,
};
use tokio::{
    net::{TcpStream, tcp::OwnedReadHalf, tcp::OwnedWriteHalf},
    sync::mpsc,
    task::JoinHandle,
};

use crate::error::ClientError;

/// Result of a join request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Accepted,
    /// Rejected with the server's reason text
    Rejected(String),
}

/// Connection to a chat relay server
pub struct ChatClient {
    writer: OwnedWriteHalf,
    replies: mpsc::UnboundedReceiver<Result<Reply, ClientError>>,
    reader_task: JoinHandle<()>,
}

impl ChatClient {
    /// Connect to `address` (`host:port`)
    pub async fn connect(address: &str) -> Result<Self, ClientError> {
        Self::connect_with_max_payload(address, DEFAULT_MAX_PAYLOAD).await
    }

    pub async fn connect_with_max_payload(
        address: &str,
        max_payload: usize,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(address).await?;
        tracing::debug!("Connected to {}", address);
        Ok(Self::from_stream(stream, max_payload))
    }

    pub fn from_stream(stream: TcpStream, max_payload: usize) -> Self {
        let (reader, writer) = stream.into_split();
        let (tx, replies) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(reader_loop(reader, tx, max_payload));
        Self {
            writer,
            replies,
            reader_task,
        }
    }

    pub async fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        let packet = request.to_packet()?;
        write_packet(&mut self.writer, &packet).await?;
        Ok(())
    }

    /// Wait for the next reply. Cancel safe.
    pub async fn recv(&mut self) -> Result<Reply, ClientError> {
        self.replies
            .recv()
            .await
            .unwrap_or(Err(ClientError::ServerClosed))
    }

    /// Request the group table
    pub async fn list_groups(&mut self) -> Result<Vec<GroupSummary>, ClientError> {
        self.send(&Request::ListGroups).await?;
        match self.recv_answer().await? {
            Reply::GroupList(groups) => Ok(groups),
            other => Err(ClientError::UnexpectedReply(other.kind())),
        }
    }

    /// Join `group` as `member`
    pub async fn join(&mut self, group: &str, member: &str) -> Result<JoinOutcome, ClientError> {
        self.send(&Request::JoinGroup {
            group: group.to_string(),
            member: member.to_string(),
        })
        .await?;
        match self.recv_answer().await? {
            Reply::JoinAccepted => Ok(JoinOutcome::Accepted),
            Reply::JoinRejected { reason } => Ok(JoinOutcome::Rejected(reason)),
            other => Err(ClientError::UnexpectedReply(other.kind())),
        }
    }

    /// Leave the current group. The server sends no reply.
    pub async fn leave(&mut self) -> Result<(), ClientError> {
        self.send(&Request::LeaveGroup).await
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), ClientError> {
        self.send(&Request::UserText {
            text: text.to_string(),
        })
        .await
    }

    /// Next reply that answers a request, skipping chat text still in flight
    /// from a group that was just left.
    async fn recv_answer(&mut self) -> Result<Reply, ClientError> {
        loop {
            match self.recv().await? {
                Reply::UserText { sender, .. } => {
                    tracing::debug!("Skipping late message from '{}'", sender);
                }
                reply => return Ok(reply),
            }
        }
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn reader_loop(
    mut reader: OwnedReadHalf,
    tx: mpsc::UnboundedSender<Result<Reply, ClientError>>,
    max_payload: usize,
) {
    loop {
        let reply = read_packet(&mut reader, max_payload)
            .await
            .and_then(Reply::try_from)
            .map_err(|e| match e {
                ProtocolError::ConnectionClosed | ProtocolError::UnexpectedEof { .. } => {
                    ClientError::ServerClosed
                }
                e => ClientError::Protocol(e),
            });

        let failed = reply.is_err();
        if tx.send(reply).is_err() || failed {
            break;
        }
    }
}
