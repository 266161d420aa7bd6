//! Packet framing.
//!
//! Every packet on the wire is laid out as:
//!
//! ```text
//! +------+----------------+------------------+
//! | type | length (u32 BE)| payload          |
//! | 1 B  | 4 B            | `length` bytes   |
//! +------+----------------+------------------+
//! ```
//!
//! There is no terminator and no padding. Readers loop until the whole frame has
//! arrived or the stream ends.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::{ProtocolError, Result};

/// Size of the fixed header: 1 type byte plus a 4-byte length.
pub const HEADER_SIZE: usize = 5;

/// Default upper bound for a decoded payload.
pub const DEFAULT_MAX_PAYLOAD: usize = 2048;

/// Packet type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    ListGroups = 0,
    JoinGroup = 1,
    LeaveGroup = 2,
    UserText = 3,
    JoinRejected = 4,
    JoinAccepted = 5,
}

impl PacketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketType::ListGroups => "ListGroups",
            PacketType::JoinGroup => "JoinGroup",
            PacketType::LeaveGroup => "LeaveGroup",
            PacketType::UserText => "UserText",
            PacketType::JoinRejected => "JoinRejected",
            PacketType::JoinAccepted => "JoinAccepted",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(PacketType::ListGroups),
            1 => Ok(PacketType::JoinGroup),
            2 => Ok(PacketType::LeaveGroup),
            3 => Ok(PacketType::UserText),
            4 => Ok(PacketType::JoinRejected),
            5 => Ok(PacketType::JoinAccepted),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(kind: PacketType) -> u8 {
        kind as u8
    }
}

/// One framed protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketType,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(kind: PacketType, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// A packet with no payload (`length == 0`).
    pub fn empty(kind: PacketType) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Payload length as it appears in the header.
    pub fn length(&self) -> usize {
        self.payload.len()
    }

    /// Encode the packet into a single contiguous frame.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self.kind, &self.payload)
    }
}

/// Encode a frame from its type and payload.
pub fn encode(kind: PacketType, payload: &[u8]) -> Result<Vec<u8>> {
    let length = u32::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
        length: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.push(u8::from(kind));
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Read one packet from `reader`.
///
/// The declared length is checked against `max_payload` before any payload
/// buffer is allocated.
pub async fn read_packet<R>(reader: &mut R, max_payload: usize) -> Result<Packet>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    let read = read_full(reader, &mut header).await?;
    if read == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    if read < HEADER_SIZE {
        return Err(ProtocolError::UnexpectedEof {
            read,
            expected: HEADER_SIZE,
        });
    }

    let kind = PacketType::try_from(header[0])?;
    let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if length > max_payload {
        return Err(ProtocolError::PayloadTooLarge {
            length,
            max: max_payload,
        });
    }

    let mut payload = vec![0u8; length];
    let read = read_full(reader, &mut payload).await?;
    if read < length {
        return Err(ProtocolError::UnexpectedEof {
            read,
            expected: length,
        });
    }

    Ok(Packet { kind, payload })
}

/// Write one packet to `writer` and flush it.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = packet.encode()?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Fill `buf` until it is full or the stream ends; returns the byte count read.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
