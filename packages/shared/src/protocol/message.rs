//! Typed protocol messages.
//!
//! `Request` is what a client sends, `Reply` is what the server sends back. Both
//! share the `ListGroups` and `UserText` tags, with different payloads per
//! direction.

use super::{
    error::{ProtocolError, Result},
    fields::{decode_fields, encode_fields},
    packet::{Packet, PacketType},
};

/// One row of the group listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub name: String,
    pub capacity: usize,
    pub occupancy: usize,
}

/// Client to server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ListGroups,
    JoinGroup { group: String, member: String },
    LeaveGroup,
    UserText { text: String },
}

impl Request {
    pub fn kind(&self) -> PacketType {
        match self {
            Request::ListGroups => PacketType::ListGroups,
            Request::JoinGroup { .. } => PacketType::JoinGroup,
            Request::LeaveGroup => PacketType::LeaveGroup,
            Request::UserText { .. } => PacketType::UserText,
        }
    }

    pub fn to_packet(&self) -> Result<Packet> {
        let packet = match self {
            Request::ListGroups | Request::LeaveGroup => Packet::empty(self.kind()),
            Request::JoinGroup { group, member } => {
                Packet::new(self.kind(), encode_fields([group, member])?)
            }
            Request::UserText { text } => Packet::new(self.kind(), encode_fields([text])?),
        };
        Ok(packet)
    }
}

impl TryFrom<Packet> for Request {
    type Error = ProtocolError;

    fn try_from(packet: Packet) -> Result<Self> {
        match packet.kind {
            PacketType::ListGroups => Ok(Request::ListGroups),
            PacketType::LeaveGroup => Ok(Request::LeaveGroup),
            PacketType::JoinGroup => {
                let mut fields = decode_fields(&packet.payload)?.into_iter();
                let group = next_field(&mut fields, packet.kind, "groupName")?;
                let member = next_field(&mut fields, packet.kind, "memberName")?;
                Ok(Request::JoinGroup { group, member })
            }
            PacketType::UserText => {
                let mut fields = decode_fields(&packet.payload)?.into_iter();
                let text = next_field(&mut fields, packet.kind, "rawText")?;
                Ok(Request::UserText { text })
            }
            PacketType::JoinAccepted | PacketType::JoinRejected => {
                Err(ProtocolError::UnexpectedPacket(packet.kind.as_str()))
            }
        }
    }
}

/// Server to client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    GroupList(Vec<GroupSummary>),
    JoinAccepted,
    JoinRejected { reason: String },
    UserText { sender: String, text: String },
}

impl Reply {
    pub fn kind(&self) -> PacketType {
        match self {
            Reply::GroupList(_) => PacketType::ListGroups,
            Reply::JoinAccepted => PacketType::JoinAccepted,
            Reply::JoinRejected { .. } => PacketType::JoinRejected,
            Reply::UserText { .. } => PacketType::UserText,
        }
    }

    pub fn to_packet(&self) -> Result<Packet> {
        let packet = match self {
            Reply::GroupList(groups) => {
                let fields = groups.iter().flat_map(|g| {
                    [
                        g.name.clone(),
                        g.capacity.to_string(),
                        g.occupancy.to_string(),
                    ]
                });
                Packet::new(self.kind(), encode_fields(fields)?)
            }
            Reply::JoinAccepted => Packet::empty(self.kind()),
            Reply::JoinRejected { reason } => Packet::new(self.kind(), encode_fields([reason])?),
            Reply::UserText { sender, text } => {
                Packet::new(self.kind(), encode_fields([sender, text])?)
            }
        };
        Ok(packet)
    }
}

impl TryFrom<Packet> for Reply {
    type Error = ProtocolError;

    fn try_from(packet: Packet) -> Result<Self> {
        match packet.kind {
            PacketType::ListGroups => {
                let fields = decode_fields(&packet.payload)?;
                if fields.len() % 3 != 0 {
                    return Err(ProtocolError::MissingField {
                        kind: packet.kind.as_str(),
                        field: "occupancy",
                    });
                }
                let groups = fields
                    .chunks(3)
                    .map(|row| -> Result<GroupSummary> {
                        Ok(GroupSummary {
                            name: row[0].clone(),
                            capacity: parse_count(&row[1])?,
                            occupancy: parse_count(&row[2])?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Reply::GroupList(groups))
            }
            PacketType::JoinAccepted => Ok(Reply::JoinAccepted),
            PacketType::JoinRejected => {
                let reason = decode_fields(&packet.payload)?
                    .into_iter()
                    .next()
                    .unwrap_or_default();
                Ok(Reply::JoinRejected { reason })
            }
            PacketType::UserText => {
                let mut fields = decode_fields(&packet.payload)?.into_iter();
                let sender = next_field(&mut fields, packet.kind, "senderName")?;
                let text = next_field(&mut fields, packet.kind, "rawText")?;
                Ok(Reply::UserText { sender, text })
            }
            PacketType::JoinGroup | PacketType::LeaveGroup => {
                Err(ProtocolError::UnexpectedPacket(packet.kind.as_str()))
            }
        }
    }
}

fn next_field(
    fields: &mut impl Iterator<Item = String>,
    kind: PacketType,
    field: &'static str,
) -> Result<String> {
    fields.next().ok_or(ProtocolError::MissingField {
        kind: kind.as_str(),
        field,
    })
}

fn parse_count(raw: &str) -> Result<usize> {
    raw.parse()
        .map_err(|_| ProtocolError::InvalidNumber(raw.to_string()))
}
