//! Groups and their members.

use chatrelay_shared::protocol::GroupSummary;

use super::ConnectionId;

/// Position of a group in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(usize);

impl GroupId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Group name and capacity as read from the startup configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDefinition {
    pub name: String,
    pub capacity: usize,
}

impl GroupDefinition {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

/// Named occupant of exactly one group, bound to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub connection: ConnectionId,
    pub group: GroupId,
}

/// A room with a fixed capacity.
///
/// Members are kept in join order; occupancy is always the member count.
#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    capacity: usize,
    members: Vec<Member>,
}

impl Group {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupancy(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.occupancy() >= self.capacity
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member_named(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_at(&self, connection: ConnectionId) -> Option<&Member> {
        self.members.iter().find(|m| m.connection == connection)
    }

    /// Attach `member`. The caller has already checked capacity.
    pub(super) fn attach(&mut self, member: Member) {
        debug_assert!(!self.is_full());
        self.members.push(member);
    }

    /// Detach the member owned by `connection`, if any.
    pub(super) fn detach(&mut self, connection: ConnectionId) -> Option<Member> {
        let index = self
            .members
            .iter()
            .position(|m| m.connection == connection)?;
        Some(self.members.remove(index))
    }

    pub fn summary(&self) -> GroupSummary {
        GroupSummary {
            name: self.name.clone(),
            capacity: self.capacity,
            occupancy: self.occupancy(),
        }
    }
}
