//! Group/membership registry.
//!
//! The registry is the only owner of group and member state. It is built once
//! at startup from the group definitions and afterwards only changes through
//! [`Registry::join`] and [`Registry::leave`].
//!
//! Invariants held after every operation:
//!
//! - `occupancy(g) == |members(g)|` and `occupancy(g) <= capacity(g)`
//! - member names are unique across all groups
//! - a connection owns at most one member
//! - group and member names are non-empty and at most [`MAX_NAME_LEN`] bytes

use std::collections::HashSet;

use chatrelay_shared::protocol::GroupSummary;

use super::{
    ConnectionId, Group, GroupDefinition, GroupId, JoinRejection, Member, RegistryError,
};

/// Longest group or member name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LEN
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    groups: Vec<Group>,
}

impl Registry {
    /// Build the group table. Occupancy starts at zero everywhere.
    pub fn load<I>(definitions: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = GroupDefinition>,
    {
        let mut seen = HashSet::new();
        let mut groups = Vec::new();
        for definition in definitions {
            if !is_valid_name(&definition.name) {
                return Err(RegistryError::InvalidName(definition.name));
            }
            if definition.capacity == 0 {
                return Err(RegistryError::ZeroCapacity(definition.name));
            }
            if !seen.insert(definition.name.clone()) {
                return Err(RegistryError::DuplicateGroup(definition.name));
            }
            groups.push(Group::new(definition.name, definition.capacity));
        }
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.index())
    }

    pub fn find_group(&self, name: &str) -> Option<GroupId> {
        self.groups
            .iter()
            .position(|g| g.name() == name)
            .map(GroupId::new)
    }

    /// Scans every group: names are unique server-wide.
    pub fn find_member_by_name(&self, name: &str) -> Option<&Member> {
        self.groups.iter().find_map(|g| g.member_named(name))
    }

    pub fn find_member_by_connection(&self, connection: ConnectionId) -> Option<&Member> {
        self.groups.iter().find_map(|g| g.member_at(connection))
    }

    /// Members of `group`, in join order. Empty for an unknown id.
    pub fn members_of(&self, group: GroupId) -> &[Member] {
        self.group(group).map(Group::members).unwrap_or(&[])
    }

    /// Total number of members across all groups.
    pub fn member_count(&self) -> usize {
        self.groups.iter().map(Group::occupancy).sum()
    }

    /// Join `member_name` into `group_name` on behalf of `connection`.
    ///
    /// Checks run in order and the first failure wins: the connection must not
    /// already be joined, the group must exist, the name must be valid and
    /// free everywhere, and the group must have room.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        group_name: &str,
        member_name: &str,
    ) -> Result<GroupId, JoinRejection> {
        if self.find_member_by_connection(connection).is_some() {
            return Err(JoinRejection::AlreadyJoined);
        }
        let group_id = self
            .find_group(group_name)
            .ok_or(JoinRejection::NoSuchGroup)?;
        if !is_valid_name(member_name) {
            return Err(JoinRejection::InvalidName);
        }
        if self.find_member_by_name(member_name).is_some() {
            return Err(JoinRejection::NameTaken);
        }

        let group = &mut self.groups[group_id.index()];
        if group.is_full() {
            return Err(JoinRejection::RoomFull);
        }
        group.attach(Member {
            name: member_name.to_string(),
            connection,
            group: group_id,
        });
        Ok(group_id)
    }

    /// Remove and return the member owned by `connection`.
    pub fn take_member(&mut self, connection: ConnectionId) -> Option<Member> {
        self.groups.iter_mut().find_map(|g| g.detach(connection))
    }

    /// Remove the member owned by `connection`. Returns `false` when the
    /// connection has no member, which is not an error.
    pub fn leave(&mut self, connection: ConnectionId) -> bool {
        self.take_member(connection).is_some()
    }

    /// Snapshot of every group in registry order.
    pub fn list_groups(&self) -> Vec<GroupSummary> {
        self.groups.iter().map(Group::summary).collect()
    }
}
