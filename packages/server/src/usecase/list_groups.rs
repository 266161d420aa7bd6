//! UseCase: グループ一覧の返信
//!
//! 返信は受信側のペイロード上限に収まる必要があります。一覧全体が収まらない場合は
//! 収まる先頭の行だけを返信します。

use chatrelay_shared::protocol::{GroupSummary, Reply};

use crate::domain::{ConnectionId, PacketPusher, Registry};

use super::{DeliveryError, send_reply};

/// グループ一覧取得のユースケース
pub struct ListGroupsUseCase<'a> {
    registry: &'a Registry,
    pusher: &'a dyn PacketPusher,
    max_payload: usize,
}

impl<'a> ListGroupsUseCase<'a> {
    pub fn new(registry: &'a Registry, pusher: &'a dyn PacketPusher, max_payload: usize) -> Self {
        Self {
            registry,
            pusher,
            max_payload,
        }
    }

    /// 現在のグループ一覧（name, capacity, occupancy）を要求元に返信する
    ///
    /// # Returns
    ///
    /// 実際に返信した行（上限に収まらない末尾の行は含まない）
    pub fn execute(self, connection: ConnectionId) -> Result<Vec<GroupSummary>, DeliveryError> {
        let mut groups = self.registry.list_groups();
        let total = groups.len();

        let mut size = 0;
        let fitting = groups
            .iter()
            .take_while(|g| {
                size += row_size(g);
                size <= self.max_payload
            })
            .count();
        if fitting < total {
            tracing::warn!(
                "Group list truncated to {} of {} groups for {}",
                fitting,
                total,
                connection
            );
            groups.truncate(fitting);
        }

        send_reply(self.pusher, connection, &Reply::GroupList(groups.clone()))?;
        tracing::debug!("Sent {} groups to {}", groups.len(), connection);
        Ok(groups)
    }
}

/// 1 行分のペイロードのバイト数（各フィールドと終端の NUL）
fn row_size(group: &GroupSummary) -> usize {
    group.name.len() + group.capacity.to_string().len() + group.occupancy.to_string().len() + 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::GroupDefinition, usecase::test_support::RecordingPusher};
    use chatrelay_shared::protocol::DEFAULT_MAX_PAYLOAD;

    #[test]
    fn test_list_groups_replies_snapshot_in_registry_order() {
        // テスト項目: 設定順のグループ一覧と現在の occupancy が返信される
        // given (前提条件):
        let mut registry = Registry::load([
            GroupDefinition::new("lobby", 2),
            GroupDefinition::new("dev", 5),
        ])
        .unwrap();
        registry.join(ConnectionId::new(1), "dev", "alice").unwrap();
        let pusher = RecordingPusher::default();
        let requester = ConnectionId::new(9);

        // when (操作):
        let groups = ListGroupsUseCase::new(&registry, &pusher, DEFAULT_MAX_PAYLOAD)
            .execute(requester)
            .unwrap();

        // then (期待する結果):
        let expected = vec![
            GroupSummary {
                name: "lobby".to_string(),
                capacity: 2,
                occupancy: 0,
            },
            GroupSummary {
                name: "dev".to_string(),
                capacity: 5,
                occupancy: 1,
            },
        ];
        assert_eq!(groups, expected);
        assert_eq!(pusher.replies_to(requester), vec![Reply::GroupList(expected)]);
    }

    #[test]
    fn test_list_groups_truncated_to_payload_limit() {
        // テスト項目: 一覧が上限を超える場合は収まる先頭の行だけが返信される
        // given (前提条件):
        let registry = Registry::load([
            GroupDefinition::new("lobby", 2),  // "lobby\02\00\0" = 10 bytes
            GroupDefinition::new("dev", 5),    // "dev\05\00\0" = 8 bytes
            GroupDefinition::new("random", 9), // 11 bytes
        ])
        .unwrap();
        let pusher = RecordingPusher::default();
        let requester = ConnectionId::new(1);

        // when (操作):
        let groups = ListGroupsUseCase::new(&registry, &pusher, 18)
            .execute(requester)
            .unwrap();

        // then (期待する結果):
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["lobby", "dev"]);
        let sent = pusher.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.length(), 18);
    }
}
