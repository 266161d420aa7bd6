//! UseCase: グループ退出処理
//!
//! 明示的な LeaveGroup と、接続断による暗黙の退出の両方がこのユースケースを通ります。
//! どちらの場合も Registry の状態は同じになります。

use crate::domain::{ConnectionId, Group, Registry};

/// グループ退出のユースケース
pub struct LeaveGroupUseCase<'a> {
    registry: &'a mut Registry,
}

impl<'a> LeaveGroupUseCase<'a> {
    pub fn new(registry: &'a mut Registry) -> Self {
        Self { registry }
    }

    /// 退出を実行
    ///
    /// # Returns
    ///
    /// メンバーを削除した場合は `true`。参加していない接続なら何もせず `false`（冪等）
    pub fn execute(self, connection: ConnectionId) -> bool {
        let Some(member) = self.registry.take_member(connection) else {
            tracing::debug!("No member at {}, nothing to leave", connection);
            return false;
        };

        let group_name = self
            .registry
            .group(member.group)
            .map(Group::name)
            .unwrap_or_default();
        tracing::info!("'{}' left '{}'", member.name, group_name);
        true
    }
}
