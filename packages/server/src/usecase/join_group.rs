//! UseCase: グループ参加処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinGroupUseCase::execute() メソッド
//! - Registry への参加と、要求元への JoinAccepted / JoinRejected の返信
//!
//! ### なぜこのテストが必要か
//! - 拒否はアプリケーションレベルの返信であり、接続は維持されなければならない
//! - 拒否理由のテキストはクライアントにそのまま表示される
//!
//! ### どのような状況を想定しているか
//! - 正常系：空きのあるグループへの参加
//! - 異常系：満室、名前重複、グループ不在
//! - エッジケース：返信の送信に失敗しても参加結果は変わらない

use chatrelay_shared::protocol::Reply;

use crate::domain::{ConnectionId, GroupId, JoinRejection, PacketPusher, Registry};

use super::send_reply;

/// グループ参加のユースケース
pub struct JoinGroupUseCase<'a> {
    registry: &'a mut Registry,
    pusher: &'a dyn PacketPusher,
}

impl<'a> JoinGroupUseCase<'a> {
    pub fn new(registry: &'a mut Registry, pusher: &'a dyn PacketPusher) -> Self {
        Self { registry, pusher }
    }

    /// グループ参加を実行
    ///
    /// # Arguments
    ///
    /// * `connection` - 要求元の接続
    /// * `group_name` - 参加先のグループ名
    /// * `member_name` - 参加者名（サーバー全体で一意）
    ///
    /// # Returns
    ///
    /// * `Ok(GroupId)` - 参加成功（JoinAccepted を返信済み）
    /// * `Err(JoinRejection)` - 参加拒否（JoinRejected を返信済み）
    pub fn execute(
        self,
        connection: ConnectionId,
        group_name: &str,
        member_name: &str,
    ) -> Result<GroupId, JoinRejection> {
        let result = self.registry.join(connection, group_name, member_name);

        let reply = match &result {
            Ok(_) => {
                tracing::info!("'{}' joined '{}'", member_name, group_name);
                Reply::JoinAccepted
            }
            Err(rejection) => {
                tracing::info!(
                    "Rejected '{}' joining '{}' from {}: {}",
                    member_name,
                    group_name,
                    connection,
                    rejection
                );
                Reply::JoinRejected {
                    reason: rejection.to_string(),
                }
            }
        };

        if let Err(e) = send_reply(self.pusher, connection, &reply) {
            tracing::warn!("Failed to answer join request from {}: {}", connection, e);
        }

        result
    }
}
