//! UseCase: メッセージ中継（Message Router）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RelayMessageUseCase::execute() メソッド
//! - 送信者のグループの他メンバーへの (senderName, text) の配信
//!
//! ### なぜこのテストが必要か
//! - 送信者自身や他グループのメンバーに配信されてはならない
//! - 一部の宛先への送信失敗が残りの配信を妨げてはならない（best-effort）
//! - 中継パケットは受信側のペイロード上限を超えてはならない（超える場合は誰にも配信しない）
//!
//! ### どのような状況を想定しているか
//! - 正常系：同じグループの複数メンバーへの配信
//! - 異常系：未参加の接続からの送信（内部的な異常として破棄）
//! - エッジケース：送信者しかいないグループ、一部宛先の送信失敗、上限ちょうどの text

use chatrelay_shared::protocol::Reply;

use crate::domain::{ConnectionId, PacketPusher, Registry};

use super::RelayError;

/// 1 回の中継の配信結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: Vec<ConnectionId>,
    pub failed: Vec<ConnectionId>,
}

/// メッセージ中継のユースケース
pub struct RelayMessageUseCase<'a> {
    registry: &'a Registry,
    pusher: &'a dyn PacketPusher,
    max_payload: usize,
}

impl<'a> RelayMessageUseCase<'a> {
    /// `max_payload` は中継パケット（senderName と text）のペイロード上限
    pub fn new(registry: &'a Registry, pusher: &'a dyn PacketPusher, max_payload: usize) -> Self {
        Self {
            registry,
            pusher,
            max_payload,
        }
    }

    /// 送信者のグループの他メンバー全員に text を中継する
    ///
    /// 宛先ごとの送信は独立しており、失敗は `RelayReport::failed` に記録して続行します。
    ///
    /// # Returns
    ///
    /// * `Ok(RelayReport)` - 中継完了（部分失敗を含む）
    /// * `Err(RelayError::UnknownSender)` - 送信者がどのグループにも参加していない
    /// * `Err(RelayError::TooLarge)` - 中継パケットが上限を超える（誰にも配信しない）
    pub fn execute(self, connection: ConnectionId, text: &str) -> Result<RelayReport, RelayError> {
        let sender = self
            .registry
            .find_member_by_connection(connection)
            .ok_or(RelayError::UnknownSender(connection))?;

        let packet = Reply::UserText {
            sender: sender.name.clone(),
            text: text.to_string(),
        }
        .to_packet()?;
        if packet.length() > self.max_payload {
            return Err(RelayError::TooLarge {
                length: packet.length(),
                max: self.max_payload,
            });
        }

        let mut report = RelayReport::default();
        let recipients = self
            .registry
            .members_of(sender.group)
            .iter()
            .filter(|member| member.connection != connection);
        for member in recipients {
            match self.pusher.push(member.connection, packet.clone()) {
                Ok(()) => report.delivered.push(member.connection),
                Err(e) => {
                    tracing::warn!("Failed to relay message to '{}': {}", member.name, e);
                    report.failed.push(member.connection);
                }
            }
        }

        tracing::info!("{}: {}", sender.name, text.trim_end());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{GroupDefinition, MockPacketPusher, PushError},
        usecase::test_support::RecordingPusher,
    };
    use chatrelay_shared::protocol::{DEFAULT_MAX_PAYLOAD, PacketType};

    fn conn(value: u64) -> ConnectionId {
        ConnectionId::new(value)
    }

    /// lobby: alice(1), bob(2), dave(4) / dev: carol(3)
    fn create_test_registry() -> Registry {
        let mut registry = Registry::load([
            GroupDefinition::new("lobby", 5),
            GroupDefinition::new("dev", 5),
        ])
        .unwrap();
        registry.join(conn(1), "lobby", "alice").unwrap();
        registry.join(conn(2), "lobby", "bob").unwrap();
        registry.join(conn(3), "dev", "carol").unwrap();
        registry.join(conn(4), "lobby", "dave").unwrap();
        registry
    }

    #[test]
    fn test_relay_reaches_other_members_of_the_same_group_only() {
        // テスト項目: 送信者以外の同じグループのメンバーにだけ配信される
        // given (前提条件):
        let registry = create_test_registry();
        let pusher = RecordingPusher::default();

        // when (操作):
        let report = RelayMessageUseCase::new(&registry, &pusher, DEFAULT_MAX_PAYLOAD)
            .execute(conn(1), "hi")
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.delivered, vec![conn(2), conn(4)]);
        assert!(report.failed.is_empty());
        assert_eq!(pusher.recipients(), vec![conn(2), conn(4)]);
        assert_eq!(
            pusher.replies_to(conn(2)),
            vec![Reply::UserText {
                sender: "alice".to_string(),
                text: "hi".to_string()
            }]
        );
        assert!(pusher.replies_to(conn(1)).is_empty());
        assert!(pusher.replies_to(conn(3)).is_empty());
    }

    #[test]
    fn test_relay_from_unjoined_connection_is_dropped() {
        // テスト項目: 未参加の接続からの送信は破棄され誰にも配信されない
        // given (前提条件):
        let registry = create_test_registry();
        let mut pusher = MockPacketPusher::new();
        pusher.expect_push().never();

        // when (操作):
        let result = RelayMessageUseCase::new(&registry, &pusher, DEFAULT_MAX_PAYLOAD)
            .execute(conn(99), "hello?");

        // then (期待する結果):
        assert!(matches!(result, Err(RelayError::UnknownSender(c)) if c == conn(99)));
    }

    #[test]
    fn test_relay_alone_in_group_delivers_nothing() {
        // テスト項目: グループに送信者しかいない場合は配信先がない
        // given (前提条件):
        let registry = create_test_registry();
        let pusher = RecordingPusher::default();

        // when (操作):
        let report = RelayMessageUseCase::new(&registry, &pusher, DEFAULT_MAX_PAYLOAD)
            .execute(conn(3), "anyone?")
            .unwrap();

        // then (期待する結果):
        assert_eq!(report, RelayReport::default());
        assert!(pusher.sent.borrow().is_empty());
    }

    #[test]
    fn test_relay_continues_after_partial_failure() {
        // テスト項目: 一部の宛先への送信に失敗しても残りの宛先には配信される
        // given (前提条件):
        let registry = create_test_registry();
        let mut pusher = MockPacketPusher::new();
        pusher
            .expect_push()
            .withf(|connection, _| *connection == ConnectionId::new(2))
            .times(1)
            .returning(|connection, _| Err(PushError::ChannelClosed(connection)));
        pusher
            .expect_push()
            .withf(|connection, packet| {
                *connection == ConnectionId::new(4) && packet.kind == PacketType::UserText
            })
            .times(1)
            .returning(|_, _| Ok(()));

        // when (操作):
        let report = RelayMessageUseCase::new(&registry, &pusher, DEFAULT_MAX_PAYLOAD)
            .execute(conn(1), "hi")
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.failed, vec![conn(2)]);
        assert_eq!(report.delivered, vec![conn(4)]);
    }

    #[test]
    fn test_relay_text_at_payload_limit_is_delivered() {
        // テスト項目: "alice\0" + text + "\0" がちょうど上限に収まる text は配信される
        // given (前提条件):
        let registry = create_test_registry();
        let pusher = RecordingPusher::default();
        let text = "x".repeat(DEFAULT_MAX_PAYLOAD - "alice".len() - 2);

        // when (操作):
        let report = RelayMessageUseCase::new(&registry, &pusher, DEFAULT_MAX_PAYLOAD)
            .execute(conn(1), &text)
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.delivered, vec![conn(2), conn(4)]);
        let sent = pusher.sent.borrow();
        assert!(sent.iter().all(|(_, packet)| packet.length() == DEFAULT_MAX_PAYLOAD));
    }

    #[test]
    fn test_relay_text_over_payload_limit_is_dropped() {
        // テスト項目: 受信時には上限内でも、中継すると上限を超える text は誰にも配信されない
        // given (前提条件):
        let registry = create_test_registry();
        let mut pusher = MockPacketPusher::new();
        pusher.expect_push().never();
        // 受信時のペイロードは text + "\0" でちょうど上限
        let text = "x".repeat(DEFAULT_MAX_PAYLOAD - 1);

        // when (操作):
        let result = RelayMessageUseCase::new(&registry, &pusher, DEFAULT_MAX_PAYLOAD)
            .execute(conn(1), &text);

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(RelayError::TooLarge { length, max })
                if length == DEFAULT_MAX_PAYLOAD + "alice".len() + 1 && max == DEFAULT_MAX_PAYLOAD
        ));
    }
}
