//! UseCase 層
//!
//! 各ユースケースは Registry と PacketPusher を借用して 1 つのリクエストを処理します。
//! 全て同期処理で、Multiplexer のイベントループから 1 件ずつ呼ばれます。

mod error;
mod join_group;
mod leave_group;
mod list_groups;
mod relay_message;

pub use error::{DeliveryError, RelayError};
pub use join_group::JoinGroupUseCase;
pub use leave_group::LeaveGroupUseCase;
pub use list_groups::ListGroupsUseCase;
pub use relay_message::{RelayMessageUseCase, RelayReport};

use chatrelay_shared::protocol::Reply;

use crate::domain::{ConnectionId, PacketPusher};

/// 1 つの接続に返信を送る
fn send_reply(
    pusher: &dyn PacketPusher,
    connection: ConnectionId,
    reply: &Reply,
) -> Result<(), DeliveryError> {
    let packet = reply.to_packet()?;
    pusher.push(connection, packet)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::RefCell;

    use chatrelay_shared::protocol::{Packet, Reply};

    use crate::domain::{ConnectionId, PacketPusher, PushError};

    /// 送信されたパケットを記録するだけの PacketPusher
    #[derive(Default)]
    pub struct RecordingPusher {
        pub sent: RefCell<Vec<(ConnectionId, Packet)>>,
    }

    impl RecordingPusher {
        /// `connection` 宛てに送られた返信をデコードして返す
        pub fn replies_to(&self, connection: ConnectionId) -> Vec<Reply> {
            self.sent
                .borrow()
                .iter()
                .filter(|(to, _)| *to == connection)
                .map(|(_, packet)| Reply::try_from(packet.clone()).unwrap())
                .collect()
        }

        pub fn recipients(&self) -> Vec<ConnectionId> {
            self.sent.borrow().iter().map(|(to, _)| *to).collect()
        }
    }

    impl PacketPusher for RecordingPusher {
        fn push(&self, connection: ConnectionId, packet: Packet) -> Result<(), PushError> {
            self.sent.borrow_mut().push((connection, packet));
            Ok(())
        }
    }
}
