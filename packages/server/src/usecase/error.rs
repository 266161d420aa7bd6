//! UseCase 層のエラー型

use chatrelay_shared::protocol::ProtocolError;
use thiserror::Error;

use crate::domain::{ConnectionId, PushError};

/// 返信の送信失敗
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to encode reply: {0}")]
    Encode(#[from] ProtocolError),

    #[error(transparent)]
    Push(#[from] PushError),
}

/// メッセージ中継の失敗
#[derive(Debug, Error)]
pub enum RelayError {
    /// 参加していない接続からの UserText（内部的な異常。返信はしない）
    #[error("strange: no member at {0}")]
    UnknownSender(ConnectionId),

    /// `senderName` と text を合わせると相手が受け取れるペイロード上限を超える
    #[error("relayed text of {length} bytes exceeds the maximum payload of {max} bytes")]
    TooLarge { length: usize, max: usize },

    #[error("failed to encode relayed text: {0}")]
    Encode(#[from] ProtocolError),
}
