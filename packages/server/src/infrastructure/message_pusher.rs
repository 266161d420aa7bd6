//! 接続ごとの送信キューを使った PacketPusher 実装
//!
//! ## 責務
//!
//! - 接続中のクライアントごとの `Sender<Packet>` を管理
//! - パケットを送信キューに積む（実際のソケット書き込みは各接続の writer タスク）
//! - 送信キューが溢れた接続を記録し、イベントループに切断させる
//!
//! ## 設計ノート
//!
//! 送信キューの生成は UI 層（`ui::connection`）で行われます。このマップは
//! Multiplexer のイベントループだけが所有するため、ロックは不要です。
//!
//! 送信キューは有界です。読み込まない相手のために関数を待たせることはせず、
//! キューが満杯なら `PushError::QueueFull` を返してその接続を溢れとして記録します。

use std::{cell::RefCell, collections::HashMap};

use chatrelay_shared::protocol::Packet;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::{ConnectionId, PacketPusher, PushError};

/// 1 つの接続の送信キュー
pub type PusherChannel = mpsc::Sender<Packet>;

/// 送信キューを使った PacketPusher 実装
#[derive(Debug, Default)]
pub struct ConnectionPusher {
    clients: HashMap<ConnectionId, PusherChannel>,
    overflowed: RefCell<Vec<ConnectionId>>,
}

impl ConnectionPusher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_client(&mut self, connection: ConnectionId, sender: PusherChannel) {
        self.clients.insert(connection, sender);
        tracing::debug!("Connection {} registered to ConnectionPusher", connection);
    }

    /// 送信キューを破棄する。writer タスクは残りを書き出してから終了する
    pub fn unregister_client(&mut self, connection: ConnectionId) -> bool {
        let removed = self.clients.remove(&connection).is_some();
        if removed {
            tracing::debug!("Connection {} unregistered from ConnectionPusher", connection);
        }
        removed
    }

    pub fn is_registered(&self, connection: ConnectionId) -> bool {
        self.clients.contains_key(&connection)
    }

    /// 前回の呼び出し以降に送信キューが溢れた接続（重複なし、発生順）
    pub fn take_overflowed(&self) -> Vec<ConnectionId> {
        std::mem::take(&mut *self.overflowed.borrow_mut())
    }
}

impl PacketPusher for ConnectionPusher {
    fn push(&self, connection: ConnectionId, packet: Packet) -> Result<(), PushError> {
        let sender = self
            .clients
            .get(&connection)
            .ok_or(PushError::ConnectionNotFound(connection))?;
        match sender.try_send(packet) {
            Ok(()) => {
                tracing::trace!("Queued packet for {}", connection);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                let mut overflowed = self.overflowed.borrow_mut();
                if !overflowed.contains(&connection) {
                    overflowed.push(connection);
                }
                Err(PushError::QueueFull(connection))
            }
            Err(TrySendError::Closed(_)) => Err(PushError::ChannelClosed(connection)),
        }
    }
}
