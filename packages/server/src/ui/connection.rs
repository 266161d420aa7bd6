//! 接続ごとのタスク
//!
//! 受け付けたソケットを読み書きに分割し、2 つのタスクを起動します。
//!
//! - reader: パケットを 1 つずつ読み込み、`Request` に変換して Multiplexer に転送
//! - writer: 送信キューに積まれたパケットをソケットに書き出す
//!
//! Registry には一切触れません。状態の変更はすべて Multiplexer のイベントループで行います。
//!
//! ## 読み込みの制御
//!
//! reader は 1 つしかない許可（permit）を取得してから次のパケットを読み、許可を
//! イベントに添えて転送します。Multiplexer がイベントを処理して破棄するまで次の
//! 読み込みは始まらないため、hub に保留されるイベントは接続ごとに高々 1 件です。
//! 相手がそれ以上送ってきてもソケットの受信バッファに留まります。

use std::sync::Arc;

use chatrelay_shared::protocol::{Packet, ProtocolError, Request, read_packet, write_packet};
use tokio::{
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{OwnedSemaphorePermit, Semaphore, mpsc},
    task::{AbortHandle, JoinSet},
};

use crate::{domain::ConnectionId, infrastructure::PusherChannel};

/// reader タスクから Multiplexer への通知
#[derive(Debug)]
pub struct ConnectionEvent {
    pub connection: ConnectionId,
    pub kind: ConnectionEventKind,
    /// 破棄されるとその接続の reader が次のパケットを読み始める
    permit: Option<OwnedSemaphorePermit>,
}

impl ConnectionEvent {
    pub fn new(connection: ConnectionId, kind: ConnectionEventKind) -> Self {
        Self {
            connection,
            kind,
            permit: None,
        }
    }

    fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self.permit = Some(permit);
        self
    }
}

#[derive(Debug)]
pub enum ConnectionEventKind {
    /// 正しく復号できたリクエスト
    Request(Request),
    /// 切断、または復号の失敗。このイベントの後にその接続からのイベントは来ない
    Disconnected(ProtocolError),
}

/// 1 つの接続に適用する上限
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// 受信パケットのペイロード上限
    pub max_payload: usize,
    /// writer の送信キューの長さ。溢れた接続は切断される
    pub outbound_queue_depth: usize,
}

/// 起動した接続タスクへのハンドル
#[derive(Debug)]
pub(crate) struct ConnectionTasks {
    pub pusher: PusherChannel,
    pub reader: AbortHandle,
    pub writer: AbortHandle,
}

/// 接続の reader / writer タスクを起動する
pub(crate) fn spawn_connection(
    tasks: &mut JoinSet<()>,
    connection: ConnectionId,
    stream: TcpStream,
    events: mpsc::Sender<ConnectionEvent>,
    limits: ConnectionLimits,
) -> ConnectionTasks {
    let (reader, writer) = stream.into_split();
    let (pusher, rx) = mpsc::channel(limits.outbound_queue_depth.max(1));

    let reader = tasks.spawn(reader_loop(connection, reader, events, limits.max_payload));
    let writer = tasks.spawn(pusher_loop(connection, rx, writer));

    ConnectionTasks {
        pusher,
        reader,
        writer,
    }
}

async fn reader_loop(
    connection: ConnectionId,
    mut reader: OwnedReadHalf,
    events: mpsc::Sender<ConnectionEvent>,
    max_payload: usize,
) {
    let gate = Arc::new(Semaphore::new(1));
    loop {
        let Ok(permit) = gate.clone().acquire_owned().await else {
            return;
        };
        let kind = match read_packet(&mut reader, max_payload).await {
            Ok(packet) => {
                tracing::trace!(
                    "Received {} ({} bytes) from {}",
                    packet.kind,
                    packet.length(),
                    connection
                );
                match Request::try_from(packet) {
                    Ok(request) => ConnectionEventKind::Request(request),
                    Err(e) => ConnectionEventKind::Disconnected(e),
                }
            }
            Err(e) => ConnectionEventKind::Disconnected(e),
        };

        let closing = matches!(kind, ConnectionEventKind::Disconnected(_));
        let event = ConnectionEvent::new(connection, kind).with_permit(permit);
        if events.send(event).await.is_err() {
            // Multiplexer は終了済み
            return;
        }
        if closing {
            return;
        }
    }
}

/// 送信キューのパケットをソケットに書き出す
///
/// キューの送信側（`ConnectionPusher` の登録）が破棄されると、残りを書き出してから終了します。
async fn pusher_loop(
    connection: ConnectionId,
    mut rx: mpsc::Receiver<Packet>,
    mut writer: OwnedWriteHalf,
) {
    while let Some(packet) = rx.recv().await {
        if let Err(e) = write_packet(&mut writer, &packet).await {
            tracing::debug!("Failed to write to {}: {}", connection, e);
            break;
        }
    }
}
