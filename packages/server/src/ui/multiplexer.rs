//! Connection Multiplexer
//!
//! 1 本のイベントループ（hub）が Registry と送信キューを単独で所有します。
//! 各接続の reader タスクから届いたイベントは接続ごとに保留され、1 ラウンドで
//! 各接続につき最大 1 件を `ConnectionId` の昇順で処理します。
//!
//! ## 設計ノート
//!
//! - 復号は接続ごとのタスクで行うため、フレームの途中で止まった接続が他の接続を待たせることはない
//! - Registry への変更はこのループの中だけで起こるため、ロックは不要
//! - reader はイベントが処理されるまで次を読まないため、保留は接続ごとに高々 1 件
//! - 送信キューが溢れた接続（読み込まない相手）はそのラウンドの後に切断する
//! - accept の失敗後は [`ACCEPT_BACKOFF`] の間 accept を止める

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    future::Future,
    io,
    net::SocketAddr,
    time::Duration,
};

use chatrelay_shared::protocol::{ProtocolError, Request};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::{AbortHandle, JoinSet},
    time::Instant,
};

use crate::{
    domain::{ConnectionId, ConnectionIdFactory, Registry},
    infrastructure::ConnectionPusher,
    usecase::{
        JoinGroupUseCase, LeaveGroupUseCase, ListGroupsUseCase, RelayError, RelayMessageUseCase,
    },
};

use super::connection::{
    ConnectionEvent, ConnectionEventKind, ConnectionLimits, ConnectionTasks, spawn_connection,
};

/// accept が失敗してから次の accept までの待ち時間
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// 接続中のクライアント
#[derive(Debug)]
struct Peer {
    addr: SocketAddr,
    tasks: Vec<AbortHandle>,
}

/// 接続の多重化とリクエストの振り分けを行うイベントループ
pub struct Multiplexer {
    registry: Registry,
    pusher: ConnectionPusher,
    ids: ConnectionIdFactory,
    peers: HashMap<ConnectionId, Peer>,
    pending: BTreeMap<ConnectionId, VecDeque<ConnectionEvent>>,
    events_tx: mpsc::Sender<ConnectionEvent>,
    events_rx: mpsc::Receiver<ConnectionEvent>,
    tasks: JoinSet<()>,
    limits: ConnectionLimits,
    accept_resume: Option<Instant>,
}

impl Multiplexer {
    /// # Arguments
    ///
    /// * `registry` - 起動時に構築した Registry
    /// * `limits` - 受信ペイロードの上限と送信キューの長さ
    /// * `event_queue_depth` - reader タスクから hub へのイベントキューの長さ
    pub fn new(registry: Registry, limits: ConnectionLimits, event_queue_depth: usize) -> Self {
        let (events_tx, events_rx) = mpsc::channel(event_queue_depth.max(1));
        Self {
            registry,
            pusher: ConnectionPusher::new(),
            ids: ConnectionIdFactory::new(),
            peers: HashMap::new(),
            pending: BTreeMap::new(),
            events_tx,
            events_rx,
            tasks: JoinSet::new(),
            limits,
            accept_resume: None,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// 接続中のクライアント数
    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }

    /// `shutdown` が完了するまでイベントループを回す
    ///
    /// 終了時には全ての接続タスクを中断し、最終状態の Registry を返します。
    pub async fn run<F>(mut self, listener: TcpListener, shutdown: F) -> Registry
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let resume = self.accept_resume;
            tokio::select! {
                biased;

                _ = &mut shutdown => break,
                accepted = listener.accept(), if resume.is_none() => self.on_accept(accepted),
                _ = tokio::time::sleep_until(resume.unwrap_or_else(Instant::now)),
                    if resume.is_some() =>
                {
                    self.accept_resume = None;
                }
                Some(event) = self.events_rx.recv() => self.enqueue(event),
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!("Connection task panicked: {}", e);
                        }
                    }
                }
                _ = std::future::ready(()), if !self.pending.is_empty() => {}
            }

            while let Ok(event) = self.events_rx.try_recv() {
                self.enqueue(event);
            }
            self.service_round();
        }

        tracing::info!("Closing {} connection(s)", self.peers.len());
        self.tasks.abort_all();
        self.registry
    }

    fn on_accept(&mut self, accepted: io::Result<(TcpStream, SocketAddr)>) {
        match accepted {
            Ok((stream, peer)) => self.attach(stream, peer),
            Err(e) => {
                tracing::warn!(
                    "Failed to accept connection: {} (retrying in {:?})",
                    e,
                    ACCEPT_BACKOFF
                );
                self.accept_resume = Some(Instant::now() + ACCEPT_BACKOFF);
            }
        }
    }

    fn attach(&mut self, stream: TcpStream, addr: SocketAddr) {
        let connection = self.ids.generate();
        let ConnectionTasks {
            pusher,
            reader,
            writer,
        } = spawn_connection(
            &mut self.tasks,
            connection,
            stream,
            self.events_tx.clone(),
            self.limits,
        );
        self.pusher.register_client(connection, pusher);
        self.peers.insert(
            connection,
            Peer {
                addr,
                tasks: vec![reader, writer],
            },
        );
        tracing::info!("Connection {} from {}", connection, addr);
    }

    fn enqueue(&mut self, event: ConnectionEvent) {
        self.pending
            .entry(event.connection)
            .or_default()
            .push_back(event);
    }

    /// 保留中のイベントを接続ごとに 1 件ずつ、ConnectionId の昇順で処理する
    fn service_round(&mut self) {
        let ready: Vec<ConnectionId> = self.pending.keys().copied().collect();
        for connection in ready {
            let Some(queue) = self.pending.get_mut(&connection) else {
                continue;
            };
            let event = queue.pop_front();
            if queue.is_empty() {
                self.pending.remove(&connection);
            }
            if let Some(event) = event {
                self.dispatch(event);
            }
            self.drop_overflowed();
        }
    }

    fn dispatch(&mut self, event: ConnectionEvent) {
        let connection = event.connection;
        if !self.peers.contains_key(&connection) {
            tracing::trace!("Ignoring event from closed connection {}", connection);
            return;
        }
        match event.kind {
            ConnectionEventKind::Request(request) => self.handle_request(connection, request),
            ConnectionEventKind::Disconnected(reason) => self.close(connection, &reason),
        }
    }

    fn handle_request(&mut self, connection: ConnectionId, request: Request) {
        tracing::debug!("{} from {}", request.kind(), connection);
        let max_payload = self.limits.max_payload;
        match request {
            Request::ListGroups => {
                let result = ListGroupsUseCase::new(&self.registry, &self.pusher, max_payload)
                    .execute(connection);
                if let Err(e) = result {
                    tracing::warn!("Failed to send group list to {}: {}", connection, e);
                }
            }
            Request::JoinGroup { group, member } => {
                // 拒否は返信済み。接続はそのまま維持する
                let _ = JoinGroupUseCase::new(&mut self.registry, &self.pusher)
                    .execute(connection, &group, &member);
            }
            Request::LeaveGroup => {
                LeaveGroupUseCase::new(&mut self.registry).execute(connection);
            }
            Request::UserText { text } => {
                let result = RelayMessageUseCase::new(&self.registry, &self.pusher, max_payload)
                    .execute(connection, &text);
                match result {
                    Ok(report) if !report.failed.is_empty() => {
                        tracing::debug!(
                            "Relay from {} missed {} recipient(s)",
                            connection,
                            report.failed.len()
                        );
                    }
                    Ok(_) => {}
                    Err(RelayError::UnknownSender(_)) => {
                        tracing::warn!(
                            "strange: text from {} which has not joined a group, dropped",
                            connection
                        );
                    }
                    Err(e @ RelayError::TooLarge { .. }) => {
                        tracing::warn!("Dropping text from {}: {}", connection, e);
                    }
                    Err(e) => tracing::warn!("Failed to relay text from {}: {}", connection, e),
                }
            }
        }
    }

    /// 接続を閉じる。参加中なら明示的な LeaveGroup と同じ後始末を行う
    fn close(&mut self, connection: ConnectionId, reason: &ProtocolError) {
        let peer = self.detach(connection);
        if reason.is_transport() {
            tracing::info!("Connection {} ({}) closed: {}", connection, peer, reason);
        } else {
            tracing::warn!("Dropping connection {} ({}): {}", connection, peer, reason);
        }
    }

    /// 送信キューが溢れた接続を、書き出し途中のパケットごと切断する
    fn drop_overflowed(&mut self) {
        for connection in self.pusher.take_overflowed() {
            if let Some(peer) = self.peers.get(&connection) {
                peer.tasks.iter().for_each(AbortHandle::abort);
            }
            let peer = self.detach(connection);
            tracing::warn!(
                "Dropping connection {} ({}): not reading, outbound queue full",
                connection,
                peer
            );
        }
    }

    /// Registry・送信キュー・保留イベントから接続を取り除き、相手のアドレスを返す
    fn detach(&mut self, connection: ConnectionId) -> String {
        LeaveGroupUseCase::new(&mut self.registry).execute(connection);
        self.pusher.unregister_client(connection);
        self.pending.remove(&connection);
        self.peers
            .remove(&connection)
            .map(|peer| peer.addr.to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GroupDefinition;
    use chatrelay_shared::protocol::{DEFAULT_MAX_PAYLOAD, Packet, Reply};
    use tokio::sync::mpsc::Receiver;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - イベントの振り分け（ソケットを使わず、送信キューを直接登録する）
    // - 1 ラウンドで各接続 1 件ずつ、ConnectionId 昇順に処理されること
    // - 切断時の後始末が LeaveGroup と同じ状態になること
    // - 送信キューが溢れた接続の切断、accept 失敗後の待機
    // ========================================

    fn create_multiplexer() -> Multiplexer {
        let registry = Registry::load([
            GroupDefinition::new("lobby", 2),
            GroupDefinition::new("dev", 5),
        ])
        .unwrap();
        let limits = ConnectionLimits {
            max_payload: DEFAULT_MAX_PAYLOAD,
            outbound_queue_depth: 16,
        };
        Multiplexer::new(registry, limits, 16)
    }

    fn register(mux: &mut Multiplexer) -> (ConnectionId, Receiver<Packet>) {
        register_with_depth(mux, 16)
    }

    /// ソケットの代わりに長さ `depth` の送信キューを登録する
    fn register_with_depth(
        mux: &mut Multiplexer,
        depth: usize,
    ) -> (ConnectionId, Receiver<Packet>) {
        let connection = mux.ids.generate();
        let (tx, rx) = mpsc::channel(depth);
        mux.pusher.register_client(connection, tx);
        let peer = Peer {
            addr: SocketAddr::from(([127, 0, 0, 1], 40000)),
            tasks: Vec::new(),
        };
        mux.peers.insert(connection, peer);
        (connection, rx)
    }

    fn request(connection: ConnectionId, request: Request) -> ConnectionEvent {
        ConnectionEvent::new(connection, ConnectionEventKind::Request(request))
    }

    fn disconnected(connection: ConnectionId, reason: ProtocolError) -> ConnectionEvent {
        ConnectionEvent::new(connection, ConnectionEventKind::Disconnected(reason))
    }

    fn join(connection: ConnectionId, group: &str, member: &str) -> ConnectionEvent {
        request(
            connection,
            Request::JoinGroup {
                group: group.to_string(),
                member: member.to_string(),
            },
        )
    }

    fn replies(rx: &mut Receiver<Packet>) -> Vec<Reply> {
        let mut replies = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            replies.push(Reply::try_from(packet).unwrap());
        }
        replies
    }

    #[test]
    fn test_round_services_one_event_per_connection_in_id_order() {
        // テスト項目: 1 ラウンドでは各接続の先頭イベントだけが ConnectionId 昇順に処理される
        // given (前提条件):
        let mut mux = create_multiplexer();
        let (a, mut a_rx) = register(&mut mux);
        let (b, mut b_rx) = register(&mut mux);
        // b の方が先に届いても、a が先に処理される
        mux.enqueue(join(b, "lobby", "alice"));
        mux.enqueue(join(a, "lobby", "alice"));
        mux.enqueue(request(a, Request::LeaveGroup));

        // when (操作):
        mux.service_round();

        // then (期待する結果):
        assert_eq!(replies(&mut a_rx), vec![Reply::JoinAccepted]);
        assert_eq!(
            replies(&mut b_rx),
            vec![Reply::JoinRejected {
                reason: "member name already exists".to_string()
            }]
        );
        // a の LeaveGroup は次のラウンドまで保留
        assert!(mux.registry().find_member_by_name("alice").is_some());
        assert_eq!(mux.pending.len(), 1);

        mux.service_round();
        assert!(mux.registry().find_member_by_name("alice").is_none());
        assert!(mux.pending.is_empty());
    }

    #[test]
    fn test_lobby_scenario() {
        // テスト項目: 満室・名前重複・中継・切断の一連のシナリオ
        // given (前提条件):
        let mut mux = create_multiplexer();
        let (a, mut a_rx) = register(&mut mux);
        let (b, mut b_rx) = register(&mut mux);
        let (c, mut c_rx) = register(&mut mux);

        // when (操作):
        mux.enqueue(join(a, "lobby", "alice"));
        mux.service_round();
        mux.enqueue(join(b, "lobby", "alice"));
        mux.service_round();
        mux.enqueue(join(b, "lobby", "bob"));
        mux.service_round();
        mux.enqueue(join(c, "lobby", "carol"));
        mux.service_round();
        mux.enqueue(request(a, Request::UserText { text: "hi".to_string() }));
        mux.service_round();

        // then (期待する結果):
        assert_eq!(replies(&mut a_rx), vec![Reply::JoinAccepted]);
        assert_eq!(
            replies(&mut b_rx),
            vec![
                Reply::JoinRejected {
                    reason: "member name already exists".to_string()
                },
                Reply::JoinAccepted,
                Reply::UserText {
                    sender: "alice".to_string(),
                    text: "hi".to_string()
                },
            ]
        );
        assert_eq!(
            replies(&mut c_rx),
            vec![Reply::JoinRejected {
                reason: "room is full".to_string()
            }]
        );

        // a が切断すると alice は消え、lobby の occupancy は 1 に戻る
        mux.enqueue(disconnected(a, ProtocolError::ConnectionClosed));
        mux.service_round();
        assert!(mux.registry().find_member_by_name("alice").is_none());
        assert_eq!(mux.registry().list_groups()[0].occupancy, 1);
        assert_eq!(mux.connection_count(), 2);
        assert!(!mux.pusher.is_registered(a));
    }

    #[test]
    fn test_disconnect_matches_explicit_leave() {
        // テスト項目: 切断による後始末は明示的な LeaveGroup と同じ Registry 状態になる
        // given (前提条件):
        let mut left = create_multiplexer();
        let mut dropped = create_multiplexer();
        let (l, _l_rx) = register(&mut left);
        let (d, _d_rx) = register(&mut dropped);
        left.enqueue(join(l, "dev", "erin"));
        dropped.enqueue(join(d, "dev", "erin"));
        left.service_round();
        dropped.service_round();

        // when (操作):
        left.enqueue(request(l, Request::LeaveGroup));
        dropped.enqueue(disconnected(d, ProtocolError::UnknownPacketType(9)));
        left.service_round();
        dropped.service_round();

        // then (期待する結果):
        assert_eq!(left.registry().list_groups(), dropped.registry().list_groups());
        assert!(dropped.registry().find_member_by_connection(d).is_none());
        assert_eq!(dropped.connection_count(), 0);
    }

    #[test]
    fn test_text_before_join_is_dropped() {
        // テスト項目: 参加前の UserText は誰にも配信されず、接続も維持される
        // given (前提条件):
        let mut mux = create_multiplexer();
        let (a, mut a_rx) = register(&mut mux);
        let (b, mut b_rx) = register(&mut mux);
        mux.enqueue(join(b, "lobby", "bob"));
        mux.service_round();
        replies(&mut b_rx);

        // when (操作):
        mux.enqueue(request(a, Request::UserText { text: "hello?".to_string() }));
        mux.service_round();

        // then (期待する結果):
        assert!(replies(&mut a_rx).is_empty());
        assert!(replies(&mut b_rx).is_empty());
        assert!(mux.pusher.is_registered(a));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        // テスト項目: shutdown が完了するとイベントループが終了し Registry が返る
        // given (前提条件):
        let mux = create_multiplexer();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        // when (操作):
        let registry = mux.run(listener, async {}).await;

        // then (期待する結果):
        assert_eq!(registry.list_groups().len(), 2);
    }

    #[test]
    fn test_connection_with_full_outbound_queue_is_dropped() {
        // テスト項目: 読み込まない接続は送信キューが溢れた時点で切断され、参加も解除される
        // given (前提条件):
        let mut mux = create_multiplexer();
        let (slow, _slow_rx) = register_with_depth(&mut mux, 1);
        let (b, mut b_rx) = register(&mut mux);
        mux.enqueue(join(slow, "dev", "sloth"));
        mux.enqueue(join(b, "dev", "bob"));
        mux.service_round();
        // JoinAccepted で slow の送信キューは満杯

        // when (操作):
        mux.enqueue(request(b, Request::UserText { text: "ping".to_string() }));
        mux.service_round();

        // then (期待する結果):
        assert!(mux.registry().find_member_by_name("sloth").is_none());
        assert!(!mux.pusher.is_registered(slow));
        assert!(mux.pending.is_empty());
        assert_eq!(mux.connection_count(), 1);
        assert_eq!(replies(&mut b_rx), vec![Reply::JoinAccepted]);
        assert!(mux.pusher.is_registered(b));
    }

    #[test]
    fn test_events_from_closed_connection_are_ignored() {
        // テスト項目: 切断済みの接続から届いたイベントは無視される
        // given (前提条件):
        let mut mux = create_multiplexer();
        let (a, _a_rx) = register(&mut mux);
        mux.enqueue(disconnected(a, ProtocolError::ConnectionClosed));
        mux.service_round();

        // when (操作):
        mux.enqueue(join(a, "lobby", "ghost"));
        mux.service_round();

        // then (期待する結果):
        assert!(mux.registry().find_member_by_name("ghost").is_none());
        assert_eq!(mux.registry().member_count(), 0);
    }

    #[test]
    fn test_oversized_relay_is_dropped() {
        // テスト項目: 中継すると上限を超えるテキストは誰にも配信されず、接続は維持される
        // given (前提条件):
        let mut mux = create_multiplexer();
        let (a, mut a_rx) = register(&mut mux);
        let (b, mut b_rx) = register(&mut mux);
        mux.enqueue(join(a, "lobby", "alice"));
        mux.enqueue(join(b, "lobby", "bob"));
        mux.service_round();
        replies(&mut a_rx);
        replies(&mut b_rx);

        // when (操作):
        let text = "x".repeat(DEFAULT_MAX_PAYLOAD - 1);
        mux.enqueue(request(a, Request::UserText { text }));
        mux.service_round();

        // then (期待する結果):
        assert!(replies(&mut b_rx).is_empty());
        assert!(mux.pusher.is_registered(a));
        assert_eq!(mux.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_accept_failure_pauses_accepting() {
        // テスト項目: accept の失敗後は一定時間 accept を止める
        // given (前提条件):
        let mut mux = create_multiplexer();
        let before = Instant::now();

        // when (操作):
        mux.on_accept(Err(io::Error::other("too many open files")));

        // then (期待する結果):
        let resume = mux.accept_resume.unwrap();
        assert!(resume >= before + ACCEPT_BACKOFF);
        assert_eq!(mux.connection_count(), 0);
    }
}
