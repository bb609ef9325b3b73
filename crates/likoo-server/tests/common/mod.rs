//! Shared harness: a seeded on-disk database and a live server.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use likoo_db::{create_pool, run_migrations, DbRuntimeSettings};
use likoo_server::config::Config;
use likoo_server::{app, auth, AppState};
use likoo_store::{add_server_member, create_channel, create_server, create_user};
use likoo_store::{NewChannel, NewServer, NewUser};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const SECRET: &str = "integration-secret";

/// Holds the temp directory alive for the lifetime of the test.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _dir: TempDir,
}

impl TestServer {
    pub fn token(&self, user_id: &str) -> String {
        auth::issue_token(user_id, &self.state.token_key, 60)
    }

    pub async fn connect(&self, user_id: &str) -> TestClient {
        let url = format!("ws://{}/ws?token={}", self.addr, self.token(user_id));
        TestClient::open(&url).await
    }
}

/// Users u1 "ana", u2 "bo", u3 "cy"; server s1 owned by u1 with u2 as a
/// member; text channel c1 in s1.
pub fn seeded_state(config: &Config) -> (AppState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("likoo.db");
    let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
        create_user(&conn, &NewUser::new("u1", "ana", "ana@likoo.test")).unwrap();
        create_user(&conn, &NewUser::new("u2", "bo", "bo@likoo.test")).unwrap();
        create_user(&conn, &NewUser::new("u3", "cy", "cy@likoo.test")).unwrap();
        create_server(
            &conn,
            &NewServer {
                id: "s1".to_string(),
                name: "Home".to_string(),
                owner_id: "u1".to_string(),
            },
        )
        .unwrap();
        add_server_member(&conn, "s1", "u2").unwrap();
        create_channel(&conn, &NewChannel::text("c1", "general", "s1")).unwrap();
    }
    let state = AppState::new(pool, auth::derive_token_key(SECRET), config);
    (state, dir)
}

pub async fn start_server() -> TestServer {
    start_server_with(Config::default()).await
}

pub async fn start_server_with(config: Config) -> TestServer {
    let (state, dir) = seeded_state(&config);
    let router = app(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        addr,
        state,
        _dir: dir,
    }
}

/// A WebSocket client speaking the `{event, data}` envelope.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Connects and consumes the `connect_response` greeting.
    pub async fn open(url: &str) -> Self {
        let (ws, _) = connect_async(url).await.expect("failed to connect");
        let mut client = Self { ws };
        let greeting = client.next_event().await;
        assert_eq!(greeting["event"], "connect_response");
        client
    }

    pub async fn emit(&mut self, event: &str, data: Value) {
        let frame = serde_json::json!({"event": event, "data": data}).to_string();
        self.ws
            .send(Message::Text(frame.into()))
            .await
            .expect("failed to send frame");
    }

    /// Next text frame, parsed. Panics after two seconds of silence.
    pub async fn next_event(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return serde_json::from_str(text.as_str()).expect("frames are JSON")
                    }
                    Some(Ok(_)) => continue,
                    other => panic!("socket ended: {other:?}"),
                }
            }
        })
        .await
        .expect("timed out waiting for a frame")
    }

    /// Asserts nothing arrives for a short while.
    pub async fn expect_silence(&mut self) {
        let waited = tokio::time::timeout(Duration::from_millis(200), self.ws.next()).await;
        if let Ok(Some(Ok(Message::Text(text)))) = waited {
            panic!("unexpected frame: {}", text.as_str());
        }
    }

    /// Joins a channel and waits for the join to be acknowledged.
    pub async fn join_channel(&mut self, channel_id: &str) {
        self.emit("join_channel", serde_json::json!({"channel_id": channel_id}))
            .await;
        let status = self.next_event().await;
        assert_eq!(status["event"], "status");
        assert_eq!(status["data"]["channel_id"], channel_id);
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
