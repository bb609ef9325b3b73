//! In-memory `ChatStore` used by the realtime integration tests.

#![allow(dead_code)]

use likoo_realtime::{Gateway, GatewaySettings, SessionId};
use likoo_store::{
    Channel, ChannelMessage, ChatStore, DirectMessage, NewDirectMessage, NewMessage, Server,
    StoreError, User,
};
use likoo_types::{ChannelType, UserStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    channels: HashMap<String, Channel>,
    servers: HashMap<String, Server>,
    memberships: HashMap<String, Vec<String>>,
    messages: Vec<ChannelMessage>,
    direct_messages: Vec<DirectMessage>,
    next_id: u64,
}

/// Records every write; can be told to fail or stall inserts.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_writes: AtomicBool,
    insert_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, id: &str, username: &str) -> Self {
        self.state.lock().unwrap().users.insert(
            id.to_string(),
            User {
                id: id.to_string(),
                username: username.to_string(),
                email: format!("{username}@likoo.test"),
                avatar: "👤".to_string(),
                color: "#94a3b8".to_string(),
                status: UserStatus::Offline,
                tag: None,
                created_at: "2024-01-01T00:00:00.000Z".to_string(),
            },
        );
        self
    }

    pub fn with_server(self, id: &str, owner_id: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.servers.insert(
                id.to_string(),
                Server {
                    id: id.to_string(),
                    name: id.to_string(),
                    icon: "🎪".to_string(),
                    icon_image: None,
                    owner_id: owner_id.to_string(),
                    description: String::new(),
                    created_at: "2024-01-01T00:00:00.000Z".to_string(),
                },
            );
            state
                .memberships
                .entry(owner_id.to_string())
                .or_default()
                .push(id.to_string());
        }
        self
    }

    pub fn with_member(self, server_id: &str, user_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .memberships
            .entry(user_id.to_string())
            .or_default()
            .push(server_id.to_string());
        self
    }

    pub fn with_channel(self, id: &str, server_id: &str) -> Self {
        self.state.lock().unwrap().channels.insert(
            id.to_string(),
            Channel {
                id: id.to_string(),
                name: id.to_string(),
                server_id: server_id.to_string(),
                channel_type: ChannelType::Text,
                description: String::new(),
                created_at: "2024-01-01T00:00:00.000Z".to_string(),
            },
        );
        self
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn delay_inserts(&self, delay: Duration) {
        *self.insert_delay.lock().unwrap() = Some(delay);
    }

    pub fn messages(&self) -> Vec<ChannelMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn direct_messages(&self) -> Vec<DirectMessage> {
        self.state.lock().unwrap().direct_messages.clone()
    }

    pub fn status_of(&self, user_id: &str) -> Option<UserStatus> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(user_id)
            .map(|user| user.status)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::NotFound("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl ChatStore for MemoryStore {
    fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().unwrap().users.get(user_id).cloned())
    }

    fn find_channel(&self, channel_id: &str) -> Result<Option<Channel>, StoreError> {
        Ok(self.state.lock().unwrap().channels.get(channel_id).cloned())
    }

    fn find_server(&self, server_id: &str) -> Result<Option<Server>, StoreError> {
        Ok(self.state.lock().unwrap().servers.get(server_id).cloned())
    }

    fn insert_message(&self, message: &NewMessage) -> Result<ChannelMessage, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let author = state
            .users
            .get(&message.author_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(message.author_id.clone()))?;
        state.next_id += 1;
        let record = ChannelMessage {
            id: format!("m{}", state.next_id),
            content: message.content.clone(),
            author,
            channel_id: message.channel_id.clone(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            edited_at: None,
        };
        state.messages.push(record.clone());
        Ok(record)
    }

    fn insert_direct_message(
        &self,
        message: &NewDirectMessage,
    ) -> Result<DirectMessage, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let author = state
            .users
            .get(&message.sender_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(message.sender_id.clone()))?;
        state.next_id += 1;
        let record = DirectMessage {
            id: format!("d{}", state.next_id),
            content: message.content.clone(),
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            author,
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        };
        state.direct_messages.push(record.clone());
        Ok(record)
    }

    fn set_user_status(&self, user_id: &str, status: UserStatus) -> Result<bool, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        match state.users.get_mut(user_id) {
            Some(user) => {
                user.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_user_avatar(&self, user_id: &str, avatar: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        match state.users.get_mut(user_id) {
            Some(user) => {
                user.avatar = avatar.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn server_ids_for_user(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .memberships
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    fn set_server_icon(&self, server_id: &str, icon_image: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        match state.servers.get_mut(server_id) {
            Some(server) => {
                server.icon_image = Some(icon_image.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_channel_messages(
        &self,
        channel_id: &str,
        _limit: Option<u32>,
    ) -> Result<Vec<ChannelMessage>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect())
    }
}

/// Store with users u1 "ana", u2 "bo", u3 "cy", server s1 and channel c1.
pub fn seeded_store() -> MemoryStore {
    MemoryStore::new()
        .with_user("u1", "ana")
        .with_user("u2", "bo")
        .with_user("u3", "cy")
        .with_server("s1", "u1")
        .with_member("s1", "u2")
        .with_channel("c1", "s1")
}

pub fn gateway(store: Arc<MemoryStore>) -> Gateway<MemoryStore> {
    Gateway::new(store, GatewaySettings::default())
}

/// A connected test client.
pub struct Client {
    pub id: SessionId,
    pub rx: mpsc::Receiver<String>,
}

impl Client {
    /// Connects and discards the greeting.
    pub async fn connect(gateway: &Gateway<MemoryStore>, verified: Option<&str>) -> Self {
        let (tx, mut rx) = mpsc::channel(64);
        let id = gateway.connect(tx, verified.map(str::to_string)).await;
        let greeting = rx.try_recv().expect("connect_response");
        assert!(greeting.contains("connect_response"));
        Self { id, rx }
    }

    /// Every frame received so far, parsed.
    pub fn drain(&mut self) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&frame).expect("frames are JSON"));
        }
        frames
    }

    /// Names of the events received so far.
    pub fn events(&mut self) -> Vec<String> {
        self.drain()
            .into_iter()
            .map(|frame| frame["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}
