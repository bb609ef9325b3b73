//! Persist-then-broadcast for channel and direct messages.

use crate::connections::ConnectionManager;
use crate::error::{FanoutError, StoreCallError};
use crate::event::OutgoingEvent;
use crate::locks::ChannelLocks;
use crate::store_call::{self, Completion, PendingCall};
use likoo_store::{
    ChatStore, ChannelMessage, DirectMessage, NewDirectMessage, NewMessage, StoreError,
};
use likoo_types::Room;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

/// Maximum accepted message body, in bytes.
pub const MAX_CONTENT_LEN: usize = 64 * 1024;

/// A persisted record and the number of sessions it reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered<T> {
    pub record: T,
    pub recipients: usize,
}

/// Validates, persists and fans out chat messages.
///
/// A message is broadcast only after the store confirmed the insert, and
/// for a given channel the persist/broadcast pairs never interleave, so
/// every member of a room sees messages in persistence order.
///
/// An insert that outlives the persistence timeout is not abandoned: the
/// sender gets [`FanoutError::PersistPending`] right away, the conversation
/// stays locked until the insert resolves, and a committed record is then
/// broadcast like any other.
pub struct FanoutEngine<S> {
    store: Arc<S>,
    connections: ConnectionManager,
    locks: ChannelLocks,
    persist_timeout: Duration,
}

impl<S: ChatStore> FanoutEngine<S> {
    pub fn new(store: Arc<S>, connections: ConnectionManager, persist_timeout: Duration) -> Self {
        Self {
            store,
            connections,
            locks: ChannelLocks::new(),
            persist_timeout,
        }
    }

    /// Persists a channel message and broadcasts `new_message` to
    /// `channel:<channel_id>`, the author's sessions included.
    pub async fn send_channel_message(
        &self,
        channel_id: &str,
        author_id: &str,
        content: &str,
    ) -> Result<Delivered<ChannelMessage>, FanoutError> {
        require("channel_id", channel_id)?;
        require("user_id", author_id)?;
        require("content", content)?;
        check_length(content)?;

        let new = NewMessage {
            channel_id: channel_id.to_string(),
            author_id: author_id.to_string(),
            content: content.to_string(),
        };

        let (author, channel) = {
            let author_id = new.author_id.clone();
            let channel_id = new.channel_id.clone();
            store_call::run(&self.store, self.persist_timeout, move |store| {
                Ok((store.find_user(&author_id)?, store.find_channel(&channel_id)?))
            })
            .await
            .map_err(FanoutError::Lookup)?
        };
        if author.is_none() {
            return Err(FanoutError::UnknownAuthor(new.author_id));
        }
        if channel.is_none() {
            return Err(FanoutError::UnknownChannel(new.channel_id));
        }

        let room = Room::Channel(new.channel_id.clone());
        let guard = self.locks.acquire(&room.to_string()).await;

        let delivered = self
            .persist_then_broadcast(
                guard,
                vec![room.clone()],
                move |store| store.insert_message(&new),
                OutgoingEvent::NewMessage,
            )
            .await?;

        tracing::debug!(
            room = %room,
            message_id = %delivered.record.id,
            recipients = delivered.recipients,
            "channel message delivered"
        );
        Ok(delivered)
    }

    /// Persists a direct message and pushes `new_dm` to both participants'
    /// personal rooms. A session in both rooms receives it once.
    pub async fn send_direct_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<Delivered<DirectMessage>, FanoutError> {
        require("sender_id", sender_id)?;
        require("receiver_id", receiver_id)?;
        require("content", content)?;
        check_length(content)?;

        let new = NewDirectMessage {
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
        };

        let (sender, receiver) = {
            let sender_id = new.sender_id.clone();
            let receiver_id = new.receiver_id.clone();
            store_call::run(&self.store, self.persist_timeout, move |store| {
                Ok((store.find_user(&sender_id)?, store.find_user(&receiver_id)?))
            })
            .await
            .map_err(FanoutError::Lookup)?
        };
        if sender.is_none() {
            return Err(FanoutError::UnknownAuthor(new.sender_id));
        }
        if receiver.is_none() {
            return Err(FanoutError::UnknownRecipient(new.receiver_id));
        }

        let rooms = vec![
            Room::User(new.receiver_id.clone()),
            Room::User(new.sender_id.clone()),
        ];
        let guard = self.locks.acquire(&conversation_key(sender_id, receiver_id)).await;

        let delivered = self
            .persist_then_broadcast(
                guard,
                rooms,
                move |store| store.insert_direct_message(&new),
                OutgoingEvent::NewDm,
            )
            .await?;

        tracing::debug!(
            message_id = %delivered.record.id,
            recipients = delivered.recipients,
            "direct message delivered"
        );
        Ok(delivered)
    }

    /// Runs the insert and broadcasts the committed record to `rooms`,
    /// holding `guard` until both are done.
    async fn persist_then_broadcast<T, F>(
        &self,
        guard: OwnedMutexGuard<()>,
        rooms: Vec<Room>,
        insert: F,
        event: fn(T) -> OutgoingEvent,
    ) -> Result<Delivered<T>, FanoutError>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
    {
        match store_call::run_or_pending(&self.store, self.persist_timeout, insert).await {
            Ok(Completion::Ready(record)) => {
                let frame = event(record.clone()).to_frame()?;
                let recipients = self.connections.broadcast_rooms(&rooms, &frame).await;
                drop(guard);
                Ok(Delivered { record, recipients })
            }
            Ok(Completion::Pending(task)) => {
                tracing::warn!(
                    room = %rooms[0],
                    "message persistence exceeded {:?}, broadcast deferred",
                    self.persist_timeout
                );
                tokio::spawn(finish_late(
                    task,
                    guard,
                    rooms,
                    event,
                    self.connections.clone(),
                ));
                Err(FanoutError::PersistPending(self.persist_timeout))
            }
            Err(e) => Err(persistence_failed(&rooms[0], e)),
        }
    }
}

/// Waits out an insert that exceeded the timeout and broadcasts it if it
/// committed. The conversation stays locked until then.
async fn finish_late<T>(
    task: PendingCall<T>,
    _guard: OwnedMutexGuard<()>,
    rooms: Vec<Room>,
    event: fn(T) -> OutgoingEvent,
    connections: ConnectionManager,
) {
    let record = match task.await {
        Ok(Ok(record)) => record,
        Ok(Err(e)) => {
            persistence_failed(&rooms[0], StoreCallError::Store(e));
            return;
        }
        Err(e) => {
            persistence_failed(&rooms[0], StoreCallError::Join(e));
            return;
        }
    };
    match event(record).to_frame() {
        Ok(frame) => {
            let recipients = connections.broadcast_rooms(&rooms, &frame).await;
            tracing::info!(room = %rooms[0], recipients, "message persisted late, broadcast");
        }
        Err(e) => tracing::error!(room = %rooms[0], "failed to encode late message: {}", e),
    }
}

fn require(field: &'static str, value: &str) -> Result<(), FanoutError> {
    if value.is_empty() {
        return Err(FanoutError::MissingField(field));
    }
    Ok(())
}

fn check_length(content: &str) -> Result<(), FanoutError> {
    if content.len() > MAX_CONTENT_LEN {
        return Err(FanoutError::ContentTooLong {
            max: MAX_CONTENT_LEN,
        });
    }
    Ok(())
}

fn persistence_failed(room: &Room, error: StoreCallError) -> FanoutError {
    tracing::error!(room = %room, "message not persisted, skipping broadcast: {}", error);
    FanoutError::Persistence(error)
}

/// Lock key shared by both directions of a conversation.
fn conversation_key(a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("dm:{low}:{high}")
}
