//! Per-chat message buffers.
//!
//! Each chat owns a bounded FIFO of recent messages behind its own lock, so
//! traffic in one chat never waits on another chat's buffer. Every mutation is
//! persisted before the call returns; concurrent mutations share a single
//! write when one save already covers them.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::models::{ChatId, Message};
use super::persistence::{BufferPersistence, StoreImage};
use crate::errors::BotError;

type SharedBuffer = Arc<Mutex<VecDeque<Message>>>;

/// Result of [`BufferStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The message was stored; `evicted` oldest messages were dropped to stay
    /// within capacity.
    Stored { len: usize, evicted: usize },
    /// Blank author or text; nothing changed.
    Rejected,
}

pub struct BufferStore {
    capacity: usize,
    persistence: Arc<dyn BufferPersistence>,
    chats: RwLock<HashMap<ChatId, SharedBuffer>>,
    /// Bumped after every mutation, while the mutated buffer is still locked.
    mutation_seq: AtomicU64,
    /// Highest `mutation_seq` known to be on disk. Held for the whole save.
    persisted_seq: Mutex<u64>,
}

impl BufferStore {
    /// Build the store from whatever `persistence` last saved.
    ///
    /// Buffers saved under a larger capacity keep only their newest
    /// `capacity` messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the saved image exists but cannot be read.
    pub async fn load(
        persistence: Arc<dyn BufferPersistence>,
        capacity: usize,
    ) -> Result<Self, BotError> {
        let capacity = capacity.max(1);
        let image = persistence.load().await?;

        let mut chats = HashMap::with_capacity(image.len());
        let mut restored = 0;
        for (chat_id, messages) in image {
            let mut buffer: VecDeque<Message> = messages.into_iter().collect();
            while buffer.len() > capacity {
                buffer.pop_front();
            }
            restored += buffer.len();
            chats.insert(chat_id, Arc::new(Mutex::new(buffer)));
        }

        info!(
            "Loaded {} chat buffers holding {} messages (capacity {})",
            chats.len(),
            restored,
            capacity
        );

        Ok(Self {
            capacity,
            persistence,
            chats: RwLock::new(chats),
            mutation_seq: AtomicU64::new(0),
            persisted_seq: Mutex::new(0),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn chat_count(&self) -> usize {
        self.chats.read().await.len()
    }

    /// Create an empty buffer for `chat_id` unless one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a newly created buffer could not be persisted.
    pub async fn ensure_conversation(&self, chat_id: ChatId) -> Result<(), BotError> {
        if self.chats.read().await.contains_key(&chat_id) {
            return Ok(());
        }

        let seq = {
            let mut chats = self.chats.write().await;
            if chats.contains_key(&chat_id) {
                return Ok(());
            }
            chats.insert(chat_id, Arc::new(Mutex::new(VecDeque::new())));
            self.next_seq()
        };

        info!("Initialized new message buffer for chat_id: {}", chat_id);
        self.persist_through(seq).await
    }

    /// Append `message` to the tail of the chat's buffer, evicting from the
    /// head while the buffer is over capacity.
    ///
    /// The message is visible to [`snapshot`](Self::snapshot) as soon as it
    /// is stored, but it only counts as acknowledged once this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::StorageError`] if the updated store could not be
    /// persisted. The message stays in memory in that case.
    pub async fn append(&self, chat_id: ChatId, message: Message) -> Result<AppendOutcome, BotError> {
        if !message.is_valid() {
            debug!(
                "Dropping message with empty author or text in chat {}",
                chat_id
            );
            return Ok(AppendOutcome::Rejected);
        }

        let buffer = self.buffer_for(chat_id).await;
        let (len, evicted, seq) = {
            let mut buffer = buffer.lock().await;
            buffer.push_back(message);
            let mut evicted = 0;
            while buffer.len() > self.capacity {
                buffer.pop_front();
                evicted += 1;
            }
            (buffer.len(), evicted, self.next_seq())
        };

        if evicted > 0 {
            debug!(
                "Evicted {} oldest messages from chat {} (capacity {})",
                evicted, chat_id, self.capacity
            );
        }

        self.persist_through(seq).await?;
        Ok(AppendOutcome::Stored { len, evicted })
    }

    /// Ordered copy of the chat's buffer, oldest first. Empty if the chat has
    /// never been seen.
    pub async fn snapshot(&self, chat_id: ChatId) -> Vec<Message> {
        let Some(buffer) = self.existing_buffer(chat_id).await else {
            return Vec::new();
        };
        let buffer = buffer.lock().await;
        buffer.iter().cloned().collect()
    }

    pub async fn len(&self, chat_id: ChatId) -> usize {
        match self.existing_buffer(chat_id).await {
            Some(buffer) => buffer.lock().await.len(),
            None => 0,
        }
    }

    pub async fn is_empty(&self, chat_id: ChatId) -> bool {
        self.len(chat_id).await == 0
    }

    /// Empty the chat's buffer (the chat itself stays known) and persist.
    ///
    /// Anything appended between the caller's snapshot and this call is
    /// discarded too.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::StorageError`] if the cleared store could not be
    /// persisted.
    pub async fn clear(&self, chat_id: ChatId) -> Result<(), BotError> {
        let buffer = self.buffer_for(chat_id).await;
        let (dropped, seq) = {
            let mut buffer = buffer.lock().await;
            let dropped = buffer.len();
            buffer.clear();
            (dropped, self.next_seq())
        };

        debug!("Cleared {} messages from chat {}", dropped, chat_id);
        self.persist_through(seq).await
    }

    async fn existing_buffer(&self, chat_id: ChatId) -> Option<SharedBuffer> {
        self.chats.read().await.get(&chat_id).cloned()
    }

    async fn buffer_for(&self, chat_id: ChatId) -> SharedBuffer {
        if let Some(buffer) = self.existing_buffer(chat_id).await {
            return buffer;
        }

        let mut chats = self.chats.write().await;
        chats
            .entry(chat_id)
            .or_insert_with(|| {
                info!("Initialized new message buffer for chat_id: {}", chat_id);
                Arc::new(Mutex::new(VecDeque::new()))
            })
            .clone()
    }

    fn next_seq(&self) -> u64 {
        self.mutation_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Make sure every mutation up to `seq` is on disk.
    ///
    /// Saves are serialized. The image is captured after taking the save lock,
    /// so a save always writes a state at least as new as the one before it.
    async fn persist_through(&self, seq: u64) -> Result<(), BotError> {
        let mut persisted = self.persisted_seq.lock().await;
        if *persisted >= seq {
            return Ok(());
        }

        let covered = self.mutation_seq.load(Ordering::SeqCst);
        let image = self.capture_image().await;

        if let Err(e) = self.persistence.save(&image).await {
            warn!("Failed to persist message buffers: {}", e);
            return Err(e);
        }

        *persisted = covered;
        Ok(())
    }

    async fn capture_image(&self) -> StoreImage {
        let buffers: Vec<(ChatId, SharedBuffer)> = self
            .chats
            .read()
            .await
            .iter()
            .map(|(id, buffer)| (*id, Arc::clone(buffer)))
            .collect();

        let mut image = StoreImage::new();
        for (chat_id, buffer) in buffers {
            let buffer = buffer.lock().await;
            image.insert(chat_id, buffer.iter().cloned().collect());
        }
        image
    }
}
