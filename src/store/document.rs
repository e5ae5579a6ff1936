use super::paths;
use crate::error::{Result, StoreError};
use crate::models::{
    decode, encode, DeviceInfo, Message, Metadata, Record, Role, Session, SessionPatch,
};
use crate::storage::ObjectStore;
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Offset/limit window applied in memory after sorting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn new(limit: Option<usize>, offset: usize) -> Self {
        Self { limit, offset }
    }

    pub fn first(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }

    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// CRUD and query emulation for sessions, messages and metadata
///
/// Every operation is built from the four object-store primitives. Each
/// primitive call is bounded by `op_timeout`; listings fan out into at most
/// `list_concurrency` concurrent fetches and are sorted after all fetches
/// complete, so completion order never shows in results.
#[derive(Clone)]
pub struct DocumentStore {
    objects: Arc<dyn ObjectStore>,
    op_timeout: Duration,
    list_concurrency: usize,
}

impl DocumentStore {
    pub fn new(objects: Arc<dyn ObjectStore>, op_timeout: Duration, list_concurrency: usize) -> Self {
        Self {
            objects,
            op_timeout,
            list_concurrency: list_concurrency.max(1),
        }
    }

    // ==================== Sessions ====================

    pub async fn create_session(
        &self,
        user_id: Option<String>,
        device_info: Option<DeviceInfo>,
    ) -> Result<Session> {
        self.insert_session(Session::new(user_id, device_info)).await
    }

    /// Store a session whose identity was chosen by the caller
    pub async fn insert_session(&self, session: Session) -> Result<Session> {
        paths::validate_id(&session.session_id)?;
        self.put_record(&session).await?;
        tracing::info!("[DocumentStore] Created session {}", session.session_id);
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        paths::validate_id(session_id)?;
        self.get_record(&paths::session(session_id)).await
    }

    /// Read-modify-write merge of `patch`.
    ///
    /// Not atomic: an update landing between our read and our write is lost.
    pub async fn update_session(&self, session_id: &str, patch: SessionPatch) -> Result<Session> {
        let mut session = match self.get_session(session_id).await? {
            Some(session) => session,
            None => {
                tracing::info!("[DocumentStore] Session {} not found for update", session_id);
                return Err(StoreError::not_found(Session::KIND, session_id));
            }
        };

        patch.apply(&mut session, Utc::now());
        self.put_record(&session).await?;
        tracing::info!("[DocumentStore] Updated session {}", session_id);
        Ok(session)
    }

    /// Sessions ordered by `updated_at`, newest first
    pub async fn list_sessions(&self, page: Page) -> Result<Vec<Session>> {
        let (mut sessions, _) = self.list_records::<Session>(paths::SESSIONS_PREFIX).await?;
        sessions.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });

        let sessions = page.slice(sessions);
        tracing::info!("[DocumentStore] Retrieved {} recent sessions", sessions.len());
        Ok(sessions)
    }

    /// Delete a session, its messages and its metadata.
    ///
    /// Every step is an idempotent delete, so an interrupted cascade can be
    /// re-run from the top. Returns the number of message objects removed.
    pub async fn delete_session(&self, session_id: &str) -> Result<usize> {
        paths::validate_id(session_id)?;

        self.delete_path(&paths::session(session_id)).await?;

        let message_paths = self.list_paths(&paths::session_messages(session_id)).await?;
        for path in &message_paths {
            self.delete_path(path).await?;
        }

        self.delete_metadata(session_id).await?;

        tracing::info!(
            "[DocumentStore] Deleted session {} with {} messages",
            session_id,
            message_paths.len()
        );
        Ok(message_paths.len())
    }

    // ==================== Messages ====================

    pub async fn create_message(
        &self,
        session_id: &str,
        role: Role,
        message_text: &str,
        tokens_used: Option<u32>,
        model_version: Option<String>,
    ) -> Result<Message> {
        let message = Message::new(session_id, role, message_text, tokens_used, model_version);
        self.insert_message(message).await
    }

    pub async fn insert_message(&self, message: Message) -> Result<Message> {
        paths::validate_id(&message.session_id)?;
        paths::validate_id(&message.message_id)?;
        self.put_record(&message).await?;
        tracing::info!(
            "[DocumentStore] Saved message {} for session {}",
            message.message_id,
            message.session_id
        );
        Ok(message)
    }

    pub async fn get_message(&self, session_id: &str, message_id: &str) -> Result<Option<Message>> {
        paths::validate_id(session_id)?;
        paths::validate_id(message_id)?;
        self.get_record(&paths::message(session_id, message_id)).await
    }

    /// Messages of one session in ascending `timestamp` order
    pub async fn list_messages(&self, session_id: &str, page: Page) -> Result<Vec<Message>> {
        let (messages, _) = self.list_messages_counted(session_id, page).await?;
        Ok(messages)
    }

    /// One page of messages plus the number of message objects the same
    /// listing returned, so the count and the page never disagree
    pub async fn list_messages_counted(
        &self,
        session_id: &str,
        page: Page,
    ) -> Result<(Vec<Message>, usize)> {
        paths::validate_id(session_id)?;

        let (mut messages, listed) = self
            .list_records::<Message>(&paths::session_messages(session_id))
            .await?;
        messages.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });

        let messages = page.slice(messages);
        tracing::info!(
            "[DocumentStore] Retrieved {} of {} messages for session {}",
            messages.len(),
            listed,
            session_id
        );
        Ok((messages, listed))
    }

    /// Number of message objects under the session; lists, does not fetch
    pub async fn count_messages(&self, session_id: &str) -> Result<usize> {
        paths::validate_id(session_id)?;
        Ok(self.list_paths(&paths::session_messages(session_id)).await?.len())
    }

    pub async fn delete_message(&self, session_id: &str, message_id: &str) -> Result<()> {
        paths::validate_id(session_id)?;
        paths::validate_id(message_id)?;
        self.delete_path(&paths::message(session_id, message_id)).await?;
        tracing::info!("[DocumentStore] Deleted message {}", message_id);
        Ok(())
    }

    // ==================== Metadata ====================

    /// Replace the metadata object wholesale; fields not given become null
    pub async fn upsert_metadata(
        &self,
        session_id: &str,
        extension_version: Option<String>,
        cluster_used: Option<String>,
    ) -> Result<Metadata> {
        paths::validate_id(session_id)?;
        let metadata = Metadata::new(session_id, extension_version, cluster_used);
        self.put_record(&metadata).await?;
        tracing::info!("[DocumentStore] Updated metadata for session {}", session_id);
        Ok(metadata)
    }

    pub async fn get_metadata(&self, session_id: &str) -> Result<Option<Metadata>> {
        paths::validate_id(session_id)?;
        self.get_record(&paths::metadata(session_id)).await
    }

    /// Re-stamp `last_active`, creating default metadata when none exists
    pub async fn touch_last_active(&self, session_id: &str) -> Result<Metadata> {
        let metadata = match self.get_metadata(session_id).await? {
            Some(mut metadata) => {
                metadata.last_active = Utc::now();
                self.put_record(&metadata).await?;
                metadata
            }
            None => self.upsert_metadata(session_id, None, None).await?,
        };
        tracing::info!("[DocumentStore] Updated last_active for session {}", session_id);
        Ok(metadata)
    }

    pub async fn delete_metadata(&self, session_id: &str) -> Result<()> {
        paths::validate_id(session_id)?;
        self.delete_path(&paths::metadata(session_id)).await
    }

    // ==================== Primitives ====================

    async fn put_record<R: Record>(&self, record: &R) -> Result<()> {
        let path = record.object_path();
        let bytes = encode(record)?;
        self.with_deadline("put", &path, self.objects.put(&path, bytes)).await
    }

    async fn get_record<R: Record>(&self, path: &str) -> Result<Option<R>> {
        match self.raw_get(path).await? {
            Some(bytes) => decode(path, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn raw_get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.with_deadline("get", path, self.objects.get(path)).await
    }

    async fn delete_path(&self, path: &str) -> Result<()> {
        self.with_deadline("delete", path, self.objects.delete(path)).await
    }

    async fn list_paths(&self, prefix: &str) -> Result<Vec<String>> {
        self.with_deadline("list", prefix, self.objects.list(prefix)).await
    }

    /// List then fetch every object under `prefix`, skipping ones that fail to decode.
    /// Also returns how many paths the listing produced.
    async fn list_records<R: Record>(&self, prefix: &str) -> Result<(Vec<R>, usize)> {
        let paths = self.list_paths(prefix).await?;
        let listed = paths.len();

        let fetched: Vec<Option<R>> = stream::iter(paths)
            .map(|path| async move { self.fetch_listed::<R>(path).await })
            .buffer_unordered(self.list_concurrency)
            .try_collect()
            .await?;

        Ok((fetched.into_iter().flatten().collect(), listed))
    }

    async fn fetch_listed<R: Record>(&self, path: String) -> Result<Option<R>> {
        let Some(bytes) = self.raw_get(&path).await? else {
            tracing::debug!("[DocumentStore] '{}' vanished between list and get", path);
            return Ok(None);
        };

        match decode::<R>(&path, &bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!("[DocumentStore] Skipping unreadable {}: {}", R::KIND, e);
                Ok(None)
            }
        }
    }

    async fn with_deadline<T>(
        &self,
        operation: &'static str,
        path: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.op_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "[DocumentStore] {} on '{}' timed out after {:?}",
                    operation,
                    path,
                    self.op_timeout
                );
                Err(StoreError::timed_out(
                    operation,
                    path,
                    self.op_timeout.as_millis() as u64,
                ))
            }
        }
    }
}
