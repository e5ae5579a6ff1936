//! Service facade
//!
//! The operations a request boundary calls. Each one composes document-store
//! calls in a fixed order because nothing spans more than one object write.

use crate::error::Result;
use crate::inference::OllamaClient;
use crate::models::{DeviceInfo, Message, Metadata, Role, Session, SessionPatch};
use crate::store::{paths, DocumentStore, Page};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePage {
    pub session_id: String,
    pub messages: Vec<Message>,
    /// Objects under the session's message prefix, counted by listing
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReply {
    pub session_id: String,
    pub response: String,
    pub model: String,
    pub tokens_used: Option<u32>,
}

#[derive(Clone)]
pub struct AssistantService {
    store: DocumentStore,
    inference: OllamaClient,
}

impl AssistantService {
    pub fn new(store: DocumentStore, inference: OllamaClient) -> Self {
        Self { store, inference }
    }

    /// Create a session, then its default metadata as a separate write.
    ///
    /// If the metadata write fails the session already exists without
    /// metadata; the error is still returned to the caller.
    pub async fn create_session(
        &self,
        user_id: Option<String>,
        device_info: Option<DeviceInfo>,
    ) -> Result<SessionCreated> {
        let session = self.store.create_session(user_id, device_info).await?;

        if let Err(e) = self.store.upsert_metadata(&session.session_id, None, None).await {
            tracing::warn!(
                "[AssistantService] Session {} created without metadata: {}",
                session.session_id,
                e
            );
            return Err(e);
        }

        Ok(SessionCreated {
            session_id: session.session_id,
            created_at: session.created_at,
        })
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.store.get_session(session_id).await
    }

    pub async fn update_session(&self, session_id: &str, patch: SessionPatch) -> Result<Session> {
        self.store.update_session(session_id, patch).await
    }

    pub async fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        self.store.list_sessions(Page::first(limit)).await
    }

    /// Cascade delete; succeeds whether or not anything existed
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.store.delete_session(session_id).await.map(|_| ())
    }

    pub async fn save_message(
        &self,
        session_id: &str,
        role: Role,
        message_text: &str,
        tokens_used: Option<u32>,
        model_version: Option<String>,
    ) -> Result<Message> {
        self.store
            .create_message(session_id, role, message_text, tokens_used, model_version)
            .await
    }

    pub async fn get_message(&self, session_id: &str, message_id: &str) -> Result<Option<Message>> {
        self.store.get_message(session_id, message_id).await
    }

    pub async fn delete_message(&self, session_id: &str, message_id: &str) -> Result<()> {
        self.store.delete_message(session_id, message_id).await
    }

    pub async fn list_messages(&self, session_id: &str, page: Page) -> Result<MessagePage> {
        let (messages, total_count) = self.store.list_messages_counted(session_id, page).await?;
        Ok(MessagePage {
            session_id: session_id.to_string(),
            messages,
            total_count,
        })
    }

    pub async fn message_count(&self, session_id: &str) -> Result<usize> {
        self.store.count_messages(session_id).await
    }

    pub async fn upsert_metadata(
        &self,
        session_id: &str,
        extension_version: Option<String>,
        cluster_used: Option<String>,
    ) -> Result<Metadata> {
        self.store
            .upsert_metadata(session_id, extension_version, cluster_used)
            .await
    }

    pub async fn get_metadata(&self, session_id: &str) -> Result<Option<Metadata>> {
        self.store.get_metadata(session_id).await
    }

    /// Persist the question, ask the model, persist the answer, touch metadata.
    ///
    /// Persistence here is best effort: store failures are logged and never
    /// keep the answer from the caller. An inference failure is returned
    /// after the question has already been stored.
    pub async fn submit_query(
        &self,
        session_id: &str,
        question: &str,
        model: Option<&str>,
    ) -> Result<QueryReply> {
        paths::validate_id(session_id)?;

        if let Err(e) = self
            .store
            .create_message(session_id, Role::User, question, None, None)
            .await
        {
            tracing::warn!(
                "[AssistantService] Failed to persist question for session {}: {}",
                session_id,
                e
            );
        }

        let generation = match self.inference.generate(model, question).await {
            Ok(generation) => generation,
            Err(e) => {
                tracing::warn!(
                    "[AssistantService] Inference failed for session {}: {}",
                    session_id,
                    e
                );
                return Err(e);
            }
        };

        let saved = self
            .store
            .create_message(
                session_id,
                Role::Model,
                &generation.response,
                generation.eval_count,
                Some(generation.model.clone()),
            )
            .await;

        match saved {
            Ok(_) => {
                if let Err(e) = self.store.touch_last_active(session_id).await {
                    tracing::warn!(
                        "[AssistantService] Failed to update last_active for session {}: {}",
                        session_id,
                        e
                    );
                }
            }
            Err(e) => tracing::warn!(
                "[AssistantService] Failed to persist answer for session {}: {}",
                session_id,
                e
            ),
        }

        Ok(QueryReply {
            session_id: session_id.to_string(),
            response: generation.response,
            model: generation.model,
            tokens_used: generation.eval_count,
        })
    }
}
