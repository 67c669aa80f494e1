//! Mailbox: sending, listing and reading messages for the signed-in user.

use crate::api_client::ApiClient;
use crate::directory::PublicKeyDirectory;
use crate::error::{ClientError, ClientResult};
use crate::pipeline::{MessageCryptoPipeline, OpenedMessage, OutgoingFile};
use crate::types::{Message, UserProfile};
use cipherpost_session::{Identity, Session, SessionError};
use std::sync::Arc;
use tracing::{info, warn};

/// A decrypted attachment ready to hand to the UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptedAttachment {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub struct Mailbox {
    api: Arc<ApiClient>,
    session: Arc<Session>,
    pipeline: MessageCryptoPipeline,
}

impl Mailbox {
    pub fn new(api: Arc<ApiClient>, session: Arc<Session>) -> Self {
        let directory: Arc<dyn PublicKeyDirectory> = api.clone();
        let pipeline = MessageCryptoPipeline::new(Arc::clone(&session), directory);
        Self {
            api,
            session,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &MessageCryptoPipeline {
        &self.pipeline
    }

    async fn me(&self) -> ClientResult<Identity> {
        self.session
            .identity()
            .await
            .ok_or(ClientError::Session(SessionError::NotSignedIn))
    }

    /// Encrypts and sends a message with optional attachments. Returns the
    /// server-assigned message id.
    pub async fn send_message(
        &self,
        recipient_username: &str,
        text: &str,
        files: &[OutgoingFile],
    ) -> ClientResult<i64> {
        for file in files {
            self.validate_attachment(file)?;
        }
        let me = self.me().await?;

        let recipient = self.api.user_by_name(recipient_username).await?;
        let recipient_id = recipient.id;
        let recipient_pk = recipient.require_public_key()?;
        let sender_pk = self.api.public_key(me.user_id).await?;

        let composed = self
            .pipeline
            .compose_message(text, &recipient_pk, &sender_pk, files)
            .await?;
        let sent = self
            .api
            .send_message(&composed.into_request(recipient_id))
            .await?;

        info!(
            "message {} sent to user {recipient_id} with {} attachment(s)",
            sent.message_id,
            files.len()
        );
        Ok(sent.message_id)
    }

    fn validate_attachment(&self, file: &OutgoingFile) -> ClientResult<()> {
        let size = file.bytes.len() as u64;
        let limit = self.api.config().max_attachment_bytes;
        let reason = if size == 0 {
            "file is empty".to_string()
        } else if size > limit {
            format!("{size} bytes exceeds the {limit} byte limit")
        } else {
            return Ok(());
        };
        Err(ClientError::InvalidAttachment {
            filename: file.filename.clone(),
            reason,
        })
    }

    pub async fn inbox(&self) -> ClientResult<Vec<Message>> {
        self.api.inbox().await
    }

    pub async fn sent(&self) -> ClientResult<Vec<Message>> {
        self.api.sent().await
    }

    /// Decrypts a listed message as the signed-in user.
    pub async fn read_message(&self, message: &Message) -> ClientResult<OpenedMessage> {
        let user_id = self.session.current_user_id().await?;
        self.pipeline.open_message(message, user_id).await
    }

    /// Fetches an attachment's ciphertext and decrypts it with the key of
    /// its parent message.
    pub async fn download_attachment(
        &self,
        message: &Message,
        attachment_id: i64,
    ) -> ClientResult<DecryptedAttachment> {
        let user_id = self.session.current_user_id().await?;
        let stored = self.api.attachment(attachment_id).await?;
        let bytes = self
            .pipeline
            .open_attachment(message, &stored.encrypted_data, user_id)
            .await?;

        if bytes.len() as u64 != stored.size {
            warn!(
                "attachment {attachment_id} decrypted to {} bytes, listed as {}",
                bytes.len(),
                stored.size
            );
        }
        Ok(DecryptedAttachment {
            filename: stored.filename,
            mime_type: stored.mime_type,
            bytes,
        })
    }

    pub async fn mark_as_read(&self, message_id: i64) -> ClientResult<()> {
        self.api.mark_as_read(message_id).await
    }

    pub async fn delete_message(&self, message_id: i64) -> ClientResult<()> {
        self.api.delete_message(message_id).await?;
        info!("message {message_id} deleted");
        Ok(())
    }

    pub async fn users(&self) -> ClientResult<Vec<UserProfile>> {
        self.api.users().await
    }
}
