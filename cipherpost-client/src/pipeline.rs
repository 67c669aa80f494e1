//! Message composition and opening.
//!
//! Each message gets one fresh AES-256 key. That key encrypts the body and
//! every attachment, and is wrapped twice with RSA-OAEP: once for the
//! recipient and once for the sender, so both sides can reread the
//! conversation. The sender signs the plaintext body; readers verify the
//! signature against the plaintext they recovered.
//!
//! Composition is all-or-nothing: any failure discards the partial result.

use crate::directory::PublicKeyDirectory;
use crate::error::{ClientError, ClientResult};
use crate::types::{Message, OutgoingAttachment, SendMessageRequest};
use cipherpost_crypto::{
    CipherPayload, PublicKeyPem, Signature, SymmetricKey, SymmetricKeyEnvelope, decrypt,
    decrypt_string, encrypt, encrypt_string, generate_symmetric_key, sign, unwrap_key, verify,
    wrap_key,
};
use cipherpost_session::Session;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which side of a message the reader is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticipantRole {
    Sender,
    Recipient,
}

impl ParticipantRole {
    /// Determines the reader's role.
    ///
    /// Inbox listings omit `recipient_id`; a reader who is not the sender of
    /// such a message is its recipient. A self-addressed message is read
    /// through the recipient envelope.
    pub fn of(message: &Message, user_id: i64) -> ClientResult<Self> {
        match message.recipient_id {
            Some(recipient) if recipient == user_id => Ok(Self::Recipient),
            _ if message.sender_id == user_id => Ok(Self::Sender),
            None => Ok(Self::Recipient),
            Some(_) => Err(ClientError::NotParticipant {
                message_id: message.id,
                user_id,
            }),
        }
    }
}

/// The two key envelopes of a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEnvelopes {
    pub recipient: SymmetricKeyEnvelope,
    /// Absent on messages from clients that did not write a self-envelope.
    pub sender: Option<SymmetricKeyEnvelope>,
}

impl MessageEnvelopes {
    pub fn of(message: &Message) -> Self {
        Self {
            recipient: message.encrypted_symmetric_key.clone(),
            sender: message.encrypted_symmetric_key_sender.clone(),
        }
    }

    pub fn select(&self, role: ParticipantRole) -> Option<&SymmetricKeyEnvelope> {
        match role {
            ParticipantRole::Recipient => Some(&self.recipient),
            ParticipantRole::Sender => self.sender.as_ref(),
        }
    }
}

/// A plaintext file to attach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl OutgoingFile {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Everything the server stores for a new message.
#[derive(Clone, Debug)]
pub struct ComposedMessage {
    pub encrypted_content: CipherPayload,
    pub envelopes: MessageEnvelopes,
    pub signature: Signature,
    pub attachments: Vec<OutgoingAttachment>,
}

impl ComposedMessage {
    pub fn into_request(self, receiver_id: i64) -> SendMessageRequest {
        SendMessageRequest {
            receiver_id,
            encrypted_content: self.encrypted_content,
            encrypted_symmetric_key: self.envelopes.recipient,
            encrypted_symmetric_key_sender: self.envelopes.sender,
            signature: self.signature,
            attachments: self.attachments,
        }
    }
}

/// A decrypted message body and the outcome of its signature check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenedMessage {
    pub plaintext: String,
    pub signature_valid: bool,
}

/// Top-level crypto API for messages and attachments.
pub struct MessageCryptoPipeline {
    session: Arc<Session>,
    directory: Arc<dyn PublicKeyDirectory>,
}

impl MessageCryptoPipeline {
    pub fn new(session: Arc<Session>, directory: Arc<dyn PublicKeyDirectory>) -> Self {
        Self { session, directory }
    }

    /// Encrypts, wraps and signs a message. Prompts for the password if the
    /// session is locked.
    pub async fn compose_message(
        &self,
        plaintext: &str,
        recipient_pk: &PublicKeyPem,
        sender_pk: &PublicKeyPem,
        files: &[OutgoingFile],
    ) -> ClientResult<ComposedMessage> {
        let key = generate_symmetric_key()?;
        let encrypted_content = encrypt_string(&key, plaintext)?;

        let envelopes = MessageEnvelopes {
            recipient: wrap_key(&key, recipient_pk)?,
            sender: Some(wrap_key(&key, sender_pk)?),
        };

        let private = self.session.keys().private_key().await?;
        let signature = sign(plaintext.as_bytes(), &private)?;

        let attachments = files
            .iter()
            .map(|file| -> ClientResult<OutgoingAttachment> {
                Ok(OutgoingAttachment {
                    filename: file.filename.clone(),
                    encrypted_data: encrypt(&key, &file.bytes)?,
                    mime_type: file.mime_type.clone(),
                    size: file.bytes.len() as u64,
                })
            })
            .collect::<ClientResult<Vec<_>>>()?;

        debug!("composed message with {} attachment(s)", attachments.len());
        Ok(ComposedMessage {
            encrypted_content,
            envelopes,
            signature,
            attachments,
        })
    }

    /// Decrypts a message body and checks the sender's signature.
    ///
    /// A bad or unverifiable signature yields `signature_valid == false`;
    /// only decryption problems are errors.
    pub async fn open_message(
        &self,
        message: &Message,
        current_user_id: i64,
    ) -> ClientResult<OpenedMessage> {
        let key = self.message_key(message, current_user_id).await?;
        let plaintext = decrypt_string(&key, &message.encrypted_content)?;

        let signature_valid = match self.directory.public_key(message.sender_id).await {
            Ok(sender_pk) => verify(plaintext.as_bytes(), &message.signature, &sender_pk),
            Err(e) => {
                warn!(
                    "cannot verify message {}: sender key unavailable: {e}",
                    message.id
                );
                false
            }
        };
        if !signature_valid {
            warn!("signature check failed for message {}", message.id);
        }

        Ok(OpenedMessage {
            plaintext,
            signature_valid,
        })
    }

    /// Decrypts one attachment payload of `message`.
    pub async fn open_attachment(
        &self,
        message: &Message,
        payload: &CipherPayload,
        current_user_id: i64,
    ) -> ClientResult<Vec<u8>> {
        let key = self.message_key(message, current_user_id).await?;
        Ok(decrypt(&key, payload)?)
    }

    /// Selects the reader's envelope and unwraps the message key.
    async fn message_key(&self, message: &Message, user_id: i64) -> ClientResult<SymmetricKey> {
        let role = ParticipantRole::of(message, user_id)?;
        let envelope = MessageEnvelopes::of(message)
            .select(role)
            .cloned()
            .ok_or(ClientError::EnvelopeMissing(message.id))?;

        let private = self.session.keys().private_key().await?;
        Ok(unwrap_key(&envelope, &private)?)
    }
}
