//! Wire types exchanged with the messaging API.
//!
//! Binary fields deserialize straight into the crypto newtypes, which
//! carry their own base64 encoding.

use chrono::{DateTime, Utc};
use cipherpost_crypto::{CipherPayload, PublicKeyPem, Signature, SymmetricKeyEnvelope, WrappedPrivateKey};
use serde::{Deserialize, Serialize};

// ── Auth ──

#[derive(Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub public_key: &'a PublicKeyPem,
    pub encrypted_private_key: &'a WrappedPrivateKey,
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp_code: Option<&'a str>,
}

/// Login response. The wrapped key is included so the client can unlock
/// without a second round trip.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub encrypted_private_key: Option<WrappedPrivateKey>,
}

#[derive(Deserialize)]
pub(crate) struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct PrivateKeyResponse {
    pub encrypted_private_key: WrappedPrivateKey,
}

#[derive(Serialize)]
pub(crate) struct ResetPasswordRequest<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
    pub public_key: &'a PublicKeyPem,
    pub encrypted_private_key: &'a WrappedPrivateKey,
}

/// Result of starting two-factor setup. `secret` is absent when the
/// account already had one; the QR code is a provisioning image.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TotpSetup {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    pub qr_code: String,
}

#[derive(Serialize)]
pub(crate) struct TotpCodeRequest<'a> {
    pub totp_code: &'a str,
}

/// Auth tokens held by the API client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

// ── Users ──

/// A directory entry. The list endpoint may omit the key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub public_key: Option<PublicKeyPem>,
}

// ── Messages ──

/// Attachment metadata as listed on a message. Ciphertext is fetched on
/// demand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub id: i64,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

/// A stored attachment including its ciphertext.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedAttachment {
    pub id: i64,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub encrypted_data: CipherPayload,
}

/// A message as stored by the server: ciphertext, key envelopes and the
/// signature over the plaintext body.
///
/// Inbox listings omit `recipient_id`; the reader is the recipient there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    #[serde(default)]
    pub recipient_id: Option<i64>,
    #[serde(default)]
    pub recipient_username: Option<String>,
    pub encrypted_content: CipherPayload,
    pub encrypted_symmetric_key: SymmetricKeyEnvelope,
    #[serde(default)]
    pub encrypted_symmetric_key_sender: Option<SymmetricKeyEnvelope>,
    pub signature: Signature,
    #[serde(default)]
    pub is_read: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<AttachmentInfo>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OutgoingAttachment {
    pub filename: String,
    pub encrypted_data: CipherPayload,
    pub mime_type: String,
    /// Plaintext size in bytes.
    pub size: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SendMessageRequest {
    pub receiver_id: i64,
    pub encrypted_content: CipherPayload,
    pub encrypted_symmetric_key: SymmetricKeyEnvelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_symmetric_key_sender: Option<SymmetricKeyEnvelope>,
    pub signature: Signature,
    pub attachments: Vec<OutgoingAttachment>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct SendMessageResponse {
    pub message_id: i64,
}

/// Server timestamps. The API emits naive ISO-8601 values in UTC; RFC 3339
/// values with an offset are accepted too.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| D::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
    }
}
