//! Client for the cipherpost messaging API.
//!
//! Provides:
//! - [`ApiClient`]: bearer-token HTTP client for every endpoint
//! - [`TokenRefreshGate`]: single refresh-and-retry on expired tokens
//! - [`MessageCryptoPipeline`]: compose and open end-to-end encrypted messages
//! - [`AccountService`] and [`Mailbox`]: the operations a UI calls
//!
//! The server only ever receives ciphertext, key envelopes, signatures and
//! the password-wrapped private key.

pub mod account;
pub mod api_client;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod messages;
pub mod pipeline;
pub mod refresh_gate;
pub mod types;

pub use account::AccountService;
pub use api_client::ApiClient;
pub use client::CipherpostClient;
pub use config::ClientConfig;
pub use directory::PublicKeyDirectory;
pub use error::{ClientError, ClientResult};
pub use messages::{DecryptedAttachment, Mailbox};
pub use pipeline::{
    ComposedMessage, MessageCryptoPipeline, MessageEnvelopes, OpenedMessage, OutgoingFile,
    ParticipantRole,
};
pub use refresh_gate::{CallKind, TokenRefreshGate, TokenRefresher};
pub use types::*;
