//! Session key management for cipherpost.
//!
//! Keeps the unwrapped identity key in memory while the session lasts and
//! runs the password unlock workflow when an operation needs the key and
//! the session is locked.
//!
//! The UI and the server are reached only through two ports:
//! - [`PasswordPrompt`]: asks the operator for a password, or reports a cancel
//! - [`WrappedKeySource`]: supplies the password-wrapped private key blob
//!
//! Both are injected, so tests drive the state machine with scripted fakes.

mod error;
pub mod manager;
pub mod prompt;
pub mod session;
pub mod source;

pub use error::{SessionError, SessionResult};
pub use manager::{SessionConfig, SessionKeyManager, SessionState};
pub use prompt::{ChannelPrompt, PasswordPrompt, PromptOutcome, PromptRequest};
pub use session::{Identity, Session};
pub use source::{StoredWrappedKey, WrappedKeySource};
