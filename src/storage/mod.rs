//! In-process state for nonces and sessions.
//!
//! Both stores are sharded concurrent maps with per-entry expiry. They are
//! constructed objects with an injected clock and random source, owned by the
//! auth service; nothing here is process-global.

pub mod nonce;
pub mod session;

pub use nonce::{Nonce, NonceRegistry};
pub use session::{Session, SessionStore};
