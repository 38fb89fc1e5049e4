//! Sign-In-With-Ethereum: message codec, signer recovery, verification,
//! and the service that turns a verified message into a session.

pub mod address;
pub mod message;
pub mod middleware;
pub mod recover;
pub mod service;
pub mod signer;
pub mod token;
pub mod verify;

pub use address::EvmAddress;
pub use message::ChallengeMessage;
pub use middleware::{AppState, AuthSession};
pub use recover::{Eip191Recovery, SignatureRecovery};
pub use service::{AuthError, AuthService, AuthSettings};
pub use signer::LocalSigner;
pub use token::{OsRandom, RandomSource};
pub use verify::{MessageVerifier, VerificationError};
