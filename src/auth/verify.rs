//! Verification of a signed challenge message.

use crate::auth::address::EvmAddress;
use crate::auth::message::{ChallengeMessage, MessageError};
use crate::auth::recover::{RecoverError, SignatureRecovery};
use crate::clock::Clock;
use crate::storage::NonceRegistry;
use chrono::TimeDelta;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] MessageError),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid nonce")]
    NonceInvalid,

    #[error("Invalid domain: got {got} expected {expected}")]
    DomainMismatch { expected: String, got: String },

    #[error("Expired challenge: {0}")]
    ExpiredChallenge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VerificationError {
    /// Stable machine-readable kind, sent to clients next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            VerificationError::MalformedMessage(_) => "malformed_message",
            VerificationError::InvalidSignature(_) => "invalid_signature",
            VerificationError::NonceInvalid => "nonce_invalid",
            VerificationError::DomainMismatch { .. } => "domain_mismatch",
            VerificationError::ExpiredChallenge(_) => "expired_challenge",
            VerificationError::Internal(_) => "internal",
        }
    }
}

/// Checks signed challenge messages against the nonce registry.
pub struct MessageVerifier {
    recovery: Arc<dyn SignatureRecovery>,
    nonces: Arc<NonceRegistry>,
    clock: Arc<dyn Clock>,
    max_clock_skew: TimeDelta,
}

impl MessageVerifier {
    pub fn new(
        recovery: Arc<dyn SignatureRecovery>,
        nonces: Arc<NonceRegistry>,
        clock: Arc<dyn Clock>,
        max_clock_skew: TimeDelta,
    ) -> Self {
        Self {
            recovery,
            nonces,
            clock,
            max_clock_skew,
        }
    }

    /// Verify `text` signed by `signature`.
    ///
    /// Checks run in a fixed order and stop at the first failure: structure,
    /// signer, nonce (consumed here), domain, freshness. On success returns the
    /// signer address; there is no partial success.
    pub fn verify(
        &self,
        text: &str,
        signature: &str,
        expected_nonce: &str,
        expected_domain: Option<&str>,
    ) -> Result<EvmAddress, VerificationError> {
        let message = ChallengeMessage::parse(text)?;

        let signer = self
            .recovery
            .recover(text, signature)
            .map_err(|e| match e {
                RecoverError::Malformed(reason) => VerificationError::InvalidSignature(reason),
                RecoverError::Internal(reason) => VerificationError::Internal(reason),
            })?;
        if signer != message.address {
            return Err(VerificationError::InvalidSignature(
                "Signer does not match message address".to_string(),
            ));
        }

        if message.nonce != expected_nonce || !self.nonces.consume(&message.nonce) {
            return Err(VerificationError::NonceInvalid);
        }

        if let Some(expected) = expected_domain {
            if message.domain != expected {
                return Err(VerificationError::DomainMismatch {
                    expected: expected.to_string(),
                    got: message.domain,
                });
            }
        }

        self.check_freshness(&message)?;

        Ok(signer)
    }

    fn check_freshness(&self, message: &ChallengeMessage) -> Result<(), VerificationError> {
        let now = self.clock.now();

        if message.issued_at + self.nonces.ttl() < now {
            return Err(VerificationError::ExpiredChallenge(
                "issued-at is older than the challenge window".to_string(),
            ));
        }
        if message.issued_at > now + self.max_clock_skew {
            return Err(VerificationError::ExpiredChallenge(
                "issued-at is in the future".to_string(),
            ));
        }
        if let Some(expiration_time) = message.expiration_time {
            if expiration_time <= now {
                return Err(VerificationError::ExpiredChallenge(
                    "message has expired".to_string(),
                ));
            }
        }
        if let Some(not_before) = message.not_before {
            if not_before > now + self.max_clock_skew {
                return Err(VerificationError::ExpiredChallenge(
                    "message is not yet valid".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::message::ChallengeMessage;
    use crate::auth::recover::Eip191Recovery;
    use crate::auth::signer::LocalSigner;
    use crate::auth::token::OsRandom;
    use crate::clock::FakeClock;
    use chrono::SubsecRound;

    struct Harness {
        clock: FakeClock,
        nonces: Arc<NonceRegistry>,
        verifier: MessageVerifier,
        signer: LocalSigner,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_recovery(Arc::new(Eip191Recovery))
        }

        fn with_recovery(recovery: Arc<dyn SignatureRecovery>) -> Self {
            let clock = FakeClock::new_set(chrono::Utc::now().trunc_subsecs(3));
            let nonces = Arc::new(NonceRegistry::new(
                Arc::new(clock.clone()),
                Arc::new(OsRandom),
                TimeDelta::minutes(5),
            ));
            let verifier = MessageVerifier::new(
                recovery,
                nonces.clone(),
                Arc::new(clock.clone()),
                TimeDelta::seconds(60),
            );
            Self {
                clock,
                nonces,
                verifier,
                signer: LocalSigner::random().unwrap(),
            }
        }

        fn message(&self, domain: &str, nonce: &str) -> ChallengeMessage {
            ChallengeMessage {
                domain: domain.to_string(),
                address: self.signer.address(),
                statement: "Sign in with Ethereum to the app.".to_string(),
                uri: format!("https://{domain}"),
                chain_id: 1,
                nonce: nonce.to_string(),
                issued_at: self.clock.now(),
                expiration_time: None,
                not_before: None,
            }
        }

        fn signed(&self, message: &ChallengeMessage) -> (String, String) {
            let text = message.build().unwrap();
            let signature = self.signer.sign_message(&text).unwrap();
            (text, signature)
        }
    }

    #[test]
    fn test_verify_success_then_replay() {
        let h = Harness::new();
        let nonce = h.nonces.issue();
        let (text, signature) = h.signed(&h.message("app.example", &nonce.value));

        let address = h
            .verifier
            .verify(&text, &signature, &nonce.value, Some("app.example"))
            .unwrap();
        assert_eq!(address, h.signer.address());

        let replay = h
            .verifier
            .verify(&text, &signature, &nonce.value, Some("app.example"));
        assert_eq!(replay, Err(VerificationError::NonceInvalid));
    }

    #[test]
    fn test_verify_malformed_message() {
        let h = Harness::new();
        let nonce = h.nonces.issue();

        let result = h.verifier.verify("hello", "0x00", &nonce.value, None);
        assert!(matches!(
            result,
            Err(VerificationError::MalformedMessage(_))
        ));
        // Nonce is untouched by a structural failure.
        assert!(h.nonces.consume(&nonce.value));
    }

    #[test]
    fn test_verify_signature_from_other_key() {
        let h = Harness::new();
        let other = LocalSigner::random().unwrap();
        let nonce = h.nonces.issue();
        let text = h.message("app.example", &nonce.value).build().unwrap();
        let signature = other.sign_message(&text).unwrap();

        let result = h.verifier.verify(&text, &signature, &nonce.value, None);
        assert!(matches!(
            result,
            Err(VerificationError::InvalidSignature(_))
        ));
        assert!(h.nonces.consume(&nonce.value));
    }

    #[test]
    fn test_verify_garbage_signature() {
        let h = Harness::new();
        let nonce = h.nonces.issue();
        let text = h.message("app.example", &nonce.value).build().unwrap();

        let result = h.verifier.verify(&text, "0xdeadbeef", &nonce.value, None);
        assert!(matches!(
            result,
            Err(VerificationError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_verify_nonce_mismatch() {
        let h = Harness::new();
        let issued = h.nonces.issue();
        let other = h.nonces.issue();
        let (text, signature) = h.signed(&h.message("app.example", &other.value));

        let result = h.verifier.verify(&text, &signature, &issued.value, None);
        assert_eq!(result, Err(VerificationError::NonceInvalid));
    }

    #[test]
    fn test_verify_unknown_nonce() {
        let h = Harness::new();
        let (text, signature) = h.signed(&h.message("app.example", "abcdef0123456789"));

        let result = h
            .verifier
            .verify(&text, &signature, "abcdef0123456789", None);
        assert_eq!(result, Err(VerificationError::NonceInvalid));
    }

    #[test]
    fn test_verify_domain_mismatch() {
        let h = Harness::new();
        let nonce = h.nonces.issue();
        let (text, signature) = h.signed(&h.message("evil.com", &nonce.value));

        let result = h
            .verifier
            .verify(&text, &signature, &nonce.value, Some("app.example"));
        assert_eq!(
            result,
            Err(VerificationError::DomainMismatch {
                expected: "app.example".to_string(),
                got: "evil.com".to_string(),
            })
        );
    }

    #[test]
    fn test_verify_domain_not_enforced() {
        let h = Harness::new();
        let nonce = h.nonces.issue();
        let (text, signature) = h.signed(&h.message("evil.com", &nonce.value));

        assert!(h
            .verifier
            .verify(&text, &signature, &nonce.value, None)
            .is_ok());
    }

    #[test]
    fn test_verify_stale_issued_at() {
        let h = Harness::new();
        let mut message = h.message("app.example", "placeholder0");
        message.issued_at = h.clock.now() - TimeDelta::minutes(10);

        let nonce = h.nonces.issue();
        message.nonce = nonce.value.clone();
        let (text, signature) = h.signed(&message);

        let result = h.verifier.verify(&text, &signature, &nonce.value, None);
        assert!(matches!(
            result,
            Err(VerificationError::ExpiredChallenge(_))
        ));
    }

    #[test]
    fn test_verify_future_issued_at() {
        let h = Harness::new();
        let nonce = h.nonces.issue();
        let mut message = h.message("app.example", &nonce.value);
        message.issued_at = h.clock.now() + TimeDelta::minutes(2);
        let (text, signature) = h.signed(&message);

        let result = h.verifier.verify(&text, &signature, &nonce.value, None);
        assert!(matches!(
            result,
            Err(VerificationError::ExpiredChallenge(_))
        ));
    }

    #[test]
    fn test_verify_expiration_time() {
        let h = Harness::new();
        let nonce = h.nonces.issue();
        let mut message = h.message("app.example", &nonce.value);
        message.expiration_time = Some(h.clock.now() + TimeDelta::seconds(30));
        let (text, signature) = h.signed(&message);

        h.clock.advance(TimeDelta::seconds(30));
        let result = h.verifier.verify(&text, &signature, &nonce.value, None);
        assert_eq!(
            result,
            Err(VerificationError::ExpiredChallenge(
                "message has expired".to_string()
            ))
        );
    }

    #[test]
    fn test_verify_not_before() {
        let h = Harness::new();
        let nonce = h.nonces.issue();
        let mut message = h.message("app.example", &nonce.value);
        message.not_before = Some(h.clock.now() + TimeDelta::minutes(3));
        let (text, signature) = h.signed(&message);

        let result = h.verifier.verify(&text, &signature, &nonce.value, None);
        assert_eq!(
            result,
            Err(VerificationError::ExpiredChallenge(
                "message is not yet valid".to_string()
            ))
        );
    }

    #[test]
    fn test_verify_recovery_fault_is_internal() {
        struct FailingRecovery;

        impl SignatureRecovery for FailingRecovery {
            fn recover(&self, _: &str, _: &str) -> Result<EvmAddress, RecoverError> {
                Err(RecoverError::Internal("backend unavailable".to_string()))
            }
        }

        let h = Harness::with_recovery(Arc::new(FailingRecovery));
        let nonce = h.nonces.issue();
        let (text, signature) = h.signed(&h.message("app.example", &nonce.value));

        let result = h.verifier.verify(&text, &signature, &nonce.value, None);
        assert_eq!(
            result,
            Err(VerificationError::Internal("backend unavailable".to_string()))
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(VerificationError::NonceInvalid.code(), "nonce_invalid");
        assert_eq!(
            VerificationError::DomainMismatch {
                expected: "a".to_string(),
                got: "b".to_string()
            }
            .code(),
            "domain_mismatch"
        );
    }
}
