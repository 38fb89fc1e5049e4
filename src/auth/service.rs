//! Sign-in orchestration: challenges, verification, sessions, logout.

use crate::auth::address::EvmAddress;
use crate::auth::recover::SignatureRecovery;
use crate::auth::token::{generate_token, RandomSource};
use crate::auth::verify::{MessageVerifier, VerificationError};
use crate::clock::Clock;
use crate::storage::{NonceRegistry, Session, SessionStore};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Tunables for [`AuthService`].
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub nonce_ttl: TimeDelta,
    pub session_ttl: TimeDelta,
    pub max_clock_skew: TimeDelta,
    /// Require the message domain to match the relying party.
    pub strict_domain: bool,
    /// Fixed relying-party domain. When unset, the request host is used.
    pub expected_domain: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            nonce_ttl: TimeDelta::minutes(5),
            session_ttl: TimeDelta::hours(24),
            max_clock_skew: TimeDelta::seconds(60),
            strict_domain: false,
            expected_domain: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("Not signed in")]
    Unauthenticated,
}

/// A freshly issued challenge.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub nonce: String,
    /// Opaque token the client echoes back on verification.
    pub correlation_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a successful sign-in.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub session_id: String,
    pub address: EvmAddress,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PendingChallenge {
    nonce: String,
    expires_at: DateTime<Utc>,
}

/// Entries removed by one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeStats {
    pub nonces: usize,
    pub challenges: usize,
    pub sessions: usize,
}

impl PurgeStats {
    pub fn total(&self) -> usize {
        self.nonces + self.challenges + self.sessions
    }
}

pub struct AuthService {
    nonces: Arc<NonceRegistry>,
    sessions: SessionStore,
    verifier: MessageVerifier,
    pending: DashMap<String, PendingChallenge>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        settings: AuthSettings,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
        recovery: Arc<dyn SignatureRecovery>,
    ) -> Self {
        let nonces = Arc::new(NonceRegistry::new(
            clock.clone(),
            random.clone(),
            settings.nonce_ttl,
        ));
        let sessions = SessionStore::new(clock.clone(), random.clone(), settings.session_ttl);
        let verifier = MessageVerifier::new(
            recovery,
            nonces.clone(),
            clock.clone(),
            settings.max_clock_skew,
        );

        Self {
            nonces,
            sessions,
            verifier,
            pending: DashMap::new(),
            clock,
            random,
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Issue a nonce and bind it to a new correlation token.
    pub fn request_challenge(&self) -> Challenge {
        let nonce = self.nonces.issue();
        let correlation_token = generate_token(self.random.as_ref());

        self.pending.insert(
            correlation_token.clone(),
            PendingChallenge {
                nonce: nonce.value.clone(),
                expires_at: nonce.expires_at,
            },
        );

        tracing::debug!(action = "challenge_issued", expires_at = %nonce.expires_at, "Challenge issued");

        Challenge {
            nonce: nonce.value,
            correlation_token,
            expires_at: nonce.expires_at,
        }
    }

    /// Verify a signed message for the challenge bound to `correlation_token`
    /// and open a session on success.
    ///
    /// A missing, unknown or expired token is a `NonceInvalid` rejection.
    /// `request_host` is the `Host` the request arrived on (port allowed);
    /// it is the expected domain when domain enforcement is on and no fixed
    /// domain is configured.
    pub fn complete_sign_in(
        &self,
        message: &str,
        signature: &str,
        correlation_token: Option<&str>,
        request_host: Option<&str>,
    ) -> Result<SignIn, AuthError> {
        match self.try_sign_in(message, signature, correlation_token, request_host) {
            Ok(sign_in) => {
                tracing::info!(action = "auth_success", address = %sign_in.address, "User authenticated");
                Ok(sign_in)
            }
            Err(e) => {
                tracing::warn!(action = "auth_failed", code = e.code(), error = %e, "Sign-in rejected");
                Err(e.into())
            }
        }
    }

    fn try_sign_in(
        &self,
        message: &str,
        signature: &str,
        correlation_token: Option<&str>,
        request_host: Option<&str>,
    ) -> Result<SignIn, VerificationError> {
        let correlation_token = correlation_token.ok_or(VerificationError::NonceInvalid)?;
        let pending = self
            .pending
            .get(correlation_token)
            .map(|p| p.value().clone())
            .filter(|p| self.clock.now() < p.expires_at)
            .ok_or(VerificationError::NonceInvalid)?;

        let expected_domain = if self.settings.strict_domain {
            Some(
                self.settings
                    .expected_domain
                    .clone()
                    .or_else(|| request_host.map(host_without_port))
                    .unwrap_or_default(),
            )
        } else {
            None
        };

        let address = self.verifier.verify(
            message,
            signature,
            &pending.nonce,
            expected_domain.as_deref(),
        )?;

        self.pending.remove(correlation_token);
        let (session_id, session) = self.sessions.create(address);

        Ok(SignIn {
            session_id,
            address,
            expires_at: session.expires_at,
        })
    }

    /// Resolve a session id to its live session.
    pub fn who_am_i(&self, session_id: &str) -> Result<Session, AuthError> {
        self.sessions
            .get(session_id)
            .ok_or(AuthError::Unauthenticated)
    }

    /// End a session. Unknown ids are ignored.
    pub fn sign_out(&self, session_id: &str) -> bool {
        let removed = self.sessions.delete(session_id);
        if removed {
            tracing::info!(action = "logout", "User logged out");
        }
        removed
    }

    /// Sweep every expired nonce, pending challenge and session.
    pub fn purge_expired(&self) -> PurgeStats {
        let now = self.clock.now();
        let before = self.pending.len();
        self.pending.retain(|_, p| now < p.expires_at);

        PurgeStats {
            nonces: self.nonces.purge_expired(),
            challenges: before.saturating_sub(self.pending.len()),
            sessions: self.sessions.purge_expired(),
        }
    }
}

/// `example.com:8080` → `example.com`; bracketed IPv6 keeps its brackets.
fn host_without_port(host: &str) -> String {
    if let Some(end) = host.find(']') {
        return host[..=end].to_string();
    }
    host.split(':').next().unwrap_or(host).to_string()
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

    fn service(clock: &FakeClock, settings: AuthSettings) -> AuthService {
        AuthService::new(
            settings,
            Arc::new(clock.clone()),
            Arc::new(OsRandom),
            Arc::new(Eip191Recovery),
        )
    }

    fn fake_clock() -> FakeClock {
        FakeClock::new_set(Utc::now().trunc_subsecs(3))
    }

    fn signed_message(
        signer: &LocalSigner,
        domain: &str,
        nonce: &str,
        clock: &FakeClock,
    ) -> (String, String) {
        let text = ChallengeMessage {
            domain: domain.to_string(),
            address: signer.address(),
            statement: "Sign in with Ethereum to the app.".to_string(),
            uri: format!("http://{domain}"),
            chain_id: 1,
            nonce: nonce.to_string(),
            issued_at: clock.now(),
            expiration_time: None,
            not_before: None,
        }
        .build()
        .unwrap();
        let signature = signer.sign_message(&text).unwrap();
        (text, signature)
    }

    #[test]
    fn test_full_sign_in_flow() {
        let clock = fake_clock();
        let auth = service(&clock, AuthSettings::default());
        let signer = LocalSigner::random().unwrap();

        let challenge = auth.request_challenge();
        let (text, signature) = signed_message(&signer, "localhost", &challenge.nonce, &clock);

        let sign_in = auth
            .complete_sign_in(&text, &signature, Some(challenge.correlation_token.as_str()), None)
            .unwrap();
        assert_eq!(sign_in.address, signer.address());

        let session = auth.who_am_i(&sign_in.session_id).unwrap();
        assert_eq!(session.address, signer.address());

        assert!(auth.sign_out(&sign_in.session_id));
        assert_eq!(
            auth.who_am_i(&sign_in.session_id),
            Err(AuthError::Unauthenticated)
        );
        assert!(!auth.sign_out(&sign_in.session_id));
    }

    #[test]
    fn test_correlation_token_invalidated_after_success() {
        let clock = fake_clock();
        let auth = service(&clock, AuthSettings::default());
        let signer = LocalSigner::random().unwrap();

        let challenge = auth.request_challenge();
        let (text, signature) = signed_message(&signer, "localhost", &challenge.nonce, &clock);
        auth.complete_sign_in(&text, &signature, Some(challenge.correlation_token.as_str()), None)
            .unwrap();

        let replay = auth.complete_sign_in(&text, &signature, Some(challenge.correlation_token.as_str()), None);
        assert_eq!(
            replay.unwrap_err(),
            AuthError::Verification(VerificationError::NonceInvalid)
        );
    }

    #[test]
    fn test_unknown_correlation_token() {
        let clock = fake_clock();
        let auth = service(&clock, AuthSettings::default());

        let result = auth.complete_sign_in("message", "0x00", Some("unknown"), None);
        assert_eq!(
            result.unwrap_err(),
            AuthError::Verification(VerificationError::NonceInvalid)
        );
    }

    #[test]
    fn test_missing_correlation_token() {
        let clock = fake_clock();
        let auth = service(&clock, AuthSettings::default());
        let signer = LocalSigner::random().unwrap();

        let challenge = auth.request_challenge();
        let (text, signature) = signed_message(&signer, "localhost", &challenge.nonce, &clock);

        let result = auth.complete_sign_in(&text, &signature, None, None);
        assert_eq!(
            result.unwrap_err(),
            AuthError::Verification(VerificationError::NonceInvalid)
        );

        // The challenge is untouched and still redeemable.
        assert!(auth
            .complete_sign_in(
                &text,
                &signature,
                Some(challenge.correlation_token.as_str()),
                None
            )
            .is_ok());
    }

    /// In-memory sink for formatted log lines.
    #[derive(Clone, Default)]
    struct LogSink(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_token_rejections_are_logged() {
        let clock = fake_clock();
        let auth = service(&clock, AuthSettings::default());

        let sink = LogSink::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let _ = auth.complete_sign_in("message", "0x00", None, None);
            let _ = auth.complete_sign_in("message", "0x00", Some("unknown"), None);
        });

        let logs = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("auth_failed").count(), 2);
        assert_eq!(logs.matches("nonce_invalid").count(), 2);
    }

    #[test]
    fn test_expired_correlation_token() {
        let clock = fake_clock();
        let auth = service(&clock, AuthSettings::default());
        let signer = LocalSigner::random().unwrap();

        let challenge = auth.request_challenge();
        let (text, signature) = signed_message(&signer, "localhost", &challenge.nonce, &clock);

        clock.advance(TimeDelta::minutes(5));
        let result = auth.complete_sign_in(&text, &signature, Some(challenge.correlation_token.as_str()), None);
        assert_eq!(
            result.unwrap_err(),
            AuthError::Verification(VerificationError::NonceInvalid)
        );
    }

    #[test]
    fn test_challenge_cannot_be_redeemed_with_another_token() {
        let clock = fake_clock();
        let auth = service(&clock, AuthSettings::default());
        let signer = LocalSigner::random().unwrap();

        let mine = auth.request_challenge();
        let theirs = auth.request_challenge();
        let (text, signature) = signed_message(&signer, "localhost", &mine.nonce, &clock);

        let result = auth.complete_sign_in(&text, &signature, Some(theirs.correlation_token.as_str()), None);
        assert_eq!(
            result.unwrap_err(),
            AuthError::Verification(VerificationError::NonceInvalid)
        );
    }

    #[test]
    fn test_strict_domain_uses_request_host() {
        let clock = fake_clock();
        let settings = AuthSettings {
            strict_domain: true,
            ..AuthSettings::default()
        };
        let auth = service(&clock, settings);
        let signer = LocalSigner::random().unwrap();

        let challenge = auth.request_challenge();
        let (text, signature) = signed_message(&signer, "localhost", &challenge.nonce, &clock);
        assert!(auth
            .complete_sign_in(
                &text,
                &signature,
                Some(challenge.correlation_token.as_str()),
                Some("localhost:8787")
            )
            .is_ok());

        let challenge = auth.request_challenge();
        let (text, signature) = signed_message(&signer, "evil.com", &challenge.nonce, &clock);
        let result = auth.complete_sign_in(
            &text,
            &signature,
            Some(challenge.correlation_token.as_str()),
            Some("localhost:8787"),
        );
        assert!(matches!(
            result,
            Err(AuthError::Verification(VerificationError::DomainMismatch { .. }))
        ));
    }

    #[test]
    fn test_strict_domain_prefers_configured_domain() {
        let clock = fake_clock();
        let settings = AuthSettings {
            strict_domain: true,
            expected_domain: Some("app.example".to_string()),
            ..AuthSettings::default()
        };
        let auth = service(&clock, settings);
        let signer = LocalSigner::random().unwrap();

        let challenge = auth.request_challenge();
        let (text, signature) = signed_message(&signer, "evil.com", &challenge.nonce, &clock);
        let result = auth.complete_sign_in(
            &text,
            &signature,
            Some(challenge.correlation_token.as_str()),
            Some("evil.com"),
        );
        assert_eq!(
            result.unwrap_err(),
            AuthError::Verification(VerificationError::DomainMismatch {
                expected: "app.example".to_string(),
                got: "evil.com".to_string(),
            })
        );
    }

    #[test]
    fn test_failed_verification_creates_no_session() {
        let clock = fake_clock();
        let auth = service(&clock, AuthSettings::default());
        let signer = LocalSigner::random().unwrap();
        let impostor = LocalSigner::random().unwrap();

        let challenge = auth.request_challenge();
        let (text, _) = signed_message(&signer, "localhost", &challenge.nonce, &clock);
        let forged = impostor.sign_message(&text).unwrap();

        let result = auth.complete_sign_in(&text, &forged, Some(challenge.correlation_token.as_str()), None);
        assert!(matches!(
            result,
            Err(AuthError::Verification(VerificationError::InvalidSignature(_)))
        ));
        assert!(auth.sessions.is_empty());
    }

    #[test]
    fn test_session_expires() {
        let clock = fake_clock();
        let auth = service(&clock, AuthSettings::default());
        let signer = LocalSigner::random().unwrap();

        let challenge = auth.request_challenge();
        let (text, signature) = signed_message(&signer, "localhost", &challenge.nonce, &clock);
        let sign_in = auth
            .complete_sign_in(&text, &signature, Some(challenge.correlation_token.as_str()), None)
            .unwrap();

        clock.advance(TimeDelta::hours(24));
        assert_eq!(
            auth.who_am_i(&sign_in.session_id),
            Err(AuthError::Unauthenticated)
        );
    }

    #[test]
    fn test_purge_expired() {
        let clock = fake_clock();
        let auth = service(&clock, AuthSettings::default());
        auth.request_challenge();
        auth.request_challenge();

        assert_eq!(auth.purge_expired(), PurgeStats::default());

        clock.advance(TimeDelta::minutes(6));
        let stats = auth.purge_expired();
        assert_eq!(stats.nonces, 2);
        assert_eq!(stats.challenges, 2);
        assert_eq!(stats.sessions, 0);
        assert_eq!(stats.total(), 4);
    }

    #[test]
    fn test_host_without_port() {
        assert_eq!(host_without_port("localhost:8787"), "localhost");
        assert_eq!(host_without_port("app.example"), "app.example");
        assert_eq!(host_without_port("[::1]:8787"), "[::1]");
    }
}
