//! HTTP client for the sign-in flow.
//!
//! Drives `/nonce` → `/verify` → `/me` against a running server with a
//! local secp256k1 key, carrying the server's cookies between calls the way
//! a browser would.

use crate::auth::address::{AddressError, EvmAddress};
use crate::auth::message::{ChallengeMessage, MessageError};
use crate::auth::signer::{LocalSigner, SignerError};
use crate::models::{AddressResponse, ErrorResponse, NonceResponse, OkResponse, SecretResponse};
use chrono::{SubsecRound, Utc};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid API base URL: {0}")]
    InvalidUrl(String),

    #[error("Server rejected request ({status}): {error}")]
    Rejected {
        status: StatusCode,
        code: String,
        error: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),
}

impl From<AddressError> for ClientError {
    fn from(err: AddressError) -> Self {
        ClientError::InvalidResponse(format!("bad address: {}", err))
    }
}

/// Fields of the sign-in message that are not supplied by the server.
#[derive(Debug, Clone)]
pub struct SignInOptions {
    pub domain: String,
    pub uri: String,
    pub chain_id: u64,
    pub statement: String,
}

impl SignInOptions {
    /// Domain and URI taken from the API base URL, mainnet chain id.
    pub fn for_api(api_base: &str) -> Result<Self, ClientError> {
        let url = Url::parse(api_base).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let domain = url
            .host_str()
            .ok_or_else(|| ClientError::InvalidUrl(format!("{} has no host", api_base)))?
            .to_string();

        Ok(Self {
            domain,
            uri: url.origin().ascii_serialization(),
            chain_id: 1,
            statement: "Sign in to the dApp".to_string(),
        })
    }
}

pub struct SiweClient {
    http: reqwest::Client,
    base: String,
    base_url: Url,
    jar: Arc<Jar>,
}

impl SiweClient {
    pub fn new(api_base: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(api_base).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let jar = Arc::new(Jar::default());

        Ok(Self {
            http: reqwest::Client::builder()
                .cookie_provider(jar.clone())
                .build()?,
            base: api_base.trim_end_matches('/').to_string(),
            base_url,
            jar,
        })
    }

    /// GET /nonce
    pub async fn fetch_nonce(&self) -> Result<String, ClientError> {
        let resp = self.send(self.http.get(self.url("/nonce"))).await?;
        let body: NonceResponse = resp.json().await?;
        Ok(body.nonce)
    }

    /// POST /verify
    pub async fn verify(&self, message: &str, signature: &str) -> Result<EvmAddress, ClientError> {
        let resp = self
            .send(self.http.post(self.url("/verify")).json(&serde_json::json!({
                "message": message,
                "signature": signature,
            })))
            .await?;
        let body: AddressResponse = resp.json().await?;
        Ok(body.address.parse()?)
    }

    /// Full sign-in: fetch a nonce, build and sign the message, verify it.
    pub async fn sign_in(
        &self,
        signer: &LocalSigner,
        options: &SignInOptions,
    ) -> Result<EvmAddress, ClientError> {
        let nonce = self.fetch_nonce().await?;

        let message = ChallengeMessage {
            domain: options.domain.clone(),
            address: signer.address(),
            statement: options.statement.clone(),
            uri: options.uri.clone(),
            chain_id: options.chain_id,
            nonce,
            issued_at: Utc::now().trunc_subsecs(3),
            expiration_time: None,
            not_before: None,
        }
        .build()?;

        let signature = signer.sign_message(&message)?;
        self.verify(&message, &signature).await
    }

    /// GET /me
    pub async fn me(&self) -> Result<EvmAddress, ClientError> {
        let resp = self.send(self.http.get(self.url("/me"))).await?;
        let body: AddressResponse = resp.json().await?;
        Ok(body.address.parse()?)
    }

    /// GET /secret
    pub async fn secret(&self) -> Result<String, ClientError> {
        let resp = self.send(self.http.get(self.url("/secret"))).await?;
        let body: SecretResponse = resp.json().await?;
        Ok(body.msg)
    }

    /// POST /logout
    pub async fn logout(&self) -> Result<(), ClientError> {
        let resp = self.send(self.http.post(self.url("/logout"))).await?;
        let body: OkResponse = resp.json().await?;
        if !body.ok {
            return Err(ClientError::InvalidResponse("logout not acknowledged".to_string()));
        }
        Ok(())
    }

    /// Current value of a cookie the server has set, as it would be sent
    /// with the next request to the API.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        header
            .to_str()
            .ok()?
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Send and turn error bodies into `ClientError::Rejected`.
    ///
    /// Cookies are attached and recorded by the client's jar.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let resp = request.send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await?;
        Err(match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(body) => ClientError::Rejected {
                status,
                code: body.code,
                error: body.error,
            },
            Err(_) => ClientError::Rejected {
                status,
                code: String::new(),
                error: text,
            },
        })
    }
}
