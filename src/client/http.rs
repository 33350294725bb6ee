use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::models::user::{LoginRequest, LoginResponse};

#[derive(Debug, Error)]
pub enum ClientError {
    /// 401: the token was rejected and has been cleared.
    #[error("Session expired, login required")]
    Unauthorized,

    /// 403: authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Request failed with status {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),
}

/// Hooks run when the API rejects a request for auth reasons.
pub trait Interceptor: Send + Sync {
    /// Called on 401 after the stored token was cleared, e.g. redirect to login.
    fn on_unauthorized(&self);

    /// Called on 403 with the server's message, e.g. show a toast.
    fn on_forbidden(&self, message: &str);
}

/// Default interceptor: only logs.
pub struct LoggingInterceptor;

impl Interceptor for LoggingInterceptor {
    fn on_unauthorized(&self) {
        tracing::warn!("API returned 401, session cleared");
    }

    fn on_forbidden(&self, message: &str) {
        tracing::warn!("API returned 403: {message}");
    }
}

/// Shared HTTP client for one tenant. Clones share the token slot and interceptor.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    tenant: String,
    token: Arc<RwLock<Option<String>>>,
    interceptor: Arc<dyn Interceptor>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, tenant: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tenant: tenant.into(),
            token: Arc::new(RwLock::new(None)),
            interceptor: Arc::new(LoggingInterceptor),
        })
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = interceptor;
        self
    }

    pub fn set_token(&self, token: Option<String>) {
        // A poisoned lock only means a writer panicked; the Option is still usable.
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Log in and keep the access token for subsequent calls.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let res: LoginResponse = self.post("/v1/auth/login", &body).await?;
        self.set_token(Some(res.access_token.clone()));
        Ok(res)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let req = self.http.get(self.url(path));
        let res = self.send(req).await?;
        Ok(res.json().await?)
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let req = self.http.post(self.url(path)).json(body);
        let res = self.send(req).await?;
        Ok(res.json().await?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ClientError> {
        let mut req = req.header("X-Tenant", &self.tenant);
        if let Some(token) = self.token() {
            req = req.bearer_auth(token);
        }

        let res = req.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let message = error_message(res).await;
        match status {
            StatusCode::UNAUTHORIZED => {
                self.set_token(None);
                self.interceptor.on_unauthorized();
                Err(ClientError::Unauthorized)
            }
            StatusCode::FORBIDDEN => {
                self.interceptor.on_forbidden(&message);
                Err(ClientError::Forbidden(message))
            }
            _ => Err(ClientError::Status { status, message }),
        }
    }
}

/// The `error` field of a JSON error body, else the raw body, else the reason phrase.
async fn error_message(res: Response) -> String {
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string())
}
