use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::error::ApiError;
use tracing::debug;

use crate::{error::StoreError, session::Session};

/// Bearer-authenticated JSON transport shared by the HTTP stores.
#[derive(Clone)]
pub struct ApiTransport {
    http: Client,
    session: Arc<Session>,
}

impl ApiTransport {
    pub fn new(session: Arc<Session>) -> Self {
        Self::with_client(Client::new(), session)
    }

    pub fn with_client(http: Client, session: Arc<Session>) -> Self {
        Self { http, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Starts a request; fails fast without touching the network once the
    /// session has been invalidated.
    pub async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, StoreError> {
        let token = self
            .session
            .bearer()
            .await
            .ok_or(StoreError::Unauthorized)?;
        Ok(self
            .http
            .request(method, self.session.endpoint(path))
            .bearer_auth(token))
    }

    pub async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response).await;
        debug!(status = status.as_u16(), %message, "api: request failed");
        let err = StoreError::from_status(status.as_u16(), message);
        if err.is_unauthorized() {
            self.session.invalidate().await;
        }
        Err(err)
    }

    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, StoreError> {
        Ok(self.send(request).await?.json().await?)
    }

    /// Sends a request whose response body, if any, carries nothing the
    /// client needs (acks, 204s).
    pub async fn send_ack(&self, request: RequestBuilder) -> Result<(), StoreError> {
        self.send(request).await?;
        Ok(())
    }
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let fallback = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => serde_json::from_str::<ApiError>(&body)
            .map(|api_error| api_error.error)
            .unwrap_or(body),
        _ => fallback,
    }
}
