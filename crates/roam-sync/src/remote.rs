use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use roam_types::api::{CreateConnectionRequest, RespondRequest};
use roam_types::normalize;
use roam_types::{ConnectionId, ConnectionRecord, ConnectionStatus, UserId};

use crate::error::RemoteError;
use crate::session::Session;

/// The remote connection store. This is the only source of truth.
#[async_trait]
pub trait ConnectionApi: Send + Sync {
    /// Every record involving the caller, any status.
    async fn all(&self, session: &Session) -> Result<Vec<ConnectionRecord>, RemoteError>;

    /// Accepted records only.
    async fn buddies(&self, session: &Session) -> Result<Vec<ConnectionRecord>, RemoteError>;

    /// Pending records where the caller is the receiver.
    async fn incoming(&self, session: &Session) -> Result<Vec<ConnectionRecord>, RemoteError>;

    /// Creates a pending request from the caller to `receiver`.
    async fn create(&self, session: &Session, receiver: &UserId)
    -> Result<ConnectionId, RemoteError>;

    async fn respond(
        &self,
        session: &Session,
        id: &ConnectionId,
        status: ConnectionStatus,
    ) -> Result<(), RemoteError>;

    async fn delete(&self, session: &Session, id: &ConnectionId) -> Result<(), RemoteError>;
}

/// [`ConnectionApi`] over the REST backend.
#[derive(Clone)]
pub struct HttpConnectionApi {
    client: Client,
    base_url: String,
}

impl HttpConnectionApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, session: &Session) -> Result<Response, RemoteError> {
        let response = request
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .as_ref()
            .and_then(normalize::error_message)
            .unwrap_or(body);

        debug!("Connection API returned {}: {}", status, message);
        Err(RemoteError::status(status.as_u16(), message))
    }

    async fn json(response: Response) -> Result<Value, RemoteError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn list(&self, path: &str, session: &Session) -> Result<Vec<ConnectionRecord>, RemoteError> {
        let response = self.send(self.client.get(self.url(path)), session).await?;
        let body = Self::json(response).await?;
        normalize::connection_list(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ConnectionApi for HttpConnectionApi {
    async fn all(&self, session: &Session) -> Result<Vec<ConnectionRecord>, RemoteError> {
        self.list("/connections/all", session).await
    }

    async fn buddies(&self, session: &Session) -> Result<Vec<ConnectionRecord>, RemoteError> {
        self.list("/connections/buddies", session).await
    }

    async fn incoming(&self, session: &Session) -> Result<Vec<ConnectionRecord>, RemoteError> {
        self.list("/connections/incoming", session).await
    }

    async fn create(
        &self,
        session: &Session,
        receiver: &UserId,
    ) -> Result<ConnectionId, RemoteError> {
        let body = CreateConnectionRequest {
            receiver_id: receiver.clone(),
        };
        let request = self.client.post(self.url("/connections")).json(&body);
        let response = self.send(request, session).await?;
        let body = Self::json(response).await?;
        normalize::created_connection_id(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn respond(
        &self,
        session: &Session,
        id: &ConnectionId,
        status: ConnectionStatus,
    ) -> Result<(), RemoteError> {
        let request = self
            .client
            .patch(self.url(&format!("/connections/respond/{}", id)))
            .json(&RespondRequest { status });
        self.send(request, session).await?;
        Ok(())
    }

    async fn delete(&self, session: &Session, id: &ConnectionId) -> Result<(), RemoteError> {
        let request = self.client.delete(self.url(&format!("/connections/{}", id)));
        self.send(request, session).await?;
        Ok(())
    }
}
