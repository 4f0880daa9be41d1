//! Entity store contract and its HTTP implementation.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Account, AccountId, BoardId, ColumnId, ItemId},
    error::{ApiError, ErrorCode},
    protocol::{
        BoardPayload, BoardSummary, ColumnPayload, CreateBoardRequest, CreateColumnRequest,
        ItemMutation, RenameRequest, UpsertItemResponse,
    },
};
use tracing::{debug, info};
use url::Url;

use crate::{error::StoreError, IdentityProvider};

/// Durable CRUD surface the board session talks to. Every call is scoped to
/// `owner`; rows owned by someone else fail with `NotFound` or `Forbidden`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_board(&self, board_id: BoardId, owner: &AccountId) -> Result<BoardPayload, StoreError>;
    async fn create_column(
        &self,
        board_id: BoardId,
        name: &str,
        owner: &AccountId,
    ) -> Result<ColumnPayload, StoreError>;
    async fn update_column_name(
        &self,
        column_id: &ColumnId,
        name: &str,
        owner: &AccountId,
    ) -> Result<(), StoreError>;
    async fn upsert_item(
        &self,
        item: &ItemMutation,
        owner: &AccountId,
        board_id: BoardId,
    ) -> Result<ItemId, StoreError>;
    async fn update_board_name(
        &self,
        board_id: BoardId,
        name: &str,
        owner: &AccountId,
    ) -> Result<(), StoreError>;
    async fn create_board(
        &self,
        name: &str,
        color: Option<&str>,
        owner: &AccountId,
    ) -> Result<BoardSummary, StoreError>;
    async fn delete_board(&self, board_id: BoardId, owner: &AccountId) -> Result<(), StoreError>;
    async fn get_boards_for_user(&self, owner: &AccountId) -> Result<Vec<BoardSummary>, StoreError>;
}

/// Talks to the board server with a bearer identity token. The token decides
/// the account; asking for any other owner is refused locally.
pub struct HttpEntityStore {
    http: Client,
    base_url: Url,
    token: String,
    account: Account,
}

impl HttpEntityStore {
    pub async fn connect(server_url: &str, token: impl Into<String>) -> Result<Self, StoreError> {
        let base_url = base_url(server_url)?;
        let http = Client::new();
        let token = token.into();

        let me = base_url
            .join("me")
            .map_err(|e| StoreError::new(ErrorCode::Validation, format!("invalid server url: {e}")))?;
        let account: Account = read_json(http.get(me).bearer_auth(&token)).await?;
        info!(account_id = %account.id, server = %base_url, "connected to board server");

        Ok(Self {
            http,
            base_url,
            token,
            account,
        })
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    fn url(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::new(ErrorCode::Internal, format!("bad request path {path}: {e}")))
    }

    fn ensure_owner(&self, owner: &AccountId) -> Result<(), StoreError> {
        if owner != &self.account.id {
            return Err(StoreError::new(
                ErrorCode::Forbidden,
                "session token belongs to a different account",
            ));
        }
        Ok(())
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, StoreError> {
        Ok(self.http.get(self.url(path)?).bearer_auth(&self.token))
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, StoreError> {
        Ok(self.http.post(self.url(path)?).bearer_auth(&self.token))
    }

    fn put(&self, path: &str) -> Result<RequestBuilder, StoreError> {
        Ok(self.http.put(self.url(path)?).bearer_auth(&self.token))
    }

    fn delete(&self, path: &str) -> Result<RequestBuilder, StoreError> {
        Ok(self.http.delete(self.url(path)?).bearer_auth(&self.token))
    }
}

impl IdentityProvider for HttpEntityStore {
    fn current_user_id(&self) -> Option<AccountId> {
        Some(self.account.id.clone())
    }
}

#[async_trait]
impl EntityStore for HttpEntityStore {
    async fn get_board(&self, board_id: BoardId, owner: &AccountId) -> Result<BoardPayload, StoreError> {
        self.ensure_owner(owner)?;
        read_json(self.get(&format!("boards/{board_id}"))?).await
    }

    async fn create_column(
        &self,
        board_id: BoardId,
        name: &str,
        owner: &AccountId,
    ) -> Result<ColumnPayload, StoreError> {
        self.ensure_owner(owner)?;
        let request = self
            .post(&format!("boards/{board_id}/columns"))?
            .json(&CreateColumnRequest {
                name: name.to_string(),
            });
        read_json(request).await
    }

    async fn update_column_name(
        &self,
        column_id: &ColumnId,
        name: &str,
        owner: &AccountId,
    ) -> Result<(), StoreError> {
        self.ensure_owner(owner)?;
        let request = self
            .put(&format!("columns/{column_id}/name"))?
            .json(&RenameRequest {
                name: name.to_string(),
            });
        expect_success(request).await
    }

    async fn upsert_item(
        &self,
        item: &ItemMutation,
        owner: &AccountId,
        board_id: BoardId,
    ) -> Result<ItemId, StoreError> {
        self.ensure_owner(owner)?;
        let request = self.post(&format!("boards/{board_id}/items"))?.json(item);
        let response: UpsertItemResponse = read_json(request).await?;
        Ok(response.id)
    }

    async fn update_board_name(
        &self,
        board_id: BoardId,
        name: &str,
        owner: &AccountId,
    ) -> Result<(), StoreError> {
        self.ensure_owner(owner)?;
        let request = self
            .put(&format!("boards/{board_id}/name"))?
            .json(&RenameRequest {
                name: name.to_string(),
            });
        expect_success(request).await
    }

    async fn create_board(
        &self,
        name: &str,
        color: Option<&str>,
        owner: &AccountId,
    ) -> Result<BoardSummary, StoreError> {
        self.ensure_owner(owner)?;
        let request = self.post("boards")?.json(&CreateBoardRequest {
            name: name.to_string(),
            color: color.map(str::to_string),
        });
        read_json(request).await
    }

    async fn delete_board(&self, board_id: BoardId, owner: &AccountId) -> Result<(), StoreError> {
        self.ensure_owner(owner)?;
        expect_success(self.delete(&format!("boards/{board_id}"))?).await
    }

    async fn get_boards_for_user(&self, owner: &AccountId) -> Result<Vec<BoardSummary>, StoreError> {
        self.ensure_owner(owner)?;
        read_json(self.get("boards")?).await
    }
}

fn base_url(server_url: &str) -> Result<Url, StoreError> {
    let mut url = Url::parse(server_url.trim())
        .map_err(|e| StoreError::new(ErrorCode::Validation, format!("invalid server url: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn send(request: RequestBuilder) -> Result<reqwest::Response, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| StoreError::new(ErrorCode::Internal, format!("request failed: {e}")))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(%status, %body, "store request rejected");
    Err(match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => api_error.into(),
        Err(_) => StoreError::new(code_for_status(status), format!("HTTP {status}")),
    })
}

async fn read_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, StoreError> {
    send(request)
        .await?
        .json()
        .await
        .map_err(|e| StoreError::new(ErrorCode::Internal, format!("malformed response: {e}")))
}

async fn expect_success(request: RequestBuilder) -> Result<(), StoreError> {
    send(request).await.map(|_| ())
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
