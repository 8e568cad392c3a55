//! Repository deploy keys API.
//!
//! Every operation is lazy: nothing is sent until the returned future or
//! stream is polled, and dropping it before completion stops any further
//! requests.

use std::sync::Arc;

use async_stream::try_stream;
use deploykeys_shared::{
    ValidationError,
    pagination::ApiOptions,
    repository::RepositoryRef,
    ssh::{DeployKey, NewDeployKey},
};
use futures::{Stream, TryStreamExt, stream::BoxStream};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::connection::{ApiRequest, ApiResponse, Connection};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{PageCursor, next_page_url};

/// Client for the deploy keys of a repository.
#[derive(Clone)]
pub struct DeployKeysClient {
    connection: Arc<dyn Connection>,
}

impl DeployKeysClient {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self { connection }
    }

    /// Get a single deploy key.
    pub async fn get(&self, repo: &RepositoryRef, deploy_key_id: u64) -> ApiResult<DeployKey> {
        let path = key_path(repo, deploy_key_id)?;
        let response = send(self.connection.as_ref(), ApiRequest::new(Method::GET, path)).await?;
        decode(&response)
    }

    /// All deploy keys of the repository, across every page.
    pub fn get_all(&self, repo: RepositoryRef) -> KeyListing {
        self.get_all_with_options(repo, ApiOptions::default())
    }

    /// Deploy keys of the repository within the given page bounds.
    pub fn get_all_with_options(&self, repo: RepositoryRef, options: ApiOptions) -> KeyListing {
        KeyListing {
            connection: self.connection.clone(),
            repo,
            options,
        }
    }

    /// Register a new deploy key and return it as stored by the server.
    pub async fn create(&self, repo: &RepositoryRef, new_key: &NewDeployKey) -> ApiResult<DeployKey> {
        let path = keys_path(repo)?;
        new_key.validate()?;

        let request = ApiRequest::new(Method::POST, path).json(serde_json::to_value(new_key)?);
        let response = send(self.connection.as_ref(), request).await?;
        let created: DeployKey = decode(&response)?;

        info!(repo = %repo, id = created.id, title = %created.title, "deploy key created");
        Ok(created)
    }

    /// Remove a deploy key. Resolves once the server confirmed the removal.
    pub async fn delete(&self, repo: &RepositoryRef, deploy_key_id: u64) -> ApiResult<()> {
        let path = key_path(repo, deploy_key_id)?;
        send(self.connection.as_ref(), ApiRequest::new(Method::DELETE, path)).await?;

        info!(repo = %repo, id = deploy_key_id, "deploy key deleted");
        Ok(())
    }
}

/// A listing call that can be run any number of times.
///
/// Each call to [`KeyListing::stream`] issues its own requests.
#[derive(Clone)]
pub struct KeyListing {
    connection: Arc<dyn Connection>,
    repo: RepositoryRef,
    options: ApiOptions,
}

impl KeyListing {
    /// Keys in server order. A failing page ends the stream with one `Err`
    /// after the keys of the earlier pages.
    pub fn stream(&self) -> BoxStream<'static, ApiResult<DeployKey>> {
        Box::pin(list_pages(
            self.connection.clone(),
            self.repo.clone(),
            self.options,
        ))
    }

    /// Drains [`KeyListing::stream`] into a `Vec`.
    pub async fn collect(&self) -> ApiResult<Vec<DeployKey>> {
        self.stream().try_collect().await
    }
}

fn list_pages(
    connection: Arc<dyn Connection>,
    repo: RepositoryRef,
    options: ApiOptions,
) -> impl Stream<Item = ApiResult<DeployKey>> + Send + 'static {
    try_stream! {
        let path = keys_path(&repo)?;
        options.validate()?;

        let mut cursor = PageCursor::new(&options);
        let mut request = Some(ApiRequest::new(Method::GET, path).query(options.query()));

        while let Some(next) = request.take() {
            let response = send(connection.as_ref(), next).await?;
            cursor.record_page();

            let page: Vec<DeployKey> = decode(&response)?;
            debug!(repo = %repo, page = cursor.fetched(), count = page.len(), "fetched deploy key page");
            for key in page {
                yield key;
            }

            if cursor.exhausted() {
                break;
            }
            request = next_page_url(&response).map(|url| ApiRequest::new(Method::GET, url));
        }
    }
}

fn keys_path(repo: &RepositoryRef) -> ApiResult<String> {
    repo.validate()?;
    Ok(format!("{}/keys", repo.path()))
}

fn key_path(repo: &RepositoryRef, deploy_key_id: u64) -> ApiResult<String> {
    let base = keys_path(repo)?;
    if deploy_key_id == 0 {
        return Err(ValidationError::new("deploy key id must be positive").into());
    }
    Ok(format!("{base}/{deploy_key_id}"))
}

async fn send(connection: &dyn Connection, request: ApiRequest) -> ApiResult<ApiResponse> {
    debug!(method = %request.method, path = %request.path, "sending request");
    let response = connection.send(request).await?;
    if response.status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::from_response(&response))
    }
}

fn decode<T: DeserializeOwned>(response: &ApiResponse) -> ApiResult<T> {
    Ok(serde_json::from_str(&response.body)?)
}
