use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    api::{self, AuthToken, CommentId, Error as ApiError, Payload, PostId},
    ThreadConfig,
};

/// The four operations a thread view needs from the backend
#[async_trait]
pub trait RemoteSync {
    /// All comments of `post`, parents before their replies
    async fn fetch_thread(&self, post: &PostId) -> Result<Vec<api::Comment>, ApiError>;

    async fn create_comment(
        &self,
        post: &PostId,
        parent: Option<&CommentId>,
        author: &str,
        content: &str,
    ) -> Result<api::Comment, ApiError>;

    async fn update_comment(&self, id: &CommentId, content: &str)
        -> Result<api::Comment, ApiError>;

    async fn delete_comment(&self, id: &CommentId) -> Result<(), ApiError>;
}

/// [`RemoteSync`] over the backend's REST API
pub struct HttpRemote {
    client: reqwest::Client,
    host: String,
    token: RwLock<Option<AuthToken>>,
}

fn unreachable(err: reqwest::Error) -> ApiError {
    tracing::warn!(?err, "request did not get a response");
    ApiError::Unreachable(err.to_string())
}

impl HttpRemote {
    /// `host` is the backend's base url, eg. `https://blog.example.org`
    pub fn new(
        host: String,
        token: Option<AuthToken>,
        config: &ThreadConfig,
    ) -> reqwest::Result<HttpRemote> {
        Ok(HttpRemote {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout)
                .build()?,
            host: String::from(host.trim_end_matches('/')),
            token: RwLock::new(token),
        })
    }

    pub fn set_token(&self, token: AuthToken) {
        *self.token.write() = Some(token);
    }

    pub fn clear_token(&self) {
        *self.token.write() = None;
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.read().is_some()
    }

    fn token(&self) -> Result<AuthToken, ApiError> {
        self.token.read().clone().ok_or_else(|| {
            tracing::info!("refusing to send a mutating request without credentials");
            ApiError::Unauthorized
        })
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, ApiError> {
        let token = self.token()?;
        Ok(req.header(reqwest::header::AUTHORIZATION, token.header_value()))
    }

    /// Sends `req` and returns the body of a successful response
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let resp = req.send().await.map_err(unreachable)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(unreachable)?;
        if !status.is_success() {
            let err = ApiError::parse(status, &body);
            tracing::info!(%status, %err, "server refused request");
            return Err(err);
        }
        Ok(body.to_vec())
    }

    async fn fetch<R>(&self, req: reqwest::RequestBuilder) -> Result<R, ApiError>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        let body = self.send(req).await?;
        serde_json::from_slice::<Payload<R>>(&body)
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?
            .into_inner()
            .ok_or_else(|| ApiError::InvalidResponse(String::from("response has no body")))
    }
}

#[async_trait]
impl RemoteSync for HttpRemote {
    async fn fetch_thread(&self, post: &PostId) -> Result<Vec<api::Comment>, ApiError> {
        let req = self.client.get(format!("{}/api/posts/{}", self.host, post));
        let post: api::PostWithComments = self.fetch(req).await?;
        Ok(post.into_flat_comments())
    }

    async fn create_comment(
        &self,
        post: &PostId,
        parent: Option<&CommentId>,
        author: &str,
        content: &str,
    ) -> Result<api::Comment, ApiError> {
        let req = self.authed(self.client.post(format!("{}/api/comments", self.host)))?;
        self.fetch(req.json(&api::NewComment {
            post_id: post.clone(),
            parent_id: parent.cloned(),
            author: String::from(author),
            content: String::from(content),
        }))
        .await
    }

    async fn update_comment(
        &self,
        id: &CommentId,
        content: &str,
    ) -> Result<api::Comment, ApiError> {
        let req = self.authed(self.client.put(format!("{}/api/comments/{}", self.host, id)))?;
        self.fetch(req.json(&api::CommentUpdate {
            content: String::from(content),
        }))
        .await
    }

    async fn delete_comment(&self, id: &CommentId) -> Result<(), ApiError> {
        let req = self.authed(
            self.client
                .delete(format!("{}/api/comments/{}", self.host, id)),
        )?;
        self.send(req).await?;
        Ok(())
    }
}
