#![cfg(test)]

use async_trait::async_trait;
use chrono::Utc;
use futures::channel::oneshot;
use parking_lot::Mutex;

use crate::{
    api::{self, CommentId, Error as ApiError, PostId},
    RemoteSync,
};

/// In-memory backend recording what it is asked to do
pub struct FakeRemote {
    post: PostId,
    comments: Mutex<Vec<api::Comment>>,
    num_calls: Mutex<usize>,
    next_failure: Mutex<Option<ApiError>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    commit_gate: Mutex<Option<oneshot::Receiver<()>>>,
    last_parent: Mutex<Option<CommentId>>,
}

impl FakeRemote {
    pub fn new(post: PostId) -> FakeRemote {
        FakeRemote {
            post,
            comments: Mutex::new(Vec::new()),
            num_calls: Mutex::new(0),
            next_failure: Mutex::new(None),
            gate: Mutex::new(None),
            commit_gate: Mutex::new(None),
            last_parent: Mutex::new(None),
        }
    }

    /// Adds comments `(id, parent)` directly on the server side
    pub fn seed(&self, comments: Vec<(String, Option<String>)>) {
        let mut c = self.comments.lock();
        for (id, parent) in comments {
            c.push(self.comment(CommentId(id), parent.map(CommentId), "Alice", "seeded"));
        }
    }

    pub fn num_calls(&self) -> usize {
        *self.num_calls.lock()
    }

    pub fn last_parent(&self) -> Option<CommentId> {
        self.last_parent.lock().clone()
    }

    /// Makes the next call fail with `err`
    pub fn fail_next(&self, err: ApiError) {
        *self.next_failure.lock() = Some(err);
    }

    /// Makes the next call wait until `gate` fires
    pub fn hold_next(&self, gate: oneshot::Receiver<()>) {
        *self.gate.lock() = Some(gate);
    }

    /// Makes the next mutation wait until `gate` fires, once the change is already stored
    pub fn hold_next_commit(&self, gate: oneshot::Receiver<()>) {
        *self.commit_gate.lock() = Some(gate);
    }

    fn comment(
        &self,
        id: CommentId,
        parent_id: Option<CommentId>,
        author: &str,
        content: &str,
    ) -> api::Comment {
        api::Comment {
            id,
            post_id: self.post.clone(),
            parent_id,
            author: String::from(author),
            date: Utc::now(),
            content: String::from(content),
            deleted: false,
        }
    }

    async fn call(&self) -> Result<(), ApiError> {
        *self.num_calls.lock() += 1;
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match self.next_failure.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn settle(&self) {
        let gate = self.commit_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }

    fn with_comment<T>(
        &self,
        id: &CommentId,
        f: impl FnOnce(&mut api::Comment) -> T,
    ) -> Result<T, ApiError> {
        self.comments
            .lock()
            .iter_mut()
            .find(|c| &c.id == id)
            .map(f)
            .ok_or_else(|| ApiError::Rejected {
                status: 400,
                message: String::from("NO_SUCH_COMMENT"),
            })
    }
}

#[async_trait]
impl RemoteSync for FakeRemote {
    async fn fetch_thread(&self, post: &PostId) -> Result<Vec<api::Comment>, ApiError> {
        self.call().await?;
        Ok(self
            .comments
            .lock()
            .iter()
            .filter(|c| &c.post_id == post)
            .cloned()
            .collect())
    }

    async fn create_comment(
        &self,
        _post: &PostId,
        parent: Option<&CommentId>,
        author: &str,
        content: &str,
    ) -> Result<api::Comment, ApiError> {
        self.call().await?;
        *self.last_parent.lock() = parent.cloned();
        let c = {
            let mut comments = self.comments.lock();
            let id = CommentId((comments.len() + 1).to_string());
            let c = self.comment(id, parent.cloned(), author, content);
            comments.push(c.clone());
            c
        };
        self.settle().await;
        Ok(c)
    }

    async fn update_comment(
        &self,
        id: &CommentId,
        content: &str,
    ) -> Result<api::Comment, ApiError> {
        self.call().await?;
        let updated = self.with_comment(id, |c| {
            c.content = String::from(content);
            c.clone()
        })?;
        self.settle().await;
        Ok(updated)
    }

    async fn delete_comment(&self, id: &CommentId) -> Result<(), ApiError> {
        self.call().await?;
        self.with_comment(id, |c| {
            c.deleted = true;
            c.content = String::from(api::DELETED_COMMENT_CONTENT);
        })?;
        self.settle().await;
        Ok(())
    }
}
