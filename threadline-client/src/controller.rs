use std::collections::HashMap;

use parking_lot::Mutex;

use crate::{
    api::{self, CommentId, Error as ApiError, PostId},
    node::{self, CommentNode},
    render::{self, ActionKind, Interaction, Surface, View, ViewNode},
    ui::{Draft, Target, UiState},
    Error, RemoteSync, StoreError, ThreadConfig, ThreadStore,
};

/// Where an action on a target stands
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActionState {
    Idle,
    Submitting,
    Applied,
    Failed,
}

/// Asks the user to confirm destructive actions
pub trait Prompt {
    fn confirm_delete(&self, comment: &CommentNode) -> bool;
}

/// Drives the comment thread of one post.
///
/// Every action goes to the server first, and the store is only updated once the server
/// accepted it. At most one action per target is in flight at any time.
pub struct ThreadController<R> {
    remote: R,
    config: ThreadConfig,
    store: Mutex<ThreadStore>,
    ui: Mutex<UiState>,
    states: Mutex<HashMap<Target, ActionState>>,
}

/// Marks a target as submitting for as long as it lives
struct InFlight<'a> {
    states: &'a Mutex<HashMap<Target, ActionState>>,
    target: Target,
    done: bool,
}

impl InFlight<'_> {
    fn finish(mut self, state: ActionState) {
        self.states.lock().insert(self.target.clone(), state);
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            // the action future got dropped before completion
            self.states.lock().insert(self.target.clone(), ActionState::Failed);
        }
    }
}

impl<R: RemoteSync> ThreadController<R> {
    pub fn new(remote: R, post_id: PostId, config: ThreadConfig) -> ThreadController<R> {
        ThreadController {
            store: Mutex::new(ThreadStore::new(post_id, &config)),
            remote,
            config,
            ui: Mutex::new(UiState::default()),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Creates the controller and fetches the thread
    pub async fn open(
        remote: R,
        post_id: PostId,
        config: ThreadConfig,
    ) -> Result<ThreadController<R>, Error> {
        let this = ThreadController::new(remote, post_id, config);
        this.reload().await?;
        Ok(this)
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn config(&self) -> &ThreadConfig {
        &self.config
    }

    pub fn post_id(&self) -> PostId {
        self.store.lock().post_id().clone()
    }

    /// Runs `f` on the current state of the thread
    pub fn with_store<T>(&self, f: impl FnOnce(&ThreadStore) -> T) -> T {
        f(&self.store.lock())
    }

    pub fn store_snapshot(&self) -> ThreadStore {
        self.store.lock().clone()
    }

    pub fn ui_snapshot(&self) -> UiState {
        self.ui.lock().clone()
    }

    pub fn state_of(&self, target: &Target) -> ActionState {
        self.states
            .lock()
            .get(target)
            .copied()
            .unwrap_or(ActionState::Idle)
    }

    pub fn view(&self) -> View {
        let store = self.store.lock();
        let ui = self.ui.lock();
        render::render(&store, &ui)
    }

    pub fn subtree(&self, id: &CommentId) -> Option<ViewNode> {
        let store = self.store.lock();
        let ui = self.ui.lock();
        render::render_subtree(&store, &ui, id)
    }

    pub fn draw<S: Surface>(&self, surface: &S) -> S::Output {
        surface.draw(&self.view())
    }

    /// Replaces the store's contents with the server's current thread
    pub async fn reload(&self) -> Result<(), Error> {
        let post_id = self.post_id();
        let comments = match self.remote.fetch_thread(&post_id).await {
            Ok(c) => c,
            Err(err) => {
                self.surface_error(&Target::TopLevel, &Error::Api(err.clone()));
                return Err(Error::Api(err));
            }
        };
        let nodes = comments
            .into_iter()
            .map(|c| {
                let id = c.id.clone();
                CommentNode::from_wire(c, &self.config.deleted_placeholder).map_err(|err| {
                    StoreError::Integrity(format!("server sent invalid comment {id}: {err}"))
                })
            })
            .collect::<Result<Vec<_>, _>>();
        let res = nodes.and_then(|nodes| self.store.lock().load(nodes));
        if let Err(err) = &res {
            tracing::error!(post = %post_id, %err, "failed loading thread");
        }
        Ok(res?)
    }

    fn begin(&self, target: &Target) -> Result<InFlight<'_>, Error> {
        let mut states = self.states.lock();
        if states.get(target) == Some(&ActionState::Submitting) {
            tracing::debug!(%target, "rejecting action while another one is in flight");
            return Err(Error::Api(ApiError::Conflict(target.to_string())));
        }
        states.insert(target.clone(), ActionState::Submitting);
        Ok(InFlight {
            states: &self.states,
            target: target.clone(),
            done: false,
        })
    }

    /// Shows `err` to the user, as a login prompt if that is what it is about
    fn surface_error(&self, target: &Target, err: &Error) {
        let mut ui = self.ui.lock();
        if err.is_unauthorized() {
            tracing::info!(%target, "action requires logging in");
            ui.login_prompt = true;
        } else {
            tracing::warn!(%target, %err, "action failed");
            ui.errors.insert(target.clone(), err.to_string());
        }
    }

    fn applied(&self, target: &Target, guard: InFlight<'_>) {
        guard.finish(ActionState::Applied);
        let mut ui = self.ui.lock();
        ui.errors.remove(target);
        ui.login_prompt = false;
    }

    fn failed<T>(
        &self,
        target: &Target,
        guard: Option<InFlight<'_>>,
        err: Error,
    ) -> Result<T, Error> {
        if let Some(guard) = guard {
            guard.finish(ActionState::Failed);
        }
        self.surface_error(target, &err);
        Err(err)
    }

    /// Builds the node for a comment the server just created, attaching it under the
    /// local parent a reply to `nominal` goes to
    fn place(
        &self,
        store: &ThreadStore,
        created: api::Comment,
        nominal: Option<&CommentId>,
    ) -> Result<CommentNode, Error> {
        let id = created.id.clone();
        let mut node = CommentNode::from_wire(created, &self.config.deleted_placeholder)
            .map_err(|err| {
                StoreError::Integrity(format!("server created invalid comment {id}: {err}"))
            })?;
        node.parent_id = store.placement_for(nominal)?;
        node.reply_to = nominal.cloned();
        Ok(node)
    }

    /// Claims `target` for a new action, showing the user why if it is busy
    fn start(&self, target: &Target) -> Result<InFlight<'_>, Error> {
        match self.begin(target) {
            Ok(guard) => Ok(guard),
            Err(err) => self.failed(target, None, err),
        }
    }

    /// Adds a comment the server just created to the store, unless a reload already did
    fn record_created(
        &self,
        created: api::Comment,
        nominal: Option<&CommentId>,
    ) -> Result<CommentId, Error> {
        let mut store = self.store.lock();
        if store.find(&created.id).is_some() {
            tracing::debug!(comment = %created.id, "created comment was already loaded");
            return Ok(created.id);
        }
        let node = self.place(&store, created, nominal)?;
        let id = node.id.clone();
        store.insert(node)?;
        Ok(id)
    }

    /// Posts a new top-level comment
    pub async fn create(&self, author: String, content: String) -> Result<CommentId, Error> {
        let target = Target::TopLevel;
        let guard = self.start(&target)?;
        self.ui.lock().top_level_draft = Draft {
            author: author.clone(),
            content: content.clone(),
        };
        if let Err(err) = node::validate_submission(&author, &content) {
            return self.failed(&target, Some(guard), err.into());
        }
        let post_id = self.post_id();
        tracing::debug!(post = %post_id, "submitting new comment");
        let res = self
            .remote
            .create_comment(&post_id, None, &author, &content)
            .await;
        let created = match res {
            Ok(c) => c,
            Err(err) => return self.failed(&target, Some(guard), err.into()),
        };
        match self.record_created(created, None) {
            Ok(id) => {
                self.ui.lock().top_level_draft = Draft::default();
                self.applied(&target, guard);
                tracing::info!(comment = %id, "comment created");
                Ok(id)
            }
            Err(err) => self.failed(&target, Some(guard), err),
        }
    }

    /// Answers `parent`, nesting the reply unless `parent` is already at the maximum depth
    pub async fn reply(
        &self,
        parent: &CommentId,
        author: String,
        content: String,
    ) -> Result<CommentId, Error> {
        let target = Target::Comment(parent.clone());
        let guard = self.start(&target)?;
        {
            let mut ui = self.ui.lock();
            ui.edit_boxes.remove(parent);
            ui.reply_boxes.insert(
                parent.clone(),
                Draft {
                    author: author.clone(),
                    content: content.clone(),
                },
            );
        }
        if let Err(err) = node::validate_submission(&author, &content) {
            return self.failed(&target, Some(guard), err.into());
        }
        if self.store.lock().find(parent).is_none() {
            let err = StoreError::NotFound(parent.clone());
            return self.failed(&target, Some(guard), err.into());
        }
        let post_id = self.post_id();
        tracing::debug!(post = %post_id, %parent, "submitting reply");
        let res = self
            .remote
            .create_comment(&post_id, Some(parent), &author, &content)
            .await;
        let created = match res {
            Ok(c) => c,
            Err(err) => return self.failed(&target, Some(guard), err.into()),
        };
        match self.record_created(created, Some(parent)) {
            Ok(id) => {
                self.ui.lock().reply_boxes.remove(parent);
                self.applied(&target, guard);
                tracing::info!(comment = %id, %parent, "reply created");
                Ok(id)
            }
            Err(err) => self.failed(&target, Some(guard), err),
        }
    }

    pub async fn edit(&self, id: &CommentId, content: String) -> Result<(), Error> {
        let target = Target::Comment(id.clone());
        let guard = self.start(&target)?;
        {
            let mut ui = self.ui.lock();
            ui.reply_boxes.remove(id);
            ui.edit_boxes.insert(
                id.clone(),
                Draft {
                    author: String::new(),
                    content: content.clone(),
                },
            );
        }
        if let Err(err) = node::validate_content(&content) {
            return self.failed(&target, Some(guard), err.into());
        }
        if self.store.lock().find(id).is_none() {
            let err = StoreError::NotFound(id.clone());
            return self.failed(&target, Some(guard), err.into());
        }
        tracing::debug!(comment = %id, "submitting edit");
        let updated = match self.remote.update_comment(id, &content).await {
            Ok(c) => c,
            Err(err) => return self.failed(&target, Some(guard), err.into()),
        };
        let new_content = match api::is_filled(&updated.content) {
            true => updated.content,
            false => content,
        };
        let res = self.store.lock().replace_content(id, new_content);
        match res {
            Ok(()) => {
                self.ui.lock().edit_boxes.remove(id);
                self.applied(&target, guard);
                tracing::info!(comment = %id, "comment edited");
                Ok(())
            }
            Err(err) => self.failed(&target, Some(guard), err.into()),
        }
    }

    /// Deletes `id`, which must already have been confirmed by the user
    pub async fn delete(&self, id: &CommentId) -> Result<(), Error> {
        let target = Target::Comment(id.clone());
        let guard = self.start(&target)?;
        if self.store.lock().find(id).is_none() {
            let err = StoreError::NotFound(id.clone());
            return self.failed(&target, Some(guard), err.into());
        }
        tracing::debug!(comment = %id, "submitting deletion");
        if let Err(err) = self.remote.delete_comment(id).await {
            return self.failed(&target, Some(guard), err.into());
        }
        let res = self.store.lock().tombstone(id);
        match res {
            Ok(()) => {
                {
                    let mut ui = self.ui.lock();
                    ui.reply_boxes.remove(id);
                    ui.edit_boxes.remove(id);
                }
                self.applied(&target, guard);
                tracing::info!(comment = %id, "comment deleted");
                Ok(())
            }
            Err(err) => self.failed(&target, Some(guard), err.into()),
        }
    }

    fn live_comment(&self, id: &CommentId) -> Result<Option<CommentNode>, Error> {
        let store = self.store.lock();
        let n = store
            .find(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Ok((!n.deleted).then(|| n.clone()))
    }

    /// Opens the reply box under `id`, closing its edit box if open
    pub fn open_reply(&self, id: &CommentId) -> Result<(), Error> {
        if self.live_comment(id)?.is_none() {
            return Ok(());
        }
        let mut ui = self.ui.lock();
        ui.edit_boxes.remove(id);
        ui.reply_boxes.entry(id.clone()).or_default();
        Ok(())
    }

    /// Opens the edit box of `id` filled with its current content, closing its reply box
    pub fn open_edit(&self, id: &CommentId) -> Result<(), Error> {
        let n = match self.live_comment(id)? {
            Some(n) => n,
            None => return Ok(()),
        };
        let mut ui = self.ui.lock();
        ui.reply_boxes.remove(id);
        ui.edit_boxes.entry(id.clone()).or_insert(Draft {
            author: String::new(),
            content: n.content,
        });
        Ok(())
    }

    /// Closes the boxes of `target` and forgets its error, or empties the comment form
    pub fn cancel(&self, target: &Target) {
        let mut ui = self.ui.lock();
        ui.errors.remove(target);
        match target {
            Target::TopLevel => ui.top_level_draft = Draft::default(),
            Target::Comment(id) => {
                ui.reply_boxes.remove(id);
                ui.edit_boxes.remove(id);
            }
        }
    }

    /// Records what the user typed in the open box of `target`
    pub fn set_draft(&self, target: &Target, draft: Draft) {
        let mut ui = self.ui.lock();
        match target {
            Target::TopLevel => ui.top_level_draft = draft,
            Target::Comment(id) => {
                if let Some(d) = ui.edit_boxes.get_mut(id) {
                    *d = draft;
                } else if let Some(d) = ui.reply_boxes.get_mut(id) {
                    *d = draft;
                }
            }
        }
    }

    /// Handles an interaction resolved by the render adapter
    pub async fn interact(
        &self,
        interaction: Interaction,
        prompt: &dyn Prompt,
    ) -> Result<(), Error> {
        let id = match &interaction.target {
            Target::TopLevel => {
                return match interaction.action {
                    ActionKind::Save => {
                        let draft = self.ui.lock().top_level_draft.clone();
                        self.create(draft.author, draft.content).await.map(|_| ())
                    }
                    ActionKind::Cancel => {
                        self.cancel(&Target::TopLevel);
                        Ok(())
                    }
                    _ => Ok(()),
                }
            }
            Target::Comment(id) => id,
        };
        match interaction.action {
            ActionKind::Reply => self.open_reply(id),
            ActionKind::Edit => self.open_edit(id),
            ActionKind::Delete => match self.live_comment(id)? {
                Some(n) if prompt.confirm_delete(&n) => self.delete(id).await,
                _ => Ok(()),
            },
            ActionKind::Save => {
                let (edit, reply) = {
                    let ui = self.ui.lock();
                    (ui.edit_boxes.get(id).cloned(), ui.reply_boxes.get(id).cloned())
                };
                match (edit, reply) {
                    (Some(d), _) => self.edit(id, d.content).await,
                    (None, Some(d)) => self.reply(id, d.author, d.content).await.map(|_| ()),
                    (None, None) => Ok(()),
                }
            }
            ActionKind::Cancel => {
                self.cancel(&interaction.target);
                Ok(())
            }
        }
    }
}
