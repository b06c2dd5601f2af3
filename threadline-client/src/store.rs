use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use crate::{
    api::{CommentId, PostId},
    node::{self, CommentNode, ValidationError},
    ThreadConfig,
};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Comment {0} is not in this thread")]
    NotFound(CommentId),

    #[error("Thread integrity violated: {0}")]
    Integrity(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// All the comments of one post, as a forest
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadStore {
    post_id: PostId,
    max_depth: usize,
    placeholder: String,
    nodes: HashMap<CommentId, CommentNode>,
    top_level: Vec<CommentId>,
}

impl ThreadStore {
    pub fn new(post_id: PostId, config: &ThreadConfig) -> ThreadStore {
        ThreadStore {
            post_id,
            max_depth: config.max_depth,
            placeholder: config.deleted_placeholder.clone(),
            nodes: HashMap::new(),
            top_level: Vec::new(),
        }
    }

    pub fn post_id(&self) -> &PostId {
        &self.post_id
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, id: &CommentId) -> Option<&CommentNode> {
        self.nodes.get(id)
    }

    pub fn top_level(&self) -> &[CommentId] {
        &self.top_level
    }

    /// Replies of `id`, empty if `id` is unknown
    pub fn children_of(&self, id: &CommentId) -> &[CommentId] {
        self.nodes.get(id).map(|n| &n.children[..]).unwrap_or(&[])
    }

    /// Replaces the whole contents with the tree described by `nodes`.
    ///
    /// Each node is attached to its `reply_to`, or `parent_id` if unset, subject to the
    /// depth cap. Nodes may come in any order, but siblings keep their relative order
    /// from `nodes`. On error, the current contents are left untouched.
    pub fn load(&mut self, nodes: Vec<CommentNode>) -> Result<(), StoreError> {
        let mut pending = HashMap::with_capacity(nodes.len());
        let mut order = Vec::with_capacity(nodes.len());
        for n in nodes {
            if n.post_id != self.post_id {
                return Err(StoreError::Integrity(format!(
                    "comment {} belongs to post {}, not {}",
                    n.id, n.post_id, self.post_id
                )));
            }
            if pending.contains_key(&n.id) {
                return Err(StoreError::Integrity(format!("duplicate comment {}", n.id)));
            }
            order.push(n.id.clone());
            pending.insert(n.id.clone(), n);
        }

        let mut waiting: HashMap<&CommentId, Vec<usize>> = HashMap::new();
        let mut ready = BinaryHeap::new();
        for (idx, id) in order.iter().enumerate() {
            match nominal_parent(&pending[id]) {
                None => ready.push(Reverse(idx)),
                Some(p) if pending.contains_key(p) => waiting.entry(p).or_default().push(idx),
                Some(p) => {
                    return Err(StoreError::Integrity(format!(
                        "comment {id} replies to unknown comment {p}"
                    )))
                }
            }
        }

        // Insert parents before their replies, otherwise following the input order
        let mut fresh = ThreadStore {
            post_id: self.post_id.clone(),
            max_depth: self.max_depth,
            placeholder: self.placeholder.clone(),
            nodes: HashMap::with_capacity(order.len()),
            top_level: Vec::new(),
        };
        let mut sorted = Vec::with_capacity(order.len());
        while let Some(Reverse(idx)) = ready.pop() {
            sorted.push(idx);
            if let Some(replies) = waiting.remove(&order[idx]) {
                ready.extend(replies.into_iter().map(Reverse));
            }
        }
        if sorted.len() != order.len() {
            return Err(StoreError::Integrity(format!(
                "{} comments form a reply cycle",
                order.len() - sorted.len()
            )));
        }
        drop(waiting);

        for idx in sorted {
            let mut n = pending
                .remove(&order[idx])
                .expect("sorted indices are unique");
            let nominal = nominal_parent(&n).cloned();
            n.parent_id = fresh.placement_for(nominal.as_ref())?;
            n.reply_to = nominal;
            n.children.clear();
            if n.deleted {
                n.content = fresh.placeholder.clone();
            }
            fresh.insert(n)?;
        }

        tracing::debug!(post = %self.post_id, num_comments = fresh.len(), "loaded thread");
        *self = fresh;
        Ok(())
    }

    /// Attaches `node` under its `parent_id`, after the replies already there
    pub fn insert(&mut self, mut node: CommentNode) -> Result<(), StoreError> {
        if node.post_id != self.post_id {
            return Err(StoreError::Integrity(format!(
                "comment {} belongs to post {}, not {}",
                node.id, node.post_id, self.post_id
            )));
        }
        if self.nodes.contains_key(&node.id) {
            return Err(StoreError::Integrity(format!(
                "comment {} is already in the thread",
                node.id
            )));
        }
        match &node.parent_id {
            None => self.top_level.push(node.id.clone()),
            Some(p) => self
                .nodes
                .get_mut(p)
                .ok_or_else(|| StoreError::NotFound(p.clone()))?
                .children
                .push(node.id.clone()),
        }
        if node.reply_to.is_none() {
            node.reply_to = node.parent_id.clone();
        }
        node.children.clear();
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Marks `id` as deleted, keeping its position and replies
    pub fn tombstone(&mut self, id: &CommentId) -> Result<(), StoreError> {
        let n = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !n.deleted {
            n.deleted = true;
            n.content = self.placeholder.clone();
        }
        Ok(())
    }

    pub fn replace_content(&mut self, id: &CommentId, content: String) -> Result<(), StoreError> {
        let n = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        node::validate_content(&content)?;
        n.content = content;
        Ok(())
    }

    /// Number of ancestors of `id`, 0 for a top-level comment
    pub fn depth_of(&self, id: &CommentId) -> Result<usize, StoreError> {
        let mut n = self
            .nodes
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let mut depth = 0;
        while let Some(p) = &n.parent_id {
            n = self.nodes.get(p).ok_or_else(|| {
                StoreError::Integrity(format!("comment {} has dangling parent {p}", n.id))
            })?;
            depth += 1;
            if depth > self.nodes.len() {
                return Err(StoreError::Integrity(format!("comment {id} is in a cycle")));
            }
        }
        Ok(depth)
    }

    /// Returns the local parent a reply to `nominal` gets attached under.
    ///
    /// That is `nominal` itself while it is shallower than the maximum depth, otherwise
    /// its ancestor sitting just above the maximum depth, so the reply lands at the
    /// maximum depth as a sibling.
    pub fn placement_for(
        &self,
        nominal: Option<&CommentId>,
    ) -> Result<Option<CommentId>, StoreError> {
        let nominal = match nominal {
            None => return Ok(None),
            Some(n) => n,
        };
        let depth = self.depth_of(nominal)?;
        if depth < self.max_depth {
            return Ok(Some(nominal.clone()));
        }
        let mut res = nominal;
        for _ in 0..(depth + 1 - self.max_depth) {
            match &self.nodes[res].parent_id {
                Some(p) => res = p,
                None => return Ok(None),
            }
        }
        Ok(Some(res.clone()))
    }

    /// All comments with their depth, parents before replies and siblings in order
    pub fn iter_preorder(&self) -> impl Iterator<Item = (usize, &CommentNode)> + '_ {
        let mut stack = self
            .top_level
            .iter()
            .rev()
            .map(|id| (0, id))
            .collect::<Vec<_>>();
        std::iter::from_fn(move || {
            let (depth, id) = stack.pop()?;
            let n = &self.nodes[id];
            stack.extend(n.children.iter().rev().map(|c| (depth + 1, c)));
            Some((depth, n))
        })
    }
}

fn nominal_parent(n: &CommentNode) -> Option<&CommentId> {
    n.reply_to.as_ref().or(n.parent_id.as_ref())
}
