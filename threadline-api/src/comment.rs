use std::collections::HashMap;

use crate::{CommentId, PostId, Time};

/// A comment as the backend stores and returns it
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,

    #[serde(rename = "postID")]
    pub post_id: PostId,

    /// None for a top-level comment
    #[serde(rename = "parentID")]
    pub parent_id: Option<CommentId>,

    pub author: String,
    pub date: Time,
    pub content: String,

    #[serde(default)]
    pub deleted: bool,
}

/// Body of `POST /api/comments`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    #[serde(rename = "PostID", alias = "postID")]
    pub post_id: PostId,

    #[serde(rename = "ParentID", alias = "parentID", default)]
    pub parent_id: Option<CommentId>,

    #[serde(rename = "Author", alias = "author")]
    pub author: String,

    #[serde(rename = "Content", alias = "content")]
    pub content: String,
}

/// Body of `PUT /api/comments/{id}`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentUpdate {
    #[serde(rename = "Content", alias = "content")]
    pub content: String,
}

/// A comment along with its replies, as embedded in a post response
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ThreadedComment {
    #[serde(flatten)]
    pub comment: Comment,

    #[serde(default)]
    pub childs: Vec<ThreadedComment>,
}

impl ThreadedComment {
    /// Nests a flat list of comments, keeping the list's order among siblings.
    ///
    /// Comments whose parent is not in the list are dropped along with their replies.
    pub fn build(comments: Vec<Comment>) -> Vec<ThreadedComment> {
        let mut children: HashMap<Option<CommentId>, Vec<Comment>> = HashMap::new();
        for c in comments {
            children.entry(c.parent_id.clone()).or_default().push(c);
        }
        fn attach(
            parent: Option<CommentId>,
            children: &mut HashMap<Option<CommentId>, Vec<Comment>>,
        ) -> Vec<ThreadedComment> {
            children
                .remove(&parent)
                .unwrap_or_default()
                .into_iter()
                .map(|comment| {
                    let childs = attach(Some(comment.id.clone()), children);
                    ThreadedComment { comment, childs }
                })
                .collect()
        }
        attach(None, &mut children)
    }

    /// Flattens a forest into pre-order, parents always before their replies
    pub fn flatten(trees: Vec<ThreadedComment>) -> Vec<Comment> {
        let mut res = Vec::new();
        let mut stack = trees;
        stack.reverse();
        while let Some(t) = stack.pop() {
            res.push(t.comment);
            stack.extend(t.childs.into_iter().rev());
        }
        res
    }
}

/// Body of `GET /api/posts/{id}`, restricted to what the comment thread needs
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PostWithComments {
    pub id: PostId,

    #[serde(default)]
    pub title: String,

    /// The backend sends `null` for a post without comments
    #[serde(default)]
    pub comments: Option<Vec<ThreadedComment>>,
}

impl PostWithComments {
    pub fn into_flat_comments(self) -> Vec<Comment> {
        ThreadedComment::flatten(self.comments.unwrap_or_default())
    }
}
