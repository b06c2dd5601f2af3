use std::collections::HashMap;

use crate::api::CommentId;

/// What an action is about: a comment, or the post's own comment box
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Target {
    TopLevel,
    Comment(CommentId),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::TopLevel => f.write_str("the post"),
            Target::Comment(id) => write!(f, "comment {id}"),
        }
    }
}

/// Text typed in an input box and not yet accepted by the server
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Draft {
    pub author: String,
    pub content: String,
}

/// Transient presentation state of a thread view.
///
/// Nothing here is authoritative: losing it only loses unsent drafts.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UiState {
    pub top_level_draft: Draft,
    pub reply_boxes: HashMap<CommentId, Draft>,
    pub edit_boxes: HashMap<CommentId, Draft>,
    pub errors: HashMap<Target, String>,
    pub login_prompt: bool,
}

impl UiState {
    pub fn error_for(&self, target: &Target) -> Option<&str> {
        self.errors.get(target).map(|e| &e[..])
    }
}
