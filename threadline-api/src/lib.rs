use chrono::Utc;

mod auth;
pub use auth::AuthToken;

mod comment;
pub use comment::{Comment, CommentUpdate, NewComment, PostWithComments, ThreadedComment};

mod error;
pub use error::Error;

mod response;
pub use response::{Payload, Response};

pub type Time = chrono::DateTime<Utc>;

/// Text the backend stores in place of a deleted comment's content
pub const DELETED_COMMENT_CONTENT: &str = "The content of this comment has been deleted";

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    pub fn stub() -> PostId {
        PostId(String::from("0"))
    }
}

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns true iff `s` still has some content once surrounding whitespace is removed
pub fn is_filled(s: &str) -> bool {
    !s.trim().is_empty()
}
