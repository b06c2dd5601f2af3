use crate::api::{self, CommentId, PostId, Time};

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Comment author must not be empty")]
    EmptyAuthor,

    #[error("Comment content must not be empty")]
    EmptyContent,

    #[error("Comment must belong to a post")]
    MissingPostId,
}

/// Checks the fields a user fills in before anything is sent to the server
pub fn validate_submission(author: &str, content: &str) -> Result<(), ValidationError> {
    if !api::is_filled(author) {
        return Err(ValidationError::EmptyAuthor);
    }
    validate_content(content)
}

pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    match api::is_filled(content) {
        true => Ok(()),
        false => Err(ValidationError::EmptyContent),
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentNode {
    pub id: CommentId,
    pub post_id: PostId,

    /// Parent in the local tree, None for a top-level comment
    pub parent_id: Option<CommentId>,

    /// Comment this one answers, as the server knows it.
    ///
    /// Differs from `parent_id` only when the reply was flattened by the depth cap.
    pub reply_to: Option<CommentId>,

    pub author: String,
    pub content: String,
    pub created_at: Time,

    /// Replies in server-acknowledged creation order
    pub children: Vec<CommentId>,

    pub deleted: bool,
}

impl CommentNode {
    pub fn new(
        id: CommentId,
        post_id: PostId,
        parent_id: Option<CommentId>,
        author: String,
        content: String,
        created_at: Time,
    ) -> Result<CommentNode, ValidationError> {
        if post_id.0.is_empty() {
            return Err(ValidationError::MissingPostId);
        }
        validate_submission(&author, &content)?;
        Ok(CommentNode {
            id,
            post_id,
            reply_to: parent_id.clone(),
            parent_id,
            author,
            content,
            created_at,
            children: Vec::new(),
            deleted: false,
        })
    }

    /// Builds a node from what the server returned.
    ///
    /// A deleted comment is accepted whatever its content, and gets `placeholder` as content.
    pub fn from_wire(c: api::Comment, placeholder: &str) -> Result<CommentNode, ValidationError> {
        if !c.deleted {
            return CommentNode::new(c.id, c.post_id, c.parent_id, c.author, c.content, c.date);
        }
        if c.post_id.0.is_empty() {
            return Err(ValidationError::MissingPostId);
        }
        Ok(CommentNode {
            id: c.id,
            post_id: c.post_id,
            reply_to: c.parent_id.clone(),
            parent_id: c.parent_id,
            author: c.author,
            content: String::from(placeholder),
            created_at: c.date,
            children: Vec::new(),
            deleted: true,
        })
    }

    pub fn is_flattened(&self) -> bool {
        self.reply_to != self.parent_id
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn wire(content: &str, deleted: bool) -> api::Comment {
        api::Comment {
            id: CommentId(String::from("1")),
            post_id: PostId(String::from("42")),
            parent_id: None,
            author: String::from("Alice"),
            date: Utc::now(),
            content: String::from(content),
            deleted,
        }
    }

    #[test]
    fn new_validates_fields() {
        let mk = |post: &str, author: &str, content: &str| {
            CommentNode::new(
                CommentId(String::from("1")),
                PostId(String::from(post)),
                None,
                String::from(author),
                String::from(content),
                Utc::now(),
            )
        };
        assert_eq!(mk("42", "", "hi").unwrap_err(), ValidationError::EmptyAuthor);
        assert_eq!(mk("42", "Alice", "  \n").unwrap_err(), ValidationError::EmptyContent);
        assert_eq!(mk("", "Alice", "hi").unwrap_err(), ValidationError::MissingPostId);
        let n = mk("42", "Alice", "hi").unwrap();
        assert!(!n.deleted);
        assert!(n.children.is_empty());
        assert!(!n.is_flattened());
    }

    #[test]
    fn deleted_wire_comment_gets_placeholder() {
        let n = CommentNode::from_wire(wire("", true), "[deleted]").unwrap();
        assert!(n.deleted);
        assert_eq!(n.content, "[deleted]");
        assert_eq!(
            CommentNode::from_wire(wire("", false), "[deleted]").unwrap_err(),
            ValidationError::EmptyContent,
        );
    }
}
