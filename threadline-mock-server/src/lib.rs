use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use threadline_api::{
    self as api, AuthToken, CommentId, Error, NewComment, PostId, PostWithComments,
    ThreadedComment,
};

mod router;
pub use router::{router, serve};

/// In-memory blog backend speaking the comment API
pub struct MockServer {
    posts: BTreeMap<PostId, String>,
    comments: Vec<api::Comment>,
    sessions: HashSet<AuthToken>,
    next_comment_id: u64,
    next_session_id: u64,
    num_requests: usize,
}

fn rejected(status: u16, message: &str) -> Error {
    Error::Rejected {
        status,
        message: String::from(message),
    }
}

fn no_such_comment() -> Error {
    rejected(400, "NO_SUCH_COMMENT")
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            posts: BTreeMap::new(),
            comments: Vec::new(),
            sessions: HashSet::new(),
            next_comment_id: 1,
            next_session_id: 1,
            num_requests: 0,
        }
    }

    pub fn add_post(&mut self, id: PostId, title: String) {
        self.posts.insert(id, title);
    }

    /// Opens a session and returns its token
    pub fn add_session(&mut self) -> AuthToken {
        let tok = AuthToken(format!("session-{}", self.next_session_id));
        self.next_session_id += 1;
        self.sessions.insert(tok.clone());
        tok
    }

    pub fn revoke(&mut self, tok: &AuthToken) {
        self.sessions.remove(tok);
    }

    /// Return the number of mutating requests received so far, authenticated or not
    pub fn test_num_requests(&self) -> usize {
        self.num_requests
    }

    /// Return the comments of `post` in creation order
    pub fn test_comments(&self, post: &PostId) -> Vec<api::Comment> {
        self.comments
            .iter()
            .filter(|c| &c.post_id == post)
            .cloned()
            .collect()
    }

    fn resolve(&mut self, tok: Option<&AuthToken>) -> Result<(), Error> {
        self.num_requests += 1;
        match tok {
            Some(tok) if self.sessions.contains(tok) => Ok(()),
            _ => Err(Error::Unauthorized),
        }
    }

    fn comment_mut(&mut self, id: &CommentId) -> Result<&mut api::Comment, Error> {
        self.comments
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(no_such_comment)
    }

    pub fn get_post(&self, id: &PostId) -> Result<PostWithComments, Error> {
        let title = self
            .posts
            .get(id)
            .ok_or_else(|| rejected(404, "NO_SUCH_POST"))?;
        let comments = ThreadedComment::build(self.test_comments(id));
        Ok(PostWithComments {
            id: id.clone(),
            title: title.clone(),
            comments: (!comments.is_empty()).then_some(comments),
        })
    }

    pub fn create_comment(
        &mut self,
        tok: Option<&AuthToken>,
        c: NewComment,
    ) -> Result<api::Comment, Error> {
        self.resolve(tok)?;
        if !api::is_filled(&c.author) {
            return Err(rejected(400, "Invalid login"));
        }
        if !api::is_filled(&c.content) {
            return Err(rejected(400, "Invalid comment content"));
        }
        if !self.posts.contains_key(&c.post_id) {
            return Err(rejected(400, "Invalid request"));
        }
        if let Some(parent) = &c.parent_id {
            if !self
                .comments
                .iter()
                .any(|p| &p.id == parent && p.post_id == c.post_id)
            {
                return Err(rejected(400, "Invalid request"));
            }
        }
        let comment = api::Comment {
            id: CommentId(self.next_comment_id.to_string()),
            post_id: c.post_id,
            parent_id: c.parent_id,
            author: c.author,
            date: Utc::now(),
            content: c.content,
            deleted: false,
        };
        self.next_comment_id += 1;
        self.comments.push(comment.clone());
        Ok(comment)
    }

    pub fn update_comment(
        &mut self,
        tok: Option<&AuthToken>,
        id: &CommentId,
        content: String,
    ) -> Result<api::Comment, Error> {
        self.resolve(tok)?;
        if !api::is_filled(&content) {
            return Err(rejected(400, "Invalid comment content"));
        }
        let c = self.comment_mut(id)?;
        if c.deleted {
            return Err(no_such_comment());
        }
        c.content = content;
        Ok(c.clone())
    }

    /// Tombstones the comment, keeping its replies reachable
    pub fn delete_comment(
        &mut self,
        tok: Option<&AuthToken>,
        id: &CommentId,
    ) -> Result<(), Error> {
        self.resolve(tok)?;
        let c = self.comment_mut(id)?;
        c.deleted = true;
        c.content = String::from(api::DELETED_COMMENT_CONTENT);
        Ok(())
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> PostId {
        PostId(String::from("42"))
    }

    fn new_comment(parent: Option<&str>, content: &str) -> NewComment {
        NewComment {
            post_id: post(),
            parent_id: parent.map(|p| CommentId(String::from(p))),
            author: String::from("Alice"),
            content: String::from(content),
        }
    }

    fn server() -> (MockServer, AuthToken) {
        let mut s = MockServer::new();
        s.add_post(post(), String::from("Hello world"));
        let tok = s.add_session();
        (s, tok)
    }

    #[test]
    fn comments_get_threaded() {
        let (mut s, tok) = server();
        let a = s.create_comment(Some(&tok), new_comment(None, "a")).unwrap();
        let b = s
            .create_comment(Some(&tok), new_comment(Some(&a.id.0), "b"))
            .unwrap();
        s.create_comment(Some(&tok), new_comment(None, "c")).unwrap();
        let p = s.get_post(&post()).unwrap();
        let trees = p.comments.unwrap();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].childs[0].comment.id, b.id);
        assert_eq!(s.test_num_requests(), 3);
    }

    #[test]
    fn post_without_comments_has_null_comments() {
        let (s, _) = server();
        assert_eq!(s.get_post(&post()).unwrap().comments, None);
        assert_eq!(
            s.get_post(&PostId(String::from("7"))),
            Err(rejected(404, "NO_SUCH_POST"))
        );
    }

    #[test]
    fn mutations_require_a_live_session() {
        let (mut s, tok) = server();
        assert_eq!(
            s.create_comment(None, new_comment(None, "a")),
            Err(Error::Unauthorized)
        );
        s.revoke(&tok);
        assert_eq!(
            s.create_comment(Some(&tok), new_comment(None, "a")),
            Err(Error::Unauthorized)
        );
        assert_eq!(s.test_num_requests(), 2);
        assert!(s.test_comments(&post()).is_empty());
    }

    #[test]
    fn invalid_submissions_are_rejected() {
        let (mut s, tok) = server();
        assert_eq!(
            s.create_comment(Some(&tok), new_comment(None, "  ")),
            Err(rejected(400, "Invalid comment content"))
        );
        assert_eq!(
            s.create_comment(Some(&tok), new_comment(Some("9"), "a")),
            Err(rejected(400, "Invalid request"))
        );
        assert_eq!(
            s.update_comment(Some(&tok), &CommentId(String::from("9")), String::from("x")),
            Err(no_such_comment())
        );
    }

    #[test]
    fn delete_keeps_replies() {
        let (mut s, tok) = server();
        let a = s.create_comment(Some(&tok), new_comment(None, "a")).unwrap();
        s.create_comment(Some(&tok), new_comment(Some(&a.id.0), "b"))
            .unwrap();
        s.delete_comment(Some(&tok), &a.id).unwrap();
        s.delete_comment(Some(&tok), &a.id).unwrap();
        let flat = s.get_post(&post()).unwrap().into_flat_comments();
        assert_eq!(flat.len(), 2);
        assert!(flat[0].deleted);
        assert_eq!(flat[0].content, api::DELETED_COMMENT_CONTENT);
        assert_eq!(flat[1].content, "b");
        assert_eq!(
            s.update_comment(Some(&tok), &a.id, String::from("back")),
            Err(no_such_comment())
        );
    }
}
