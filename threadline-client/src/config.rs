use std::time::Duration;

use crate::api;

/// Tunables of a thread view
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadConfig {
    /// Replies never get nested deeper than this; replies to comments at this depth
    /// become siblings of the comment they answer
    pub max_depth: usize,

    /// Content shown in place of a deleted comment
    pub deleted_placeholder: String,

    /// How long a request may take before it is considered failed
    pub request_timeout: Duration,
}

impl Default for ThreadConfig {
    fn default() -> ThreadConfig {
        ThreadConfig {
            max_depth: 5,
            deleted_placeholder: String::from(api::DELETED_COMMENT_CONTENT),
            request_timeout: Duration::from_secs(30),
        }
    }
}
