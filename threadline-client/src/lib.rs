mod config;
pub use config::ThreadConfig;

mod controller;
pub use controller::{ActionState, Prompt, ThreadController};

mod error;
pub use error::Error;

mod node;
pub use node::{validate_content, validate_submission, CommentNode, ValidationError};

mod remote;
pub use remote::{HttpRemote, RemoteSync};

pub mod render;
pub use render::{HtmlSurface, Surface, TextSurface, View, ViewNode};

mod store;
pub use store::{StoreError, ThreadStore};

mod ui;
pub use ui::{Draft, Target, UiState};

mod fake;
mod fuzz;

pub mod api {
    pub use threadline_api::*;
}
