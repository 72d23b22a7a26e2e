use crate::domain::types::PostId;

pub mod errors;
pub mod posts;

pub use errors::{ServiceError, ServiceResult};

/// Named routes a successful workflow redirects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    /// `index`
    Index,
    /// `post.create`
    CreatePost,
    /// `post.show`
    ShowPost(PostId),
    /// `post.edit`
    EditPost(PostId),
}

impl Redirect {
    /// URL the named route resolves to.
    pub fn location(&self) -> String {
        match self {
            Self::Index => "/".to_string(),
            Self::CreatePost => "/posts/create".to_string(),
            Self::ShowPost(id) => format!("/posts/{id}"),
            Self::EditPost(id) => format!("/posts/{id}/edit"),
        }
    }
}
