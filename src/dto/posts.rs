use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::post::Post;
use crate::dto::categories::CategoryDto;
use crate::storage::FileStorage;

/// Post as rendered by templates, with its image resolved to a public URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDto {
    pub id: i32,
    pub user_id: i32,
    pub description: String,
    pub image_path: String,
    pub image_url: String,
    pub categories: Vec<CategoryDto>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl PostDto {
    pub fn from_post<S>(post: Post, storage: &S) -> Self
    where
        S: FileStorage + ?Sized,
    {
        Self {
            id: post.id.get(),
            user_id: post.user_id.get(),
            image_url: storage.url(&post.image_path),
            description: post.description.into_inner(),
            image_path: post.image_path.into_inner(),
            categories: post.categories.into_iter().map(CategoryDto::from).collect(),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// View-model of the create form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostFormView {
    /// Every selectable category; may be empty.
    pub all_categories: Vec<CategoryDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDetailView {
    pub post: PostDto,
    pub author_name: Option<String>,
    /// Whether the viewer owns the post.
    pub can_edit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostEditView {
    pub post: PostDto,
    pub all_categories: Vec<CategoryDto>,
    pub selected_category_ids: Vec<i32>,
}
