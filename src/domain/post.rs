use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::category::Category;
use crate::domain::types::{CategoryId, ImagePath, PostDescription, PostId, UserId};

/// A user-authored post with an attached image and category tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: PostId,
    /// Owner; never changes after creation.
    pub user_id: UserId,
    pub description: PostDescription,
    /// Path of the stored image on the public disk.
    pub image_path: ImagePath,
    /// Categories assigned through `category_post`, ordered by name.
    pub categories: Vec<Category>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Post {
    /// Identifiers of the assigned categories.
    pub fn category_ids(&self) -> Vec<CategoryId> {
        self.categories.iter().map(|c| c.id).collect()
    }
}

/// Information required to create a new [`Post`] together with its category
/// assignments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPost {
    pub user_id: UserId,
    pub description: PostDescription,
    pub image_path: ImagePath,
    pub category_ids: Vec<CategoryId>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Replacement values applied to an existing post on update.
///
/// `category_ids` replaces the whole association set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostChanges {
    pub description: PostDescription,
    pub image_path: ImagePath,
    pub category_ids: Vec<CategoryId>,
}
