use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::category::Category as DomainCategory;
use crate::domain::post::{NewPost as DomainNewPost, Post as DomainPost};
use crate::domain::types::{ImagePath, PostDescription, TypeConstraintError};

/// Diesel model representing a row in the `posts` table.
#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::posts)]
pub struct Post {
    pub id: i32,
    pub user_id: i32,
    pub description: String,
    pub image_path: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Insertable form of [`Post`] used for creating new rows.
#[derive(Insertable)]
#[diesel(table_name = crate::schema::posts)]
pub struct NewPost<'a> {
    pub user_id: i32,
    pub description: &'a str,
    pub image_path: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Row of the `category_post` join table.
#[derive(Debug, Clone, Insertable, Queryable)]
#[diesel(table_name = crate::schema::category_post)]
pub struct CategoryPost {
    pub post_id: i32,
    pub category_id: i32,
}

impl Post {
    /// Converts the row into a domain post carrying the given categories.
    pub fn into_domain(
        self,
        categories: Vec<DomainCategory>,
    ) -> Result<DomainPost, TypeConstraintError> {
        Ok(DomainPost {
            id: self.id.try_into()?,
            user_id: self.user_id.try_into()?,
            description: PostDescription::new(self.description)?,
            image_path: ImagePath::new(self.image_path)?,
            categories,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl<'a> From<&'a DomainNewPost> for NewPost<'a> {
    fn from(post: &'a DomainNewPost) -> Self {
        Self {
            user_id: post.user_id.get(),
            description: post.description.as_str(),
            image_path: post.image_path.as_str(),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}
