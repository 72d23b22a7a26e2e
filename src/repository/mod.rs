use crate::db::{DbConnection, DbPool};
use crate::domain::category::{Category, NewCategory};
use crate::domain::post::{NewPost, Post, PostChanges};
use crate::domain::types::{CategoryId, PostId, UserId};
use crate::domain::user::User;
use crate::pagination::Pagination;

pub mod category;
pub mod errors;
pub mod post;
#[cfg(test)]
pub mod test;
pub mod user;

pub use errors::{RepositoryError, RepositoryResult};

/// Repository implementation backed by Diesel and SQLite.
///
/// The underlying `r2d2::Pool` is cheap to clone, allowing the repository to
/// be passed around freely between handlers.
#[derive(Clone)]
pub struct DieselRepository {
    pool: DbPool, // r2d2::Pool is cheap to clone
}

impl DieselRepository {
    /// Create a new repository from an established database pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a pooled database connection.
    fn conn(&self) -> RepositoryResult<DbConnection> {
        Ok(self.pool.get()?)
    }
}

/// Query parameters used when listing posts.
#[derive(Debug, Clone, Default)]
pub struct PostListQuery {
    /// Pagination parameters.
    pub pagination: Option<Pagination>,
}

impl PostListQuery {
    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Some(Pagination { page, per_page });
        self
    }
}

/// Read-only operations for categories.
///
/// This is the category lister consulted by the post forms; tests substitute
/// it with an in-memory double.
pub trait CategoryReader {
    /// Every category, ordered by name. An empty list is a valid answer.
    fn list_categories(&self) -> RepositoryResult<Vec<Category>>;
    /// The subset of `ids` that do not name an existing category.
    fn missing_category_ids(&self, ids: &[CategoryId]) -> RepositoryResult<Vec<CategoryId>>;
}

/// Write operations for categories.
pub trait CategoryWriter {
    /// Persist a new category and return it.
    fn create_category(&self, category: &NewCategory) -> RepositoryResult<Category>;
}

/// Read-only operations for posts.
pub trait PostReader {
    /// List posts, newest first, with their categories.
    fn list_posts(&self, query: PostListQuery) -> RepositoryResult<(usize, Vec<Post>)>;
    /// Retrieve a post and its categories by identifier.
    fn get_post_by_id(&self, id: PostId) -> RepositoryResult<Option<Post>>;
}

/// Write operations for posts and their category assignments.
pub trait PostWriter {
    /// Insert the post and one `category_post` row per category atomically.
    fn create_post(&self, post: &NewPost) -> RepositoryResult<PostId>;
    /// Apply `changes` and replace the category set atomically. Returns the
    /// number of updated post rows.
    fn update_post(&self, id: PostId, changes: &PostChanges) -> RepositoryResult<usize>;
    /// Delete the post with its category assignments. Returns the number of
    /// deleted post rows.
    fn delete_post(&self, id: PostId) -> RepositoryResult<usize>;
}

/// Read-only operations for users.
pub trait UserReader {
    fn get_user_by_id(&self, id: UserId) -> RepositoryResult<Option<User>>;
}
