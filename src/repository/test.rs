use std::sync::Mutex;

use chrono::DateTime;

use crate::domain::category::{Category, NewCategory};
use crate::domain::post::{NewPost, Post, PostChanges};
use crate::domain::types::{CategoryId, PostId, UserId};
use crate::domain::user::User;
use crate::repository::{
    CategoryReader, CategoryWriter, PostListQuery, PostReader, PostWriter, RepositoryError,
    RepositoryResult, UserReader,
};

/// Simple in-memory repository used for unit tests.
#[derive(Default)]
pub struct TestRepository {
    users: Vec<User>,
    categories: Mutex<Vec<Category>>,
    posts: Mutex<Vec<Post>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl TestRepository {
    pub fn new(users: Vec<User>, categories: Vec<Category>, posts: Vec<Post>) -> Self {
        Self {
            users,
            categories: Mutex::new(categories),
            posts: Mutex::new(posts),
            ..Self::default()
        }
    }

    /// Make every read return a database error.
    pub fn with_failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Make every write return a database error.
    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Snapshot of the stored posts.
    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }

    fn check_read(&self) -> RepositoryResult<()> {
        if self.fail_reads {
            Err(RepositoryError::Database(diesel::result::Error::BrokenTransactionManager))
        } else {
            Ok(())
        }
    }

    fn check_write(&self) -> RepositoryResult<()> {
        if self.fail_writes {
            Err(RepositoryError::Database(diesel::result::Error::RollbackTransaction))
        } else {
            Ok(())
        }
    }

    fn resolve_categories(&self, ids: &[CategoryId]) -> Vec<Category> {
        let categories = self.categories.lock().unwrap();
        let mut resolved = ids
            .iter()
            .filter_map(|id| categories.iter().find(|c| c.id == *id).cloned())
            .collect::<Vec<_>>();
        resolved.sort_by(|a, b| a.name.cmp(&b.name));
        resolved
    }
}

impl CategoryReader for TestRepository {
    fn list_categories(&self) -> RepositoryResult<Vec<Category>> {
        self.check_read()?;
        let mut items = self.categories.lock().unwrap().clone();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn missing_category_ids(&self, ids: &[CategoryId]) -> RepositoryResult<Vec<CategoryId>> {
        self.check_read()?;
        let categories = self.categories.lock().unwrap();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| !categories.iter().any(|c| c.id == *id))
            .collect())
    }
}

impl CategoryWriter for TestRepository {
    fn create_category(&self, category: &NewCategory) -> RepositoryResult<Category> {
        self.check_write()?;
        let mut categories = self.categories.lock().unwrap();
        let created = Category {
            id: CategoryId::new(categories.len() as i32 + 1)?,
            name: category.name.clone(),
            created_at: category.created_at,
            updated_at: category.updated_at,
        };
        categories.push(created.clone());
        Ok(created)
    }
}

impl PostReader for TestRepository {
    fn list_posts(&self, query: PostListQuery) -> RepositoryResult<(usize, Vec<Post>)> {
        self.check_read()?;
        let mut items = self.posts();
        items.sort_by(|a, b| b.id.cmp(&a.id));
        let total = items.len();
        if let Some(pagination) = query.pagination {
            items = items
                .into_iter()
                .skip(pagination.offset())
                .take(pagination.per_page)
                .collect();
        }
        Ok((total, items))
    }

    fn get_post_by_id(&self, id: PostId) -> RepositoryResult<Option<Post>> {
        self.check_read()?;
        Ok(self.posts().into_iter().find(|p| p.id == id))
    }
}

impl PostWriter for TestRepository {
    fn create_post(&self, post: &NewPost) -> RepositoryResult<PostId> {
        self.check_write()?;
        let categories = self.resolve_categories(&post.category_ids);
        let mut posts = self.posts.lock().unwrap();
        let id = PostId::new(posts.iter().map(|p| p.id.get()).max().unwrap_or(0) + 1)?;
        posts.push(Post {
            id,
            user_id: post.user_id,
            description: post.description.clone(),
            image_path: post.image_path.clone(),
            categories,
            created_at: post.created_at,
            updated_at: post.updated_at,
        });
        Ok(id)
    }

    fn update_post(&self, id: PostId, changes: &PostChanges) -> RepositoryResult<usize> {
        self.check_write()?;
        let categories = self.resolve_categories(&changes.category_ids);
        let mut posts = self.posts.lock().unwrap();
        match posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                post.description = changes.description.clone();
                post.image_path = changes.image_path.clone();
                post.categories = categories;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_post(&self, id: PostId) -> RepositoryResult<usize> {
        self.check_write()?;
        let mut posts = self.posts.lock().unwrap();
        let before = posts.len();
        posts.retain(|p| p.id != id);
        Ok(before - posts.len())
    }
}

impl UserReader for TestRepository {
    fn get_user_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        self.check_read()?;
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }
}

/// Fixed timestamp for fixtures.
pub fn epoch() -> chrono::NaiveDateTime {
    DateTime::from_timestamp(0, 0).unwrap().naive_utc()
}
