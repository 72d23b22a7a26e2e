//! Helpers for integration tests.
#![allow(dead_code)]

use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use pushkind_posts::db::{DbPool, establish_connection_pool};
use pushkind_posts::domain::category::{Category, NewCategory};
use pushkind_posts::domain::types::{CategoryName, UserId};
use pushkind_posts::repository::{CategoryWriter, DieselRepository};
use pushkind_posts::schema::users;
use tempfile::NamedTempFile;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!(); // assumes migrations/ exists

/// A 1x1 PNG accepted as a post image.
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Temporary database used in integration tests.
pub struct TestDb {
    _tempfile: NamedTempFile,
    pool: DbPool,
}

impl TestDb {
    pub fn new() -> Self {
        let tempfile = NamedTempFile::new().expect("Failed to create temp file");
        let pool = establish_connection_pool(tempfile.path().to_str().unwrap())
            .expect("Failed to establish SQLite connection.");
        let mut conn = pool
            .get()
            .expect("Failed to get SQLite connection from pool.");
        conn.run_pending_migrations(MIGRATIONS)
            .expect("Migrations failed");
        TestDb {
            _tempfile: tempfile,
            pool,
        }
    }

    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }

    /// Insert a user the way the auth service would and return its id.
    pub fn insert_user(&self, name: &str, email: &str) -> UserId {
        let mut conn = self.pool.get().expect("should acquire DB connection");
        let id: i32 = diesel::insert_into(users::table)
            .values((users::name.eq(name), users::email.eq(email)))
            .returning(users::id)
            .get_result(&mut conn)
            .expect("should insert user");
        UserId::new(id).expect("valid user id")
    }

    pub fn count(&self, table: &str) -> i64 {
        #[derive(QueryableByName)]
        struct Count {
            #[diesel(sql_type = diesel::sql_types::BigInt)]
            total: i64,
        }

        let mut conn = self.pool.get().expect("should acquire DB connection");
        diesel::sql_query(format!("SELECT COUNT(*) AS total FROM {table}"))
            .get_result::<Count>(&mut conn)
            .expect("should count rows")
            .total
    }
}

pub fn create_category(repo: &DieselRepository, name: &str) -> Category {
    let name = CategoryName::new(name).expect("valid category name");
    repo.create_category(&NewCategory::new(name))
        .expect("should create category")
}
