use std::collections::HashMap;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::domain::category::Category;
use crate::domain::post::{NewPost, Post, PostChanges};
use crate::domain::types::{CategoryId, PostId};
use crate::models::category::Category as DbCategory;
use crate::models::post::{CategoryPost, NewPost as DbNewPost, Post as DbPost};
use crate::repository::{
    DieselRepository, PostListQuery, PostReader, PostWriter, RepositoryError, RepositoryResult,
};

/// Categories of the given posts keyed by post id, each list ordered by name.
fn load_categories(
    conn: &mut SqliteConnection,
    post_ids: &[i32],
) -> RepositoryResult<HashMap<i32, Vec<Category>>> {
    use crate::schema::{categories, category_post};

    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = category_post::table
        .inner_join(categories::table)
        .filter(category_post::post_id.eq_any(post_ids.to_vec()))
        .order((categories::name.asc(), categories::id.asc()))
        .select((category_post::post_id, categories::all_columns))
        .load::<(i32, DbCategory)>(conn)?;

    let mut grouped: HashMap<i32, Vec<Category>> = HashMap::new();
    for (post_id, category) in rows {
        grouped
            .entry(post_id)
            .or_default()
            .push(category.try_into()?);
    }
    Ok(grouped)
}

fn insert_category_links(
    conn: &mut SqliteConnection,
    post_id: i32,
    category_ids: &[CategoryId],
) -> RepositoryResult<usize> {
    use crate::schema::category_post;

    let rows = category_ids
        .iter()
        .map(|category_id| CategoryPost {
            post_id,
            category_id: category_id.get(),
        })
        .collect::<Vec<_>>();

    if rows.is_empty() {
        return Ok(0);
    }

    let affected = diesel::insert_into(category_post::table)
        .values(&rows)
        .execute(conn)?;

    Ok(affected)
}

impl PostReader for DieselRepository {
    fn list_posts(&self, query: PostListQuery) -> RepositoryResult<(usize, Vec<Post>)> {
        use crate::schema::posts;

        let mut conn = self.conn()?;

        let total = posts::table.count().get_result::<i64>(&mut conn)? as usize;

        let mut items = posts::table.into_boxed::<diesel::sqlite::Sqlite>();

        if let Some(pagination) = &query.pagination {
            items = items
                .offset(pagination.offset() as i64)
                .limit(pagination.per_page as i64);
        }

        let rows = items
            .order((posts::created_at.desc(), posts::id.desc()))
            .load::<DbPost>(&mut conn)?;

        let post_ids = rows.iter().map(|row| row.id).collect::<Vec<_>>();
        let mut categories = load_categories(&mut conn, &post_ids)?;

        let items = rows
            .into_iter()
            .map(|row| {
                let post_categories = categories.remove(&row.id).unwrap_or_default();
                row.into_domain(post_categories)
            })
            .collect::<Result<Vec<Post>, _>>()?;

        Ok((total, items))
    }

    fn get_post_by_id(&self, id: PostId) -> RepositoryResult<Option<Post>> {
        use crate::schema::posts;

        let mut conn = self.conn()?;

        let row = posts::table
            .filter(posts::id.eq(id.get()))
            .first::<DbPost>(&mut conn)
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };

        let post_categories = load_categories(&mut conn, &[row.id])?
            .remove(&row.id)
            .unwrap_or_default();

        Ok(Some(row.into_domain(post_categories)?))
    }
}

impl PostWriter for DieselRepository {
    fn create_post(&self, post: &NewPost) -> RepositoryResult<PostId> {
        use crate::schema::posts;

        let mut conn = self.conn()?;

        let post_id = conn.transaction::<_, RepositoryError, _>(|conn| {
            let db_post: DbNewPost = post.into();

            let post_id = diesel::insert_into(posts::table)
                .values(&db_post)
                .returning(posts::id)
                .get_result::<i32>(conn)?;

            insert_category_links(conn, post_id, &post.category_ids)?;

            Ok(post_id)
        })?;

        Ok(PostId::new(post_id)?)
    }

    fn update_post(&self, id: PostId, changes: &PostChanges) -> RepositoryResult<usize> {
        use crate::schema::{category_post, posts};

        let mut conn = self.conn()?;

        let affected = conn.transaction::<_, RepositoryError, _>(|conn| {
            let affected = diesel::update(posts::table.filter(posts::id.eq(id.get())))
                .set((
                    posts::description.eq(changes.description.as_str()),
                    posts::image_path.eq(changes.image_path.as_str()),
                    posts::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)?;

            if affected == 0 {
                return Ok(0);
            }

            diesel::delete(category_post::table.filter(category_post::post_id.eq(id.get())))
                .execute(conn)?;
            insert_category_links(conn, id.get(), &changes.category_ids)?;

            Ok(affected)
        })?;

        Ok(affected)
    }

    fn delete_post(&self, id: PostId) -> RepositoryResult<usize> {
        use crate::schema::{category_post, posts};

        let mut conn = self.conn()?;

        let affected = conn.transaction::<_, RepositoryError, _>(|conn| {
            diesel::delete(category_post::table.filter(category_post::post_id.eq(id.get())))
                .execute(conn)?;

            let affected =
                diesel::delete(posts::table.filter(posts::id.eq(id.get()))).execute(conn)?;

            Ok(affected)
        })?;

        Ok(affected)
    }
}
