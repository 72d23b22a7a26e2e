use diesel::prelude::*;

use crate::domain::category::{Category, NewCategory};
use crate::domain::types::CategoryId;
use crate::models::category::{Category as DbCategory, NewCategory as DbNewCategory};
use crate::repository::{CategoryReader, CategoryWriter, DieselRepository, RepositoryResult};

impl CategoryReader for DieselRepository {
    fn list_categories(&self) -> RepositoryResult<Vec<Category>> {
        use crate::schema::categories;

        let mut conn = self.conn()?;

        let items = categories::table
            .order((categories::name.asc(), categories::id.asc()))
            .load::<DbCategory>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<Category>, _>>()?;

        Ok(items)
    }

    fn missing_category_ids(&self, ids: &[CategoryId]) -> RepositoryResult<Vec<CategoryId>> {
        use crate::schema::categories;

        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.conn()?;

        let raw_ids = ids.iter().map(|id| id.get()).collect::<Vec<i32>>();
        let found = categories::table
            .filter(categories::id.eq_any(raw_ids))
            .select(categories::id)
            .load::<i32>(&mut conn)?;

        Ok(ids
            .iter()
            .copied()
            .filter(|id| !found.contains(&id.get()))
            .collect())
    }
}

impl CategoryWriter for DieselRepository {
    fn create_category(&self, category: &NewCategory) -> RepositoryResult<Category> {
        use crate::schema::categories;

        let mut conn = self.conn()?;
        let db_category: DbNewCategory = category.clone().into();

        let created = diesel::insert_into(categories::table)
            .values(db_category)
            .returning(categories::all_columns)
            .get_result::<DbCategory>(&mut conn)?;

        Ok(created.try_into()?)
    }
}
