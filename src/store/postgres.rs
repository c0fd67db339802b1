use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::Date;
use tracing::debug;
use uuid::Uuid;

use super::{
    BatchKey, Category, CategoryKind, CategoryStore, ConstraintViolation, DayPlan,
    DeductionOutcome, Ingredient, IngredientListItem, IngredientPatch, IngredientStore,
    NewIngredient, NewRecipe, PlanStore, PurchaseItem, PurchaseMerge, Recipe, RecipeRequirement,
    RecipeRow, RecipeStore, RequirementDetail, StockAdjustment, StockDeduction, StockShortage,
    WeeklyPlanEntry,
};

const INGREDIENT_COLUMNS: &str = "id, name, unit, stock, expiry_date, category_id";
const RECIPE_COLUMNS: &str = "id, name, meal_type, description, recipe_category_id";
const PLAN_COLUMNS: &str =
    "id, week_start_date, day_of_week, breakfast_recipe_id, lunch_recipe_id, dinner_recipe_id";

/// SQLSTATE for arithmetic that leaves the BIGINT range.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Turns integrity failures into [`ConstraintViolation`] so a lost race on a
/// unique key or a dangling reference reaches the caller as a rejected write.
fn db_error(err: sqlx::Error, what: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        let subject = db.constraint().unwrap_or(what).to_string();
        let violation = if db.is_unique_violation() {
            Some(ConstraintViolation::Duplicate(subject))
        } else if db.is_foreign_key_violation() {
            Some(ConstraintViolation::MissingReference(subject))
        } else if db.is_check_violation() || db.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE) {
            Some(ConstraintViolation::OutOfRange(subject))
        } else {
            None
        };
        if let Some(violation) = violation {
            debug!(%violation, "write refused by constraint");
            return violation.into();
        }
    }
    anyhow::Error::new(err).context(what)
}

/// Category table of each kind, with the table and column that reference it.
fn category_tables(kind: CategoryKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        CategoryKind::Ingredient => ("categories", "ingredients", "category_id"),
        CategoryKind::Recipe => ("recipe_categories", "recipes", "recipe_category_id"),
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl IngredientStore for PgStore {
    async fn list_ingredients(&self) -> anyhow::Result<Vec<IngredientListItem>> {
        let rows = sqlx::query_as::<_, IngredientListItem>(
            r#"
            SELECT i.id, i.name, i.unit, i.stock, i.expiry_date, i.category_id,
                   c.name AS category_name
              FROM ingredients i
              LEFT JOIN categories c ON c.id = i.category_id
             ORDER BY i.name ASC, i.expiry_date ASC NULLS LAST
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("list ingredients")?;
        Ok(rows)
    }

    async fn get_ingredient(&self, id: Uuid) -> anyhow::Result<Option<Ingredient>> {
        let row = sqlx::query_as::<_, Ingredient>(&format!(
            "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("get ingredient")?;
        Ok(row)
    }

    async fn find_ingredient_by_batch_key(&self, key: &BatchKey) -> anyhow::Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
              FROM ingredients
             WHERE name = $1
               AND unit = $2
               AND expiry_date IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(&key.name)
        .bind(&key.unit)
        .bind(key.expiry_date)
        .fetch_optional(&self.pool)
        .await
        .context("find ingredient by batch key")?;
        Ok(id)
    }

    async fn create_ingredient(&self, new: &NewIngredient) -> anyhow::Result<Ingredient> {
        let row = sqlx::query_as::<_, Ingredient>(&format!(
            r#"
            INSERT INTO ingredients (id, name, unit, stock, expiry_date, category_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {INGREDIENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.unit)
        .bind(new.stock)
        .bind(new.expiry_date)
        .bind(new.category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error(e, "insert ingredient"))?;
        Ok(row)
    }

    async fn update_ingredient(
        &self,
        id: Uuid,
        patch: &IngredientPatch,
    ) -> anyhow::Result<Option<Ingredient>> {
        let row = sqlx::query_as::<_, Ingredient>(&format!(
            r#"
            UPDATE ingredients
               SET name = COALESCE($2, name),
                   unit = COALESCE($3, unit),
                   stock = COALESCE($4, stock),
                   expiry_date = COALESCE($5, expiry_date),
                   category_id = COALESCE($6, category_id)
             WHERE id = $1
            RETURNING {INGREDIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.unit.as_deref())
        .bind(patch.stock)
        .bind(patch.expiry_date)
        .bind(patch.category_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(e, "update ingredient"))?;
        Ok(row)
    }

    async fn delete_ingredient(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM ingredients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete ingredient")?;
        Ok(res.rows_affected() > 0)
    }

    async fn adjust_stock(&self, id: Uuid, delta: i64) -> anyhow::Result<StockAdjustment> {
        let stock = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE ingredients
               SET stock = stock + $2
             WHERE id = $1 AND stock + $2 >= 0
            RETURNING stock
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(e, "adjust stock"))?;

        if let Some(stock) = stock {
            return Ok(StockAdjustment::Applied { stock });
        }
        Ok(match self.get_ingredient(id).await? {
            Some(lot) => StockAdjustment::WouldGoNegative { lot },
            None => StockAdjustment::Missing,
        })
    }

    async fn apply_deductions(
        &self,
        deductions: &[StockDeduction],
    ) -> anyhow::Result<DeductionOutcome> {
        // Fixed lock order across concurrent commits.
        let mut ordered = deductions.to_vec();
        ordered.sort_by_key(|d| d.ingredient_id);

        let mut tx = self.pool.begin().await.context("begin deduction")?;
        let mut short = Vec::new();
        for d in &ordered {
            let remaining = sqlx::query_scalar::<_, i64>(
                r#"
                UPDATE ingredients
                   SET stock = stock - $2
                 WHERE id = $1 AND stock >= $2
                RETURNING stock
                "#,
            )
            .bind(d.ingredient_id)
            .bind(d.quantity)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error(e, "decrement stock"))?;

            if remaining.is_none() {
                let lot = sqlx::query_as::<_, Ingredient>(&format!(
                    "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = $1"
                ))
                .bind(d.ingredient_id)
                .fetch_optional(&mut *tx)
                .await
                .context("read short lot")?;
                short.push(StockShortage::for_lot(d.ingredient_id, d.quantity, lot.as_ref()));
            }
        }

        if short.is_empty() {
            tx.commit().await.context("commit deduction")?;
            Ok(DeductionOutcome::Applied)
        } else {
            tx.rollback().await.context("roll back deduction")?;
            debug!(short = short.len(), "deduction rolled back");
            Ok(DeductionOutcome::Short(short))
        }
    }

    async fn merge_purchase(&self, item: &PurchaseItem) -> anyhow::Result<PurchaseMerge> {
        let (ingredient_id, stock, created) = sqlx::query_as::<_, (Uuid, i64, bool)>(
            r#"
            INSERT INTO ingredients (id, name, unit, stock, expiry_date, category_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT ON CONSTRAINT ingredients_batch_key
            DO UPDATE SET stock = ingredients.stock + EXCLUDED.stock
            RETURNING id, stock, (xmax = 0) AS created
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&item.name)
        .bind(&item.unit)
        .bind(item.quantity)
        .bind(item.expiry_date)
        .bind(item.category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error(e, "upsert purchased lot"))?;

        Ok(PurchaseMerge {
            ingredient_id,
            created,
            stock,
        })
    }
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn list_categories(&self, kind: CategoryKind) -> anyhow::Result<Vec<Category>> {
        let (table, _, _) = category_tables(kind);
        let rows = sqlx::query_as::<_, Category>(&format!(
            "SELECT id, name FROM {table} ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .context("list categories")?;
        Ok(rows)
    }

    async fn get_category(&self, kind: CategoryKind, id: Uuid) -> anyhow::Result<Option<Category>> {
        let (table, _, _) = category_tables(kind);
        let row = sqlx::query_as::<_, Category>(&format!(
            "SELECT id, name FROM {table} WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("get category")?;
        Ok(row)
    }

    async fn create_category(&self, kind: CategoryKind, name: &str) -> anyhow::Result<Category> {
        let (table, _, _) = category_tables(kind);
        let row = sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO {table} (id, name) VALUES ($1, $2) RETURNING id, name"
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error(e, "insert category"))?;
        Ok(row)
    }

    async fn rename_category(
        &self,
        kind: CategoryKind,
        id: Uuid,
        name: &str,
    ) -> anyhow::Result<Option<Category>> {
        let (table, _, _) = category_tables(kind);
        let row = sqlx::query_as::<_, Category>(&format!(
            "UPDATE {table} SET name = $2 WHERE id = $1 RETURNING id, name"
        ))
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(e, "rename category"))?;
        Ok(row)
    }

    async fn delete_category(&self, kind: CategoryKind, id: Uuid) -> anyhow::Result<bool> {
        let (table, referencing, column) = category_tables(kind);
        let mut tx = self.pool.begin().await.context("begin category delete")?;
        sqlx::query(&format!(
            "UPDATE {referencing} SET {column} = NULL WHERE {column} = $1"
        ))
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("clear category references")?;
        let res = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete category")?;
        tx.commit().await.context("commit category delete")?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl RecipeStore for PgStore {
    async fn list_recipes(&self) -> anyhow::Result<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .context("list recipes")?;
        rows.into_iter().map(Recipe::try_from).collect()
    }

    async fn get_recipe(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("get recipe")?;
        row.map(Recipe::try_from).transpose()
    }

    async fn create_recipe(&self, new: &NewRecipe) -> anyhow::Result<Recipe> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            r#"
            INSERT INTO recipes (id, name, meal_type, description, recipe_category_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(new.meal_type.as_str())
        .bind(new.description.as_deref())
        .bind(new.recipe_category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error(e, "insert recipe"))?;
        row.try_into()
    }

    async fn update_recipe(&self, id: Uuid, new: &NewRecipe) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            r#"
            UPDATE recipes
               SET name = $2, meal_type = $3, description = $4, recipe_category_id = $5
             WHERE id = $1
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&new.name)
        .bind(new.meal_type.as_str())
        .bind(new.description.as_deref())
        .bind(new.recipe_category_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(e, "update recipe"))?;
        row.map(Recipe::try_from).transpose()
    }

    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<bool> {
        // Requirements cascade and plan slots are set null by the schema.
        let res = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete recipe")?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_recipe_requirements(
        &self,
        recipe_id: Uuid,
    ) -> anyhow::Result<Vec<RecipeRequirement>> {
        let rows = sqlx::query_as::<_, RecipeRequirement>(
            r#"
            SELECT id, recipe_id, ingredient_id, quantity
              FROM recipe_ingredients
             WHERE recipe_id = $1
            "#,
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .context("get recipe requirements")?;
        Ok(rows)
    }

    async fn list_all_requirements(&self) -> anyhow::Result<Vec<RecipeRequirement>> {
        let rows = sqlx::query_as::<_, RecipeRequirement>(
            "SELECT id, recipe_id, ingredient_id, quantity FROM recipe_ingredients",
        )
        .fetch_all(&self.pool)
        .await
        .context("list requirements")?;
        Ok(rows)
    }

    async fn list_requirement_details(
        &self,
        recipe_id: Uuid,
    ) -> anyhow::Result<Vec<RequirementDetail>> {
        let rows = sqlx::query_as::<_, RequirementDetail>(
            r#"
            SELECT ri.id, ri.ingredient_id,
                   COALESCE(i.name, '') AS name,
                   COALESCE(i.unit, '') AS unit,
                   ri.quantity
              FROM recipe_ingredients ri
              LEFT JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE ri.recipe_id = $1
             ORDER BY name
            "#,
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .context("list requirement details")?;
        Ok(rows)
    }

    async fn add_requirement(
        &self,
        recipe_id: Uuid,
        ingredient_id: Uuid,
        quantity: i64,
    ) -> anyhow::Result<RecipeRequirement> {
        let row = sqlx::query_as::<_, RecipeRequirement>(
            r#"
            INSERT INTO recipe_ingredients (id, recipe_id, ingredient_id, quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING id, recipe_id, ingredient_id, quantity
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recipe_id)
        .bind(ingredient_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error(e, "insert requirement"))?;
        Ok(row)
    }

    async fn update_requirement(
        &self,
        id: Uuid,
        ingredient_id: Uuid,
        quantity: i64,
    ) -> anyhow::Result<Option<RecipeRequirement>> {
        let row = sqlx::query_as::<_, RecipeRequirement>(
            r#"
            UPDATE recipe_ingredients
               SET ingredient_id = $2, quantity = $3
             WHERE id = $1
            RETURNING id, recipe_id, ingredient_id, quantity
            "#,
        )
        .bind(id)
        .bind(ingredient_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(e, "update requirement"))?;
        Ok(row)
    }

    async fn delete_requirement(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM recipe_ingredients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete requirement")?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl PlanStore for PgStore {
    async fn get_weekly_plan_entries(
        &self,
        week_start: Date,
    ) -> anyhow::Result<Vec<WeeklyPlanEntry>> {
        let rows = sqlx::query_as::<_, WeeklyPlanEntry>(&format!(
            r#"
            SELECT {PLAN_COLUMNS}
              FROM weekly_plan
             WHERE week_start_date = $1
             ORDER BY day_of_week ASC
            "#
        ))
        .bind(week_start)
        .fetch_all(&self.pool)
        .await
        .context("get weekly plan")?;
        Ok(rows)
    }

    async fn upsert_weekly_plan(
        &self,
        week_start: Date,
        days: &[DayPlan],
    ) -> anyhow::Result<Vec<WeeklyPlanEntry>> {
        let mut tx = self.pool.begin().await.context("begin plan upsert")?;
        let mut entries = Vec::with_capacity(days.len());
        for day in days {
            let entry = sqlx::query_as::<_, WeeklyPlanEntry>(&format!(
                r#"
                INSERT INTO weekly_plan
                    (id, week_start_date, day_of_week,
                     breakfast_recipe_id, lunch_recipe_id, dinner_recipe_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT ON CONSTRAINT weekly_plan_day
                DO UPDATE SET breakfast_recipe_id = EXCLUDED.breakfast_recipe_id,
                              lunch_recipe_id = EXCLUDED.lunch_recipe_id,
                              dinner_recipe_id = EXCLUDED.dinner_recipe_id
                RETURNING {PLAN_COLUMNS}
                "#
            ))
            .bind(Uuid::new_v4())
            .bind(week_start)
            .bind(day.day_of_week)
            .bind(day.breakfast_recipe_id)
            .bind(day.lunch_recipe_id)
            .bind(day.dinner_recipe_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error(e, "upsert plan day"))?;
            entries.push(entry);
        }
        tx.commit().await.context("commit plan upsert")?;
        entries.sort_by_key(|e| e.day_of_week);
        Ok(entries)
    }
}
