//! Food catalog
//!
//! Foods live in twelve fixed categories keyed by (category, id).
//! Nutrient values are per suggested amount.

use rusqlite::{params, OptionalExtension, Row};

use super::error::{StoreError, StoreResult};
use super::sqlite::SqliteStore;
use super::types::{CarbLine, CarbSelection, CarbTotal, Food, FoodStats};

pub const CATEGORIES: [&str; 12] = [
    "verduras",
    "frutas",
    "cereales_sin_grasa",
    "cereales_con_grasa",
    "leguminosas",
    "de_origen_animal",
    "leche_entera",
    "leche_descremada",
    "leche_con_azucar",
    "aceites_grasas",
    "azucares",
    "platos_preparados",
];

const FOOD_COLUMNS: &str = "id, category, name, base_dish, image, suggested_amount, unit, \
     gross_weight_g, net_weight_g, energy_kcal, protein_g, lipids_g, carbohydrates_g";

pub fn is_category(category: &str) -> bool {
    CATEGORIES.contains(&category)
}

fn check_category(category: &str) -> StoreResult<()> {
    if is_category(category) {
        Ok(())
    } else {
        Err(StoreError::NotFound(format!("food category {}", category)))
    }
}

fn food_from_row(row: &Row<'_>) -> rusqlite::Result<Food> {
    Ok(Food {
        id: row.get(0)?,
        category: row.get(1)?,
        name: row.get(2)?,
        base_dish: row.get(3)?,
        image: row.get(4)?,
        suggested_amount: row.get(5)?,
        unit: row.get(6)?,
        gross_weight_g: row.get(7)?,
        net_weight_g: row.get(8)?,
        energy_kcal: row.get(9)?,
        protein_g: row.get(10)?,
        lipids_g: row.get(11)?,
        carbohydrates_g: row.get(12)?,
    })
}

#[allow(clippy::too_many_arguments)]
fn sample(
    category: &str,
    id: i64,
    name: &str,
    suggested_amount: f64,
    unit: &str,
    gross_weight_g: f64,
    net_weight_g: f64,
    energy_kcal: f64,
    protein_g: f64,
    carbohydrates_g: f64,
) -> Food {
    Food {
        id,
        category: category.to_string(),
        name: name.to_string(),
        base_dish: None,
        image: None,
        suggested_amount,
        unit: unit.to_string(),
        gross_weight_g,
        net_weight_g,
        energy_kcal,
        protein_g,
        lipids_g: 0.0,
        carbohydrates_g,
    }
}

/// Starter rows used when the catalog is empty
pub fn sample_foods() -> Vec<Food> {
    vec![
        sample("verduras", 1, "Acelga cocida", 2.0, "tazas", 360.0, 360.0, 72.0, 7.2, 10.8),
        sample("verduras", 2, "Brócoli cocido", 1.5, "tazas", 270.0, 270.0, 68.0, 6.8, 10.2),
        sample("frutas", 1, "Manzana", 1.0, "pieza", 150.0, 130.0, 60.0, 0.0, 15.0),
        sample("frutas", 2, "Plátano", 0.5, "pieza", 80.0, 60.0, 60.0, 0.0, 15.0),
        sample("cereales_sin_grasa", 1, "Arroz blanco cocido", 0.5, "taza", 90.0, 90.0, 70.0, 2.0, 15.0),
    ]
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl SqliteStore {
    /// Insert or replace foods; categories must be known
    pub fn upsert_foods(&self, foods: &[Food]) -> StoreResult<usize> {
        for food in foods {
            check_category(&food.category)?;
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR REPLACE INTO foods ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                FOOD_COLUMNS
            ))?;
            for f in foods {
                stmt.execute(params![
                    f.id,
                    f.category,
                    f.name,
                    f.base_dish,
                    f.image,
                    f.suggested_amount,
                    f.unit,
                    f.gross_weight_g,
                    f.net_weight_g,
                    f.energy_kcal,
                    f.protein_g,
                    f.lipids_g,
                    f.carbohydrates_g,
                ])?;
            }
        }
        tx.commit()?;
        Ok(foods.len())
    }

    pub fn food_count(&self) -> StoreResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM foods", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    /// Seed the sample foods if the catalog is empty; returns rows added
    pub fn seed_sample_foods(&self) -> StoreResult<usize> {
        if self.food_count()? > 0 {
            return Ok(0);
        }
        let added = self.upsert_foods(&sample_foods())?;
        tracing::info!(foods = added, "Seeded sample food catalog");
        Ok(added)
    }

    pub fn foods_by_category(&self, category: &str) -> StoreResult<Vec<Food>> {
        check_category(category)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM foods WHERE category = ?1 ORDER BY id",
            FOOD_COLUMNS
        ))?;
        let foods = stmt
            .query_map(params![category], food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    pub fn food(&self, category: &str, id: i64) -> StoreResult<Food> {
        check_category(category)?;

        let conn = self.conn()?;
        let food = conn
            .query_row(
                &format!(
                    "SELECT {} FROM foods WHERE category = ?1 AND id = ?2",
                    FOOD_COLUMNS
                ),
                params![category, id],
                food_from_row,
            )
            .optional()?;
        food.ok_or_else(|| StoreError::NotFound(format!("food {}/{}", category, id)))
    }

    /// Case-insensitive substring search by name
    pub fn search_foods(&self, term: &str, category: Option<&str>) -> StoreResult<Vec<Food>> {
        let categories: Vec<&str> = match category {
            Some(c) => {
                check_category(c)?;
                vec![c]
            }
            None => CATEGORIES.to_vec(),
        };

        let needle = term.trim().to_lowercase();
        let mut results = Vec::new();
        for c in categories {
            results.extend(
                self.foods_by_category(c)?
                    .into_iter()
                    .filter(|f| f.name.to_lowercase().contains(&needle)),
            );
        }
        Ok(results)
    }

    pub fn food_stats(&self) -> StoreResult<FoodStats> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT COUNT(*) FROM foods WHERE category = ?1")?;

        let mut categories = Vec::with_capacity(CATEGORIES.len());
        let mut total_foods = 0;
        for category in CATEGORIES {
            let count: i64 = stmt.query_row(params![category], |row| row.get(0))?;
            let count = count.max(0) as usize;
            total_foods += count;
            categories.push((category.to_string(), count));
        }

        Ok(FoodStats {
            total_categories: CATEGORIES.len(),
            categories,
            total_foods,
        })
    }

    /// Sum carbohydrates over selected foods, scaled by servings
    pub fn carbohydrate_total(&self, selections: &[CarbSelection]) -> StoreResult<CarbTotal> {
        let mut items = Vec::with_capacity(selections.len());
        for s in selections {
            if !s.servings.is_finite() || s.servings < 0.0 {
                return Err(StoreError::Invalid(format!(
                    "servings must be a non-negative number, got {}",
                    s.servings
                )));
            }
            let food = self.food(&s.category, s.id)?;
            items.push(CarbLine {
                category: food.category,
                id: food.id,
                name: food.name,
                servings: s.servings,
                carbohydrates_g: food.carbohydrates_g * s.servings,
            });
        }

        let total = items.iter().map(|i| i.carbohydrates_g).sum::<f64>();
        Ok(CarbTotal {
            items,
            total_carbohydrates_g: round2(total),
        })
    }
}
