//! Food Catalog Routes
//!
//! - GET /api/v1/foods/categories - Category names
//! - GET /api/v1/foods/stats - Counts per category
//! - GET /api/v1/foods/search?q=&category= - Search by name or base dish
//! - GET /api/v1/foods/:category - Foods in a category
//! - GET /api/v1/foods/:category/:id - One food
//! - POST /api/v1/foods/carbs - Carbohydrate total for selected foods

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CarbRequest, CategoriesResponse, FoodListResponse, FoodSearchQuery};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ValidJson;
use crate::api::state::AppState;
use crate::store::{CarbTotal, Food, FoodStats, FOOD_CATEGORIES};

/// Shortest accepted search term
const MIN_SEARCH_CHARS: usize = 2;

/// GET /api/v1/foods/categories
pub async fn list_categories() -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        total: FOOD_CATEGORIES.len(),
        categories: FOOD_CATEGORIES.to_vec(),
    })
}

/// GET /api/v1/foods/stats
pub async fn food_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<FoodStats>> {
    Ok(Json(state.store.food_stats()?))
}

/// GET /api/v1/foods/search
pub async fn search_foods(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FoodSearchQuery>,
) -> ApiResult<Json<FoodListResponse>> {
    let term = params.q.trim();
    if term.chars().count() < MIN_SEARCH_CHARS {
        return Err(ApiError::Validation(format!(
            "search term must have at least {} characters",
            MIN_SEARCH_CHARS
        )));
    }

    let foods = state.store.search_foods(term, params.category.as_deref())?;
    Ok(Json(FoodListResponse {
        category: params.category,
        total: foods.len(),
        foods,
    }))
}

/// GET /api/v1/foods/:category
pub async fn foods_by_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<Json<FoodListResponse>> {
    let foods = state.store.foods_by_category(&category)?;
    Ok(Json(FoodListResponse {
        category: Some(category),
        total: foods.len(),
        foods,
    }))
}

/// GET /api/v1/foods/:category/:id
pub async fn get_food(
    State(state): State<Arc<AppState>>,
    Path((category, id)): Path<(String, i64)>,
) -> ApiResult<Json<Food>> {
    Ok(Json(state.store.food(&category, id)?))
}

/// POST /api/v1/foods/carbs
pub async fn carbohydrate_total(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<CarbRequest>,
) -> ApiResult<Json<CarbTotal>> {
    if req.items.is_empty() {
        return Err(ApiError::Validation("no foods selected".to_string()));
    }
    Ok(Json(state.store.carbohydrate_total(&req.items)?))
}
