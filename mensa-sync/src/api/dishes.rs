//! GET /dishes?date=YYYY-MM-DD

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use mensa_common::db::Dish;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query parameters of GET /dishes
#[derive(Debug, Deserialize)]
pub struct DishesQuery {
    /// Serving date; today (local time) when omitted
    pub date: Option<String>,
}

/// GET /dishes
pub async fn list_dishes(
    State(state): State<AppState>,
    Query(query): Query<DishesQuery>,
) -> ApiResult<Json<Vec<Dish>>> {
    let date = match query.date.as_deref().map(str::trim) {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("Invalid date (expected YYYY-MM-DD): {}", date)))?,
        None => chrono::Local::now().date_naive(),
    };

    let dishes = state
        .store
        .list_by_date(&date.format("%Y-%m-%d").to_string())
        .await?;
    Ok(Json(dishes))
}

/// Build dish routes
pub fn dish_routes() -> Router<AppState> {
    Router::new().route("/dishes", get(list_dishes))
}
