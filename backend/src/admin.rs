use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::AdminUser;
use crate::db;
use crate::error::ApiError;
use crate::listings::ListingResponse;
use crate::models::{Listing, User};
use crate::schema::{listings, users};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserResponse {
    pub uid: String,
    pub email: String,
    pub role: String,
    pub is_verified: bool,
    pub created_at: NaiveDateTime,
}

async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<AdminUserResponse>>, ApiError> {
    let mut conn = db::connect(&state.config.database_url)?;

    let rows: Vec<User> = users::table
        .order_by(users::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(
        rows.into_iter()
            .map(|user| AdminUserResponse {
                uid: user.id.to_string(),
                email: user.email,
                role: user.role,
                is_verified: user.is_verified,
                created_at: user.created_at,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetVerifiedRequest {
    is_verified: Option<bool>,
}

/// Grants or revokes the landlord trust badge. The flag lives on the user
/// row only; every listing surface derives it from there by join.
async fn set_verified(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(raw_id): Path<String>,
    Json(req): Json<SetVerifiedRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let flag = req
        .is_verified
        .ok_or_else(|| ApiError::Validation("isVerified is required.".to_string()))?;
    let user_id: i32 = raw_id
        .parse()
        .map_err(|_| ApiError::NotFound("User not found.".to_string()))?;

    let mut conn = db::connect(&state.config.database_url)?;
    let updated = diesel::update(users::table.find(user_id))
        .set(users::is_verified.eq(flag))
        .execute(&mut conn)?;
    if updated == 0 {
        return Err(ApiError::NotFound("User not found.".to_string()));
    }

    log::info!("Admin set user {} verified={}", user_id, flag);
    Ok(Json(json!({ "message": "User verification status updated." })))
}

async fn list_all_listings(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let mut conn = db::connect(&state.config.database_url)?;

    // Unlike the public catalog, inactive listings are included.
    let rows: Vec<(Listing, bool)> = listings::table
        .inner_join(users::table)
        .order_by(listings::created_at.desc())
        .select((listings::all_columns, users::is_verified))
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(ListingResponse::from_row).collect()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetActiveRequest {
    is_active: Option<bool>,
}

async fn set_active(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(raw_id): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let flag = req
        .is_active
        .ok_or_else(|| ApiError::Validation("isActive is required.".to_string()))?;
    let listing_id: i32 = raw_id
        .parse()
        .map_err(|_| ApiError::NotFound("Listing not found.".to_string()))?;

    let mut conn = db::connect(&state.config.database_url)?;
    let updated = diesel::update(listings::table.find(listing_id))
        .set(listings::is_active.eq(flag))
        .execute(&mut conn)?;
    if updated == 0 {
        return Err(ApiError::NotFound("Listing not found.".to_string()));
    }

    log::info!("Admin set listing {} active={}", listing_id, flag);
    Ok(Json(json!({ "message": "Listing status updated." })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id/verify", put(set_verified))
        .route("/listings", get(list_all_listings))
        .route("/listings/:id/status", put(set_active))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_rows_use_wire_field_names() {
        let row = AdminUserResponse {
            uid: "2".to_string(),
            email: "l@b.c".to_string(),
            role: "landlord".to_string(),
            is_verified: false,
            created_at: NaiveDateTime::default(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["uid"], "2");
        assert_eq!(json["isVerified"], false);
        assert!(json.as_object().unwrap().contains_key("createdAt"));
    }
}
