use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{AuthUser, LandlordUser, StudentUser};
use crate::db;
use crate::error::ApiError;
use crate::models::{BookingStatus, MaintenanceRequest, MaintenanceStatus, NewMaintenanceRequest, Party};
use crate::schema::{bookings, maintenance_requests};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceResponse {
    pub id: String,
    pub listing_id: String,
    pub issue: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

impl MaintenanceResponse {
    fn from_row(row: MaintenanceRequest) -> MaintenanceResponse {
        MaintenanceResponse {
            id: row.id.to_string(),
            listing_id: row.listing_id.to_string(),
            issue: row.issue_description,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMaintenanceRequest {
    listing_id: Option<String>,
    issue: Option<String>,
}

async fn create_request(
    State(state): State<AppState>,
    StudentUser(student): StudentUser,
    Json(req): Json<CreateMaintenanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (listing_raw, issue) = match (req.listing_id, req.issue) {
        (Some(l), Some(i)) if !i.trim().is_empty() => (l, i.trim().to_string()),
        _ => {
            return Err(ApiError::Validation(
                "Listing ID and issue description are required.".to_string(),
            ))
        }
    };
    let no_booking =
        || ApiError::NotFound("Booking not found for this student and listing.".to_string());
    let listing_id: i32 = listing_raw.parse().map_err(|_| no_booking())?;

    let mut conn = db::connect(&state.config.database_url)?;

    // Only a student with a confirmed booking on this listing may report an
    // issue; the landlord comes from that booking, never from the client.
    let landlord_id: Option<i32> = bookings::table
        .filter(
            bookings::student_id
                .eq(student.id)
                .and(bookings::listing_id.eq(listing_id))
                .and(bookings::status.eq(BookingStatus::Confirmed.as_str())),
        )
        .select(bookings::landlord_id)
        .first(&mut conn)
        .optional()?;
    let Some(landlord_id) = landlord_id else {
        return Err(no_booking());
    };

    let request: MaintenanceRequest = diesel::insert_into(maintenance_requests::table)
        .values(&NewMaintenanceRequest {
            listing_id,
            student_id: student.id,
            landlord_id,
            issue_description: issue,
            status: MaintenanceStatus::Open.as_str().to_string(),
        })
        .get_result(&mut conn)?;

    Ok((
        StatusCode::CREATED,
        Json(MaintenanceResponse::from_row(request)),
    ))
}

async fn list_requests(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<MaintenanceResponse>>, ApiError> {
    let mut conn = db::connect(&state.config.database_url)?;

    let rows: Vec<MaintenanceRequest> = match user.role.maintenance_party() {
        Some(Party::Student) => maintenance_requests::table
            .filter(maintenance_requests::student_id.eq(user.id))
            .order_by(maintenance_requests::created_at.desc())
            .load(&mut conn)?,
        Some(Party::Landlord) => maintenance_requests::table
            .filter(maintenance_requests::landlord_id.eq(user.id))
            .order_by(maintenance_requests::created_at.desc())
            .load(&mut conn)?,
        None => Vec::new(),
    };

    Ok(Json(rows.into_iter().map(MaintenanceResponse::from_row).collect()))
}

#[derive(Deserialize)]
struct UpdateStatusRequest {
    status: Option<String>,
}

async fn update_status(
    State(state): State<AppState>,
    LandlordUser(landlord): LandlordUser,
    Path(raw_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = req
        .status
        .as_deref()
        .and_then(MaintenanceStatus::parse)
        .ok_or_else(|| ApiError::Validation("Invalid status provided.".to_string()))?;
    let denied = || ApiError::Forbidden("Permission denied.".to_string());
    let request_id: i32 = raw_id.parse().map_err(|_| denied())?;

    let mut conn = db::connect(&state.config.database_url)?;

    // Unconditional overwrite by design: no Open -> InProgress -> Resolved
    // ordering is enforced and Resolved is not terminal.
    let updated = diesel::update(
        maintenance_requests::table.filter(
            maintenance_requests::id
                .eq(request_id)
                .and(maintenance_requests::landlord_id.eq(landlord.id)),
        ),
    )
    .set(maintenance_requests::status.eq(status.as_str()))
    .execute(&mut conn)?;
    if updated == 0 {
        return Err(denied());
    }

    Ok(Json(json!({ "message": "Status updated." })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/maintenance-requests",
            get(list_requests).post(create_request),
        )
        .route("/maintenance-requests/:id", put(update_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_uses_wire_field_names() {
        let row = MaintenanceRequest {
            id: 3,
            listing_id: 8,
            student_id: 1,
            landlord_id: 2,
            issue_description: "Broken geyser".to_string(),
            status: "Open".to_string(),
            created_at: NaiveDateTime::default(),
        };
        let json = serde_json::to_value(MaintenanceResponse::from_row(row)).unwrap();
        assert_eq!(json["id"], "3");
        assert_eq!(json["listingId"], "8");
        assert_eq!(json["issue"], "Broken geyser");
        assert!(json.as_object().unwrap().contains_key("createdAt"));
        // Internal party ids never leave the server on this surface.
        assert!(json.get("studentId").is_none());
        assert!(json.get("landlordId").is_none());
    }
}
