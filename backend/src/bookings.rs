use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDateTime;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{AuthUser, LandlordUser, StudentUser};
use crate::db;
use crate::error::{is_unique_violation, ApiError};
use crate::models::{Booking, BookingStatus, NewBooking, Party};
use crate::schema::{bookings, listings, users};
use crate::AppState;

/// Not-found, not-owner and already-decided are reported identically so a
/// landlord cannot probe for other landlords' booking ids.
fn not_actionable() -> ApiError {
    ApiError::NotFound("Booking not found or no longer actionable.".to_string())
}

async fn create_booking(
    State(state): State<AppState>,
    StudentUser(student): StudentUser,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let listing_id: i32 = raw_id
        .parse()
        .map_err(|_| ApiError::NotFound("Listing not found.".to_string()))?;
    let mut conn = db::connect(&state.config.database_url)?;

    let listing: Option<(i32, bool)> = listings::table
        .find(listing_id)
        .select((listings::landlord_id, listings::is_active))
        .first(&mut conn)
        .optional()?;
    let Some((landlord_id, is_active)) = listing else {
        return Err(ApiError::NotFound("Listing not found.".to_string()));
    };
    if !is_active {
        return Err(ApiError::Validation(
            "This listing is no longer available.".to_string(),
        ));
    }

    // The partial unique index on live bookings turns a duplicate request
    // into a constraint violation, even against a concurrent insert.
    let booking: Booking = diesel::insert_into(bookings::table)
        .values(&NewBooking {
            listing_id,
            student_id: student.id,
            landlord_id,
            status: BookingStatus::Pending.as_str().to_string(),
        })
        .get_result(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict(
                    "You have already sent a booking request for this listing.".to_string(),
                )
            } else {
                ApiError::from(e)
            }
        })?;

    log::info!(
        "Student {} requested listing {} (booking {})",
        student.id,
        listing_id,
        booking.id
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": booking.id.to_string(), "message": "Booking request sent." })),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub listing_id: String,
    pub listing_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_email: Option<String>,
}

async fn list_bookings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let mut conn = db::connect(&state.config.database_url)?;

    let responses = match user.role.booking_party() {
        Some(Party::Student) => {
            let rows: Vec<(i32, String, NaiveDateTime, i32, String)> = bookings::table
                .inner_join(listings::table)
                .filter(bookings::student_id.eq(user.id))
                .order_by(bookings::created_at.desc())
                .select((
                    bookings::id,
                    bookings::status,
                    bookings::created_at,
                    listings::id,
                    listings::title,
                ))
                .load(&mut conn)?;
            rows.into_iter()
                .map(|(id, status, created_at, listing_id, listing_title)| BookingResponse {
                    id: id.to_string(),
                    status,
                    created_at,
                    listing_id: listing_id.to_string(),
                    listing_title,
                    student_email: None,
                })
                .collect()
        }
        Some(Party::Landlord) => {
            let rows: Vec<(i32, String, NaiveDateTime, i32, String, String)> = bookings::table
                .inner_join(listings::table)
                .inner_join(users::table.on(users::id.eq(bookings::student_id)))
                .filter(bookings::landlord_id.eq(user.id))
                .order_by(bookings::created_at.desc())
                .select((
                    bookings::id,
                    bookings::status,
                    bookings::created_at,
                    listings::id,
                    listings::title,
                    users::email,
                ))
                .load(&mut conn)?;
            rows.into_iter()
                .map(
                    |(id, status, created_at, listing_id, listing_title, student_email)| {
                        BookingResponse {
                            id: id.to_string(),
                            status,
                            created_at,
                            listing_id: listing_id.to_string(),
                            listing_title,
                            student_email: Some(student_email),
                        }
                    },
                )
                .collect()
        }
        None => Vec::new(),
    };

    Ok(Json(responses))
}

#[derive(Deserialize)]
struct DecideBookingRequest {
    status: Option<String>,
}

/// A landlord may move a pending booking to `confirmed` or `declined`;
/// `pending` is not a decision.
fn parse_decision(raw: Option<&str>) -> Result<BookingStatus, ApiError> {
    raw.and_then(BookingStatus::parse)
        .filter(|status| *status != BookingStatus::Pending)
        .ok_or_else(|| ApiError::Validation("Invalid status provided.".to_string()))
}

async fn decide_booking(
    State(state): State<AppState>,
    LandlordUser(landlord): LandlordUser,
    Path(raw_id): Path<String>,
    Json(req): Json<DecideBookingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let decision = parse_decision(req.status.as_deref())?;
    let booking_id: i32 = raw_id.parse().map_err(|_| not_actionable())?;
    let mut conn = db::connect(&state.config.database_url)?;
    let now = Utc::now().naive_utc();

    conn.transaction::<_, ApiError, _>(|conn| {
        let listing_id: Option<i32> = bookings::table
            .filter(
                bookings::id
                    .eq(booking_id)
                    .and(bookings::landlord_id.eq(landlord.id))
                    .and(bookings::status.eq(BookingStatus::Pending.as_str())),
            )
            .select(bookings::listing_id)
            .first(conn)
            .optional()?;
        let Some(listing_id) = listing_id else {
            return Err(not_actionable());
        };

        if decision == BookingStatus::Confirmed {
            // Lock the listing row so two decisions on different bookings of
            // the same listing serialize; the loser re-checks below and finds
            // its booking no longer pending.
            let _locked: i32 = listings::table
                .find(listing_id)
                .select(listings::id)
                .for_update()
                .first(conn)?;
        }

        // The pending guard in the update predicate is what makes a raced
        // decision affect zero rows instead of double-deciding.
        let updated = diesel::update(
            bookings::table.filter(
                bookings::id
                    .eq(booking_id)
                    .and(bookings::landlord_id.eq(landlord.id))
                    .and(bookings::status.eq(BookingStatus::Pending.as_str())),
            ),
        )
        .set((
            bookings::status.eq(decision.as_str()),
            bookings::updated_at.eq(now),
        ))
        .execute(conn)?;
        if updated == 0 {
            return Err(not_actionable());
        }

        if decision == BookingStatus::Confirmed {
            // Winner takes the listing off the market and declines every
            // competing pending request, all inside this transaction.
            diesel::update(listings::table.find(listing_id))
                .set(listings::is_active.eq(false))
                .execute(conn)?;
            diesel::update(
                bookings::table.filter(
                    bookings::listing_id
                        .eq(listing_id)
                        .and(bookings::status.eq(BookingStatus::Pending.as_str())),
                ),
            )
            .set((
                bookings::status.eq(BookingStatus::Declined.as_str()),
                bookings::updated_at.eq(now),
            ))
            .execute(conn)?;
        }

        Ok(())
    })?;

    log::info!(
        "Landlord {} set booking {} to {}",
        landlord.id,
        booking_id,
        decision.as_str()
    );
    Ok(Json(json!({
        "message": format!("Booking has been {}.", decision.as_str())
    })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/listings/:id/book", post(create_booking))
        .route("/bookings", get(list_bookings))
        .route("/bookings/:id/status", put(decide_booking))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_accepts_only_terminal_states() {
        assert_eq!(parse_decision(Some("confirmed")).unwrap(), BookingStatus::Confirmed);
        assert_eq!(parse_decision(Some("declined")).unwrap(), BookingStatus::Declined);
        assert!(parse_decision(Some("pending")).is_err());
        assert!(parse_decision(Some("accepted")).is_err());
        assert!(parse_decision(None).is_err());
    }

    #[test]
    fn student_rows_omit_the_student_email_field() {
        let row = BookingResponse {
            id: "1".to_string(),
            status: "pending".to_string(),
            created_at: NaiveDateTime::default(),
            listing_id: "4".to_string(),
            listing_title: "Room".to_string(),
            student_email: None,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("studentEmail").is_none());
        assert_eq!(json["listingId"], "4");
    }

    #[test]
    fn landlord_rows_carry_the_student_email() {
        let row = BookingResponse {
            id: "1".to_string(),
            status: "confirmed".to_string(),
            created_at: NaiveDateTime::default(),
            listing_id: "4".to_string(),
            listing_title: "Room".to_string(),
            student_email: Some("s@campus.ac.za".to_string()),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["studentEmail"], "s@campus.ac.za");
    }
}
