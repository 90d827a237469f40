use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::auth::LandlordUser;
use crate::db;
use crate::error::ApiError;
use crate::models::{Listing, NewListing};
use crate::schema::{listings, users};
use crate::AppState;

/// Fallback photo for listings created without one.
const DEFAULT_IMAGE_URL: &str = "https://picsum.photos/400/300";

const RECENT_LIMIT: i64 = 8;

#[derive(Debug, Serialize)]
pub struct GpsCoordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    pub id: String,
    pub landlord_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: String,
    pub location: String,
    /// The owning landlord's verification flag, joined at read time. Never
    /// stored on the listing row.
    pub is_verified: bool,
    pub is_active: bool,
    pub gps_coordinates: GpsCoordinates,
}

impl ListingResponse {
    pub fn from_row((listing, landlord_verified): (Listing, bool)) -> ListingResponse {
        ListingResponse {
            id: listing.id.to_string(),
            landlord_id: listing.landlord_id.to_string(),
            title: listing.title,
            description: listing.description,
            price: listing.price_per_month,
            image_url: listing.image_url,
            location: listing.location_address,
            is_verified: landlord_verified,
            is_active: listing.is_active,
            gps_coordinates: GpsCoordinates {
                lat: listing.gps_lat,
                lng: listing.gps_lng,
            },
        }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Turns a raw search term into a LIKE pattern, or `None` when there is
/// nothing to filter on. LIKE metacharacters in user input are escaped so the
/// term always means a literal substring.
pub fn search_pattern(q: Option<&str>) -> Option<String> {
    let term = q?.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{}%", escaped))
}

async fn list_listings(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let mut conn = db::connect(&state.config.database_url)?;

    let mut query = listings::table
        .inner_join(users::table)
        .filter(listings::is_active.eq(true))
        .select((listings::all_columns, users::is_verified))
        .into_boxed();
    if let Some(pattern) = search_pattern(params.q.as_deref()) {
        query = query.filter(
            listings::title
                .ilike(pattern.clone())
                .or(listings::location_address.ilike(pattern)),
        );
    }

    let rows: Vec<(Listing, bool)> = query.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(ListingResponse::from_row).collect()))
}

async fn recent_listings(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let mut conn = db::connect(&state.config.database_url)?;

    let rows: Vec<(Listing, bool)> = listings::table
        .inner_join(users::table)
        .filter(listings::is_active.eq(true))
        .order_by(listings::created_at.desc())
        .limit(RECENT_LIMIT)
        .select((listings::all_columns, users::is_verified))
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(ListingResponse::from_row).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub title: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub location: Option<String>,
    pub gps_lat: Option<f64>,
    pub gps_lng: Option<f64>,
    pub description: Option<String>,
}

struct ValidatedListing {
    title: String,
    description: Option<String>,
    price: f64,
    image_url: String,
    location: String,
    gps_lat: f64,
    gps_lng: f64,
}

fn validate_new_listing(req: CreateListingRequest) -> Result<ValidatedListing, ApiError> {
    let title = req
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let location = req
        .location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    let (Some(title), Some(location), Some(price), Some(gps_lat), Some(gps_lng)) =
        (title, location, req.price, req.gps_lat, req.gps_lng)
    else {
        return Err(ApiError::Validation("Missing required fields.".to_string()));
    };
    if !price.is_finite() || price <= 0.0 {
        return Err(ApiError::Validation(
            "Price must be a positive number.".to_string(),
        ));
    }
    if !gps_lat.is_finite() || !gps_lng.is_finite() || gps_lat.abs() > 90.0 || gps_lng.abs() > 180.0
    {
        return Err(ApiError::Validation("Invalid GPS coordinates.".to_string()));
    }
    let image_url = req
        .image_url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string());
    Ok(ValidatedListing {
        title,
        description: req.description.filter(|d| !d.trim().is_empty()),
        price,
        image_url,
        location,
        gps_lat,
        gps_lng,
    })
}

async fn create_listing(
    State(state): State<AppState>,
    LandlordUser(landlord): LandlordUser,
    Json(req): Json<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = validate_new_listing(req)?;
    let mut conn = db::connect(&state.config.database_url)?;

    let listing: Listing = diesel::insert_into(listings::table)
        .values(&NewListing {
            landlord_id: landlord.id,
            title: fields.title,
            description: fields.description,
            price_per_month: fields.price,
            image_url: fields.image_url,
            location_address: fields.location,
            gps_lat: fields.gps_lat,
            gps_lng: fields.gps_lng,
        })
        .get_result(&mut conn)?;

    log::info!("Landlord {} created listing {}", landlord.id, listing.id);
    Ok((
        StatusCode::CREATED,
        Json(ListingResponse::from_row((listing, landlord.verified))),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/listings", get(list_listings).post(create_listing))
        .route("/listings/recent", get(recent_listings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> CreateListingRequest {
        CreateListingRequest {
            title: Some("Sunny room near campus".to_string()),
            price: Some(3200.0),
            image_url: None,
            location: Some("12 Main Rd, Observatory".to_string()),
            gps_lat: Some(-33.94),
            gps_lng: Some(18.47),
            description: None,
        }
    }

    #[test]
    fn search_pattern_wraps_and_trims() {
        assert_eq!(search_pattern(Some("  obs ")), Some("%obs%".to_string()));
        assert_eq!(search_pattern(Some("")), None);
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(None), None);
    }

    #[test]
    fn search_pattern_escapes_like_metacharacters() {
        assert_eq!(search_pattern(Some("100%")), Some("%100\\%%".to_string()));
        assert_eq!(search_pattern(Some("a_b")), Some("%a\\_b%".to_string()));
        assert_eq!(search_pattern(Some("a\\b")), Some("%a\\\\b%".to_string()));
    }

    #[test]
    fn valid_request_passes_and_defaults_image() {
        let fields = validate_new_listing(base_request()).unwrap();
        assert_eq!(fields.image_url, DEFAULT_IMAGE_URL);
        assert_eq!(fields.title, "Sunny room near campus");
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut req = base_request();
        req.title = None;
        assert!(matches!(
            validate_new_listing(req),
            Err(ApiError::Validation(_))
        ));

        let mut req = base_request();
        req.location = Some("   ".to_string());
        assert!(matches!(
            validate_new_listing(req),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn non_positive_or_non_finite_price_is_rejected() {
        for bad in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let mut req = base_request();
            req.price = Some(bad);
            assert!(validate_new_listing(req).is_err());
        }
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let mut req = base_request();
        req.gps_lat = Some(91.0);
        assert!(validate_new_listing(req).is_err());

        let mut req = base_request();
        req.gps_lng = Some(-181.0);
        assert!(validate_new_listing(req).is_err());
    }

    #[test]
    fn response_uses_wire_field_names() {
        let listing = Listing {
            id: 5,
            landlord_id: 2,
            title: "Room".to_string(),
            description: None,
            price_per_month: 2500.0,
            image_url: "http://img".to_string(),
            location_address: "Cape Town".to_string(),
            gps_lat: -33.9,
            gps_lng: 18.4,
            is_active: true,
            created_at: chrono::NaiveDateTime::default(),
        };
        let json = serde_json::to_value(ListingResponse::from_row((listing, true))).unwrap();
        assert_eq!(json["id"], "5");
        assert_eq!(json["landlordId"], "2");
        assert_eq!(json["price"], 2500.0);
        assert_eq!(json["isVerified"], true);
        assert_eq!(json["gpsCoordinates"]["lat"], -33.9);
        assert_eq!(json["location"], "Cape Town");
    }
}
