use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Closed set of account roles. Stored as lowercase text; immutable after
/// sign-up (no role-change operation exists).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Landlord,
    Provider,
    Admin,
}

/// Which side of the student/landlord exchange a role participates in.
/// Bookings and maintenance requests are both scoped this way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Student,
    Landlord,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Landlord => "landlord",
            Role::Provider => "provider",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "student" => Some(Role::Student),
            "landlord" => Some(Role::Landlord),
            "provider" => Some(Role::Provider),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Bookings a role may see: students their own requests, landlords the
    /// requests they received. Everyone else sees an empty list.
    pub fn booking_party(&self) -> Option<Party> {
        match self {
            Role::Student => Some(Party::Student),
            Role::Landlord => Some(Party::Landlord),
            _ => None,
        }
    }

    /// Maintenance requests follow the same visibility split as bookings.
    pub fn maintenance_party(&self) -> Option<Party> {
        match self {
            Role::Student => Some(Party::Student),
            Role::Landlord => Some(Party::Landlord),
            _ => None,
        }
    }
}

/// Booking lifecycle. `Confirmed` and `Declined` are terminal; the only
/// writer predicate in the system updates rows still `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Declined,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<BookingStatus> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "declined" => Some(BookingStatus::Declined),
            _ => None,
        }
    }
}

/// Maintenance status values. Deliberately no ordering guard: a landlord may
/// set any status at any time, matching the tracker's unrestricted lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceStatus {
    Open,
    InProgress,
    Resolved,
}

impl MaintenanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::Open => "Open",
            MaintenanceStatus::InProgress => "InProgress",
            MaintenanceStatus::Resolved => "Resolved",
        }
    }

    pub fn parse(s: &str) -> Option<MaintenanceStatus> {
        match s {
            "Open" => Some(MaintenanceStatus::Open),
            "InProgress" => Some(MaintenanceStatus::InProgress),
            "Resolved" => Some(MaintenanceStatus::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Queryable)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip)] // never serialize the credential hash
    pub password_hash: String,
    pub role: String,
    pub is_verified: bool,
    pub profile_image_url: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::landlord_profiles)]
pub struct NewLandlordProfile {
    pub user_id: i32,
    pub full_name: String,
    pub phone: String,
    pub id_number: String,
}

#[derive(Debug, Serialize, Queryable)]
#[diesel(table_name = crate::schema::listings)]
pub struct Listing {
    pub id: i32,
    pub landlord_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub price_per_month: f64,
    pub image_url: String,
    pub location_address: String,
    pub gps_lat: f64,
    pub gps_lng: f64,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::listings)]
pub struct NewListing {
    pub landlord_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub price_per_month: f64,
    pub image_url: String,
    pub location_address: String,
    pub gps_lat: f64,
    pub gps_lng: f64,
}

#[derive(Debug, Serialize, Queryable)]
#[diesel(table_name = crate::schema::bookings)]
pub struct Booking {
    pub id: i32,
    pub listing_id: i32,
    pub student_id: i32,
    pub landlord_id: i32, // denormalized from the listing at creation time
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::bookings)]
pub struct NewBooking {
    pub listing_id: i32,
    pub student_id: i32,
    pub landlord_id: i32,
    pub status: String,
}

#[derive(Debug, Serialize, Queryable)]
#[diesel(table_name = crate::schema::maintenance_requests)]
pub struct MaintenanceRequest {
    pub id: i32,
    pub listing_id: i32,
    pub student_id: i32,
    pub landlord_id: i32,
    pub issue_description: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::maintenance_requests)]
pub struct NewMaintenanceRequest {
    pub listing_id: i32,
    pub student_id: i32,
    pub landlord_id: i32,
    pub issue_description: String,
    pub status: String,
}

#[derive(Debug, Serialize, Queryable)]
#[diesel(table_name = crate::schema::conversations)]
pub struct Conversation {
    pub id: i32,
    pub listing_id: Option<i32>,
    pub participant_low: i32,
    pub participant_high: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::conversations)]
pub struct NewConversation {
    pub listing_id: Option<i32>,
    pub participant_low: i32,
    pub participant_high: i32,
}

#[derive(Debug, Serialize, Queryable)]
#[diesel(table_name = crate::schema::messages)]
pub struct Message {
    pub id: i32,
    pub conversation_id: i32,
    pub sender_id: i32,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::messages)]
pub struct NewMessage {
    pub conversation_id: i32,
    pub sender_id: i32,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_text_round_trip() {
        for role in [Role::Student, Role::Landlord, Role::Provider, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("tenant"), None);
        assert_eq!(Role::parse("Landlord"), None); // stored lowercase only
    }

    #[test]
    fn role_serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Landlord).unwrap(), "\"landlord\"");
        let parsed: Role = serde_json::from_str("\"student\"").unwrap();
        assert_eq!(parsed, Role::Student);
    }

    #[test]
    fn booking_visibility_dispatch() {
        assert_eq!(Role::Student.booking_party(), Some(Party::Student));
        assert_eq!(Role::Landlord.booking_party(), Some(Party::Landlord));
        assert_eq!(Role::Provider.booking_party(), None);
        assert_eq!(Role::Admin.booking_party(), None);
    }

    #[test]
    fn maintenance_visibility_matches_booking_split() {
        for role in [Role::Student, Role::Landlord, Role::Provider, Role::Admin] {
            assert_eq!(role.booking_party(), role.maintenance_party());
        }
    }

    #[test]
    fn booking_status_round_trip() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Declined,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("accepted"), None);
    }

    #[test]
    fn maintenance_status_round_trip() {
        for status in [
            MaintenanceStatus::Open,
            MaintenanceStatus::InProgress,
            MaintenanceStatus::Resolved,
        ] {
            assert_eq!(MaintenanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MaintenanceStatus::parse("open"), None); // case-sensitive
    }

    #[test]
    fn user_serialization_hides_credential_hash() {
        let user = User {
            id: 7,
            email: "a@b.c".into(),
            password_hash: "$2b$12$secret".into(),
            role: "student".into(),
            is_verified: false,
            profile_image_url: None,
            created_at: NaiveDateTime::default(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("password_hash"));
    }
}
