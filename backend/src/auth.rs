use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db;
use crate::error::{is_unique_violation, ApiError};
use crate::models::{NewLandlordProfile, NewUser, Role, User};
use crate::schema::{landlord_profiles, users};
use crate::AppState;

pub const AUTH_COOKIE: &str = "kasistays_jwt";
const TOKEN_HOURS: i64 = 24;

/// Identity claims carried by the session cookie. The server holds no
/// session state; each request re-validates this token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub role: String,
    pub verified: bool,
    pub exp: usize,
}

pub fn create_token(
    user_id: i32,
    email: &str,
    role: &str,
    verified: bool,
    jwt_secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (Utc::now() + Duration::hours(TOKEN_HOURS)).timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        verified,
        exp: expiration,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// The authenticated caller, decoded from the session cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub verified: bool,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Option<AuthUser> {
        Some(AuthUser {
            id: claims.sub.parse().ok()?,
            email: claims.email,
            role: Role::parse(&claims.role)?,
            verified: claims.verified,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(AUTH_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| ApiError::Unauthorized("Authentication required.".to_string()))?;
        let claims = validate_token(&token, &state.config.jwt_secret)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired session.".to_string()))?;
        AuthUser::from_claims(claims)
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session.".to_string()))
    }
}

pub struct StudentUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for StudentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Student {
            return Err(ApiError::Forbidden(
                "Access denied. Student role required.".to_string(),
            ));
        }
        Ok(StudentUser(user))
    }
}

pub struct LandlordUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for LandlordUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Landlord {
            return Err(ApiError::Forbidden(
                "Access denied. Landlord role required.".to_string(),
            ));
        }
        Ok(LandlordUser(user))
    }
}

pub struct AdminUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden(
                "Access denied. Admin role required.".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: String,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
}

impl Profile {
    fn from_user(user: &User, role: Role) -> Profile {
        Profile {
            uid: user.id.to_string(),
            email: user.email.clone(),
            role,
            is_verified: user.is_verified,
        }
    }
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

#[derive(Deserialize)]
struct SignUpRequest {
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password, role_raw) = match (req.email, req.password, req.role) {
        (Some(e), Some(p), Some(r)) if !e.trim().is_empty() && !p.is_empty() => {
            (e.trim().to_string(), p, r)
        }
        _ => {
            return Err(ApiError::Validation(
                "Email, password, and role are required.".to_string(),
            ))
        }
    };
    let role = Role::parse(&role_raw)
        .ok_or_else(|| ApiError::Validation("Invalid role.".to_string()))?;

    let password_hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)?;
    let mut conn = db::connect(&state.config.database_url)?;

    let user: User = diesel::insert_into(users::table)
        .values(&NewUser {
            email,
            password_hash,
            role: role.as_str().to_string(),
        })
        .get_result(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("Email already in use.".to_string())
            } else {
                ApiError::from(e)
            }
        })?;

    log::info!("New {} account: {}", role.as_str(), user.email);
    let token = create_token(user.id, &user.email, &user.role, user.is_verified, &state.config.jwt_secret)?;
    let profile = Profile::from_user(&user, role);
    Ok((StatusCode::CREATED, jar.add(session_cookie(token)), Json(profile)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LandlordSignUpRequest {
    email: Option<String>,
    password: Option<String>,
    full_name: Option<String>,
    phone: Option<String>,
    id_number: Option<String>,
}

/// Registers a landlord account together with its contact profile; the two
/// inserts commit together or not at all.
async fn landlord_sign_up(
    State(state): State<AppState>,
    Json(req): Json<LandlordSignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password, full_name, phone, id_number) =
        match (req.email, req.password, req.full_name, req.phone, req.id_number) {
            (Some(e), Some(p), Some(n), Some(ph), Some(id))
                if !e.trim().is_empty() && !p.is_empty() && !n.trim().is_empty() =>
            {
                (e.trim().to_string(), p, n, ph, id)
            }
            _ => return Err(ApiError::Validation("All fields are required.".to_string())),
        };

    let password_hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)?;
    let mut conn = db::connect(&state.config.database_url)?;

    conn.transaction::<_, ApiError, _>(|conn| {
        let user: User = diesel::insert_into(users::table)
            .values(&NewUser {
                email,
                password_hash,
                role: Role::Landlord.as_str().to_string(),
            })
            .get_result(conn)
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ApiError::Conflict("A user with this email already exists.".to_string())
                } else {
                    ApiError::from(e)
                }
            })?;
        diesel::insert_into(landlord_profiles::table)
            .values(&NewLandlordProfile {
                user_id: user.id,
                full_name,
                phone,
                id_number,
            })
            .execute(conn)?;
        Ok(())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Landlord registered successfully!" })),
    ))
}

#[derive(Deserialize)]
struct SignInRequest {
    email: Option<String>,
    password: Option<String>,
}

async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password) = match (req.email, req.password) {
        (Some(e), Some(p)) if !e.trim().is_empty() && !p.is_empty() => (e.trim().to_string(), p),
        _ => {
            return Err(ApiError::Validation(
                "Email and password are required.".to_string(),
            ))
        }
    };

    let mut conn = db::connect(&state.config.database_url)?;
    let user: Option<User> = users::table
        .filter(users::email.eq(&email))
        .first(&mut conn)
        .optional()?;

    // Unknown email and wrong password are reported identically.
    let user = user.ok_or_else(|| ApiError::Unauthorized("Invalid credentials.".to_string()))?;
    if !bcrypt::verify(&password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials.".to_string()));
    }

    let role = Role::parse(&user.role)
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials.".to_string()))?;
    let token = create_token(user.id, &user.email, &user.role, user.is_verified, &state.config.jwt_secret)?;
    let profile = Profile::from_user(&user, role);
    Ok((jar.add(session_cookie(token)), Json(profile)))
}

async fn sign_out(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(AUTH_COOKIE).path("/"));
    (jar, Json(json!({ "message": "Signed out successfully." })))
}

async fn me(user: Option<AuthUser>) -> Response {
    match user {
        Some(user) => Json(Profile {
            uid: user.id.to_string(),
            email: user.email,
            role: user.role,
            is_verified: user.verified,
        })
        .into_response(),
        None => (StatusCode::UNAUTHORIZED, Json(serde_json::Value::Null)).into_response(),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/landlord-signup", post(landlord_sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
        .route("/auth/me", get(me))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trip_preserves_claims() {
        let token = create_token(42, "s@campus.ac.za", "student", false, SECRET).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "s@campus.ac.za");
        assert_eq!(claims.role, "student");
        assert!(!claims.verified);
    }

    #[test]
    fn tampered_secret_is_rejected() {
        let token = create_token(1, "a@b.c", "landlord", true, SECRET).unwrap();
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            sub: "1".to_string(),
            email: "a@b.c".to_string(),
            role: "student".to_string(),
            verified: false,
            exp: (Utc::now() - Duration::hours(2)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(validate_token(&token, SECRET).is_err());
    }

    #[test]
    fn claims_decode_to_auth_user() {
        let claims = Claims {
            sub: "9".to_string(),
            email: "l@b.c".to_string(),
            role: "landlord".to_string(),
            verified: true,
            exp: 0,
        };
        let user = AuthUser::from_claims(claims).unwrap();
        assert_eq!(user.id, 9);
        assert_eq!(user.role, Role::Landlord);
        assert!(user.verified);
    }

    #[test]
    fn malformed_claims_are_refused() {
        let bad_id = Claims {
            sub: "not-a-number".to_string(),
            email: "a@b.c".to_string(),
            role: "student".to_string(),
            verified: false,
            exp: 0,
        };
        assert!(AuthUser::from_claims(bad_id).is_none());

        let bad_role = Claims {
            sub: "1".to_string(),
            email: "a@b.c".to_string(),
            role: "superuser".to_string(),
            verified: false,
            exp: 0,
        };
        assert!(AuthUser::from_claims(bad_role).is_none());
    }

    #[test]
    fn profile_uses_wire_field_names() {
        let profile = Profile {
            uid: "3".to_string(),
            email: "a@b.c".to_string(),
            role: Role::Landlord,
            is_verified: true,
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["uid"], "3");
        assert_eq!(json["role"], "landlord");
        assert_eq!(json["isVerified"], true);
    }
}
