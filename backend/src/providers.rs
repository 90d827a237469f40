use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use serde::Serialize;

use crate::db;
use crate::error::ApiError;
use crate::listings::{search_pattern, SearchParams};
use crate::models::Role;
use crate::schema::{provider_profiles, users};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResponse {
    pub id: String,
    pub name: String,
    pub service: String,
    pub contact: String,
    pub image_url: Option<String>,
}

/// Public directory of service providers, searchable by name or category.
async fn list_providers(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ProviderResponse>>, ApiError> {
    let mut conn = db::connect(&state.config.database_url)?;

    let mut query = provider_profiles::table
        .inner_join(users::table)
        .filter(users::role.eq(Role::Provider.as_str()))
        .select((
            users::id,
            provider_profiles::full_name,
            provider_profiles::service_category,
            provider_profiles::contact_phone,
            users::profile_image_url,
        ))
        .into_boxed();
    if let Some(pattern) = search_pattern(params.q.as_deref()) {
        query = query.filter(
            provider_profiles::full_name
                .ilike(pattern.clone())
                .or(provider_profiles::service_category.ilike(pattern)),
        );
    }

    let rows: Vec<(i32, String, String, String, Option<String>)> = query.load(&mut conn)?;
    Ok(Json(
        rows.into_iter()
            .map(|(id, name, service, contact, image_url)| ProviderResponse {
                id: id.to_string(),
                name,
                service,
                contact,
                image_url,
            })
            .collect(),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/providers", get(list_providers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_uses_wire_field_names() {
        let response = ProviderResponse {
            id: "12".to_string(),
            name: "Thabo M".to_string(),
            service: "Plumbing".to_string(),
            contact: "021 555 0199".to_string(),
            image_url: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["id"], "12");
        assert_eq!(json["service"], "Plumbing");
        assert!(json.as_object().unwrap().contains_key("imageUrl"));
    }
}
