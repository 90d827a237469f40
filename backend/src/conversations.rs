use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Nullable, Text, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::AuthUser;
use crate::db;
use crate::error::ApiError;
use crate::models::{Conversation, Message, NewConversation, NewMessage};
use crate::schema::{conversations, messages};
use crate::AppState;

/// A conversation's participant set is unordered. Rows store it normalized
/// as (low, high) so a single unique index covers both argument orders.
pub fn normalize_pair(a: i32, b: i32) -> (i32, i32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn is_participant(pair: (i32, i32), user_id: i32) -> bool {
    pair.0 == user_id || pair.1 == user_id
}

/// Authorizes the requester against the conversation's participant pair.
/// Absent and foreign conversations are both 403: no existence leak.
fn require_participant(
    conn: &mut PgConnection,
    conversation_id: i32,
    user_id: i32,
) -> Result<(), ApiError> {
    let conversation: Option<Conversation> = conversations::table
        .find(conversation_id)
        .first(conn)
        .optional()?;
    match conversation {
        Some(c) if is_participant((c.participant_low, c.participant_high), user_id) => Ok(()),
        _ => Err(ApiError::Forbidden("Access denied.".to_string())),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartConversationRequest {
    recipient_id: Option<String>,
    listing_id: Option<String>,
}

async fn start_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<StartConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let recipient_raw = req
        .recipient_id
        .ok_or_else(|| ApiError::Validation("Recipient ID is required.".to_string()))?;
    let recipient_id: i32 = recipient_raw
        .parse()
        .map_err(|_| ApiError::NotFound("Recipient not found.".to_string()))?;
    if recipient_id == user.id {
        return Err(ApiError::Validation(
            "Cannot start a conversation with yourself.".to_string(),
        ));
    }
    let listing_id: Option<i32> = match req.listing_id {
        Some(raw) => Some(
            raw.parse()
                .map_err(|_| ApiError::NotFound("Listing not found.".to_string()))?,
        ),
        None => None,
    };

    let (low, high) = normalize_pair(user.id, recipient_id);
    let mut conn = db::connect(&state.config.database_url)?;

    let (conversation_id, created) = conn.transaction::<(i32, bool), ApiError, _>(|conn| {
        // Null-aware match: a conversation with no listing only matches a
        // request with no listing.
        let pair_filter = || {
            conversations::participant_low
                .eq(low)
                .and(conversations::participant_high.eq(high))
                .and(conversations::listing_id.is_not_distinct_from(listing_id))
        };

        let existing: Option<i32> = conversations::table
            .filter(pair_filter())
            .select(conversations::id)
            .first(conn)
            .optional()?;
        if let Some(id) = existing {
            return Ok((id, false));
        }

        // A concurrent caller may create the row between the select above
        // and this insert. The unique index over (pair, listing) resolves
        // that race; the re-select returns the winner's row either way.
        let inserted = diesel::insert_into(conversations::table)
            .values(&NewConversation {
                listing_id,
                participant_low: low,
                participant_high: high,
            })
            .on_conflict_do_nothing()
            .execute(conn)?;

        let id: i32 = conversations::table
            .filter(pair_filter())
            .select(conversations::id)
            .first(conn)?;
        Ok((id, inserted == 1))
    })?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(json!({ "id": conversation_id.to_string() }))))
}

// Inbox projection: the other participant plus the newest message, computed
// live by aggregation (no denormalized last-message column to drift).
// Conversations without messages sort last, newest-created first.
// Timestamp ties within a conversation break toward the highest message id.
const INBOX_QUERY: &str = "\
SELECT c.id, c.listing_id, l.title AS listing_title, \
       ou.id AS participant_id, ou.email AS participant_email, \
       ou.profile_image_url AS participant_image_url, \
       lm.content AS last_message, lm.created_at AS last_message_at \
FROM conversations c \
JOIN users ou \
  ON ou.id = CASE WHEN c.participant_low = $1 THEN c.participant_high ELSE c.participant_low END \
LEFT JOIN listings l ON l.id = c.listing_id \
LEFT JOIN ( \
    SELECT DISTINCT ON (conversation_id) conversation_id, content, created_at \
    FROM messages \
    ORDER BY conversation_id, created_at DESC, id DESC \
) lm ON lm.conversation_id = c.id \
WHERE c.participant_low = $1 OR c.participant_high = $1 \
ORDER BY lm.created_at DESC NULLS LAST, c.created_at DESC";

#[derive(Debug, QueryableByName)]
struct InboxRow {
    #[diesel(sql_type = Integer)]
    id: i32,
    #[diesel(sql_type = Nullable<Integer>)]
    listing_id: Option<i32>,
    #[diesel(sql_type = Nullable<Text>)]
    listing_title: Option<String>,
    #[diesel(sql_type = Integer)]
    participant_id: i32,
    #[diesel(sql_type = Text)]
    participant_email: String,
    #[diesel(sql_type = Nullable<Text>)]
    participant_image_url: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    last_message: Option<String>,
    #[diesel(sql_type = Nullable<Timestamp>)]
    last_message_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: String,
    pub listing_id: Option<String>,
    pub listing_title: Option<String>,
    pub participant_id: String,
    pub participant_email: String,
    pub participant_image_url: Option<String>,
    pub last_message: Option<String>,
    pub last_message_timestamp: Option<NaiveDateTime>,
}

async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ConversationResponse>>, ApiError> {
    let mut conn = db::connect(&state.config.database_url)?;

    let rows: Vec<InboxRow> = diesel::sql_query(INBOX_QUERY)
        .bind::<Integer, _>(user.id)
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|row| ConversationResponse {
                id: row.id.to_string(),
                listing_id: row.listing_id.map(|id| id.to_string()),
                listing_title: row.listing_title,
                participant_id: row.participant_id.to_string(),
                participant_email: row.participant_email,
                participant_image_url: row.participant_image_url,
                last_message: row.last_message,
                last_message_timestamp: row.last_message_at,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub sender_id: String,
    pub content: String,
    pub timestamp: NaiveDateTime,
}

impl MessageResponse {
    fn from_row(message: Message) -> MessageResponse {
        MessageResponse {
            id: message.id.to_string(),
            sender_id: message.sender_id.to_string(),
            content: message.content,
            timestamp: message.created_at,
        }
    }
}

async fn get_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let conversation_id: i32 = raw_id
        .parse()
        .map_err(|_| ApiError::Forbidden("Access denied.".to_string()))?;
    let mut conn = db::connect(&state.config.database_url)?;
    require_participant(&mut conn, conversation_id, user.id)?;

    let rows: Vec<Message> = messages::table
        .filter(messages::conversation_id.eq(conversation_id))
        .order_by(messages::created_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(MessageResponse::from_row).collect()))
}

#[derive(Deserialize)]
struct SendMessageRequest {
    content: Option<String>,
}

async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(raw_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation_id: i32 = raw_id
        .parse()
        .map_err(|_| ApiError::Forbidden("Access denied.".to_string()))?;
    let content = req
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("Message content is required.".to_string()))?;

    let mut conn = db::connect(&state.config.database_url)?;
    require_participant(&mut conn, conversation_id, user.id)?;

    // Append-only: messages are never edited or deleted.
    let message: Message = diesel::insert_into(messages::table)
        .values(&NewMessage {
            conversation_id,
            sender_id: user.id,
            content,
        })
        .get_result(&mut conn)?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from_row(message))))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", post(start_conversation).get(list_conversations))
        .route("/conversations/:id/messages", get(get_messages).post(send_message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_normalization_is_order_insensitive() {
        assert_eq!(normalize_pair(3, 9), (3, 9));
        assert_eq!(normalize_pair(9, 3), (3, 9));
        assert_eq!(normalize_pair(9, 3), normalize_pair(3, 9));
    }

    #[test]
    fn participant_check_covers_both_slots() {
        assert!(is_participant((3, 9), 3));
        assert!(is_participant((3, 9), 9));
        assert!(!is_participant((3, 9), 4));
    }

    #[test]
    fn inbox_sorts_empty_conversations_last() {
        // The policy lives in the query: newest activity first, message-less
        // conversations after every active one.
        assert!(INBOX_QUERY.contains("ORDER BY lm.created_at DESC NULLS LAST"));
    }

    #[test]
    fn conversation_response_uses_wire_field_names() {
        let response = ConversationResponse {
            id: "4".to_string(),
            listing_id: Some("7".to_string()),
            listing_title: Some("Room".to_string()),
            participant_id: "2".to_string(),
            participant_email: "l@b.c".to_string(),
            participant_image_url: None,
            last_message: Some("hi".to_string()),
            last_message_timestamp: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["listingId"], "7");
        assert_eq!(json["participantEmail"], "l@b.c");
        assert_eq!(json["lastMessage"], "hi");
        assert!(json.as_object().unwrap().contains_key("lastMessageTimestamp"));
    }

    #[test]
    fn message_response_uses_wire_field_names() {
        let message = Message {
            id: 11,
            conversation_id: 4,
            sender_id: 2,
            content: "hello".to_string(),
            created_at: NaiveDateTime::default(),
        };
        let json = serde_json::to_value(MessageResponse::from_row(message)).unwrap();
        assert_eq!(json["id"], "11");
        assert_eq!(json["senderId"], "2");
        assert!(json.as_object().unwrap().contains_key("timestamp"));
    }
}
