//! Vote poll endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use serde::Deserialize;
use toggo_common::{AppResult, Page, parse_uuid};
use toggo_core::{
    CastVoteInput, CreateOptionInput, CreatePollInput, OptionResponse, PollResponse,
    UpdatePollInput,
};

use crate::{
    extractors::{AuthUser, JsonBody, QueryParams},
    middleware::AppState,
    response::Created,
};

/// Listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ListPollsQuery {
    pub limit: Option<u64>,
    pub cursor: Option<String>,
}

async fn create_poll(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    JsonBody(input): JsonBody<CreatePollInput>,
) -> AppResult<Created<PollResponse>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll = state
        .vote_poll_service
        .create_poll(trip_id, user_id, input)
        .await?;
    Ok(Created(poll))
}

async fn list_polls(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    QueryParams(query): QueryParams<ListPollsQuery>,
) -> AppResult<Json<Page<PollResponse>>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let page = state
        .vote_poll_service
        .list_polls(trip_id, user_id, query.limit, query.cursor.as_deref())
        .await?;
    Ok(Json(page))
}

async fn get_poll(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path((trip_id, poll_id)): Path<(String, String)>,
) -> AppResult<Json<PollResponse>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll_id = parse_uuid("poll_id", &poll_id)?;
    let poll = state
        .vote_poll_service
        .get_poll(trip_id, poll_id, user_id)
        .await?;
    Ok(Json(poll))
}

async fn update_poll(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path((trip_id, poll_id)): Path<(String, String)>,
    JsonBody(input): JsonBody<UpdatePollInput>,
) -> AppResult<Json<PollResponse>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll_id = parse_uuid("poll_id", &poll_id)?;
    let poll = state
        .vote_poll_service
        .update_poll(trip_id, poll_id, user_id, input)
        .await?;
    Ok(Json(poll))
}

async fn delete_poll(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path((trip_id, poll_id)): Path<(String, String)>,
) -> AppResult<Json<PollResponse>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll_id = parse_uuid("poll_id", &poll_id)?;
    let poll = state
        .vote_poll_service
        .delete_poll(trip_id, poll_id, user_id)
        .await?;
    Ok(Json(poll))
}

async fn add_option(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path((trip_id, poll_id)): Path<(String, String)>,
    JsonBody(input): JsonBody<CreateOptionInput>,
) -> AppResult<Created<OptionResponse>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll_id = parse_uuid("poll_id", &poll_id)?;
    let option = state
        .vote_poll_service
        .add_option(trip_id, poll_id, user_id, input)
        .await?;
    Ok(Created(option))
}

async fn delete_option(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path((trip_id, poll_id, option_id)): Path<(String, String, String)>,
) -> AppResult<Json<OptionResponse>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll_id = parse_uuid("poll_id", &poll_id)?;
    let option_id = parse_uuid("option_id", &option_id)?;
    let option = state
        .vote_poll_service
        .delete_option(trip_id, poll_id, option_id, user_id)
        .await?;
    Ok(Json(option))
}

async fn cast_vote(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path((trip_id, poll_id)): Path<(String, String)>,
    JsonBody(input): JsonBody<CastVoteInput>,
) -> AppResult<Json<PollResponse>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll_id = parse_uuid("poll_id", &poll_id)?;
    let poll = state
        .vote_poll_service
        .cast_vote(trip_id, poll_id, user_id, input)
        .await?;
    Ok(Json(poll))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/trips/{trip_id}/vote-polls",
            post(create_poll).get(list_polls),
        )
        .route(
            "/trips/{trip_id}/vote-polls/{poll_id}",
            get(get_poll).patch(update_poll).delete(delete_poll),
        )
        .route(
            "/trips/{trip_id}/vote-polls/{poll_id}/options",
            post(add_option),
        )
        .route(
            "/trips/{trip_id}/vote-polls/{poll_id}/options/{option_id}",
            delete(delete_option),
        )
        .route("/trips/{trip_id}/vote-polls/{poll_id}/vote", post(cast_vote))
}
