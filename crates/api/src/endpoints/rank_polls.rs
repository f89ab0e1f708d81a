//! Rank poll endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use toggo_common::{AppResult, parse_uuid};
use toggo_core::{
    CreateOptionInput, CreateRankPollInput, OptionResponse, PollVotersResponse,
    RankPollResponse, RankPollResults, SubmitRankingInput, UpdatePollInput,
};

use crate::{
    extractors::{AuthUser, JsonBody},
    middleware::AppState,
    response::Created,
};

async fn create_poll(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    JsonBody(input): JsonBody<CreateRankPollInput>,
) -> AppResult<Created<RankPollResponse>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll = state
        .rank_poll_service
        .create_rank_poll(trip_id, user_id, input)
        .await?;
    Ok(Created(poll))
}

async fn get_results(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path((trip_id, poll_id)): Path<(String, String)>,
) -> AppResult<Json<RankPollResults>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll_id = parse_uuid("poll_id", &poll_id)?;
    let results = state
        .rank_poll_service
        .get_results(trip_id, poll_id, user_id)
        .await?;
    Ok(Json(results))
}

async fn update_poll(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path((trip_id, poll_id)): Path<(String, String)>,
    JsonBody(input): JsonBody<UpdatePollInput>,
) -> AppResult<Json<RankPollResponse>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll_id = parse_uuid("poll_id", &poll_id)?;
    let poll = state
        .rank_poll_service
        .update_rank_poll(trip_id, poll_id, user_id, input)
        .await?;
    Ok(Json(poll))
}

async fn delete_poll(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path((trip_id, poll_id)): Path<(String, String)>,
) -> AppResult<Json<RankPollResponse>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll_id = parse_uuid("poll_id", &poll_id)?;
    let poll = state
        .rank_poll_service
        .delete_rank_poll(trip_id, poll_id, user_id)
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
        .rank_poll_service
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
        .rank_poll_service
        .delete_option(trip_id, poll_id, option_id, user_id)
        .await?;
    Ok(Json(option))
}

async fn submit_ranking(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path((trip_id, poll_id)): Path<(String, String)>,
    JsonBody(input): JsonBody<SubmitRankingInput>,
) -> AppResult<Json<RankPollResults>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll_id = parse_uuid("poll_id", &poll_id)?;
    let results = state
        .rank_poll_service
        .submit_ranking(trip_id, poll_id, user_id, input)
        .await?;
    Ok(Json(results))
}

async fn get_voters(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path((trip_id, poll_id)): Path<(String, String)>,
) -> AppResult<Json<PollVotersResponse>> {
    let trip_id = parse_uuid("trip_id", &trip_id)?;
    let poll_id = parse_uuid("poll_id", &poll_id)?;
    let voters = state
        .rank_poll_service
        .get_voters(trip_id, poll_id, user_id)
        .await?;
    Ok(Json(voters))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips/{trip_id}/rank-polls", post(create_poll))
        .route(
            "/trips/{trip_id}/rank-polls/{poll_id}",
            get(get_results).patch(update_poll).delete(delete_poll),
        )
        .route(
            "/trips/{trip_id}/rank-polls/{poll_id}/options",
            post(add_option),
        )
        .route(
            "/trips/{trip_id}/rank-polls/{poll_id}/options/{option_id}",
            delete(delete_option),
        )
        .route(
            "/trips/{trip_id}/rank-polls/{poll_id}/rank",
            post(submit_ranking),
        )
        .route("/trips/{trip_id}/rank-polls/{poll_id}/voters", get(get_voters))
}
