use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{data, CurrentReviewer, Data, SubmissionQuery};
use crate::cfp::view::ReviewQueueItem;
use crate::cfp::{reviews, tags, view, SubmissionView};
use crate::db::{Page, Review, ReviewScores, Tag};
use crate::error::Result;
use crate::state::AppState;

pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    CurrentReviewer(reviewer): CurrentReviewer,
    Query(query): Query<SubmissionQuery>,
) -> Result<Json<Data<Page<ReviewQueueItem>>>> {
    let page = view::list_for_reviewer(state.store.as_ref(), &reviewer, query.into_filter()?).await?;
    Ok(data(page))
}

pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    CurrentReviewer(reviewer): CurrentReviewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Data<SubmissionView>>> {
    let view = view::submission_for_reviewer(state.store.as_ref(), &reviewer, id).await?;
    Ok(data(view))
}

pub async fn create_review(
    State(state): State<Arc<AppState>>,
    CurrentReviewer(reviewer): CurrentReviewer,
    Path(submission_id): Path<Uuid>,
    Json(scores): Json<ReviewScores>,
) -> Result<(StatusCode, Json<Data<Review>>)> {
    let review = reviews::create_review(state.store.as_ref(), &reviewer, submission_id, scores).await?;
    Ok((StatusCode::CREATED, data(review)))
}

pub async fn my_reviews(
    State(state): State<Arc<AppState>>,
    CurrentReviewer(reviewer): CurrentReviewer,
) -> Result<Json<Data<Vec<Review>>>> {
    let reviews = reviews::reviews_by_reviewer(state.store.as_ref(), reviewer.id).await?;
    Ok(data(reviews))
}

pub async fn get_review(
    State(state): State<Arc<AppState>>,
    CurrentReviewer(reviewer): CurrentReviewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Data<Review>>> {
    Ok(data(reviews::get_review(state.store.as_ref(), &reviewer, id).await?))
}

pub async fn update_review(
    State(state): State<Arc<AppState>>,
    CurrentReviewer(reviewer): CurrentReviewer,
    Path(id): Path<Uuid>,
    Json(scores): Json<ReviewScores>,
) -> Result<Json<Data<Review>>> {
    let review = reviews::update_review(state.store.as_ref(), &reviewer, id, scores).await?;
    Ok(data(review))
}

pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    CurrentReviewer(reviewer): CurrentReviewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Data<Value>>> {
    reviews::delete_review(state.store.as_ref(), &reviewer, id).await?;
    Ok(data(json!({ "deleted": true })))
}

pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    CurrentReviewer(_): CurrentReviewer,
) -> Result<Json<Data<Vec<Tag>>>> {
    Ok(data(tags::list_tags(state.store.as_ref()).await?))
}
