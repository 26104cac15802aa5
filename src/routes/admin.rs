use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{data, AdminReviewer, Data, SubmissionQuery};
use crate::cfp::admin::{self, AdminSubmissionRow, SpeakerDetail};
use crate::cfp::{tags, view, SubmissionView};
use crate::db::{
    EmailType, NewReviewer, Page, Reviewer, ReviewerUpdate, ScheduledEmail, Speaker,
    Submission, SubmissionStatus, Tag, TagUpdate,
};
use crate::email::ScheduleOptions;
use crate::error::Result;
use crate::state::AppState;

pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Query(query): Query<SubmissionQuery>,
) -> Result<Json<Data<Page<AdminSubmissionRow>>>> {
    let page = admin::list_submissions(state.store.as_ref(), query.into_filter()?).await?;
    Ok(data(page))
}

pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    AdminReviewer(admin): AdminReviewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Data<SubmissionView>>> {
    let view = view::submission_for_reviewer(state.store.as_ref(), &admin, id).await?;
    Ok(data(view))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    status: SubmissionStatus,
}

pub async fn update_submission(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Data<Submission>>> {
    let submission = admin::update_submission_status(state.store.as_ref(), id, body.status).await?;
    Ok(data(submission))
}

#[derive(Deserialize)]
pub struct BulkStatusUpdate {
    ids: Vec<Uuid>,
    status: SubmissionStatus,
}

pub async fn bulk_update_status(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Json(body): Json<BulkStatusUpdate>,
) -> Result<Json<Data<Value>>> {
    let updated = admin::bulk_update_status(state.store.as_ref(), &body.ids, body.status).await?;
    Ok(data(json!({ "updated": updated })))
}

#[derive(Deserialize)]
pub struct SubmissionTags {
    tag_ids: Vec<Uuid>,
}

pub async fn set_submission_tags(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Path(id): Path<Uuid>,
    Json(body): Json<SubmissionTags>,
) -> Result<Json<Data<Vec<Tag>>>> {
    let tags = tags::set_submission_tags(state.store.as_ref(), id, &body.tag_ids).await?;
    Ok(data(tags))
}

pub async fn list_emails(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Data<Vec<ScheduledEmail>>>> {
    Ok(data(state.dispatcher.list_for_submission(id).await?))
}

#[derive(Deserialize)]
pub struct ScheduleRequest {
    email_type: EmailType,
    #[serde(flatten)]
    options: ScheduleOptions,
}

pub async fn schedule_email(
    State(state): State<Arc<AppState>>,
    AdminReviewer(admin): AdminReviewer,
    Path(id): Path<Uuid>,
    Json(body): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<Data<ScheduledEmail>>)> {
    tracing::info!(
        submission_id = %id,
        reviewer_id = %admin.id,
        email_type = body.email_type.as_str(),
        "decision email requested"
    );
    let email = state
        .dispatcher
        .schedule(id, body.email_type, body.options)
        .await?;
    Ok((StatusCode::CREATED, data(email)))
}

pub async fn cancel_email(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Data<ScheduledEmail>>> {
    Ok(data(state.dispatcher.cancel(id).await?))
}

pub async fn send_email_now(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Data<ScheduledEmail>>> {
    Ok(data(state.dispatcher.send_now(id).await?))
}

pub async fn list_reviewers(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
) -> Result<Json<Data<Vec<Reviewer>>>> {
    Ok(data(admin::list_reviewers(state.store.as_ref()).await?))
}

pub async fn invite_reviewer(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Json(input): Json<NewReviewer>,
) -> Result<(StatusCode, Json<Data<Reviewer>>)> {
    let reviewer = admin::invite_reviewer(state.store.as_ref(), input).await?;
    Ok((StatusCode::CREATED, data(reviewer)))
}

pub async fn update_reviewer(
    State(state): State<Arc<AppState>>,
    AdminReviewer(acting): AdminReviewer,
    Path(id): Path<Uuid>,
    Json(update): Json<ReviewerUpdate>,
) -> Result<Json<Data<Reviewer>>> {
    let reviewer = admin::update_reviewer(state.store.as_ref(), &acting, id, update).await?;
    Ok(data(reviewer))
}

pub async fn delete_reviewer(
    State(state): State<Arc<AppState>>,
    AdminReviewer(acting): AdminReviewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Data<Value>>> {
    admin::delete_reviewer(state.store.as_ref(), &acting, id).await?;
    Ok(data(json!({ "deleted": true })))
}

#[derive(Deserialize)]
pub struct SpeakerQuery {
    search: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

pub async fn list_speakers(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Query(query): Query<SpeakerQuery>,
) -> Result<Json<Data<Page<Speaker>>>> {
    let page = admin::list_speakers(
        state.store.as_ref(),
        query.search.as_deref(),
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(0),
    )
    .await?;
    Ok(data(page))
}

pub async fn get_speaker(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Data<SpeakerDetail>>> {
    Ok(data(admin::get_speaker(state.store.as_ref(), id).await?))
}

pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
) -> Result<Json<Data<Vec<Tag>>>> {
    Ok(data(tags::list_tags(state.store.as_ref()).await?))
}

#[derive(Deserialize)]
pub struct NewTag {
    name: String,
    #[serde(default)]
    is_suggested: bool,
}

pub async fn create_tag(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Json(body): Json<NewTag>,
) -> Result<(StatusCode, Json<Data<Tag>>)> {
    let tag = tags::create_tag(state.store.as_ref(), &body.name, body.is_suggested).await?;
    Ok((StatusCode::CREATED, data(tag)))
}

pub async fn update_tag(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Path(id): Path<Uuid>,
    Json(update): Json<TagUpdate>,
) -> Result<Json<Data<Tag>>> {
    Ok(data(tags::update_tag(state.store.as_ref(), id, update).await?))
}

pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    AdminReviewer(_): AdminReviewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Data<Value>>> {
    tags::delete_tag(state.store.as_ref(), id).await?;
    Ok(data(json!({ "deleted": true })))
}
