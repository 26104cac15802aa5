mod admin;
mod auth;
mod review;
mod speaker;
mod webhooks;

pub use auth::{
    AdminReviewer, CurrentReviewer, CurrentSpeaker, SignedInUser, USER_EMAIL_HEADER, USER_ID_HEADER,
};
pub use webhooks::WEBHOOK_SECRET_HEADER;

use axum::{
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{SubmissionFilter, SubmissionOrder, SubmissionStatus, SubmissionType};
use crate::error::{Error, Result};
use crate::state::AppState;

/// Success body: every JSON endpoint answers `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

pub fn data<T: Serialize>(value: T) -> Json<Data<T>> {
    Json(Data { data: value })
}

/// Listing query shared by the reviewer and admin submission lists.
/// `status` takes a comma-separated list.
#[derive(Debug, Default, Deserialize)]
pub struct SubmissionQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub submission_type: Option<SubmissionType>,
    pub search: Option<String>,
    pub tag: Option<Uuid>,
    pub sort: Option<SubmissionOrder>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl SubmissionQuery {
    pub fn into_filter(self) -> Result<SubmissionFilter> {
        let statuses = match self.status.as_deref() {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<SubmissionStatus>().map_err(Error::Validation))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(SubmissionFilter {
            statuses,
            submission_type: self.submission_type,
            search: self.search,
            tag_id: self.tag,
            speaker_id: None,
            order: self.sort.unwrap_or_default(),
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(SubmissionFilter::DEFAULT_PER_PAGE),
        }
        .normalized())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/link", post(speaker::link_identity))
        // Reviewer surface
        .route("/api/review/submissions", get(review::list_submissions))
        .route("/api/review/submissions/:id", get(review::get_submission))
        .route("/api/review/submissions/:id/reviews", post(review::create_review))
        .route("/api/review/reviews", get(review::my_reviews))
        .route(
            "/api/review/reviews/:id",
            get(review::get_review)
                .patch(review::update_review)
                .delete(review::delete_review),
        )
        .route("/api/review/tags", get(review::list_tags))
        // Speaker surface
        .route(
            "/api/speaker/submissions",
            get(speaker::list_submissions).post(speaker::create_submission),
        )
        .route(
            "/api/speaker/profile",
            get(speaker::get_profile).patch(speaker::update_profile),
        )
        // Admin surface
        .route("/api/admin/submissions", get(admin::list_submissions))
        .route(
            "/api/admin/submissions/bulk-status",
            post(admin::bulk_update_status),
        )
        .route(
            "/api/admin/submissions/:id",
            get(admin::get_submission).patch(admin::update_submission),
        )
        .route("/api/admin/submissions/:id/tags", put(admin::set_submission_tags))
        .route(
            "/api/admin/submissions/:id/emails",
            get(admin::list_emails).post(admin::schedule_email),
        )
        .route("/api/admin/emails/:id/cancel", post(admin::cancel_email))
        .route("/api/admin/emails/:id/send-now", post(admin::send_email_now))
        .route(
            "/api/admin/reviewers",
            get(admin::list_reviewers).post(admin::invite_reviewer),
        )
        .route(
            "/api/admin/reviewers/:id",
            patch(admin::update_reviewer).delete(admin::delete_reviewer),
        )
        .route("/api/admin/speakers", get(admin::list_speakers))
        .route("/api/admin/speakers/:id", get(admin::get_speaker))
        .route("/api/admin/tags", get(admin::list_tags).post(admin::create_tag))
        .route(
            "/api/admin/tags/:id",
            patch(admin::update_tag).delete(admin::delete_tag),
        )
        .route("/api/webhooks/email", post(webhooks::email_event))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parses_status_list() {
        let q = SubmissionQuery {
            status: Some("submitted, under_review,".into()),
            page: Some(0),
            ..Default::default()
        };
        let f = q.into_filter().unwrap();
        assert_eq!(
            f.statuses,
            vec![SubmissionStatus::Submitted, SubmissionStatus::UnderReview]
        );
        assert_eq!(f.page, 1);
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        let q = SubmissionQuery {
            status: Some("maybe".into()),
            ..Default::default()
        };
        assert!(matches!(q.into_filter().unwrap_err(), Error::Validation(_)));
    }
}
