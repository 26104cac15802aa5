//! Role-gated read models of a submission.
//!
//! Super admins see everything. Every other role gets an anonymized view:
//! no speaker, only their own review, a bare review count and no media links.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::cfp::stats::{compute_stats, SubmissionStats};
use crate::db::prelude::*;
use crate::db::{
    Page, Review, Reviewer, Speaker, Submission, SubmissionFilter, SubmissionStatus,
    SubmissionType, Tag, TalkLevel,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub speaker: Option<Speaker>,
    pub tags: Vec<Tag>,
    pub all_reviews: Vec<Review>,
    pub my_review: Option<Review>,
    pub stats: SubmissionStats,
}

pub async fn submission_for_reviewer(
    store: &dyn Store,
    reviewer: &Reviewer,
    submission_id: Uuid,
) -> Result<SubmissionView> {
    if !reviewer.is_active {
        return Err(Error::access_denied("reviewer account is inactive"));
    }

    let mut submission = match store.get_submission(submission_id).await? {
        Some(s) if s.status.is_reviewable() => s,
        _ => return Err(Error::not_found("Submission")),
    };

    let tags = store.tags_for_submission(submission_id).await?;
    let reviews = store.reviews_for_submission(submission_id).await?;
    let stats = compute_stats(&reviews);
    let my_review = reviews
        .iter()
        .find(|r| r.reviewer_id == reviewer.id)
        .cloned();

    if reviewer.is_super_admin() {
        let speaker = store.get_speaker(submission.speaker_id).await?;
        return Ok(SubmissionView {
            submission,
            speaker,
            tags,
            all_reviews: reviews,
            my_review,
            stats,
        });
    }

    submission.speaker_id = Uuid::nil();
    submission.slides_url = None;
    submission.recording_url = None;
    Ok(SubmissionView {
        submission,
        speaker: None,
        tags,
        all_reviews: my_review.iter().cloned().collect(),
        my_review,
        stats: stats.count_only(),
    })
}

/// Row of the reviewer dashboard. Never carries speaker identity.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewQueueItem {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub submission_type: SubmissionType,
    pub talk_level: TalkLevel,
    pub status: SubmissionStatus,
    pub tags: Vec<Tag>,
    pub review_count: usize,
    pub has_reviewed: bool,
    pub created_at: DateTime<Utc>,
}

pub async fn list_for_reviewer(
    store: &dyn Store,
    reviewer: &Reviewer,
    mut filter: SubmissionFilter,
) -> Result<Page<ReviewQueueItem>> {
    if !reviewer.is_active {
        return Err(Error::access_denied("reviewer account is inactive"));
    }

    filter.statuses = if filter.statuses.is_empty() {
        SubmissionStatus::REVIEWABLE.to_vec()
    } else {
        filter
            .statuses
            .into_iter()
            .filter(SubmissionStatus::is_reviewable)
            .collect()
    };
    filter.speaker_id = None;
    if filter.statuses.is_empty() {
        return Ok(Page {
            items: Vec::new(),
            total: 0,
            page: filter.page,
            per_page: filter.per_page,
        });
    }

    let page = store.list_submissions(&filter).await?;
    let mut items = Vec::with_capacity(page.items.len());
    for s in &page.items {
        let reviews = store.reviews_for_submission(s.id).await?;
        items.push(ReviewQueueItem {
            id: s.id,
            title: s.title.clone(),
            abstract_text: s.abstract_text.clone(),
            submission_type: s.submission_type,
            talk_level: s.talk_level,
            status: s.status,
            tags: store.tags_for_submission(s.id).await?,
            review_count: reviews.len(),
            has_reviewed: reviews.iter().any(|r| r.reviewer_id == reviewer.id),
            created_at: s.created_at,
        });
    }

    Ok(Page {
        items,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    })
}
