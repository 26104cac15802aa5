//! Super-admin operations over submissions, reviewers and speakers.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::cfp::identity::normalize_email;
use crate::cfp::stats::{compute_stats, SubmissionStats};
use crate::db::prelude::*;
use crate::db::{
    NewReviewer, Page, Reviewer, ReviewerUpdate, Speaker, Submission, SubmissionFilter,
    SubmissionStatus, Tag,
};
use crate::error::{Error, Result};

pub const MAX_BULK_IDS: usize = 100;

/// Admin listing row: the submission plus who wrote it and how it scores.
#[derive(Debug, Clone, Serialize)]
pub struct AdminSubmissionRow {
    #[serde(flatten)]
    pub submission: Submission,
    pub speaker_name: Option<String>,
    pub speaker_email: Option<String>,
    pub tags: Vec<Tag>,
    pub stats: SubmissionStats,
}

pub async fn list_submissions(
    store: &dyn Store,
    filter: SubmissionFilter,
) -> Result<Page<AdminSubmissionRow>> {
    let page = store.list_submissions(&filter.normalized()).await?;
    let mut items = Vec::with_capacity(page.items.len());
    for submission in page.items {
        let speaker = store.get_speaker(submission.speaker_id).await?;
        let reviews = store.reviews_for_submission(submission.id).await?;
        items.push(AdminSubmissionRow {
            speaker_name: speaker.as_ref().map(Speaker::display_name),
            speaker_email: speaker.map(|s| s.email),
            tags: store.tags_for_submission(submission.id).await?,
            stats: compute_stats(&reviews),
            submission,
        });
    }
    Ok(Page {
        items,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    })
}

pub async fn update_submission_status(
    store: &dyn Store,
    id: Uuid,
    status: SubmissionStatus,
) -> Result<Submission> {
    let submission = store
        .update_submission_status(id, status)
        .await?
        .ok_or_else(|| Error::not_found("Submission"))?;
    info!(submission_id = %id, status = status.as_str(), "submission status updated");
    Ok(submission)
}

pub async fn bulk_update_status(
    store: &dyn Store,
    ids: &[Uuid],
    status: SubmissionStatus,
) -> Result<u64> {
    if ids.is_empty() {
        return Err(Error::validation("At least one submission id is required"));
    }
    if ids.len() > MAX_BULK_IDS {
        return Err(Error::validation(format!(
            "At most {} submissions can be updated at once",
            MAX_BULK_IDS
        )));
    }
    let updated = store.bulk_update_status(ids, status).await?;
    info!(requested = ids.len(), updated, status = status.as_str(), "bulk status update");
    Ok(updated)
}

pub async fn list_reviewers(store: &dyn Store) -> Result<Vec<Reviewer>> {
    store.list_reviewers().await
}

pub async fn invite_reviewer(store: &dyn Store, mut input: NewReviewer) -> Result<Reviewer> {
    input.email = normalize_email(&input.email)?;
    input.name = input
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let reviewer = store
        .create_reviewer(&input)
        .await?
        .ok_or_else(|| Error::Conflict("A reviewer with this email already exists".into()))?;
    info!(reviewer_id = %reviewer.id, role = ?reviewer.role, "reviewer invited");
    Ok(reviewer)
}

/// Admins cannot demote or deactivate themselves; that would lock the
/// last admin out.
pub async fn update_reviewer(
    store: &dyn Store,
    acting: &Reviewer,
    id: Uuid,
    update: ReviewerUpdate,
) -> Result<Reviewer> {
    if acting.id == id {
        let demotes = update.role.map_or(false, |r| r != acting.role);
        let deactivates = update.is_active == Some(false);
        if demotes || deactivates {
            return Err(Error::validation("You cannot change your own role or status"));
        }
    }
    store
        .update_reviewer(id, &update)
        .await?
        .ok_or_else(|| Error::not_found("Reviewer"))
}

pub async fn delete_reviewer(store: &dyn Store, acting: &Reviewer, id: Uuid) -> Result<()> {
    if acting.id == id {
        return Err(Error::validation("You cannot remove yourself"));
    }
    if !store.delete_reviewer(id).await? {
        return Err(Error::not_found("Reviewer"));
    }
    info!(reviewer_id = %id, "reviewer removed");
    Ok(())
}

pub async fn list_speakers(
    store: &dyn Store,
    search: Option<&str>,
    page: i64,
    per_page: i64,
) -> Result<Page<Speaker>> {
    let page = page.max(1);
    let per_page = if per_page <= 0 {
        SubmissionFilter::DEFAULT_PER_PAGE
    } else {
        per_page.min(SubmissionFilter::MAX_PER_PAGE)
    };
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    store.list_speakers(search, page, per_page).await
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakerDetail {
    #[serde(flatten)]
    pub speaker: Speaker,
    pub submissions: Vec<Submission>,
}

pub async fn get_speaker(store: &dyn Store, id: Uuid) -> Result<SpeakerDetail> {
    let speaker = store
        .get_speaker(id)
        .await?
        .ok_or_else(|| Error::not_found("Speaker"))?;
    let filter = SubmissionFilter {
        speaker_id: Some(id),
        per_page: SubmissionFilter::MAX_PER_PAGE,
        ..Default::default()
    }
    .normalized();
    let submissions = store.list_submissions(&filter).await?.items;
    Ok(SpeakerDetail {
        speaker,
        submissions,
    })
}
