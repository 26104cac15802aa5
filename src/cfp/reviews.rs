use tracing::info;
use uuid::Uuid;

use crate::db::prelude::*;
use crate::db::{NewReview, Review, ReviewScores, Reviewer, ReviewerRole};
use crate::error::{Error, Result};

pub const ALREADY_REVIEWED: &str = "You have already reviewed this submission";

const MAX_TEXT_LEN: usize = 5000;

fn check_score(name: &str, value: Option<i32>) -> Result<()> {
    match value {
        Some(v) if !(1..=5).contains(&v) => Err(Error::validation(format!(
            "{} must be between 1 and 5",
            name
        ))),
        _ => Ok(()),
    }
}

fn check_text(name: &str, value: &Option<String>) -> Result<()> {
    match value {
        Some(text) if text.chars().count() > MAX_TEXT_LEN => Err(Error::validation(format!(
            "{} must be at most {} characters",
            name, MAX_TEXT_LEN
        ))),
        _ => Ok(()),
    }
}

/// Rejects out-of-range scores before anything is written.
pub fn validate_scores(scores: &ReviewScores) -> Result<()> {
    check_score("Overall score", Some(scores.score_overall))?;
    check_score("Relevance score", scores.score_relevance)?;
    check_score("Technical depth score", scores.score_technical_depth)?;
    check_score("Clarity score", scores.score_clarity)?;
    check_score("Diversity score", scores.score_diversity)?;
    check_text("Private notes", &scores.private_notes)?;
    check_text("Feedback to speaker", &scores.feedback_to_speaker)?;
    Ok(())
}

fn ensure_can_write(reviewer: &Reviewer) -> Result<()> {
    if !reviewer.is_active {
        return Err(Error::access_denied("reviewer account is inactive"));
    }
    if reviewer.role == ReviewerRole::Readonly {
        return Err(Error::access_denied("read-only reviewers cannot submit reviews"));
    }
    Ok(())
}

pub async fn create_review(
    store: &dyn Store,
    reviewer: &Reviewer,
    submission_id: Uuid,
    scores: ReviewScores,
) -> Result<Review> {
    ensure_can_write(reviewer)?;
    validate_scores(&scores)?;

    match store.get_submission(submission_id).await? {
        Some(s) if s.status.is_reviewable() => {}
        _ => return Err(Error::not_found("Submission")),
    }

    let new_review = NewReview {
        submission_id,
        reviewer_id: reviewer.id,
        scores,
    };
    let review = store
        .insert_review(&new_review)
        .await?
        .ok_or_else(|| Error::Conflict(ALREADY_REVIEWED.to_string()))?;

    info!(
        review_id = %review.id,
        submission_id = %submission_id,
        reviewer_id = %reviewer.id,
        "review created"
    );
    Ok(review)
}

async fn owned_review(store: &dyn Store, reviewer: &Reviewer, review_id: Uuid) -> Result<Review> {
    let review = store
        .get_review(review_id)
        .await?
        .ok_or_else(|| Error::not_found("Review"))?;
    if review.reviewer_id != reviewer.id {
        return Err(Error::access_denied("you can only modify your own reviews"));
    }
    Ok(review)
}

pub async fn update_review(
    store: &dyn Store,
    reviewer: &Reviewer,
    review_id: Uuid,
    scores: ReviewScores,
) -> Result<Review> {
    ensure_can_write(reviewer)?;
    validate_scores(&scores)?;
    owned_review(store, reviewer, review_id).await?;

    store
        .update_review(review_id, &scores)
        .await?
        .ok_or_else(|| Error::not_found("Review"))
}

/// Reviewers delete their own reviews; super admins may delete any.
pub async fn delete_review(store: &dyn Store, reviewer: &Reviewer, review_id: Uuid) -> Result<()> {
    if reviewer.is_super_admin() {
        store
            .get_review(review_id)
            .await?
            .ok_or_else(|| Error::not_found("Review"))?;
    } else {
        ensure_can_write(reviewer)?;
        owned_review(store, reviewer, review_id).await?;
    }

    if !store.delete_review(review_id).await? {
        return Err(Error::not_found("Review"));
    }
    info!(review_id = %review_id, reviewer_id = %reviewer.id, "review deleted");
    Ok(())
}

pub async fn get_review(store: &dyn Store, reviewer: &Reviewer, review_id: Uuid) -> Result<Review> {
    let review = store
        .get_review(review_id)
        .await?
        .ok_or_else(|| Error::not_found("Review"))?;
    if review.reviewer_id != reviewer.id && !reviewer.is_super_admin() {
        return Err(Error::access_denied("you can only view your own reviews"));
    }
    Ok(review)
}

pub async fn reviews_by_reviewer(store: &dyn Store, reviewer_id: Uuid) -> Result<Vec<Review>> {
    store.reviews_by_reviewer(reviewer_id).await
}

pub async fn reviews_for_submission(store: &dyn Store, submission_id: Uuid) -> Result<Vec<Review>> {
    store.reviews_for_submission(submission_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfp::stats::compute_stats;
    use crate::db::{MemoryStore, SubmissionStatus};
    use crate::testing::{reviewer, seed_submission};

    fn scores(overall: i32) -> ReviewScores {
        ReviewScores {
            score_overall: overall,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn second_review_for_same_pair_is_rejected() {
        let store = MemoryStore::new();
        let sub = seed_submission(&store, SubmissionStatus::Submitted);
        let a = reviewer(ReviewerRole::Reviewer);
        let b = reviewer(ReviewerRole::Reviewer);

        create_review(&store, &a, sub.id, scores(4)).await.unwrap();
        create_review(&store, &b, sub.id, scores(2)).await.unwrap();

        let err = create_review(&store, &a, sub.id, scores(5)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(ref m) if m == ALREADY_REVIEWED));

        let all = reviews_for_submission(&store, sub.id).await.unwrap();
        let stats = compute_stats(&all);
        assert_eq!(stats.review_count, 2);
        assert_eq!(stats.avg_overall, Some(3.0));
    }

    #[tokio::test]
    async fn out_of_range_scores_never_reach_the_store() {
        let store = MemoryStore::new();
        let sub = seed_submission(&store, SubmissionStatus::Submitted);
        let a = reviewer(ReviewerRole::Reviewer);

        for bad in [0, 6, -1] {
            let err = create_review(&store, &a, sub.id, scores(bad)).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        let mut optional_bad = scores(3);
        optional_bad.score_clarity = Some(9);
        assert!(create_review(&store, &a, sub.id, optional_bad).await.is_err());

        assert!(store.reviews_for_submission(sub.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn drafts_cannot_be_reviewed() {
        let store = MemoryStore::new();
        let sub = seed_submission(&store, SubmissionStatus::Draft);
        let err = create_review(&store, &reviewer(ReviewerRole::Reviewer), sub.id, scores(3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn readonly_reviewers_cannot_write() {
        let store = MemoryStore::new();
        let sub = seed_submission(&store, SubmissionStatus::Submitted);
        let err = create_review(&store, &reviewer(ReviewerRole::Readonly), sub.id, scores(3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
    }

    #[tokio::test]
    async fn updates_and_deletes_are_ownership_checked() {
        let store = MemoryStore::new();
        let sub = seed_submission(&store, SubmissionStatus::UnderReview);
        let owner = reviewer(ReviewerRole::Reviewer);
        let other = reviewer(ReviewerRole::Reviewer);
        let admin = reviewer(ReviewerRole::SuperAdmin);

        let review = create_review(&store, &owner, sub.id, scores(3)).await.unwrap();

        let err = update_review(&store, &other, review.id, scores(1)).await.unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
        let err = delete_review(&store, &other, review.id).await.unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));

        let updated = update_review(&store, &owner, review.id, scores(5)).await.unwrap();
        assert_eq!(updated.score_overall, 5);

        delete_review(&store, &admin, review.id).await.unwrap();
        let err = get_review(&store, &owner, review.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_frees_the_pair_for_a_new_review() {
        let store = MemoryStore::new();
        let sub = seed_submission(&store, SubmissionStatus::Submitted);
        let a = reviewer(ReviewerRole::Reviewer);

        let first = create_review(&store, &a, sub.id, scores(2)).await.unwrap();
        delete_review(&store, &a, first.id).await.unwrap();
        let second = create_review(&store, &a, sub.id, scores(4)).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(reviews_by_reviewer(&store, a.id).await.unwrap().len(), 1);
    }
}
