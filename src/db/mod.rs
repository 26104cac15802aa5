//! Persistence for the CFP tables.
//!
//! Each table family sits behind a narrow trait; [`Store`] is the union the
//! rest of the crate works against. [`PgStore`] talks to Postgres, while
//! [`MemoryStore`] keeps everything in process for tests and local runs.

mod memory;
mod models;
mod postgres;

pub use memory::MemoryStore;
pub use models::*;
pub use postgres::PgStore;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

/// All store traits, for call sites that use store methods directly.
pub mod prelude {
    pub use super::{
        ReviewStore, ReviewerStore, ScheduledEmailStore, SpeakerStore, Store, SubmissionStore,
        TagStore,
    };
}

pub async fn create_pool(database_url: &str) -> std::result::Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>>;

    async fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Page<Submission>>;

    async fn create_submission(
        &self,
        speaker_id: Uuid,
        input: &NewSubmission,
        status: SubmissionStatus,
    ) -> Result<Submission>;

    /// Returns the updated row, or None when the id is unknown.
    async fn update_submission_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>>;

    /// Returns the number of rows changed.
    async fn bulk_update_status(&self, ids: &[Uuid], status: SubmissionStatus) -> Result<u64>;

    async fn update_decision_fields(&self, id: Uuid, fields: &DecisionFields) -> Result<()>;
}

#[async_trait]
pub trait SpeakerStore: Send + Sync {
    async fn get_speaker(&self, id: Uuid) -> Result<Option<Speaker>>;

    async fn get_speaker_by_user(&self, user_id: Uuid) -> Result<Option<Speaker>>;

    async fn list_speakers(&self, search: Option<&str>, page: i64, per_page: i64)
        -> Result<Page<Speaker>>;

    /// Insert-or-fetch keyed by email. An existing row with no `user_id`
    /// gets linked; a row linked to another user is returned untouched so the
    /// caller can detect the mismatch.
    async fn upsert_speaker_for_user(&self, user_id: Uuid, email: &str) -> Result<Speaker>;

    async fn update_speaker_profile(
        &self,
        id: Uuid,
        profile: &SpeakerProfile,
    ) -> Result<Option<Speaker>>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// None when the (submission, reviewer) pair already has a review.
    async fn insert_review(&self, review: &NewReview) -> Result<Option<Review>>;

    async fn update_review(&self, id: Uuid, scores: &ReviewScores) -> Result<Option<Review>>;

    async fn delete_review(&self, id: Uuid) -> Result<bool>;

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>>;

    async fn reviews_for_submission(&self, submission_id: Uuid) -> Result<Vec<Review>>;

    async fn reviews_by_reviewer(&self, reviewer_id: Uuid) -> Result<Vec<Review>>;
}

#[async_trait]
pub trait ReviewerStore: Send + Sync {
    async fn get_reviewer(&self, id: Uuid) -> Result<Option<Reviewer>>;

    async fn get_reviewer_by_user(&self, user_id: Uuid) -> Result<Option<Reviewer>>;

    async fn list_reviewers(&self) -> Result<Vec<Reviewer>>;

    /// None when the email is already invited.
    async fn create_reviewer(&self, input: &NewReviewer) -> Result<Option<Reviewer>>;

    async fn update_reviewer(&self, id: Uuid, update: &ReviewerUpdate) -> Result<Option<Reviewer>>;

    async fn delete_reviewer(&self, id: Uuid) -> Result<bool>;

    /// Links an invitation to an authenticated user. `accepted_at` is only
    /// set on the first link.
    async fn link_reviewer_user(&self, email: &str, user_id: Uuid) -> Result<Option<Reviewer>>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<Tag>>;

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>>;

    /// None when a tag with the same name (case-insensitive) exists.
    async fn create_tag(&self, name: &str, is_suggested: bool) -> Result<Option<Tag>>;

    /// Outer None: unknown id. Inner None: the new name is taken.
    async fn update_tag(&self, id: Uuid, update: &TagUpdate) -> Result<Option<Option<Tag>>>;

    async fn delete_tag(&self, id: Uuid) -> Result<bool>;

    async fn tags_for_submission(&self, submission_id: Uuid) -> Result<Vec<Tag>>;

    async fn set_submission_tags(&self, submission_id: Uuid, tag_ids: &[Uuid]) -> Result<()>;
}

#[async_trait]
pub trait ScheduledEmailStore: Send + Sync {
    /// None when a pending email of the same type exists for the submission.
    async fn insert_pending_email(&self, email: &NewScheduledEmail)
        -> Result<Option<ScheduledEmail>>;

    async fn get_scheduled_email(&self, id: Uuid) -> Result<Option<ScheduledEmail>>;

    async fn get_scheduled_email_by_provider_id(
        &self,
        provider_email_id: &str,
    ) -> Result<Option<ScheduledEmail>>;

    async fn scheduled_emails_for_submission(&self, submission_id: Uuid)
        -> Result<Vec<ScheduledEmail>>;

    async fn set_provider_email_id(&self, id: Uuid, provider_email_id: &str) -> Result<()>;

    /// Compare-and-set out of `pending`. None when the row is missing or no
    /// longer pending.
    async fn transition_email(
        &self,
        id: Uuid,
        transition: &EmailTransition,
    ) -> Result<Option<ScheduledEmail>>;
}

pub trait Store:
    SubmissionStore + SpeakerStore + ReviewStore + ReviewerStore + TagStore + ScheduledEmailStore
{
}

impl<T> Store for T where
    T: SubmissionStore
        + SpeakerStore
        + ReviewStore
        + ReviewerStore
        + TagStore
        + ScheduledEmailStore
{
}
