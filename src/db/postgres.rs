use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::*;
use crate::error::Result;

/// Postgres-backed [`Store`]. Uniqueness rules live in the schema; inserts
/// that would violate them come back as `None` instead of an error.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn push_submission_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &SubmissionFilter) {
    qb.push(" WHERE TRUE");
    if !filter.statuses.is_empty() {
        let statuses: Vec<String> = filter
            .statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        qb.push(" AND status = ANY(").push_bind(statuses).push(")");
    }
    if let Some(submission_type) = filter.submission_type {
        qb.push(" AND submission_type = ").push_bind(submission_type);
    }
    if let Some(speaker_id) = filter.speaker_id {
        qb.push(" AND speaker_id = ").push_bind(speaker_id);
    }
    if let Some(tag_id) = filter.tag_id {
        qb.push(" AND id IN (SELECT submission_id FROM cfp_submission_tags WHERE tag_id = ")
            .push_bind(tag_id)
            .push(")");
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR abstract ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>> {
        let row = sqlx::query_as::<_, Submission>("SELECT * FROM cfp_submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Page<Submission>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM cfp_submissions");
        push_submission_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new("SELECT * FROM cfp_submissions");
        push_submission_filters(&mut qb, filter);
        qb.push(match filter.order {
            SubmissionOrder::Newest => " ORDER BY created_at DESC",
            SubmissionOrder::Oldest => " ORDER BY created_at ASC",
            SubmissionOrder::Title => " ORDER BY title ASC",
        });
        qb.push(" LIMIT ")
            .push_bind(filter.per_page)
            .push(" OFFSET ")
            .push_bind(filter.offset());

        let items = qb
            .build_query_as::<Submission>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            page: filter.page,
            per_page: filter.per_page,
        })
    }

    async fn create_submission(
        &self,
        speaker_id: Uuid,
        input: &NewSubmission,
        status: SubmissionStatus,
    ) -> Result<Submission> {
        let row = sqlx::query_as::<_, Submission>(
            r#"
            INSERT INTO cfp_submissions (
                speaker_id, title, abstract, submission_type, talk_level, status,
                outline, additional_notes, workshop_duration_hours, workshop_max_participants,
                workshop_expectations, travel_assistance_requested, travel_origin
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(speaker_id)
        .bind(&input.title)
        .bind(&input.abstract_text)
        .bind(input.submission_type)
        .bind(input.talk_level)
        .bind(status)
        .bind(&input.outline)
        .bind(&input.additional_notes)
        .bind(input.workshop_duration_hours)
        .bind(input.workshop_max_participants)
        .bind(&input.workshop_expectations)
        .bind(input.travel_assistance_requested)
        .bind(&input.travel_origin)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_submission_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>> {
        let row = sqlx::query_as::<_, Submission>(
            "UPDATE cfp_submissions SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn bulk_update_status(&self, ids: &[Uuid], status: SubmissionStatus) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE cfp_submissions SET status = $2, updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_decision_fields(&self, id: Uuid, fields: &DecisionFields) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE cfp_submissions
            SET decision_status = $2,
                decision_email_sent_at = $3,
                acceptance_email_scheduled_for = $4,
                acceptance_scheduled_id = $5,
                rejection_email_scheduled_for = $6,
                rejection_scheduled_id = $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(fields.decision_status)
        .bind(fields.decision_email_sent_at)
        .bind(fields.acceptance_email_scheduled_for)
        .bind(fields.acceptance_scheduled_id)
        .bind(fields.rejection_email_scheduled_for)
        .bind(fields.rejection_scheduled_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SpeakerStore for PgStore {
    async fn get_speaker(&self, id: Uuid) -> Result<Option<Speaker>> {
        let row = sqlx::query_as::<_, Speaker>("SELECT * FROM cfp_speakers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_speaker_by_user(&self, user_id: Uuid) -> Result<Option<Speaker>> {
        let row = sqlx::query_as::<_, Speaker>("SELECT * FROM cfp_speakers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_speakers(
        &self,
        search: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Speaker>> {
        let pattern = search.map(|s| format!("%{}%", s));
        let where_clause = "WHERE ($1::TEXT IS NULL OR email ILIKE $1 OR first_name ILIKE $1 \
                            OR last_name ILIKE $1 OR company ILIKE $1)";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM cfp_speakers {}", where_clause))
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;

        let items = sqlx::query_as::<_, Speaker>(&format!(
            "SELECT * FROM cfp_speakers {} ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            where_clause
        ))
        .bind(&pattern)
        .bind(per_page)
        .bind(page_offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    async fn upsert_speaker_for_user(&self, user_id: Uuid, email: &str) -> Result<Speaker> {
        let row = sqlx::query_as::<_, Speaker>(
            r#"
            INSERT INTO cfp_speakers (email, user_id)
            VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE
                SET user_id = COALESCE(cfp_speakers.user_id, EXCLUDED.user_id),
                    updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_speaker_profile(
        &self,
        id: Uuid,
        profile: &SpeakerProfile,
    ) -> Result<Option<Speaker>> {
        let row = sqlx::query_as::<_, Speaker>(
            r#"
            UPDATE cfp_speakers
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                bio = COALESCE($4, bio),
                company = COALESCE($5, company),
                job_title = COALESCE($6, job_title),
                twitter_handle = COALESCE($7, twitter_handle),
                github_handle = COALESCE($8, github_handle),
                linkedin_url = COALESCE($9, linkedin_url),
                website_url = COALESCE($10, website_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.bio)
        .bind(&profile.company)
        .bind(&profile.job_title)
        .bind(&profile.twitter_handle)
        .bind(&profile.github_handle)
        .bind(&profile.linkedin_url)
        .bind(&profile.website_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn insert_review(&self, review: &NewReview) -> Result<Option<Review>> {
        let s = &review.scores;
        let row = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO cfp_reviews (
                submission_id, reviewer_id, score_overall, score_relevance,
                score_technical_depth, score_clarity, score_diversity,
                private_notes, feedback_to_speaker
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (submission_id, reviewer_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(review.submission_id)
        .bind(review.reviewer_id)
        .bind(s.score_overall)
        .bind(s.score_relevance)
        .bind(s.score_technical_depth)
        .bind(s.score_clarity)
        .bind(s.score_diversity)
        .bind(&s.private_notes)
        .bind(&s.feedback_to_speaker)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_review(&self, id: Uuid, s: &ReviewScores) -> Result<Option<Review>> {
        let row = sqlx::query_as::<_, Review>(
            r#"
            UPDATE cfp_reviews
            SET score_overall = $2,
                score_relevance = $3,
                score_technical_depth = $4,
                score_clarity = $5,
                score_diversity = $6,
                private_notes = $7,
                feedback_to_speaker = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(s.score_overall)
        .bind(s.score_relevance)
        .bind(s.score_technical_depth)
        .bind(s.score_clarity)
        .bind(s.score_diversity)
        .bind(&s.private_notes)
        .bind(&s.feedback_to_speaker)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_review(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cfp_reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>> {
        let row = sqlx::query_as::<_, Review>("SELECT * FROM cfp_reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn reviews_for_submission(&self, submission_id: Uuid) -> Result<Vec<Review>> {
        let rows = sqlx::query_as::<_, Review>(
            "SELECT * FROM cfp_reviews WHERE submission_id = $1 ORDER BY created_at",
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn reviews_by_reviewer(&self, reviewer_id: Uuid) -> Result<Vec<Review>> {
        let rows = sqlx::query_as::<_, Review>(
            "SELECT * FROM cfp_reviews WHERE reviewer_id = $1 ORDER BY created_at DESC",
        )
        .bind(reviewer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ReviewerStore for PgStore {
    async fn get_reviewer(&self, id: Uuid) -> Result<Option<Reviewer>> {
        let row = sqlx::query_as::<_, Reviewer>("SELECT * FROM cfp_reviewers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_reviewer_by_user(&self, user_id: Uuid) -> Result<Option<Reviewer>> {
        let row = sqlx::query_as::<_, Reviewer>("SELECT * FROM cfp_reviewers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_reviewers(&self) -> Result<Vec<Reviewer>> {
        let rows = sqlx::query_as::<_, Reviewer>("SELECT * FROM cfp_reviewers ORDER BY invited_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn create_reviewer(&self, input: &NewReviewer) -> Result<Option<Reviewer>> {
        let row = sqlx::query_as::<_, Reviewer>(
            r#"
            INSERT INTO cfp_reviewers (email, name, role, can_see_speaker_identity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&input.email)
        .bind(&input.name)
        .bind(input.role)
        .bind(input.can_see_speaker_identity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_reviewer(&self, id: Uuid, update: &ReviewerUpdate) -> Result<Option<Reviewer>> {
        let row = sqlx::query_as::<_, Reviewer>(
            r#"
            UPDATE cfp_reviewers
            SET name = COALESCE($2, name),
                role = COALESCE($3, role),
                can_see_speaker_identity = COALESCE($4, can_see_speaker_identity),
                is_active = COALESCE($5, is_active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(update.role)
        .bind(update.can_see_speaker_identity)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_reviewer(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cfp_reviewers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn link_reviewer_user(&self, email: &str, user_id: Uuid) -> Result<Option<Reviewer>> {
        let row = sqlx::query_as::<_, Reviewer>(
            r#"
            UPDATE cfp_reviewers
            SET user_id = $2,
                accepted_at = COALESCE(accepted_at, NOW())
            WHERE LOWER(email) = LOWER($1)
              AND (user_id IS NULL OR user_id = $2)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl TagStore for PgStore {
    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>(
            "SELECT * FROM cfp_tags ORDER BY is_suggested DESC, LOWER(name)",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>> {
        let row = sqlx::query_as::<_, Tag>("SELECT * FROM cfp_tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create_tag(&self, name: &str, is_suggested: bool) -> Result<Option<Tag>> {
        let row = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO cfp_tags (name, is_suggested)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(is_suggested)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_tag(&self, id: Uuid, update: &TagUpdate) -> Result<Option<Option<Tag>>> {
        let result = sqlx::query_as::<_, Tag>(
            r#"
            UPDATE cfp_tags
            SET name = COALESCE($2, name),
                is_suggested = COALESCE($3, is_suggested)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(update.is_suggested)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.map(Some)),
            Err(e) if is_unique_violation(&e) => Ok(Some(None)),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_tag(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cfp_tags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn tags_for_submission(&self, submission_id: Uuid) -> Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.* FROM cfp_tags t
            JOIN cfp_submission_tags st ON st.tag_id = t.id
            WHERE st.submission_id = $1
            ORDER BY LOWER(t.name)
            "#,
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn set_submission_tags(&self, submission_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cfp_submission_tags WHERE submission_id = $1")
            .bind(submission_id)
            .execute(&mut *tx)
            .await?;
        if !tag_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO cfp_submission_tags (submission_id, tag_id)
                SELECT $1, UNNEST($2::UUID[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(submission_id)
            .bind(tag_ids)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ScheduledEmailStore for PgStore {
    async fn insert_pending_email(
        &self,
        email: &NewScheduledEmail,
    ) -> Result<Option<ScheduledEmail>> {
        let row = sqlx::query_as::<_, ScheduledEmail>(
            r#"
            INSERT INTO cfp_scheduled_emails (
                submission_id, email_type, scheduled_for, status,
                recipient_email, recipient_name, talk_title,
                coupon_code, coupon_discount_percent, coupon_expires_at, include_feedback
            )
            VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (submission_id, email_type) WHERE status = 'pending' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(email.submission_id)
        .bind(email.email_type)
        .bind(email.scheduled_for)
        .bind(&email.recipient_email)
        .bind(&email.recipient_name)
        .bind(&email.talk_title)
        .bind(&email.coupon_code)
        .bind(email.coupon_discount_percent)
        .bind(email.coupon_expires_at)
        .bind(email.include_feedback)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_scheduled_email(&self, id: Uuid) -> Result<Option<ScheduledEmail>> {
        let row = sqlx::query_as::<_, ScheduledEmail>(
            "SELECT * FROM cfp_scheduled_emails WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_scheduled_email_by_provider_id(
        &self,
        provider_email_id: &str,
    ) -> Result<Option<ScheduledEmail>> {
        let row = sqlx::query_as::<_, ScheduledEmail>(
            "SELECT * FROM cfp_scheduled_emails WHERE provider_email_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(provider_email_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn scheduled_emails_for_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<Vec<ScheduledEmail>> {
        let rows = sqlx::query_as::<_, ScheduledEmail>(
            "SELECT * FROM cfp_scheduled_emails WHERE submission_id = $1 ORDER BY created_at DESC",
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn set_provider_email_id(&self, id: Uuid, provider_email_id: &str) -> Result<()> {
        sqlx::query("UPDATE cfp_scheduled_emails SET provider_email_id = $2 WHERE id = $1")
            .bind(id)
            .bind(provider_email_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn transition_email(
        &self,
        id: Uuid,
        t: &EmailTransition,
    ) -> Result<Option<ScheduledEmail>> {
        let sent_at = (t.to == ScheduledEmailStatus::Sent).then_some(t.at);
        let cancelled_at = (t.to == ScheduledEmailStatus::Cancelled).then_some(t.at);

        let row = sqlx::query_as::<_, ScheduledEmail>(
            r#"
            UPDATE cfp_scheduled_emails
            SET status = $2,
                provider_email_id = COALESCE($3, provider_email_id),
                error_message = COALESCE($4, error_message),
                sent_at = COALESCE($5, sent_at),
                cancelled_at = COALESCE($6, cancelled_at)
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(t.to)
        .bind(&t.provider_email_id)
        .bind(&t.error_message)
        .bind(sent_at)
        .bind(cancelled_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
