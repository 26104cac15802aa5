use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::*;
use crate::error::{Error, Result};

/// In-process [`Store`] with the same uniqueness rules as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_decision_writes: AtomicBool,
}

#[derive(Default)]
struct Inner {
    submissions: HashMap<Uuid, Submission>,
    speakers: HashMap<Uuid, Speaker>,
    reviews: HashMap<Uuid, Review>,
    reviewers: HashMap<Uuid, Reviewer>,
    tags: HashMap<Uuid, Tag>,
    submission_tags: HashSet<(Uuid, Uuid)>,
    scheduled_emails: HashMap<Uuid, ScheduledEmail>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts a reviewer row as-is; handy for seeding fixtures.
    pub fn put_reviewer(&self, reviewer: Reviewer) {
        self.inner().reviewers.insert(reviewer.id, reviewer);
    }

    pub fn put_speaker(&self, speaker: Speaker) {
        self.inner().speakers.insert(speaker.id, speaker);
    }

    pub fn put_submission(&self, submission: Submission) {
        self.inner().submissions.insert(submission.id, submission);
    }

    /// Makes writes of the submission decision columns fail, to exercise the
    /// dispatcher's recovery paths.
    pub fn set_fail_decision_writes(&self, fail: bool) {
        self.fail_decision_writes.store(fail, Ordering::SeqCst);
    }
}

fn matches_search(haystack: &[Option<&str>], needle: &str) -> bool {
    let needle = needle.to_lowercase();
    haystack
        .iter()
        .flatten()
        .any(|h| h.to_lowercase().contains(&needle))
}

fn paginate<T>(mut items: Vec<T>, page: i64, per_page: i64) -> Page<T> {
    let total = items.len() as i64;
    let start = page_offset(page, per_page).clamp(0, total) as usize;
    let end = (start + per_page.max(0) as usize).min(items.len());
    let items = items.drain(start..end).collect();
    Page {
        items,
        total,
        page,
        per_page,
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>> {
        Ok(self.inner().submissions.get(&id).cloned())
    }

    async fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Page<Submission>> {
        let inner = self.inner();
        let mut items: Vec<Submission> = inner
            .submissions
            .values()
            .filter(|s| filter.statuses.is_empty() || filter.statuses.contains(&s.status))
            .filter(|s| filter.submission_type.map_or(true, |t| s.submission_type == t))
            .filter(|s| filter.speaker_id.map_or(true, |id| s.speaker_id == id))
            .filter(|s| {
                filter
                    .tag_id
                    .map_or(true, |tag| inner.submission_tags.contains(&(s.id, tag)))
            })
            .filter(|s| {
                filter.search.as_deref().map_or(true, |q| {
                    matches_search(&[Some(s.title.as_str()), Some(s.abstract_text.as_str())], q)
                })
            })
            .cloned()
            .collect();

        match filter.order {
            SubmissionOrder::Newest => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SubmissionOrder::Oldest => items.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SubmissionOrder::Title => items.sort_by(|a, b| a.title.cmp(&b.title)),
        }

        Ok(paginate(items, filter.page, filter.per_page))
    }

    async fn create_submission(
        &self,
        speaker_id: Uuid,
        input: &NewSubmission,
        status: SubmissionStatus,
    ) -> Result<Submission> {
        let now = Utc::now();
        let submission = Submission {
            id: Uuid::new_v4(),
            speaker_id,
            title: input.title.clone(),
            abstract_text: input.abstract_text.clone(),
            submission_type: input.submission_type,
            talk_level: input.talk_level,
            status,
            decision_status: None,
            outline: input.outline.clone(),
            additional_notes: input.additional_notes.clone(),
            workshop_duration_hours: input.workshop_duration_hours,
            workshop_max_participants: input.workshop_max_participants,
            workshop_expectations: input.workshop_expectations.clone(),
            travel_assistance_requested: input.travel_assistance_requested,
            travel_origin: input.travel_origin.clone(),
            slides_url: None,
            recording_url: None,
            decision_email_sent_at: None,
            acceptance_email_scheduled_for: None,
            acceptance_scheduled_id: None,
            rejection_email_scheduled_for: None,
            rejection_scheduled_id: None,
            created_at: now,
            updated_at: now,
        };
        self.inner()
            .submissions
            .insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn update_submission_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>> {
        let mut inner = self.inner();
        Ok(inner.submissions.get_mut(&id).map(|s| {
            s.status = status;
            s.updated_at = Utc::now();
            s.clone()
        }))
    }

    async fn bulk_update_status(&self, ids: &[Uuid], status: SubmissionStatus) -> Result<u64> {
        let mut inner = self.inner();
        let now = Utc::now();
        let mut changed = 0;
        for id in ids.iter().collect::<HashSet<_>>() {
            if let Some(s) = inner.submissions.get_mut(id) {
                s.status = status;
                s.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn update_decision_fields(&self, id: Uuid, fields: &DecisionFields) -> Result<()> {
        if self.fail_decision_writes.load(Ordering::SeqCst) {
            return Err(Error::Internal("decision write failed".into()));
        }
        if let Some(s) = self.inner().submissions.get_mut(&id) {
            s.decision_status = fields.decision_status;
            s.decision_email_sent_at = fields.decision_email_sent_at;
            s.acceptance_email_scheduled_for = fields.acceptance_email_scheduled_for;
            s.acceptance_scheduled_id = fields.acceptance_scheduled_id;
            s.rejection_email_scheduled_for = fields.rejection_email_scheduled_for;
            s.rejection_scheduled_id = fields.rejection_scheduled_id;
            s.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl SpeakerStore for MemoryStore {
    async fn get_speaker(&self, id: Uuid) -> Result<Option<Speaker>> {
        Ok(self.inner().speakers.get(&id).cloned())
    }

    async fn get_speaker_by_user(&self, user_id: Uuid) -> Result<Option<Speaker>> {
        Ok(self
            .inner()
            .speakers
            .values()
            .find(|s| s.user_id == Some(user_id))
            .cloned())
    }

    async fn list_speakers(
        &self,
        search: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Speaker>> {
        let mut items: Vec<Speaker> = self
            .inner()
            .speakers
            .values()
            .filter(|s| {
                search.map_or(true, |q| {
                    matches_search(
                        &[
                            Some(s.email.as_str()),
                            s.first_name.as_deref(),
                            s.last_name.as_deref(),
                            s.company.as_deref(),
                        ],
                        q,
                    )
                })
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(items, page, per_page))
    }

    async fn upsert_speaker_for_user(&self, user_id: Uuid, email: &str) -> Result<Speaker> {
        let mut inner = self.inner();
        if let Some(existing) = inner.speakers.values_mut().find(|s| s.email == email) {
            if existing.user_id.is_none() {
                existing.user_id = Some(user_id);
                existing.updated_at = Utc::now();
            }
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let speaker = Speaker {
            id: Uuid::new_v4(),
            user_id: Some(user_id),
            email: email.to_string(),
            first_name: None,
            last_name: None,
            bio: None,
            company: None,
            job_title: None,
            twitter_handle: None,
            github_handle: None,
            linkedin_url: None,
            website_url: None,
            created_at: now,
            updated_at: now,
        };
        inner.speakers.insert(speaker.id, speaker.clone());
        Ok(speaker)
    }

    async fn update_speaker_profile(
        &self,
        id: Uuid,
        profile: &SpeakerProfile,
    ) -> Result<Option<Speaker>> {
        let mut inner = self.inner();
        Ok(inner.speakers.get_mut(&id).map(|s| {
            let fields = [
                (&mut s.first_name, &profile.first_name),
                (&mut s.last_name, &profile.last_name),
                (&mut s.bio, &profile.bio),
                (&mut s.company, &profile.company),
                (&mut s.job_title, &profile.job_title),
                (&mut s.twitter_handle, &profile.twitter_handle),
                (&mut s.github_handle, &profile.github_handle),
                (&mut s.linkedin_url, &profile.linkedin_url),
                (&mut s.website_url, &profile.website_url),
            ];
            for (slot, value) in fields {
                if value.is_some() {
                    *slot = value.clone();
                }
            }
            s.updated_at = Utc::now();
            s.clone()
        }))
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_review(&self, review: &NewReview) -> Result<Option<Review>> {
        let mut inner = self.inner();
        let taken = inner.reviews.values().any(|r| {
            r.submission_id == review.submission_id && r.reviewer_id == review.reviewer_id
        });
        if taken {
            return Ok(None);
        }

        let now = Utc::now();
        let s = &review.scores;
        let row = Review {
            id: Uuid::new_v4(),
            submission_id: review.submission_id,
            reviewer_id: review.reviewer_id,
            score_overall: s.score_overall,
            score_relevance: s.score_relevance,
            score_technical_depth: s.score_technical_depth,
            score_clarity: s.score_clarity,
            score_diversity: s.score_diversity,
            private_notes: s.private_notes.clone(),
            feedback_to_speaker: s.feedback_to_speaker.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.reviews.insert(row.id, row.clone());
        Ok(Some(row))
    }

    async fn update_review(&self, id: Uuid, s: &ReviewScores) -> Result<Option<Review>> {
        let mut inner = self.inner();
        Ok(inner.reviews.get_mut(&id).map(|r| {
            r.score_overall = s.score_overall;
            r.score_relevance = s.score_relevance;
            r.score_technical_depth = s.score_technical_depth;
            r.score_clarity = s.score_clarity;
            r.score_diversity = s.score_diversity;
            r.private_notes = s.private_notes.clone();
            r.feedback_to_speaker = s.feedback_to_speaker.clone();
            r.updated_at = Utc::now();
            r.clone()
        }))
    }

    async fn delete_review(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner().reviews.remove(&id).is_some())
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>> {
        Ok(self.inner().reviews.get(&id).cloned())
    }

    async fn reviews_for_submission(&self, submission_id: Uuid) -> Result<Vec<Review>> {
        let mut rows: Vec<Review> = self
            .inner()
            .reviews
            .values()
            .filter(|r| r.submission_id == submission_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn reviews_by_reviewer(&self, reviewer_id: Uuid) -> Result<Vec<Review>> {
        let mut rows: Vec<Review> = self
            .inner()
            .reviews
            .values()
            .filter(|r| r.reviewer_id == reviewer_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl ReviewerStore for MemoryStore {
    async fn get_reviewer(&self, id: Uuid) -> Result<Option<Reviewer>> {
        Ok(self.inner().reviewers.get(&id).cloned())
    }

    async fn get_reviewer_by_user(&self, user_id: Uuid) -> Result<Option<Reviewer>> {
        Ok(self
            .inner()
            .reviewers
            .values()
            .find(|r| r.user_id == Some(user_id))
            .cloned())
    }

    async fn list_reviewers(&self) -> Result<Vec<Reviewer>> {
        let mut rows: Vec<Reviewer> = self.inner().reviewers.values().cloned().collect();
        rows.sort_by(|a, b| a.invited_at.cmp(&b.invited_at));
        Ok(rows)
    }

    async fn create_reviewer(&self, input: &NewReviewer) -> Result<Option<Reviewer>> {
        let mut inner = self.inner();
        if inner
            .reviewers
            .values()
            .any(|r| r.email.eq_ignore_ascii_case(&input.email))
        {
            return Ok(None);
        }
        let reviewer = Reviewer {
            id: Uuid::new_v4(),
            user_id: None,
            email: input.email.clone(),
            name: input.name.clone(),
            role: input.role,
            can_see_speaker_identity: input.can_see_speaker_identity,
            is_active: true,
            invited_at: Utc::now(),
            accepted_at: None,
        };
        inner.reviewers.insert(reviewer.id, reviewer.clone());
        Ok(Some(reviewer))
    }

    async fn update_reviewer(&self, id: Uuid, update: &ReviewerUpdate) -> Result<Option<Reviewer>> {
        let mut inner = self.inner();
        Ok(inner.reviewers.get_mut(&id).map(|r| {
            if let Some(name) = &update.name {
                r.name = Some(name.clone());
            }
            if let Some(role) = update.role {
                r.role = role;
            }
            if let Some(can_see) = update.can_see_speaker_identity {
                r.can_see_speaker_identity = can_see;
            }
            if let Some(active) = update.is_active {
                r.is_active = active;
            }
            r.clone()
        }))
    }

    async fn delete_reviewer(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner().reviewers.remove(&id).is_some())
    }

    async fn link_reviewer_user(&self, email: &str, user_id: Uuid) -> Result<Option<Reviewer>> {
        let mut inner = self.inner();
        Ok(inner
            .reviewers
            .values_mut()
            .find(|r| {
                r.email.eq_ignore_ascii_case(email)
                    && (r.user_id.is_none() || r.user_id == Some(user_id))
            })
            .map(|r| {
                r.user_id = Some(user_id);
                r.accepted_at.get_or_insert_with(Utc::now);
                r.clone()
            }))
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut rows: Vec<Tag> = self.inner().tags.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.is_suggested
                .cmp(&a.is_suggested)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(rows)
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>> {
        Ok(self.inner().tags.get(&id).cloned())
    }

    async fn create_tag(&self, name: &str, is_suggested: bool) -> Result<Option<Tag>> {
        let mut inner = self.inner();
        if inner.tags.values().any(|t| t.name.eq_ignore_ascii_case(name)) {
            return Ok(None);
        }
        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_suggested,
            created_at: Utc::now(),
        };
        inner.tags.insert(tag.id, tag.clone());
        Ok(Some(tag))
    }

    async fn update_tag(&self, id: Uuid, update: &TagUpdate) -> Result<Option<Option<Tag>>> {
        let mut inner = self.inner();
        if !inner.tags.contains_key(&id) {
            return Ok(None);
        }
        if let Some(name) = &update.name {
            let taken = inner
                .tags
                .values()
                .any(|t| t.id != id && t.name.eq_ignore_ascii_case(name));
            if taken {
                return Ok(Some(None));
            }
        }
        Ok(inner.tags.get_mut(&id).map(|t| {
            if let Some(name) = &update.name {
                t.name = name.clone();
            }
            if let Some(suggested) = update.is_suggested {
                t.is_suggested = suggested;
            }
            Some(t.clone())
        }))
    }

    async fn delete_tag(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner();
        inner.submission_tags.retain(|(_, tag)| *tag != id);
        Ok(inner.tags.remove(&id).is_some())
    }

    async fn tags_for_submission(&self, submission_id: Uuid) -> Result<Vec<Tag>> {
        let inner = self.inner();
        let mut rows: Vec<Tag> = inner
            .submission_tags
            .iter()
            .filter(|(sub, _)| *sub == submission_id)
            .filter_map(|(_, tag)| inner.tags.get(tag).cloned())
            .collect();
        rows.sort_by_key(|t| t.name.to_lowercase());
        Ok(rows)
    }

    async fn set_submission_tags(&self, submission_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        let mut inner = self.inner();
        inner.submission_tags.retain(|(sub, _)| *sub != submission_id);
        for tag in tag_ids {
            inner.submission_tags.insert((submission_id, *tag));
        }
        Ok(())
    }
}

#[async_trait]
impl ScheduledEmailStore for MemoryStore {
    async fn insert_pending_email(
        &self,
        email: &NewScheduledEmail,
    ) -> Result<Option<ScheduledEmail>> {
        let mut inner = self.inner();
        let pending_exists = inner.scheduled_emails.values().any(|e| {
            e.submission_id == email.submission_id
                && e.email_type == email.email_type
                && e.status == ScheduledEmailStatus::Pending
        });
        if pending_exists {
            return Ok(None);
        }

        let row = ScheduledEmail {
            id: Uuid::new_v4(),
            submission_id: email.submission_id,
            email_type: email.email_type,
            scheduled_for: email.scheduled_for,
            status: ScheduledEmailStatus::Pending,
            provider_email_id: None,
            recipient_email: email.recipient_email.clone(),
            recipient_name: email.recipient_name.clone(),
            talk_title: email.talk_title.clone(),
            coupon_code: email.coupon_code.clone(),
            coupon_discount_percent: email.coupon_discount_percent,
            coupon_expires_at: email.coupon_expires_at,
            include_feedback: email.include_feedback,
            error_message: None,
            created_at: Utc::now(),
            sent_at: None,
            cancelled_at: None,
        };
        inner.scheduled_emails.insert(row.id, row.clone());
        Ok(Some(row))
    }

    async fn get_scheduled_email(&self, id: Uuid) -> Result<Option<ScheduledEmail>> {
        Ok(self.inner().scheduled_emails.get(&id).cloned())
    }

    async fn get_scheduled_email_by_provider_id(
        &self,
        provider_email_id: &str,
    ) -> Result<Option<ScheduledEmail>> {
        Ok(self
            .inner()
            .scheduled_emails
            .values()
            .filter(|e| e.provider_email_id.as_deref() == Some(provider_email_id))
            .max_by_key(|e| e.created_at)
            .cloned())
    }

    async fn scheduled_emails_for_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<Vec<ScheduledEmail>> {
        let mut rows: Vec<ScheduledEmail> = self
            .inner()
            .scheduled_emails
            .values()
            .filter(|e| e.submission_id == submission_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn set_provider_email_id(&self, id: Uuid, provider_email_id: &str) -> Result<()> {
        if let Some(e) = self.inner().scheduled_emails.get_mut(&id) {
            e.provider_email_id = Some(provider_email_id.to_string());
        }
        Ok(())
    }

    async fn transition_email(
        &self,
        id: Uuid,
        t: &EmailTransition,
    ) -> Result<Option<ScheduledEmail>> {
        let mut inner = self.inner();
        let Some(e) = inner.scheduled_emails.get_mut(&id) else {
            return Ok(None);
        };
        if !e.status.can_transition_to(t.to) {
            return Ok(None);
        }
        e.status = t.to;
        if let Some(provider_id) = &t.provider_email_id {
            e.provider_email_id = Some(provider_id.clone());
        }
        if let Some(msg) = &t.error_message {
            e.error_message = Some(msg.clone());
        }
        match t.to {
            ScheduledEmailStatus::Sent => e.sent_at = Some(t.at),
            ScheduledEmailStatus::Cancelled => e.cancelled_at = Some(t.at),
            _ => {}
        }
        Ok(Some(e.clone()))
    }
}
