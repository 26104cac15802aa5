//! Decision emails with a cancellation window.
//!
//! Scheduling hands the message to the provider with a `scheduled_at` a few
//! minutes out, so an admin who clicked the wrong decision can still cancel.
//! Each send is tracked as a [`ScheduledEmail`] row that only ever leaves
//! `pending` once, and the submission's decision columns mirror the row.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::prelude::*;
use crate::db::{
    DecisionFields, EmailTransition, EmailType, NewScheduledEmail, Review, ScheduledEmail,
    ScheduledEmailStatus, Speaker, Submission,
};
use crate::email::coupon::{Coupon, CouponIssuer, CouponRequest};
use crate::email::provider::{EmailProvider, OutboundEmail};
use crate::error::{Error, Result};
use crate::templates::{render_decision_email, DecisionEmailContext, RenderedEmail};

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub from: String,
    pub reply_to: Option<String>,
    pub conference_name: String,
    pub site_url: String,
    /// How long the provider holds a scheduled email. Zero sends at once.
    pub delay: Duration,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleOptions {
    #[serde(default)]
    pub include_coupon: bool,
    #[serde(default)]
    pub coupon_discount_percent: Option<i32>,
    #[serde(default)]
    pub coupon_valid_days: Option<i64>,
    #[serde(default)]
    pub include_feedback: bool,
}

pub struct Dispatcher {
    store: Arc<dyn Store>,
    provider: Arc<dyn EmailProvider>,
    coupons: Arc<dyn CouponIssuer>,
    settings: EmailSettings,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn EmailProvider>,
        coupons: Arc<dyn CouponIssuer>,
        settings: EmailSettings,
    ) -> Self {
        Self {
            store,
            provider,
            coupons,
            settings,
        }
    }

    pub async fn list_for_submission(&self, submission_id: Uuid) -> Result<Vec<ScheduledEmail>> {
        self.store
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| Error::not_found("Submission"))?;
        self.store.scheduled_emails_for_submission(submission_id).await
    }

    pub async fn schedule(
        &self,
        submission_id: Uuid,
        email_type: EmailType,
        options: ScheduleOptions,
    ) -> Result<ScheduledEmail> {
        if options.include_coupon && email_type != EmailType::Rejection {
            return Err(Error::validation(
                "Coupons can only be attached to rejection emails",
            ));
        }
        let (submission, speaker) = self.load(submission_id).await?;

        let already_pending = self
            .store
            .scheduled_emails_for_submission(submission_id)
            .await?
            .iter()
            .any(|e| e.email_type == email_type && e.status == ScheduledEmailStatus::Pending);
        if already_pending {
            return Err(already_scheduled(email_type));
        }

        let coupon = if options.include_coupon {
            let request =
                CouponRequest::clamped(options.coupon_discount_percent, options.coupon_valid_days);
            Some(self.coupons.issue(request, &speaker.email).await?)
        } else {
            None
        };
        let reviews = self.feedback_reviews(submission_id, options.include_feedback).await?;
        let rendered = self.render(email_type, &submission, &speaker, coupon.clone(), &reviews)?;

        let now = Utc::now();
        let scheduled_for = now + self.settings.delay;
        let row = self
            .store
            .insert_pending_email(&NewScheduledEmail {
                submission_id,
                email_type,
                scheduled_for,
                recipient_email: speaker.email.clone(),
                recipient_name: speaker.display_name(),
                talk_title: submission.title.clone(),
                coupon_code: coupon.as_ref().map(|c| c.code.clone()),
                coupon_discount_percent: coupon.as_ref().map(|c| c.percent_off),
                coupon_expires_at: coupon.as_ref().map(|c| c.expires_at),
                include_feedback: options.include_feedback,
            })
            .await?
            .ok_or_else(|| already_scheduled(email_type))?;

        let hold_until = (self.settings.delay > Duration::zero()).then_some(scheduled_for);
        let provider_email_id = self
            .deliver(&row, &speaker, rendered, hold_until)
            .await?;
        if let Err(e) = self
            .record_schedule(&row, &provider_email_id, now, scheduled_for)
            .await
        {
            self.abandon(&row, &provider_email_id, &e).await;
            return Err(e);
        }

        info!(
            submission_id = %submission_id,
            email_id = %row.id,
            email_type = email_type.as_str(),
            scheduled_for = %scheduled_for,
            "decision email scheduled"
        );
        Ok(ScheduledEmail {
            provider_email_id: Some(provider_email_id),
            ..row
        })
    }

    pub async fn cancel(&self, email_id: Uuid) -> Result<ScheduledEmail> {
        let email = self.pending_email(email_id).await?;
        self.cancel_upstream(&email).await;

        let cancelled = self
            .store
            .transition_email(email_id, &EmailTransition::cancelled(Utc::now()))
            .await?
            .ok_or_else(no_longer_pending)?;

        self.update_decision_fields(email.submission_id, |f| {
            f.withdraw(email.email_type, true);
        })
        .await?;

        info!(
            submission_id = %email.submission_id,
            email_id = %email_id,
            "decision email cancelled"
        );
        Ok(cancelled)
    }

    /// Skips the remaining delay: a freshly rendered copy is prepared, the
    /// held one is cancelled and the fresh one goes out immediately.
    pub async fn send_now(&self, email_id: Uuid) -> Result<ScheduledEmail> {
        let email = self.pending_email(email_id).await?;

        let (submission, speaker) = self.load(email.submission_id).await?;
        let reviews = self
            .feedback_reviews(email.submission_id, email.include_feedback)
            .await?;
        let rendered = self.render(
            email.email_type,
            &submission,
            &speaker,
            stored_coupon(&email),
            &reviews,
        )?;

        self.cancel_upstream(&email).await;
        let provider_email_id = match self.deliver(&email, &speaker, rendered, None).await {
            Ok(id) => id,
            Err(e) => {
                self.update_decision_fields(email.submission_id, |f| {
                    f.withdraw(email.email_type, false);
                })
                .await?;
                return Err(e);
            }
        };

        let now = Utc::now();
        let sent = self
            .store
            .transition_email(email_id, &EmailTransition::sent(now, Some(provider_email_id)))
            .await?
            .ok_or_else(no_longer_pending)?;

        self.update_decision_fields(email.submission_id, |f| {
            f.decision_status = Some(email.email_type.decision());
            f.decision_email_sent_at = Some(now);
            f.set_scheduled(email.email_type, Some(now), Some(email.id));
        })
        .await?;

        info!(
            submission_id = %email.submission_id,
            email_id = %email_id,
            "decision email sent immediately"
        );
        Ok(sent)
    }

    /// Delivery confirmation from the provider.
    pub async fn mark_sent(&self, provider_email_id: &str) -> Result<ScheduledEmail> {
        let email = self.by_provider_id(provider_email_id).await?;
        let now = Utc::now();
        let sent = self
            .store
            .transition_email(email.id, &EmailTransition::sent(now, None))
            .await?
            .ok_or_else(|| already_settled(&email))?;

        self.update_decision_fields(email.submission_id, |f| {
            f.decision_email_sent_at = Some(now);
        })
        .await?;
        info!(email_id = %email.id, "decision email delivered");
        Ok(sent)
    }

    pub async fn mark_failed(
        &self,
        provider_email_id: &str,
        error_message: &str,
    ) -> Result<ScheduledEmail> {
        let email = self.by_provider_id(provider_email_id).await?;
        let failed = self
            .store
            .transition_email(email.id, &EmailTransition::failed(Utc::now(), error_message))
            .await?
            .ok_or_else(|| already_settled(&email))?;

        self.update_decision_fields(email.submission_id, |f| {
            f.withdraw(email.email_type, false);
        })
        .await?;
        warn!(email_id = %email.id, error = %error_message, "decision email failed");
        Ok(failed)
    }

    async fn record_schedule(
        &self,
        row: &ScheduledEmail,
        provider_email_id: &str,
        now: DateTime<Utc>,
        scheduled_for: DateTime<Utc>,
    ) -> Result<()> {
        self.store
            .set_provider_email_id(row.id, provider_email_id)
            .await?;
        self.update_decision_fields(row.submission_id, |f| {
            f.decision_status = Some(row.email_type.decision());
            f.decision_email_sent_at = Some(now);
            f.set_scheduled(row.email_type, Some(scheduled_for), Some(row.id));
        })
        .await
    }

    /// The provider accepted a message we could not record. It is cancelled
    /// upstream and the row is failed, so nothing stays pending without a
    /// provider id.
    async fn abandon(&self, row: &ScheduledEmail, provider_email_id: &str, cause: &Error) {
        warn!(email_id = %row.id, error = %cause, "scheduled email could not be recorded");
        if let Err(e) = self.provider.cancel(provider_email_id).await {
            warn!(email_id = %row.id, provider_email_id, error = %e, "provider cancel failed");
        }
        let failed = EmailTransition::failed(Utc::now(), cause.to_string());
        if let Err(e) = self.store.transition_email(row.id, &failed).await {
            warn!(email_id = %row.id, error = %e, "could not mark email failed");
        }
    }

    async fn load(&self, submission_id: Uuid) -> Result<(Submission, Speaker)> {
        let submission = self
            .store
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| Error::not_found("Submission"))?;
        let speaker = self
            .store
            .get_speaker(submission.speaker_id)
            .await?
            .ok_or_else(|| Error::not_found("Speaker"))?;
        Ok((submission, speaker))
    }

    async fn pending_email(&self, email_id: Uuid) -> Result<ScheduledEmail> {
        let email = self
            .store
            .get_scheduled_email(email_id)
            .await?
            .ok_or_else(|| Error::not_found("Scheduled email"))?;
        if email.status != ScheduledEmailStatus::Pending {
            return Err(already_settled(&email));
        }
        Ok(email)
    }

    async fn by_provider_id(&self, provider_email_id: &str) -> Result<ScheduledEmail> {
        self.store
            .get_scheduled_email_by_provider_id(provider_email_id)
            .await?
            .ok_or_else(|| Error::not_found("Scheduled email"))
    }

    async fn feedback_reviews(&self, submission_id: Uuid, include: bool) -> Result<Vec<Review>> {
        if include {
            self.store.reviews_for_submission(submission_id).await
        } else {
            Ok(Vec::new())
        }
    }

    /// The held message may already have left; failing to cancel it is logged
    /// and otherwise ignored.
    async fn cancel_upstream(&self, email: &ScheduledEmail) {
        let Some(provider_email_id) = email.provider_email_id.as_deref() else {
            return;
        };
        if let Err(e) = self.provider.cancel(provider_email_id).await {
            warn!(
                email_id = %email.id,
                provider_email_id,
                error = %e,
                "provider cancel failed"
            );
        }
    }

    /// Sends through the provider. A provider error marks the row failed
    /// before it is returned.
    async fn deliver(
        &self,
        row: &ScheduledEmail,
        speaker: &Speaker,
        rendered: RenderedEmail,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<String> {
        let outbound = OutboundEmail {
            from: self.settings.from.clone(),
            to: vec![speaker.email.clone()],
            reply_to: self.settings.reply_to.clone(),
            subject: rendered.subject,
            html: rendered.html,
            scheduled_at,
        };
        match self.provider.send(&outbound).await {
            Ok(id) => Ok(id),
            Err(e) => {
                warn!(email_id = %row.id, error = %e, "provider send failed");
                self.store
                    .transition_email(row.id, &EmailTransition::failed(Utc::now(), e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }

    fn render(
        &self,
        email_type: EmailType,
        submission: &Submission,
        speaker: &Speaker,
        coupon: Option<Coupon>,
        reviews: &[Review],
    ) -> Result<RenderedEmail> {
        let feedback = reviews
            .iter()
            .filter_map(|r| r.feedback_to_speaker.as_deref())
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect();
        let speaker_first_name = speaker
            .first_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| speaker.display_name());

        let ctx = DecisionEmailContext {
            conference_name: self.settings.conference_name.clone(),
            site_url: self.settings.site_url.trim_end_matches('/').to_string(),
            speaker_first_name,
            talk_title: submission.title.clone(),
            submission_type: submission.submission_type.as_str().to_string(),
            coupon,
            feedback,
            review_count: reviews.len(),
        };
        render_decision_email(email_type, &ctx)
    }

    /// Re-reads the submission so concurrent changes to the other email
    /// type's columns are not overwritten.
    async fn update_decision_fields(
        &self,
        submission_id: Uuid,
        apply: impl FnOnce(&mut DecisionFields) + Send,
    ) -> Result<()> {
        let submission = self
            .store
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| Error::not_found("Submission"))?;
        let mut fields = submission.decision_fields();
        apply(&mut fields);
        self.store.update_decision_fields(submission_id, &fields).await
    }
}

fn stored_coupon(email: &ScheduledEmail) -> Option<Coupon> {
    match (
        &email.coupon_code,
        email.coupon_discount_percent,
        email.coupon_expires_at,
    ) {
        (Some(code), Some(percent_off), Some(expires_at)) => Some(Coupon {
            code: code.clone(),
            percent_off,
            expires_at,
        }),
        _ => None,
    }
}

fn already_scheduled(email_type: EmailType) -> Error {
    Error::Conflict(format!(
        "A {} email is already scheduled for this submission",
        email_type.as_str()
    ))
}

fn already_settled(email: &ScheduledEmail) -> Error {
    Error::InvalidState(format!("email is already {}", email.status.as_str()))
}

fn no_longer_pending() -> Error {
    Error::InvalidState("email is no longer pending".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DecisionStatus, MemoryStore, NewReview, ReviewScores, SubmissionStatus};
    use crate::email::coupon::LocalCouponIssuer;
    use crate::email::provider::DryRunProvider;
    use crate::testing::seed_submission;

    struct Harness {
        store: Arc<MemoryStore>,
        provider: Arc<DryRunProvider>,
        dispatcher: Dispatcher,
    }

    fn harness(delay_minutes: i64) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(DryRunProvider::new());
        let dispatcher = Dispatcher::new(
            store.clone(),
            provider.clone(),
            Arc::new(LocalCouponIssuer),
            EmailSettings {
                from: "CFP <cfp@example.com>".into(),
                reply_to: Some("program@example.com".into()),
                conference_name: "RustConf".into(),
                site_url: "https://conf.example.com/".into(),
                delay: Duration::minutes(delay_minutes),
            },
        );
        Harness {
            store,
            provider,
            dispatcher,
        }
    }

    async fn submission(h: &Harness, id: Uuid) -> Submission {
        h.store.get_submission(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn scheduling_holds_the_email_and_records_decision() {
        let h = harness(30);
        let sub = seed_submission(&h.store, SubmissionStatus::Accepted);

        let email = h
            .dispatcher
            .schedule(sub.id, EmailType::Acceptance, ScheduleOptions::default())
            .await
            .unwrap();
        assert_eq!(email.status, ScheduledEmailStatus::Pending);

        let outbox = h.provider.outbox();
        assert_eq!(outbox.len(), 1);
        let (provider_id, sent) = &outbox[0];
        assert_eq!(email.provider_email_id.as_deref(), Some(provider_id.as_str()));
        let held = sent.scheduled_at.unwrap() - Utc::now();
        assert!(held > Duration::minutes(29) && held <= Duration::minutes(30));
        assert!(sent.html.contains("Zero-copy parsing in practice"));
        assert_eq!(sent.reply_to.as_deref(), Some("program@example.com"));

        let sub = submission(&h, sub.id).await;
        assert_eq!(sub.decision_status, Some(DecisionStatus::Accepted));
        assert!(sub.decision_email_sent_at.is_some());
        assert_eq!(sub.acceptance_scheduled_id, Some(email.id));
        assert_eq!(sub.acceptance_email_scheduled_for, Some(email.scheduled_for));
        assert!(sub.rejection_scheduled_id.is_none());
    }

    #[tokio::test]
    async fn second_schedule_of_same_type_conflicts() {
        let h = harness(30);
        let sub = seed_submission(&h.store, SubmissionStatus::Rejected);
        h.dispatcher
            .schedule(sub.id, EmailType::Rejection, ScheduleOptions::default())
            .await
            .unwrap();

        let err = h
            .dispatcher
            .schedule(sub.id, EmailType::Rejection, ScheduleOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(h.provider.outbox().len(), 1);
        assert_eq!(h.dispatcher.list_for_submission(sub.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejection_with_coupon_and_feedback() {
        let h = harness(30);
        let sub = seed_submission(&h.store, SubmissionStatus::Rejected);
        h.store
            .insert_review(&NewReview {
                submission_id: sub.id,
                reviewer_id: Uuid::new_v4(),
                scores: ReviewScores {
                    score_overall: 2,
                    feedback_to_speaker: Some("  Narrow the scope.  ".into()),
                    private_notes: Some("not for the speaker".into()),
                    ..Default::default()
                },
            })
            .await
            .unwrap();

        let email = h
            .dispatcher
            .schedule(
                sub.id,
                EmailType::Rejection,
                ScheduleOptions {
                    include_coupon: true,
                    coupon_discount_percent: Some(95),
                    coupon_valid_days: None,
                    include_feedback: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(email.coupon_discount_percent, Some(80));
        let code = email.coupon_code.clone().unwrap();
        let (_, sent) = &h.provider.outbox()[0];
        assert!(sent.html.contains(&code));
        assert!(sent.html.contains("Narrow the scope."));
        assert!(!sent.html.contains("not for the speaker"));
    }

    #[tokio::test]
    async fn coupons_are_refused_on_acceptance() {
        let h = harness(30);
        let sub = seed_submission(&h.store, SubmissionStatus::Accepted);
        let options = ScheduleOptions {
            include_coupon: true,
            ..Default::default()
        };
        let err = h
            .dispatcher
            .schedule(sub.id, EmailType::Acceptance, options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn provider_failure_marks_row_failed_and_leaves_submission() {
        let h = harness(30);
        let sub = seed_submission(&h.store, SubmissionStatus::Accepted);
        h.provider.set_fail_sends(true);

        let err = h
            .dispatcher
            .schedule(sub.id, EmailType::Acceptance, ScheduleOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmailProvider(_)));

        let rows = h.dispatcher.list_for_submission(sub.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ScheduledEmailStatus::Failed);
        assert!(rows[0].error_message.is_some());
        let sub_after = submission(&h, sub.id).await;
        assert!(sub_after.decision_status.is_none());
        assert!(sub_after.decision_email_sent_at.is_none());

        h.provider.set_fail_sends(false);
        h.dispatcher
            .schedule(sub.id, EmailType::Acceptance, ScheduleOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_rolls_back_fields_even_if_provider_cancel_fails() {
        let h = harness(30);
        let sub = seed_submission(&h.store, SubmissionStatus::Rejected);
        let email = h
            .dispatcher
            .schedule(sub.id, EmailType::Rejection, ScheduleOptions::default())
            .await
            .unwrap();
        h.provider.set_fail_cancels(true);

        let cancelled = h.dispatcher.cancel(email.id).await.unwrap();
        assert_eq!(cancelled.status, ScheduledEmailStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        let sub = submission(&h, sub.id).await;
        assert_eq!(sub.decision_fields(), DecisionFields::default());

        let again = h.dispatcher.cancel(email.id).await.unwrap_err();
        assert!(matches!(again, Error::InvalidState(_)));
        assert!(matches!(
            h.dispatcher.send_now(email.id).await.unwrap_err(),
            Error::InvalidState(_)
        ));
    }

    #[tokio::test]
    async fn send_now_cancels_held_copy_and_sends_fresh() {
        let h = harness(30);
        let sub = seed_submission(&h.store, SubmissionStatus::Accepted);
        let email = h
            .dispatcher
            .schedule(sub.id, EmailType::Acceptance, ScheduleOptions::default())
            .await
            .unwrap();
        let held_id = email.provider_email_id.clone().unwrap();

        let mut renamed = submission(&h, sub.id).await;
        renamed.title = "Zero-copy parsing, revisited".into();
        h.store.put_submission(renamed);

        let sent = h.dispatcher.send_now(email.id).await.unwrap();
        assert_eq!(sent.status, ScheduledEmailStatus::Sent);
        assert_eq!(h.provider.cancelled(), vec![held_id.clone()]);

        let outbox = h.provider.outbox();
        assert_eq!(outbox.len(), 2);
        let (fresh_id, fresh) = &outbox[1];
        assert!(fresh.scheduled_at.is_none());
        assert!(fresh.html.contains("Zero-copy parsing, revisited"));
        assert_eq!(sent.provider_email_id.as_deref(), Some(fresh_id.as_str()));

        let sub = submission(&h, sub.id).await;
        let sent_at = sub.decision_email_sent_at.unwrap();
        assert_eq!(sub.acceptance_email_scheduled_for, Some(sent_at));

        // The held copy's id no longer maps to a row.
        assert!(matches!(
            h.dispatcher.mark_sent(&held_id).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn failed_send_now_withdraws_the_schedule() {
        let h = harness(30);
        let sub = seed_submission(&h.store, SubmissionStatus::Accepted);
        let email = h
            .dispatcher
            .schedule(sub.id, EmailType::Acceptance, ScheduleOptions::default())
            .await
            .unwrap();
        let held_id = email.provider_email_id.clone().unwrap();
        h.provider.set_fail_sends(true);

        let err = h.dispatcher.send_now(email.id).await.unwrap_err();
        assert!(matches!(err, Error::EmailProvider(_)));
        assert_eq!(h.provider.cancelled(), vec![held_id]);

        let row = h.store.get_scheduled_email(email.id).await.unwrap().unwrap();
        assert_eq!(row.status, ScheduledEmailStatus::Failed);
        let sub = submission(&h, sub.id).await;
        assert!(sub.decision_email_sent_at.is_none());
        assert!(sub.acceptance_scheduled_id.is_none());
        assert!(sub.acceptance_email_scheduled_for.is_none());
    }

    #[tokio::test]
    async fn send_now_keeps_held_copy_when_render_inputs_are_gone() {
        let h = harness(30);
        let sub = seed_submission(&h.store, SubmissionStatus::Accepted);
        let email = h
            .dispatcher
            .schedule(sub.id, EmailType::Acceptance, ScheduleOptions::default())
            .await
            .unwrap();
        let mut orphaned = submission(&h, sub.id).await;
        orphaned.speaker_id = Uuid::new_v4();
        h.store.put_submission(orphaned);

        let err = h.dispatcher.send_now(email.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(h.provider.cancelled().is_empty());
        let row = h.store.get_scheduled_email(email.id).await.unwrap().unwrap();
        assert_eq!(row.status, ScheduledEmailStatus::Pending);
    }

    #[tokio::test]
    async fn unrecorded_schedule_is_cancelled_and_failed() {
        let h = harness(30);
        let sub = seed_submission(&h.store, SubmissionStatus::Accepted);
        h.store.set_fail_decision_writes(true);

        let err = h
            .dispatcher
            .schedule(sub.id, EmailType::Acceptance, ScheduleOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        let (provider_id, _) = h.provider.outbox()[0].clone();
        assert_eq!(h.provider.cancelled(), vec![provider_id]);
        let rows = h.dispatcher.list_for_submission(sub.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ScheduledEmailStatus::Failed);

        h.store.set_fail_decision_writes(false);
        h.dispatcher
            .schedule(sub.id, EmailType::Acceptance, ScheduleOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelling_one_type_keeps_the_other_pending_decision() {
        let h = harness(30);
        let sub = seed_submission(&h.store, SubmissionStatus::Rejected);
        let acceptance = h
            .dispatcher
            .schedule(sub.id, EmailType::Acceptance, ScheduleOptions::default())
            .await
            .unwrap();
        let rejection = h
            .dispatcher
            .schedule(sub.id, EmailType::Rejection, ScheduleOptions::default())
            .await
            .unwrap();

        h.dispatcher.cancel(acceptance.id).await.unwrap();
        let after = submission(&h, sub.id).await;
        assert_eq!(after.decision_status, Some(DecisionStatus::Rejected));
        assert!(after.decision_email_sent_at.is_some());
        assert_eq!(after.rejection_scheduled_id, Some(rejection.id));
        assert!(after.acceptance_scheduled_id.is_none());

        h.dispatcher.cancel(rejection.id).await.unwrap();
        assert_eq!(
            submission(&h, sub.id).await.decision_fields(),
            DecisionFields::default()
        );
    }

    #[tokio::test]
    async fn provider_callbacks_settle_pending_rows_once() {
        let h = harness(30);
        let accepted = seed_submission(&h.store, SubmissionStatus::Accepted);
        let rejected = seed_submission(&h.store, SubmissionStatus::Rejected);
        let a = h
            .dispatcher
            .schedule(accepted.id, EmailType::Acceptance, ScheduleOptions::default())
            .await
            .unwrap();
        let r = h
            .dispatcher
            .schedule(rejected.id, EmailType::Rejection, ScheduleOptions::default())
            .await
            .unwrap();

        let a_pid = a.provider_email_id.unwrap();
        let sent = h.dispatcher.mark_sent(&a_pid).await.unwrap();
        assert_eq!(sent.status, ScheduledEmailStatus::Sent);
        assert!(matches!(
            h.dispatcher.mark_failed(&a_pid, "late bounce").await.unwrap_err(),
            Error::InvalidState(_)
        ));

        let failed = h
            .dispatcher
            .mark_failed(&r.provider_email_id.unwrap(), "mailbox full")
            .await
            .unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("mailbox full"));
        let rejected = submission(&h, rejected.id).await;
        assert!(rejected.decision_email_sent_at.is_none());
        assert!(rejected.rejection_scheduled_id.is_none());

        assert!(matches!(
            h.dispatcher.mark_sent("unknown").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn zero_delay_sends_without_hold() {
        let h = harness(0);
        let sub = seed_submission(&h.store, SubmissionStatus::Accepted);
        h.dispatcher
            .schedule(sub.id, EmailType::Acceptance, ScheduleOptions::default())
            .await
            .unwrap();
        assert!(h.provider.outbox()[0].1.scheduled_at.is_none());
    }
}
