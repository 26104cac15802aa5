use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum SubmissionType {
    Lightning,
    Standard,
    Workshop,
}

impl SubmissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionType::Lightning => "lightning",
            SubmissionType::Standard => "standard",
            SubmissionType::Workshop => "workshop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TalkLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    UnderReview,
    Waitlisted,
    Accepted,
    Rejected,
    Withdrawn,
}

impl SubmissionStatus {
    /// Statuses a reviewer may open. Drafts and withdrawn talks stay private
    /// to the speaker.
    pub const REVIEWABLE: [SubmissionStatus; 5] = [
        SubmissionStatus::Submitted,
        SubmissionStatus::UnderReview,
        SubmissionStatus::Waitlisted,
        SubmissionStatus::Accepted,
        SubmissionStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::UnderReview => "under_review",
            SubmissionStatus::Waitlisted => "waitlisted",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn is_reviewable(&self) -> bool {
        Self::REVIEWABLE.contains(self)
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "draft" => Ok(SubmissionStatus::Draft),
            "submitted" => Ok(SubmissionStatus::Submitted),
            "under_review" => Ok(SubmissionStatus::UnderReview),
            "waitlisted" => Ok(SubmissionStatus::Waitlisted),
            "accepted" => Ok(SubmissionStatus::Accepted),
            "rejected" => Ok(SubmissionStatus::Rejected),
            "withdrawn" => Ok(SubmissionStatus::Withdrawn),
            other => Err(format!("Unknown submission status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum DecisionStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ReviewerRole {
    Reviewer,
    Readonly,
    SuperAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum EmailType {
    Acceptance,
    Rejection,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Acceptance => "acceptance",
            EmailType::Rejection => "rejection",
        }
    }

    pub fn decision(&self) -> DecisionStatus {
        match self {
            EmailType::Acceptance => DecisionStatus::Accepted,
            EmailType::Rejection => DecisionStatus::Rejected,
        }
    }

    pub fn other(&self) -> EmailType {
        match self {
            EmailType::Acceptance => EmailType::Rejection,
            EmailType::Rejection => EmailType::Acceptance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ScheduledEmailStatus {
    Pending,
    Sent,
    Cancelled,
    Failed,
}

impl ScheduledEmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledEmailStatus::Pending => "pending",
            ScheduledEmailStatus::Sent => "sent",
            ScheduledEmailStatus::Cancelled => "cancelled",
            ScheduledEmailStatus::Failed => "failed",
        }
    }

    /// Only pending emails move, and only to a terminal state.
    pub fn can_transition_to(&self, next: ScheduledEmailStatus) -> bool {
        matches!(
            (self, next),
            (
                ScheduledEmailStatus::Pending,
                ScheduledEmailStatus::Sent
                    | ScheduledEmailStatus::Cancelled
                    | ScheduledEmailStatus::Failed
            )
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    /// Nil in anonymized views, where it is left out of the JSON.
    #[serde(skip_serializing_if = "Uuid::is_nil")]
    pub speaker_id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    #[sqlx(rename = "abstract")]
    pub abstract_text: String,
    pub submission_type: SubmissionType,
    pub talk_level: TalkLevel,
    pub status: SubmissionStatus,
    pub decision_status: Option<DecisionStatus>,
    pub outline: Option<String>,
    pub additional_notes: Option<String>,
    pub workshop_duration_hours: Option<i32>,
    pub workshop_max_participants: Option<i32>,
    pub workshop_expectations: Option<String>,
    pub travel_assistance_requested: bool,
    pub travel_origin: Option<String>,
    pub slides_url: Option<String>,
    pub recording_url: Option<String>,
    pub decision_email_sent_at: Option<DateTime<Utc>>,
    pub acceptance_email_scheduled_for: Option<DateTime<Utc>>,
    pub acceptance_scheduled_id: Option<Uuid>,
    pub rejection_email_scheduled_for: Option<DateTime<Utc>>,
    pub rejection_scheduled_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn decision_fields(&self) -> DecisionFields {
        DecisionFields {
            decision_status: self.decision_status,
            decision_email_sent_at: self.decision_email_sent_at,
            acceptance_email_scheduled_for: self.acceptance_email_scheduled_for,
            acceptance_scheduled_id: self.acceptance_scheduled_id,
            rejection_email_scheduled_for: self.rejection_email_scheduled_for,
            rejection_scheduled_id: self.rejection_scheduled_id,
        }
    }
}

/// Denormalized decision-email columns on `cfp_submissions`, written as one
/// unit by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionFields {
    pub decision_status: Option<DecisionStatus>,
    pub decision_email_sent_at: Option<DateTime<Utc>>,
    pub acceptance_email_scheduled_for: Option<DateTime<Utc>>,
    pub acceptance_scheduled_id: Option<Uuid>,
    pub rejection_email_scheduled_for: Option<DateTime<Utc>>,
    pub rejection_scheduled_id: Option<Uuid>,
}

impl DecisionFields {
    pub fn set_scheduled(
        &mut self,
        email_type: EmailType,
        scheduled_for: Option<DateTime<Utc>>,
        scheduled_id: Option<Uuid>,
    ) {
        match email_type {
            EmailType::Acceptance => {
                self.acceptance_email_scheduled_for = scheduled_for;
                self.acceptance_scheduled_id = scheduled_id;
            }
            EmailType::Rejection => {
                self.rejection_email_scheduled_for = scheduled_for;
                self.rejection_scheduled_id = scheduled_id;
            }
        }
    }

    pub fn scheduled_for(&self, email_type: EmailType) -> Option<DateTime<Utc>> {
        match email_type {
            EmailType::Acceptance => self.acceptance_email_scheduled_for,
            EmailType::Rejection => self.rejection_email_scheduled_for,
        }
    }

    pub fn scheduled_id(&self, email_type: EmailType) -> Option<Uuid> {
        match email_type {
            EmailType::Acceptance => self.acceptance_scheduled_id,
            EmailType::Rejection => self.rejection_scheduled_id,
        }
    }

    /// Drops `email_type`'s schedule. The shared decision columns belong to
    /// the other type while it is still scheduled, and are only reset
    /// (`decision_status` too when `reset_status`) once neither type is.
    pub fn withdraw(&mut self, email_type: EmailType, reset_status: bool) {
        self.set_scheduled(email_type, None, None);
        if self.scheduled_id(email_type.other()).is_some() {
            return;
        }
        self.decision_email_sent_at = None;
        if reset_status {
            self.decision_status = None;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubmission {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub submission_type: SubmissionType,
    pub talk_level: TalkLevel,
    #[serde(default)]
    pub outline: Option<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
    #[serde(default)]
    pub workshop_duration_hours: Option<i32>,
    #[serde(default)]
    pub workshop_max_participants: Option<i32>,
    #[serde(default)]
    pub workshop_expectations: Option<String>,
    #[serde(default)]
    pub travel_assistance_requested: bool,
    #[serde(default)]
    pub travel_origin: Option<String>,
    /// Saved as a draft when false.
    #[serde(default = "default_true")]
    pub submit: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOrder {
    #[default]
    Newest,
    Oldest,
    Title,
}

/// Typed listing query over `cfp_submissions`.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub statuses: Vec<SubmissionStatus>,
    pub submission_type: Option<SubmissionType>,
    pub search: Option<String>,
    pub tag_id: Option<Uuid>,
    pub speaker_id: Option<Uuid>,
    pub order: SubmissionOrder,
    pub page: i64,
    pub per_page: i64,
}

impl SubmissionFilter {
    pub const MAX_PER_PAGE: i64 = 100;
    pub const DEFAULT_PER_PAGE: i64 = 25;

    /// Page is 1-indexed; out-of-range values are pulled back in.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.per_page = if self.per_page <= 0 {
            Self::DEFAULT_PER_PAGE
        } else {
            self.per_page.min(Self::MAX_PER_PAGE)
        };
        self.search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    pub fn offset(&self) -> i64 {
        page_offset(self.page, self.per_page)
    }
}

/// Row offset of a 1-indexed page. Saturates instead of overflowing on
/// absurd page numbers, which then simply come back empty.
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(per_page.max(0))
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Speaker {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub twitter_handle: Option<String>,
    pub github_handle: Option<String>,
    pub linkedin_url: Option<String>,
    pub website_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Speaker {
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeakerProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub twitter_handle: Option<String>,
    pub github_handle: Option<String>,
    pub linkedin_url: Option<String>,
    pub website_url: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub reviewer_id: Uuid,
    pub score_overall: i32,
    pub score_relevance: Option<i32>,
    pub score_technical_depth: Option<i32>,
    pub score_clarity: Option<i32>,
    pub score_diversity: Option<i32>,
    pub private_notes: Option<String>,
    pub feedback_to_speaker: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewScores {
    pub score_overall: i32,
    #[serde(default)]
    pub score_relevance: Option<i32>,
    #[serde(default)]
    pub score_technical_depth: Option<i32>,
    #[serde(default)]
    pub score_clarity: Option<i32>,
    #[serde(default)]
    pub score_diversity: Option<i32>,
    #[serde(default)]
    pub private_notes: Option<String>,
    #[serde(default)]
    pub feedback_to_speaker: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub submission_id: Uuid,
    pub reviewer_id: Uuid,
    pub scores: ReviewScores,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reviewer {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub name: Option<String>,
    pub role: ReviewerRole,
    pub can_see_speaker_identity: bool,
    pub is_active: bool,
    pub invited_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Reviewer {
    pub fn is_super_admin(&self) -> bool {
        self.role == ReviewerRole::SuperAdmin
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReviewer {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_role")]
    pub role: ReviewerRole,
    #[serde(default)]
    pub can_see_speaker_identity: bool,
}

fn default_role() -> ReviewerRole {
    ReviewerRole::Reviewer
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewerUpdate {
    pub name: Option<String>,
    pub role: Option<ReviewerRole>,
    pub can_see_speaker_identity: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub is_suggested: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagUpdate {
    pub name: Option<String>,
    pub is_suggested: Option<bool>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScheduledEmail {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub email_type: EmailType,
    pub scheduled_for: DateTime<Utc>,
    pub status: ScheduledEmailStatus,
    pub provider_email_id: Option<String>,
    pub recipient_email: String,
    pub recipient_name: String,
    pub talk_title: String,
    pub coupon_code: Option<String>,
    pub coupon_discount_percent: Option<i32>,
    pub coupon_expires_at: Option<DateTime<Utc>>,
    pub include_feedback: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewScheduledEmail {
    pub submission_id: Uuid,
    pub email_type: EmailType,
    pub scheduled_for: DateTime<Utc>,
    pub recipient_email: String,
    pub recipient_name: String,
    pub talk_title: String,
    pub coupon_code: Option<String>,
    pub coupon_discount_percent: Option<i32>,
    pub coupon_expires_at: Option<DateTime<Utc>>,
    pub include_feedback: bool,
}

/// A move out of `pending`. The store applies it only if the row is still
/// pending.
#[derive(Debug, Clone)]
pub struct EmailTransition {
    pub to: ScheduledEmailStatus,
    pub at: DateTime<Utc>,
    pub provider_email_id: Option<String>,
    pub error_message: Option<String>,
}

impl EmailTransition {
    pub fn sent(at: DateTime<Utc>, provider_email_id: Option<String>) -> Self {
        Self {
            to: ScheduledEmailStatus::Sent,
            at,
            provider_email_id,
            error_message: None,
        }
    }

    pub fn cancelled(at: DateTime<Utc>) -> Self {
        Self {
            to: ScheduledEmailStatus::Cancelled,
            at,
            provider_email_id: None,
            error_message: None,
        }
    }

    pub fn failed(at: DateTime<Utc>, error_message: impl Into<String>) -> Self {
        Self {
            to: ScheduledEmailStatus::Failed,
            at,
            provider_email_id: None,
            error_message: Some(error_message.into()),
        }
    }
}
