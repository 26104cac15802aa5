//! Fixtures shared by unit tests.

use chrono::Utc;
use uuid::Uuid;

use crate::db::{
    MemoryStore, Reviewer, ReviewerRole, Speaker, Submission, SubmissionStatus, SubmissionType,
    TalkLevel,
};

pub fn reviewer(role: ReviewerRole) -> Reviewer {
    let id = Uuid::new_v4();
    Reviewer {
        id,
        user_id: Some(Uuid::new_v4()),
        email: format!("reviewer-{}@example.com", id.simple()),
        name: Some("Test Reviewer".into()),
        role,
        can_see_speaker_identity: false,
        is_active: true,
        invited_at: Utc::now(),
        accepted_at: Some(Utc::now()),
    }
}

pub fn seed_reviewer(store: &MemoryStore, role: ReviewerRole) -> Reviewer {
    let r = reviewer(role);
    store.put_reviewer(r.clone());
    r
}

pub fn seed_speaker(store: &MemoryStore) -> Speaker {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let speaker = Speaker {
        id,
        user_id: Some(Uuid::new_v4()),
        email: format!("speaker-{}@example.com", id.simple()),
        first_name: Some("Ada".into()),
        last_name: Some("Lovelace".into()),
        bio: Some("Writes programs for engines.".into()),
        company: Some("Analytical Ltd".into()),
        job_title: None,
        twitter_handle: None,
        github_handle: None,
        linkedin_url: None,
        website_url: None,
        created_at: now,
        updated_at: now,
    };
    store.put_speaker(speaker.clone());
    speaker
}

pub fn seed_submission(store: &MemoryStore, status: SubmissionStatus) -> Submission {
    let speaker = seed_speaker(store);
    let now = Utc::now();
    let submission = Submission {
        id: Uuid::new_v4(),
        speaker_id: speaker.id,
        title: "Zero-copy parsing in practice".into(),
        abstract_text: "How we removed allocations from a hot path.".into(),
        submission_type: SubmissionType::Standard,
        talk_level: TalkLevel::Intermediate,
        status,
        decision_status: None,
        outline: None,
        additional_notes: None,
        workshop_duration_hours: None,
        workshop_max_participants: None,
        workshop_expectations: None,
        travel_assistance_requested: false,
        travel_origin: None,
        slides_url: Some("https://slides.example.com/zero-copy".into()),
        recording_url: Some("https://video.example.com/zero-copy".into()),
        decision_email_sent_at: None,
        acceptance_email_scheduled_for: None,
        acceptance_scheduled_id: None,
        rejection_email_scheduled_for: None,
        rejection_scheduled_id: None,
        created_at: now,
        updated_at: now,
    };
    store.put_submission(submission.clone());
    submission
}
