//! Speaker-side operations: submissions and the speaker's own profile.

use tracing::info;

use crate::db::prelude::*;
use crate::db::{
    NewSubmission, Speaker, SpeakerProfile, Submission, SubmissionFilter, SubmissionStatus,
    SubmissionType,
};
use crate::error::{Error, Result};

const MAX_TITLE_LEN: usize = 200;
const MAX_ABSTRACT_LEN: usize = 5000;
const MAX_BIO_LEN: usize = 2000;

fn require_text(name: &str, value: &str, max: usize) -> Result<()> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(Error::validation(format!("{} is required", name)));
    }
    if len > max {
        return Err(Error::validation(format!(
            "{} must be at most {} characters",
            name, max
        )));
    }
    Ok(())
}

pub fn validate_submission(input: &NewSubmission) -> Result<()> {
    require_text("Title", &input.title, MAX_TITLE_LEN)?;
    require_text("Abstract", &input.abstract_text, MAX_ABSTRACT_LEN)?;

    if input.submission_type == SubmissionType::Workshop {
        match input.workshop_duration_hours {
            Some(h) if (1..=8).contains(&h) => {}
            _ => {
                return Err(Error::validation(
                    "Workshops need a duration between 1 and 8 hours",
                ))
            }
        }
        if let Some(max) = input.workshop_max_participants {
            if max < 1 {
                return Err(Error::validation("Workshop capacity must be positive"));
            }
        }
    }
    if input.travel_assistance_requested
        && input.travel_origin.as_deref().map_or(true, |o| o.trim().is_empty())
    {
        return Err(Error::validation(
            "Please tell us where you would travel from",
        ));
    }
    Ok(())
}

pub async fn create_submission(
    store: &dyn Store,
    speaker: &Speaker,
    mut input: NewSubmission,
) -> Result<Submission> {
    validate_submission(&input)?;
    input.title = input.title.trim().to_string();
    input.abstract_text = input.abstract_text.trim().to_string();

    let status = if input.submit {
        SubmissionStatus::Submitted
    } else {
        SubmissionStatus::Draft
    };
    let submission = store.create_submission(speaker.id, &input, status).await?;
    info!(
        submission_id = %submission.id,
        speaker_id = %speaker.id,
        status = status.as_str(),
        "submission created"
    );
    Ok(submission)
}

pub async fn list_own_submissions(store: &dyn Store, speaker: &Speaker) -> Result<Vec<Submission>> {
    let filter = SubmissionFilter {
        speaker_id: Some(speaker.id),
        per_page: SubmissionFilter::MAX_PER_PAGE,
        ..Default::default()
    }
    .normalized();
    Ok(store.list_submissions(&filter).await?.items)
}

/// Unset fields keep their stored value.
pub async fn update_profile(
    store: &dyn Store,
    speaker: &Speaker,
    mut profile: SpeakerProfile,
) -> Result<Speaker> {
    for field in [
        &mut profile.first_name,
        &mut profile.last_name,
        &mut profile.bio,
        &mut profile.company,
        &mut profile.job_title,
        &mut profile.twitter_handle,
        &mut profile.github_handle,
        &mut profile.linkedin_url,
        &mut profile.website_url,
    ] {
        if let Some(value) = field.as_mut() {
            *value = value.trim().to_string();
        }
    }
    if let Some(bio) = &profile.bio {
        if bio.chars().count() > MAX_BIO_LEN {
            return Err(Error::validation(format!(
                "Bio must be at most {} characters",
                MAX_BIO_LEN
            )));
        }
    }
    store
        .update_speaker_profile(speaker.id, &profile)
        .await?
        .ok_or_else(|| Error::not_found("Speaker"))
}
