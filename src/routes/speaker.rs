use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

use super::{data, CurrentSpeaker, Data, SignedInUser};
use crate::cfp::identity::{self, LinkedIdentity};
use crate::cfp::submissions;
use crate::db::{NewSubmission, Speaker, SpeakerProfile, Submission};
use crate::error::{Error, Result};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LinkRequest {
    user_id: uuid::Uuid,
    #[serde(default)]
    email: Option<String>,
}

/// Called once the upstream sign-in completes. The email comes from the
/// signed-in session; a body email, if sent, must agree with it.
pub async fn link_identity(
    State(state): State<Arc<AppState>>,
    caller: SignedInUser,
    Json(body): Json<LinkRequest>,
) -> Result<Json<Data<LinkedIdentity>>> {
    if body.user_id != caller.id {
        return Err(Error::access_denied("cannot link another user's identity"));
    }
    let email = identity::normalize_email(&caller.email)?;
    if let Some(claimed) = body.email.as_deref() {
        if identity::normalize_email(claimed)? != email {
            return Err(Error::access_denied(
                "email does not match the signed-in account",
            ));
        }
    }
    let linked = identity::link_identity(state.store.as_ref(), caller.id, &email).await?;
    Ok(data(linked))
}

pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    CurrentSpeaker(speaker): CurrentSpeaker,
) -> Result<Json<Data<Vec<Submission>>>> {
    let subs = submissions::list_own_submissions(state.store.as_ref(), &speaker).await?;
    Ok(data(subs))
}

pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    CurrentSpeaker(speaker): CurrentSpeaker,
    Json(input): Json<NewSubmission>,
) -> Result<(StatusCode, Json<Data<Submission>>)> {
    let submission = submissions::create_submission(state.store.as_ref(), &speaker, input).await?;
    Ok((StatusCode::CREATED, data(submission)))
}

pub async fn get_profile(CurrentSpeaker(speaker): CurrentSpeaker) -> Json<Data<Speaker>> {
    data(speaker)
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    CurrentSpeaker(speaker): CurrentSpeaker,
    Json(profile): Json<SpeakerProfile>,
) -> Result<Json<Data<Speaker>>> {
    let speaker = submissions::update_profile(state.store.as_ref(), &speaker, profile).await?;
    Ok(data(speaker))
}
