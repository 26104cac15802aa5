//! Caller identity. Session handling lives upstream; requests arrive with the
//! authenticated user's id in `X-User-Id`, and the sign-in flow also carries
//! the verified address in `X-User-Email`.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::prelude::*;
use crate::db::{Reviewer, Speaker};
use crate::error::{Error, Result};
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

fn user_id(parts: &Parts) -> Result<Uuid> {
    parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or(Error::Unauthenticated)
}

/// An active reviewer of any role.
pub struct CurrentReviewer(pub Reviewer);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentReviewer {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let user_id = user_id(parts)?;
        let reviewer = state
            .store
            .get_reviewer_by_user(user_id)
            .await?
            .ok_or_else(|| Error::access_denied("not a reviewer"))?;
        if !reviewer.is_active {
            return Err(Error::access_denied("reviewer account is inactive"));
        }
        Ok(Self(reviewer))
    }
}

pub struct AdminReviewer(pub Reviewer);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminReviewer {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let CurrentReviewer(reviewer) = CurrentReviewer::from_request_parts(parts, state).await?;
        if !reviewer.is_super_admin() {
            return Err(Error::access_denied("admin role required"));
        }
        Ok(Self(reviewer))
    }
}

/// The speaker record linked to the caller through `/api/auth/link`.
pub struct CurrentSpeaker(pub Speaker);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentSpeaker {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let user_id = user_id(parts)?;
        state
            .store
            .get_speaker_by_user(user_id)
            .await?
            .map(Self)
            .ok_or_else(|| Error::access_denied("no speaker profile is linked to this account"))
    }
}

/// Caller id and verified email, for the sign-in hook that runs before any
/// record is linked.
pub struct SignedInUser {
    pub id: Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for SignedInUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &Arc<AppState>) -> Result<Self> {
        let id = user_id(parts)?;
        let email = parts
            .headers
            .get(USER_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(Error::Unauthenticated)?;
        Ok(Self {
            id,
            email: email.to_string(),
        })
    }
}
