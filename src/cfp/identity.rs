//! Links an authenticated user to the speaker and reviewer records that
//! share their email.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::prelude::*;
use crate::db::{Reviewer, Speaker};
use crate::error::{Error, Result};

pub const EMAIL_LINKED_ELSEWHERE: &str = "This email is already linked to a different account";

#[derive(Debug, Clone, Serialize)]
pub struct LinkedIdentity {
    pub speaker: Speaker,
    pub reviewer: Option<Reviewer>,
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").expect("email pattern is valid")
    })
}

/// Trimmed, lowercased email, or a validation error.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if !email_re().is_match(&email) {
        return Err(Error::validation("A valid email address is required"));
    }
    Ok(email)
}

pub async fn link_identity(store: &dyn Store, user_id: Uuid, email: &str) -> Result<LinkedIdentity> {
    let email = normalize_email(email)?;

    let speaker = match store.get_speaker_by_user(user_id).await? {
        Some(existing) if existing.email == email => existing,
        Some(existing) => {
            warn!(user_id = %user_id, speaker_id = %existing.id, "link attempted with another email");
            return Err(Error::access_denied(EMAIL_LINKED_ELSEWHERE));
        }
        None => {
            let speaker = store.upsert_speaker_for_user(user_id, &email).await?;
            if speaker.user_id != Some(user_id) {
                warn!(user_id = %user_id, speaker_id = %speaker.id, "email linked to another user");
                return Err(Error::access_denied(EMAIL_LINKED_ELSEWHERE));
            }
            speaker
        }
    };

    let reviewer = store.link_reviewer_user(&email, user_id).await?;
    info!(
        user_id = %user_id,
        speaker_id = %speaker.id,
        reviewer_id = ?reviewer.as_ref().map(|r| r.id),
        "identity linked"
    );
    Ok(LinkedIdentity { speaker, reviewer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, NewReviewer, ReviewerRole};

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["", "ada", "@example.com", "ada@localhost", "a da@example.com"] {
            assert!(normalize_email(bad).is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn first_login_creates_speaker_and_repeat_login_reuses_it() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        let first = link_identity(&store, user, "ada@example.com").await.unwrap();
        let again = link_identity(&store, user, "ADA@example.com").await.unwrap();
        assert_eq!(first.speaker.id, again.speaker.id);
        assert_eq!(first.speaker.user_id, Some(user));
        assert!(first.reviewer.is_none());
    }

    #[tokio::test]
    async fn email_owned_by_another_user_is_denied() {
        let store = MemoryStore::new();
        link_identity(&store, Uuid::new_v4(), "ada@example.com").await.unwrap();

        let err = link_identity(&store, Uuid::new_v4(), "ada@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(ref m) if m.contains(EMAIL_LINKED_ELSEWHERE)));
    }

    #[tokio::test]
    async fn pending_reviewer_invite_is_accepted_on_login() {
        let store = MemoryStore::new();
        store
            .create_reviewer(&NewReviewer {
                email: "grace@example.com".into(),
                name: None,
                role: ReviewerRole::Reviewer,
                can_see_speaker_identity: false,
            })
            .await
            .unwrap();

        let user = Uuid::new_v4();
        let linked = link_identity(&store, user, "Grace@Example.com").await.unwrap();
        let reviewer = linked.reviewer.unwrap();
        assert_eq!(reviewer.user_id, Some(user));
        let accepted = reviewer.accepted_at.unwrap();

        let relinked = link_identity(&store, user, "grace@example.com").await.unwrap();
        assert_eq!(relinked.reviewer.unwrap().accepted_at, Some(accepted));
    }

    #[tokio::test]
    async fn linked_user_cannot_claim_an_invite_for_another_email() {
        let store = MemoryStore::new();
        let mallory = Uuid::new_v4();
        link_identity(&store, mallory, "mallory@example.com").await.unwrap();
        let invite = store
            .create_reviewer(&NewReviewer {
                email: "chair@example.com".into(),
                name: None,
                role: ReviewerRole::SuperAdmin,
                can_see_speaker_identity: true,
            })
            .await
            .unwrap()
            .unwrap();

        let err = link_identity(&store, mallory, "chair@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(ref m) if m.contains(EMAIL_LINKED_ELSEWHERE)));
        assert!(store.get_reviewer_by_user(mallory).await.unwrap().is_none());
        let invite = store.get_reviewer(invite.id).await.unwrap().unwrap();
        assert!(invite.user_id.is_none());
    }
}
