use tracing::info;
use uuid::Uuid;

use crate::db::prelude::*;
use crate::db::{Tag, TagUpdate};
use crate::error::{Error, Result};

pub const TAG_EXISTS: &str = "Tag already exists";
const MAX_TAG_LEN: usize = 50;

fn normalize_name(name: &str) -> Result<String> {
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return Err(Error::validation("Tag name is required"));
    }
    if name.chars().count() > MAX_TAG_LEN {
        return Err(Error::validation(format!(
            "Tag name must be at most {} characters",
            MAX_TAG_LEN
        )));
    }
    Ok(name)
}

pub async fn list_tags(store: &dyn Store) -> Result<Vec<Tag>> {
    store.list_tags().await
}

pub async fn create_tag(store: &dyn Store, name: &str, is_suggested: bool) -> Result<Tag> {
    let name = normalize_name(name)?;
    let tag = store
        .create_tag(&name, is_suggested)
        .await?
        .ok_or_else(|| Error::Conflict(TAG_EXISTS.to_string()))?;
    info!(tag_id = %tag.id, name = %tag.name, "tag created");
    Ok(tag)
}

pub async fn update_tag(store: &dyn Store, id: Uuid, mut update: TagUpdate) -> Result<Tag> {
    if let Some(name) = update.name.as_deref() {
        update.name = Some(normalize_name(name)?);
    }
    match store.update_tag(id, &update).await? {
        None => Err(Error::not_found("Tag")),
        Some(None) => Err(Error::Conflict(TAG_EXISTS.to_string())),
        Some(Some(tag)) => Ok(tag),
    }
}

pub async fn delete_tag(store: &dyn Store, id: Uuid) -> Result<()> {
    if !store.delete_tag(id).await? {
        return Err(Error::not_found("Tag"));
    }
    info!(tag_id = %id, "tag deleted");
    Ok(())
}

/// Replaces the submission's tags. Every id must name an existing tag.
pub async fn set_submission_tags(
    store: &dyn Store,
    submission_id: Uuid,
    tag_ids: &[Uuid],
) -> Result<Vec<Tag>> {
    store
        .get_submission(submission_id)
        .await?
        .ok_or_else(|| Error::not_found("Submission"))?;

    let mut ids = tag_ids.to_vec();
    ids.sort();
    ids.dedup();
    for id in &ids {
        if store.get_tag(*id).await?.is_none() {
            return Err(Error::validation(format!("Unknown tag: {}", id)));
        }
    }

    store.set_submission_tags(submission_id, &ids).await?;
    store.tags_for_submission(submission_id).await
}
