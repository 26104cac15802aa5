use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::{data, Data};
use crate::error::{Error, Result};
use crate::state::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Delivery event as posted by the email provider.
#[derive(Debug, Deserialize)]
pub struct EmailEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: EmailEventData,
}

#[derive(Debug, Deserialize)]
struct EmailEventData {
    email_id: String,
    #[serde(default)]
    bounce: Option<BounceDetail>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BounceDetail {
    message: Option<String>,
}

fn check_secret(expected: Option<&str>, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        return Err(Error::Unauthenticated);
    }
    Ok(())
}

/// Unknown emails and rows already settled are acknowledged so the provider
/// stops retrying.
pub async fn email_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(event): Json<EmailEvent>,
) -> Result<Json<Data<Value>>> {
    check_secret(state.config.webhook_secret.as_deref(), &headers)?;

    let email_id = event.data.email_id.as_str();
    let outcome = match event.event_type.as_str() {
        "email.sent" | "email.delivered" => state.dispatcher.mark_sent(email_id).await,
        "email.bounced" | "email.failed" => {
            let reason = event
                .data
                .bounce
                .and_then(|b| b.message)
                .or(event.data.error)
                .unwrap_or_else(|| event.event_type.clone());
            state.dispatcher.mark_failed(email_id, &reason).await
        }
        other => {
            debug!(event_type = other, "ignoring email event");
            return Ok(data(json!({ "handled": false })));
        }
    };

    match outcome {
        Ok(email) => Ok(data(json!({ "handled": true, "status": email.status }))),
        Err(e @ (Error::NotFound(_) | Error::InvalidState(_))) => {
            info!(
                provider_email_id = email_id,
                event_type = %event.event_type,
                reason = %e,
                "email event acknowledged without change"
            );
            Ok(data(json!({ "handled": false })))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn secret_is_optional_but_enforced_when_set() {
        let mut headers = HeaderMap::new();
        assert!(check_secret(None, &headers).is_ok());
        assert!(matches!(
            check_secret(Some("s3cret"), &headers).unwrap_err(),
            Error::Unauthenticated
        ));
        headers.insert(WEBHOOK_SECRET_HEADER, HeaderValue::from_static("wrong"));
        assert!(check_secret(Some("s3cret"), &headers).is_err());
        headers.insert(WEBHOOK_SECRET_HEADER, HeaderValue::from_static("s3cret"));
        assert!(check_secret(Some("s3cret"), &headers).is_ok());
    }

    #[test]
    fn bounce_payload_parses() {
        let event: EmailEvent = serde_json::from_value(json!({
            "type": "email.bounced",
            "created_at": "2026-10-16T10:00:00Z",
            "data": { "email_id": "abc", "bounce": { "message": "mailbox full" } }
        }))
        .unwrap();
        assert_eq!(event.event_type, "email.bounced");
        assert_eq!(event.data.email_id, "abc");
        assert_eq!(event.data.bounce.and_then(|b| b.message).as_deref(), Some("mailbox full"));
    }
}
