use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cfp_review::email::{EmailProvider, OutboundEmail, ResendClient};
use cfp_review::Error;

fn email() -> OutboundEmail {
    OutboundEmail {
        from: "RustConf CFP <cfp@example.com>".into(),
        to: vec!["ada@example.com".into()],
        reply_to: Some("program@example.com".into()),
        subject: "Your talk was accepted to RustConf!".into(),
        html: "<p>Hi Ada</p>".into(),
        scheduled_at: Some(Utc.with_ymd_and_hms(2026, 10, 16, 12, 30, 0).unwrap()),
    }
}

fn client(server: &MockServer) -> ResendClient {
    ResendClient::with_config("re_test", server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn send_posts_message_and_returns_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_test"))
        .and(body_partial_json(json!({
            "from": "RustConf CFP <cfp@example.com>",
            "to": ["ada@example.com"],
            "reply_to": "program@example.com",
            "subject": "Your talk was accepted to RustConf!",
            "scheduled_at": "2026-10-16T12:30:00Z"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "em_123" })))
        .expect(1)
        .mount(&server)
        .await;

    let id = client(&server).send(&email()).await.unwrap();
    assert_eq!(id, "em_123");
}

#[tokio::test]
async fn provider_errors_carry_status_and_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "statusCode": 422,
            "name": "validation_error",
            "message": "Invalid `to` field."
        })))
        .mount(&server)
        .await;

    let err = client(&server).send(&email()).await.unwrap_err();
    match err {
        Error::EmailProvider(msg) => {
            assert!(msg.starts_with("422"), "{}", msg);
            assert!(msg.contains("Invalid `to` field."), "{}", msg);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn cancel_hits_cancel_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails/em_123/cancel"))
        .and(header("authorization", "Bearer re_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "em_123" })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).cancel("em_123").await.unwrap();
}

#[tokio::test]
async fn cancel_of_sent_email_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails/em_sent/cancel"))
        .respond_with(ResponseTemplate::new(400).set_body_string("already sent"))
        .mount(&server)
        .await;

    let err = client(&server).cancel("em_sent").await.unwrap_err();
    assert!(matches!(err, Error::EmailProvider(ref m) if m.contains("already sent")));
}
