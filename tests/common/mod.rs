#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use cfp_review::build_router;
use cfp_review::config::{Config, EmailConfig};
use cfp_review::db::prelude::*;
use cfp_review::db::{MemoryStore, NewReviewer, ReviewerRole};
use cfp_review::email::{Dispatcher, DryRunProvider, EmailSettings, LocalCouponIssuer};
use cfp_review::routes::{USER_EMAIL_HEADER, USER_ID_HEADER};
use cfp_review::AppState;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<DryRunProvider>,
}

pub fn config(webhook_secret: Option<&str>) -> Config {
    Config {
        database_url: "memory".into(),
        host: "127.0.0.1".into(),
        port: 0,
        email: EmailConfig {
            api_key: None,
            api_base: "http://localhost".into(),
            dry_run: true,
            from: "CFP <cfp@example.com>".into(),
            reply_to: None,
            conference_name: "RustConf".into(),
            site_url: "https://conf.example.com".into(),
            delay_minutes: 30,
        },
        webhook_secret: webhook_secret.map(String::from),
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(config(None))
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(DryRunProvider::new());
        let settings: EmailSettings = config.email.settings();
        assert_eq!(settings.delay, Duration::minutes(30));
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            provider.clone(),
            Arc::new(LocalCouponIssuer),
            settings,
        ));
        let state = Arc::new(AppState {
            store: store.clone(),
            dispatcher,
            config: Arc::new(config),
        });
        Self {
            router: build_router(state),
            store,
            provider,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.request_with_headers(method, uri, user, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Calls the sign-in hook as the upstream proxy would, with `session_email`
    /// as the verified address and `claimed` in the body.
    pub async fn link(&self, user: Uuid, session_email: &str, claimed: &str) -> (StatusCode, Value) {
        self.request_with_headers(
            Method::POST,
            "/api/auth/link",
            Some(user),
            Some(serde_json::json!({ "user_id": user, "email": claimed })),
            &[(USER_EMAIL_HEADER, session_email)],
        )
        .await
    }

    /// Links a fresh user to `email` and returns their id.
    pub async fn sign_in(&self, email: &str) -> Uuid {
        let user = Uuid::new_v4();
        let (status, body) = self.link(user, email, email).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        user
    }

    /// Invites `email` with `role` directly in the store, then signs in.
    pub async fn reviewer(&self, email: &str, role: ReviewerRole) -> Uuid {
        self.store
            .create_reviewer(&NewReviewer {
                email: email.into(),
                name: None,
                role,
                can_see_speaker_identity: false,
            })
            .await
            .unwrap()
            .unwrap();
        self.sign_in(email).await
    }

    /// Signs in a speaker and submits one talk; returns (user, submission id).
    pub async fn submitted_talk(&self, email: &str, title: &str) -> (Uuid, Uuid) {
        let speaker = self.sign_in(email).await;
        let (status, body) = self
            .request(
                Method::POST,
                "/api/speaker/submissions",
                Some(speaker),
                Some(serde_json::json!({
                    "title": title,
                    "abstract": "A walk through the borrow checker.",
                    "submission_type": "standard",
                    "talk_level": "intermediate"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let id = body["data"]["id"].as_str().unwrap().parse().unwrap();
        (speaker, id)
    }
}
