use serde::Serialize;
use std::sync::OnceLock;
use tera::{Context, Tera};

use crate::db::EmailType;
use crate::email::Coupon;
use crate::error::{Error, Result};

const ACCEPTANCE: &str = "email/acceptance.html";
const REJECTION: &str = "email/rejection.html";

static TERA: OnceLock<std::result::Result<Tera, String>> = OnceLock::new();

pub fn get_tera() -> Result<&'static Tera> {
    TERA.get_or_init(|| {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (ACCEPTANCE, include_str!("../templates/email/acceptance.html")),
            (REJECTION, include_str!("../templates/email/rejection.html")),
        ])
        .map_err(|e| e.to_string())?;
        Ok(tera)
    })
    .as_ref()
    .map_err(|e| Error::Internal(format!("failed to load templates: {}", e)))
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionEmailContext {
    pub conference_name: String,
    pub site_url: String,
    pub speaker_first_name: String,
    pub talk_title: String,
    pub submission_type: String,
    pub coupon: Option<Coupon>,
    /// Reviewer comments addressed to the speaker, already trimmed.
    pub feedback: Vec<String>,
    pub review_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub fn render_decision_email(
    email_type: EmailType,
    ctx: &DecisionEmailContext,
) -> Result<RenderedEmail> {
    let (template, subject) = match email_type {
        EmailType::Acceptance => (
            ACCEPTANCE,
            format!("Your talk was accepted to {}!", ctx.conference_name),
        ),
        EmailType::Rejection => (
            REJECTION,
            format!("Your {} submission: {}", ctx.conference_name, ctx.talk_title),
        ),
    };
    let html = get_tera()?.render(template, &Context::from_serialize(ctx)?)?;
    Ok(RenderedEmail { subject, html })
}
