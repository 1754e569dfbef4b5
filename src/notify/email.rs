use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::DigestSender;
use crate::lead::Lead;

/// Plain-text SMTP digest of a run's best leads.
pub struct EmailDigest {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailDigest {
    /// `Ok(None)` when `SMTP_HOST` is unset; errors when it is set but the
    /// rest of the SMTP env is missing or malformed.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(host) = std::env::var("SMTP_HOST") else {
            return Ok(None);
        };
        let user = std::env::var("SMTP_USER").context("SMTP_USER missing")?;
        let pass = std::env::var("SMTP_PASS").context("SMTP_PASS missing")?;
        let from_addr = std::env::var("NOTIFY_EMAIL_FROM").context("NOTIFY_EMAIL_FROM missing")?;
        let to_addr = std::env::var("NOTIFY_EMAIL_TO").context("NOTIFY_EMAIL_TO missing")?;

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        let from = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = to_addr.parse().context("invalid NOTIFY_EMAIL_TO")?;

        Ok(Some(Self { mailer, from, to }))
    }
}

pub(crate) fn digest_subject(leads: &[Lead]) -> String {
    match leads.first() {
        Some(top) => format!(
            "{} new lead(s): {} @ {}",
            leads.len(),
            top.title,
            top.company
        ),
        None => "No new leads".to_string(),
    }
}

pub(crate) fn digest_body(leads: &[Lead]) -> String {
    let mut body = String::new();
    for (i, l) in leads.iter().enumerate() {
        body.push_str(&format!(
            "{}. {} @ {} ({:.1}, {})\n   {}\n   {}\n\n",
            i + 1,
            l.title,
            l.company,
            l.score,
            l.category,
            if l.location.raw.is_empty() { "location n/a" } else { l.location.raw.as_str() },
            l.url.as_deref().unwrap_or("no link"),
        ));
    }
    body
}

#[async_trait::async_trait]
impl DigestSender for EmailDigest {
    async fn send_digest(&self, leads: &[Lead]) -> Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(digest_subject(leads))
            .header(header::ContentType::TEXT_PLAIN)
            .body(digest_body(leads))
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::RawPosting;
    use crate::normalize::normalize;

    #[test]
    fn digest_lists_leads_in_order() {
        let a = normalize(&RawPosting::new("lever", "Backend Engineer").with_company("Acme")).unwrap();
        let b = normalize(
            &RawPosting::new("lever", "Data Engineer")
                .with_company("Beta")
                .with_url("https://jobs.lever.co/beta/1"),
        )
        .unwrap();
        let leads = vec![a, b];
        assert_eq!(digest_subject(&leads), "2 new lead(s): Backend Engineer @ Acme");
        let body = digest_body(&leads);
        assert!(body.starts_with("1. Backend Engineer @ Acme"));
        assert!(body.contains("2. Data Engineer @ Beta"));
        assert!(body.contains("https://jobs.lever.co/beta/1"));
    }
}
