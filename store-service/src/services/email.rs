use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_verification_code(&self, to_email: &str, code: &str) -> Result<(), AppError>;
}

/// Picks the SMTP relay when a host is configured, otherwise logs mail locally.
pub fn provider_from_config(config: &SmtpConfig) -> Result<Arc<dyn EmailProvider>, AppError> {
    if config.host.is_empty() {
        tracing::warn!("SMTP_HOST not set; outgoing mail will only be logged");
        return Ok(Arc::new(LogEmailService));
    }
    Ok(Arc::new(EmailService::new(config)?))
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(config.user.clone(), config.password.expose_secret().clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from.clone(),
        })
    }

    async fn send_email(&self, to_email: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| AppError::InternalError(e.into()))?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| AppError::BadRequest(e.into()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(strip_tags(html_body)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        // SMTP transport is blocking
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for EmailService {
    async fn send_verification_code(&self, to_email: &str, code: &str) -> Result<(), AppError> {
        self.send_email(to_email, "Verification Code", &verification_html(code))
            .await
    }
}

pub fn verification_html(code: &str) -> String {
    format!("<p><b>{}</b></p>", code)
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Development fallback when no relay is configured.
#[derive(Clone)]
pub struct LogEmailService;

#[async_trait]
impl EmailProvider for LogEmailService {
    async fn send_verification_code(&self, to_email: &str, _code: &str) -> Result<(), AppError> {
        tracing::info!(to = %to_email, "Verification code issued (mail delivery disabled)");
        Ok(())
    }
}

/// Captures outgoing codes in memory for tests.
#[derive(Clone, Default)]
pub struct MockEmailService {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockEmailService {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_verification_code(&self, to_email: &str, code: &str) -> Result<(), AppError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((to_email.to_string(), code.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_body_bolds_the_code() {
        assert_eq!(verification_html("Ab12Cd"), "<p><b>Ab12Cd</b></p>");
        assert_eq!(strip_tags(&verification_html("Ab12Cd")), "Ab12Cd");
    }

    #[tokio::test]
    async fn mock_records_codes() {
        let mock = MockEmailService::default();
        mock.send_verification_code("a@b.com", "XYZ123").await.unwrap();
        assert_eq!(mock.sent(), vec![("a@b.com".to_string(), "XYZ123".to_string())]);
    }
}
