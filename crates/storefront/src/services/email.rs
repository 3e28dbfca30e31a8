//! Transactional email.
//!
//! Messages are rendered from Askama templates (HTML and plain text) and sent
//! through an SMTP relay with lettre. Without `SMTP_HOST` the service runs in
//! log-only mode and records each message with tracing instead.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::purchase::{PurchaseDetail, PurchaseLine};

#[derive(Template)]
#[template(path = "emails/welcome.html")]
struct WelcomeEmailHtml<'a> {
    name: &'a str,
    site_url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/welcome.txt")]
struct WelcomeEmailText<'a> {
    name: &'a str,
    site_url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/purchase_confirmation.html")]
struct PurchaseEmailHtml<'a> {
    name: &'a str,
    number: &'a str,
    lines: &'a [PurchaseLine],
    total: String,
    shipping_address: &'a str,
    purchase_url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/purchase_confirmation.txt")]
struct PurchaseEmailText<'a> {
    name: &'a str,
    number: &'a str,
    lines: &'a [PurchaseLine],
    total: String,
    shipping_address: &'a str,
    purchase_url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/sale_notice.html")]
struct SaleEmailHtml<'a> {
    name: &'a str,
    number: &'a str,
    lines: &'a [&'a PurchaseLine],
    buyer_name: &'a str,
    shipping_address: &'a str,
    sales_url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/sale_notice.txt")]
struct SaleEmailText<'a> {
    name: &'a str,
    number: &'a str,
    lines: &'a [&'a PurchaseLine],
    buyer_name: &'a str,
    shipping_address: &'a str,
    sales_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
    base_url: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, base_url: &str) -> Result<Self, SmtpError> {
        let mailer = match &config.smtp {
            Some(smtp) => {
                let mut builder =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?.port(smtp.port);
                if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
                    builder = builder.credentials(Credentials::new(
                        username.clone(),
                        password.expose_secret().to_string(),
                    ));
                }
                tracing::info!(host = %smtp.host, port = smtp.port, "SMTP email delivery enabled");
                Some(builder.build())
            }
            None => {
                tracing::info!("SMTP_HOST not set, emails will only be logged");
                None
            }
        };

        Ok(Self {
            mailer,
            from_address: config.from.clone(),
            base_url: base_url.to_owned(),
        })
    }

    /// A service that never talks to a relay.
    #[must_use]
    pub fn log_only(from_address: &str, base_url: &str) -> Self {
        Self {
            mailer: None,
            from_address: from_address.to_owned(),
            base_url: base_url.to_owned(),
        }
    }

    /// Render the welcome email for a new account.
    ///
    /// # Errors
    ///
    /// Returns error if a template fails to render.
    pub fn welcome(&self, to: &str, name: &str) -> Result<OutgoingEmail, EmailError> {
        let site_url = self.base_url.as_str();
        Ok(OutgoingEmail {
            to: to.to_owned(),
            subject: "Welcome to WalaDaw".to_owned(),
            text: WelcomeEmailText { name, site_url }.render()?,
            html: WelcomeEmailHtml { name, site_url }.render()?,
        })
    }

    /// Render the buyer's purchase confirmation.
    ///
    /// # Errors
    ///
    /// Returns error if a template fails to render.
    pub fn purchase_confirmation(&self, detail: &PurchaseDetail) -> Result<OutgoingEmail, EmailError> {
        let purchase = &detail.purchase;
        let number = purchase.number();
        let purchase_url = format!("{}/purchases/{}", self.base_url, purchase.id);
        Ok(OutgoingEmail {
            to: purchase.buyer_email.to_string(),
            subject: format!("Your WalaDaw purchase {number}"),
            text: PurchaseEmailText {
                name: &purchase.buyer_name,
                number: &number,
                lines: &detail.lines,
                total: purchase.total.to_string(),
                shipping_address: &purchase.shipping_address,
                purchase_url: &purchase_url,
            }
            .render()?,
            html: PurchaseEmailHtml {
                name: &purchase.buyer_name,
                number: &number,
                lines: &detail.lines,
                total: purchase.total.to_string(),
                shipping_address: &purchase.shipping_address,
                purchase_url: &purchase_url,
            }
            .render()?,
        })
    }

    /// Render the notice telling a seller which of their items were bought.
    ///
    /// # Errors
    ///
    /// Returns error if a template fails to render.
    pub fn sale_notice(
        &self,
        to: &str,
        seller_name: &str,
        detail: &PurchaseDetail,
        lines: &[&PurchaseLine],
    ) -> Result<OutgoingEmail, EmailError> {
        let purchase = &detail.purchase;
        let number = purchase.number();
        let sales_url = format!("{}/account/sales", self.base_url);
        Ok(OutgoingEmail {
            to: to.to_owned(),
            subject: format!("You sold an item on WalaDaw ({number})"),
            text: SaleEmailText {
                name: seller_name,
                number: &number,
                lines,
                buyer_name: &purchase.buyer_name,
                shipping_address: &purchase.shipping_address,
                sales_url: &sales_url,
            }
            .render()?,
            html: SaleEmailHtml {
                name: seller_name,
                number: &number,
                lines,
                buyer_name: &purchase.buyer_name,
                shipping_address: &purchase.shipping_address,
                sales_url: &sales_url,
            }
            .render()?,
        })
    }

    /// Deliver a message, or log it when no relay is configured.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or the relay rejects it.
    pub async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let Some(mailer) = &self.mailer else {
            tracing::info!(to = %email.to, subject = %email.subject, "email (log-only)");
            tracing::debug!(body = %email.text, "email body");
            return Ok(());
        };

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )?;

        mailer.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }

    /// Render and send, logging failures instead of returning them.
    pub async fn send_best_effort(&self, rendered: Result<OutgoingEmail, EmailError>) {
        let result = match rendered {
            Ok(email) => self.send(&email).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to send email");
        }
    }
}
