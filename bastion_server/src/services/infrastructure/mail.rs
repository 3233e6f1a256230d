//! Templated mail over SMTP. Templates are compiled handlebars strings
//! registered at startup; the transport contract keeps the rest of the
//! system unaware of SMTP specifics.

use async_trait::async_trait;
use handlebars::Handlebars;
use lettre::{
  message::{header::ContentType, Mailbox},
  transport::smtp::authentication::Credentials,
  AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use bastion_core::contracts::{mail_templates, MailTransport};
use bastion_core::CoreError;

use crate::config::MailConfig;

const LOGIN_CODE_SUBJECT: &str = "Your sign-in code";
const REGISTER_CODE_SUBJECT: &str = "Finish creating your account";

const LOGIN_CODE_BODY: &str = "\
Hello,

Use this link to sign in:

{{sign_in_url}}?code={{code}}

The code expires in 24 hours. If you did not request it, ignore this mail.
";

const REGISTER_CODE_BODY: &str = "\
Welcome!

Use this link to finish creating your account:

{{sign_up_url}}?code={{code}}

The code expires in 24 hours. If you did not request it, ignore this mail.
";

pub struct SmtpMailTransport {
  transport: AsyncSmtpTransport<Tokio1Executor>,
  templates: Handlebars<'static>,
  from: Mailbox,
}

impl SmtpMailTransport {
  pub fn new(config: &MailConfig) -> Result<Self, CoreError> {
    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
      .map_err(|e| CoreError::Internal(format!("smtp relay setup failed: {}", e)))?
      .port(config.smtp_port);

    if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
      builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    let from: Mailbox = config
      .from
      .parse()
      .map_err(|_| CoreError::Internal(format!("invalid from address: {}", config.from)))?;

    let mut templates = Handlebars::new();
    templates.set_strict_mode(true);
    for (name, body) in [
      (mail_templates::LOGIN_CODE, LOGIN_CODE_BODY),
      (mail_templates::REGISTER_CODE, REGISTER_CODE_BODY),
    ] {
      templates
        .register_template_string(name, body)
        .map_err(|e| CoreError::Internal(format!("template {} failed to compile: {}", name, e)))?;
    }

    Ok(Self {
      transport: builder.build(),
      templates,
      from,
    })
  }

  fn subject_for(template: &str) -> &'static str {
    match template {
      mail_templates::LOGIN_CODE => LOGIN_CODE_SUBJECT,
      _ => REGISTER_CODE_SUBJECT,
    }
  }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
  async fn send_templated(
    &self,
    to: &str,
    template: &str,
    variables: serde_json::Value,
  ) -> Result<(), CoreError> {
    let to_mailbox: Mailbox = to
      .parse()
      .map_err(|_| CoreError::InvalidRequest(format!("invalid recipient address: {}", to)))?;

    let body = self
      .templates
      .render(template, &variables)
      .map_err(|e| CoreError::Internal(format!("template render failed: {}", e)))?;

    let message = Message::builder()
      .from(self.from.clone())
      .to(to_mailbox)
      .subject(Self::subject_for(template))
      .header(ContentType::TEXT_PLAIN)
      .body(body)
      .map_err(|e| CoreError::Internal(format!("mail assembly failed: {}", e)))?;

    self
      .transport
      .send(message)
      .await
      .map_err(|e| CoreError::Internal(format!("smtp send failed: {}", e)))?;

    info!("sent {} mail to {}", template, to);
    Ok(())
  }
}

/// Sink used when mail is disabled in configuration; sends are logged and
/// dropped so flows depending on mail still complete in development.
pub struct NullMailTransport;

#[async_trait]
impl MailTransport for NullMailTransport {
  async fn send_templated(
    &self,
    to: &str,
    template: &str,
    _variables: serde_json::Value,
  ) -> Result<(), CoreError> {
    tracing::warn!("mail disabled; dropping {} mail to {}", template, to);
    Ok(())
  }
}
