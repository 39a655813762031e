use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use lookout_shared::{LookoutError, Result, SmtpSettings};

use super::Delivery;

/// Port that speaks TLS from the first byte; every other port upgrades with STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Sends the summary as a plain-text email over SMTP.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let from = parse_mailbox("EMAIL_FROM", &settings.from)?;
        let to = parse_mailbox("EMAIL_TO", &settings.to)?;

        let builder = if settings.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        }
        .map_err(|e| LookoutError::notify("email", format!("invalid SMTP host: {e}")))?
        .port(settings.port);

        let builder = match (&settings.username, &settings.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(SmtpCredentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    pub fn build_message(&self, delivery: &Delivery) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(delivery.title())
            .header(ContentType::TEXT_PLAIN)
            .body(delivery.summary.clone())
            .map_err(|e| LookoutError::notify("email", e.to_string()))
    }

    pub async fn send(&self, delivery: &Delivery) -> Result<()> {
        let message = self.build_message(delivery)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| LookoutError::notify("email", e.to_string()))?;
        Ok(())
    }
}

fn parse_mailbox(var: &str, value: &str) -> Result<Mailbox> {
    value
        .parse()
        .map_err(|e| LookoutError::config(format!("{var} is not a valid address: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::tests::delivery;

    fn settings(port: u16) -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".into(),
            port,
            username: Some("bot".into()),
            password: Some("pw".into()),
            from: "Lookout <lookout@example.com>".into(),
            to: "team@example.com".into(),
        }
    }

    #[test]
    fn message_has_dated_subject_and_plain_body() {
        let notifier = EmailNotifier::new(&settings(587)).unwrap();
        let message = notifier.build_message(&delivery()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Competitive Intelligence Report - 2024-06-10"));
        assert!(raw.contains("To: team@example.com"));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(raw.contains("Weekly summary"));
    }

    #[test]
    fn implicit_tls_port_builds() {
        assert!(EmailNotifier::new(&settings(465)).is_ok());
    }

    #[test]
    fn bad_address_is_a_config_error() {
        let mut s = settings(587);
        s.to = "not an address".into();
        let err = EmailNotifier::new(&s).err().unwrap();
        assert!(err.to_string().contains("EMAIL_TO"));
    }
}
