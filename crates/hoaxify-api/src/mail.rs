use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Mail {
    pub fn account_activation(to: &str, token: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Account Activation".into(),
            body: format!("Token is {token}"),
        }
    }

    pub fn password_reset(to: &str, token: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Password Reset".into(),
            body: format!("Token is {token}"),
        }
    }
}

/// Outbound mail sink. Delivery can fail; callers decide what that means
/// for the request.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<()>;
}

/// Writes mail to the log instead of delivering it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> Result<()> {
        info!(to = %mail.to, subject = %mail.subject, "mail: {}", mail.body);
        Ok(())
    }
}
