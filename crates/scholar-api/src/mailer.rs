use tracing::info;

/// Delivers signup verification codes. Delivery itself (SMTP and friends) is
/// outside this service; the server ships with [`LogMailer`].
pub trait CodeMailer: Send + Sync {
    fn send_code(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Writes the code to the log instead of sending it.
pub struct LogMailer;

impl CodeMailer for LogMailer {
    fn send_code(&self, email: &str, code: &str) -> anyhow::Result<()> {
        info!("Verification code for {}: {}", email, code);
        Ok(())
    }
}
