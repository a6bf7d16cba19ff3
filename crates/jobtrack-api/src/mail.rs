use std::sync::Mutex;

use anyhow::Result;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail. Delivery is fire-and-forget: callers log a failure and move on.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &Email) -> Result<()>;
}

/// Writes every message to the log instead of delivering it.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &Email) -> Result<()> {
        info!(to = %email.to, subject = %email.subject, "Outgoing mail\n{}", email.body);
        Ok(())
    }
}

/// Keeps sent messages in memory so they can be inspected afterwards.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_to(&self, to: &str) -> Option<Email> {
        self.sent().into_iter().rev().find(|e| e.to == to)
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, email: &Email) -> Result<()> {
        self.sent
            .lock()
            .map_err(|e| anyhow::anyhow!("mailbox lock poisoned: {}", e))?
            .push(email.clone());
        Ok(())
    }
}

/// Send and swallow the error; mail never fails the request that triggered it.
pub fn send_quietly(mailer: &dyn Mailer, email: &Email) {
    if let Err(e) = mailer.send(email) {
        warn!("Failed to send mail to {}: {}", email.to, e);
    }
}
