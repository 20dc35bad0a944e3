use crate::common::{GateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Alert {
    pub subject: String,
    pub message: String,
    pub artifact_url: Option<String>,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    /// Alert for a face that matched nobody.
    pub fn unrecognized_face(artifact_url: Option<String>) -> Self {
        let raised_at = Utc::now();
        let message = match &artifact_url {
            Some(url) => format!(
                "Unrecognized face at the access point on {}. Review the capture (link valid for 1 hour): {}",
                raised_at.format("%Y-%m-%d %H:%M:%S UTC"),
                url
            ),
            None => format!(
                "Unrecognized face at the access point on {}. The capture could not be stored.",
                raised_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        };

        Self {
            subject: "Access Denied: unrecognized face".to_string(),
            message,
            artifact_url,
            raised_at,
        }
    }
}

/// Notification channel for security staff.
pub trait AlertChannel: Send + Sync {
    fn publish(&self, alert: &Alert) -> Result<()>;
}

/// Appends alerts to `<logs_dir>/<channel>.outbox.jsonl` for a forwarder to pick up.
pub struct OutboxAlertChannel {
    channel: String,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OutboxAlertChannel {
    pub fn open(logs_dir: &Path, channel: &str) -> Result<Self> {
        fs::create_dir_all(logs_dir)?;
        Ok(Self {
            channel: channel.to_string(),
            path: logs_dir.join(format!("{}.outbox.jsonl", channel)),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlertChannel for OutboxAlertChannel {
    fn publish(&self, alert: &Alert) -> Result<()> {
        let mut line = serde_json::to_string(alert)?;
        line.push('\n');

        let _guard = self.write_lock
            .lock()
            .map_err(|_| GateError::Storage("Alert outbox lock poisoned".into()))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;

        tracing::warn!(channel = %self.channel, "{}", alert.subject);
        Ok(())
    }
}
