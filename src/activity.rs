use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::model::{Donation, User};

/// Append-only JSONL record of what a session did to the store
pub struct ActivityLog {
    pub path: PathBuf,
    session_id: String,
    file: File,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    session_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl ActivityLog {
    pub fn new(path: &Path, session_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            session_id: session_id.to_string(),
            file,
        })
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let event = Event {
            ts: Utc::now(),
            session_id: &self.session_id,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn user_signed_up(&mut self, user: &User) -> Result<()> {
        self.log(
            "user_signed_up",
            serde_json::json!({ "user": user.id, "role": user.role }),
        )
    }

    pub fn login(&mut self, user: &User) -> Result<()> {
        self.log("login", serde_json::json!({ "user": user.id }))
    }

    pub fn logout(&mut self, user_id: Option<&str>) -> Result<()> {
        self.log("logout", serde_json::json!({ "user": user_id }))
    }

    pub fn profile_updated(&mut self, user: &User) -> Result<()> {
        self.log("profile_updated", serde_json::json!({ "user": user.id }))
    }

    /// Log a donation after a lifecycle operation stored it
    pub fn donation_event(&mut self, event_type: &str, actor: &User, donation: &Donation) -> Result<()> {
        self.log(
            event_type,
            serde_json::json!({
                "actor": actor.id,
                "donation": donation.id,
                "status": donation.status,
                "version": donation.version,
            }),
        )
    }

    /// Log an operation the engine refused
    pub fn rejected(&mut self, operation: &str, actor: Option<&str>, error: &str) -> Result<()> {
        self.log(
            "rejected",
            serde_json::json!({
                "operation": operation,
                "actor": actor,
                "error": error,
            }),
        )
    }

    pub fn sample_data_seeded(&mut self) -> Result<()> {
        self.log("sample_data_seeded", serde_json::json!({}))
    }
}
