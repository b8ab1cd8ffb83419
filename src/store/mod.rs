//! Typed repository over a key-value backend.
//!
//! Collections live under fixed keys as JSON arrays. A missing or `null` key
//! reads as an empty collection. Donations are written one record at a time
//! and guarded by their `version` field.

mod backend;

pub use backend::{FileBackend, KvBackend, MemoryBackend};

use crate::error::{FlowError, FlowResult};
use crate::model::{Donation, Notification, User};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const USERS_KEY: &str = "users";
pub const DONATIONS_KEY: &str = "donations";
pub const NOTIFICATIONS_KEY: &str = "notifications";
pub const CURRENT_USER_KEY: &str = "currentUser";

pub struct Store<B: KvBackend> {
    backend: B,
}

impl<B: KvBackend> Store<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> FlowResult<Option<T>> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let value = serde_json::from_str::<Option<T>>(&raw)
            .with_context(|| format!("Failed to decode stored '{}'", key))?;
        Ok(value)
    }

    fn write<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> FlowResult<()> {
        let raw = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to encode '{}'", key))?;
        self.backend.set(key, &raw)?;
        Ok(())
    }

    fn read_collection<T: DeserializeOwned>(&self, key: &str) -> FlowResult<Vec<T>> {
        Ok(self.read::<Vec<T>>(key)?.unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn users(&self) -> FlowResult<Vec<User>> {
        self.read_collection(USERS_KEY)
    }

    pub fn user(&self, id: &str) -> FlowResult<User> {
        self.users()?
            .into_iter()
            .find(|u| u.id == id)
            .ok_or_else(|| FlowError::not_found("user", id))
    }

    /// Case-insensitive email lookup
    pub fn user_by_email(&self, email: &str) -> FlowResult<Option<User>> {
        let email = email.trim();
        Ok(self
            .users()?
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    /// Insert the user or replace the record with the same id
    pub fn save_user(&mut self, user: &User) -> FlowResult<()> {
        let mut users = self.users()?;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user.clone(),
            None => users.push(user.clone()),
        }
        self.write(USERS_KEY, &users)
    }

    pub fn current_user(&self) -> FlowResult<Option<User>> {
        self.read(CURRENT_USER_KEY)
    }

    pub fn set_current_user(&mut self, user: &User) -> FlowResult<()> {
        self.write(CURRENT_USER_KEY, user)
    }

    pub fn clear_current_user(&mut self) -> FlowResult<()> {
        self.backend.remove(CURRENT_USER_KEY)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Donations
    // ------------------------------------------------------------------

    pub fn donations(&self) -> FlowResult<Vec<Donation>> {
        self.read_collection(DONATIONS_KEY)
    }

    pub fn donation(&self, id: &str) -> FlowResult<Donation> {
        self.donations()?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| FlowError::not_found("donation", id))
    }

    /// Store a new donation; its id must not exist yet. Returns the stored copy.
    pub fn insert_donation(&mut self, mut donation: Donation) -> FlowResult<Donation> {
        let mut donations = self.donations()?;
        if donations.iter().any(|d| d.id == donation.id) {
            return Err(FlowError::validation(
                "id",
                format!("donation {} already exists", donation.id),
            ));
        }
        donation.version = 1;
        donations.push(donation.clone());
        self.write(DONATIONS_KEY, &donations)?;
        Ok(donation)
    }

    /// Replace a donation read earlier. Fails with `Conflict` when the stored
    /// record has moved on since `donation` was read.
    pub fn update_donation(&mut self, mut donation: Donation) -> FlowResult<Donation> {
        let mut donations = self.donations()?;
        let Some(stored) = donations.iter_mut().find(|d| d.id == donation.id) else {
            return Err(FlowError::not_found("donation", &donation.id));
        };
        if stored.version != donation.version {
            return Err(FlowError::Conflict {
                id: donation.id,
                expected: donation.version,
                found: stored.version,
            });
        }
        donation.version += 1;
        *stored = donation.clone();
        self.write(DONATIONS_KEY, &donations)?;
        Ok(donation)
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// All notifications, newest first
    pub fn notifications(&self) -> FlowResult<Vec<Notification>> {
        self.read_collection(NOTIFICATIONS_KEY)
    }

    pub fn notifications_for(&self, user_id: &str) -> FlowResult<Vec<Notification>> {
        Ok(self
            .notifications()?
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect())
    }

    pub fn push_notification(&mut self, notification: Notification) -> FlowResult<()> {
        let mut notifications = self.notifications()?;
        notifications.insert(0, notification);
        self.write(NOTIFICATIONS_KEY, &notifications)
    }

    /// Mark one of `user_id`'s notifications read. Other users' ids are
    /// reported as not found.
    pub fn mark_notification_read(&mut self, user_id: &str, id: &str) -> FlowResult<()> {
        let mut notifications = self.notifications()?;
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or_else(|| FlowError::not_found("notification", id))?;
        notification.read = true;
        self.write(NOTIFICATIONS_KEY, &notifications)
    }
}
