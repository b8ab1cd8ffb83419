//! Read-only figures derived from the donation collection.
//!
//! Nothing here is cached; every view is recomputed from the slice it is
//! given. Malformed quantity text contributes zero instead of failing.

use crate::model::{Donation, DonationStatus, Role, User};
use chrono::{Duration, Local, NaiveDate, TimeZone};
use mockable::Clock;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

/// Number of days in the trailing activity window
pub const WEEK_DAYS: i64 = 7;

/// First run of ASCII digits in `quantity`, or 0 when there is none.
/// A run too long for `u64` saturates.
pub fn extract_quantity(quantity: &str) -> u64 {
    match DIGITS.find(quantity) {
        Some(m) => m.as_str().parse().unwrap_or(u64::MAX),
        None => 0,
    }
}

/// Subset of donations a dashboard looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DonationFilter {
    All,
    Restaurant(String),
    Ngo(String),
    DeliveryAgent(String),
}

impl DonationFilter {
    /// The slice a user's own dashboard covers
    pub fn for_user(user: &User) -> Self {
        match user.role {
            Role::Restaurant => Self::Restaurant(user.id.clone()),
            Role::Ngo => Self::Ngo(user.id.clone()),
            Role::Delivery => Self::DeliveryAgent(user.id.clone()),
            Role::Admin => Self::All,
        }
    }

    pub fn matches(&self, donation: &Donation) -> bool {
        match self {
            Self::All => true,
            Self::Restaurant(id) => &donation.restaurant_id == id,
            Self::Ngo(id) => donation.ngo_id.as_ref() == Some(id),
            Self::DeliveryAgent(id) => donation.delivery_agent_id.as_ref() == Some(id),
        }
    }

    /// Donations nobody has picked up yet that `role` could act on next
    pub fn open_to(role: Role, donation: &Donation) -> bool {
        match role {
            Role::Ngo => donation.status == DonationStatus::Available,
            Role::Delivery => {
                donation.status == DonationStatus::Accepted && donation.delivery_agent_id.is_none()
            }
            Role::Restaurant | Role::Admin => false,
        }
    }

    pub fn apply<'a>(&self, donations: &'a [Donation]) -> Vec<&'a Donation> {
        donations.iter().filter(|d| self.matches(d)).collect()
    }
}

// ============================================================================
// Leaderboard
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantRanking {
    pub rank: usize,
    pub restaurant_id: String,
    pub name: String,
    pub total_donations: usize,
    pub completed_donations: usize,
    pub total_quantity: u64,
}

/// Restaurants ranked by total donated quantity, highest first.
///
/// Groups keep the order in which their restaurant first appears and the sort
/// is stable, so equal totals keep that order.
pub fn leaderboard(donations: &[Donation], users: &[User]) -> Vec<RestaurantRanking> {
    let mut rankings: Vec<RestaurantRanking> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for donation in donations {
        let slot = *index
            .entry(donation.restaurant_id.as_str())
            .or_insert_with(|| {
                rankings.push(RestaurantRanking {
                    rank: 0,
                    restaurant_id: donation.restaurant_id.clone(),
                    name: restaurant_name(donation, users),
                    total_donations: 0,
                    completed_donations: 0,
                    total_quantity: 0,
                });
                rankings.len() - 1
            });

        let entry = &mut rankings[slot];
        entry.total_donations += 1;
        entry.total_quantity = entry
            .total_quantity
            .saturating_add(extract_quantity(&donation.quantity));
        if donation.status == DonationStatus::Delivered {
            entry.completed_donations += 1;
        }
    }

    rankings.sort_by(|a, b| b.total_quantity.cmp(&a.total_quantity));
    for (i, ranking) in rankings.iter_mut().enumerate() {
        ranking.rank = i + 1;
    }
    rankings
}

fn restaurant_name(donation: &Donation, users: &[User]) -> String {
    if !donation.restaurant_name.is_empty() {
        return donation.restaurant_name.clone();
    }
    users
        .iter()
        .find(|u| u.id == donation.restaurant_id)
        .and_then(|u| u.organization_name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Unknown Restaurant".to_string())
}

// ============================================================================
// Weekly series
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    /// Short weekday name, e.g. "Mon"
    pub label: String,
    pub submitted: usize,
    pub accepted: usize,
    pub delivered: usize,
}

/// Seven days ending today in the local time zone, oldest first
pub fn weekly_series<'a, I>(donations: I, clock: &dyn Clock) -> Vec<DayBucket>
where
    I: IntoIterator<Item = &'a Donation>,
{
    weekly_series_in(donations, clock.local().date_naive(), &Local)
}

/// Seven days ending on `today`, bucketing creation times by their calendar
/// day in `tz`. Days without donations are present with zero counts.
pub fn weekly_series_in<'a, I, Tz>(donations: I, today: NaiveDate, tz: &Tz) -> Vec<DayBucket>
where
    I: IntoIterator<Item = &'a Donation>,
    Tz: TimeZone,
{
    let first = today - Duration::days(WEEK_DAYS - 1);
    let mut buckets: Vec<DayBucket> = (0..WEEK_DAYS)
        .map(|offset| {
            let date = first + Duration::days(offset);
            DayBucket {
                date,
                label: date.format("%a").to_string(),
                submitted: 0,
                accepted: 0,
                delivered: 0,
            }
        })
        .collect();

    for donation in donations {
        let day = donation.created_at.with_timezone(tz).date_naive();
        let offset = day.signed_duration_since(first).num_days();
        if !(0..WEEK_DAYS).contains(&offset) {
            continue;
        }
        let bucket = &mut buckets[offset as usize];
        bucket.submitted += 1;
        match donation.status {
            DonationStatus::Accepted => bucket.accepted += 1,
            DonationStatus::Delivered => bucket.delivered += 1,
            _ => {}
        }
    }

    buckets
}

// ============================================================================
// Status distribution and summary
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub available: usize,
    pub accepted: usize,
    pub in_transit: usize,
    pub delivered: usize,
}

impl StatusCounts {
    pub fn get(&self, status: DonationStatus) -> usize {
        match status {
            DonationStatus::Available => self.available,
            DonationStatus::Accepted => self.accepted,
            DonationStatus::InTransit => self.in_transit,
            DonationStatus::Delivered => self.delivered,
        }
    }

    pub fn total(&self) -> usize {
        self.available + self.accepted + self.in_transit + self.delivered
    }
}

pub fn status_distribution<'a, I>(donations: I) -> StatusCounts
where
    I: IntoIterator<Item = &'a Donation>,
{
    let mut counts = StatusCounts::default();
    for donation in donations {
        match donation.status {
            DonationStatus::Available => counts.available += 1,
            DonationStatus::Accepted => counts.accepted += 1,
            DonationStatus::InTransit => counts.in_transit += 1,
            DonationStatus::Delivered => counts.delivered += 1,
        }
    }
    counts
}

/// Headline figures shown at the top of a dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub delivered: usize,
    /// Delivered share of all donations, rounded to a whole percent
    pub success_rate: u32,
    pub total_quantity: u64,
    pub delivered_quantity: u64,
}

pub fn summary<'a, I>(donations: I) -> Summary
where
    I: IntoIterator<Item = &'a Donation>,
{
    let mut out = Summary::default();
    for donation in donations {
        let quantity = extract_quantity(&donation.quantity);
        out.total += 1;
        out.total_quantity = out.total_quantity.saturating_add(quantity);
        if donation.status == DonationStatus::Delivered {
            out.delivered += 1;
            out.delivered_quantity = out.delivered_quantity.saturating_add(quantity);
        }
    }
    if out.total > 0 {
        // Round half up
        let rate = (out.delivered * 200 + out.total) / (out.total * 2);
        out.success_rate = rate as u32;
    }
    out
}
