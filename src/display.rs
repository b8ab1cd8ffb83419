//! Plain-text rendering of records and aggregates for the terminal.

use crate::aggregate::{DayBucket, RestaurantRanking, StatusCounts, Summary};
use crate::model::{Donation, DonationStatus, Notification, User};
use crate::tracking::TrackingUpdate;

const BAR_WIDTH: usize = 20;

pub fn status_icon(status: DonationStatus) -> &'static str {
    match status {
        DonationStatus::Available => "[ ]",
        DonationStatus::Accepted => "[~]",
        DonationStatus::InTransit => "[>]",
        DonationStatus::Delivered => "[x]",
    }
}

/// One line per donation
pub fn format_donation(d: &Donation) -> String {
    let mut line = format!(
        "{} {}  {} - {}  ({}, expires in {})",
        status_icon(d.status),
        d.id,
        d.food_type,
        d.quantity,
        d.restaurant_name,
        d.expiry_time
    );
    if let Some(ngo) = &d.ngo_name {
        line.push_str(&format!(" -> {}", ngo));
    }
    if let Some(agent) = &d.delivery_agent_name {
        line.push_str(&format!(" via {}", agent));
    }
    line
}

pub fn format_donation_detail(d: &Donation) -> String {
    let mut out = String::new();
    out.push_str(&format!("Donation {}\n", d.id));
    out.push_str(&format!("  Status:   {}\n", d.status));
    out.push_str(&format!("  Food:     {}\n", d.food_type));
    out.push_str(&format!("  Quantity: {}\n", d.quantity));
    out.push_str(&format!("  Expires:  {}\n", d.expiry_time));
    out.push_str(&format!("  Pickup:   {}\n", d.location));
    out.push_str(&format!("  Donor:    {}\n", d.restaurant_name));
    if let Some(ngo) = &d.ngo_name {
        out.push_str(&format!("  NGO:      {}\n", ngo));
    }
    if let Some(agent) = &d.delivery_agent_name {
        out.push_str(&format!("  Agent:    {}\n", agent));
    }
    out.push_str(&format!(
        "  Created:  {}\n",
        d.created_at.format("%Y-%m-%d %H:%M")
    ));
    if let Some(ts) = d.accepted_at {
        out.push_str(&format!("  Accepted: {}\n", ts.format("%Y-%m-%d %H:%M")));
    }
    if let Some(ts) = d.delivered_at {
        out.push_str(&format!("  Delivered: {}\n", ts.format("%Y-%m-%d %H:%M")));
    }
    out
}

pub fn format_user(user: &User) -> String {
    let mut out = format!("{} <{}> ({})", user.name, user.email, user.role);
    if let Some(org) = &user.organization_name {
        out.push_str(&format!(" - {}", org));
    }
    if let Some(vehicle) = &user.vehicle_type {
        out.push_str(&format!(" [{}]", vehicle));
    }
    out
}

pub fn format_leaderboard(rankings: &[RestaurantRanking]) -> String {
    if rankings.is_empty() {
        return "No donations yet.\n".to_string();
    }
    let mut out = String::new();
    for r in rankings {
        out.push_str(&format!(
            "#{:<3} {:<28} {:>6} served  {:>3} donations  {:>3} completed\n",
            r.rank, r.name, r.total_quantity, r.total_donations, r.completed_donations
        ));
    }
    let total: u64 = rankings.iter().map(|r| r.total_quantity).sum();
    let completed: usize = rankings.iter().map(|r| r.completed_donations).sum();
    out.push_str(&format!(
        "\n{} restaurants, {} served, {} completed\n",
        rankings.len(),
        total,
        completed
    ));
    out
}

fn bar(count: usize, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    "#".repeat((count * BAR_WIDTH).div_ceil(max))
}

pub fn format_week(days: &[DayBucket]) -> String {
    let max = days.iter().map(|d| d.submitted).max().unwrap_or(0);
    let mut out = String::from("Day         Sub  Acc  Del\n");
    for day in days {
        out.push_str(&format!(
            "{} {}  {:>3}  {:>3}  {:>3}  {}\n",
            day.label,
            day.date.format("%m-%d"),
            day.submitted,
            day.accepted,
            day.delivered,
            bar(day.submitted, max)
        ));
    }
    out
}

pub fn format_status_counts(counts: &StatusCounts) -> String {
    let mut out = String::new();
    for status in DonationStatus::ALL {
        out.push_str(&format!(
            "{} {:<11} {:>4}\n",
            status_icon(status),
            status.as_str(),
            counts.get(status)
        ));
    }
    out.push_str(&format!("    {:<11} {:>4}\n", "total", counts.total()));
    out
}

pub fn format_summary(summary: &Summary) -> String {
    format!(
        "Donations: {}  Delivered: {}  Success rate: {}%\nQuantity: {} listed, {} delivered\n",
        summary.total,
        summary.delivered,
        summary.success_rate,
        summary.total_quantity,
        summary.delivered_quantity
    )
}

pub fn format_notifications(notifications: &[Notification]) -> String {
    if notifications.is_empty() {
        return "No notifications.\n".to_string();
    }
    let mut out = String::new();
    for n in notifications {
        out.push_str(&format!(
            "{} {}  {}  {}\n",
            if n.read { " " } else { "*" },
            n.timestamp.format("%m-%d %H:%M"),
            n.message,
            n.id
        ));
    }
    out
}

pub fn format_tracking(update: &TrackingUpdate) -> String {
    let filled = (update.progress as usize * BAR_WIDTH) / 100;
    format!(
        "[{}{}] {:>3}%  {:<10} ({:.4}, {:.4})",
        "=".repeat(filled),
        " ".repeat(BAR_WIDTH - filled),
        update.progress,
        update.stage.label(),
        update.position.lat,
        update.position.lng
    )
}
