//! First-run sample accounts and donations.

use crate::error::FlowResult;
use crate::model::{Donation, DonationStatus, Role, User};
use crate::store::{KvBackend, Store};
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;

fn user(
    id: &str,
    email: &str,
    name: &str,
    role: Role,
    organization_name: Option<&str>,
    location: Option<&str>,
    phone: &str,
) -> User {
    User {
        id: id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        role,
        organization_name: organization_name.map(String::from),
        location: location.map(String::from),
        phone: Some(phone.to_string()),
        vehicle_type: None,
    }
}

pub fn sample_users() -> Vec<User> {
    let mut delivery = user(
        "delivery-1",
        "delivery1@example.com",
        "Mike Wilson",
        Role::Delivery,
        None,
        None,
        "+1234567894",
    );
    delivery.vehicle_type = Some("Bike".to_string());

    vec![
        user(
            "admin-1",
            "admin@foodflow.com",
            "Admin User",
            Role::Admin,
            None,
            None,
            "+1234567890",
        ),
        user(
            "rest-1",
            "restaurant1@example.com",
            "John Doe",
            Role::Restaurant,
            Some("The Grand Hotel"),
            Some("Downtown, City Center"),
            "+1234567891",
        ),
        user(
            "rest-2",
            "restaurant2@example.com",
            "Jane Smith",
            Role::Restaurant,
            Some("Sunset Restaurant"),
            Some("Beach Road, Seaside"),
            "+1234567892",
        ),
        user(
            "ngo-1",
            "ngo1@example.com",
            "Sarah Johnson",
            Role::Ngo,
            Some("Hope Foundation"),
            Some("North District"),
            "+1234567893",
        ),
        delivery,
    ]
}

pub fn sample_donations(now: DateTime<Utc>) -> Vec<Donation> {
    let minutes = |m: i64| now - Duration::minutes(m);
    let base = Donation {
        id: String::new(),
        restaurant_id: "rest-1".to_string(),
        restaurant_name: "The Grand Hotel".to_string(),
        food_type: String::new(),
        quantity: String::new(),
        expiry_time: String::new(),
        location: "Downtown, City Center".to_string(),
        status: DonationStatus::Available,
        ngo_id: None,
        ngo_name: None,
        delivery_agent_id: None,
        delivery_agent_name: None,
        created_at: now,
        accepted_at: None,
        delivered_at: None,
        version: 0,
    };

    vec![
        Donation {
            id: "don-1".to_string(),
            food_type: "Fresh Salads & Sandwiches".to_string(),
            quantity: "50 servings".to_string(),
            expiry_time: "2 hours".to_string(),
            status: DonationStatus::Delivered,
            ngo_id: Some("ngo-1".to_string()),
            ngo_name: Some("Hope Foundation".to_string()),
            delivery_agent_id: Some("delivery-1".to_string()),
            delivery_agent_name: Some("Mike Wilson".to_string()),
            created_at: minutes(60),
            accepted_at: Some(minutes(40)),
            delivered_at: Some(minutes(20)),
            ..base.clone()
        },
        Donation {
            id: "don-2".to_string(),
            restaurant_id: "rest-2".to_string(),
            restaurant_name: "Sunset Restaurant".to_string(),
            food_type: "Cooked Rice & Curry".to_string(),
            quantity: "30 servings".to_string(),
            expiry_time: "3 hours".to_string(),
            location: "Beach Road, Seaside".to_string(),
            status: DonationStatus::InTransit,
            ngo_id: Some("ngo-1".to_string()),
            ngo_name: Some("Hope Foundation".to_string()),
            delivery_agent_id: Some("delivery-1".to_string()),
            delivery_agent_name: Some("Mike Wilson".to_string()),
            created_at: minutes(30),
            accepted_at: Some(minutes(15)),
            ..base.clone()
        },
        Donation {
            id: "don-3".to_string(),
            food_type: "Bread & Pastries".to_string(),
            quantity: "40 servings".to_string(),
            expiry_time: "4 hours".to_string(),
            created_at: minutes(10),
            ..base
        },
    ]
}

/// Seed sample data into an empty store. Returns false when users exist.
pub fn seed_if_empty<B: KvBackend>(store: &mut Store<B>, clock: &dyn Clock) -> FlowResult<bool> {
    if !store.users()?.is_empty() {
        return Ok(false);
    }
    for user in sample_users() {
        store.save_user(&user)?;
    }
    let existing = store.donations()?;
    for donation in sample_donations(clock.utc()) {
        if existing.iter().all(|d| d.id != donation.id) {
            store.insert_donation(donation)?;
        }
    }
    Ok(true)
}
