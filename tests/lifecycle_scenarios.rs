use chrono::{DateTime, Local, TimeZone, Utc};
use foodflow::aggregate;
use foodflow::error::FlowError;
use foodflow::lifecycle::{IdGenerator, LifecycleEngine, NewDonation};
use foodflow::model::{Donation, DonationStatus, Role, User};
use foodflow::store::{FileBackend, Store};
use mockable::Clock;
use tempfile::TempDir;

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

fn user(id: &str, role: Role, org: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        name: format!("{} contact", org),
        role,
        organization_name: Some(org.to_string()),
        location: None,
        phone: None,
        vehicle_type: None,
    }
}

fn draft(quantity: &str) -> NewDonation {
    NewDonation {
        food_type: "Fresh Salads & Sandwiches".to_string(),
        quantity: quantity.to_string(),
        expiry_time: "2 hours".to_string(),
        pickup_location: "Downtown, City Center".to_string(),
    }
}

#[test]
fn donation_moves_through_its_lifecycle_on_disk() {
    let dir = TempDir::new().unwrap();
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap());
    let ids = IdGenerator::new();
    let mut store = Store::new(FileBackend::new(dir.path()));

    let r1 = user("R1", Role::Restaurant, "The Grand Hotel");
    let ngo1 = user("NGO1", Role::Ngo, "Hope Foundation");
    let ngo2 = user("NGO2", Role::Ngo, "Community Food Bank");
    let agent = user("A1", Role::Delivery, "Courier");

    let mut engine = LifecycleEngine::new(&mut store, &clock, &ids);
    let d = engine.create(&r1, draft("50 servings")).unwrap();
    assert_eq!(d.status, DonationStatus::Available);

    let d = engine.accept(&d.id, &ngo1).unwrap();
    assert_eq!(d.status, DonationStatus::Accepted);
    assert_eq!(d.ngo_id.as_deref(), Some("NGO1"));
    assert_eq!(d.accepted_at, Some(clock.utc()));

    let d = engine.mark_delivered(&d.id, &agent).unwrap();
    assert_eq!(d.status, DonationStatus::Delivered);
    assert_eq!(d.delivered_at, Some(clock.utc()));

    let err = engine.accept(&d.id, &ngo2).unwrap_err();
    assert!(matches!(err, FlowError::InvalidTransition { .. }));

    // A fresh handle on the same directory sees the persisted record
    let reopened = Store::new(FileBackend::new(dir.path()));
    let stored = reopened.donation(&d.id).unwrap();
    assert_eq!(stored.ngo_id.as_deref(), Some("NGO1"));
    assert_eq!(stored.status, DonationStatus::Delivered);
    assert_eq!(reopened.notifications_for("R1").unwrap().len(), 2);
}

#[test]
fn leaderboard_ranks_by_total_quantity() {
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap());
    let donation = |id: &str, restaurant: &str, quantity: &str, status| Donation {
        id: id.to_string(),
        restaurant_id: restaurant.to_string(),
        restaurant_name: restaurant.to_string(),
        food_type: "Meals".to_string(),
        quantity: quantity.to_string(),
        expiry_time: "1 hour".to_string(),
        location: String::new(),
        status,
        ngo_id: None,
        ngo_name: None,
        delivery_agent_id: None,
        delivery_agent_name: None,
        created_at: clock.utc(),
        accepted_at: None,
        delivered_at: None,
        version: 1,
    };
    let donations = vec![
        donation("1", "R1", "50 servings", DonationStatus::Delivered),
        donation("2", "R1", "30 servings", DonationStatus::Available),
        donation("3", "R2", "100 servings", DonationStatus::Delivered),
    ];

    let board = aggregate::leaderboard(&donations, &[]);
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].restaurant_id, "R2");
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[0].total_quantity, 100);
    assert_eq!(board[1].restaurant_id, "R1");
    assert_eq!(board[1].rank, 2);
    assert_eq!(board[1].total_quantity, 80);
    assert_eq!(board[1].completed_donations, 1);
}

#[test]
fn stale_writer_gets_a_conflict() {
    let dir = TempDir::new().unwrap();
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap());
    let ids = IdGenerator::new();
    let r1 = user("R1", Role::Restaurant, "The Grand Hotel");
    let ngo1 = user("NGO1", Role::Ngo, "Hope Foundation");

    let mut first = Store::new(FileBackend::new(dir.path()));
    let created = LifecycleEngine::new(&mut first, &clock, &ids)
        .create(&r1, draft("20 kg"))
        .unwrap();

    // A second process read the donation before it was accepted
    let mut second = Store::new(FileBackend::new(dir.path()));
    let mut stale = second.donation(&created.id).unwrap();

    LifecycleEngine::new(&mut first, &clock, &ids)
        .accept(&created.id, &ngo1)
        .unwrap();

    stale.food_type = "Bread".to_string();
    let err = second.update_donation(stale).unwrap_err();
    assert!(matches!(
        err,
        FlowError::Conflict {
            expected: 1,
            found: 2,
            ..
        }
    ));
    assert_eq!(
        second.donation(&created.id).unwrap().status,
        DonationStatus::Accepted
    );
}
