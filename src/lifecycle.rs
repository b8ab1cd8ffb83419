//! Donation lifecycle: creation and the status transitions that follow.
//!
//! Every transition is looked up in [`TRANSITIONS`]; nothing else in the crate
//! decides which status may follow which. The only forward path is
//! `available -> accepted -> delivered`. `in-transit` has no entry and is
//! never produced here.

use crate::error::{FlowError, FlowResult};
use crate::model::{Donation, DonationStatus, Notification, NotificationKind, Role, User};
use crate::store::{KvBackend, Store};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::cell::Cell;

/// Operations that move a donation along its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Accept,
    AssignAgent,
    MarkDelivered,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::AssignAgent => "assign an agent to",
            Self::MarkDelivered => "mark delivered",
        }
    }

    fn permission(&self) -> &'static str {
        match self {
            Self::Accept => "accept donations",
            Self::AssignAgent => "claim deliveries",
            Self::MarkDelivered => "mark donations delivered",
        }
    }
}

struct Transition {
    action: Action,
    from: DonationStatus,
    to: DonationStatus,
    role: Role,
}

const TRANSITIONS: &[Transition] = &[
    Transition {
        action: Action::Accept,
        from: DonationStatus::Available,
        to: DonationStatus::Accepted,
        role: Role::Ngo,
    },
    Transition {
        action: Action::AssignAgent,
        from: DonationStatus::Accepted,
        to: DonationStatus::Accepted,
        role: Role::Delivery,
    },
    Transition {
        action: Action::MarkDelivered,
        from: DonationStatus::Accepted,
        to: DonationStatus::Delivered,
        role: Role::Delivery,
    },
];

/// Role allowed to list new donations
pub const CREATE_ROLE: Role = Role::Restaurant;

/// Status reached by applying `action` in status `from`, if allowed
pub fn next_status(action: Action, from: DonationStatus) -> Option<DonationStatus> {
    TRANSITIONS
        .iter()
        .find(|t| t.action == action && t.from == from)
        .map(|t| t.to)
}

/// Role an actor must hold to perform `action`
pub fn required_role(action: Action) -> Role {
    TRANSITIONS
        .iter()
        .find(|t| t.action == action)
        .map(|t| t.role)
        .unwrap_or(Role::Admin)
}

/// Hands out millisecond-timestamp ids, bumped past the last one issued so
/// two donations created in the same millisecond still differ.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: Cell<i64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, now: DateTime<Utc>) -> String {
        let id = now.timestamp_millis().max(self.last.get() + 1);
        self.last.set(id);
        id.to_string()
    }
}

/// Form fields a restaurant submits for a new donation
#[derive(Debug, Clone, Default)]
pub struct NewDonation {
    pub food_type: String,
    pub quantity: String,
    pub expiry_time: String,
    pub pickup_location: String,
}

impl NewDonation {
    fn validate(&self) -> FlowResult<()> {
        let fields = [
            ("foodType", &self.food_type),
            ("quantity", &self.quantity),
            ("expiryTime", &self.expiry_time),
            ("pickupLocation", &self.pickup_location),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(FlowError::validation(field, "must not be empty"));
            }
        }
        Ok(())
    }
}

pub struct LifecycleEngine<'a, B: KvBackend> {
    store: &'a mut Store<B>,
    clock: &'a dyn Clock,
    ids: &'a IdGenerator,
}

impl<'a, B: KvBackend> LifecycleEngine<'a, B> {
    pub fn new(store: &'a mut Store<B>, clock: &'a dyn Clock, ids: &'a IdGenerator) -> Self {
        Self { store, clock, ids }
    }

    /// List a new donation owned by `actor`
    pub fn create(&mut self, actor: &User, draft: NewDonation) -> FlowResult<Donation> {
        if actor.role != CREATE_ROLE {
            return Err(FlowError::Unauthorized {
                role: actor.role,
                action: "list donations",
            });
        }
        draft.validate()?;

        let now = self.clock.utc();
        let donation = Donation {
            id: self.ids.next_id(now),
            restaurant_id: actor.id.clone(),
            restaurant_name: actor.display_name().to_string(),
            food_type: draft.food_type.trim().to_string(),
            quantity: draft.quantity.trim().to_string(),
            expiry_time: draft.expiry_time.trim().to_string(),
            location: draft.pickup_location.trim().to_string(),
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
        self.store.insert_donation(donation)
    }

    /// Bind the acting NGO to an available donation
    pub fn accept(&mut self, donation_id: &str, actor: &User) -> FlowResult<Donation> {
        let (mut donation, to) = self.prepare(Action::Accept, donation_id, actor)?;
        let now = self.clock.utc();

        donation.status = to;
        donation.ngo_id = Some(actor.id.clone());
        donation.ngo_name = Some(actor.display_name().to_string());
        donation.accepted_at = Some(now);
        let donation = self.store.update_donation(donation)?;

        self.notify(
            &donation.restaurant_id,
            format!(
                "{} accepted your donation of {} ({})",
                actor.display_name(),
                donation.food_type,
                donation.quantity
            ),
            NotificationKind::Success,
            now,
        );
        Ok(donation)
    }

    /// Bind the acting delivery agent to an accepted donation without
    /// changing its status. An agent, once bound, is never replaced.
    pub fn assign_agent(&mut self, donation_id: &str, actor: &User) -> FlowResult<Donation> {
        let (mut donation, to) = self.prepare(Action::AssignAgent, donation_id, actor)?;
        if donation.delivery_agent_id.is_some() {
            let agent = donation
                .delivery_agent_name
                .clone()
                .or(donation.delivery_agent_id.clone())
                .unwrap_or_default();
            return Err(FlowError::AlreadyAssigned {
                id: donation.id,
                agent,
            });
        }

        donation.status = to;
        donation.delivery_agent_id = Some(actor.id.clone());
        donation.delivery_agent_name = Some(actor.name.clone());
        let donation = self.store.update_donation(donation)?;

        if let Some(ngo_id) = &donation.ngo_id {
            self.notify(
                ngo_id,
                format!(
                    "{} will deliver {} from {}",
                    actor.name, donation.food_type, donation.restaurant_name
                ),
                NotificationKind::Info,
                self.clock.utc(),
            );
        }
        Ok(donation)
    }

    /// Complete an accepted donation
    pub fn mark_delivered(&mut self, donation_id: &str, actor: &User) -> FlowResult<Donation> {
        let (mut donation, to) = self.prepare(Action::MarkDelivered, donation_id, actor)?;
        if let Some(agent) = &donation.delivery_agent_id {
            if agent != &actor.id {
                return Err(FlowError::Unauthorized {
                    role: actor.role,
                    action: "deliver donations assigned to another agent",
                });
            }
        }
        let now = self.clock.utc();

        donation.status = to;
        if donation.delivery_agent_id.is_none() {
            donation.delivery_agent_id = Some(actor.id.clone());
            donation.delivery_agent_name = Some(actor.name.clone());
        }
        donation.delivered_at = Some(now);
        let donation = self.store.update_donation(donation)?;

        self.notify(
            &donation.restaurant_id,
            format!(
                "Your donation of {} was delivered to {}",
                donation.food_type,
                donation.ngo_name.as_deref().unwrap_or("the NGO")
            ),
            NotificationKind::Success,
            now,
        );
        if let Some(ngo_id) = &donation.ngo_id {
            self.notify(
                ngo_id,
                format!(
                    "{} from {} has been delivered",
                    donation.food_type, donation.restaurant_name
                ),
                NotificationKind::Success,
                now,
            );
        }
        Ok(donation)
    }

    /// Notifications are best effort once the transition itself is stored
    fn notify(
        &mut self,
        user_id: &str,
        message: String,
        kind: NotificationKind,
        now: DateTime<Utc>,
    ) {
        let notification = Notification::new(user_id, message, kind, now);
        if let Err(e) = self.store.push_notification(notification) {
            eprintln!("Warning: failed to store notification for {}: {}", user_id, e);
        }
    }

    /// Role check, lookup and table check shared by every transition
    fn prepare(
        &self,
        action: Action,
        donation_id: &str,
        actor: &User,
    ) -> FlowResult<(Donation, DonationStatus)> {
        if actor.role != required_role(action) {
            return Err(FlowError::Unauthorized {
                role: actor.role,
                action: action.permission(),
            });
        }
        let donation = self.store.donation(donation_id)?;
        match next_status(action, donation.status) {
            Some(to) => Ok((donation, to)),
            None => Err(FlowError::InvalidTransition {
                id: donation.id,
                action: action.as_str(),
                status: donation.status,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use chrono::{Local, TimeZone};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap())
    }

    fn actor(id: &str, role: Role, org: Option<&str>) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            name: format!("{} person", id),
            role,
            organization_name: org.map(String::from),
            location: None,
            phone: None,
            vehicle_type: None,
        }
    }

    fn draft() -> NewDonation {
        NewDonation {
            food_type: "Cooked Rice & Curry".to_string(),
            quantity: "30 servings".to_string(),
            expiry_time: "3 hours".to_string(),
            pickup_location: "Beach Road".to_string(),
        }
    }

    #[test]
    fn test_transition_table() {
        use DonationStatus::*;
        assert_eq!(next_status(Action::Accept, Available), Some(Accepted));
        assert_eq!(next_status(Action::Accept, Accepted), None);
        assert_eq!(next_status(Action::MarkDelivered, Accepted), Some(Delivered));
        assert_eq!(next_status(Action::MarkDelivered, Available), None);
        assert_eq!(next_status(Action::MarkDelivered, InTransit), None);
        assert_eq!(next_status(Action::AssignAgent, Delivered), None);
        for status in DonationStatus::ALL {
            for action in [Action::Accept, Action::AssignAgent, Action::MarkDelivered] {
                assert_ne!(next_status(action, status), Some(InTransit));
            }
        }
        assert_eq!(required_role(Action::Accept), Role::Ngo);
        assert_eq!(required_role(Action::MarkDelivered), Role::Delivery);
    }

    #[test]
    fn test_id_generator_is_monotonic_within_a_millisecond() {
        let ids = IdGenerator::new();
        let now = clock().utc();
        let a = ids.next_id(now);
        let b = ids.next_id(now);
        assert_eq!(a, now.timestamp_millis().to_string());
        assert_ne!(a, b);
        assert!(b.parse::<i64>().unwrap() > a.parse::<i64>().unwrap());
    }

    #[test]
    fn test_create_requires_restaurant_and_fields() {
        let mut store = Store::new(MemoryBackend::new());
        let clock = clock();
        let ids = IdGenerator::new();
        let mut engine = LifecycleEngine::new(&mut store, &clock, &ids);

        let ngo = actor("ngo-1", Role::Ngo, Some("Hope Foundation"));
        assert!(matches!(
            engine.create(&ngo, draft()),
            Err(FlowError::Unauthorized { role: Role::Ngo, .. })
        ));

        let rest = actor("rest-1", Role::Restaurant, Some("Sunset Restaurant"));
        let mut missing = draft();
        missing.expiry_time = "   ".to_string();
        assert!(matches!(
            engine.create(&rest, missing),
            Err(FlowError::Validation {
                field: "expiryTime",
                ..
            })
        ));

        // Quantity text is not validated beyond presence
        let mut loose = draft();
        loose.quantity = "a few trays".to_string();
        let donation = engine.create(&rest, loose).unwrap();
        assert_eq!(donation.status, DonationStatus::Available);
        assert_eq!(donation.restaurant_name, "Sunset Restaurant");
        assert_eq!(donation.created_at, clock.utc());
        assert_eq!(store.donations().unwrap().len(), 1);
    }

    #[test]
    fn test_accept_only_from_available_and_only_by_ngo() {
        let mut store = Store::new(MemoryBackend::new());
        let clock = clock();
        let ids = IdGenerator::new();
        let mut engine = LifecycleEngine::new(&mut store, &clock, &ids);

        let rest = actor("rest-1", Role::Restaurant, Some("The Grand Hotel"));
        let ngo = actor("ngo-1", Role::Ngo, Some("Hope Foundation"));
        let donation = engine.create(&rest, draft()).unwrap();

        assert!(matches!(
            engine.accept(&donation.id, &rest),
            Err(FlowError::Unauthorized { .. })
        ));
        assert!(matches!(
            engine.accept("missing", &ngo),
            Err(FlowError::NotFound { .. })
        ));

        let accepted = engine.accept(&donation.id, &ngo).unwrap();
        assert_eq!(accepted.status, DonationStatus::Accepted);
        assert_eq!(accepted.ngo_id.as_deref(), Some("ngo-1"));
        assert_eq!(accepted.ngo_name.as_deref(), Some("Hope Foundation"));
        assert!(accepted.accepted_at.is_some());

        let other = actor("ngo-2", Role::Ngo, Some("Community Food Bank"));
        assert!(matches!(
            engine.accept(&donation.id, &other),
            Err(FlowError::InvalidTransition {
                status: DonationStatus::Accepted,
                ..
            })
        ));

        let stored = store.donation(&donation.id).unwrap();
        assert_eq!(stored, accepted);

        let notes = store.notifications_for("rest-1").unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.contains("Hope Foundation"));
    }

    #[test]
    fn test_mark_delivered_requires_accepted() {
        let mut store = Store::new(MemoryBackend::new());
        let clock = clock();
        let ids = IdGenerator::new();
        let mut engine = LifecycleEngine::new(&mut store, &clock, &ids);

        let rest = actor("rest-1", Role::Restaurant, None);
        let agent = actor("delivery-1", Role::Delivery, None);
        let donation = engine.create(&rest, draft()).unwrap();

        let err = engine.mark_delivered(&donation.id, &agent).unwrap_err();
        assert!(matches!(
            err,
            FlowError::InvalidTransition {
                status: DonationStatus::Available,
                ..
            }
        ));
        assert_eq!(
            store.donation(&donation.id).unwrap().status,
            DonationStatus::Available
        );
    }

    /// Memory backend whose notification writes always fail
    struct NoNotifications(MemoryBackend);

    impl KvBackend for NoNotifications {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.0.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
            if key == crate::store::NOTIFICATIONS_KEY {
                anyhow::bail!("disk full");
            }
            self.0.set(key, value)
        }

        fn remove(&mut self, key: &str) -> anyhow::Result<()> {
            self.0.remove(key)
        }
    }

    #[test]
    fn test_transition_succeeds_when_notification_write_fails() {
        let mut store = Store::new(NoNotifications(MemoryBackend::new()));
        let clock = clock();
        let ids = IdGenerator::new();
        let mut engine = LifecycleEngine::new(&mut store, &clock, &ids);

        let rest = actor("rest-1", Role::Restaurant, None);
        let ngo = actor("ngo-1", Role::Ngo, None);
        let mike = actor("delivery-1", Role::Delivery, None);
        let donation = engine.create(&rest, draft()).unwrap();

        let accepted = engine.accept(&donation.id, &ngo).unwrap();
        assert_eq!(accepted.status, DonationStatus::Accepted);
        engine.assign_agent(&donation.id, &mike).unwrap();
        let delivered = engine.mark_delivered(&donation.id, &mike).unwrap();
        assert_eq!(delivered.status, DonationStatus::Delivered);

        assert_eq!(
            store.donation(&donation.id).unwrap().status,
            DonationStatus::Delivered
        );
        assert!(store.notifications().unwrap().is_empty());
    }

    #[test]
    fn test_assigned_agent_is_never_replaced() {
        let mut store = Store::new(MemoryBackend::new());
        let clock = clock();
        let ids = IdGenerator::new();
        let mut engine = LifecycleEngine::new(&mut store, &clock, &ids);

        let rest = actor("rest-1", Role::Restaurant, None);
        let ngo = actor("ngo-1", Role::Ngo, None);
        let mike = actor("delivery-1", Role::Delivery, None);
        let anna = actor("delivery-2", Role::Delivery, None);

        let donation = engine.create(&rest, draft()).unwrap();
        engine.accept(&donation.id, &ngo).unwrap();

        let claimed = engine.assign_agent(&donation.id, &mike).unwrap();
        assert_eq!(claimed.status, DonationStatus::Accepted);
        assert_eq!(claimed.delivery_agent_id.as_deref(), Some("delivery-1"));

        let err = engine.assign_agent(&donation.id, &anna).unwrap_err();
        assert!(matches!(err, FlowError::AlreadyAssigned { .. }));
        assert_eq!(
            err.to_string(),
            format!(
                "donation {} already has a delivery agent (delivery-1 person)",
                donation.id
            )
        );
        assert!(matches!(
            engine.mark_delivered(&donation.id, &anna),
            Err(FlowError::Unauthorized { .. })
        ));

        let delivered = engine.mark_delivered(&donation.id, &mike).unwrap();
        assert_eq!(delivered.status, DonationStatus::Delivered);
        assert_eq!(delivered.delivery_agent_id.as_deref(), Some("delivery-1"));
        assert_eq!(delivered.delivered_at, Some(clock.utc()));

        // restaurant: accepted + delivered; ngo: agent assigned + delivered
        assert_eq!(store.notifications_for("rest-1").unwrap().len(), 2);
        assert_eq!(store.notifications_for("ngo-1").unwrap().len(), 2);
    }
}
