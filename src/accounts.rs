//! Signup, login session and profile edits.
//!
//! There are no passwords: logging in just records which user the session
//! acts as under the `currentUser` key.

use crate::error::{FlowError, FlowResult};
use crate::lifecycle::IdGenerator;
use crate::model::{Role, User};
use crate::store::{KvBackend, Store};
use mockable::Clock;

#[derive(Debug, Clone)]
pub struct SignupForm {
    pub role: Role,
    pub name: String,
    pub email: String,
    pub organization_name: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub vehicle_type: Option<String>,
}

/// Fields a user may change after signup; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub organization_name: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub vehicle_type: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.organization_name.is_none()
            && self.location.is_none()
            && self.phone.is_none()
            && self.vehicle_type.is_none()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Create an account and log it in
pub fn signup<B: KvBackend>(
    store: &mut Store<B>,
    clock: &dyn Clock,
    ids: &IdGenerator,
    form: SignupForm,
) -> FlowResult<User> {
    if form.role == Role::Admin {
        return Err(FlowError::validation(
            "role",
            "admin accounts cannot be created by signup",
        ));
    }
    let name = form.name.trim();
    if name.is_empty() {
        return Err(FlowError::validation("name", "must not be empty"));
    }
    let email = form.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(FlowError::validation("email", "must be an email address"));
    }
    let organization_name = non_blank(form.organization_name);
    if matches!(form.role, Role::Restaurant | Role::Ngo) && organization_name.is_none() {
        return Err(FlowError::validation(
            "organizationName",
            format!("required for {} accounts", form.role),
        ));
    }
    if store.user_by_email(email)?.is_some() {
        return Err(FlowError::validation(
            "email",
            format!("{} is already registered", email),
        ));
    }

    let user = User {
        id: ids.next_id(clock.utc()),
        email: email.to_string(),
        name: name.to_string(),
        role: form.role,
        organization_name,
        location: non_blank(form.location),
        phone: non_blank(form.phone),
        vehicle_type: non_blank(form.vehicle_type),
    };
    store.save_user(&user)?;
    store.set_current_user(&user)?;
    Ok(user)
}

pub fn login<B: KvBackend>(store: &mut Store<B>, email: &str) -> FlowResult<User> {
    let user = store
        .user_by_email(email)?
        .ok_or_else(|| FlowError::not_found("user", email.trim()))?;
    store.set_current_user(&user)?;
    Ok(user)
}

/// Clear the session, returning who was logged in
pub fn logout<B: KvBackend>(store: &mut Store<B>) -> FlowResult<Option<User>> {
    let user = store.current_user()?;
    store.clear_current_user()?;
    Ok(user)
}

pub fn require_current_user<B: KvBackend>(store: &Store<B>) -> FlowResult<User> {
    store.current_user()?.ok_or(FlowError::NotLoggedIn)
}

/// Edit the acting user's own profile. Role, email and id never change.
pub fn update_profile<B: KvBackend>(
    store: &mut Store<B>,
    actor: &User,
    update: ProfileUpdate,
) -> FlowResult<User> {
    if update.is_empty() {
        return Err(FlowError::validation("profile", "nothing to update"));
    }
    let mut user = store.user(&actor.id)?;

    if let Some(org) = update.organization_name {
        let org = org.trim().to_string();
        if org.is_empty() && matches!(user.role, Role::Restaurant | Role::Ngo) {
            return Err(FlowError::validation(
                "organizationName",
                format!("required for {} accounts", user.role),
            ));
        }
        user.organization_name = Some(org).filter(|o| !o.is_empty());
    }
    if let Some(location) = update.location {
        user.location = non_blank(Some(location));
    }
    if let Some(phone) = update.phone {
        user.phone = non_blank(Some(phone));
    }
    if let Some(vehicle) = update.vehicle_type {
        user.vehicle_type = non_blank(Some(vehicle));
    }

    store.save_user(&user)?;
    if store.current_user()?.is_some_and(|u| u.id == user.id) {
        store.set_current_user(&user)?;
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use mockable::DefaultClock;

    fn form(role: Role, email: &str, org: Option<&str>) -> SignupForm {
        SignupForm {
            role,
            name: "Sarah Johnson".to_string(),
            email: email.to_string(),
            organization_name: org.map(String::from),
            location: Some("North District".to_string()),
            phone: Some("  ".to_string()),
            vehicle_type: None,
        }
    }

    #[test]
    fn test_signup_logs_in() {
        let mut store = Store::new(MemoryBackend::new());
        let ids = IdGenerator::new();
        let user = signup(
            &mut store,
            &DefaultClock,
            &ids,
            form(Role::Ngo, "ngo@example.com", Some("Hope Foundation")),
        )
        .unwrap();

        assert_eq!(user.phone, None);
        assert_eq!(store.users().unwrap().len(), 1);
        assert_eq!(require_current_user(&store).unwrap(), user);
    }

    #[test]
    fn test_signup_validation() {
        let mut store = Store::new(MemoryBackend::new());
        let ids = IdGenerator::new();

        let err = signup(
            &mut store,
            &DefaultClock,
            &ids,
            form(Role::Restaurant, "r@example.com", None),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation {
                field: "organizationName",
                ..
            }
        ));

        let err = signup(
            &mut store,
            &DefaultClock,
            &ids,
            form(Role::Delivery, "not-an-email", None),
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::Validation { field: "email", .. }));

        let err = signup(
            &mut store,
            &DefaultClock,
            &ids,
            form(Role::Admin, "admin@example.com", None),
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::Validation { field: "role", .. }));

        signup(
            &mut store,
            &DefaultClock,
            &ids,
            form(Role::Delivery, "mike@example.com", None),
        )
        .unwrap();
        let err = signup(
            &mut store,
            &DefaultClock,
            &ids,
            form(Role::Delivery, "MIKE@example.com", None),
        )
        .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_login_logout() {
        let mut store = Store::new(MemoryBackend::new());
        let ids = IdGenerator::new();
        let user = signup(
            &mut store,
            &DefaultClock,
            &ids,
            form(Role::Delivery, "mike@example.com", None),
        )
        .unwrap();

        assert_eq!(logout(&mut store).unwrap(), Some(user.clone()));
        assert!(matches!(
            require_current_user(&store),
            Err(FlowError::NotLoggedIn)
        ));
        assert!(matches!(
            login(&mut store, "nobody@example.com"),
            Err(FlowError::NotFound { .. })
        ));
        assert_eq!(login(&mut store, " Mike@Example.com ").unwrap(), user);
        assert_eq!(store.current_user().unwrap(), Some(user));
    }

    #[test]
    fn test_update_profile_refreshes_session() {
        let mut store = Store::new(MemoryBackend::new());
        let ids = IdGenerator::new();
        let user = signup(
            &mut store,
            &DefaultClock,
            &ids,
            form(Role::Ngo, "ngo@example.com", Some("Hope Foundation")),
        )
        .unwrap();

        let updated = update_profile(
            &mut store,
            &user,
            ProfileUpdate {
                phone: Some("+1234567893".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("+1234567893"));
        assert_eq!(updated.role, Role::Ngo);
        assert_eq!(store.current_user().unwrap(), Some(updated.clone()));

        let err = update_profile(
            &mut store,
            &updated,
            ProfileUpdate {
                organization_name: Some(" ".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::Validation { .. }));

        assert!(update_profile(&mut store, &updated, ProfileUpdate::default()).is_err());
    }
}
