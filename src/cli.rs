use crate::accounts::{self, ProfileUpdate, SignupForm};
use crate::activity::ActivityLog;
use crate::aggregate::{self, DonationFilter};
use crate::config::{Config, TrackingConfig};
use crate::display;
use crate::error::FlowResult;
use crate::lifecycle::{IdGenerator, LifecycleEngine, NewDonation};
use crate::model::{DonationStatus, Role, User};
use crate::seed;
use crate::store::{FileBackend, Store};
use crate::tracking::{GeoPoint, TrackingState, TrackingTimer};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use mockable::DefaultClock;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::cell::RefCell;
use std::time::Duration;

/// Demo route used by `track`; donations carry free-text locations only
const DEMO_PICKUP: GeoPoint = GeoPoint {
    lat: 28.6139,
    lng: 77.2090,
};
const DEMO_DROPOFF: GeoPoint = GeoPoint {
    lat: 28.6289,
    lng: 77.2195,
};

fn parse_role(s: &str) -> Result<Role, String> {
    Role::from_str(s).ok_or_else(|| format!("unknown role '{}': use restaurant, ngo or delivery", s))
}

fn parse_status(s: &str) -> Result<DonationStatus, String> {
    DonationStatus::from_str(s).ok_or_else(|| {
        format!(
            "unknown status '{}': use available, accepted, in-transit or delivered",
            s
        )
    })
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create an account and log in as it
    Signup {
        #[arg(long, value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long = "org")]
        organization: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        vehicle: Option<String>,
    },
    /// Act as an existing user
    Login { email: String },
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Edit your own profile
    Profile {
        #[arg(long = "org")]
        organization: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        vehicle: Option<String>,
    },
    /// List a donation (restaurants)
    Donate {
        #[arg(long = "food")]
        food_type: String,
        #[arg(long)]
        quantity: String,
        #[arg(long = "expires")]
        expiry_time: String,
        #[arg(long = "pickup")]
        pickup_location: String,
    },
    /// Accept an available donation (NGOs)
    Accept { id: String },
    /// Claim the delivery of an accepted donation (delivery agents)
    Assign { id: String },
    /// Mark an accepted donation delivered (delivery agents)
    Deliver { id: String },
    /// Show one donation
    Show { id: String },
    /// List donations visible to you
    List {
        /// Every donation regardless of role
        #[arg(long)]
        all: bool,
        #[arg(long, value_parser = parse_status)]
        status: Option<DonationStatus>,
    },
    /// Restaurants ranked by quantity donated
    Leaderboard,
    /// Donations per day over the last week
    Weekly {
        #[arg(long)]
        all: bool,
    },
    /// Status distribution and success rate
    Stats {
        #[arg(long)]
        all: bool,
    },
    /// Your notifications, newest first
    Notifications {
        #[arg(long)]
        unread: bool,
    },
    /// Mark a notification read
    Read { id: String },
    /// Follow a simulated courier for an accepted donation
    Track {
        id: String,
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        step: Option<u32>,
    },
    /// Load sample accounts and donations into an empty store
    Seed,
    /// Interactive prompt
    Shell,
}

/// Parser for lines typed at the shell prompt
#[derive(Parser, Debug)]
#[command(name = "foodflow", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

pub struct Context {
    pub config: Config,
    pub session_id: String,
    pub store: RefCell<Store<FileBackend>>,
    pub activity: RefCell<Option<ActivityLog>>,
    pub verbose: RefCell<bool>,
    clock: DefaultClock,
    ids: IdGenerator,
}

impl Context {
    pub fn new(config: Config, session_id: &str, verbose: bool) -> Result<Self> {
        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let store = Store::new(FileBackend::new(&data_dir));

        let activity = if config.activity_enabled() {
            let path = config
                .activity_dir()
                .join(format!("{}.jsonl", session_id));
            Some(ActivityLog::new(&path, session_id)?)
        } else {
            None
        };

        Ok(Self {
            config,
            session_id: session_id.to_string(),
            store: RefCell::new(store),
            activity: RefCell::new(activity),
            verbose: RefCell::new(verbose),
            clock: DefaultClock,
            ids: IdGenerator::new(),
        })
    }

    pub fn verbose(&self, msg: &str) {
        if *self.verbose.borrow() {
            eprintln!("[VERBOSE] {}", msg);
        }
    }

    fn log(&self, f: impl FnOnce(&mut ActivityLog) -> Result<()>) {
        if let Some(log) = self.activity.borrow_mut().as_mut() {
            if let Err(e) = f(log) {
                eprintln!("Warning: failed to write activity log: {}", e);
            }
        }
    }

    /// Pass a domain result through, logging it to the activity log if it was refused
    fn checked<T>(&self, operation: &str, actor: Option<&User>, result: FlowResult<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                let message = e.to_string();
                self.verbose(&format!("{} rejected: {}", operation, message));
                self.log(|log| log.rejected(operation, actor.map(|u| u.id.as_str()), &message));
                Err(e.into())
            }
        }
    }

    fn current_user(&self, operation: &str) -> Result<User> {
        let result = accounts::require_current_user(&*self.store.borrow());
        self.checked(operation, None, result)
    }

    /// Load sample data when the store is empty and seeding is enabled
    pub fn seed_on_first_run(&self) -> Result<()> {
        if !self.config.seed_sample_data() {
            return Ok(());
        }
        let seeded = seed::seed_if_empty(&mut *self.store.borrow_mut(), &self.clock)?;
        if seeded {
            self.verbose("seeded sample data into empty store");
            self.log(|log| log.sample_data_seeded());
        }
        Ok(())
    }
}

pub fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Signup {
            role,
            name,
            email,
            organization,
            location,
            phone,
            vehicle,
        } => {
            let form = SignupForm {
                role,
                name,
                email,
                organization_name: organization,
                location,
                phone,
                vehicle_type: vehicle,
            };
            let result = accounts::signup(&mut *ctx.store.borrow_mut(), &ctx.clock, &ctx.ids, form);
            let user = ctx.checked("signup", None, result)?;
            ctx.log(|log| log.user_signed_up(&user));
            println!("Signed up and logged in: {}", display::format_user(&user));
        }
        Command::Login { email } => {
            let result = accounts::login(&mut *ctx.store.borrow_mut(), &email);
            let user = ctx.checked("login", None, result)?;
            ctx.log(|log| log.login(&user));
            println!("Logged in: {}", display::format_user(&user));
        }
        Command::Logout => {
            let user = accounts::logout(&mut *ctx.store.borrow_mut())?;
            ctx.log(|log| log.logout(user.as_ref().map(|u| u.id.as_str())));
            match user {
                Some(u) => println!("Logged out {}", u.name),
                None => println!("Not logged in"),
            }
        }
        Command::Whoami => match ctx.store.borrow().current_user()? {
            Some(user) => println!("{}", display::format_user(&user)),
            None => println!("Not logged in"),
        },
        Command::Profile {
            organization,
            location,
            phone,
            vehicle,
        } => {
            let actor = ctx.current_user("profile")?;
            let update = ProfileUpdate {
                organization_name: organization,
                location,
                phone,
                vehicle_type: vehicle,
            };
            let result = accounts::update_profile(&mut *ctx.store.borrow_mut(), &actor, update);
            let user = ctx.checked("profile", Some(&actor), result)?;
            ctx.log(|log| log.profile_updated(&user));
            println!("Updated: {}", display::format_user(&user));
        }
        Command::Donate {
            food_type,
            quantity,
            expiry_time,
            pickup_location,
        } => {
            let actor = ctx.current_user("donate")?;
            let draft = NewDonation {
                food_type,
                quantity,
                expiry_time,
                pickup_location,
            };
            let mut store = ctx.store.borrow_mut();
            let result = LifecycleEngine::new(&mut *store, &ctx.clock, &ctx.ids).create(&actor, draft);
            drop(store);
            let donation = ctx.checked("donate", Some(&actor), result)?;
            ctx.log(|log| log.donation_event("donation_created", &actor, &donation));
            println!("Listed donation {}", donation.id);
            println!("{}", display::format_donation(&donation));
        }
        Command::Accept { id } => {
            let actor = ctx.current_user("accept")?;
            let mut store = ctx.store.borrow_mut();
            let result = LifecycleEngine::new(&mut *store, &ctx.clock, &ctx.ids).accept(&id, &actor);
            drop(store);
            let donation = ctx.checked("accept", Some(&actor), result)?;
            ctx.log(|log| log.donation_event("donation_accepted", &actor, &donation));
            println!("Accepted: {}", display::format_donation(&donation));
        }
        Command::Assign { id } => {
            let actor = ctx.current_user("assign")?;
            let mut store = ctx.store.borrow_mut();
            let result =
                LifecycleEngine::new(&mut *store, &ctx.clock, &ctx.ids).assign_agent(&id, &actor);
            drop(store);
            let donation = ctx.checked("assign", Some(&actor), result)?;
            ctx.log(|log| log.donation_event("agent_assigned", &actor, &donation));
            println!("Claimed: {}", display::format_donation(&donation));
        }
        Command::Deliver { id } => {
            let actor = ctx.current_user("deliver")?;
            let mut store = ctx.store.borrow_mut();
            let result =
                LifecycleEngine::new(&mut *store, &ctx.clock, &ctx.ids).mark_delivered(&id, &actor);
            drop(store);
            let donation = ctx.checked("deliver", Some(&actor), result)?;
            ctx.log(|log| log.donation_event("donation_delivered", &actor, &donation));
            println!("Delivered: {}", display::format_donation(&donation));
        }
        Command::Show { id } => {
            let result = ctx.store.borrow().donation(&id);
            let donation = ctx.checked("show", None, result)?;
            print!("{}", display::format_donation_detail(&donation));
        }
        Command::List { all, status } => {
            let donations = ctx.store.borrow().donations()?;
            let filter = visible_to(ctx, all)?;
            let role = ctx.store.borrow().current_user()?.map(|u| u.role);
            let mut shown: Vec<_> = donations
                .iter()
                .filter(|d| {
                    filter.matches(d) || role.is_some_and(|r| DonationFilter::open_to(r, d))
                })
                .filter(|d| status.map_or(true, |s| d.status == s))
                .collect();
            shown.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            if shown.is_empty() {
                println!("No donations.");
            }
            for donation in shown {
                println!("{}", display::format_donation(donation));
            }
        }
        Command::Leaderboard => {
            let store = ctx.store.borrow();
            let board = aggregate::leaderboard(&store.donations()?, &store.users()?);
            print!("{}", display::format_leaderboard(&board));
        }
        Command::Weekly { all } => {
            let donations = ctx.store.borrow().donations()?;
            let filter = visible_to(ctx, all)?;
            let days = aggregate::weekly_series(filter.apply(&donations), &ctx.clock);
            print!("{}", display::format_week(&days));
        }
        Command::Stats { all } => {
            let donations = ctx.store.borrow().donations()?;
            let filter = visible_to(ctx, all)?;
            let visible = filter.apply(&donations);
            let counts = aggregate::status_distribution(visible.iter().copied());
            let summary = aggregate::summary(visible.iter().copied());
            print!("{}", display::format_status_counts(&counts));
            println!();
            print!("{}", display::format_summary(&summary));
        }
        Command::Notifications { unread } => {
            let actor = ctx.current_user("notifications")?;
            let mut notes = ctx.store.borrow().notifications_for(&actor.id)?;
            if unread {
                notes.retain(|n| !n.read);
            }
            print!("{}", display::format_notifications(&notes));
        }
        Command::Read { id } => {
            let actor = ctx.current_user("read")?;
            let result = ctx.store.borrow_mut().mark_notification_read(&actor.id, &id);
            ctx.checked("read", Some(&actor), result)?;
            println!("Marked {} read", id);
        }
        Command::Track {
            id,
            interval_ms,
            step,
        } => track(ctx, &id, interval_ms, step)?,
        Command::Seed => {
            let seeded = seed::seed_if_empty(&mut *ctx.store.borrow_mut(), &ctx.clock)?;
            if seeded {
                ctx.log(|log| log.sample_data_seeded());
                println!("Sample data loaded");
            } else {
                println!("Store already has users; nothing seeded");
            }
        }
        Command::Shell => bail!("already in a shell"),
    }
    Ok(())
}

/// Role-scoped filter for the current user, or everything with `--all`
fn visible_to(ctx: &Context, all: bool) -> Result<DonationFilter> {
    if all {
        return Ok(DonationFilter::All);
    }
    Ok(match ctx.store.borrow().current_user()? {
        Some(user) => DonationFilter::for_user(&user),
        None => DonationFilter::All,
    })
}

fn track(ctx: &Context, id: &str, interval_ms: Option<u64>, step: Option<u32>) -> Result<()> {
    let result = ctx.store.borrow().donation(id);
    let donation = ctx.checked("track", None, result)?;

    let tracking = TrackingConfig {
        interval_ms: interval_ms.or(ctx.config.tracking.interval_ms),
        step_percent: step.or(ctx.config.tracking.step_percent),
    };
    if let Some(e) = tracking.validate().first() {
        bail!("invalid tracking option {}", e);
    }
    let interval = Duration::from_millis(tracking.interval_ms());
    let mut state = TrackingState::new(
        &donation.id,
        DEMO_PICKUP,
        DEMO_DROPOFF,
        tracking.step_percent(),
    );

    match donation.status {
        DonationStatus::Available => {
            bail!("donation {} has not been accepted yet", donation.id)
        }
        DonationStatus::Delivered => state = state.with_progress(crate::tracking::COMPLETE),
        DonationStatus::Accepted | DonationStatus::InTransit => {}
    }

    println!(
        "Tracking {} ({}) from {}",
        donation.id, donation.food_type, donation.location
    );
    println!("{}", display::format_tracking(&state.update()));
    if state.is_complete() {
        return Ok(());
    }

    ctx.verbose(&format!(
        "tracking {} steps every {:?}",
        state.remaining_steps(),
        interval
    ));
    let timer = TrackingTimer::start(state, interval);
    while let Some(update) = timer.recv_timeout(interval + Duration::from_secs(5)) {
        println!("{}", display::format_tracking(&update));
    }
    if let Some(state) = timer.stop() {
        if state.is_complete() && donation.status != DonationStatus::Delivered {
            println!("Courier arrived. Run 'deliver {}' to confirm.", donation.id);
        }
    }
    Ok(())
}

pub fn run_repl(ctx: &Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("foodflow - type help for commands, exit to quit");

    loop {
        let prompt = match ctx.store.borrow().current_user() {
            Ok(Some(user)) => format!("{}@{}> ", user.name, user.role),
            _ => "foodflow> ".to_string(),
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                if handle_builtin(ctx, line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Run one shell line; returns true when the shell should exit
fn handle_builtin(ctx: &Context, line: &str) -> bool {
    match line {
        "exit" | "quit" => return true,
        "session" => {
            println!("Session: {}", ctx.session_id);
            println!("Data: {:?}", ctx.store.borrow().backend().dir());
            if let Some(log) = ctx.activity.borrow().as_ref() {
                println!("Activity: {:?}", log.path);
            }
            return false;
        }
        "verbose" => {
            let mut v = ctx.verbose.borrow_mut();
            *v = !*v;
            println!("Verbose: {}", if *v { "on" } else { "off" });
            return false;
        }
        _ => {}
    }

    let words = match shell_words::split(line) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("Error: {}", e);
            return false;
        }
    };
    match ShellLine::try_parse_from(&words) {
        Ok(ShellLine {
            command: Command::Shell,
        }) => println!("Already in the shell"),
        Ok(parsed) => {
            if let Err(e) = run(ctx, parsed.command) {
                eprintln!("Error: {}", e);
            }
        }
        // clap renders help and usage errors itself
        Err(e) => {
            let _ = e.print();
        }
    }
    false
}
