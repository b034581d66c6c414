// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths)]
#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused,
    unused_lifetimes,
    unused_qualifications,
    unused_results,
    anonymous_parameters,
    deprecated_in_future,
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    keyword_idents,
    macro_use_extern_crate,
    missing_doc_code_examples,
    private_doc_tests,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::unseparated_literal_suffix,
    clippy::decimal_literal_representation,
    clippy::single_char_lifetime_names,
    clippy::fallible_impl_from,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::wildcard_enum_match_arm,
    clippy::deref_by_slicing,
    clippy::default_numeric_fallback,
    clippy::shadow_reuse,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::string_add,
    clippy::use_debug,
    clippy::future_not_send
)]
#![cfg_attr(not(test), warn(clippy::panic_in_result_fn))]

mod api;
mod booking;
mod command;
mod error;
mod metadata;
mod password;
mod poll;
mod profile;
mod route;
mod session;
mod storage;

use std::{path::PathBuf, process, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use command::{admin, auth, booking as book, clubs, manager, open, Context, Screen};
use error::Result;
use log::{debug, error, warn};
use profile::App;
use route::Decision;
use serde::{Deserialize, Serialize};
use session::{
    idle::IdleWatchdog,
    SessionStorage, SessionStore,
};
use url::Url;

#[derive(Debug, Subcommand)]
enum Command {
    Login(auth::Login),
    Logout(auth::Logout),
    Whoami(auth::Whoami),
    Register(auth::Register),
    Verify(auth::Verify),
    ResendCode(auth::ResendCode),

    Clubs(clubs::Clubs),
    Club(clubs::Club),
    Reviews(clubs::Reviews),
    ZonePcs(clubs::ZonePcsCommand),
    Book(book::Book),
    Bookings(book::Bookings),
    Cancel(book::Cancel),
    BookingStatus(book::SetBookingStatus),

    Overview(manager::OverviewCommand),
    Pcs(manager::Pcs),
    Members(manager::Members),
    Monitor(manager::Monitor),
    Config(manager::Config),
    Health(manager::Health),
    AdminClubs(admin::AdminClubs),
    AdminUsers(admin::AdminUsers),

    Open(open::Open),
}

impl Command {
    fn as_command(&self) -> &dyn command::Command {
        match self {
            Self::Login(cmd) => cmd,
            Self::Logout(cmd) => cmd,
            Self::Whoami(cmd) => cmd,
            Self::Register(cmd) => cmd,
            Self::Verify(cmd) => cmd,
            Self::ResendCode(cmd) => cmd,
            Self::Clubs(cmd) => cmd,
            Self::Club(cmd) => cmd,
            Self::Reviews(cmd) => cmd,
            Self::ZonePcs(cmd) => cmd,
            Self::Book(cmd) => cmd,
            Self::Bookings(cmd) => cmd,
            Self::Cancel(cmd) => cmd,
            Self::BookingStatus(cmd) => cmd,
            Self::Overview(cmd) => cmd,
            Self::Pcs(cmd) => cmd,
            Self::Members(cmd) => cmd,
            Self::Monitor(cmd) => cmd,
            Self::Config(cmd) => cmd,
            Self::Health(cmd) => cmd,
            Self::AdminClubs(cmd) => cmd,
            Self::AdminUsers(cmd) => cmd,
            Self::Open(cmd) => cmd,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// The base URL of the club service.
    #[arg(long, env = "CLUBCTL_URL", default_value = "http://127.0.0.1:8000", value_parser = Url::parse)]
    url: Url,

    /// Which application to act as. Each keeps its own session.
    #[arg(long, env = "CLUBCTL_APP", value_enum, default_value_t)]
    app: App,

    /// End the session after this many seconds without activity. Use 0 to
    /// never time out. The manager application defaults to two hours.
    #[arg(long, env = "CLUBCTL_IDLE_TIMEOUT", value_name = "SECONDS")]
    idle_timeout: Option<u64>,

    /// Keep the session in memory only, so it ends with this invocation.
    #[arg(long)]
    no_persist_session: bool,

    /// The path to the Pinentry program to use when asking for a password.
    #[arg(long, value_hint = clap::ValueHint::ExecutablePath)]
    pinentry_program: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

impl Args {
    fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => self.app.default_idle_timeout(),
        }
    }
}

async fn get_session_storage<
    T: Send + Serialize + Sync + for<'de> Deserialize<'de> + Clone + 'static,
>(
    args: &Args,
    key: &str,
) -> Box<dyn storage::Storage<T>> {
    use storage::IsPersistent as _;

    let slot = storage::Slot::new(&args.url, key);
    let storage = open_session_storage(args, &slot).await;
    debug!("Keeping {} in {}", slot.account(), storage.backend());
    storage
}

async fn open_session_storage<
    T: Send + Serialize + Sync + for<'de> Deserialize<'de> + Clone + 'static,
>(
    args: &Args,
    slot: &storage::Slot,
) -> Box<dyn storage::Storage<T>> {
    if !args.no_persist_session {
        #[cfg(feature = "secret-service")]
        match storage::SecretService::new(slot).await {
            Ok(secret_service_storage) => return Box::new(secret_service_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to the secret service: {}", e);
            }
        }

        #[cfg(feature = "keychain")]
        match storage::Keychain::new(slot) {
            Ok(keychain_storage) => return Box::new(keychain_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to Keychain: {}", e);
            }
        }

        if let Some(file_storage) = storage::File::new(slot) {
            return Box::new(file_storage);
        }
        warn!("No data directory is available; the session will not be kept");
    }

    Box::new(storage::Memory::<T>::new())
}

/// Run the route guard for a command's screen, logging in first when the
/// screen needs a session.
async fn enter(ctx: &Context, screen: &Screen) -> Result<()> {
    let location = match screen {
        Screen::Unguarded => return Ok(()),
        Screen::Unavailable => {
            error!("This command is not available in the {} application", ctx.app);
            return Err(error::Error::Command);
        }
        Screen::At(location) => location.clone(),
    };

    let navigator = ctx.api.navigator();
    let decision = match navigator.navigate(ctx.api.store(), location.clone()) {
        Decision::Redirect { .. } => {
            if let Some(target) = navigator.return_to() {
                eprintln!("Log in to continue to {target}.");
            }
            let _ = auth::interactive_login(ctx, None).await?;
            let target = navigator.after_login();
            debug!("Logged in; continuing to {}", target);
            navigator.navigate(ctx.api.store(), target)
        }
        decision => decision,
    };

    match decision {
        Decision::Render(_) => {
            debug!("Showing {}", navigator.current());
            Ok(())
        }
        Decision::Redirect { from, .. } => {
            error!("Could not log in to open {}", from);
            Err(error::Error::Command)
        }
        Decision::Forbidden(_) => {
            error!(
                "{} accounts may not open {}; an administrator account is required",
                ctx.api
                    .store()
                    .role()
                    .map_or_else(|| "Anonymous".to_owned(), |role| role.to_string()),
                location
            );
            Err(error::Error::Command)
        }
        Decision::NotFound(missing) => {
            Err(error::Validation::Location(missing.to_string()).into())
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let idle_timeout = args.idle_timeout();
    let storage = SessionStorage {
        token: get_session_storage(&args, &args.app.token_key()).await,
        user: get_session_storage(&args, &args.app.user_key()).await,
        activity: get_session_storage(&args, &args.app.activity_key()).await,
    };
    let store = SessionStore::restore(storage, idle_timeout).await;

    let idle = idle_timeout.map(|timeout| Arc::new(IdleWatchdog::spawn(store.clone(), timeout)));

    let prompt: Vec<Box<dyn password::Prompt>> = vec![
        Box::new(args.pinentry_program.clone().map_or_else(
            password::PinentryPrompt::new,
            password::PinentryPrompt::new_with_executable,
        )),
        Box::new(password::RpasswordPrompt),
    ];

    let navigator = route::Navigator::new(args.app);
    let transport = Arc::new(api::transport::ReqwestTransport::new()?);
    let ctx = Context {
        app: args.app,
        api: api::ApiClient::new(transport, args.url.clone(), store, navigator),
        poller: poll::Poller::new(),
        prompt: Arc::new(prompt),
        idle,
    };
    ctx.begin_invocation().await;

    let cmd = args.command.as_command();
    let screen = cmd.screen(ctx.app)?;
    enter(&ctx, &screen).await?;

    match cmd.execute(&ctx).await {
        Err(e) if e.is_authentication_rejected() && matches!(screen, Screen::At(_)) => {
            eprintln!("Your session has expired. Log in again to continue.");
            let _ = auth::interactive_login(&ctx, None).await?;
            let _ = ctx.api.navigator().after_login();
            cmd.execute(&ctx).await
        }
        result => result,
    }
}

#[tokio::main]
async fn main() {
    let logger_env = env_logger::Env::new()
        .filter_or("CLUBCTL_LOG", "warn")
        .write_style("CLUBCTL_LOG_STYLE");
    env_logger::Builder::from_env(logger_env).init();

    if let Err(e) = run(Args::parse()).await {
        error!("We encountered an error: {}", e);
        process::exit(1);
    };
}
