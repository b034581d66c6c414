// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    io::{self, BufRead as _},
    sync::Arc,
    thread,
};

use async_trait::async_trait;
use log::{debug, info};
use tabled::{settings::Style, Table, Tabled};
use tokio::sync::mpsc;

use crate::{
    api::ApiClient,
    error::{self, Error, Result},
    password,
    poll::{Poller, Snapshot},
    profile::App,
    route::Location,
    session::idle::{Activity, IdleWatchdog},
};

pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod booking;
pub(crate) mod clubs;
pub(crate) mod manager;
pub(crate) mod open;

/// Everything a command needs to talk to the server and the user.
#[derive(Clone)]
pub(crate) struct Context {
    pub(crate) app: App,
    pub(crate) api: ApiClient,
    pub(crate) poller: Poller,
    pub(crate) prompt: Arc<dyn password::Prompt>,
    pub(crate) idle: Option<Arc<IdleWatchdog>>,
}

impl Context {
    /// Count `activity` towards keeping the session alive.
    pub(crate) fn record(&self, activity: Activity) {
        if let Some(idle) = &self.idle {
            idle.record(activity);
        }
    }

    /// Count this invocation as activity. The stamp is written here rather
    /// than left to the watchdog, which stops as soon as the command exits.
    pub(crate) async fn begin_invocation(&self) {
        self.record(Activity::Command);
        self.api.store().touch().await;
    }
}

/// Where a command sits among the application's screens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Screen {
    /// Runs without consulting the route guard.
    Unguarded,
    /// Shows the screen at this location, subject to the route guard.
    At(Location),
    /// The command belongs to the other application.
    Unavailable,
}

impl Screen {
    pub(crate) fn client(app: App, location: Location) -> Self {
        match app {
            App::Client => Self::At(location),
            App::Manager => Self::Unavailable,
        }
    }

    pub(crate) fn manager(app: App, location: Location) -> Self {
        match app {
            App::Manager => Self::At(location),
            App::Client => Self::Unavailable,
        }
    }
}

#[async_trait]
pub(crate) trait Command: Sync {
    fn screen(&self, app: App) -> Result<Screen>;

    async fn execute(&self, ctx: &Context) -> Result<()>;
}

/// Print rows as a rounded table, or `empty` when there are none.
pub(crate) fn print_table<T: Tabled>(rows: impl IntoIterator<Item = T>, empty: &str) {
    let mut rows = rows.into_iter().peekable();
    if rows.peek().is_none() {
        println!("{empty}");
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Lines typed on standard input. They are read on a detached thread so a
/// pending read never holds up shutdown; the channel closes at end of input.
pub(crate) fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = thread::Builder::new()
        .name("stdin".to_owned())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        debug!("Could not read standard input: {}", e);
    }
    rx
}

/// Turn a failed poll into an error that ends the screen, if it should.
/// Anything other than a refused token is shown and polling carries on.
pub(crate) fn check_snapshot<T>(what: &str, snapshot: &Snapshot<T>) -> Result<()> {
    match snapshot.error() {
        Some(Error::Api(error::Api::AuthenticationRejected { status })) => {
            Err(error::Api::AuthenticationRejected { status: *status }.into())
        }
        Some(Error::Api(api)) => {
            eprintln!("Could not refresh {what}: {}", api.user_message());
            Ok(())
        }
        Some(e) => {
            info!("Could not refresh {}: {}", what, e);
            eprintln!("Could not refresh {what}; showing the last known data");
            Ok(())
        }
        None => Ok(()),
    }
}
