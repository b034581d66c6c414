// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use log::{debug, info};
use tokio::{
    select,
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

use super::SessionStore;

/// User interaction that keeps a session alive. A terminal only produces
/// key presses and whole commands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Activity {
    Key,
    Command,
}

/// Ends the session after a period without [`Activity`].
///
/// The timer only runs while someone is logged in and re-arms on every login.
pub(crate) struct IdleWatchdog {
    tx: mpsc::Sender<Activity>,
    task: JoinHandle<()>,
}

impl IdleWatchdog {
    pub(crate) fn spawn(store: SessionStore, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(watch(store, timeout, rx));
        Self { tx, task }
    }

    pub(crate) fn record(&self, activity: Activity) {
        // A full queue already guarantees a pending timer reset.
        if self.tx.try_send(activity).is_err() {
            debug!("Dropped activity event {:?}", activity);
        }
    }
}

impl Drop for IdleWatchdog {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn watch(store: SessionStore, timeout: Duration, mut activity_rx: mpsc::Receiver<Activity>) {
    let mut state_rx = store.subscribe();

    loop {
        loop {
            let authenticated = state_rx.borrow_and_update().is_some();
            if authenticated {
                break;
            }
            if state_rx.changed().await.is_err() {
                return;
            }
        }

        let deadline = time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            select! {
                () = &mut deadline => {
                    info!("No activity for {} seconds; logging out", timeout.as_secs());
                    let _ = store.logout().await;
                    break;
                }
                activity = activity_rx.recv() => {
                    let Some(activity) = activity else {
                        return;
                    };
                    debug!("Activity {:?}; idle timer restarted", activity);
                    deadline.as_mut().reset(Instant::now() + timeout);
                    store.touch().await;
                }
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let authenticated = state_rx.borrow_and_update().is_some();
                    if !authenticated {
                        break;
                    }
                    deadline.as_mut().reset(Instant::now() + timeout);
                }
            }
        }
    }
}
