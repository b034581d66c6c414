// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    any::Any,
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use futures_util::lock::Mutex;
use log::{debug, trace};
use tokio::{
    select,
    sync::{watch, Notify},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::error::{self, Error, Result};

/// Refresh intervals of the screens that poll.
pub(crate) mod interval {
    use std::time::Duration;

    pub(crate) const OVERVIEW: Duration = Duration::from_secs(30);
    pub(crate) const PCS: Duration = Duration::from_secs(30);
    pub(crate) const MEMBERS: Duration = Duration::from_secs(30);
    pub(crate) const DAILY_CHART: Duration = Duration::from_secs(60);
    pub(crate) const MONTHLY_INCOME: Duration = Duration::from_secs(600);
    pub(crate) const MY_BOOKINGS: Duration = Duration::from_secs(10);
    pub(crate) const ZONE_PCS: Duration = Duration::from_secs(5);
}

/// The latest known state of a polled resource.
#[derive(Debug)]
pub(crate) enum Snapshot<T> {
    Loading,
    Ready(Arc<T>),
    Failed {
        error: Arc<Error>,
        last: Option<Arc<T>>,
    },
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Loading => Self::Loading,
            Self::Ready(value) => Self::Ready(Arc::clone(value)),
            Self::Failed { error, last } => Self::Failed {
                error: Arc::clone(error),
                last: last.clone(),
            },
        }
    }
}

impl<T> Snapshot<T> {
    /// The freshest value available, even if the latest fetch failed.
    pub(crate) fn value(&self) -> Option<&Arc<T>> {
        match self {
            Self::Loading => None,
            Self::Ready(value) => Some(value),
            Self::Failed { last, .. } => last.as_ref(),
        }
    }

    pub(crate) fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Loading | Self::Ready(_) => None,
        }
    }

    fn resolve(&mut self, result: Result<T>) {
        *self = match result {
            Ok(value) => Self::Ready(Arc::new(value)),
            Err(error) => Self::Failed {
                error: Arc::new(error),
                last: self.value().cloned(),
            },
        };
    }
}

struct Shared<T> {
    key: String,
    rx: watch::Receiver<Snapshot<T>>,
    refresh: Arc<Notify>,
    task: JoinHandle<()>,
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        debug!("No subscribers left for {}; stopping its poller", self.key);
        self.task.abort();
    }
}

/// A handle on a polled resource. The resource keeps being fetched for as
/// long as at least one handle for its key exists.
pub(crate) struct Subscription<T> {
    shared: Arc<Shared<T>>,
    rx: watch::Receiver<Snapshot<T>>,
}

impl<T> Subscription<T> {
    fn new(shared: Arc<Shared<T>>) -> Self {
        let rx = shared.rx.clone();
        Self { shared, rx }
    }

    pub(crate) fn latest(&self) -> Snapshot<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next fetch to resolve.
    pub(crate) async fn changed(&mut self) -> Result<Snapshot<T>> {
        self.rx
            .changed()
            .await
            .map_err(|_| error::Internal::ChannelClosed)?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Fetch again now instead of waiting for the interval.
    pub(crate) fn refresh(&self) {
        self.shared.refresh.notify_one();
    }
}

/// Shares one polling task per resource key among all of its subscribers.
#[derive(Clone, Default)]
pub(crate) struct Poller {
    registry: Arc<Mutex<HashMap<String, Weak<dyn Any + Send + Sync>>>>,
}

impl Poller {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn subscribe<T, F, Fut>(
        &self,
        key: &str,
        every: Duration,
        fetch: F,
    ) -> Result<Subscription<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut registry = self.registry.lock().await;
        registry.retain(|_, entry| entry.strong_count() > 0);

        if let Some(existing) = registry.get(key).and_then(Weak::upgrade) {
            let shared = existing
                .downcast::<Shared<T>>()
                .map_err(|_| error::Internal::SubscriptionType(key.to_owned()))?;
            trace!("Joining the existing poller for {}", key);
            return Ok(Subscription::new(shared));
        }

        debug!("Polling {} every {} seconds", key, every.as_secs());
        let (tx, rx) = watch::channel(Snapshot::Loading);
        let refresh = Arc::new(Notify::new());
        let task = tokio::spawn(run(key.to_owned(), every, fetch, tx, Arc::clone(&refresh)));
        let shared = Arc::new(Shared {
            key: key.to_owned(),
            rx,
            refresh,
            task,
        });
        let weak = Arc::downgrade(&shared);
        let entry: Weak<dyn Any + Send + Sync> = weak;
        let _ = registry.insert(key.to_owned(), entry);
        Ok(Subscription::new(shared))
    }

    #[cfg(test)]
    async fn active(&self) -> usize {
        self.registry
            .lock()
            .await
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }
}

async fn run<T, F, Fut>(
    key: String,
    every: Duration,
    fetch: F,
    tx: watch::Sender<Snapshot<T>>,
    refresh: Arc<Notify>,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            _ = ticker.tick() => {}
            () = refresh.notified() => {
                trace!("Refreshing {} on request", key);
                ticker.reset();
            }
        }

        let result = fetch().await;
        if let Err(e) = &result {
            debug!("Fetching {} failed: {}", key, e);
        }
        tx.send_modify(|snapshot| snapshot.resolve(result));
    }
}

/// One-shot data owned by a single view. Responses are only accepted while
/// the view that asked for them is still open.
pub(crate) struct ViewState<T> {
    open: Arc<AtomicBool>,
    value: Option<T>,
}

/// Proof of which view a request was issued for, captured before the
/// request goes out.
#[derive(Clone, Debug)]
pub(crate) struct Ticket {
    open: Arc<AtomicBool>,
}

impl Ticket {
    pub(crate) fn is_live(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl<T> ViewState<T> {
    pub(crate) fn new() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
            value: None,
        }
    }

    pub(crate) fn ticket(&self) -> Ticket {
        Ticket {
            open: Arc::clone(&self.open),
        }
    }

    /// Store a response unless its view has closed since the request went
    /// out. Returns whether the value was applied.
    pub(crate) fn apply(&mut self, ticket: &Ticket, value: T) -> bool {
        if !ticket.is_live() || !Arc::ptr_eq(&ticket.open, &self.open) {
            trace!("Discarding a response for a closed view");
            return false;
        }
        self.value = Some(value);
        true
    }

    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub(crate) fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

impl<T> Drop for ViewState<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_share_one_fetch() -> Result<()> {
        let poller = Poller::new();
        let calls = counter();

        let fetch = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1) }
            }
        };
        let mut first = poller
            .subscribe("overview", interval::OVERVIEW, fetch.clone())
            .await?;
        let mut second = poller
            .subscribe("overview", interval::OVERVIEW, fetch)
            .await?;

        let a = first.changed().await?;
        let b = second.changed().await?;
        assert_eq!(a.value().map(|v| **v), Some(1));
        assert_eq!(b.value().map(|v| **v), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(poller.active().await, 1);

        time::sleep(interval::OVERVIEW).await;
        assert_eq!(first.changed().await?.value().map(|v| **v), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn response_after_teardown_is_never_applied() -> Result<()> {
        let poller = Poller::new();
        let completed = Arc::new(AtomicBool::new(false));

        let sub = poller
            .subscribe("pcs", interval::PCS, {
                let completed = Arc::clone(&completed);
                move || {
                    let completed = Arc::clone(&completed);
                    async move {
                        time::sleep(Duration::from_secs(3)).await;
                        completed.store(true, Ordering::SeqCst);
                        Ok(())
                    }
                }
            })
            .await?;

        // Let the first fetch start, then leave the screen mid-request.
        time::sleep(Duration::from_secs(1)).await;
        assert!(matches!(sub.latest(), Snapshot::Loading));
        drop(sub);

        time::sleep(Duration::from_secs(60)).await;
        assert!(!completed.load(Ordering::SeqCst));
        assert_eq!(poller.active().await, 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_fetches_immediately() -> Result<()> {
        let poller = Poller::new();
        let calls = counter();

        let mut sub = poller
            .subscribe("monthly-income", interval::MONTHLY_INCOME, {
                let calls = Arc::clone(&calls);
                move || {
                    let calls = Arc::clone(&calls);
                    async move { Ok(calls.fetch_add(1, Ordering::SeqCst)) }
                }
            })
            .await?;
        let _ = sub.changed().await?;

        sub.refresh();
        let _ = sub.changed().await?;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_the_last_value() -> Result<()> {
        let poller = Poller::new();
        let calls = counter();

        let mut sub = poller
            .subscribe("members", interval::MEMBERS, {
                let calls = Arc::clone(&calls);
                move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                            Ok("alice")
                        } else {
                            Err(error::Api::Status {
                                status: 503,
                                message: None,
                            }
                            .into())
                        }
                    }
                }
            })
            .await?;

        let _ = sub.changed().await?;
        sub.refresh();
        let snapshot = sub.changed().await?;
        assert!(snapshot.error().is_some());
        assert_eq!(snapshot.value().map(|v| **v), Some("alice"));
        Ok(())
    }

    #[tokio::test]
    async fn key_reuse_with_another_type_is_refused() -> Result<()> {
        let poller = Poller::new();
        let _numbers = poller
            .subscribe("daily", interval::DAILY_CHART, || async { Ok(1_u32) })
            .await?;
        let strings = poller
            .subscribe("daily", interval::DAILY_CHART, || async { Ok("one") })
            .await;
        assert!(matches!(
            strings,
            Err(Error::Internal(error::Internal::SubscriptionType(_)))
        ));
        Ok(())
    }

    #[test]
    fn closed_view_rejects_late_responses() {
        let mut view = ViewState::new();
        let early = view.ticket();
        assert!(view.apply(&early, "first"));
        assert_eq!(view.value(), Some(&"first"));

        let late = view.ticket();
        view.close();
        assert!(!view.apply(&late, "second"));
        assert_eq!(view.value(), Some(&"first"));
    }

    #[test]
    fn tickets_belong_to_their_view() {
        let mut view = ViewState::new();
        let other = ViewState::<&str>::new();
        assert!(!view.apply(&other.ticket(), "stray"));
        assert_eq!(view.value(), None);
    }
}
