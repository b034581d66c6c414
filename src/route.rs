// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;
use tokio::sync::watch;
use url::Url;

use crate::{
    error::{self, Result},
    profile::App,
    session::SessionStore,
};

static APP_ORIGIN: Lazy<Option<Url>> = Lazy::new(|| Url::parse("clubctl://app/").ok());

/// A path within one of the applications, with its query parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Location {
    path: String,
    query: Vec<(String, String)>,
}

impl Location {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: vec![],
        }
    }

    pub(crate) fn with_param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_owned(), value.to_string()));
        self
    }

    pub(crate) fn parse(input: &str) -> Result<Self> {
        let url = APP_ORIGIN
            .as_ref()
            .ok_or_else(|| error::Validation::Location(input.to_owned()))?
            .join(input)
            .map_err(|_| error::Validation::Location(input.to_owned()))?;
        if url.scheme() != "clubctl" || url.host_str() != Some("app") {
            return Err(error::Validation::Location(input.to_owned()).into());
        }
        Ok(Self {
            path: url.path().to_owned(),
            query: url.query_pairs().into_owned().collect(),
        })
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)?;
        if !self.query.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.query)
                .finish();
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

/// Every screen of both applications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Route {
    Home,
    Map,
    Club { id: u64 },
    Auth,
    Profile,
    Booking { club: Option<u64>, zone: Option<String> },

    Login,
    Dashboard,
    Monitoring,
    Members,
    Bookings,
    Reviews,
    Settings,
    Admin,

    NotFound,
}

impl Route {
    pub(crate) fn resolve(app: App, location: &Location) -> Self {
        let segments = location
            .path()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        match app {
            App::Client => match segments.as_slice() {
                [] => Self::Home,
                ["map"] => Self::Map,
                ["club", id] => id
                    .parse()
                    .map_or(Self::NotFound, |id| Self::Club { id }),
                ["auth"] => Self::Auth,
                ["profile"] => Self::Profile,
                ["booking"] => Self::Booking {
                    club: location.param("club").and_then(|c| c.parse().ok()),
                    zone: location
                        .param("zone")
                        .map(str::trim)
                        .filter(|z| !z.is_empty())
                        .map(str::to_owned),
                },
                _ => Self::NotFound,
            },
            App::Manager => match segments.as_slice() {
                [] => Self::Dashboard,
                ["login"] => Self::Login,
                ["monitoring"] => Self::Monitoring,
                ["members"] => Self::Members,
                ["bookings"] => Self::Bookings,
                ["reviews"] => Self::Reviews,
                ["settings"] => Self::Settings,
                ["admin"] => Self::Admin,
                _ => Self::NotFound,
            },
        }
    }

    pub(crate) const fn is_protected(&self) -> bool {
        match self {
            Self::Profile
            | Self::Booking { .. }
            | Self::Dashboard
            | Self::Monitoring
            | Self::Members
            | Self::Bookings
            | Self::Reviews
            | Self::Settings
            | Self::Admin => true,
            Self::Home | Self::Map | Self::Club { .. } | Self::Auth | Self::Login | Self::NotFound => {
                false
            }
        }
    }

    const fn requires_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Outcome of checking a navigation request against the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Decision {
    Render(Route),
    Redirect { to: Location, from: Location },
    Forbidden(Route),
    NotFound(Location),
}

/// Decide whether `target` may be shown. Anonymous requests for protected
/// screens are sent to the login screen, carrying the original target along.
pub(crate) fn guard(app: App, store: &SessionStore, target: &Location) -> Decision {
    let route = Route::resolve(app, target);
    if route == Route::NotFound {
        return Decision::NotFound(target.clone());
    }
    if !route.is_protected() {
        return Decision::Render(route);
    }
    if !store.is_authenticated() {
        return Decision::Redirect {
            to: Location::new(app.login_path()),
            from: target.clone(),
        };
    }
    if route.requires_admin() && !store.is_admin() {
        return Decision::Forbidden(route);
    }
    Decision::Render(route)
}

#[derive(Clone, Debug)]
struct NavigationState {
    current: Location,
    return_to: Option<Location>,
    redirects: u64,
}

/// Tracks where the user is and where they should go after logging in.
#[derive(Clone)]
pub(crate) struct Navigator {
    app: App,
    state: Arc<watch::Sender<NavigationState>>,
}

impl Navigator {
    pub(crate) fn new(app: App) -> Self {
        let (state, _) = watch::channel(NavigationState {
            current: Location::new("/"),
            return_to: None,
            redirects: 0,
        });
        Self {
            app,
            state: Arc::new(state),
        }
    }

    pub(crate) fn current(&self) -> Location {
        self.state.borrow().current.clone()
    }

    pub(crate) fn return_to(&self) -> Option<Location> {
        self.state.borrow().return_to.clone()
    }

    pub(crate) fn redirects(&self) -> u64 {
        self.state.borrow().redirects
    }

    /// Move to `target` if the guard allows it; otherwise to wherever the
    /// guard says.
    pub(crate) fn navigate(&self, store: &SessionStore, target: Location) -> Decision {
        let decision = guard(self.app, store, &target);
        match &decision {
            Decision::Render(_) => {
                self.state.send_modify(|state| state.current = target);
            }
            Decision::Redirect { to, from } => {
                debug!("{} requires a session; redirecting to {}", from, to);
                self.state.send_modify(|state| {
                    state.current = to.clone();
                    state.return_to = Some(from.clone());
                    state.redirects += 1;
                });
            }
            Decision::Forbidden(_) | Decision::NotFound(_) => {}
        }
        decision
    }

    /// Send the user to the login screen from wherever they are now. A second
    /// call while the first redirect is still pending does nothing.
    pub(crate) fn redirect_to_login(&self) -> bool {
        let login = Location::new(self.app.login_path());
        self.state.send_if_modified(|state| {
            if state.current.path() == login.path() {
                return false;
            }
            state.return_to = Some(state.current.clone());
            state.current = login;
            state.redirects += 1;
            true
        })
    }

    /// Where to go once a login succeeds: the captured target, or home.
    pub(crate) fn after_login(&self) -> Location {
        let mut target = Location::new("/");
        self.state.send_modify(|state| {
            if let Some(return_to) = state.return_to.take() {
                target = return_to;
            }
            state.current = target.clone();
        });
        target
    }
}

#[cfg(test)]
mod tests {
    use crate::session::{testing::*, Role};

    use super::*;

    #[test]
    fn location_round_trips_query() -> Result<()> {
        let location = Location::parse("/booking?club=3&zone=VIP%20Room")?;
        assert_eq!(location.path(), "/booking");
        assert_eq!(location.param("club"), Some("3"));
        assert_eq!(location.param("zone"), Some("VIP Room"));
        assert_eq!(location.to_string(), "/booking?club=3&zone=VIP+Room");
        Ok(())
    }

    #[test]
    fn location_rejects_foreign_urls() {
        assert!(Location::parse("https://example.com/profile").is_err());
    }

    #[test]
    fn resolves_routes_per_app() {
        assert_eq!(
            Route::resolve(App::Client, &Location::new("/club/12")),
            Route::Club { id: 12 }
        );
        assert_eq!(
            Route::resolve(App::Client, &Location::new("/club/abc")),
            Route::NotFound
        );
        assert_eq!(
            Route::resolve(
                App::Client,
                &Location::new("/booking").with_param("club", 3).with_param("zone", " ")
            ),
            Route::Booking {
                club: Some(3),
                zone: None
            }
        );
        assert_eq!(
            Route::resolve(App::Manager, &Location::new("/")),
            Route::Dashboard
        );
        assert_eq!(
            Route::resolve(App::Manager, &Location::new("/map")),
            Route::NotFound
        );
    }

    #[tokio::test]
    async fn anonymous_request_is_redirected_and_returns_after_login() -> Result<()> {
        let store = anonymous().await;
        let navigator = Navigator::new(App::Client);
        let target = Location::new("/booking").with_param("club", 3);

        let decision = navigator.navigate(&store, target.clone());
        assert_eq!(
            decision,
            Decision::Redirect {
                to: Location::new("/auth"),
                from: target.clone()
            }
        );
        assert_eq!(navigator.current().path(), "/auth");

        store
            .login(crate::session::Session::new(
                "abc123",
                user(7, "alice", Role::Member),
            )?)
            .await;
        assert_eq!(navigator.after_login(), target);
        assert_eq!(navigator.current(), target);
        assert_eq!(navigator.return_to(), None);
        Ok(())
    }

    #[tokio::test]
    async fn authenticated_request_renders_directly() -> Result<()> {
        let store = logged_in("abc123", user(7, "alice", Role::Member)).await?;
        let navigator = Navigator::new(App::Client);

        let decision = navigator.navigate(&store, Location::new("/profile"));
        assert_eq!(decision, Decision::Render(Route::Profile));
        assert_eq!(navigator.redirects(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn public_routes_skip_the_guard() {
        let store = anonymous().await;
        assert_eq!(
            guard(App::Client, &store, &Location::new("/club/4")),
            Decision::Render(Route::Club { id: 4 })
        );
    }

    #[tokio::test]
    async fn admin_screen_needs_admin_role() -> Result<()> {
        let manager = logged_in("abc123", user(2, "boss", Role::Manager)).await?;
        assert_eq!(
            guard(App::Manager, &manager, &Location::new("/admin")),
            Decision::Forbidden(Route::Admin)
        );

        let admin = logged_in("abc123", user(1, "root", Role::Admin)).await?;
        assert_eq!(
            guard(App::Manager, &admin, &Location::new("/admin")),
            Decision::Render(Route::Admin)
        );
        Ok(())
    }

    #[test]
    fn repeated_redirects_collapse() {
        let navigator = Navigator::new(App::Manager);
        navigator
            .state
            .send_modify(|state| state.current = Location::new("/monitoring"));

        assert!(navigator.redirect_to_login());
        assert!(!navigator.redirect_to_login());
        assert_eq!(navigator.redirects(), 1);
        assert_eq!(navigator.after_login(), Location::new("/monitoring"));
    }
}
