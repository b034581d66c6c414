// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use futures_util::lock::Mutex;
use log::debug;
use tokio::{select, signal, task::JoinHandle};

use super::{check_snapshot, print_table, stdin_lines, Context, Screen};
use crate::{
    api::{
        model::{PcStatus, ReviewList, ZonePcs},
        ApiClient,
    },
    error::{self, Result},
    poll::{interval, ViewState},
    profile::App,
    route::Location,
    session::idle::Activity,
};

/// List the clubs on the map.
#[derive(Debug, Parser)]
pub(crate) struct Clubs {
    /// Only show clubs that are open right now.
    #[arg(long)]
    open: bool,

    /// Only show clubs whose name or address contains this text.
    #[arg(short, long)]
    search: Option<String>,
}

impl Clubs {
    pub(crate) const fn new() -> Self {
        Self {
            open: false,
            search: None,
        }
    }
}

#[async_trait]
impl super::Command for Clubs {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::client(app, Location::new("/map")))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let needle = self.search.as_deref().map(str::to_lowercase);
        let clubs = ctx.api.clubs().await?;
        print_table(
            clubs.iter().filter(|club| {
                (!self.open || club.is_open)
                    && needle.as_deref().map_or(true, |needle| {
                        club.name.to_lowercase().contains(needle)
                            || club.address.to_lowercase().contains(needle)
                    })
            }),
            "No clubs found.",
        );
        Ok(())
    }
}

/// Show a club with its zones and latest reviews.
#[derive(Debug, Parser)]
pub(crate) struct Club {
    id: u64,
}

impl Club {
    pub(crate) const fn new(id: u64) -> Self {
        Self { id }
    }
}

#[async_trait]
impl super::Command for Club {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::client(app, Location::new(format!("/club/{}", self.id))))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let reviews = Arc::new(Mutex::new(ViewState::new()));
        let loading = load_reviews(ctx.api.clone(), self.id, Arc::clone(&reviews)).await;

        let detail = match ctx.api.club(self.id).await {
            Ok(detail) => detail,
            Err(e) => {
                reviews.lock().await.close();
                return Err(e);
            }
        };
        loading.await??;
        let club = &detail.club;
        println!("{} (#{})", club.name, club.id);
        if !club.address.is_empty() {
            println!("{}", club.address);
        }
        println!(
            "{} · {} of {} PCs free · rated {:.1}",
            if club.is_open { "Open" } else { "Closed" },
            club.pcs_free,
            club.pcs_total,
            club.rating
        );
        if let Some(hours) = &club.working_hours {
            println!("Hours: {hours}");
        }
        if let Some(description) = &club.description {
            println!("\n{description}");
        }
        println!();
        print_table(&detail.zones, "This club has no zones listed.");

        if let Some(reviews) = reviews.lock().await.value() {
            println!(
                "\n{:.1} average from {} ratings",
                reviews.average_rating, reviews.rating_count
            );
            print_table(reviews.reviews.iter().take(5), "No reviews yet.");
        }
        Ok(())
    }
}

/// Fetch a club's reviews into `view` in the background. A view closed
/// before the response arrives stays empty.
async fn load_reviews(
    api: ApiClient,
    id: u64,
    view: Arc<Mutex<ViewState<ReviewList>>>,
) -> JoinHandle<Result<()>> {
    let ticket = view.lock().await.ticket();
    tokio::spawn(async move {
        match api.club_reviews(id).await {
            Ok(list) => {
                if view.lock().await.apply(&ticket, list) {
                    debug!("Loaded reviews for club {id}");
                }
                Ok(())
            }
            Err(e) if e.is_authentication_rejected() => Err(e),
            // A club without reviews still renders.
            Err(_) => Ok(()),
        }
    })
}

/// Show reviews: of one club, or of the managed club.
#[derive(Debug, Parser)]
pub(crate) struct Reviews {
    /// The club to show reviews for. Not used by the manager application.
    club: Option<u64>,
}

impl Reviews {
    pub(crate) const fn for_manager() -> Self {
        Self { club: None }
    }
}

#[async_trait]
impl super::Command for Reviews {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(match app {
            App::Client => {
                let club = self.club.ok_or(error::Validation::EmptyField("club"))?;
                Screen::At(Location::new(format!("/club/{club}")))
            }
            App::Manager => Screen::At(Location::new("/reviews")),
        })
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let list = match (ctx.app, self.club) {
            (App::Client, Some(club)) => ctx.api.club_reviews(club).await?,
            (App::Client, None) => return Err(error::Validation::EmptyField("club").into()),
            (App::Manager, _) => ctx.api.club_reviews_for_manager().await?,
        };
        println!(
            "{:.1} average from {} ratings",
            list.average_rating, list.rating_count
        );
        print_table(&list.reviews, "No reviews yet.");
        Ok(())
    }
}

/// Show the PCs of a zone and whether they can be booked.
#[derive(Debug, Parser)]
pub(crate) struct ZonePcsCommand {
    club: u64,

    /// The zone's name.
    zone: String,

    /// Keep the list up to date until interrupted.
    #[arg(short, long)]
    watch: bool,
}

impl ZonePcsCommand {
    pub(crate) const fn new(club: u64, zone: String) -> Self {
        Self {
            club,
            zone,
            watch: false,
        }
    }

    fn render(pcs: &ZonePcs) {
        let free = pcs
            .pcs
            .iter()
            .filter(|pc| pc.status == PcStatus::Free)
            .count();
        println!("{free} of {} PCs free", pcs.pcs.len());
        print_table(&pcs.pcs, "This zone has no PCs.");
    }
}

#[async_trait]
impl super::Command for ZonePcsCommand {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::client(
            app,
            Location::new("/booking")
                .with_param("club", self.club)
                .with_param("zone", &self.zone),
        ))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        if !self.watch {
            Self::render(&ctx.api.zone_pcs(self.club, &self.zone).await?);
            return Ok(());
        }

        let mut sub = ctx
            .poller
            .subscribe(
                &format!("zone-pcs/{}/{}", self.club, self.zone),
                interval::ZONE_PCS,
                {
                    let (api, club, zone) = (ctx.api.clone(), self.club, self.zone.clone());
                    move || {
                        let (api, zone) = (api.clone(), zone.clone());
                        async move { api.zone_pcs(club, &zone).await }
                    }
                },
            )
            .await?;
        // Another view may already be polling this zone.
        if let Some(pcs) = sub.latest().value() {
            Self::render(pcs);
        }
        let mut input = stdin_lines();
        let mut reading = true;

        loop {
            select! {
                snapshot = sub.changed() => {
                    let snapshot = snapshot?;
                    check_snapshot("the PC list", &snapshot)?;
                    if let Some(pcs) = snapshot.value() {
                        Self::render(pcs);
                    }
                }
                line = input.recv(), if reading => {
                    if line.is_none() {
                        reading = false;
                        continue;
                    }
                    ctx.record(Activity::Key);
                    sub.refresh();
                }
                interrupted = signal::ctrl_c() => {
                    interrupted?;
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::*;
    use crate::{command::testing::context, command::Command as _};

    #[tokio::test]
    async fn client_only_commands_are_unavailable_to_managers() -> Result<()> {
        let (ctx, _) = context(App::Manager).await;
        assert_eq!(Clubs::new().screen(ctx.app)?, Screen::Unavailable);
        Ok(())
    }

    #[test]
    fn client_reviews_need_a_club() {
        assert!(Reviews { club: None }.screen(App::Client).is_err());
        assert!(matches!(
            Reviews { club: None }.screen(App::Manager),
            Ok(Screen::At(_))
        ));
    }

    #[tokio::test]
    async fn club_renders_without_reviews() -> Result<()> {
        let (ctx, transport) = context(App::Client).await;
        transport
            .respond(
                Method::GET,
                "/api/public/clubs/3",
                200,
                r#"{"id": 3, "name": "Arena", "zones": [{"name": "VIP"}]}"#,
            )
            .await;
        transport
            .respond(Method::GET, "/api/public/clubs/3/reviews", 500, "")
            .await;

        Club { id: 3 }.execute(&ctx).await?;
        assert_eq!(transport.recorded().await.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn reviews_arriving_after_close_are_dropped() -> Result<()> {
        let (ctx, transport) = context(App::Client).await;
        transport
            .respond(
                Method::GET,
                "/api/public/clubs/3/reviews",
                200,
                r#"{"reviews": [], "average_rating": 4.5, "rating_count": 2}"#,
            )
            .await;

        let view = Arc::new(Mutex::new(ViewState::new()));
        let loading = load_reviews(ctx.api.clone(), 3, Arc::clone(&view)).await;
        view.lock().await.close();
        loading.await??;

        assert_eq!(transport.recorded().await.len(), 1);
        assert!(view.lock().await.value().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn reviews_load_into_an_open_view() -> Result<()> {
        let (ctx, transport) = context(App::Client).await;
        transport
            .respond(
                Method::GET,
                "/api/public/clubs/3/reviews",
                200,
                r#"{"reviews": [], "average_rating": 4.5, "rating_count": 2}"#,
            )
            .await;

        let view = Arc::new(Mutex::new(ViewState::new()));
        load_reviews(ctx.api.clone(), 3, Arc::clone(&view)).await.await??;

        let view = view.lock().await;
        assert_eq!(view.value().map(|r| r.rating_count), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn club_failure_is_reported_even_when_reviews_load() -> Result<()> {
        let (ctx, transport) = context(App::Client).await;
        transport
            .respond(Method::GET, "/api/public/clubs/3", 500, "")
            .await;
        transport
            .respond(Method::GET, "/api/public/clubs/3/reviews", 200, "{}")
            .await;

        let result = Club { id: 3 }.execute(&ctx).await;
        assert!(matches!(
            result,
            Err(error::Error::Api(error::Api::Status { status: 500, .. }))
        ));
        Ok(())
    }
}
