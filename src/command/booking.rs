// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use log::info;
use tokio::{select, signal};

use super::{check_snapshot, print_table, Context, Screen};
use crate::{
    api::model::{Booking, BookingStatus},
    booking::{BookingRequest, Duration},
    error::Result,
    poll::interval,
    profile::App,
    route::Location,
};

/// Book one or more PCs in a club's zone.
#[derive(Debug, Parser)]
pub(crate) struct Book {
    /// The club to book in.
    club: u64,

    /// The zone the PCs are in.
    #[arg(short, long)]
    zone: String,

    /// A PC to book. Repeat to book several at once.
    #[arg(short, long = "pc", value_name = "PC", required = true)]
    pcs: Vec<String>,

    /// How long to book for: 30m, 1h, 2h, 3h or 5h.
    #[arg(short, long, value_enum, default_value = "1h")]
    duration: Duration,

    /// The name the booking is held under.
    #[arg(short, long)]
    name: String,

    /// A phone number the club can reach you at.
    #[arg(long)]
    phone: String,
}

#[async_trait]
impl super::Command for Book {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::client(
            app,
            Location::new("/booking")
                .with_param("club", self.club)
                .with_param("zone", &self.zone),
        ))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let request = BookingRequest::new(
            &self.name,
            &self.phone,
            &self.zone,
            self.duration,
            self.pcs.clone(),
        )?;

        let created = ctx.api.create_booking(self.club, &request).await?;
        info!(
            "Booked {} PC(s) in zone {} of club {}",
            request.pc_names().len(),
            request.zone_name(),
            self.club
        );
        println!(
            "{}",
            created
                .message
                .unwrap_or_else(|| "Booking created.".to_owned())
        );
        if let Some(booking) = created.booking {
            print_table([booking], "");
        }
        Ok(())
    }
}

/// List bookings: your own, or the managed club's.
#[derive(Debug, Parser)]
pub(crate) struct Bookings {
    /// Keep the list up to date until interrupted.
    #[arg(short, long)]
    watch: bool,
}

impl Bookings {
    pub(crate) const fn new() -> Self {
        Self { watch: false }
    }

    fn render(bookings: &[Booking]) {
        print_table(bookings, "No bookings.");
    }
}

#[async_trait]
impl super::Command for Bookings {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(match app {
            App::Client => Screen::At(Location::new("/profile")),
            App::Manager => Screen::At(Location::new("/bookings")),
        })
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        if !self.watch {
            let bookings = match ctx.app {
                App::Client => ctx.api.my_bookings().await?,
                App::Manager => ctx.api.club_bookings().await?,
            };
            Self::render(&bookings);
            return Ok(());
        }

        let api = ctx.api.clone();
        let app = ctx.app;
        let mut sub = ctx
            .poller
            .subscribe("bookings", interval::MY_BOOKINGS, move || {
                let api = api.clone();
                async move {
                    match app {
                        App::Client => api.my_bookings().await,
                        App::Manager => api.club_bookings().await,
                    }
                }
            })
            .await?;

        loop {
            select! {
                snapshot = sub.changed() => {
                    let snapshot = snapshot?;
                    check_snapshot("bookings", &snapshot)?;
                    if let Some(bookings) = snapshot.value() {
                        Self::render(bookings);
                    }
                }
                interrupted = signal::ctrl_c() => {
                    interrupted?;
                    return Ok(());
                }
            }
        }
    }
}

/// Cancel one of your bookings.
#[derive(Debug, Parser)]
pub(crate) struct Cancel {
    id: u64,
}

#[async_trait]
impl super::Command for Cancel {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::client(app, Location::new("/profile")))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let resp = ctx.api.cancel_booking(self.id).await?;
        println!(
            "{}",
            resp.message
                .unwrap_or_else(|| format!("Booking {} cancelled.", self.id))
        );
        Ok(())
    }
}

/// Confirm, complete or cancel a booking at the managed club.
#[derive(Debug, Parser)]
pub(crate) struct SetBookingStatus {
    id: u64,

    #[arg(value_enum)]
    status: BookingStatus,
}

#[async_trait]
impl super::Command for SetBookingStatus {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::manager(app, Location::new("/bookings")))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let resp = ctx.api.set_booking_status(self.id, self.status).await?;
        println!(
            "{}",
            resp.message
                .unwrap_or_else(|| format!("Booking {} is now {}.", self.id, self.status))
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::*;
    use crate::{
        command::{testing::context, Command as _},
        error::{self, Error},
        session::{testing::user, Role, Session},
    };

    fn book(pcs: usize) -> Book {
        Book {
            club: 3,
            zone: "VIP".to_owned(),
            pcs: (1..=pcs).map(|i| format!("PC-{i:02}")).collect(),
            duration: Duration::TwoHours,
            name: "Alice".to_owned(),
            phone: "+7 900 000 00 00".to_owned(),
        }
    }

    #[tokio::test]
    async fn oversized_booking_never_reaches_the_server() -> Result<()> {
        let (ctx, transport) = context(App::Client).await;
        ctx.api
            .store()
            .login(Session::new("abc123", user(7, "alice", Role::Member))?)
            .await;

        let result = book(11).execute(&ctx).await;
        assert!(matches!(
            result,
            Err(Error::Validation(error::Validation::TooManyPcs { max: 10, got: 11 }))
        ));
        assert!(transport.recorded().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn valid_booking_is_submitted_once() -> Result<()> {
        let (ctx, transport) = context(App::Client).await;
        ctx.api
            .store()
            .login(Session::new("abc123", user(7, "alice", Role::Member))?)
            .await;
        transport
            .respond(
                Method::POST,
                "/api/public/clubs/3/bookings",
                201,
                r#"{"message": "Booked"}"#,
            )
            .await;

        book(2).execute(&ctx).await?;
        let recorded = transport.recorded().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].bearer.as_deref(), Some("abc123"));
        Ok(())
    }

    #[test]
    fn booking_screen_carries_club_and_zone() -> Result<()> {
        let Screen::At(location) = book(1).screen(App::Client)? else {
            return Err(Error::Command);
        };
        assert_eq!(location.to_string(), "/booking?club=3&zone=VIP");
        assert_eq!(book(1).screen(App::Manager)?, Screen::Unavailable);
        Ok(())
    }

    #[test]
    fn bookings_screen_depends_on_the_app() -> Result<()> {
        assert_eq!(
            Bookings::new().screen(App::Client)?,
            Screen::At(Location::new("/profile"))
        );
        assert_eq!(
            Bookings::new().screen(App::Manager)?,
            Screen::At(Location::new("/bookings"))
        );
        Ok(())
    }
}
