// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;

use super::{
    admin::{AdminClubs, AdminUsers},
    auth::Whoami,
    booking::Bookings,
    clubs::{Club, Clubs, Reviews, ZonePcsCommand},
    manager::{Config, Members, OverviewCommand, Pcs},
    Command as _, Context, Screen,
};
use crate::{
    api::model::Zone,
    error::{self, Result},
    profile::App,
    route::{Location, Route},
};

/// Open a screen by its path, such as `/club/3` or `/booking?club=3&zone=VIP`.
#[derive(Debug, Parser)]
pub(crate) struct Open {
    path: String,
}

#[async_trait]
impl super::Command for Open {
    fn screen(&self, _app: App) -> Result<Screen> {
        Ok(Screen::At(Location::parse(&self.path)?))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let location = Location::parse(&self.path)?;
        match Route::resolve(ctx.app, &location) {
            Route::Home | Route::Map => Clubs::new().execute(ctx).await,
            Route::Club { id } => Club::new(id).execute(ctx).await,
            Route::Auth | Route::Login => match ctx.api.store().user() {
                Some(user) => {
                    println!("Logged in as {} ({}).", user.username, user.role);
                    Ok(())
                }
                None => {
                    println!("Run `login` to log in.");
                    Ok(())
                }
            },
            Route::Profile => {
                Whoami {}.execute(ctx).await?;
                Bookings::new().execute(ctx).await
            }
            Route::Booking {
                club: Some(club),
                zone,
            } => {
                let zone = match zone {
                    Some(zone) => zone,
                    None => {
                        let detail = ctx.api.club(club).await?;
                        detail
                            .pick_zone(None)
                            .map(|Zone { name, .. }| name.clone())
                            .ok_or(error::Validation::EmptyField("zone"))?
                    }
                };
                ZonePcsCommand::new(club, zone).execute(ctx).await
            }
            Route::Booking { club: None, .. } => {
                Err(error::Validation::EmptyField("club").into())
            }
            Route::Dashboard => OverviewCommand::new().execute(ctx).await,
            Route::Monitoring => Pcs::new().execute(ctx).await,
            Route::Members => Members::new().execute(ctx).await,
            Route::Bookings => Bookings::new().execute(ctx).await,
            Route::Reviews => Reviews::for_manager().execute(ctx).await,
            Route::Settings => Config::new().execute(ctx).await,
            Route::Admin => {
                AdminClubs::new().execute(ctx).await?;
                AdminUsers::new().execute(ctx).await
            }
            Route::NotFound => Err(error::Validation::Location(self.path.clone()).into()),
        }
    }
}
