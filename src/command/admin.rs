// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use secrecy::ExposeSecret as _;

use super::{print_table, Context, Screen};
use crate::{
    api::model::{ClubChanges, UserChanges},
    error::{self, Result},
    password::RequestBuilder,
    profile::App,
    route::Location,
    session::Role,
};

fn admin_screen(app: App) -> Screen {
    Screen::manager(app, Location::new("/admin"))
}

#[derive(Debug, Args)]
pub(crate) struct ClubFields {
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    address: Option<String>,

    /// The club's ID in the club management system.
    #[arg(long)]
    cafe_id: Option<String>,

    /// The club's key for the club management system.
    #[arg(long)]
    api_key: Option<String>,
}

impl From<&ClubFields> for ClubChanges {
    fn from(fields: &ClubFields) -> Self {
        Self {
            name: fields.name.clone(),
            address: fields.address.clone(),
            cafe_id: fields.cafe_id.clone(),
            api_key: fields.api_key.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum ClubAction {
    /// List every club.
    List,
    /// Add a club.
    Create(ClubFields),
    /// Change a club.
    Update {
        id: u64,

        #[command(flatten)]
        fields: ClubFields,
    },
}

/// Manage clubs. Administrators only.
#[derive(Debug, Parser)]
pub(crate) struct AdminClubs {
    #[command(subcommand)]
    action: Option<ClubAction>,
}

impl AdminClubs {
    pub(crate) const fn new() -> Self {
        Self { action: None }
    }
}

#[async_trait]
impl super::Command for AdminClubs {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(admin_screen(app))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        match self.action.as_ref().unwrap_or(&ClubAction::List) {
            ClubAction::List => {
                print_table(ctx.api.admin_clubs().await?, "No clubs.");
            }
            ClubAction::Create(fields) => {
                if fields.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
                    return Err(error::Validation::EmptyField("name").into());
                }
                let club = ctx.api.create_club(&fields.into()).await?;
                print_table([club], "");
            }
            ClubAction::Update { id, fields } => {
                let club = ctx.api.update_club(*id, &fields.into()).await?;
                print_table([club], "");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Subcommand)]
enum UserAction {
    /// List every account.
    List,
    /// Change an account's role or club.
    Update {
        id: u64,

        #[arg(long, value_enum)]
        role: Option<Role>,

        #[arg(long)]
        club: Option<u64>,
    },
    /// Remove an account.
    Delete { id: u64 },
    /// Create a staff account for a club. The password is asked for.
    Assign {
        username: String,

        #[arg(long)]
        club: u64,

        #[arg(long, value_enum, default_value = "manager")]
        role: Role,
    },
}

/// Manage accounts. Administrators only.
#[derive(Debug, Parser)]
pub(crate) struct AdminUsers {
    #[command(subcommand)]
    action: Option<UserAction>,
}

impl AdminUsers {
    pub(crate) const fn new() -> Self {
        Self { action: None }
    }
}

#[async_trait]
impl super::Command for AdminUsers {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(admin_screen(app))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        match self.action.as_ref().unwrap_or(&UserAction::List) {
            UserAction::List => {
                print_table(ctx.api.admin_users().await?, "No accounts.");
            }
            UserAction::Update { id, role, club } => {
                let changes = UserChanges {
                    role: *role,
                    club_id: *club,
                };
                let user = ctx.api.update_user(*id, &changes).await?;
                print_table([user], "");
            }
            UserAction::Delete { id } => {
                let resp = ctx.api.delete_user(*id).await?;
                println!(
                    "{}",
                    resp.message
                        .unwrap_or_else(|| format!("Account {id} removed."))
                );
            }
            UserAction::Assign {
                username,
                club,
                role,
            } => {
                let password = ctx
                    .prompt
                    .prompt(
                        RequestBuilder::new()
                            .for_account(username, ctx.api.base().host_str().unwrap_or("the server"))
                            .into_request(),
                    )
                    .await?
                    .ok_or(error::Password::NoPrompt)?;
                let resp = ctx
                    .api
                    .assign_user(username, password.expose_secret(), *club, *role)
                    .await?;
                println!(
                    "{}",
                    resp.message
                        .unwrap_or_else(|| format!("{username} now works at club {club}."))
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::*;
    use crate::{
        command::testing::context,
        route::{Decision, Route},
        session::{testing::user, Session},
    };

    #[tokio::test]
    async fn managers_are_kept_out_of_administration() -> Result<()> {
        let (ctx, _) = context(App::Manager).await;
        ctx.api
            .store()
            .login(Session::new("m-1", user(2, "boss", Role::Manager))?)
            .await;

        let decision = ctx
            .api
            .navigator()
            .navigate(ctx.api.store(), Location::new("/admin"));
        assert_eq!(decision, Decision::Forbidden(Route::Admin));
        Ok(())
    }

    #[tokio::test]
    async fn assign_sends_the_prompted_password() -> Result<()> {
        let (ctx, transport) = context(App::Manager).await;
        ctx.api
            .store()
            .login(Session::new("a-1", user(1, "root", Role::Admin))?)
            .await;
        transport
            .respond(Method::POST, "/api/admin/assign-user", 200, r#"{"message": "ok"}"#)
            .await;

        let cmd = AdminUsers {
            action: Some(UserAction::Assign {
                username: "boss".to_owned(),
                club: 3,
                role: Role::Manager,
            }),
        };
        super::super::Command::execute(&cmd, &ctx).await?;

        let recorded = transport.recorded().await;
        assert_eq!(
            recorded[0].body,
            Some(serde_json::json!({
                "username": "boss",
                "password": "secret",
                "club_id": 3,
                "role": "manager",
            }))
        );
        Ok(())
    }

    #[tokio::test]
    async fn creating_a_club_needs_a_name() -> Result<()> {
        let (ctx, transport) = context(App::Manager).await;
        let cmd = AdminClubs {
            action: Some(ClubAction::Create(ClubFields {
                name: Some("  ".to_owned()),
                address: None,
                cafe_id: None,
                api_key: None,
            })),
        };
        assert!(super::super::Command::execute(&cmd, &ctx).await.is_err());
        assert!(transport.recorded().await.is_empty());
        Ok(())
    }
}
