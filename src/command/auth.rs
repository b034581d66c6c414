// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::io::{self, Write as _};

use async_trait::async_trait;
use clap::Parser;
use log::{debug, warn};
use secrecy::ExposeSecret as _;
use tokio::task;

use super::{print_table, Context, Screen};
use crate::{
    error::{self, Error, Result},
    password::RequestBuilder,
    profile::App,
    route::Location,
    session::User,
};

const LOGIN_ATTEMPTS: usize = 3;

async fn read_line(prompt: &'static str) -> Result<String> {
    task::spawn_blocking(move || -> Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{prompt}")?;
        stderr.flush()?;

        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line)?;
        Ok(line.trim().to_owned())
    })
    .await?
}

async fn read_required(prompt: &'static str, field: &'static str) -> Result<String> {
    let value = read_line(prompt).await?;
    if value.is_empty() {
        return Err(error::Validation::EmptyField(field).into());
    }
    Ok(value)
}

/// The login screen: ask for credentials until the server accepts them.
pub(crate) async fn interactive_login(ctx: &Context, username: Option<&str>) -> Result<User> {
    let username = match username.map(str::trim) {
        Some(username) if !username.is_empty() => username.to_owned(),
        Some(_) | None => read_required("Username: ", "username").await?,
    };
    let server = ctx
        .api
        .base()
        .host_str()
        .unwrap_or("the server")
        .to_owned();

    let mut failure: Option<String> = None;
    for attempt in 1..=LOGIN_ATTEMPTS {
        let mut req = RequestBuilder::new().for_account(&username, &server);
        if let Some(message) = &failure {
            req = req.with_error(message);
        }
        let password = ctx
            .prompt
            .prompt(req.into_request())
            .await?
            .ok_or(error::Password::NoPrompt)?;

        match ctx
            .api
            .login(ctx.app, &username, password.expose_secret())
            .await
        {
            Ok(user) => {
                if ctx.app == App::Manager && !ctx.api.store().is_manager() {
                    warn!(
                        "{} does not manage a club; the server will refuse most screens",
                        user.username
                    );
                }
                return Ok(user);
            }
            Err(Error::Api(api @ error::Api::Status { .. })) => {
                debug!("Login attempt {} of {} failed: {}", attempt, LOGIN_ATTEMPTS, api);
                failure = Some(api.user_message());
            }
            Err(e) => return Err(e),
        }
    }

    Err(error::Api::Status {
        status: 401,
        message: failure,
    }
    .into())
}

fn greet(user: &User) {
    println!("Logged in as {} ({}).", user.username, user.role);
}

/// Log in to the selected application.
#[derive(Debug, Parser)]
pub(crate) struct Login {
    /// The account to log in as. Asked for when omitted.
    #[arg(short, long)]
    username: Option<String>,
}

#[async_trait]
impl super::Command for Login {
    fn screen(&self, _app: App) -> Result<Screen> {
        Ok(Screen::Unguarded)
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let user = interactive_login(ctx, self.username.as_deref()).await?;
        greet(&user);
        Ok(())
    }
}

/// End the current session.
#[derive(Debug, Parser)]
pub(crate) struct Logout {}

#[async_trait]
impl super::Command for Logout {
    fn screen(&self, _app: App) -> Result<Screen> {
        Ok(Screen::Unguarded)
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        if ctx.api.store().logout().await {
            println!("Logged out.");
        } else {
            println!("Not logged in.");
        }
        Ok(())
    }
}

/// Show who is logged in.
#[derive(Debug, Parser)]
pub(crate) struct Whoami {}

#[async_trait]
impl super::Command for Whoami {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(match app {
            App::Client => Screen::At(Location::new("/profile")),
            App::Manager => Screen::Unguarded,
        })
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        match ctx.api.store().user() {
            Some(user) => print_table([user], ""),
            None => println!("Not logged in."),
        }
        Ok(())
    }
}

/// Create a club member account. A verification code is sent by email.
#[derive(Debug, Parser)]
pub(crate) struct Register {
    #[arg(short, long)]
    username: String,

    #[arg(short, long)]
    email: String,
}

#[async_trait]
impl super::Command for Register {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::client(app, Location::new("/auth")))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(error::Validation::EmptyField("username").into());
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(error::Validation::EmptyField("email").into());
        }

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
            .register(username, email, password.expose_secret())
            .await?;
        println!(
            "{}",
            resp.message
                .unwrap_or_else(|| format!("A verification code was sent to {email}."))
        );
        Ok(())
    }
}

/// Confirm an email address with the code that was sent to it.
#[derive(Debug, Parser)]
pub(crate) struct Verify {
    #[arg(short, long)]
    email: String,

    /// The code from the verification email.
    code: String,
}

#[async_trait]
impl super::Command for Verify {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::client(app, Location::new("/auth")))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let user = ctx
            .api
            .verify_email(self.email.trim(), self.code.trim())
            .await?;
        greet(&user);
        Ok(())
    }
}

/// Send a new verification code.
#[derive(Debug, Parser)]
pub(crate) struct ResendCode {
    #[arg(short, long)]
    email: String,
}

#[async_trait]
impl super::Command for ResendCode {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::client(app, Location::new("/auth")))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let resp = ctx.api.resend_code(self.email.trim()).await?;
        println!(
            "{}",
            resp.message
                .unwrap_or_else(|| "A new code is on its way.".to_owned())
        );
        Ok(())
    }
}
