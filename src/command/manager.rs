// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use async_trait::async_trait;
use clap::Parser;
use log::info;
use tokio::{select, signal};

use super::{check_snapshot, print_table, stdin_lines, Context, Screen};
use crate::{
    api::model::{ConfigUpdate, MembersPage, Overview, PcList, PcStatus},
    error::{self, Result},
    poll::interval,
    profile::App,
    route::Location,
    session::idle::Activity,
};

fn render_overview(overview: &Overview) {
    println!(
        "Revenue today {:.0} · this week {:.0}",
        overview.today_revenue, overview.week_revenue
    );
    println!(
        "{} of {} PCs active ({:.0}% load) · {} members",
        overview.active_pcs, overview.total_pcs, overview.pc_load_percent, overview.total_members
    );
    if !overview.api_connected {
        println!("The club management system is not connected; figures may be stale.");
    }
    print_table(&overview.payment_methods, "No payments today.");
}

fn render_pcs(list: &PcList, status: Option<PcStatus>) {
    let busy = list
        .pcs
        .iter()
        .filter(|pc| pc.status == PcStatus::Busy)
        .count();
    // The server's total also counts PCs it could not describe.
    let total = usize::try_from(list.total).map_or(list.pcs.len(), |t| t.max(list.pcs.len()));
    println!("{busy} of {total} PCs busy");
    print_table(
        list.pcs
            .iter()
            .filter(|pc| status.map_or(true, |status| pc.status == status)),
        "No PCs match.",
    );
}

/// Show today's figures for the managed club.
#[derive(Debug, Parser)]
pub(crate) struct OverviewCommand {
    /// Also show the income charts.
    #[arg(short, long)]
    charts: bool,
}

impl OverviewCommand {
    pub(crate) const fn new() -> Self {
        Self { charts: false }
    }
}

#[async_trait]
impl super::Command for OverviewCommand {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::manager(app, Location::new("/")))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        render_overview(&ctx.api.overview().await?);
        if !self.charts {
            return Ok(());
        }

        let (daily, monthly, payments, income) = tokio::join!(
            ctx.api.daily_chart(),
            ctx.api.monthly_chart(),
            ctx.api.payment_methods(),
            ctx.api.monthly_income(),
        );

        let daily = daily?;
        println!("\nLast days: {:.0} total", daily.total);
        print_table(&daily.days, "No data.");

        let monthly = monthly?;
        println!(
            "\nThis month: {:.0} cash, {:.0} balance",
            monthly.total_cash, monthly.total_balance
        );
        print_table(&monthly.points, "No data.");

        println!("\nPayment methods");
        print_table(&payments?.methods, "No data.");

        let income = income?;
        println!("\nIncome by month: {:.0} total", income.total);
        print_table(&income.months, "No data.");
        Ok(())
    }
}

/// List the club's PCs and who is on them.
#[derive(Debug, Parser)]
pub(crate) struct Pcs {
    /// Only show PCs in this state.
    #[arg(short, long, value_enum)]
    status: Option<PcStatus>,
}

impl Pcs {
    pub(crate) const fn new() -> Self {
        Self { status: None }
    }
}

#[async_trait]
impl super::Command for Pcs {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::manager(app, Location::new("/monitoring")))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        render_pcs(&ctx.api.pcs().await?, self.status);
        Ok(())
    }
}

/// List club members.
#[derive(Debug, Parser)]
pub(crate) struct Members {
    /// The page to show, starting at 1.
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// Only show members matching this text.
    #[arg(short, long, default_value = "")]
    search: String,

    /// Keep the page up to date until interrupted.
    #[arg(short, long)]
    watch: bool,
}

impl Members {
    pub(crate) fn new() -> Self {
        Self {
            page: 1,
            search: String::new(),
            watch: false,
        }
    }

    fn render(page: &MembersPage, number: u32) {
        print_table(&page.members, "No members found.");
        if let Some(pages) = page.paging.get("pages") {
            println!("Page {number} of {pages}");
        }
    }
}

#[async_trait]
impl super::Command for Members {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::manager(app, Location::new("/members")))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let number = self.page.max(1);
        let search = self.search.trim().to_owned();
        if !self.watch {
            Self::render(&ctx.api.members(number, &search).await?, number);
            return Ok(());
        }

        let mut sub = ctx
            .poller
            .subscribe(&format!("members/{number}/{search}"), interval::MEMBERS, {
                let api = ctx.api.clone();
                move || {
                    let (api, search) = (api.clone(), search.clone());
                    async move { api.members(number, &search).await }
                }
            })
            .await?;

        loop {
            select! {
                snapshot = sub.changed() => {
                    let snapshot = snapshot?;
                    check_snapshot("members", &snapshot)?;
                    if let Some(page) = snapshot.value() {
                        Self::render(page, number);
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

/// Watch the overview, the PCs and income until interrupted.
#[derive(Debug, Parser)]
pub(crate) struct Monitor {}

#[async_trait]
impl super::Command for Monitor {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::manager(app, Location::new("/monitoring")))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let mut overview = ctx
            .poller
            .subscribe("overview", interval::OVERVIEW, {
                let api = ctx.api.clone();
                move || {
                    let api = api.clone();
                    async move { api.overview().await }
                }
            })
            .await?;
        let mut pcs = ctx
            .poller
            .subscribe("pcs", interval::PCS, {
                let api = ctx.api.clone();
                move || {
                    let api = api.clone();
                    async move { api.pcs().await }
                }
            })
            .await?;
        let mut daily = ctx
            .poller
            .subscribe("daily-chart", interval::DAILY_CHART, {
                let api = ctx.api.clone();
                move || {
                    let api = api.clone();
                    async move { api.daily_chart().await }
                }
            })
            .await?;
        let mut income = ctx
            .poller
            .subscribe("monthly-income", interval::MONTHLY_INCOME, {
                let api = ctx.api.clone();
                move || {
                    let api = api.clone();
                    async move { api.monthly_income().await }
                }
            })
            .await?;
        let mut session = ctx.api.store().subscribe();
        let mut input = stdin_lines();
        let mut reading = true;
        eprintln!("Press Enter to refresh, Ctrl-C to stop.");

        loop {
            select! {
                biased;

                snapshot = overview.changed() => {
                    let snapshot = snapshot?;
                    check_snapshot("the overview", &snapshot)?;
                    if let Some(value) = snapshot.value() {
                        render_overview(value);
                    }
                }
                snapshot = pcs.changed() => {
                    let snapshot = snapshot?;
                    check_snapshot("the PC list", &snapshot)?;
                    if let Some(value) = snapshot.value() {
                        render_pcs(value, None);
                    }
                }
                snapshot = daily.changed() => {
                    let snapshot = snapshot?;
                    check_snapshot("the daily chart", &snapshot)?;
                    if let Some(value) = snapshot.value() {
                        println!("Last days: {:.0} total", value.total);
                    }
                }
                snapshot = income.changed() => {
                    let snapshot = snapshot?;
                    check_snapshot("the monthly income", &snapshot)?;
                    if let Some(value) = snapshot.value() {
                        println!("Income by month: {:.0} total", value.total);
                    }
                }
                changed = session.changed() => {
                    changed.map_err(|_| error::Internal::ChannelClosed)?;
                    if session.borrow_and_update().is_none() {
                        println!("The session has ended.");
                        return Ok(());
                    }
                }
                line = input.recv(), if reading => {
                    if line.is_none() {
                        reading = false;
                        continue;
                    }
                    ctx.record(Activity::Key);
                    overview.refresh();
                    pcs.refresh();
                    daily.refresh();
                    income.refresh();
                }
                interrupted = signal::ctrl_c() => {
                    interrupted?;
                    return Ok(());
                }
            }
        }
    }
}

/// Show or change the club's integration settings.
#[derive(Debug, Parser)]
pub(crate) struct Config {
    /// A new API key for the club management system.
    #[arg(long)]
    api_key: Option<String>,

    #[arg(long)]
    cafe_id: Option<String>,

    #[arg(long)]
    club_name: Option<String>,

    /// Upload this image and use it as the club's logo.
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    logo: Option<PathBuf>,
}

impl Config {
    pub(crate) const fn new() -> Self {
        Self {
            api_key: None,
            cafe_id: None,
            club_name: None,
            logo: None,
        }
    }
}

#[async_trait]
impl super::Command for Config {
    fn screen(&self, app: App) -> Result<Screen> {
        Ok(Screen::manager(app, Location::new("/settings")))
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let mut update = ConfigUpdate {
            api_key: self.api_key.clone(),
            cafe_id: self.cafe_id.clone(),
            club_name: self.club_name.clone(),
            club_logo_url: None,
        };
        if let Some(logo) = &self.logo {
            let uploaded = ctx.api.upload_logo(logo.clone()).await?;
            info!("Uploaded {} as {}", logo.display(), uploaded.url);
            update.club_logo_url = Some(uploaded.url);
        }

        if !update.is_empty() {
            let ack = ctx.api.save_config(&update).await?;
            if !ack.ok {
                return Err(error::Api::Status {
                    status: 200,
                    message: ack.message.or_else(|| Some("settings were not saved".to_owned())),
                }
                .into());
            }
            println!("Settings saved.");
        }

        let config = ctx.api.config().await?;
        println!("Club:       {}", config.club_name);
        println!("Cafe ID:    {}", config.cafe_id);
        println!("API key:    {}", config.api_key_masked);
        println!("Logo:       {}", config.club_logo_url);
        println!(
            "Configured: {}",
            if config.configured { "yes" } else { "no" }
        );
        Ok(())
    }
}

/// Check that the server is up.
#[derive(Debug, Parser)]
pub(crate) struct Health {}

#[async_trait]
impl super::Command for Health {
    fn screen(&self, _app: App) -> Result<Screen> {
        Ok(Screen::Unguarded)
    }

    async fn execute(&self, ctx: &Context) -> Result<()> {
        let health = ctx.api.health().await?;
        println!(
            "{}{}{}",
            health.status,
            if health.configured { "" } else { " (not configured)" },
            health
                .timestamp
                .map(|t| format!(" at {t}"))
                .unwrap_or_default()
        );
        Ok(())
    }
}
