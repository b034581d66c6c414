// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use clap::ValueEnum;
use inflector::Inflector as _;

/// Which of the service's applications this invocation acts as. Each profile
/// keeps its own session under its own storage keys.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, ValueEnum)]
pub(crate) enum App {
    /// Club finder and booking for club members.
    #[default]
    Client,
    /// Club manager and administrator dashboard.
    Manager,
}

impl App {
    const MANAGER_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

    pub(crate) const fn storage_prefix(self) -> &'static str {
        match self {
            Self::Client => "clubctl_client",
            Self::Manager => "clubctl_manager",
        }
    }

    pub(crate) fn token_key(self) -> String {
        format!("{}_token", self.storage_prefix())
    }

    pub(crate) fn user_key(self) -> String {
        format!("{}_user", self.storage_prefix())
    }

    pub(crate) fn activity_key(self) -> String {
        format!("{}_activity", self.storage_prefix())
    }

    /// The endpoint that exchanges a username and password for a session.
    pub(crate) const fn login_endpoint(self) -> &'static str {
        match self {
            Self::Client => "/api/clients/login",
            Self::Manager => "/api/auth/login",
        }
    }

    /// The path of the screen that collects credentials.
    pub(crate) const fn login_path(self) -> &'static str {
        match self {
            Self::Client => "/auth",
            Self::Manager => "/login",
        }
    }

    pub(crate) const fn default_idle_timeout(self) -> Option<Duration> {
        match self {
            Self::Client => None,
            Self::Manager => Some(Self::MANAGER_IDLE_TIMEOUT),
        }
    }
}

impl std::fmt::Display for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.to_possible_value().ok_or(std::fmt::Error)?;
        write!(f, "{}", value.get_name().to_title_case())
    }
}
