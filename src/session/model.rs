// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use clap::ValueEnum;
use inflector::Inflector as _;
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::error::{self, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    Admin,
    Manager,
    #[serde(alias = "client")]
    Member,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.to_possible_value().ok_or(std::fmt::Error)?;
        write!(f, "{}", value.get_name().to_title_case())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub(crate) struct User {
    #[tabled(rename = "ID")]
    pub(crate) id: u64,
    #[tabled(rename = "Username")]
    pub(crate) username: String,
    #[tabled(rename = "Role")]
    pub(crate) role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "Email", display_with = "display_optional")]
    pub(crate) email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "Club", display_with = "display_optional")]
    pub(crate) club_name: Option<String>,
}

pub(crate) fn display_optional(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// The identity bound to this client: an access token and the user it was
/// issued for. Neither half exists without the other.
#[derive(Clone, Debug)]
pub(crate) struct Session {
    token: SecretString,
    user: User,
    generation: u64,
}

impl Session {
    pub(crate) fn new(token: impl Into<String>, user: User) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(error::Validation::EmptyToken.into());
        }
        Ok(Self {
            token: SecretString::new(token),
            user,
            generation: 0,
        })
    }

    pub(crate) const fn token(&self) -> &SecretString {
        &self.token
    }

    pub(crate) const fn user(&self) -> &User {
        &self.user
    }

    pub(super) const fn generation(&self) -> u64 {
        self.generation
    }

    pub(super) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub(super) fn expose_token(&self) -> String {
        self.token.expose_secret().clone()
    }
}
