// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::{self, Result};

pub(crate) const MAX_PCS_PER_BOOKING: usize = 10;

/// How long a booking lasts, using the labels the booking endpoint expects.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, ValueEnum)]
pub(crate) enum Duration {
    #[serde(rename = "30 мин")]
    #[value(name = "30m")]
    HalfHour,
    #[default]
    #[serde(rename = "1 час")]
    #[value(name = "1h")]
    OneHour,
    #[serde(rename = "2 часа")]
    #[value(name = "2h")]
    TwoHours,
    #[serde(rename = "3 часа")]
    #[value(name = "3h")]
    ThreeHours,
    #[serde(rename = "5 часов")]
    #[value(name = "5h")]
    FiveHours,
}

/// A booking that has passed every local check and can be submitted.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct BookingRequest {
    client_name: String,
    phone: String,
    zone_name: String,
    duration: Duration,
    pc_names: Vec<String>,
}

impl BookingRequest {
    pub(crate) fn new(
        client_name: &str,
        phone: &str,
        zone_name: &str,
        duration: Duration,
        pc_names: Vec<String>,
    ) -> Result<Self> {
        let client_name = client_name.trim();
        if client_name.is_empty() {
            return Err(error::Validation::EmptyField("name").into());
        }
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(error::Validation::EmptyField("phone number").into());
        }
        if zone_name.trim().is_empty() {
            return Err(error::Validation::EmptyField("zone").into());
        }

        if pc_names.is_empty() {
            return Err(error::Validation::NoPcsSelected.into());
        }
        if pc_names.len() > MAX_PCS_PER_BOOKING {
            return Err(error::Validation::TooManyPcs {
                max: MAX_PCS_PER_BOOKING,
                got: pc_names.len(),
            }
            .into());
        }
        let mut seen = HashSet::with_capacity(pc_names.len());
        for name in &pc_names {
            if !seen.insert(name.as_str()) {
                return Err(error::Validation::DuplicatePc(name.clone()).into());
            }
        }

        Ok(Self {
            client_name: client_name.to_owned(),
            phone: phone.to_owned(),
            zone_name: zone_name.to_owned(),
            duration,
            pc_names,
        })
    }

    pub(crate) fn zone_name(&self) -> &str {
        &self.zone_name
    }

    pub(crate) fn pc_names(&self) -> &[String] {
        &self.pc_names
    }
}
