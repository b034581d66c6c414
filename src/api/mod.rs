// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

mod client;
mod endpoints;
pub(crate) mod model;
pub(crate) mod transport;

pub(crate) use client::ApiClient;
#[cfg(test)]
pub(crate) use client::testing;
