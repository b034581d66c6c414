// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{io, result};

use thiserror::Error;

pub(crate) type Result<T, E = Error> = result::Result<T, E>;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON format error: {0}")]
    Json(serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("{0}")]
    Api(#[from] Api),
    #[error("invalid input: {0}")]
    Validation(#[from] Validation),
    #[error("storage error: {0}")]
    Storage(#[from] Storage),
    #[error("password retrieval error: {0}")]
    Password(#[from] Password),
    #[error("internal communication error: {0}")]
    Internal(#[from] Internal),
    #[error("command execution failed")]
    Command,
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the server refused the bearer token that accompanied the
    /// request.
    pub(crate) const fn is_authentication_rejected(&self) -> bool {
        matches!(self, Self::Api(Api::AuthenticationRejected { .. }))
    }
}

impl From<pinentry::Error> for Error {
    fn from(value: pinentry::Error) -> Self {
        // LINT: Deliberate fall-through that should catch future cases added to
        // the enum.
        #[allow(
            clippy::wildcard_enum_match_arm,
            clippy::match_wildcard_for_single_variants
        )]
        match value {
            pinentry::Error::Cancelled | pinentry::Error::Timeout => Self::Cancelled,
            pinentry::Error::Io(e) => Self::Io(e),
            _ => Self::Password(Password::Pinentry(value)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        // LINT: Deliberate fall-through that should catch future cases added to
        // the enum.
        #[allow(clippy::wildcard_enum_match_arm)]
        match value.classify() {
            serde_json::error::Category::Io => Self::Io(value.into()),
            _ => Self::Json(value),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Io(value.into())
    }
}

#[derive(Error, Debug)]
pub(crate) enum Api {
    #[error("session expired: the server rejected the access token (status {status})")]
    AuthenticationRejected { status: u16 },
    #[error("API error {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status { status: u16, message: Option<String> },
    #[error("response from {path} did not match the expected schema: {source}")]
    Schema {
        path: String,
        source: serde_json::Error,
    },
}

impl Api {
    /// The message a user should see for this failure. Server-provided
    /// messages win over the generic rendering.
    pub(crate) fn user_message(&self) -> String {
        match self {
            Self::Status {
                message: Some(message),
                ..
            } => message.clone(),
            Self::AuthenticationRejected { .. } | Self::Status { .. } | Self::Schema { .. } => {
                self.to_string()
            }
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum Validation {
    #[error("the access token is empty")]
    EmptyToken,
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("select at least one PC")]
    NoPcsSelected,
    #[error("at most {max} PCs can be booked at once (got {got})")]
    TooManyPcs { max: usize, got: usize },
    #[error(r#"PC "{}" was selected more than once"#, .0.escape_default())]
    DuplicatePc(String),
    #[error(r#""{}" is not a location this client can open"#, .0.escape_default())]
    Location(String),
}

#[derive(Error, Debug)]
pub(crate) enum Storage {
    #[error("no data directory is available for this user")]
    NoProjectDirs,
    #[cfg(feature = "secret-service")]
    #[error("secret service error: {0}")]
    SecretService(#[from] oo7::Error),
    #[cfg(feature = "keychain")]
    #[error("keychain error: {0}")]
    Keychain(#[from] security_framework::base::Error),
}

#[derive(Error, Debug)]
pub(crate) enum Password {
    #[error("no password prompt available")]
    NoPrompt,
    #[error("Pinentry implementation error: {0}")]
    Pinentry(pinentry::Error),
}

#[derive(Error, Debug)]
pub(crate) enum Internal {
    #[error("channel is closed")]
    ChannelClosed,
    #[error(r#"subscription key "{}" is already in use for a different resource type"#, .0.escape_default())]
    SubscriptionType(String),
}
