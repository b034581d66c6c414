// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{ffi::OsString, path::Path};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::task;

use crate::{error::Result, metadata};

/// What to tell the user while asking for a password.
#[derive(Debug, Default, Clone)]
pub(crate) struct Request {
    description: Option<String>,
    error: Option<String>,
}

pub(crate) struct RequestBuilder {
    description: Option<String>,
    error: Option<String>,
}

impl RequestBuilder {
    pub(crate) const fn new() -> Self {
        Self {
            description: None,
            error: None,
        }
    }

    /// Explain which account the password is for.
    pub(crate) fn for_account(mut self, username: &str, server: &str) -> Self {
        self.description = Some(format!("Enter the password for {username} on {server}."));
        self
    }

    pub(crate) fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_owned());
        self
    }

    pub(crate) fn into_request(self) -> Request {
        Request {
            description: self.description,
            error: self.error,
        }
    }
}

#[async_trait]
pub(crate) trait Prompt: Send + Sync {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>>;
}

#[async_trait]
impl<T: Prompt + ?Sized> Prompt for Box<T> {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        (**self).prompt(req).await
    }
}

#[async_trait]
impl<T: Prompt> Prompt for Vec<T> {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        for candidate in self {
            if let r @ (Ok(Some(_)) | Err(_)) = candidate.prompt(req.clone()).await {
                return r;
            }
        }

        Ok(None)
    }
}

pub(crate) struct PinentryPrompt {
    executable: Option<OsString>,
}

impl PinentryPrompt {
    pub(crate) const fn new() -> Self {
        Self { executable: None }
    }

    pub(crate) fn new_with_executable<P: AsRef<Path>>(executable: P) -> Self {
        Self {
            executable: Some(executable.as_ref().as_os_str().into()),
        }
    }
}

#[async_trait]
impl Prompt for PinentryPrompt {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        fn interact<'input>(
            mut input: pinentry::PassphraseInput<'input>,
            title: &'input str,
            req: &'input Request,
        ) -> Result<SecretString> {
            _ = input.required("A password is required to log in.");
            _ = input.with_title(title);
            _ = input.with_prompt("Password");
            if let Some(description) = &req.description {
                _ = input.with_description(description);
            }
            if let Some(e) = &req.error {
                _ = input.with_error(e);
            }

            Ok(input.interact()?)
        }

        let title = format!("Log in - {}", *metadata::CLIENT_DISPLAY_NAME);

        let input = self
            .executable
            .as_ref()
            .and_then(pinentry::PassphraseInput::with_binary)
            .or_else(pinentry::PassphraseInput::with_default_binary)
            .map(|input| task::spawn_blocking(move || interact(input, &title, &req)));

        Ok(match input {
            Some(fut) => Some(fut.await??),
            None => None,
        })
    }
}

pub(crate) struct RpasswordPrompt;

#[async_trait]
impl Prompt for RpasswordPrompt {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        if let Some(error) = req.error {
            eprintln!("Error: {error}");
        }
        if let Some(description) = req.description {
            eprintln!("{description}");
        }

        Ok(Some(
            task::spawn_blocking(|| {
                rpassword::prompt_password("Password: ").map(SecretString::new)
            })
            .await??,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl Prompt for Fixed {
        async fn prompt(&self, _req: Request) -> Result<Option<SecretString>> {
            Ok(self.0.map(|p| SecretString::new(p.to_owned())))
        }
    }

    #[tokio::test]
    async fn first_prompt_with_an_answer_wins() -> Result<()> {
        use secrecy::ExposeSecret as _;

        let chain = vec![Fixed(None), Fixed(Some("hunter2")), Fixed(Some("unused"))];
        let password = chain
            .prompt(RequestBuilder::new().for_account("alice", "clubs.test").into_request())
            .await?;
        assert_eq!(password.as_ref().map(|p| p.expose_secret().as_str()), Some("hunter2"));
        Ok(())
    }

    #[test]
    fn request_describes_the_account() {
        let req = RequestBuilder::new()
            .for_account("alice", "clubs.test")
            .with_error("Wrong password")
            .into_request();
        assert_eq!(
            req.description.as_deref(),
            Some("Enter the password for alice on clubs.test.")
        );
        assert_eq!(req.error.as_deref(), Some("Wrong password"));
    }
}
