// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

mod file;
#[cfg(feature = "keychain")]
mod keychain;
mod memory;
#[cfg(feature = "secret-service")]
mod secret_service;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

pub(crate) use file::File;
#[cfg(feature = "keychain")]
pub(crate) use keychain::Keychain;
pub(crate) use memory::Memory;
#[cfg(feature = "secret-service")]
pub(crate) use secret_service::SecretService;

/// Where one stored value lives: a storage key scoped to the server that
/// issued it, so a token from one deployment is never offered to another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Slot {
    key: String,
    server: String,
}

impl Slot {
    pub(crate) fn new(server: &Url, key: &str) -> Self {
        Self {
            key: key.to_owned(),
            server: server.as_str().trim_end_matches('/').to_owned(),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn server(&self) -> &str {
        &self.server
    }

    /// `<key>@<server>`, for stores with a single account field.
    pub(crate) fn account(&self) -> String {
        format!("{}@{}", self.key, self.server)
    }

    /// A directory name for the server that is safe on every platform.
    pub(crate) fn server_dir(&self) -> String {
        self.server
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

pub(crate) trait IsPersistent {
    fn is_persistent(&self) -> bool;

    /// Where the data ends up, for log messages.
    fn backend(&self) -> &'static str;
}

impl<T: IsPersistent + ?Sized> IsPersistent for Box<T> {
    fn is_persistent(&self) -> bool {
        (**self).is_persistent()
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

/// A single durable slot holding one value. Clearing an empty slot succeeds.
#[async_trait]
pub(crate) trait Storage<T>: Send + Sync + IsPersistent {
    async fn get(&mut self) -> Result<Option<T>>;
    async fn update(&mut self, data: &T) -> Result<()>;
    async fn clear(&mut self) -> Result<()>;
}

#[async_trait]
impl<Tn: Sync, T: Storage<Tn> + ?Sized> Storage<Tn> for Box<T> {
    async fn get(&mut self) -> Result<Option<Tn>> {
        (**self).get().await
    }

    async fn update(&mut self, data: &Tn) -> Result<()> {
        (**self).update(data).await
    }

    async fn clear(&mut self) -> Result<()> {
        (**self).clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_names_the_same_server() -> Result<()> {
        let a = Slot::new(&Url::parse("http://127.0.0.1:8000")?, "manager_token");
        let b = Slot::new(&Url::parse("http://127.0.0.1:8000/")?, "manager_token");
        assert_eq!(a, b);
        assert_eq!(a.account(), "manager_token@http://127.0.0.1:8000");
        Ok(())
    }

    #[test]
    fn servers_get_separate_directories() -> Result<()> {
        let local = Slot::new(&Url::parse("http://127.0.0.1:8000")?, "client_token");
        let remote = Slot::new(&Url::parse("https://clubs.example.com/backend")?, "client_token");
        assert_eq!(local.server_dir(), "http___127.0.0.1_8000");
        assert_eq!(remote.server_dir(), "https___clubs.example.com_backend");
        assert_ne!(local.server_dir(), remote.server_dir());
        Ok(())
    }
}
