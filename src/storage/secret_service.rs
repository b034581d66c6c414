// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretVec};
use serde::{Deserialize, Serialize};

use crate::{
    error::{self, Result},
    metadata,
};

use super::{IsPersistent, Slot, Storage};

/// One keyring item per slot, matched by its key and server attributes. The
/// label is only what the user sees in their keyring manager.
pub(crate) struct SecretService {
    keyring: oo7::Keyring,
    label: String,
    attributes: HashMap<String, String>,
}

impl SecretService {
    async fn item(&self) -> Result<Option<oo7::Item>> {
        Ok(self
            .keyring
            .search_items(self.attributes())
            .await
            .map_err(error::Storage::from)?
            .into_iter()
            .next())
    }

    pub(crate) async fn new(slot: &Slot) -> Result<Self> {
        Ok(Self {
            keyring: oo7::Keyring::new().await.map_err(error::Storage::from)?,
            label: format!(
                "{} {} for {}",
                *metadata::CLIENT_DISPLAY_NAME,
                slot.key(),
                slot.server()
            ),
            attributes: HashMap::from([
                ("clubctl.key".to_owned(), slot.key().to_owned()),
                ("clubctl.server".to_owned(), slot.server().to_owned()),
            ]),
        })
    }

    fn attributes(&self) -> HashMap<&str, &str> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }
}

impl IsPersistent for SecretService {
    fn is_persistent(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "the secret service"
    }
}

#[async_trait]
impl<T: for<'de> Deserialize<'de> + Send + Serialize + Sync> Storage<T> for SecretService {
    async fn get(&mut self) -> Result<Option<T>> {
        let Some(item) = self.item().await? else {
            return Ok(None);
        };
        let secret = item.secret().await.map_err(error::Storage::from)?;
        Ok(Some(serde_json::from_slice(&secret)?))
    }

    async fn update(&mut self, data: &T) -> Result<()> {
        self.keyring
            .create_item(
                &self.label,
                self.attributes(),
                SecretVec::new(serde_json::to_vec(data)?).expose_secret(),
                true,
            )
            .await
            .map_err(error::Storage::from)?;
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        if let Some(item) = self.item().await? {
            item.delete().await.map_err(error::Storage::from)?;
        }
        Ok(())
    }
}
