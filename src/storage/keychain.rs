// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use secrecy::{ExposeSecret as _, SecretVec};
use security_framework::os::macos::{
    keychain::{SecKeychain, SecPreferencesDomain},
    keychain_item::SecKeychainItem,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{self, Result},
    metadata,
};

use super::{IsPersistent, Slot, Storage};

const ERR_SEC_ITEM_NOT_FOUND: i32 = -25300_i32;

/// A generic password item in the user's login keychain. Items share one
/// service name and are told apart by the slot's account.
pub(crate) struct Keychain {
    delegate: SecKeychain,
    service: String,
    account: String,
}

impl Keychain {
    pub(crate) fn new(slot: &Slot) -> Result<Self> {
        Ok(Self {
            delegate: SecKeychain::default_for_domain(SecPreferencesDomain::User)
                .map_err(error::Storage::from)?,
            service: metadata::PROJECT_DIRS
                .as_ref()
                .map(|dirs| dirs.project_path().as_os_str())
                .ok_or(error::Storage::NoProjectDirs)?
                .to_string_lossy()
                .to_string(),
            account: slot.account(),
        })
    }

    fn find(&self) -> Result<Option<(Vec<u8>, SecKeychainItem)>> {
        match self
            .delegate
            .find_generic_password(&self.service, &self.account)
        {
            Ok((password, item)) => Ok(Some((password.as_ref().to_vec(), item))),
            Err(err) if err.code() == ERR_SEC_ITEM_NOT_FOUND => Ok(None),
            Err(err) => Err(error::Storage::from(err).into()),
        }
    }
}

impl IsPersistent for Keychain {
    fn is_persistent(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "the login keychain"
    }
}

#[async_trait]
impl<T: for<'de> Deserialize<'de> + Send + Serialize + Sync> Storage<T> for Keychain {
    async fn get(&mut self) -> Result<Option<T>> {
        let Some((password, _)) = self.find()? else {
            return Ok(None);
        };
        let password = SecretVec::new(password);
        Ok(Some(serde_json::from_slice(password.expose_secret())?))
    }

    async fn update(&mut self, data: &T) -> Result<()> {
        self.delegate
            .set_generic_password(
                &self.service,
                &self.account,
                SecretVec::new(serde_json::to_vec(data)?).expose_secret(),
            )
            .map_err(error::Storage::from)?;
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        if let Some((_, item)) = self.find()? {
            item.delete();
        }
        Ok(())
    }
}
