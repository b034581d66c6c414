// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::Result, metadata};

use super::{IsPersistent, Slot, Storage};

/// Stores one JSON document per key in the user's data directory, grouped in
/// one subdirectory per server.
pub(crate) struct File {
    path: PathBuf,
}

impl File {
    pub(crate) fn new(slot: &Slot) -> Option<Self> {
        metadata::PROJECT_DIRS
            .as_ref()
            .map(|dirs| Self::under(dirs.data_dir(), slot))
    }

    fn under(dir: &Path, slot: &Slot) -> Self {
        Self::at(
            dir.join(slot.server_dir())
                .join(format!("{}.json", slot.key())),
        )
    }

    pub(crate) fn at<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }
}

impl IsPersistent for File {
    fn is_persistent(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "an unencrypted file"
    }
}

#[async_trait]
impl<T: Send + Serialize + Sync + for<'de> Deserialize<'de>> Storage<T> for File {
    async fn get(&mut self) -> Result<Option<T>> {
        match fs::File::open(&self.path) {
            Ok(fp) => Ok(Some(serde_json::from_reader::<fs::File, T>(fp)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&mut self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(&self.path)?;
        serde_json::to_writer(file, data)?;
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{Error, Result};

    use super::*;

    #[tokio::test]
    async fn missing_file_reads_as_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut storage = File::at(dir.path().join("token.json"));
        assert_eq!(Storage::<String>::get(&mut storage).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn update_then_clear_twice() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut storage = File::at(dir.path().join("nested").join("token.json"));

        storage.update(&"abc123".to_owned()).await?;
        assert_eq!(
            Storage::<String>::get(&mut storage).await?.as_deref(),
            Some("abc123")
        );

        Storage::<String>::clear(&mut storage).await?;
        Storage::<String>::clear(&mut storage).await?;
        assert_eq!(Storage::<String>::get(&mut storage).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_file_is_a_json_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("user.json");
        fs::write(&path, b"{not json")?;

        let mut storage = File::at(&path);
        let result = Storage::<String>::get(&mut storage).await;
        assert!(matches!(result, Err(Error::Json(_))));
        Ok(())
    }

    #[tokio::test]
    async fn servers_do_not_share_a_token() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let local = Slot::new(&url::Url::parse("http://127.0.0.1:8000")?, "client_token");
        let remote = Slot::new(&url::Url::parse("https://clubs.example.com")?, "client_token");

        File::under(dir.path(), &local)
            .update(&"local".to_owned())
            .await?;
        let mut remote = File::under(dir.path(), &remote);
        assert_eq!(Storage::<String>::get(&mut remote).await?, None);

        let mut local = File::under(dir.path(), &local);
        assert_eq!(
            Storage::<String>::get(&mut local).await?.as_deref(),
            Some("local")
        );
        Ok(())
    }
}
