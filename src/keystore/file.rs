// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use async_trait::async_trait;
use ethers::types::Address;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::{KeyMaterialKind, KeyMaterialMedium};

/// File-based key material medium
///
/// Layout: `<base>/<store_name>/<authority>.bin`
pub struct FileKeyMaterialMedium {
    base_path: PathBuf,
}

impl FileKeyMaterialMedium {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn get_store_dir(&self, kind: KeyMaterialKind) -> PathBuf {
        self.base_path.join(kind.store_name())
    }

    fn get_entry_path(&self, kind: KeyMaterialKind, authority: Address) -> PathBuf {
        self.get_store_dir(kind)
            .join(format!("{}.bin", hex::encode(authority.as_bytes())))
    }
}

#[async_trait]
impl KeyMaterialMedium for FileKeyMaterialMedium {
    async fn get(&self, kind: KeyMaterialKind, authority: Address) -> Result<Option<Vec<u8>>> {
        let path = self.get_entry_path(kind, authority);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, kind: KeyMaterialKind, authority: Address, value: Vec<u8>) -> Result<()> {
        let dir = self.get_store_dir(kind);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
        }

        let path = self.get_entry_path(kind, authority);

        // Write atomically through a temp file private to this write
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&value).await?;
        file.sync_all().await?;

        fs::rename(temp_path, path).await?;
        Ok(())
    }
}
