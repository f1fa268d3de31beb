use super::{ResolverError, WalletResolver};
use crate::types::{DerivationPath, Wallet};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryInner {
    wallets: HashMap<i64, Wallet>,
    paths: HashMap<i64, DerivationPath>,
}

/// In-process wallet directory for local runs and tests
#[derive(Clone, Default)]
pub struct MemoryWalletStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>, ResolverError> {
        self.inner
            .lock()
            .map_err(|_| ResolverError::Backend("memory wallet store lock poisoned".to_string()))
    }

    pub fn insert_wallet(&self, wallet: Wallet) -> Result<(), ResolverError> {
        self.lock_inner()?.wallets.insert(wallet.id, wallet);
        Ok(())
    }

    /// Attach a derivation path to the wallet named by `path.wallet_id`
    pub fn insert_derivation_path(&self, path: DerivationPath) -> Result<(), ResolverError> {
        self.lock_inner()?.paths.insert(path.wallet_id, path);
        Ok(())
    }
}

#[async_trait]
impl WalletResolver for MemoryWalletStore {
    async fn get_wallet(&self, id: i64) -> Result<Wallet, ResolverError> {
        self.lock_inner()?
            .wallets
            .get(&id)
            .cloned()
            .ok_or(ResolverError::WalletNotFound(id))
    }

    async fn get_derivation_path(&self, key_id: &str) -> Result<DerivationPath, ResolverError> {
        let inner = self.lock_inner()?;
        inner
            .wallets
            .values()
            .filter(|wallet| wallet.key_id == key_id)
            .filter_map(|wallet| inner.paths.get(&wallet.id))
            .min_by_key(|path| path.id)
            .cloned()
            .ok_or_else(|| ResolverError::DerivationPathNotFound(key_id.to_string()))
    }
}
