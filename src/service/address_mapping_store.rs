//! 地址映射存储服务
//!
//! 负责钱包地址规范化、历史键（大小写未规范化）的查找与迁移。
//! 存储层错误不会向调用方抛出：查询返回 `MappingLookup::Unavailable`。

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::domain::address_mapping::{
    normalize_wallet_address, AddressMapping, MappingKey, MappingLookup, MigrationOutcome,
};
use crate::domain::chain_config::ChainRegistry;
use crate::error::{Result, WalletError};
use crate::infrastructure::log_redact::redact_address;
use crate::repository::address_mapping_repository::AddressMappingRepository;

pub struct AddressMappingStore {
    repo: Arc<dyn AddressMappingRepository>,
    registry: Arc<ChainRegistry>,
    pending_migrations: Mutex<PendingMigrations>,
}

type MigrationKey = (MappingKey, MappingKey);

/// 后台迁移任务；同一 (旧键, 规范键) 同时最多一个任务
#[derive(Default)]
struct PendingMigrations {
    tasks: JoinSet<MigrationKey>,
    in_flight: HashSet<MigrationKey>,
}

impl PendingMigrations {
    /// 回收已结束的任务，释放其键
    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            match joined {
                Ok(key) => {
                    self.in_flight.remove(&key);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "address mapping migration task aborted");
                }
            }
        }
        // 被中止的任务不会归还键
        if self.tasks.is_empty() {
            self.in_flight.clear();
        }
    }
}

impl AddressMappingStore {
    pub fn new(repo: Arc<dyn AddressMappingRepository>, registry: Arc<ChainRegistry>) -> Self {
        Self {
            repo,
            registry,
            pending_migrations: Mutex::new(PendingMigrations::default()),
        }
    }

    /// 查询映射地址
    ///
    /// 1. 规范键精确查询
    /// 2. 原始大小写键查询，命中后后台迁移到规范键
    /// 3. 自描述地址格式的链：按钱包地址大小写不敏感扫描
    pub async fn get(&self, wallet_address: &str, chain_id: i64) -> MappingLookup {
        let original = MappingKey::new(wallet_address, chain_id);
        let normalized = original.normalized();
        let mut storage_error: Option<String> = None;

        match self.repo.find(&normalized).await {
            Ok(Some(mapping)) => {
                tracing::debug!(key = %redacted_key(&normalized), "address mapping hit");
                return MappingLookup::Found(mapping.network_address);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(key = %redacted_key(&normalized), error = %e, "address mapping lookup failed");
                storage_error = Some(e.to_string());
            }
        }

        if original != normalized {
            match self.repo.find(&original).await {
                Ok(Some(mapping)) => {
                    tracing::debug!(
                        key = %redacted_key(&original),
                        "address mapping found under legacy key, migrating"
                    );
                    self.spawn_migration(original, normalized, mapping.network_address.clone())
                        .await;
                    return MappingLookup::Found(mapping.network_address);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(key = %redacted_key(&original), error = %e, "address mapping lookup failed");
                    storage_error = Some(e.to_string());
                }
            }
        }

        if self
            .registry
            .address_family(chain_id)
            .is_self_describing()
        {
            match self.repo.find_by_wallet_ci(wallet_address, Some(chain_id)).await {
                Ok(candidates) => {
                    if let Some(mapping) = pick_candidate(candidates, &normalized) {
                        tracing::debug!(
                            key = %redacted_key(&normalized),
                            "address mapping found by case-insensitive scan"
                        );
                        let found_key = mapping.key();
                        if found_key != normalized {
                            self.spawn_migration(
                                found_key,
                                normalized,
                                mapping.network_address.clone(),
                            )
                            .await;
                        }
                        return MappingLookup::Found(mapping.network_address);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        wallet = %redact_address(wallet_address),
                        chain_id,
                        error = %e,
                        "address mapping scan failed"
                    );
                    storage_error = Some(e.to_string());
                }
            }
        }

        match storage_error {
            Some(e) => MappingLookup::Unavailable(e),
            None => MappingLookup::Absent,
        }
    }

    /// 按规范键 upsert
    pub async fn put(
        &self,
        wallet_address: &str,
        chain_id: i64,
        network_address: &str,
    ) -> Result<AddressMapping> {
        let key = MappingKey::new(normalize_wallet_address(wallet_address), chain_id);
        let mapping = self
            .repo
            .upsert(&key, network_address)
            .await
            .map_err(|e| {
                tracing::error!(key = %redacted_key(&key), error = %e, "address mapping write failed");
                WalletError::storage(e)
            })?;
        tracing::debug!(
            key = %redacted_key(&key),
            network_address = %redact_address(network_address),
            "address mapping stored"
        );
        Ok(mapping)
    }

    /// 把旧键记录迁移到规范键（幂等）
    pub async fn migrate(
        &self,
        old_wallet_address: &str,
        normalized_wallet_address: &str,
        chain_id: i64,
        network_address: &str,
    ) -> Result<MigrationOutcome> {
        let from = MappingKey::new(old_wallet_address, chain_id);
        let to = MappingKey::new(normalized_wallet_address, chain_id);
        run_migration(self.repo.as_ref(), &from, &to, network_address).await
    }

    /// 某钱包在所有链上的映射（chain_id → 地址）
    ///
    /// 同一条链存在多条记录时以规范键为准；存储出错时返回空表
    pub async fn get_all(&self, wallet_address: &str) -> BTreeMap<i64, String> {
        let normalized = normalize_wallet_address(wallet_address);
        let mappings = match self.repo.find_by_wallet_ci(wallet_address, None).await {
            Ok(mappings) => mappings,
            Err(e) => {
                tracing::error!(
                    wallet = %redact_address(wallet_address),
                    error = %e,
                    "address mapping scan failed"
                );
                return BTreeMap::new();
            }
        };

        let mut result = BTreeMap::new();
        for mapping in mappings {
            let is_canonical = mapping.wallet_address == normalized;
            if is_canonical || !result.contains_key(&mapping.chain_id) {
                result.insert(mapping.chain_id, mapping.network_address);
            }
        }
        result
    }

    /// 等待所有后台迁移完成
    pub async fn wait_for_migrations(&self) {
        let mut pending = std::mem::take(&mut *self.pending_migrations.lock().await);
        while let Some(joined) = pending.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "address mapping migration task aborted");
            }
        }
    }

    async fn spawn_migration(&self, from: MappingKey, to: MappingKey, network_address: String) {
        let mut pending = self.pending_migrations.lock().await;
        pending.reap_finished();

        let key = (from, to);
        if !pending.in_flight.insert(key.clone()) {
            tracing::debug!(key = %redacted_key(&key.0), "address mapping migration already pending");
            return;
        }

        let repo = Arc::clone(&self.repo);
        pending.tasks.spawn(async move {
            // 失败已在 run_migration 中记录，下次查询会重试
            let _ = run_migration(repo.as_ref(), &key.0, &key.1, &network_address).await;
            key
        });
    }

    #[cfg(test)]
    async fn pending_migration_count(&self) -> usize {
        self.pending_migrations.lock().await.tasks.len()
    }
}

async fn run_migration(
    repo: &dyn AddressMappingRepository,
    from: &MappingKey,
    to: &MappingKey,
    network_address: &str,
) -> Result<MigrationOutcome> {
    match repo.migrate(from, to, network_address).await {
        Ok(MigrationOutcome::Migrated) => {
            tracing::info!(
                from = %redacted_key(from),
                to = %redacted_key(to),
                "address mapping migrated to normalized key"
            );
            Ok(MigrationOutcome::Migrated)
        }
        Ok(MigrationOutcome::Skipped(reason)) => {
            tracing::debug!(
                from = %redacted_key(from),
                ?reason,
                "address mapping migration skipped"
            );
            Ok(MigrationOutcome::Skipped(reason))
        }
        Err(e) => {
            tracing::error!(
                from = %redacted_key(from),
                error = %e,
                "address mapping migration failed"
            );
            Err(WalletError::storage(e))
        }
    }
}

/// 扫描结果中优先取规范键记录，其次取最近更新的记录
fn pick_candidate(
    mut candidates: Vec<AddressMapping>,
    normalized: &MappingKey,
) -> Option<AddressMapping> {
    candidates.retain(|m| !m.network_address.is_empty());
    if let Some(pos) = candidates
        .iter()
        .position(|m| m.wallet_address == normalized.wallet_address)
    {
        return Some(candidates.swap_remove(pos));
    }
    candidates.into_iter().max_by_key(|m| m.updated_at)
}

fn redacted_key(key: &MappingKey) -> String {
    format!("{}@{}", redact_address(&key.wallet_address), key.chain_id)
}
