// 地址映射数据访问 Repository

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::domain::address_mapping::{
    AddressMapping, MappingKey, MigrationOutcome, MigrationSkipReason,
};

// ============ Repository Trait ============

#[async_trait]
pub trait AddressMappingRepository: Send + Sync {
    /// 按精确复合键查询
    async fn find(&self, key: &MappingKey) -> Result<Option<AddressMapping>>;

    /// 按键 upsert；已存在时只覆盖 network_address
    async fn upsert(&self, key: &MappingKey, network_address: &str) -> Result<AddressMapping>;

    /// 按 wallet_address 大小写不敏感扫描，可选按链过滤
    async fn find_by_wallet_ci(
        &self,
        wallet_address: &str,
        chain_id: Option<i64>,
    ) -> Result<Vec<AddressMapping>>;

    /// 在同一事务中把 `from` 记录写到 `to` 并删除 `from`
    ///
    /// `to` 已存在或 `from` 不存在时不做任何修改
    async fn migrate(
        &self,
        from: &MappingKey,
        to: &MappingKey,
        network_address: &str,
    ) -> Result<MigrationOutcome>;
}

// ============ PostgreSQL 实现 ============

type MappingRow = (String, i64, String, DateTime<Utc>, DateTime<Utc>);

fn from_row(row: MappingRow) -> AddressMapping {
    AddressMapping {
        wallet_address: row.0,
        chain_id: row.1,
        network_address: row.2,
        created_at: row.3,
        updated_at: row.4,
    }
}

pub struct PgAddressMappingRepository {
    pool: PgPool,
}

impl PgAddressMappingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressMappingRepository for PgAddressMappingRepository {
    async fn find(&self, key: &MappingKey) -> Result<Option<AddressMapping>> {
        let row = sqlx::query_as::<_, MappingRow>(
            "SELECT wallet_address, chain_id, network_address, created_at, updated_at
             FROM wallet_address_mappings
             WHERE wallet_address = $1 AND chain_id = $2",
        )
        .bind(&key.wallet_address)
        .bind(key.chain_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to query address mapping {}", key))?;

        Ok(row.map(from_row))
    }

    async fn upsert(&self, key: &MappingKey, network_address: &str) -> Result<AddressMapping> {
        let row = sqlx::query_as::<_, MappingRow>(
            "INSERT INTO wallet_address_mappings (wallet_address, chain_id, network_address)
             VALUES ($1, $2, $3)
             ON CONFLICT (wallet_address, chain_id)
             DO UPDATE SET network_address = EXCLUDED.network_address,
                           updated_at = CURRENT_TIMESTAMP
             RETURNING wallet_address, chain_id, network_address, created_at, updated_at",
        )
        .bind(&key.wallet_address)
        .bind(key.chain_id)
        .bind(network_address)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert address mapping {}", key))?;

        Ok(from_row(row))
    }

    async fn find_by_wallet_ci(
        &self,
        wallet_address: &str,
        chain_id: Option<i64>,
    ) -> Result<Vec<AddressMapping>> {
        let rows = sqlx::query_as::<_, MappingRow>(
            "SELECT wallet_address, chain_id, network_address, created_at, updated_at
             FROM wallet_address_mappings
             WHERE LOWER(wallet_address) = LOWER($1)
               AND ($2::BIGINT IS NULL OR chain_id = $2)
             ORDER BY chain_id, updated_at DESC",
        )
        .bind(wallet_address)
        .bind(chain_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to scan address mappings")?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn migrate(
        &self,
        from: &MappingKey,
        to: &MappingKey,
        network_address: &str,
    ) -> Result<MigrationOutcome> {
        if from == to {
            return Ok(MigrationOutcome::Skipped(MigrationSkipReason::SameKey));
        }

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let target_exists: Option<(i64,)> = sqlx::query_as(
            "SELECT chain_id FROM wallet_address_mappings
             WHERE wallet_address = $1 AND chain_id = $2
             FOR UPDATE",
        )
        .bind(&to.wallet_address)
        .bind(to.chain_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to check migration target")?;

        if target_exists.is_some() {
            tx.rollback().await.ok();
            return Ok(MigrationOutcome::Skipped(
                MigrationSkipReason::AlreadyNormalized,
            ));
        }

        let source: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT created_at FROM wallet_address_mappings
             WHERE wallet_address = $1 AND chain_id = $2
             FOR UPDATE",
        )
        .bind(&from.wallet_address)
        .bind(from.chain_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock migration source")?;

        let Some((created_at,)) = source else {
            tx.rollback().await.ok();
            return Ok(MigrationOutcome::Skipped(MigrationSkipReason::SourceMissing));
        };

        // 先复制再删除
        sqlx::query(
            "INSERT INTO wallet_address_mappings
                 (wallet_address, chain_id, network_address, created_at, updated_at)
             VALUES ($1, $2, $3, $4, CURRENT_TIMESTAMP)",
        )
        .bind(&to.wallet_address)
        .bind(to.chain_id)
        .bind(network_address)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert normalized mapping")?;

        sqlx::query("DELETE FROM wallet_address_mappings WHERE wallet_address = $1 AND chain_id = $2")
            .bind(&from.wallet_address)
            .bind(from.chain_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete stale mapping")?;

        tx.commit().await.context("Failed to commit migration")?;

        Ok(MigrationOutcome::Migrated)
    }
}

// ============ 内存实现 ============

/// 进程内实现；写操作在同一把写锁内完成，语义等同单事务
#[derive(Default)]
pub struct InMemoryAddressMappingRepository {
    records: RwLock<BTreeMap<MappingKey, AddressMapping>>,
}

impl InMemoryAddressMappingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录总数
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// 直接写入原始键（不做规范化），用于导入历史数据
    pub async fn insert_raw(&self, key: MappingKey, network_address: &str) {
        let mapping = AddressMapping::new(&key, network_address);
        self.records.write().await.insert(key, mapping);
    }

    pub async fn snapshot(&self) -> Vec<AddressMapping> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl AddressMappingRepository for InMemoryAddressMappingRepository {
    async fn find(&self, key: &MappingKey) -> Result<Option<AddressMapping>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn upsert(&self, key: &MappingKey, network_address: &str) -> Result<AddressMapping> {
        let mut records = self.records.write().await;
        let mapping = records
            .entry(key.clone())
            .and_modify(|m| {
                m.network_address = network_address.to_string();
                m.updated_at = Utc::now();
            })
            .or_insert_with(|| AddressMapping::new(key, network_address));
        Ok(mapping.clone())
    }

    async fn find_by_wallet_ci(
        &self,
        wallet_address: &str,
        chain_id: Option<i64>,
    ) -> Result<Vec<AddressMapping>> {
        let needle = wallet_address.to_lowercase();
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|m| m.wallet_address.to_lowercase() == needle)
            .filter(|m| chain_id.map_or(true, |id| m.chain_id == id))
            .cloned()
            .collect())
    }

    async fn migrate(
        &self,
        from: &MappingKey,
        to: &MappingKey,
        network_address: &str,
    ) -> Result<MigrationOutcome> {
        if from == to {
            return Ok(MigrationOutcome::Skipped(MigrationSkipReason::SameKey));
        }

        let mut records = self.records.write().await;
        if records.contains_key(to) {
            return Ok(MigrationOutcome::Skipped(
                MigrationSkipReason::AlreadyNormalized,
            ));
        }
        let Some(source) = records.get(from) else {
            return Ok(MigrationOutcome::Skipped(MigrationSkipReason::SourceMissing));
        };

        let migrated = AddressMapping {
            wallet_address: to.wallet_address.clone(),
            chain_id: to.chain_id,
            network_address: network_address.to_string(),
            created_at: source.created_at,
            updated_at: Utc::now(),
        };
        records.insert(to.clone(), migrated);
        records.remove(from);

        Ok(MigrationOutcome::Migrated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRON: i64 = 728126428;

    #[tokio::test]
    async fn test_upsert_overwrites_network_address_only() {
        let repo = InMemoryAddressMappingRepository::new();
        let key = MappingKey::new("0xabc", TRON);

        let first = repo.upsert(&key, "TOld").await.unwrap();
        let second = repo.upsert(&key, "TNew").await.unwrap();

        assert_eq!(second.network_address, "TNew");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_case_insensitive_scan() {
        let repo = InMemoryAddressMappingRepository::new();
        repo.insert_raw(MappingKey::new("0xABC", TRON), "T1").await;
        repo.insert_raw(MappingKey::new("0xabc", 1), "0xabc").await;
        repo.insert_raw(MappingKey::new("0xdef", TRON), "T2").await;

        let all = repo.find_by_wallet_ci("0xAbC", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let tron_only = repo.find_by_wallet_ci("0xabc", Some(TRON)).await.unwrap();
        assert_eq!(tron_only.len(), 1);
        assert_eq!(tron_only[0].network_address, "T1");
    }

    #[tokio::test]
    async fn test_migrate_moves_record() {
        let repo = InMemoryAddressMappingRepository::new();
        let old = MappingKey::new("0xABC", TRON);
        repo.insert_raw(old.clone(), "T1").await;

        let outcome = repo.migrate(&old, &old.normalized(), "T1").await.unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated);

        assert!(repo.find(&old).await.unwrap().is_none());
        let moved = repo.find(&old.normalized()).await.unwrap().unwrap();
        assert_eq!(moved.network_address, "T1");
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_migrate_skip_reasons() {
        let repo = InMemoryAddressMappingRepository::new();
        let old = MappingKey::new("0xABC", TRON);
        let normalized = old.normalized();

        assert_eq!(
            repo.migrate(&normalized, &normalized, "T1").await.unwrap(),
            MigrationOutcome::Skipped(MigrationSkipReason::SameKey)
        );
        assert_eq!(
            repo.migrate(&old, &normalized, "T1").await.unwrap(),
            MigrationOutcome::Skipped(MigrationSkipReason::SourceMissing)
        );

        repo.insert_raw(old.clone(), "T1").await;
        repo.insert_raw(normalized.clone(), "T1").await;
        assert_eq!(
            repo.migrate(&old, &normalized, "T1").await.unwrap(),
            MigrationOutcome::Skipped(MigrationSkipReason::AlreadyNormalized)
        );
        assert_eq!(repo.len().await, 2);
    }

    // ============ 集成测试（需要数据库）============

    async fn pg_repo() -> Option<PgAddressMappingRepository> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.ok()?;
        crate::infrastructure::db::run_migrations(&pool).await.ok()?;
        Some(PgAddressMappingRepository::new(pool))
    }

    #[tokio::test]
    #[ignore] // 需要数据库环境
    async fn test_pg_upsert_and_migrate() {
        let Some(repo) = pg_repo().await else {
            return;
        };
        let wallet = format!("0xPgTest{}", Utc::now().timestamp_nanos_opt().unwrap_or(0));
        let old = MappingKey::new(wallet.clone(), TRON);

        repo.upsert(&old, "TLegacy").await.unwrap();
        let outcome = repo.migrate(&old, &old.normalized(), "TLegacy").await.unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated);

        let again = repo.migrate(&old, &old.normalized(), "TLegacy").await.unwrap();
        assert!(matches!(again, MigrationOutcome::Skipped(_)));

        let found = repo.find_by_wallet_ci(&wallet, Some(TRON)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].wallet_address, wallet.to_lowercase());
    }
}
