//! TRON 转账编排
//!
//! 发送流程（严格顺序，任一步失败即终止）：
//! Idle → AddressValidated → KeyExtracted → PayloadBuilt → Signed → Broadcast → Complete
//!
//! 地址校验先于任何网络请求与密钥派生；私钥只在签名调用期间存在。

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::domain::chain_config::COIN_TYPE_TRON;
use crate::domain::derivation::{CoinDerivation, MnemonicPhrase, SecretKey};
use crate::domain::tron::check_transfer_amount;
use crate::domain::wallet::Wallet;
use crate::error::{Result, WalletError};
use crate::infrastructure::log_redact::redact_address;
use crate::infrastructure::rpc_selector::EndpointSelector;
use crate::service::auth::{AuthContext, MnemonicProvider};
use crate::service::blockchain_client::{Broadcaster, TronBlockchainClient};
use crate::service::transaction_builder::{TransactionBuilder, TronTransactionBuilder};
use crate::service::transaction_signer::TronTransactionSigner;
use crate::utils::address_validator::AddressValidator;

/// 发送流程所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStage {
    Idle,
    AddressValidated,
    KeyExtracted,
    PayloadBuilt,
    Signed,
    Broadcast,
    Complete,
    Failed,
}

impl fmt::Display for SendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SendStage::Idle => "idle",
            SendStage::AddressValidated => "address_validated",
            SendStage::KeyExtracted => "key_extracted",
            SendStage::PayloadBuilt => "payload_built",
            SendStage::Signed => "signed",
            SendStage::Broadcast => "broadcast",
            SendStage::Complete => "complete",
            SendStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct TronTransactionService {
    builder: Arc<dyn TransactionBuilder>,
    signer: TronTransactionSigner,
    broadcaster: Arc<dyn Broadcaster>,
    client: Arc<TronBlockchainClient>,
    deriver: Arc<dyn CoinDerivation>,
}

impl TronTransactionService {
    /// 使用同一组端点构建节点构建器与广播客户端
    pub fn new(selector: Arc<EndpointSelector>, deriver: Arc<dyn CoinDerivation>) -> Self {
        let client = Arc::new(TronBlockchainClient::new(Arc::clone(&selector)));
        Self {
            builder: Arc::new(TronTransactionBuilder::new(selector)),
            signer: TronTransactionSigner::new(),
            broadcaster: client.clone(),
            client,
            deriver,
        }
    }

    pub fn with_components(
        builder: Arc<dyn TransactionBuilder>,
        broadcaster: Arc<dyn Broadcaster>,
        client: Arc<TronBlockchainClient>,
        deriver: Arc<dyn CoinDerivation>,
    ) -> Self {
        Self {
            builder,
            signer: TronTransactionSigner::new(),
            broadcaster,
            client,
            deriver,
        }
    }

    /// TRX 余额（SUN）
    pub async fn get_balance(&self, address: &str) -> Result<u64> {
        self.client.get_balance(address).await
    }

    /// 经认证门面取得助记词后发送
    ///
    /// 地址在弹出认证之前校验，无效地址不会触发认证
    pub async fn send(
        &self,
        provider: &dyn MnemonicProvider,
        auth: &AuthContext,
        wallet: &Wallet,
        from_address: &str,
        to_address: &str,
        amount_sun: u64,
    ) -> Result<String> {
        validate_request(from_address, to_address, amount_sun)?;
        let mnemonic = provider.obtain_mnemonic(wallet, auth).await.into_result()?;
        self.send_with_mnemonic(wallet, from_address, to_address, amount_sun, &mnemonic)
            .await
    }

    /// 发送 TRX，成功时返回交易 ID（非空）
    pub async fn send_with_mnemonic(
        &self,
        wallet: &Wallet,
        from_address: &str,
        to_address: &str,
        amount_sun: u64,
        mnemonic: &MnemonicPhrase,
    ) -> Result<String> {
        let mut stage = SendStage::Idle;
        let result = self
            .run_send(
                &mut stage,
                wallet,
                from_address,
                to_address,
                amount_sun,
                mnemonic,
            )
            .await;

        match &result {
            Ok(tx_id) => tracing::info!(
                tx_id = %tx_id,
                from = %redact_address(from_address),
                to = %redact_address(to_address),
                amount_sun,
                "TRX transfer complete"
            ),
            Err(e) => tracing::error!(
                stage = %SendStage::Failed,
                last_completed = %stage,
                from = %redact_address(from_address),
                to = %redact_address(to_address),
                error = %e,
                "TRX transfer failed"
            ),
        }
        result
    }

    /// 在后台任务中发送；`abort()` 丢弃结果，已发出的请求不会撤回
    pub fn spawn_send(
        self: &Arc<Self>,
        wallet: Wallet,
        from_address: String,
        to_address: String,
        amount_sun: u64,
        mnemonic: MnemonicPhrase,
    ) -> JoinHandle<Result<String>> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service
                .send_with_mnemonic(&wallet, &from_address, &to_address, amount_sun, &mnemonic)
                .await
        })
    }

    async fn run_send(
        &self,
        stage: &mut SendStage,
        wallet: &Wallet,
        from_address: &str,
        to_address: &str,
        amount_sun: u64,
        mnemonic: &MnemonicPhrase,
    ) -> Result<String> {
        validate_request(from_address, to_address, amount_sun)?;
        *stage = SendStage::AddressValidated;

        let key = self.extract_key(wallet, from_address, mnemonic).await?;
        *stage = SendStage::KeyExtracted;

        let unsigned = self
            .builder
            .create_transaction(from_address, to_address, amount_sun)
            .await?;
        *stage = SendStage::PayloadBuilt;

        let signed = self.signer.sign_transaction(&unsigned, &key)?;
        drop(key);
        *stage = SendStage::Signed;

        tracing::debug!(stage = %stage, tx_id = %signed.tx_id, "broadcasting signed transaction");
        let tx_id = self.broadcaster.broadcast(&signed).await?;
        *stage = SendStage::Broadcast;

        let tx_id = if tx_id.is_empty() { signed.tx_id } else { tx_id };
        if tx_id.is_empty() {
            return Err(WalletError::BroadcastFailed {
                message: "node accepted the transaction without an id".to_string(),
            });
        }
        *stage = SendStage::Complete;
        Ok(tx_id)
    }

    /// 派生 TRON 私钥并确认它对应发送地址
    async fn extract_key(
        &self,
        wallet: &Wallet,
        from_address: &str,
        mnemonic: &MnemonicPhrase,
    ) -> Result<SecretKey> {
        if !wallet.wallet_type.can_derive_keys() {
            return Err(WalletError::KeyDerivationUnsupported(format!(
                "{:?} wallets cannot sign TRON transactions",
                wallet.wallet_type
            )));
        }

        let deriver = Arc::clone(&self.deriver);
        let mnemonic = mnemonic.clone();
        let (key, derived_address) = tokio::task::spawn_blocking(move || {
            let key = deriver.derive_key(&mnemonic, COIN_TYPE_TRON)?;
            let address = deriver.derive_address(COIN_TYPE_TRON, &key)?;
            Ok::<_, WalletError>((key, address))
        })
        .await
        .map_err(|e| WalletError::KeyDerivation(format!("derivation task failed: {}", e)))??;

        if derived_address != from_address {
            return Err(WalletError::KeyDerivation(
                "derived key does not control the sending address".to_string(),
            ));
        }
        Ok(key)
    }
}

fn validate_request(from_address: &str, to_address: &str, amount_sun: u64) -> Result<()> {
    for address in [from_address, to_address] {
        if !AddressValidator::validate_tron_address(address) {
            return Err(WalletError::invalid_address(address));
        }
    }
    check_transfer_amount(amount_sun)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::domain::derivation::Bip44Deriver;
    use crate::domain::tron::RefBlockInfo;
    use crate::infrastructure::rate_limiter::EndpointRateLimiter;
    use crate::service::transaction_builder::UnsignedTransaction;
    use crate::service::transaction_signer::SignedTransaction;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const WALLET: &str = "0x9858EfFD232B4033E47d90003D23EC58E053e11f";
    const RECIPIENT: &str = "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8";

    /// 统计派生次数
    struct CountingDeriver {
        inner: Bip44Deriver,
        calls: AtomicUsize,
    }

    impl CoinDerivation for CountingDeriver {
        fn derive_key(&self, mnemonic: &MnemonicPhrase, coin_type: u32) -> Result<SecretKey> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.derive_key(mnemonic, coin_type)
        }
        fn derive_address(&self, coin_type: u32, key: &SecretKey) -> Result<String> {
            self.inner.derive_address(coin_type, key)
        }
        fn supports(&self, coin_type: u32) -> bool {
            self.inner.supports(coin_type)
        }
    }

    struct FixedBuilder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TransactionBuilder for FixedBuilder {
        async fn latest_block(&self) -> Result<RefBlockInfo> {
            RefBlockInfo::from_block(1, &"00".repeat(32))
        }
        async fn create_transaction(
            &self,
            _from: &str,
            _to: &str,
            _amount_sun: u64,
        ) -> Result<UnsignedTransaction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            UnsignedTransaction::from_payload(json!({"raw_data_hex": "0a02b2c3"}))
                .map_err(|e| WalletError::Signing(e.to_string()))
        }
    }

    struct RecordingBroadcaster {
        reply: Option<String>,
    }

    #[async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
            assert_eq!(signed.payload["signature"].as_array().map(Vec::len), Some(1));
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(WalletError::BroadcastFailed {
                    message: "bandwidth exceeded".into(),
                }),
            }
        }
    }

    fn service(
        reply: Option<&str>,
    ) -> (
        Arc<TronTransactionService>,
        Arc<CountingDeriver>,
        Arc<FixedBuilder>,
    ) {
        let deriver = Arc::new(CountingDeriver {
            inner: Bip44Deriver::new(),
            calls: AtomicUsize::new(0),
        });
        let builder = Arc::new(FixedBuilder {
            calls: AtomicUsize::new(0),
        });
        let selector = Arc::new(
            EndpointSelector::new(
                vec!["http://127.0.0.1:9".into()],
                Arc::new(EndpointRateLimiter::new(Duration::ZERO, vec![])),
                reqwest::Client::new(),
            )
            .unwrap(),
        );
        let service = TronTransactionService::with_components(
            builder.clone(),
            Arc::new(RecordingBroadcaster {
                reply: reply.map(str::to_string),
            }),
            Arc::new(TronBlockchainClient::new(selector)),
            deriver.clone(),
        );
        (Arc::new(service), deriver, builder)
    }

    fn sender() -> String {
        let deriver = Bip44Deriver::new();
        let mnemonic = MnemonicPhrase::parse(MNEMONIC).unwrap();
        let key = deriver.derive_key(&mnemonic, COIN_TYPE_TRON).unwrap();
        deriver.derive_address(COIN_TYPE_TRON, &key).unwrap()
    }

    /// Test 1: 完整流程返回广播交易 ID
    #[tokio::test]
    async fn test_send_returns_tx_id() {
        let (service, _, _) = service(Some("abc123"));
        let mnemonic = MnemonicPhrase::parse(MNEMONIC).unwrap();

        let tx_id = service
            .send_with_mnemonic(&Wallet::hd(WALLET, "Main"), &sender(), RECIPIENT, 1_000_000, &mnemonic)
            .await
            .unwrap();
        assert_eq!(tx_id, "abc123");
    }

    /// Test 2: 无效地址在派生与网络请求之前失败
    #[tokio::test]
    async fn test_invalid_address_fails_before_key_extraction() {
        let (service, deriver, builder) = service(Some("abc123"));
        let mnemonic = MnemonicPhrase::parse(MNEMONIC).unwrap();

        let err = service
            .send_with_mnemonic(&Wallet::hd(WALLET, "Main"), &sender(), "T123", 1, &mnemonic)
            .await
            .unwrap_err();

        assert!(matches!(err, WalletError::InvalidAddress { address } if address == "T123"));
        assert_eq!(deriver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(builder.calls.load(Ordering::SeqCst), 0);
    }

    /// Test 3: 广播失败原样传递
    #[tokio::test]
    async fn test_broadcast_failure_propagates() {
        let (service, _, _) = service(None);
        let mnemonic = MnemonicPhrase::parse(MNEMONIC).unwrap();

        let err = service
            .send_with_mnemonic(&Wallet::hd(WALLET, "Main"), &sender(), RECIPIENT, 5, &mnemonic)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::BroadcastFailed { message } if message == "bandwidth exceeded"));
    }

    /// Test 4: 助记词与发送地址不匹配
    #[tokio::test]
    async fn test_sender_must_match_derived_key() {
        let (service, _, builder) = service(Some("abc123"));
        let mnemonic = MnemonicPhrase::parse(MNEMONIC).unwrap();

        let err = service
            .send_with_mnemonic(&Wallet::hd(WALLET, "Main"), RECIPIENT, &sender(), 5, &mnemonic)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::KeyDerivation(_)));
        assert_eq!(builder.calls.load(Ordering::SeqCst), 0);
    }

    /// Test 5: 广播返回空 ID 时使用签名阶段的交易 ID
    #[tokio::test]
    async fn test_empty_broadcast_id_falls_back() {
        let (service, _, _) = service(Some(""));
        let mnemonic = MnemonicPhrase::parse(MNEMONIC).unwrap();

        let handle = service.spawn_send(
            Wallet::hd(WALLET, "Main"),
            sender(),
            RECIPIENT.to_string(),
            5,
            mnemonic,
        );
        let tx_id = handle.await.unwrap().unwrap();
        assert_eq!(tx_id.len(), 64);
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let (service, _, _) = service(Some("abc123"));
        let mnemonic = MnemonicPhrase::parse(MNEMONIC).unwrap();
        assert!(matches!(
            service
                .send_with_mnemonic(&Wallet::hd(WALLET, "Main"), &sender(), RECIPIENT, 0, &mnemonic)
                .await,
            Err(WalletError::InvalidAmount(_))
        ));
    }

    /// 超出有符号 64 位范围的金额在本地拒绝，不进入构建
    #[tokio::test]
    async fn test_amount_above_signed_range_rejected() {
        let (service, deriver, builder) = service(Some("abc123"));
        let mnemonic = MnemonicPhrase::parse(MNEMONIC).unwrap();
        let err = service
            .send_with_mnemonic(
                &Wallet::hd(WALLET, "Main"),
                &sender(),
                RECIPIENT,
                i64::MAX as u64 + 1,
                &mnemonic,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
        assert_eq!(deriver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(builder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(SendStage::AddressValidated.to_string(), "address_validated");
        assert_eq!(SendStage::Failed.to_string(), "failed");
    }
}
