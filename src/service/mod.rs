pub mod address_mapping_store;
pub mod auth;
pub mod blockchain_client;
pub mod network_address_service;
pub mod transaction_builder;
pub mod transaction_signer;
pub mod tron_transaction_service; // TRON 转账编排

pub use address_mapping_store::AddressMappingStore;
pub use auth::{AuthContext, MnemonicOutcome, MnemonicProvider};
pub use blockchain_client::{BroadcastResponse, Broadcaster, TronBlockchainClient};
pub use network_address_service::{AddressSource, NetworkAddressService, ResolvedAddress};
pub use transaction_builder::{TransactionBuilder, TronTransactionBuilder, UnsignedTransaction};
pub use transaction_signer::{SignedTransaction, TronTransactionSigner};
pub use tron_transaction_service::{SendStage, TronTransactionService};
