//! TRON 端点连通性检查
//!
//! 对配置中的每个端点执行 getnowblock，输出引用区块绑定或失败原因。
//! 用法: tron_endpoint_check [--config path/to/config.toml]

use std::sync::Arc;

use anyhow::{Context, Result};
use multichain_wallet::config::Config;
use multichain_wallet::infrastructure::logging::init_logging;
use multichain_wallet::infrastructure::rpc_selector::EndpointSelector;
use multichain_wallet::service::transaction_builder::TronTransactionBuilder;

fn config_path_from_args() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
    }
    std::env::var("CONFIG_PATH").ok()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env_and_file(config_path_from_args().as_deref())
        .context("load configuration")?;
    config.validate().context("validate configuration")?;
    let _log_guard = init_logging(&config.logging)?;

    let selector = Arc::new(EndpointSelector::from_config(&config)?);
    let builder = TronTransactionBuilder::new(Arc::clone(&selector));

    println!(
        "TRON endpoint check (chain_id={}, {} endpoints)",
        config.tron.chain_id,
        selector.endpoints().len()
    );

    let mut failures = 0usize;
    for endpoint in selector.endpoints() {
        let waited = selector.rate_limiter().acquire(endpoint).await;
        match builder.latest_block_from(endpoint).await {
            Ok((number, info)) => println!(
                "[OK]   {:40} block={} ref_block_bytes={} ref_block_hash={} waited={}ms",
                endpoint,
                number,
                info.ref_block_bytes_hex(),
                info.ref_block_hash_hex(),
                waited.as_millis()
            ),
            Err(e) => {
                failures += 1;
                println!("[FAIL] {:40} {}", endpoint, e);
            }
        }
    }

    if failures == selector.endpoints().len() {
        anyhow::bail!("all {} endpoints failed", failures);
    }
    if failures > 0 {
        tracing::warn!(failures, "some TRON endpoints are unavailable");
    }

    Ok(())
}
