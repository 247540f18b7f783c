pub mod db;
pub mod log_redact;
pub mod logging;
pub mod rate_limiter;
pub mod rpc_selector;
