use std::env;

use chrono::Duration;
use flora_settlement_engine::DEFAULT_COMMISSION_RATE_BPS;
use fpg_common::{helpers::parse_boolean_flag, Secret};
use log::*;

const DEFAULT_FPG_HOST: &str = "127.0.0.1";
const DEFAULT_FPG_PORT: u16 = 8460;
const DEFAULT_AUTO_COMPLETE_AFTER: Duration = Duration::days(3);
const DEFAULT_WORKER_INTERVAL_SECS: u64 = 60;
const DEFAULT_REFUND_MAX_ATTEMPTS: u32 = 8;
const DEFAULT_REFUND_BASE_DELAY: Duration = Duration::seconds(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address,
    /// rather than the connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather
    /// than the connection's remote address.
    pub use_forwarded: bool,
    /// The platform's cut of each farmer sub-total, in basis points (300 = 3%).
    pub commission_rate_bps: i64,
    /// How long a delivered order may sit without a dispute before the settlement worker
    /// auto-completes it and releases the escrow.
    pub auto_complete_after: Duration,
    /// How often the background workers wake up.
    pub worker_interval_secs: u64,
    pub providers: ProviderCredentials,
    pub refund: RefundConfig,
}

/// The shared secrets used to verify inbound provider payloads. Kept as a separate small struct
/// so it can be handed to the request handlers without dragging the whole configuration along.
#[derive(Clone, Debug, Default)]
pub struct ProviderCredentials {
    /// VNPay HMAC-SHA512 hash secret for callback signatures.
    pub vnpay_hash_secret: Secret<String>,
    /// PayOS HMAC-SHA256 checksum key for webhook signatures.
    pub payos_checksum_key: Secret<String>,
}

#[derive(Clone, Debug)]
pub struct RefundConfig {
    /// The provider refund endpoint refund instructions are POSTed to.
    pub endpoint: String,
    /// Attempts before a refund is abandoned and its order marked disputed.
    pub max_attempts: u32,
    /// First retry delay; subsequent retries double it.
    pub base_delay: Duration,
}

impl Default for RefundConfig {
    fn default() -> Self {
        Self {
            endpoint: String::default(),
            max_attempts: DEFAULT_REFUND_MAX_ATTEMPTS,
            base_delay: DEFAULT_REFUND_BASE_DELAY,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FPG_HOST.to_string(),
            port: DEFAULT_FPG_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            commission_rate_bps: DEFAULT_COMMISSION_RATE_BPS,
            auto_complete_after: DEFAULT_AUTO_COMPLETE_AFTER,
            worker_interval_secs: DEFAULT_WORKER_INTERVAL_SECS,
            providers: ProviderCredentials::default(),
            refund: RefundConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FPG_HOST").ok().unwrap_or_else(|| DEFAULT_FPG_HOST.into());
        let port = env::var("FPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for FPG_PORT. {e} Using the default, {DEFAULT_FPG_PORT}, instead."
                    );
                    DEFAULT_FPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_FPG_PORT);
        let database_url = env::var("FPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ FPG_DATABASE_URL is not set. Please set it to the URL for the FPG database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("FPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("FPG_USE_FORWARDED").ok(), false);
        let commission_rate_bps = parse_i64_var("FPG_COMMISSION_RATE_BPS", DEFAULT_COMMISSION_RATE_BPS);
        let auto_complete_after = env::var("FPG_AUTO_COMPLETE_AFTER_DAYS")
            .map_err(|_| {
                info!(
                    "🪛️ FPG_AUTO_COMPLETE_AFTER_DAYS is not set. Using the default value of {} days.",
                    DEFAULT_AUTO_COMPLETE_AFTER.num_days()
                )
            })
            .and_then(|s| {
                s.parse::<i64>()
                    .map(Duration::days)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for FPG_AUTO_COMPLETE_AFTER_DAYS. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_AUTO_COMPLETE_AFTER);
        let worker_interval_secs =
            parse_i64_var("FPG_WORKER_INTERVAL_SECS", DEFAULT_WORKER_INTERVAL_SECS as i64).max(1) as u64;
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            commission_rate_bps,
            auto_complete_after,
            worker_interval_secs,
            providers: ProviderCredentials::from_env_or_default(),
            refund: RefundConfig::from_env_or_default(),
        }
    }
}

impl ProviderCredentials {
    pub fn from_env_or_default() -> Self {
        let vnpay_hash_secret = env::var("FPG_VNPAY_HASH_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ FPG_VNPAY_HASH_SECRET is not set. VNPay callbacks will fail signature verification until it is \
                 configured."
            );
            String::default()
        });
        let payos_checksum_key = env::var("FPG_PAYOS_CHECKSUM_KEY").ok().unwrap_or_else(|| {
            error!(
                "🪛️ FPG_PAYOS_CHECKSUM_KEY is not set. PayOS webhooks will fail signature verification until it is \
                 configured."
            );
            String::default()
        });
        Self { vnpay_hash_secret: Secret::new(vnpay_hash_secret), payos_checksum_key: Secret::new(payos_checksum_key) }
    }
}

impl RefundConfig {
    pub fn from_env_or_default() -> Self {
        let endpoint = env::var("FPG_REFUND_ENDPOINT").ok().unwrap_or_else(|| {
            warn!(
                "🪛️ FPG_REFUND_ENDPOINT is not set. Refund jobs will be retried until it is configured and the \
                 provider accepts them."
            );
            String::default()
        });
        let max_attempts = parse_i64_var("FPG_REFUND_MAX_ATTEMPTS", DEFAULT_REFUND_MAX_ATTEMPTS as i64).max(1) as u32;
        let base_delay = env::var("FPG_REFUND_BASE_DELAY_SECS")
            .ok()
            .and_then(|s| s.parse::<i64>().map(Duration::seconds).ok())
            .unwrap_or(DEFAULT_REFUND_BASE_DELAY);
        Self { endpoint, max_attempts, base_delay }
    }
}

//-------------------------------------------------  ServerOptions  ---------------------------------------------------
/// A subset of the server configuration handed to request handlers. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the
/// system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

fn parse_i64_var(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for {key}: {e}. Using the default, {default}."))
                .ok()
        })
        .unwrap_or(default)
}
