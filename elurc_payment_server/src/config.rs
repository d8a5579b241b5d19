use std::{env, str::FromStr, sync::Arc, time::Duration as StdDuration};

use chrono::Duration;
use elurc_common::{parse_boolean_flag, ElurcAmount, Secret};
use elurc_payment_engine::{
    payments::{
        PaymentConfig,
        DEFAULT_PAYMENT_TOLERANCE,
        DEFAULT_PAYMENT_WINDOW_MINS,
        DEFAULT_REFUND_MINIMUM,
        DEFAULT_SIGNATURE_PAGE_SIZE,
        DEFAULT_VALIDATION_MAX_AGE_MINS,
    },
    solana::{keys::keypair_from_json, Keypair, Pubkey, Signer},
};
use log::*;

use crate::errors::ServerError;

const DEFAULT_ELURC_HOST: &str = "127.0.0.1";
const DEFAULT_ELURC_PORT: u16 = 8460;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/elurc_store.db";
const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 20;

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub rpc_url: String,
    /// The network timeout for a single RPC request. This is independent of the payment window.
    pub rpc_timeout: StdDuration,
    /// Payment policy and the mint and shop wallet addresses
    pub payments: PaymentConfig,
    /// The shop wallet's signing key. Refunds are unavailable without it.
    pub shop_keypair: Option<Arc<Keypair>>,
    /// Payment confirmation emails are requested by POSTing to this URL
    pub email_webhook_url: Option<String>,
    pub admin_token: Secret<String>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// If true, stale pending orders are timed out in the background, rather than only when they are polled.
    pub expiry_sweep: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only the keypair's address is printed
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("rpc_url", &self.rpc_url)
            .field("rpc_timeout", &self.rpc_timeout)
            .field("payments", &self.payments)
            .field("shop_keypair", &self.shop_keypair.as_ref().map(|kp| kp.pubkey()))
            .field("email_webhook_url", &self.email_webhook_url)
            .field("admin_token", &self.admin_token)
            .field("use_x_forwarded_for", &self.use_x_forwarded_for)
            .field("use_forwarded", &self.use_forwarded)
            .field("expiry_sweep", &self.expiry_sweep)
            .finish()
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16, payments: PaymentConfig) -> Self {
        Self {
            host: host.to_string(),
            port,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            rpc_timeout: StdDuration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            payments,
            shop_keypair: None,
            email_webhook_url: None,
            admin_token: Secret::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            expiry_sweep: true,
        }
    }

    /// Reads the configuration from the environment. Malformed optional values are logged and replaced with their
    /// defaults. A missing or malformed mint or shop wallet, or a malformed shop keypair, is an error.
    pub fn from_env_or_default() -> Result<Self, ServerError> {
        let host = env::var("ELURC_HOST").ok().unwrap_or_else(|| DEFAULT_ELURC_HOST.into());
        let port = env::var("ELURC_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for ELURC_PORT. {e} Using the default, {DEFAULT_ELURC_PORT}, \
                         instead."
                    );
                    DEFAULT_ELURC_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_ELURC_PORT);
        let database_url = env::var("ELURC_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ ELURC_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let rpc_url = env::var("ELURC_RPC_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ ELURC_RPC_URL is not set. Using the public endpoint, {DEFAULT_RPC_URL}.");
            DEFAULT_RPC_URL.to_string()
        });
        let rpc_timeout = StdDuration::from_secs(parse_env("ELURC_RPC_TIMEOUT_SECS", DEFAULT_RPC_TIMEOUT_SECS));
        let shop_keypair = load_shop_keypair(env::var("ELURC_SHOP_WALLET_KEYPAIR").ok())?;
        let payments = payment_config_from_env(shop_keypair.as_deref())?;
        let email_webhook_url = env::var("ELURC_EMAIL_WEBHOOK_URL").ok().filter(|s| !s.trim().is_empty());
        if email_webhook_url.is_none() {
            info!("🪛️ ELURC_EMAIL_WEBHOOK_URL is not set. Payment confirmation emails will not be sent.");
        }
        let admin_token = env::var("ELURC_ADMIN_TOKEN").ok().unwrap_or_else(|| {
            warn!("🪛️ ELURC_ADMIN_TOKEN is not set. All admin requests will be refused.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("ELURC_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("ELURC_USE_FORWARDED").ok(), false);
        let expiry_sweep = parse_boolean_flag(env::var("ELURC_EXPIRY_SWEEP").ok(), true);
        Ok(Self {
            host,
            port,
            database_url,
            rpc_url,
            rpc_timeout,
            payments,
            shop_keypair,
            email_webhook_url,
            admin_token: Secret::new(admin_token),
            use_x_forwarded_for,
            use_forwarded,
            expiry_sweep,
        })
    }
}

/// Parses the shop wallet keypair. An absent value disables refunds; a malformed one is a configuration error.
pub fn load_shop_keypair(value: Option<String>) -> Result<Option<Arc<Keypair>>, ServerError> {
    match value.filter(|s| !s.trim().is_empty()) {
        None => {
            warn!("🪛️ ELURC_SHOP_WALLET_KEYPAIR is not set. Refunds are disabled.");
            Ok(None)
        },
        Some(json) => {
            let keypair = keypair_from_json(&json).map_err(|e| {
                ServerError::ConfigurationError(format!("Invalid shop keypair in ELURC_SHOP_WALLET_KEYPAIR. {e}"))
            })?;
            info!("🪛️ Refunds will be sent from {}", keypair.pubkey());
            Ok(Some(Arc::new(keypair)))
        },
    }
}

fn payment_config_from_env(keypair: Option<&Keypair>) -> Result<PaymentConfig, ServerError> {
    let token_mint = env::var("ELURC_TOKEN_MINT")
        .map_err(|e| ServerError::ConfigurationError(format!("{e} [ELURC_TOKEN_MINT]")))
        .and_then(|s| parse_pubkey("ELURC_TOKEN_MINT", &s))?;
    let shop_wallet = match (env::var("ELURC_SHOP_WALLET").ok(), keypair) {
        (Some(s), kp) => {
            let wallet = parse_pubkey("ELURC_SHOP_WALLET", &s)?;
            check_wallet_matches_keypair(wallet, kp)?
        },
        (None, Some(kp)) => {
            info!("🪛️ ELURC_SHOP_WALLET is not set. Using the shop keypair's address, {}", kp.pubkey());
            kp.pubkey()
        },
        (None, None) => {
            return Err(ServerError::ConfigurationError(
                "Neither ELURC_SHOP_WALLET nor ELURC_SHOP_WALLET_KEYPAIR is set".into(),
            ))
        },
    };
    let config = PaymentConfig::new(token_mint, shop_wallet)
        .with_tolerance(ElurcAmount::from(parse_env("ELURC_PAYMENT_TOLERANCE", DEFAULT_PAYMENT_TOLERANCE)))
        .with_payment_window(Duration::minutes(parse_env("ELURC_PAYMENT_WINDOW_MINS", DEFAULT_PAYMENT_WINDOW_MINS)))
        .with_validation_max_age(Duration::minutes(parse_env(
            "ELURC_VALIDATION_MAX_AGE_MINS",
            DEFAULT_VALIDATION_MAX_AGE_MINS,
        )))
        .with_refund_minimum(ElurcAmount::from(parse_env("ELURC_REFUND_MINIMUM", DEFAULT_REFUND_MINIMUM)))
        .with_signature_page_size(parse_env("ELURC_SIGNATURE_PAGE_SIZE", DEFAULT_SIGNATURE_PAGE_SIZE));
    Ok(config)
}

/// The configured shop wallet must be the keypair's address, otherwise refunds would be sent from an account that
/// payments never arrive in.
pub fn check_wallet_matches_keypair(wallet: Pubkey, keypair: Option<&Keypair>) -> Result<Pubkey, ServerError> {
    match keypair {
        Some(kp) if kp.pubkey() != wallet => Err(ServerError::ConfigurationError(format!(
            "ELURC_SHOP_WALLET ({wallet}) does not match the address of ELURC_SHOP_WALLET_KEYPAIR ({})",
            kp.pubkey()
        ))),
        _ => Ok(wallet),
    }
}

fn parse_pubkey(name: &str, value: &str) -> Result<Pubkey, ServerError> {
    Pubkey::from_str(value.trim())
        .map_err(|e| ServerError::ConfigurationError(format!("{value} is not a valid address for {name}. {e}")))
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name}: {s}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
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
