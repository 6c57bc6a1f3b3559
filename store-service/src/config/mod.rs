use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{self as core_config, get_env, Environment};
use service_core::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub mongodb: MongoConfig,
    pub jwt: JwtConfig,
    pub stripe: StripeConfig,
    pub checkout: CheckoutConfig,
    pub uploads: UploadsConfig,
    pub geocoder: GeocoderConfig,
    pub smtp: SmtpConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub expiry_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutConfig {
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
    pub api_key: Secret<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: Secret<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub auth_attempts: u32,
    pub auth_window_seconds: u64,
}

impl StoreConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let environment = Environment::from_env()?;
        let is_prod = environment.is_prod();

        Ok(StoreConfig {
            common: common_config,
            environment,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("store_db"), is_prod)?,
            },
            jwt: JwtConfig {
                secret: Secret::new(get_env("JWT_SECRET", Some("dev-secret"), is_prod)?),
                expiry_hours: parse_number("JWT_EXPIRY_HOURS", get_env("JWT_EXPIRY_HOURS", Some("24"), is_prod)?)?,
            },
            stripe: StripeConfig {
                secret_key: Secret::new(get_env("STRIPE_SECRET_KEY", Some(""), is_prod)?),
                webhook_secret: Secret::new(get_env("STRIPE_WEBHOOK_SECRET", Some(""), is_prod)?),
                api_base_url: get_env(
                    "STRIPE_API_BASE_URL",
                    Some("https://api.stripe.com/v1"),
                    is_prod,
                )?,
            },
            checkout: CheckoutConfig {
                success_url: get_env(
                    "CHECKOUT_SUCCESS_URL",
                    Some("http://localhost:7777/cart/success"),
                    is_prod,
                )?,
                cancel_url: get_env(
                    "CHECKOUT_CANCEL_URL",
                    Some("http://localhost:7777/cart/cancel"),
                    is_prod,
                )?,
            },
            uploads: UploadsConfig {
                dir: get_env("UPLOADS_DIR", Some("uploads"), is_prod)?,
            },
            geocoder: GeocoderConfig {
                api_key: Secret::new(get_env("OPEN_CAGE_KEY", Some(""), is_prod)?),
                base_url: get_env(
                    "OPEN_CAGE_BASE_URL",
                    Some("https://api.opencagedata.com/geocode/v1/json"),
                    is_prod,
                )?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some(""), is_prod)?,
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: Secret::new(get_env("SMTP_PASSWORD", Some(""), is_prod)?),
                from: get_env("SMTP_FROM", Some("admin@localhost"), is_prod)?,
            },
            rate_limit: RateLimitConfig {
                auth_attempts: parse_number(
                    "RATE_LIMIT_AUTH_ATTEMPTS",
                    get_env("RATE_LIMIT_AUTH_ATTEMPTS", Some("10"), is_prod)?,
                )?,
                auth_window_seconds: parse_number(
                    "RATE_LIMIT_AUTH_WINDOW_SECONDS",
                    get_env("RATE_LIMIT_AUTH_WINDOW_SECONDS", Some("60"), is_prod)?,
                )?,
            },
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: String) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::ConfigError(anyhow::anyhow!("{} must be a number, got {:?}", key, value)))
}
