//! Settings of the whole application. They are read once from the environment
//! (and `.env` files) by the binaries and passed down explicitly.

use anyhow::{Context, Result};
use log::LevelFilter;
use std::path::PathBuf;
use std::str::FromStr;

pub const COMMON_ENV_FILE: &str = "common.env";

pub const AUTH_TOKEN_ENV: &str = "AUTH_TOKEN";
pub const ACCOUNT_ID_ENV: &str = "ACCOUNT_ID";
pub const METAAPI_DOMAIN_ENV: &str = "METAAPI_DOMAIN";
pub const METAAPI_REGION_ENV: &str = "METAAPI_REGION";
pub const MARKET_DATA_API_URL_ENV: &str = "MARKET_DATA_API_URL";
pub const PROVISIONING_API_URL_ENV: &str = "PROVISIONING_API_URL";
pub const NUMBER_OF_REQUEST_RETRIES_ENV: &str = "NUMBER_OF_REQUEST_RETRIES";
pub const SECONDS_TO_SLEEP_BEFORE_REQUEST_RETRY_ENV: &str =
    "SECONDS_TO_SLEEP_BEFORE_REQUEST_RETRY";

pub const TELEGRAM_BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_BOT_CHAT_ID_ENV: &str = "TELEGRAM_BOT_CHAT_ID";

pub const MARKET_DATA_PATH_ENV: &str = "MARKET_DATA_PATH";
pub const MARKET_DATA_STORAGE_ENV: &str = "MARKET_DATA_STORAGE";

pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
pub const TARGET_LOGGER_ENV: &str = "TARGET_LOGGER";

pub const DEFAULT_METAAPI_DOMAIN: &str = "agiliumtrade.agiliumtrade.ai";
pub const DEFAULT_METAAPI_REGION: &str = "new-york";
pub const DEFAULT_NUMBER_OF_REQUEST_RETRIES: u32 = 5;
pub const DEFAULT_SECONDS_TO_SLEEP_BEFORE_REQUEST_RETRY: u32 = 1;
pub const DEFAULT_MARKET_DATA_PATH: &str = "jar/data.json";
pub const DEFAULT_TARGET_LOGGER: &str = "market_data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiUrls {
    pub provisioning: String,
    pub market_data: String,
}

impl ApiUrls {
    pub fn for_domain(domain: &str, region: &str) -> Self {
        Self {
            provisioning: format!("https://mt-provisioning-api-v1.{}", domain),
            market_data: format!("https://mt-market-data-client-api-v1.{}.{}", region, domain),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaapiSettings {
    pub auth_token: String,
    pub account_id: String,
    pub urls: ApiUrls,
    pub number_of_request_retries: u32,
    pub seconds_to_sleep_before_request_retry: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StorageFormat {
    /// The whole dataset in one json file.
    JsonSnapshot,
    /// One csv file per series under a directory.
    CsvSeries,
}

impl FromStr for StorageFormat {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "json" => Ok(Self::JsonSnapshot),
            "csv" => Ok(Self::CsvSeries),
            _ => anyhow::bail!("invalid storage format: {}", input),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub path: PathBuf,
    pub format: StorageFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub metaapi: MetaapiSettings,
    pub telegram: Option<TelegramSettings>,
    pub storage: StorageSettings,
    pub log_level: LevelFilter,
    pub target_logger: String,
}

impl Settings {
    /// Loads `common.env` if it exists and reads the settings from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv::from_filename(COMMON_ENV_FILE).ok();
        dotenv::dotenv().ok();

        Self::from_vars(|name| dotenv::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            var(name).with_context(|| format!("the {} setting is required", name))
        };

        let parsed = |name: &str, default: u32| -> Result<u32> {
            match var(name) {
                Some(value) => value
                    .parse()
                    .with_context(|| format!("invalid {} setting: {}", name, value)),
                None => Ok(default),
            }
        };

        let domain = var(METAAPI_DOMAIN_ENV).unwrap_or_else(|| DEFAULT_METAAPI_DOMAIN.to_string());
        let region = var(METAAPI_REGION_ENV).unwrap_or_else(|| DEFAULT_METAAPI_REGION.to_string());
        let mut urls = ApiUrls::for_domain(&domain, &region);

        if let Some(url) = var(PROVISIONING_API_URL_ENV) {
            urls.provisioning = url;
        }

        if let Some(url) = var(MARKET_DATA_API_URL_ENV) {
            urls.market_data = url;
        }

        let metaapi = MetaapiSettings {
            auth_token: required(AUTH_TOKEN_ENV)?,
            account_id: required(ACCOUNT_ID_ENV)?,
            urls,
            number_of_request_retries: parsed(
                NUMBER_OF_REQUEST_RETRIES_ENV,
                DEFAULT_NUMBER_OF_REQUEST_RETRIES,
            )?,
            seconds_to_sleep_before_request_retry: parsed(
                SECONDS_TO_SLEEP_BEFORE_REQUEST_RETRY_ENV,
                DEFAULT_SECONDS_TO_SLEEP_BEFORE_REQUEST_RETRY,
            )?,
        };

        let telegram = match (var(TELEGRAM_BOT_TOKEN_ENV), var(TELEGRAM_BOT_CHAT_ID_ENV)) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramSettings { bot_token, chat_id }),
            _ => None,
        };

        let storage = StorageSettings {
            path: PathBuf::from(
                var(MARKET_DATA_PATH_ENV).unwrap_or_else(|| DEFAULT_MARKET_DATA_PATH.to_string()),
            ),
            format: match var(MARKET_DATA_STORAGE_ENV) {
                Some(format) => StorageFormat::from_str(&format)?,
                None => StorageFormat::JsonSnapshot,
            },
        };

        let log_level = match var(LOG_LEVEL_ENV) {
            Some(level) => LevelFilter::from_str(&level).map_err(|_| {
                anyhow::anyhow!("invalid {} setting: {}", LOG_LEVEL_ENV, level)
            })?,
            None => LevelFilter::Info,
        };

        Ok(Self {
            metaapi,
            telegram,
            storage,
            log_level,
            target_logger: var(TARGET_LOGGER_ENV)
                .unwrap_or_else(|| DEFAULT_TARGET_LOGGER.to_string()),
        })
    }
}
