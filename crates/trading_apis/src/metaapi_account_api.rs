use std::{thread, time};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use base::requests::api::SyncHttpRequest;
use base::requests::entities::{HttpRequestData, HttpRequestMethod, HttpRequestWithRetriesParams};
use base::requests::http_request_with_retries;

use crate::api::AccountApi;
use crate::metaapi_market_data_api::{ApiData, RetrySettings};

const DEPLOYED_STATE: &str = "DEPLOYED";
const CONNECTED_STATUS: &str = "CONNECTED";

pub const DEFAULT_NUMBER_OF_STATUS_CHECKS: u32 = 60;
pub const DEFAULT_SECONDS_BETWEEN_STATUS_CHECKS: u32 = 5;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MetatraderAccountJson {
    state: String,
    connection_status: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub number_of_status_checks: u32,
    pub seconds_between_status_checks: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            number_of_status_checks: DEFAULT_NUMBER_OF_STATUS_CHECKS,
            seconds_between_status_checks: DEFAULT_SECONDS_BETWEEN_STATUS_CHECKS,
        }
    }
}

/// Deploys the MetaTrader account through the provisioning api and waits
/// until the account is connected to its broker.
pub struct MetaapiAccountApi<R>
where
    R: SyncHttpRequest,
{
    api_data: ApiData,
    retry_settings: RetrySettings,
    connection_settings: ConnectionSettings,
    target_logger: String,
    request_api: R,
}

impl<R> MetaapiAccountApi<R>
where
    R: SyncHttpRequest,
{
    pub fn new(
        api_data: ApiData,
        retry_settings: RetrySettings,
        connection_settings: ConnectionSettings,
        target_logger: String,
        request_api: R,
    ) -> Self {
        Self {
            api_data,
            retry_settings,
            connection_settings,
            target_logger,
            request_api,
        }
    }

    fn account_url(&self) -> String {
        format!(
            "{}/users/current/accounts/{}",
            self.api_data.urls.provisioning, self.api_data.account_id
        )
    }

    fn request(&self, req_data: HttpRequestData, req_entity_name: &str) -> Result<String> {
        let req_data = req_data.with_header("auth-token", &self.api_data.auth_token);

        let req_params = HttpRequestWithRetriesParams {
            req_entity_name,
            target_logger: &self.target_logger,
            number_of_retries: self.retry_settings.number_of_request_retries,
            seconds_to_sleep: self.retry_settings.seconds_to_sleep_before_request_retry,
        };

        http_request_with_retries(req_data, req_params, &self.request_api)
    }

    fn get_account(&self) -> Result<MetatraderAccountJson> {
        let response = self.request(
            HttpRequestData::new(HttpRequestMethod::Get, self.account_url()),
            "the account",
        )?;

        serde_json::from_str(&response).context("error on deserializing the account")
    }

    fn deploy(&self) -> Result<()> {
        self.request(
            HttpRequestData::new(
                HttpRequestMethod::Post,
                format!("{}/deploy", self.account_url()),
            ),
            "the account deployment",
        )?;

        Ok(())
    }
}

impl<R> AccountApi for MetaapiAccountApi<R>
where
    R: SyncHttpRequest,
{
    fn connect(&self) -> Result<()> {
        let account = self.get_account()?;

        if account.state != DEPLOYED_STATE {
            log::info!(target: self.target_logger.as_str(), "deploying account");
            self.deploy()?;
        } else {
            log::info!(target: self.target_logger.as_str(), "account already deployed");
        }

        log::info!(
            target: self.target_logger.as_str(),
            "waiting for api server to connect to broker"
        );

        let mut connection_status = account.connection_status;
        let mut number_of_checks = 0;

        while connection_status != CONNECTED_STATUS {
            if number_of_checks >= self.connection_settings.number_of_status_checks {
                bail!(
                    "the account isn't connected to broker after {} checks, the last status is {}",
                    number_of_checks,
                    connection_status
                );
            }

            thread::sleep(time::Duration::from_secs(
                self.connection_settings.seconds_between_status_checks as u64,
            ));

            connection_status = self.get_account()?.connection_status;
            number_of_checks += 1;
        }

        log::info!(target: self.target_logger.as_str(), "connected");

        Ok(())
    }
}
