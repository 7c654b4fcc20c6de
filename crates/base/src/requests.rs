use crate::requests::api::SyncHttpRequest;
use crate::requests::entities::{HttpRequestData, HttpRequestWithRetriesParams};
use anyhow::{bail, Result};
use std::{thread, time};

pub mod api;
pub mod entities;
pub mod ureq;

/// Calls the request until it succeeds or the number of retries is exhausted,
/// sleeping between tries. Every failed try is logged as an error.
pub fn http_request_with_retries(
    req_data: HttpRequestData,
    req_params: HttpRequestWithRetriesParams,
    request_api: &impl SyncHttpRequest,
) -> Result<String> {
    let mut current_request_try = 1;

    loop {
        let response = request_api.call(req_data.clone());

        match response {
            Ok(item) => {
                return Ok(item);
            }
            Err(e) => {
                log::error!(
                    target: req_params.target_logger,
                    "an error occurred on a {} try to request {}: {:?}",
                    current_request_try, req_params.req_entity_name, e
                );

                if current_request_try <= req_params.number_of_retries {
                    thread::sleep(time::Duration::from_secs(
                        req_params.seconds_to_sleep as u64,
                    ));

                    current_request_try += 1;
                    continue;
                } else {
                    bail!(e.context(format!(
                        "an error occurred after {} retries on requesting {}",
                        req_params.number_of_retries, req_params.req_entity_name
                    )))
                }
            }
        }
    }
}
