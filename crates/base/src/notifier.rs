use crate::requests::api::SyncHttpRequest;
use crate::requests::entities::{HttpRequestData, HttpRequestMethod};
use anyhow::{Context, Result};
use serde_json::json;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

pub trait Notifier {
    fn send_message(&self, message: &str) -> Result<()>;
}

pub struct TelegramNotifier<R: SyncHttpRequest> {
    token: String,
    chat_id: String,
    request_api: R,
}

impl<R: SyncHttpRequest> TelegramNotifier<R> {
    pub fn new(token: String, chat_id: String, request_api: R) -> TelegramNotifier<R> {
        TelegramNotifier {
            token,
            chat_id,
            request_api,
        }
    }
}

impl<R: SyncHttpRequest> Notifier for TelegramNotifier<R> {
    fn send_message(&self, message: &str) -> Result<()> {
        let req = HttpRequestData::new(
            HttpRequestMethod::Post,
            format!(
                "{api}/bot{token}/sendMessage",
                api = TELEGRAM_API_URL,
                token = &self.token
            ),
        )
        .with_json_body(json!({
            "text": message,
            "chat_id": self.chat_id
        }));

        self.request_api
            .call(req)
            .context("error on sending a telegram message")?;
        Ok(())
    }
}

/// Used when no messaging channel is configured: the message only goes to the log.
pub struct LogNotifier {
    target_logger: String,
}

impl LogNotifier {
    pub fn new(target_logger: String) -> Self {
        Self { target_logger }
    }
}

impl Notifier for LogNotifier {
    fn send_message(&self, message: &str) -> Result<()> {
        log::info!(target: self.target_logger.as_str(), "notification: {}", message);
        Ok(())
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn send_message(&self, message: &str) -> Result<()> {
        (**self).send_message(message)
    }
}
