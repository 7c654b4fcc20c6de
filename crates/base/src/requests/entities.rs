use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HttpRequestMethod {
    Get,
    Post,
}

impl Default for HttpRequestMethod {
    fn default() -> Self {
        Self::Get
    }
}

pub type Headers = HashMap<String, String>;
pub type Queries = HashMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequestData {
    pub method: HttpRequestMethod,
    pub url: String,
    pub headers: Option<Headers>,
    pub queries: Option<Queries>,
    pub body: Option<Value>,
}

impl HttpRequestData {
    pub fn new(method: HttpRequestMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .get_or_insert_with(Default::default)
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_query(mut self, param: &str, value: &str) -> Self {
        self.queries
            .get_or_insert_with(Default::default)
            .insert(param.to_string(), value.to_string());
        self
    }

    pub fn with_json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

pub type NumberOfRetries = u32;
pub type SecondsToSleep = u32;

#[derive(Default)]
pub struct HttpRequestWithRetriesParams<'a> {
    pub req_entity_name: &'a str,
    pub target_logger: &'a str,
    pub number_of_retries: NumberOfRetries,
    pub seconds_to_sleep: SecondsToSleep,
}
