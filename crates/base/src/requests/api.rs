use crate::requests::entities::HttpRequestData;
use anyhow::Result;

pub trait SyncHttpRequest {
    /// Sends the request and returns the body of a successful response.
    fn call(&self, req: HttpRequestData) -> Result<String>;
}
