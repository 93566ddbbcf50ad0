pub mod http_client;
#[cfg(test)]
pub(crate) mod mock;

pub use http_client::{HttpClient, ReqwestHttpClient};
