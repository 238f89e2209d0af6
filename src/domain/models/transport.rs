use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

use super::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TransportName {
    Http,
    File,
}

impl TransportName {
    pub fn parse(text: &str) -> Option<TransportName> {
        return TransportName::iter().find(|e| return e.to_string() == text);
    }
}

#[async_trait]
pub trait SessionTransport {
    /// Returns the name of the transport.
    fn name(&self) -> TransportName;

    /// Used before tracking starts to verify the backend can be reached with
    /// the current configuration.
    async fn health_check(&self) -> Result<()>;

    /// Fetches the full collection of sessions visible to the caller. Any
    /// error is treated as a transport failure by the poller.
    async fn fetch_sessions(&self) -> Result<Vec<Session>>;
}

pub type TransportBox = Arc<dyn SessionTransport + Send + Sync>;
