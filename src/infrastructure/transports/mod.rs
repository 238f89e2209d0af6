pub mod file;
pub mod http;
#[cfg(test)]
pub mod scripted;

use std::sync::Arc;

use anyhow::Result;

use crate::domain::models::TransportBox;
use crate::domain::models::TransportName;

pub struct TransportManager {}

impl TransportManager {
    pub fn get(name: TransportName) -> Result<TransportBox> {
        let transport: TransportBox = match name {
            TransportName::Http => Arc::new(http::HttpTransport::from_config()?),
            TransportName::File => Arc::new(file::FileTransport::from_config()?),
        };

        return Ok(transport);
    }
}
