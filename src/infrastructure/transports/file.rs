#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use tokio::fs;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Session;
use crate::domain::models::SessionTransport;
use crate::domain::models::TransportName;

/// Reads sessions from a JSON file on disk. The file is read again on every
/// fetch so another process can rewrite it while a session is tracked.
pub struct FileTransport {
    path: path::PathBuf,
}

impl FileTransport {
    pub fn new(path: path::PathBuf) -> FileTransport {
        return FileTransport { path };
    }

    pub fn from_config() -> Result<FileTransport> {
        let sessions_file = Config::get(ConfigKey::SessionsFile);
        if sessions_file.is_empty() {
            bail!("The file transport requires a sessions file, set one with --sessions-file");
        }

        return Ok(FileTransport::new(path::PathBuf::from(sessions_file)));
    }
}

#[async_trait]
impl SessionTransport for FileTransport {
    fn name(&self) -> TransportName {
        return TransportName::File;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            tracing::error!(path = ?self.path, "Sessions file does not exist");
            bail!(format!(
                "Sessions file {} does not exist",
                self.path.to_string_lossy()
            ));
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn fetch_sessions(&self) -> Result<Vec<Session>> {
        let json_str = fs::read_to_string(&self.path)
            .await
            .with_context(|| return format!("Failed to read {}", self.path.to_string_lossy()))?;

        let sessions = serde_json::from_str::<Vec<Session>>(&json_str).with_context(|| {
            return format!(
                "{} is not a valid list of sessions",
                self.path.to_string_lossy()
            );
        })?;

        return Ok(sessions);
    }
}
