use anyhow::bail;
use anyhow::Result;

use crate::application::ui;
use crate::application::ui::OutputFormat;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Lifecycle;
use crate::domain::models::Snapshot;
use crate::domain::services::LifecycleController;
use crate::domain::services::LifecycleOptions;
use crate::infrastructure::transports::TransportManager;

/// Tracks the configured session until it settles or Ctrl-C is pressed.
pub async fn start() -> Result<Snapshot> {
    let session_id = Config::get(ConfigKey::SessionId);
    if session_id.is_empty() {
        bail!("No session to watch, pass one with `sessionwatch watch --id <ID>`");
    }

    let transport = TransportManager::get(Config::transport()?)?;
    transport.health_check().await?;

    let session = match transport
        .fetch_sessions()
        .await?
        .into_iter()
        .find(|session| return session.id == session_id)
    {
        Some(session) => session,
        None => bail!(format!("Session {session_id} does not exist")),
    };

    let format = OutputFormat::from_config()?;
    let controller = LifecycleController::new(transport, LifecycleOptions::from_config()?)?;
    let printer = tokio::spawn(ui::start(
        controller.subscribe(),
        format,
        true,
    ));

    controller.attach(&session)?;

    tokio::select! {
        snapshot = controller.wait_for_terminal() => {
            tracing::info!(session_id, lifecycle = %snapshot.lifecycle, "Watch finished");
        }
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!(session_id, "Interrupted, detaching");
            controller.detach();
        }
    }

    let snapshot = printer.await??;
    if snapshot.lifecycle == Lifecycle::Disconnected {
        tracing::warn!(error = ?snapshot.error, "Lost connection while watching");
    }

    return Ok(snapshot);
}
