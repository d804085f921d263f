mod audio;
mod credentials;
mod endpoint;
mod orchestrator;
mod session;
mod telemetry;

use std::sync::Arc;

use anyhow::Result;
use audio::device::CpalAudioSystem;
use credentials::CredentialRotator;
use endpoint::gemini::GeminiLiveEndpoint;
use orchestrator::SessionConfig;
use session::SessionManager;
use telemetry::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let rotator = CredentialRotator::from_env()?;
    let manager = SessionManager::new(
        Arc::new(GeminiLiveEndpoint::default()),
        Arc::new(CpalAudioSystem::default()),
        rotator,
    );

    manager.start(SessionConfig::default()).await?;
    info!(target: "voicelink", "session started, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    manager.stop().await;
    Ok(())
}
