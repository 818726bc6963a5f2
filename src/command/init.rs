use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use super::setup::Host;
use crate::cli::SessionArgs;
use userdata_init::domain::ResourceKind;
use userdata_init::initialization::ManifestExtensionInstaller;
use userdata_init::lifecycle::{spawn_other_resources_contribution, Lifecycle, LifecyclePhase};

/// Run the host startup sequence against the initialization service.
pub async fn run_init(args: SessionArgs, skip_extensions: bool) -> Result<()> {
    let host = Host::from_args(&args)?;
    let service = host.service.clone();
    let lifecycle = Lifecycle::new();

    lifecycle.set_phase(LifecyclePhase::Ready);
    service.initialize_required_resources().await;

    let contribution = spawn_other_resources_contribution(service.clone(), &lifecycle);
    lifecycle.set_phase(LifecyclePhase::Restored);

    if skip_extensions {
        info!("Skipping extensions");
    } else {
        let manifest = service.environment().paths.extensions_manifest.clone();
        service
            .initialize_extensions(Arc::new(ManifestExtensionInstaller::new(manifest)))
            .await;
    }

    if let Some(handle) = contribution {
        if let Err(e) = handle.await {
            warn!("Other resources initialization task failed: {}", e);
        }
    }
    service.when_initialization_finished().await;
    lifecycle.set_phase(LifecyclePhase::Eventually);

    let attempted: Vec<&str> = ResourceKind::ALL
        .iter()
        .filter(|kind| service.is_initialized(**kind))
        .map(|kind| kind.as_str())
        .collect();

    if service.connection().await.is_some() {
        println!("✅ Seeded from the remote store: {}", attempted.join(", "));
    } else {
        println!("Remote initialization did not run for this session.");
    }

    host.storage.record_session()?;
    Ok(())
}
