//! Host lifecycle phases.
//!
//! The host advances through its startup phases once; components that
//! should only run after the workbench restored its state wait on
//! [`Lifecycle::when`].

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::initialization::UserDataInitializationService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecyclePhase {
    Starting,
    Ready,
    Restored,
    Eventually,
}

#[derive(Debug)]
pub struct Lifecycle {
    phase: watch::Sender<LifecyclePhase>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(LifecyclePhase::Starting);
        Self { phase }
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    /// Advance to `phase`. Phases never move backwards.
    pub fn set_phase(&self, phase: LifecyclePhase) {
        self.phase.send_if_modified(|current| {
            if phase > *current {
                debug!("Lifecycle phase {:?} -> {:?}", current, phase);
                *current = phase;
                true
            } else {
                false
            }
        });
    }

    /// Resolves once the host reached `phase`.
    pub async fn when(&self, phase: LifecyclePhase) {
        let mut receiver = self.phase.subscribe();
        let _ = receiver.wait_for(|current| *current >= phase).await;
    }

    fn receiver(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// In web sessions, seed the other resources once the host is restored.
///
/// Returns `None` for local installs, where nothing is scheduled.
pub fn spawn_other_resources_contribution(
    service: Arc<UserDataInitializationService>,
    lifecycle: &Lifecycle,
) -> Option<JoinHandle<()>> {
    if !service.environment().is_web {
        return None;
    }

    let mut phase = lifecycle.receiver();
    Some(tokio::spawn(async move {
        if phase
            .wait_for(|current| *current >= LifecyclePhase::Restored)
            .await
            .is_err()
        {
            debug!("Lifecycle ended before the restored phase");
            return;
        }
        service.initialize_other_resources().await;
    }))
}
