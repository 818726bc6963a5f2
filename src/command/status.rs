use anyhow::Result;

use super::setup::Host;
use crate::cli::SessionArgs;

pub async fn run_status(args: SessionArgs) -> Result<()> {
    let host = Host::from_args(&args)?;
    let service = &host.service;

    match service.check_preconditions() {
        Ok(url) => {
            println!("Sync store: {}", url);
            if service.requires_initialization().await {
                println!("✅ This session would be initialized from the remote store.");
            } else {
                println!("❌ No authenticated connection to the sync store.");
                println!("   Check the credentials provider in the launch options.");
            }
        }
        Err(reason) => {
            println!("❌ Remote initialization is skipped: {}", reason);
        }
    }

    Ok(())
}
