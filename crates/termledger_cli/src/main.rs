//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `termledger_core` linkage.
//! - Optionally summarize the profile snapshots stored in a database file.
//! - Keep output deterministic for quick local sanity checks.

use log::info;
use std::error::Error;
use termledger_core::db::open_db;
use termledger_core::{
    init_from_config, CoreConfig, ProfileRepository, RegistrySnapshotRepository,
    SqliteProfileRepository,
};

fn main() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env()?;
    init_from_config(&config)?;

    println!("termledger_core ping={}", termledger_core::ping());
    println!("termledger_core version={}", termledger_core::core_version());

    // Usage: termledger_cli [db_path]
    let Some(db_path) = std::env::args().nth(1) else {
        return Ok(());
    };

    let conn = open_db(&db_path)?;
    let repo = SqliteProfileRepository::try_new(&conn)?;
    let registry = repo.load_registry()?;
    let ids = repo.list_profile_ids()?;
    info!(
        "event=cli_summary module=cli status=start profiles={}",
        ids.len()
    );

    println!(
        "registry banks={} epk={} ok={}",
        registry.banks.len(),
        registry.epk.len(),
        registry.ok.len()
    );
    for id in ids {
        let Some(profile) = repo.load_profile(id)? else {
            continue;
        };
        let assigned = profile.assignments.assigned_device_ids().len();
        println!(
            "profile id={} name={:?} root={:?} nodes={} assignments={} assigned_devices={} linked={} revision={}",
            profile.id,
            profile.name,
            profile.domain.root_domain,
            profile.domain.hierarchy.len(),
            profile.assignments.len(),
            assigned,
            profile.linked_institution_ids.len(),
            profile.revision
        );
    }
    Ok(())
}
