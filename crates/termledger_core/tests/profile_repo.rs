use std::time::{Duration, Instant};
use termledger_core::db::open_db_in_memory;
use termledger_core::{
    CustomerProfile, DomainForest, DomainNode, DomainProfile, HierarchyError, InstitutionRef,
    InstitutionRegistry, NewAssignment, ProfileAutosaver, ProfileRepoError, ProfileRepository,
    RegistryRecord, RegistrySnapshotRepository, SqliteProfileRepository,
};

fn sample_profile(name: &str) -> CustomerProfile {
    let mut domain = DomainProfile::new("acme.com");
    domain.hierarchy = DomainForest::from_roots(vec![
        DomainNode::new("eu.acme.com").with_children(vec![DomainNode::new("fr.eu.acme.com")]),
    ]);
    domain.set_ignore_root_domain(true, Some("shared root".to_string()));
    let mut profile = CustomerProfile::new(name, domain);
    let id = profile
        .assignments
        .create_category(NewAssignment::new(InstitutionRef::bank("0010").unwrap(), "First Bank"))
        .id();
    profile.assignments.add_devices(id, ["dev1", "dev2"]).unwrap();
    profile.manual_institution_ids.insert("R-BANK-9".to_string());
    profile.revision = 3;
    profile
}

#[test]
fn repository_requires_migrated_connection() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let err = SqliteProfileRepository::try_new(&conn).err().unwrap();
    assert!(matches!(err, ProfileRepoError::UninitializedConnection { .. }));
}

#[test]
fn save_and_load_round_trips_full_snapshot() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::try_new(&conn).unwrap();
    let profile = sample_profile("Acme");

    repo.save_profile(&profile).unwrap();
    let loaded = repo.load_profile(profile.id).unwrap().unwrap();
    assert_eq!(loaded, profile);

    assert!(repo.load_profile(uuid::Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn list_orders_by_display_name_and_delete_removes_row() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::try_new(&conn).unwrap();
    let zed = sample_profile("zed");
    let alpha = sample_profile("Alpha");
    repo.save_profile(&zed).unwrap();
    repo.save_profile(&alpha).unwrap();

    assert_eq!(repo.list_profile_ids().unwrap(), vec![alpha.id, zed.id]);
    assert!(repo.delete_profile(zed.id).unwrap());
    assert!(!repo.delete_profile(zed.id).unwrap());
    assert_eq!(repo.list_profile_ids().unwrap(), vec![alpha.id]);
}

#[test]
fn stale_revision_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::try_new(&conn).unwrap();
    let mut profile = sample_profile("Acme");
    repo.save_profile(&profile).unwrap();

    profile.revision = 2;
    let err = repo.save_profile(&profile).unwrap_err();
    match err {
        ProfileRepoError::StaleRevision {
            stored, attempted, ..
        } => {
            assert_eq!(stored, 3);
            assert_eq!(attempted, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn overlapping_ledger_is_rejected_on_save_and_load() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::try_new(&conn).unwrap();
    let profile = sample_profile("Acme");

    let mut broken = serde_json::to_value(&profile).unwrap();
    let mut duplicate = broken["assignments"][0].clone();
    duplicate["id"] = serde_json::json!(uuid::Uuid::new_v4());
    duplicate["institution"]["id"] = serde_json::json!("0020");
    broken["assignments"]
        .as_array_mut()
        .unwrap()
        .push(duplicate);
    let broken: CustomerProfile = serde_json::from_value(broken).unwrap();

    assert!(matches!(
        repo.save_profile(&broken).unwrap_err(),
        ProfileRepoError::InvalidLedger { .. }
    ));

    conn.execute(
        "INSERT INTO customer_profiles (customer_id, display_name, payload) VALUES (?1, ?2, ?3);",
        rusqlite::params![
            broken.id.to_string(),
            broken.name,
            serde_json::to_string(&broken).unwrap()
        ],
    )
    .unwrap();
    assert!(matches!(
        repo.load_profile(broken.id).unwrap_err(),
        ProfileRepoError::InvalidLedger { .. }
    ));
}

#[test]
fn duplicate_node_ids_are_rejected_on_save_and_load() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::try_new(&conn).unwrap();
    let profile = sample_profile("Acme");

    let mut broken = serde_json::to_value(&profile).unwrap();
    let copy = broken["domain"]["hierarchy"][0]["children"][0].clone();
    broken["domain"]["hierarchy"]
        .as_array_mut()
        .unwrap()
        .push(copy);
    let broken: CustomerProfile = serde_json::from_value(broken).unwrap();

    assert!(matches!(
        repo.save_profile(&broken).unwrap_err(),
        ProfileRepoError::InvalidHierarchy {
            error: HierarchyError::DuplicateNodeId(_),
            ..
        }
    ));

    conn.execute(
        "INSERT INTO customer_profiles (customer_id, display_name, payload) VALUES (?1, ?2, ?3);",
        rusqlite::params![
            broken.id.to_string(),
            broken.name,
            serde_json::to_string(&broken).unwrap()
        ],
    )
    .unwrap();
    assert!(matches!(
        repo.load_profile(broken.id).unwrap_err(),
        ProfileRepoError::InvalidHierarchy { .. }
    ));
}

#[test]
fn registry_snapshot_defaults_to_empty_and_round_trips() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::try_new(&conn).unwrap();
    assert_eq!(repo.load_registry().unwrap(), InstitutionRegistry::default());

    let registry = InstitutionRegistry {
        banks: vec![RegistryRecord::new("R-BANK-1", "First Bank").with_linked_source("0010")],
        ..InstitutionRegistry::default()
    };
    repo.save_registry(&registry).unwrap();
    repo.save_registry(&registry).unwrap();
    assert_eq!(repo.load_registry().unwrap(), registry);
}

#[test]
fn autosaver_persists_only_the_latest_snapshot_after_quiet_period() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::try_new(&conn).unwrap();
    let quiet = Duration::from_millis(100);
    let mut autosaver = ProfileAutosaver::new(repo, quiet);
    let start = Instant::now();

    let mut profile = sample_profile("Acme");
    autosaver.record(&profile, start);
    profile.revision = 4;
    profile.name = "Acme Renamed".to_string();
    autosaver.record(&profile, start + Duration::from_millis(50));

    assert_eq!(autosaver.tick(start + Duration::from_millis(120)).unwrap(), None);
    assert_eq!(
        autosaver.tick(start + Duration::from_millis(200)).unwrap(),
        Some(4)
    );

    let stored = autosaver.repo().load_profile(profile.id).unwrap().unwrap();
    assert_eq!(stored, profile);
    assert!(!autosaver.scheduler().is_pending());
}

#[test]
fn failed_autosave_keeps_snapshot_for_retry() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::try_new(&conn).unwrap();
    let mut autosaver = ProfileAutosaver::new(repo, Duration::from_millis(100));
    let start = Instant::now();
    let profile = sample_profile("Acme");
    autosaver.record(&profile, start);

    conn.execute_batch("ALTER TABLE customer_profiles RENAME TO customer_profiles_offline;")
        .unwrap();
    let err = autosaver.flush(start).unwrap_err();
    assert!(matches!(err, ProfileRepoError::Db(_)));
    assert!(err.is_retryable());
    assert!(autosaver.scheduler().is_pending());
    assert_eq!(
        autosaver.scheduler().deadline(),
        Some(start + Duration::from_millis(100))
    );

    conn.execute_batch("ALTER TABLE customer_profiles_offline RENAME TO customer_profiles;")
        .unwrap();
    let later = start + Duration::from_millis(100);
    assert_eq!(autosaver.tick(later).unwrap(), Some(profile.revision));
    assert!(!autosaver.scheduler().is_pending());

    let stored = autosaver.repo().load_profile(profile.id).unwrap().unwrap();
    assert_eq!(stored, profile);
}

#[test]
fn rejected_autosave_is_dropped_instead_of_retried() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::try_new(&conn).unwrap();
    let mut newer = sample_profile("Acme");
    newer.revision = 10;
    repo.save_profile(&newer).unwrap();

    let mut autosaver = ProfileAutosaver::new(repo, Duration::from_millis(100));
    let start = Instant::now();
    let mut stale = newer.clone();
    stale.revision = 5;
    autosaver.record(&stale, start);

    let err = autosaver.flush(start).unwrap_err();
    assert!(matches!(err, ProfileRepoError::StaleRevision { .. }));
    assert!(!err.is_retryable());
    assert!(!autosaver.scheduler().is_pending());
    assert!(!autosaver.scheduler().is_in_flight());
    assert_eq!(autosaver.tick(start + Duration::from_secs(60)).unwrap(), None);
    assert_eq!(autosaver.flush(start).unwrap(), None);

    stale.revision = 11;
    autosaver.record(&stale, start);
    assert_eq!(autosaver.flush(start).unwrap(), Some(11));
}
