use termledger_core::matching::matcher::matches;
use termledger_core::service::attribution::{summarize, unattributed};
use termledger_core::{
    attribute, DeviceRecord, DomainForest, DomainMatcher, DomainNode, DomainProfile, MatchLevel,
};

fn devices(domains: &[&str]) -> Vec<DeviceRecord> {
    domains
        .iter()
        .enumerate()
        .map(|(index, domain)| DeviceRecord::new(format!("dev{index}"), *domain))
        .collect()
}

#[test]
fn root_mode_attributes_only_exact_root_identity() {
    let profile = DomainProfile::new("acme.com");
    let registry = devices(&["ACME.COM", "sub.acme.com", ""]);

    let groups = attribute(&profile, &registry);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].domain, "acme.com");
    assert_eq!(groups[0].label, "Root Domain");
    let ids: Vec<&str> = groups[0].devices.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["dev0"]);
}

#[test]
fn ignore_root_mode_attributes_only_hierarchy_identities() {
    let mut profile = DomainProfile::new("acme.com");
    profile.hierarchy = DomainForest::from_roots(vec![DomainNode::new("sub.acme.com")]);
    profile.set_ignore_root_domain(true, None);
    let registry = devices(&["ACME.COM", "sub.acme.com", ""]);

    let groups = attribute(&profile, &registry);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].level, MatchLevel::SubDomain(1));
    assert_eq!(groups[0].label, "Level 1 Sub-domain");
    assert_eq!(groups[0].devices[0].id, "dev1");
}

#[test]
fn attribution_is_sound_and_complete_against_the_matcher() {
    let mut profile = DomainProfile::new("https://Acme.com/");
    profile.hierarchy = DomainForest::from_roots(vec![
        DomainNode::new("eu.acme.com").with_children(vec![DomainNode::new("fr.eu.acme.com")]),
        DomainNode::new("us.acme.com"),
    ]);
    let registry = devices(&[
        "acme.com",
        "FR.EU.ACME.COM",
        "eu.acme.com/",
        "http://us.acme.com",
        "shop.acme.com",
        "acme.co",
        "   ",
        "eu.acme.com",
    ]);

    let groups = attribute(&profile, &registry);
    let attributed: Vec<&str> = groups
        .iter()
        .flat_map(|group| group.devices.iter().map(|device| device.id.as_str()))
        .collect();

    for device in &registry {
        let expected = matches(
            device.domain(),
            &profile.root_domain,
            profile.ignore_root_domain,
            &profile.hierarchy,
        );
        assert_eq!(
            attributed.contains(&device.id.as_str()),
            expected,
            "device {} with domain {:?}",
            device.id,
            device.domain()
        );
    }
    assert_eq!(attributed.len(), 5);

    let left_over = unattributed(&profile, &registry);
    assert_eq!(left_over.len(), registry.len() - attributed.len());

    let summary = summarize(&groups, registry.len());
    assert_eq!(summary.matched, 5);
    assert_eq!(summary.unmatched, 3);
    assert_eq!(summary.groups, 4);
}

#[test]
fn groups_follow_hierarchy_order_and_level_labels() {
    let mut profile = DomainProfile::new("acme.com");
    profile.hierarchy = DomainForest::from_roots(vec![
        DomainNode::new("eu.acme.com").with_children(vec![DomainNode::new("fr.eu.acme.com")]),
    ]);
    let registry = devices(&["fr.eu.acme.com", "eu.acme.com", "acme.com", "fr.eu.acme.com"]);

    let groups = attribute(&profile, &registry);
    let labels: Vec<&str> = groups.iter().map(|group| group.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["Root Domain", "Level 1 Sub-domain", "Level 2 Sub-domain"]
    );
    assert_eq!(groups[2].len(), 2);

    let matcher = DomainMatcher::from_profile(&profile);
    assert_eq!(matcher.level_of("unknown.example"), MatchLevel::Unknown);
    assert_eq!(matcher.level_of("unknown.example").to_string(), "Unknown");
}
