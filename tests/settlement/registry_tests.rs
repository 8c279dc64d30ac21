//! Vulnerability registry end to end.

use super::harness::{proof, TestHarness};
use bounty_settlement::cache::TtlCache;
use bounty_settlement::config::RegistryConfig;
use bounty_settlement::event::create_event_channel;
use bounty_settlement::registry::{
    hash_exploit, ExploitPayload, VulnerabilityRecord, VulnerabilityRegistry,
};
use bounty_settlement::store::{DurableStore, JsonFileStore};
use bounty_settlement::{EngineEvent, Error, SearchFilter};
use std::sync::Arc;
use std::time::Duration;

const EXPLOIT: &str = "call withdraw() from fallback before balances[msg.sender] = 0";

#[tokio::test]
async fn test_check_duplicate_after_registration() {
    let harness = TestHarness::setup().await;
    let hash = hash_exploit(ExploitPayload::new(EXPLOIT));
    assert!(!harness.engine.check_duplicate(&hash).await.unwrap().is_duplicate);

    let id = harness
        .engine
        .add_verified_vulnerability(proof("p1", EXPLOIT, 97))
        .await
        .unwrap();
    assert_eq!(id, "p1");

    let check = harness.engine.check_duplicate(&hash).await.unwrap();
    assert!(check.is_duplicate);
    assert_eq!(check.existing_proof_id.as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_same_exploit_under_second_proof_is_rejected_before_write() {
    let harness = TestHarness::setup().await;
    let mut events = harness.engine.subscribe_events();

    harness
        .engine
        .add_verified_vulnerability(proof("p1", EXPLOIT, 97))
        .await
        .unwrap();
    let err = harness
        .engine
        .add_verified_vulnerability(proof("p2", EXPLOIT, 99))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::DuplicateVulnerability { ref existing_proof_id } if existing_proof_id == "p1"
    ));
    assert_eq!(harness.registry_store.count().await.unwrap(), 1);
    assert!(harness.registry_store.get("p2").await.unwrap().is_none());

    assert!(matches!(
        events.recv().await.unwrap(),
        EngineEvent::VulnerabilityRegistered { ref proof_id, .. } if proof_id == "p1"
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        EngineEvent::DuplicateRejected { ref existing_proof_id, .. } if existing_proof_id == "p1"
    ));
}

#[tokio::test]
async fn test_search_results_never_carry_the_exploit() {
    let harness = TestHarness::setup().await;
    harness
        .engine
        .add_verified_vulnerability(proof("p1", EXPLOIT, 97))
        .await
        .unwrap();
    harness
        .engine
        .add_verified_vulnerability(proof("p2", "price oracle read from spot reserves", 93))
        .await
        .unwrap();

    let result = harness
        .engine
        .search_vulnerabilities(&SearchFilter::default())
        .await
        .unwrap();
    assert_eq!(result.total_count, 2);

    let json = serde_json::to_string(&result).unwrap();
    assert!(!json.contains(EXPLOIT));
    assert!(!json.contains("spot reserves"));
    assert!(json.contains(hash_exploit(ExploitPayload::new(EXPLOIT)).as_str()));
}

#[tokio::test]
async fn test_search_filters() {
    let harness = TestHarness::setup().await;
    let mut rust = proof("p1", "a", 91);
    rust.vulnerability_type = "integer overflow".to_string();
    rust.metadata.language = Some("Rust".to_string());
    rust.metadata.framework = Some("Anchor".to_string());
    rust.auditor_id = "a2".to_string();
    harness.engine.add_verified_vulnerability(rust).await.unwrap();
    harness
        .engine
        .add_verified_vulnerability(proof("p2", "b", 97))
        .await
        .unwrap();
    harness
        .engine
        .add_verified_vulnerability(proof("p3", "c", 100))
        .await
        .unwrap();

    let by_language = harness
        .engine
        .search_vulnerabilities(&SearchFilter {
            language: Some("solidity".to_string()),
            ..SearchFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(by_language.total_count, 2);

    let by_auditor = harness
        .engine
        .search_vulnerabilities(&SearchFilter {
            auditor_id: Some("a2".to_string()),
            framework: Some("Anchor".to_string()),
            ..SearchFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(by_auditor.total_count, 1);
    assert_eq!(by_auditor.records[0].proof_id, "p1");

    let high = harness
        .engine
        .search_vulnerabilities(&SearchFilter {
            min_risk_score: Some(96),
            vulnerability_type: Some("Reentrancy".to_string()),
            ..SearchFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(high.total_count, 2);

    let none = harness
        .engine
        .search_vulnerabilities(&SearchFilter {
            attack_vector: Some("flash loan".to_string()),
            ..SearchFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(none.total_count, 0);
    assert!(!none.has_more);
}

#[tokio::test]
async fn test_statistics() {
    let harness = TestHarness::setup().await;
    for (proof_id, risk) in [("p1", 90), ("p2", 94), ("p3", 97), ("p4", 100)] {
        harness
            .engine
            .add_verified_vulnerability(proof(proof_id, proof_id, risk))
            .await
            .unwrap();
    }

    let stats = harness.engine.get_statistics().await.unwrap();
    assert_eq!(stats.total_vulnerabilities, 4);
    assert_eq!(stats.by_type["reentrancy"], 4);
    assert_eq!(stats.by_language["solidity"], 4);
    for bucket in ["90-92", "93-95", "96-98", "99-100"] {
        assert_eq!(stats.risk_distribution[bucket], 1, "bucket {bucket}");
    }
    assert!((stats.average_risk_score - 95.25).abs() < f64::EPSILON);

    let report = harness.engine.cache_report();
    assert_eq!(report.registry.statistics.misses, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cache_entry_expires_after_ttl() {
    let ttl = Duration::from_secs(30);
    let cache: TtlCache<String, u64> = TtlCache::new(ttl);
    cache.insert("k".to_string(), 7);

    tokio::time::advance(ttl).await;
    assert_eq!(cache.get(&"k".to_string()), Some(7));

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(cache.get(&"k".to_string()), None);
    assert_eq!(cache.stats().expirations, 1);
}

#[tokio::test]
async fn test_duplicates_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vulnerabilities.json");

    {
        let store: JsonFileStore<VulnerabilityRecord> = JsonFileStore::open(&path).await.unwrap();
        let (events, _) = create_event_channel();
        let registry =
            VulnerabilityRegistry::new(&RegistryConfig::default(), Arc::new(store), events);
        registry
            .add_verified_vulnerability(proof("p1", EXPLOIT, 97))
            .await
            .unwrap();
    }

    let persisted = std::fs::read_to_string(&path).unwrap();
    assert!(!persisted.contains(EXPLOIT));

    let store: JsonFileStore<VulnerabilityRecord> = JsonFileStore::open(&path).await.unwrap();
    let (events, _) = create_event_channel();
    let registry = VulnerabilityRegistry::new(&RegistryConfig::default(), Arc::new(store), events);

    let err = registry
        .add_verified_vulnerability(proof("p2", EXPLOIT, 97))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateVulnerability { .. }));
    assert_eq!(registry.cache_stats().duplicates.misses, 1);
}
