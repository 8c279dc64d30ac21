//! Payout orchestration end to end.

use super::harness::{proof, test_config, verified, TestHarness, SIGNING_KEY};
use bounty_settlement::payout::{HmacTransferSigner, VerificationOutcome};
use bounty_settlement::store::DurableStore;
use bounty_settlement::{calculate_bounty, EngineEvent, PayoutFailure, SearchFilter};
use futures::future::join_all;

#[test]
fn test_bounty_tiers() {
    for (score, amount) in [(90, 100), (95, 100), (96, 250), (99, 250), (100, 500)] {
        assert_eq!(calculate_bounty(score), amount, "risk score {score}");
    }
    for score in [0, 1, 50, 89] {
        assert_eq!(calculate_bounty(score), 0, "risk score {score}");
    }
}

#[tokio::test]
async fn test_p1_scenario_pays_once() {
    let harness = TestHarness::setup().await;
    let request = verified("p1", "a1", 97);

    let first = harness.engine.trigger_bounty_payout(&request).await.unwrap();
    assert!(first.success);
    assert_eq!(first.bounty_amount, 250);
    assert_eq!(first.recipient, "a1");
    assert!(first.error.is_none());
    let tx = first.transaction_id.clone().expect("transaction id");

    let second = harness.engine.trigger_bounty_payout(&request).await.unwrap();
    assert!(!second.success);
    assert_eq!(second.error.as_deref(), Some("already paid"));
    assert_eq!(second.failure, Some(PayoutFailure::AlreadyPaid));
    assert_eq!(second.transaction_id.as_deref(), Some(tx.as_str()));

    assert_eq!(harness.ledger_store.count().await.unwrap(), 1);
    assert_eq!(harness.treasury.submissions().len(), 1);
}

#[tokio::test]
async fn test_concurrent_settlements_commit_one_record() {
    let harness = TestHarness::setup().await;
    let request = verified("p1", "a1", 100);

    let (a, b) = tokio::join!(
        harness.engine.trigger_bounty_payout(&request),
        harness.engine.trigger_bounty_payout(&request)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(u8::from(a.success) + u8::from(b.success), 1);
    let (winner, loser) = if a.success { (a, b) } else { (b, a) };
    assert_eq!(loser.failure, Some(PayoutFailure::AlreadyPaid));
    assert_eq!(loser.transaction_id, winner.transaction_id);

    assert_eq!(harness.ledger_store.count().await.unwrap(), 1);
    let history = harness.engine.get_payout_history("a1").await.unwrap();
    assert_eq!(history.total_payouts, 1);
    assert_eq!(history.total_earnings, 500);
}

#[tokio::test]
async fn test_eleventh_settlement_within_an_hour_is_rate_limited() {
    let harness = TestHarness::setup().await;

    for i in 1..=10 {
        let result = harness
            .engine
            .trigger_bounty_payout(&verified(&format!("p{i}"), "a1", 96))
            .await
            .unwrap();
        assert!(result.success, "attempt {i}: {:?}", result.error);
    }

    let eleventh = harness
        .engine
        .trigger_bounty_payout(&verified("p11", "a1", 96))
        .await
        .unwrap();
    assert!(!eleventh.success);
    assert_eq!(
        eleventh.failure,
        Some(PayoutFailure::RateLimitExceeded { limit: 10 })
    );

    // Other auditors are unaffected
    let other = harness
        .engine
        .trigger_bounty_payout(&verified("p12", "a2", 96))
        .await
        .unwrap();
    assert!(other.success);
    assert_eq!(harness.ledger_store.count().await.unwrap(), 11);
}

#[tokio::test]
async fn test_concurrent_settlements_for_one_auditor_respect_the_limit() {
    let harness = TestHarness::setup().await;
    let requests: Vec<_> = (0..15)
        .map(|i| verified(&format!("c{i}"), "a1", 96))
        .collect();

    let results = join_all(
        requests
            .iter()
            .map(|request| harness.engine.trigger_bounty_payout(request)),
    )
    .await;

    let mut paid = 0;
    for result in results {
        let result = result.unwrap();
        if result.success {
            paid += 1;
        } else {
            assert_eq!(
                result.failure,
                Some(PayoutFailure::RateLimitExceeded { limit: 10 })
            );
        }
    }
    assert_eq!(paid, 10);
    assert_eq!(harness.ledger_store.count().await.unwrap(), 10);
    assert_eq!(harness.treasury.submissions().len(), 10);
    assert_eq!(
        harness.engine.payouts().rate_limiter().current_count("a1"),
        10
    );
}

#[tokio::test]
async fn test_daily_cap_reduces_the_last_bounty_then_refuses() {
    let mut config = test_config();
    config.payout.daily_bounty_cap = 700;
    let harness = TestHarness::setup_with(config, 1_000_000).await;

    let first = harness
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 100))
        .await
        .unwrap();
    assert_eq!(first.bounty_amount, 500);

    let reduced = harness
        .engine
        .trigger_bounty_payout(&verified("p2", "a2", 97))
        .await
        .unwrap();
    assert!(reduced.success);
    assert_eq!(reduced.bounty_amount, 200);
    assert_eq!(harness.treasury.submissions()[1].request.amount, 200);

    let refused = harness
        .engine
        .trigger_bounty_payout(&verified("p3", "a3", 90))
        .await
        .unwrap();
    assert!(!refused.success);
    assert_eq!(
        refused.failure,
        Some(PayoutFailure::DailyCapReached { cap: 700 })
    );
    assert!(harness.engine.validate_payout("p3").await.unwrap().can_proceed);
    assert_eq!(harness.ledger_store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_settlements_share_the_daily_cap() {
    let mut config = test_config();
    config.payout.daily_bounty_cap = 1_000;
    let harness = TestHarness::setup_with(config, 1_000_000).await;
    let requests: Vec<_> = (0..6)
        .map(|i| verified(&format!("d{i}"), &format!("a{i}"), 100))
        .collect();

    let results = join_all(
        requests
            .iter()
            .map(|request| harness.engine.trigger_bounty_payout(request)),
    )
    .await;

    let paid: u64 = results
        .into_iter()
        .map(Result::unwrap)
        .filter(|r| r.success)
        .map(|r| r.bounty_amount)
        .sum();
    assert_eq!(paid, 1_000);
    assert_eq!(harness.engine.payouts().daily_cap().remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_window_slides() {
    let harness = TestHarness::setup().await;
    for i in 0..10 {
        let result = harness
            .engine
            .trigger_bounty_payout(&verified(&format!("p{i}"), "a1", 90))
            .await
            .unwrap();
        assert!(result.success);
    }

    tokio::time::advance(std::time::Duration::from_secs(3601)).await;

    let later = harness
        .engine
        .trigger_bounty_payout(&verified("p10", "a1", 90))
        .await
        .unwrap();
    assert!(later.success);
}

#[tokio::test]
async fn test_rejections_do_not_consume_rate_budget() {
    let harness = TestHarness::setup().await;

    for i in 0..12 {
        let result = harness
            .engine
            .trigger_bounty_payout(&verified(&format!("low{i}"), "a1", 80))
            .await
            .unwrap();
        assert_eq!(
            result.failure,
            Some(PayoutFailure::NotEligible { risk_score: 80 })
        );
    }

    let paid = harness
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 99))
        .await
        .unwrap();
    assert!(paid.success);
    assert_eq!(harness.ledger_store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_proof_is_rejected_without_side_effects() {
    let harness = TestHarness::setup().await;
    harness.verifier.script(
        "p1",
        VerificationOutcome {
            is_valid: false,
            is_high_severity: true,
        },
    );

    let result = harness
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 100))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(matches!(
        result.failure,
        Some(PayoutFailure::VerificationFailed { ref reason }) if reason == "proof is not valid"
    ));
    assert!(harness.treasury.submissions().is_empty());
    assert_eq!(harness.ledger_store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_verifier_outage_is_a_verification_failure() {
    let harness = TestHarness::setup().await;
    harness.verifier.set_unavailable(true);

    let result = harness
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 100))
        .await
        .unwrap();
    assert!(matches!(
        result.failure,
        Some(PayoutFailure::VerificationFailed { ref reason }) if reason.contains("verifier offline")
    ));
    assert!(harness.treasury.submissions().is_empty());
}

#[tokio::test]
async fn test_insufficient_balance_is_terminal() {
    let harness = TestHarness::setup_with(test_config(), 200).await;

    let result = harness
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 97))
        .await
        .unwrap();
    assert_eq!(
        result.failure,
        Some(PayoutFailure::InsufficientBalance {
            balance: 200,
            required: 250
        })
    );
    assert!(harness.treasury.submissions().is_empty());
    assert!(harness.engine.validate_payout("p1").await.unwrap().can_proceed);

    // A smaller bounty still fits
    let cheaper = harness
        .engine
        .trigger_bounty_payout(&verified("p2", "a1", 90))
        .await
        .unwrap();
    assert!(cheaper.success);
}

#[tokio::test]
async fn test_balance_query_failure_follows_flag() {
    let open = TestHarness::setup().await;
    open.treasury.set_balance(None);
    let result = open
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 97))
        .await
        .unwrap();
    assert!(result.success);

    let mut config = test_config();
    config.payout.fail_open_on_balance_error = false;
    let closed = TestHarness::setup_with(config, 1_000_000).await;
    closed.treasury.set_balance(None);
    let result = closed
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 97))
        .await
        .unwrap();
    assert!(matches!(
        result.failure,
        Some(PayoutFailure::BalanceUnavailable { .. })
    ));
    assert!(closed.treasury.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_submission_retries_are_fresh_and_bounded() {
    let harness = TestHarness::setup().await;
    harness.treasury.fail_next(2);

    let result = harness
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 97))
        .await
        .unwrap();
    assert!(result.success);

    let submissions = harness.treasury.submissions();
    assert_eq!(submissions.len(), 3);
    assert_ne!(submissions[0].request.nonce, submissions[1].request.nonce);
    let signer = HmacTransferSigner::new(SIGNING_KEY.to_vec());
    assert!(submissions.iter().all(|s| signer.verify(s)));
}

#[tokio::test(start_paused = true)]
async fn test_sustained_submission_failure_gives_up_after_three_attempts() {
    let harness = TestHarness::setup().await;
    harness.treasury.fail_next(100);

    let result = harness
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 97))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(matches!(
        result.failure,
        Some(PayoutFailure::SubmissionFailed { ref reason }) if reason.contains("503")
    ));
    assert_eq!(harness.treasury.submissions().len(), 3);
    assert_eq!(harness.ledger_store.count().await.unwrap(), 0);

    // The failed attempt did not use up the auditor's budget or the day's
    assert_eq!(
        harness.engine.payouts().rate_limiter().current_count("a1"),
        0
    );
    assert_eq!(harness.engine.payouts().daily_cap().remaining(), 10_000);
}

#[tokio::test]
async fn test_single_bounty_cap() {
    let mut config = test_config();
    config.payout.max_single_bounty = 300;
    let harness = TestHarness::setup_with(config, 1_000_000).await;

    let result = harness
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 100))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.bounty_amount, 300);
    assert_eq!(harness.treasury.submissions()[0].request.amount, 300);
}

#[tokio::test]
async fn test_history_and_validation() {
    let harness = TestHarness::setup().await;
    for (proof_id, risk) in [("p1", 90), ("p2", 97), ("p3", 100)] {
        harness
            .engine
            .trigger_bounty_payout(&verified(proof_id, "a1", risk))
            .await
            .unwrap();
    }

    let history = harness.engine.get_payout_history("a1").await.unwrap();
    assert_eq!(history.total_payouts, 3);
    assert_eq!(history.total_earnings, 850);
    assert!(history
        .payouts
        .windows(2)
        .all(|w| w[0].committed_at >= w[1].committed_at));

    let validation = harness.engine.validate_payout("p2").await.unwrap();
    assert!(validation.already_paid);
    assert!(!validation.can_proceed);
    assert_eq!(validation.payout_record.unwrap().bounty_amount, 250);

    assert_eq!(
        harness.engine.get_payout_history("a9").await.unwrap().total_payouts,
        0
    );
}

#[tokio::test]
async fn test_payout_marks_registered_vulnerability_paid() {
    let harness = TestHarness::setup().await;
    harness
        .engine
        .add_verified_vulnerability(proof("p1", "withdraw reenters before balance update", 97))
        .await
        .unwrap();

    harness
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 97))
        .await
        .unwrap();

    let paid = harness
        .engine
        .search_vulnerabilities(&SearchFilter {
            bounty_paid: Some(true),
            ..SearchFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(paid.total_count, 1);
    assert_eq!(paid.records[0].proof_id, "p1");
    assert_eq!(
        harness.engine.get_statistics().await.unwrap().total_bounties_paid,
        1
    );
}

#[tokio::test]
async fn test_events() {
    let harness = TestHarness::setup().await;
    let mut events = harness.engine.subscribe_events();

    harness
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 97))
        .await
        .unwrap();
    harness
        .engine
        .trigger_bounty_payout(&verified("p1", "a1", 97))
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        EngineEvent::PayoutCommitted {
            proof_id, amount, ..
        } => {
            assert_eq!(proof_id, "p1");
            assert_eq!(amount, 250);
        }
        other => unreachable!("unexpected event {other:?}"),
    }
    assert!(matches!(
        events.recv().await.unwrap(),
        EngineEvent::PayoutRejected { ref proof_id, .. } if proof_id == "p1"
    ));
}
