mod common;

use appraisal_economics::Amount;
use appraisal_session::{
    Commitment, EngineConfig, EngineError, InstanceId, SessionProgression, VoterStatus,
};
use common::*;

#[tokio::test]
async fn test_open_session_validation() {
    let h = Harness::new();
    let opener = addr("opener");

    for window in [0, -5, 86_401] {
        let result = h
            .engine
            .open_session(opener, units(1), asset(), ITEM, units(100), window)
            .await;
        assert!(matches!(result, Err(EngineError::InvalidParameter(_))));
    }

    // attached value must cover the listing cost
    let result = h
        .engine
        .open_session(opener, Amount::from_base_units(49_999_999), asset(), ITEM, units(100), WINDOW)
        .await;
    assert!(matches!(result, Err(EngineError::InsufficientBalance { .. })));
    assert_eq!(h.engine.current_attempt(asset(), ITEM).await, None);
    assert_eq!(h.engine.custody().await, Amount::ZERO);

    // exactly the listing cost opens with an empty bounty
    let key = h
        .engine
        .open_session(opener, LISTING_COST, asset(), ITEM, units(100), 86_400)
        .await
        .unwrap();
    let session = h.engine.session_by_key(&key).await.unwrap();
    assert_eq!(session.core.bounty, Amount::ZERO);
    assert_eq!(session.core.lowest_stake, Amount::MAX);
}

#[tokio::test]
async fn test_live_session_blocks_reopening() {
    let h = Harness::new();
    h.open(addr("opener"), units(1)).await;

    let result = h
        .engine
        .open_session(addr("other"), units(1), asset(), ITEM, units(100), WINDOW)
        .await;
    assert!(matches!(result, Err(EngineError::PhaseViolation(_))));

    // exactly three windows past the deadline is still live
    h.clock.set(DEADLINE + 3 * WINDOW);
    let result = h
        .engine
        .open_session(addr("other"), units(1), asset(), ITEM, units(100), WINDOW)
        .await;
    assert!(matches!(result, Err(EngineError::PhaseViolation(_))));

    // other instances are independent
    let other = h
        .engine
        .open_session(addr("other"), units(1), asset(), InstanceId(8), units(100), WINDOW)
        .await
        .unwrap();
    assert_eq!(other.attempt, 0);
}

#[tokio::test]
async fn test_commit_rules() {
    let h = Harness::new();
    let voter = addr("alice");
    h.open(addr("opener"), units(1)).await;
    let commitment = Commitment::compute(units(500), &voter, b"s");

    // below minimum stake
    h.engine.deposit(voter, units(10)).await.unwrap();
    let result = h
        .engine
        .commit(voter, asset(), ITEM, Amount::from_base_units(4_999_999), commitment)
        .await;
    assert!(matches!(result, Err(EngineError::InvalidParameter(_))));

    // more than the available principal
    let result = h
        .engine
        .commit(voter, asset(), ITEM, units(11), commitment)
        .await;
    assert!(matches!(result, Err(EngineError::InsufficientBalance { .. })));
    assert_eq!(h.engine.principal_of(&voter).await, units(10));

    h.engine
        .commit(voter, asset(), ITEM, units(2), commitment)
        .await
        .unwrap();
    assert_eq!(h.engine.principal_of(&voter).await, units(8));

    // one commit per voter per session
    let result = h
        .engine
        .commit(voter, asset(), ITEM, units(2), commitment)
        .await;
    assert!(matches!(result, Err(EngineError::PhaseViolation(_))));

    // no session for this instance
    let result = h
        .engine
        .commit(voter, asset(), InstanceId(99), units(1), commitment)
        .await;
    assert!(matches!(result, Err(EngineError::SessionNotFound(_))));

    h.clock.set(DEADLINE);
    h.engine.deposit(addr("late"), units(1)).await.unwrap();
    let result = h
        .engine
        .commit(addr("late"), asset(), ITEM, units(1), commitment)
        .await;
    assert!(matches!(result, Err(EngineError::DeadlineViolation(_))));
}

#[tokio::test]
async fn test_update_commit_replaces_sealed_appraisal() {
    let h = Harness::new();
    let voter = addr("alice");
    h.open(addr("opener"), units(1)).await;
    h.commit(voter, units(1), units(700)).await;

    let updated = Commitment::compute(units(800), &voter, &secret_for(&voter));
    h.engine
        .update_commit(voter, asset(), ITEM, updated)
        .await
        .unwrap();

    let result = h
        .engine
        .update_commit(addr("stranger"), asset(), ITEM, updated)
        .await;
    assert!(matches!(result, Err(EngineError::PhaseViolation(_))));

    h.clock.set(DEADLINE);
    let result = h.engine.update_commit(voter, asset(), ITEM, updated).await;
    assert!(matches!(result, Err(EngineError::DeadlineViolation(_))));

    // the original appraisal no longer opens the commitment
    assert!(matches!(
        h.reveal(voter, units(700)).await,
        Err(EngineError::ConcealmentMismatch)
    ));
    assert!(h.reveal(voter, units(800)).await.is_ok());
}

#[tokio::test]
async fn test_reveal_rules() {
    let h = Harness::new();
    let (alice, bob) = (addr("alice"), addr("bob"));
    h.open(addr("opener"), units(1)).await;
    h.commit(alice, units(1), units(1_000)).await;
    h.commit(bob, units(1), units(1_500)).await;

    // before the deadline
    assert!(matches!(
        h.reveal(alice, units(1_000)).await,
        Err(EngineError::DeadlineViolation(_))
    ));

    h.clock.set(DEADLINE);
    // wrong secret
    let result = h
        .engine
        .reveal(alice, asset(), ITEM, units(1_000), b"wrong")
        .await;
    assert!(matches!(result, Err(EngineError::ConcealmentMismatch)));
    assert_eq!(
        h.engine.voter_status(asset(), ITEM, &alice).await,
        VoterStatus::Committed
    );

    // above 2000 * 0.6942
    assert!(matches!(
        h.reveal(bob, units(1_500)).await,
        Err(EngineError::InvalidParameter(_))
    ));

    assert_eq!(h.reveal(alice, units(1_000)).await.unwrap(), 1);
    let session = h.engine.session(asset(), ITEM).await.unwrap();
    assert_eq!(session.checks.progression, SessionProgression::RevealStarted);
    assert_eq!(session.checks.calls, 1);

    // no double reveal, no reveal without a commit
    assert!(matches!(
        h.reveal(alice, units(1_000)).await,
        Err(EngineError::PhaseViolation(_))
    ));
    assert!(matches!(
        h.reveal(addr("stranger"), units(1_000)).await,
        Err(EngineError::PhaseViolation(_))
    ));
}

#[tokio::test]
async fn test_late_reveal_closes_reveal_phase() {
    let h = Harness::new();
    let voters = [addr("a"), addr("b"), addr("c")];
    h.open(addr("opener"), units(1)).await;
    for voter in voters {
        h.commit(voter, units(1), units(1_000)).await;
    }

    h.clock.set(DEADLINE + WINDOW + 1);
    h.reveal(voters[0], units(1_000)).await.unwrap();

    let session = h.engine.session(asset(), ITEM).await.unwrap();
    assert_eq!(session.checks.progression, SessionProgression::RevealComplete);
    assert_eq!(session.core.unique_voters, 1);
    assert!(matches!(
        h.reveal(voters[1], units(1_000)).await,
        Err(EngineError::PhaseViolation(_))
    ));

    h.engine
        .set_final_appraisal(addr("anyone"), asset(), ITEM)
        .await
        .unwrap();
    let session = h.engine.session(asset(), ITEM).await.unwrap();
    assert_eq!(session.core.final_appraisal, units(1_000));
    assert_eq!(session.core.unique_voters, 1);
}

#[tokio::test]
async fn test_set_final_appraisal_rules() {
    let h = Harness::new();
    let (alice, bob) = (addr("alice"), addr("bob"));
    h.open(addr("opener"), units(1)).await;
    h.commit(alice, units(1), units(1_000)).await;
    h.commit(bob, units(16), units(1_200)).await;

    h.clock.set(DEADLINE);
    h.reveal(alice, units(1_000)).await.unwrap();

    // one reveal missing and the window is still open
    let result = h.engine.set_final_appraisal(alice, asset(), ITEM).await;
    assert!(matches!(result, Err(EngineError::DeadlineViolation(_))));

    h.reveal(bob, units(1_200)).await.unwrap();
    // weights 1 and 4: (1000 + 4 * 1200) / 5
    let final_appraisal = h
        .engine
        .set_final_appraisal(alice, asset(), ITEM)
        .await
        .unwrap();
    assert_eq!(final_appraisal, units(1_160));
    assert_eq!(
        h.engine.session(asset(), ITEM).await.unwrap().checks.time_final_appraisal_set,
        DEADLINE
    );

    let result = h.engine.set_final_appraisal(alice, asset(), ITEM).await;
    assert!(matches!(result, Err(EngineError::PhaseViolation(_))));
}

#[tokio::test]
async fn test_no_reveals_cannot_settle() {
    let h = Harness::new();
    h.open(addr("opener"), units(1)).await;
    h.commit(addr("alice"), units(1), units(1_000)).await;

    h.clock.set(DEADLINE + WINDOW + 1);
    let result = h
        .engine
        .set_final_appraisal(addr("anyone"), asset(), ITEM)
        .await;
    assert!(matches!(result, Err(EngineError::ArithmeticFault(_))));

    // aborted call leaves nothing behind
    let session = h.engine.session(asset(), ITEM).await.unwrap();
    assert_eq!(session.checks.progression, SessionProgression::Created);
    assert_eq!(session.checks.time_final_appraisal_set, 0);
    assert_eq!(session.core.total_profit, Amount::ZERO);
    assert_eq!(h.treasury.stats().await.assets_priced, 0);
}

#[tokio::test]
async fn test_harvest_rules() {
    let h = Harness::new();
    let (alice, bob) = (addr("alice"), addr("bob"));
    h.open(addr("opener"), units(1)).await;
    h.commit(alice, units(1), units(1_000)).await;
    h.commit(bob, units(1), units(1_000)).await;

    h.clock.set(DEADLINE);
    h.reveal(alice, units(1_000)).await.unwrap();
    let result = h.engine.harvest(alice, asset(), ITEM).await;
    assert!(matches!(result, Err(EngineError::PhaseViolation(_))));

    h.reveal(bob, units(1_000)).await.unwrap();
    h.engine
        .set_final_appraisal(alice, asset(), ITEM)
        .await
        .unwrap();

    let outcome = h.engine.harvest(alice, asset(), ITEM).await.unwrap();
    assert_eq!(outcome.base, 6);
    assert_eq!(outcome.winner_points, 6);
    assert_eq!(outcome.amount_harvested, Amount::ZERO);

    // each vote is harvested once
    let result = h.engine.harvest(alice, asset(), ITEM).await;
    assert!(matches!(result, Err(EngineError::PhaseViolation(_))));

    // claims wait for harvest completion
    let result = h.engine.claim(alice, asset(), ITEM).await;
    assert!(matches!(result, Err(EngineError::DeadlineViolation(_))));

    h.engine.harvest(bob, asset(), ITEM).await.unwrap();
    let session = h.engine.session(asset(), ITEM).await.unwrap();
    assert_eq!(session.checks.progression, SessionProgression::HarvestComplete);

    // harvest closed once everyone is in
    let result = h.engine.harvest(bob, asset(), ITEM).await;
    assert!(matches!(result, Err(EngineError::PhaseViolation(_))));
}

#[tokio::test]
async fn test_claim_requires_harvested_vote() {
    let h = Harness::new();
    let (alice, bob) = (addr("alice"), addr("bob"));
    h.open(addr("opener"), units(1)).await;
    h.commit(alice, units(1), units(1_000)).await;
    h.commit(bob, units(1), units(1_000)).await;
    h.clock.set(DEADLINE);
    h.reveal(alice, units(1_000)).await.unwrap();
    h.reveal(bob, units(1_000)).await.unwrap();
    h.engine
        .set_final_appraisal(alice, asset(), ITEM)
        .await
        .unwrap();
    h.engine.harvest(alice, asset(), ITEM).await.unwrap();

    // grace period over; bob revealed but never harvested
    h.clock.set(DEADLINE + 2 * WINDOW + 1);
    let result = h.engine.claim(bob, asset(), ITEM).await;
    assert!(matches!(result, Err(EngineError::PhaseViolation(_))));

    // alice claims the whole profit and the late claim closes the session
    let status = h.engine.claim(alice, asset(), ITEM).await.unwrap();
    assert_eq!(status.code(), 0);
    assert_eq!(h.engine.profit_of(&alice).await, units(1));
    assert_eq!(h.engine.principal_of(&alice).await, units(1));

    let session = h.engine.session(asset(), ITEM).await.unwrap();
    assert_eq!(session.checks.progression, SessionProgression::Closed);
    assert_eq!(session.voter_status(&bob), VoterStatus::Revealed);

    let result = h.engine.claim(alice, asset(), ITEM).await;
    assert!(matches!(result, Err(EngineError::PhaseViolation(_))));
}

#[tokio::test]
async fn test_add_to_bounty() {
    let h = Harness::new();
    h.open(addr("opener"), units(1)).await;

    let bounty = h
        .engine
        .add_to_bounty(addr("patron"), units(2), asset(), ITEM)
        .await
        .unwrap();
    assert_eq!(bounty, units(3));
    let session = h.engine.session(asset(), ITEM).await.unwrap();
    assert_eq!(session.core.total_session_stake, Amount::ZERO);
    assert_eq!(h.engine.custody().await, units(3));

    let result = h
        .engine
        .add_to_bounty(addr("patron"), Amount::ZERO, asset(), ITEM)
        .await;
    assert!(matches!(result, Err(EngineError::InvalidParameter(_))));

    h.clock.set(DEADLINE);
    let result = h
        .engine
        .add_to_bounty(addr("patron"), units(2), asset(), ITEM)
        .await;
    assert!(matches!(result, Err(EngineError::DeadlineViolation(_))));
    assert_eq!(h.engine.custody().await, units(3));
}

#[tokio::test]
async fn test_privileged_originator_skips_listing_cost() {
    let auction = addr("auction-house");
    let h = Harness::with_config(
        EngineConfig::default()
            .with_admin(admin())
            .with_privileged_originator(auction),
    );

    let key = h
        .engine
        .open_session(auction, units(5), asset(), ITEM, units(100), WINDOW)
        .await
        .unwrap();
    let session = h.engine.session_by_key(&key).await.unwrap();
    assert_eq!(session.core.bounty, units(5));
    assert_eq!(h.treasury.stats().await.balance, Amount::ZERO);

    // only the admin may change it
    let result = h
        .engine
        .set_privileged_originator(auction, None)
        .await;
    assert!(matches!(result, Err(EngineError::AuthorizationViolation(_))));
    assert_eq!(h.engine.privileged_originator().await, Some(auction));

    h.engine
        .set_privileged_originator(admin(), None)
        .await
        .unwrap();
    assert_eq!(h.engine.privileged_originator().await, None);

    let result = h
        .engine
        .open_session(auction, Amount::from_base_units(1), asset(), InstanceId(2), units(100), WINDOW)
        .await;
    assert!(matches!(result, Err(EngineError::InsufficientBalance { .. })));
}
