// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use linera_sdk::linera_base_types::{AccountOwner, Amount};
use lottery_sync::testing::InMemoryLedger;
use lottery_sync::{
    refresh_periodically, FixedRandomness, Ledger, LotteryError, LotteryOperation,
    LotteryReadModel, RandomnessError, RandomnessProof, RandomnessProvider, Role, Snapshot,
    SyncConfig,
};

const OWNER: u8 = 1;
const AUTHORITY: u8 = 2;
const ALICE: u8 = 3;
const BOB: u8 = 4;

fn account(byte: u8) -> AccountOwner {
    AccountOwner::Address20([byte; 20])
}

fn price() -> Amount {
    Amount::from_millis(10)
}

fn ledger() -> Arc<InMemoryLedger> {
    let ledger = InMemoryLedger::new(account(OWNER));
    ledger.grant(account(AUTHORITY), Role::Authority);
    ledger.grant(account(ALICE), Role::Participant);
    ledger.grant(account(BOB), Role::Participant);
    Arc::new(ledger)
}

fn model(ledger: &Arc<InMemoryLedger>) -> LotteryReadModel<InMemoryLedger> {
    LotteryReadModel::new(ledger.clone(), SyncConfig::default())
}

/// Lottery 1 at 0.01 with ticket 1 bought by Alice and ticket 2 by Bob.
async fn two_ticket_lottery(ledger: &InMemoryLedger) {
    ledger
        .submit(
            account(AUTHORITY),
            LotteryOperation::CreateLottery {
                ticket_price: price(),
            },
        )
        .await
        .unwrap();
    for buyer in [ALICE, BOB] {
        ledger
            .submit(
                account(buyer),
                LotteryOperation::BuyTicket {
                    lottery_id: 1,
                    payment: price(),
                },
            )
            .await
            .unwrap();
    }
}

async fn draw(ledger: &InMemoryLedger, lottery_id: u64, entropy: u8) {
    ledger
        .submit(
            account(AUTHORITY),
            LotteryOperation::PickWinner {
                lottery_id,
                randomness: Some(RandomnessProof(vec![entropy])),
            },
        )
        .await
        .unwrap();
}

struct BrokenOracle;

impl RandomnessProvider for BrokenOracle {
    async fn authorize(
        &self,
        _caller: AccountOwner,
        _params: &[u8],
    ) -> Result<Option<RandomnessProof>, RandomnessError> {
        Err(RandomnessError("oracle offline".to_string()))
    }
}

#[tokio::test]
async fn test_empty_ledger_gives_empty_snapshot() {
    let ledger = ledger();
    let snapshot = model(&ledger).synchronize(None).await.unwrap();
    assert_eq!(*snapshot, Snapshot::empty());
    assert!(snapshot.lottery.is_none());
}

#[tokio::test]
async fn test_open_lottery_with_two_tickets() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;

    let snapshot = model(&ledger).synchronize(None).await.unwrap();
    let lottery = snapshot.lottery.as_ref().unwrap();
    assert_eq!(snapshot.lottery_id, 1);
    assert_eq!(lottery.id, 1);
    assert_eq!(lottery.ticket_price, price());
    assert_eq!(lottery.total_prize, Amount::from_millis(20));
    assert!(!lottery.winner_chosen);
    assert_eq!(snapshot.tickets.len(), 2);
    assert_eq!(snapshot.tickets[0].owner, account(ALICE));
    assert_eq!(snapshot.tickets[1].owner, account(BOB));
    assert!(snapshot.history.is_empty());
    assert_eq!(snapshot.caller_winning_ticket_id, None);
}

#[tokio::test]
async fn test_caller_owning_the_winning_ticket() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    // 1 + 1 % 2 == 2
    draw(&ledger, 1, 1).await;

    let model = model(&ledger);
    let snapshot = model.synchronize(Some(account(BOB))).await.unwrap();
    assert_eq!(snapshot.lottery.as_ref().unwrap().winner_id, 2);
    assert_eq!(snapshot.caller_winning_ticket_id, Some(2));

    let snapshot = model.synchronize(Some(account(ALICE))).await.unwrap();
    assert_eq!(snapshot.caller_winning_ticket_id, None);
}

#[tokio::test]
async fn test_unresolved_ticket_is_skipped() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    ledger.fail_ticket(1, 2);

    let snapshot = model(&ledger).synchronize(None).await.unwrap();
    assert_eq!(snapshot.tickets.len(), 1);
    assert_eq!(snapshot.tickets[0].id, 1);
}

#[tokio::test]
async fn test_history_keeps_only_drawn_lotteries() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    draw(&ledger, 1, 0).await;
    ledger
        .submit(
            account(AUTHORITY),
            LotteryOperation::CreateLottery {
                ticket_price: price(),
            },
        )
        .await
        .unwrap();

    let model = model(&ledger);
    let snapshot = model.synchronize(None).await.unwrap();
    assert_eq!(snapshot.lottery_id, 2);
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(snapshot.history[0].id, 1);
    assert!(snapshot.tickets.is_empty());

    ledger.tamper_lottery(1, |lottery| lottery.winner_chosen = false);
    let snapshot = model.synchronize(None).await.unwrap();
    assert!(snapshot.history.is_empty());
    assert!(snapshot.history.iter().all(|lottery| lottery.winner_chosen));
}

#[tokio::test]
async fn test_synchronize_is_idempotent() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    draw(&ledger, 1, 1).await;

    let model = model(&ledger);
    let first = model.synchronize(Some(account(BOB))).await.unwrap();
    let second = model.synchronize(Some(account(BOB))).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_failed_pass_keeps_previous_snapshot() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    let model = model(&ledger);
    let good = model.synchronize(None).await.unwrap();

    ledger.set_offline(true);
    let error = model.synchronize(None).await.unwrap_err();
    assert!(error.is_transport());
    assert_eq!(model.snapshot(), good);
    assert_eq!(model.last_failure(), Some(error));

    ledger.set_offline(false);
    model.synchronize(None).await.unwrap();
    assert_eq!(model.last_failure(), None);
}

#[tokio::test]
async fn test_unreadable_history_fails_the_pass() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    draw(&ledger, 1, 0).await;
    ledger
        .submit(
            account(AUTHORITY),
            LotteryOperation::CreateLottery {
                ticket_price: price(),
            },
        )
        .await
        .unwrap();
    let model = model(&ledger);
    let good = model.synchronize(None).await.unwrap();
    assert_eq!(good.history.len(), 1);

    ledger.fail_lottery(1);
    let error = model.synchronize(None).await.unwrap_err();
    assert_matches!(error, LotteryError::Transport(_));
    assert_eq!(model.snapshot(), good);
    assert_eq!(model.last_failure(), Some(error));
}

#[tokio::test]
async fn test_confirmed_transaction_survives_a_failed_resync() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    let alice = model(&ledger);
    alice.connect(account(ALICE)).await.unwrap();
    let before = alice.snapshot();
    assert_eq!(before.tickets.len(), 2);

    ledger.go_offline_after_next_submit();
    let receipt = alice.buy_ticket(1).await.unwrap();
    assert_eq!(
        receipt.operation,
        LotteryOperation::BuyTicket {
            lottery_id: 1,
            payment: price(),
        }
    );
    assert_eq!(ledger.submissions().len(), 4);
    assert_eq!(alice.snapshot(), before);
    assert_matches!(alice.last_failure(), Some(LotteryError::Transport(_)));

    ledger.set_offline(false);
    alice.refresh().await.unwrap();
    assert_eq!(alice.snapshot().tickets.len(), 3);
    assert_eq!(alice.last_failure(), None);
}

#[tokio::test]
async fn test_claimed_without_winner_is_malformed() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    ledger.tamper_lottery(1, |lottery| lottery.claimed = true);

    let model = model(&ledger);
    assert_matches!(model.synchronize(None).await, Err(LotteryError::Transport(_)));
    assert!(model.snapshot().lottery.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_hung_ledger_times_out() {
    let ledger = ledger();
    ledger.set_stalled(true);
    let config = SyncConfig {
        request_timeout_ms: Some(5_000),
        ..SyncConfig::default()
    };
    let model = LotteryReadModel::new(ledger.clone(), config);

    let error = model.synchronize(None).await.unwrap_err();
    assert_matches!(error, LotteryError::Transport(cause) if cause.contains("timed out"));
}

#[tokio::test]
async fn test_full_round_through_the_model() {
    let ledger = ledger();
    let authority = model(&ledger).with_randomness(FixedRandomness(RandomnessProof(vec![0])));
    let alice = model(&ledger);

    authority.connect(account(AUTHORITY)).await.unwrap();
    let receipt = authority.create_lottery(price()).await.unwrap();
    assert_eq!(
        receipt.operation,
        LotteryOperation::CreateLottery {
            ticket_price: price()
        }
    );
    assert_eq!(authority.snapshot().lottery_id, 1);
    assert!(authority.session().is_authority_for_current_lottery);

    alice.connect(account(ALICE)).await.unwrap();
    alice.buy_ticket(1).await.unwrap();
    assert_eq!(alice.snapshot().tickets.len(), 1);

    authority.refresh().await.unwrap();
    authority.pick_winner(1).await.unwrap();
    assert!(authority.snapshot().is_finished());

    alice.refresh().await.unwrap();
    assert_eq!(alice.session().caller_winning_ticket_id, Some(1));
    assert!(alice.snapshot().can_claim());

    alice.claim_prize(1, 1).await.unwrap();
    let lottery = alice.snapshot().lottery.clone().unwrap();
    assert!(lottery.claimed);
    assert!(!alice.snapshot().can_claim());

    assert_matches!(alice.claim_prize(1, 1).await, Err(LotteryError::AlreadyClaimed));
}

#[tokio::test]
async fn test_ledger_rejects_second_claim_without_precheck() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    draw(&ledger, 1, 0).await;
    let config = SyncConfig {
        precheck: false,
        ..SyncConfig::default()
    };
    let alice = LotteryReadModel::new(ledger.clone(), config);
    alice.connect(account(ALICE)).await.unwrap();

    alice.claim_prize(1, 1).await.unwrap();
    assert_matches!(alice.claim_prize(1, 1).await, Err(LotteryError::AlreadyClaimed));
    assert_matches!(alice.claim_prize(1, 2).await, Err(LotteryError::AlreadyClaimed));
}

#[tokio::test]
async fn test_claim_with_someone_elses_ticket() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    draw(&ledger, 1, 1).await;

    let alice = model(&ledger);
    alice.connect(account(ALICE)).await.unwrap();
    assert_matches!(alice.claim_prize(1, 2).await, Err(LotteryError::NotWinner));
    assert_matches!(alice.claim_prize(1, 1).await, Err(LotteryError::NotWinner));
}

#[tokio::test]
async fn test_buying_for_another_lottery_fails() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    let alice = model(&ledger);
    alice.connect(account(ALICE)).await.unwrap();
    let before = alice.snapshot();

    assert_matches!(alice.buy_ticket(7).await, Err(LotteryError::NoActiveLottery));
    assert_matches!(alice.buy_ticket(0).await, Err(LotteryError::NoActiveLottery));
    assert_eq!(alice.snapshot(), before);
    assert_eq!(ledger.submissions().len(), 3);
}

#[tokio::test]
async fn test_buying_without_any_lottery_fails() {
    let ledger = ledger();
    let alice = model(&ledger);
    alice.connect(account(ALICE)).await.unwrap();
    assert_matches!(alice.buy_ticket(1).await, Err(LotteryError::NoActiveLottery));
}

#[tokio::test]
async fn test_buying_after_the_draw_is_rejected_by_the_ledger() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    draw(&ledger, 1, 0).await;
    let bob = model(&ledger);
    bob.connect(account(BOB)).await.unwrap();
    assert_matches!(bob.buy_ticket(1).await, Err(LotteryError::Rejected(_)));
}

#[tokio::test]
async fn test_create_requires_authority() {
    let ledger = ledger();
    let alice = model(&ledger);
    alice.connect(account(ALICE)).await.unwrap();

    assert_matches!(alice.create_lottery(price()).await, Err(LotteryError::Unauthorized(_)));
    assert!(ledger.submissions().is_empty());

    let owner = model(&ledger);
    owner.connect(account(OWNER)).await.unwrap();
    owner.create_lottery(price()).await.unwrap();
    assert_eq!(owner.snapshot().lottery.as_ref().unwrap().authority, account(OWNER));
}

#[tokio::test]
async fn test_requesting_authority_role_is_left_to_the_ledger() {
    let ledger = ledger();
    let config = SyncConfig {
        request_authority_role: true,
        ..SyncConfig::default()
    };
    let alice = LotteryReadModel::new(ledger.clone(), config);
    alice.connect(account(ALICE)).await.unwrap();

    assert_matches!(
        alice.create_lottery(price()).await,
        Err(LotteryError::Unauthorized(reason)) if reason.contains("owner")
    );
}

#[tokio::test]
async fn test_create_while_running_is_already_active() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    let authority = model(&ledger);
    authority.connect(account(AUTHORITY)).await.unwrap();

    assert_matches!(authority.create_lottery(price()).await, Err(LotteryError::AlreadyActive));
    assert_matches!(
        authority.create_lottery(Amount::ZERO).await,
        Err(LotteryError::InvalidAmount(_))
    );
}

#[tokio::test]
async fn test_pick_winner_forwards_the_proof_verbatim() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    let proof = RandomnessProof(vec![0xde, 0xad, 0xbe, 0xef, 0x01]);
    let authority = model(&ledger).with_randomness(FixedRandomness(proof.clone()));
    authority.connect(account(AUTHORITY)).await.unwrap();

    authority.pick_winner(1).await.unwrap();
    let (sender, operation) = ledger.submissions().pop().unwrap();
    assert_eq!(sender, account(AUTHORITY));
    assert_eq!(
        operation,
        LotteryOperation::PickWinner {
            lottery_id: 1,
            randomness: Some(proof),
        }
    );
}

#[tokio::test]
async fn test_pick_winner_by_someone_else() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    let bob = model(&ledger);
    bob.connect(account(BOB)).await.unwrap();
    assert_matches!(bob.pick_winner(1).await, Err(LotteryError::Unauthorized(_)));

    let config = SyncConfig {
        precheck: false,
        ..SyncConfig::default()
    };
    let bob = LotteryReadModel::new(ledger.clone(), config);
    bob.connect(account(BOB)).await.unwrap();
    assert_matches!(bob.pick_winner(1).await, Err(LotteryError::Unauthorized(_)));
}

#[tokio::test]
async fn test_randomness_failure_passes_through() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    let authority = model(&ledger).with_randomness(BrokenOracle);
    authority.connect(account(AUTHORITY)).await.unwrap();

    assert_matches!(
        authority.pick_winner(1).await,
        Err(LotteryError::RandomnessProvider(cause)) if cause == "oracle offline"
    );
    assert_eq!(ledger.submissions().len(), 3);
}

#[tokio::test]
async fn test_mutations_need_a_session() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    let model = model(&ledger);
    model.synchronize(None).await.unwrap();

    assert_matches!(model.buy_ticket(1).await, Err(LotteryError::NotConnected));
    assert_matches!(model.create_lottery(price()).await, Err(LotteryError::NotConnected));

    model.connect(account(BOB)).await.unwrap();
    model.disconnect();
    assert_matches!(model.claim_prize(1, 1).await, Err(LotteryError::NotConnected));
}

#[tokio::test]
async fn test_participant_role_request() {
    let ledger = Arc::new(InMemoryLedger::new(account(OWNER)));
    let carol = model(&ledger);
    carol.connect(account(9)).await.unwrap();
    carol.request_participant_role().await.unwrap();
    assert!(ledger.is_participant(account(9)).await.unwrap());

    let owner = model(&ledger);
    owner.connect(account(OWNER)).await.unwrap();
    let receipt = owner.request_participant_role().await.unwrap();
    assert_eq!(
        receipt.operation,
        LotteryOperation::AssignRole {
            account: account(OWNER),
            role: Role::Participant,
        }
    );
    owner.assign_role(account(AUTHORITY), Role::Authority).await.unwrap();
    assert!(ledger.is_authority(account(AUTHORITY)).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_periodic_refresh_runs_until_shutdown() {
    let ledger = ledger();
    two_ticket_lottery(&ledger).await;
    let model = model(&ledger);

    let passes = refresh_periodically(
        &model,
        Duration::from_millis(100),
        tokio::time::sleep(Duration::from_millis(250)),
    )
    .await;
    assert_eq!(passes, 3);
    assert_eq!(model.snapshot().tickets.len(), 2);
}
