//! tests/store_tests.rs - data-access contract against the embedded backend

#[cfg(test)]
mod tests {
    use crate::{
        config::DatabaseConfig,
        db::{account, establish_connection, label, slot, stats, test_connection, tracking, transaction, wallet, DbPool},
        error::StoreError,
        models::{
            AccountActivityType, AccountLabelType, AccountStateUpdate, LabelSource, NewAccountActivity,
            NewAccountSnapshot, NewLabel, NewTrackedAccount, NewTrackedWallet, NewWalletActivity, NewWalletBalance,
            Slot, SlotLeader, SlotRange, StringList, TimeRange, Transaction, TransactionStatus, WalletActivityType,
            WalletLabelType,
        },
        schema::Backend,
        tests::memory_store,
    };
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use futures::future::join_all;

    const ADDR1: &str = "9ii1FEiWSgDzXAbwj2oTmJXzkfCw78mnHwPQv9WQ5iTn";
    const WALLET: &str = "AhAkbf3cGD6HkFod2rBEE8mie8ks9p7vuss6WGkUFAM9";
    const PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn test_slot(number: i64) -> Slot {
        Slot {
            slot: number,
            blockhash: format!("hash_{}", number),
            parent_slot: number.saturating_sub(1).max(0),
            finalized: false,
            timestamp: at(number),
        }
    }

    fn test_transaction(signature: &str, slot: i64, programs: &[&str]) -> Transaction {
        Transaction {
            signature: signature.to_string(),
            slot,
            fee: 5000,
            status: TransactionStatus::Pending,
            program_ids: programs.iter().copied().collect(),
            timestamp: at(slot),
        }
    }

    fn balance_change(address: &str, slot: i64, timestamp: DateTime<Utc>, old: i64, new: i64) -> NewAccountActivity {
        NewAccountActivity {
            account_address: address.to_string(),
            activity_type: AccountActivityType::BalanceChange,
            change_type: "lamports".to_string(),
            old_value: old.to_string(),
            new_value: new.to_string(),
            timestamp,
            block_slot: slot,
            lamports_change: new - old,
            data_size_change: 0,
            transaction_signature: None,
            program_id: None,
            instruction_type: None,
        }
    }

    fn wallet_receive(signature: &str, slot: i64, amount: f64) -> NewWalletActivity {
        NewWalletActivity {
            wallet_address: WALLET.to_string(),
            activity_type: WalletActivityType::Receive,
            transaction_signature: signature.to_string(),
            amount: Some(amount),
            token_symbol: Some("SOL".to_string()),
            counterparty: None,
            timestamp: at(slot),
            block_slot: slot,
            fee: 5000,
            status: TransactionStatus::Success,
            details: None,
        }
    }

    fn balance(mint: Option<&str>, slot: i64, amount: f64) -> NewWalletBalance {
        NewWalletBalance {
            wallet_address: WALLET.to_string(),
            token_mint: mint.map(str::to_string),
            token_symbol: None,
            balance: amount,
            slot,
            timestamp: at(slot),
        }
    }

    fn assert_constraint(result: Result<(), StoreError>) {
        match result {
            Err(StoreError::ConstraintViolation { backend, .. }) => assert_eq!(backend, Backend::Sqlite),
            other => panic!("expected a constraint violation, got {:?}", other),
        }
    }

    async fn track(pool: &DbPool, address: &str) {
        tracking::upsert_tracked_account(pool, &NewTrackedAccount::new(address))
            .await
            .expect("Failed to track account");
    }

    #[tokio::test]
    async fn embedded_bootstrap_scenario() {
        let pool = memory_store().await;
        test_connection(&pool).await.unwrap();

        let counts = stats::table_counts(&pool).await.unwrap();
        assert_eq!(counts.len(), 12);
        assert!(counts.iter().all(|c| c.rows == 0));

        slot::upsert_slot(&pool, &test_slot(100)).await.unwrap();
        track(&pool, ADDR1).await;
        tracking::append_account_activity(&pool, &balance_change(ADDR1, 100, at(100), 1000, 1500))
            .await
            .unwrap();

        let tracked = tracking::get_tracked_account(&pool, ADDR1).await.unwrap().unwrap();
        assert_eq!(tracked.activity_count, 1);
        assert_eq!(tracked.last_activity, Some(at(100)));

        let activities = tracking::query_activities(&pool, ADDR1, TimeRange::until(at(1000))).await.unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].lamports_change, 500);
        assert_eq!(activities[0].activity_type, AccountActivityType::BalanceChange);
    }

    #[tokio::test]
    async fn activity_needs_its_slot() {
        let pool = memory_store().await;
        track(&pool, ADDR1).await;

        let activity = balance_change(ADDR1, 7, at(7), 10, 20);
        assert_constraint(tracking::append_account_activity(&pool, &activity).await);

        let tracked = tracking::get_tracked_account(&pool, ADDR1).await.unwrap().unwrap();
        assert_eq!(tracked.activity_count, 0);
        assert_eq!(tracked.last_activity, None);

        slot::upsert_slot(&pool, &test_slot(7)).await.unwrap();
        tracking::append_account_activity(&pool, &activity).await.unwrap();
        let tracked = tracking::get_tracked_account(&pool, ADDR1).await.unwrap().unwrap();
        assert_eq!(tracked.activity_count, 1);
    }

    #[tokio::test]
    async fn activity_needs_a_tracked_account() {
        let pool = memory_store().await;
        slot::upsert_slot(&pool, &test_slot(1)).await.unwrap();

        let result = tracking::append_account_activity(&pool, &balance_change("untracked", 1, at(1), 0, 1)).await;
        match result {
            Err(StoreError::ConstraintViolation { entity, key, detail, .. }) => {
                assert_eq!(entity, "account activity");
                assert_eq!(key, "untracked");
                assert!(detail.contains("tracked account"));
            }
            other => panic!("expected a constraint violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn mismatched_delta_is_rejected() {
        let pool = memory_store().await;
        slot::upsert_slot(&pool, &test_slot(1)).await.unwrap();
        track(&pool, ADDR1).await;

        let mut activity = balance_change(ADDR1, 1, at(1), 1000, 1500);
        activity.lamports_change = 400;
        assert_constraint(tracking::append_account_activity(&pool, &activity).await);

        // Non-numeric values are not checked.
        let owner_change = NewAccountActivity {
            activity_type: AccountActivityType::OwnerChange,
            change_type: "owner".to_string(),
            old_value: "SystemProgram".to_string(),
            new_value: PROGRAM.to_string(),
            lamports_change: 0,
            ..balance_change(ADDR1, 1, at(1), 0, 0)
        };
        tracking::append_account_activity(&pool, &owner_change).await.unwrap();
    }

    #[tokio::test]
    async fn counters_follow_every_append() {
        let pool = memory_store().await;
        track(&pool, ADDR1).await;
        for number in 1..=5 {
            slot::upsert_slot(&pool, &test_slot(number)).await.unwrap();
        }

        // Out of order on purpose; last_activity must still be the maximum.
        for (number, second) in [(1, 10), (2, 50), (3, 30), (4, 20), (5, 40)] {
            tracking::append_account_activity(&pool, &balance_change(ADDR1, number, at(second), 0, number))
                .await
                .unwrap();
        }

        let tracked = tracking::get_tracked_account(&pool, ADDR1).await.unwrap().unwrap();
        assert_eq!(tracked.activity_count, 5);
        assert_eq!(tracked.last_activity, Some(at(50)));

        let replay = tracking::query_activities(&pool, ADDR1, TimeRange::until(at(1000))).await.unwrap();
        let seconds: Vec<DateTime<Utc>> = replay.iter().map(|a| a.timestamp).collect();
        assert_eq!(seconds, vec![at(10), at(20), at(30), at(40), at(50)]);

        let recent = tracking::recent_account_activities(&pool, ADDR1, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, at(50));
        assert_eq!(recent[1].timestamp, at(40));

        // Half-open: the end instant is excluded.
        let window = tracking::query_activities(&pool, ADDR1, TimeRange::new(at(20), at(40))).await.unwrap();
        assert_eq!(window.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_writers_keep_counters_consistent() {
        let pool = memory_store().await;
        track(&pool, ADDR1).await;
        slot::upsert_slot(&pool, &test_slot(9)).await.unwrap();

        let activities: Vec<NewAccountActivity> =
            (0..20).map(|i| balance_change(ADDR1, 9, at(i), i, i + 1)).collect();
        let results = join_all(activities.iter().map(|a| tracking::append_account_activity(&pool, a))).await;
        assert!(results.iter().all(|r| r.is_ok()));

        let tracked = tracking::get_tracked_account(&pool, ADDR1).await.unwrap().unwrap();
        assert_eq!(tracked.activity_count, 20);
        assert_eq!(tracked.last_activity, Some(at(19)));
    }

    async fn file_store(dir: &tempfile::TempDir, connections: u32) -> DbPool {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("chain_store.db").display());
        let mut config = DatabaseConfig::new(url).expect("Failed to build config");
        config.max_connections = connections;
        establish_connection(&config).await.expect("Failed to open file-backed store")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn file_backed_writers_queue_for_the_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_store(&dir, 8).await;
        track(&pool, ADDR1).await;
        slot::upsert_slot(&pool, &test_slot(9)).await.unwrap();

        let activities: Vec<_> = (0..100)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let activity = balance_change(ADDR1, 9, at(i), i, i + 1);
                    tracking::append_account_activity(&pool, &activity).await
                })
            })
            .collect();
        let snapshots: Vec<_> = (0..50)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let snapshot = NewAccountSnapshot {
                        account_address: ADDR1.to_string(),
                        lamports: i,
                        data_size: 0,
                        owner: PROGRAM.to_string(),
                        executable: false,
                        rent_epoch: 0,
                        timestamp: at(i),
                        slot: 9,
                    };
                    account::append_account_snapshot(&pool, &snapshot).await
                })
            })
            .collect();

        for result in join_all(activities).await.into_iter().chain(join_all(snapshots).await) {
            result.expect("writer task panicked").expect("append was rejected");
        }

        let tracked = tracking::get_tracked_account(&pool, ADDR1).await.unwrap().unwrap();
        assert_eq!(tracked.activity_count, 100);
        assert_eq!(tracked.last_activity, Some(at(99)));

        let replay = tracking::query_activities(&pool, ADDR1, TimeRange::until(at(1000))).await.unwrap();
        assert_eq!(replay.len(), 100);
        let history = account::query_account_snapshots(&pool, ADDR1, TimeRange::until(at(1000))).await.unwrap();
        assert_eq!(history.len(), 50);

        pool.close().await;
    }

    #[tokio::test]
    async fn tracked_entries_resolve_by_address_or_name() {
        let pool = memory_store().await;
        let mut treasury = NewTrackedAccount::new(ADDR1);
        treasury.name = Some("treasury".to_string());
        tracking::upsert_tracked_account(&pool, &treasury).await.unwrap();
        let mut shadow = NewTrackedAccount::new("second");
        shadow.name = Some("treasury".to_string());
        tracking::upsert_tracked_account(&pool, &shadow).await.unwrap();

        let by_name = tracking::find_tracked_account(&pool, "treasury").await.unwrap().unwrap();
        assert_eq!(by_name.address, ADDR1);
        let by_address = tracking::find_tracked_account(&pool, "second").await.unwrap().unwrap();
        assert_eq!(by_address.address, "second");
        assert!(tracking::find_tracked_account(&pool, "nobody").await.unwrap().is_none());

        let mut hot = NewTrackedWallet::new(WALLET);
        hot.name = Some("hot wallet".to_string());
        wallet::upsert_tracked_wallet(&pool, &hot).await.unwrap();
        let found = wallet::find_tracked_wallet(&pool, "hot wallet").await.unwrap().unwrap();
        assert_eq!(found.address, WALLET);
        assert_eq!(wallet::find_tracked_wallet(&pool, WALLET).await.unwrap().unwrap().address, WALLET);
        assert!(wallet::find_tracked_wallet(&pool, "cold wallet").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tracked_account_upsert_keeps_activity_bookkeeping() {
        let pool = memory_store().await;
        slot::upsert_slot(&pool, &test_slot(1)).await.unwrap();
        track(&pool, ADDR1).await;
        tracking::append_account_activity(&pool, &balance_change(ADDR1, 1, at(1), 0, 5))
            .await
            .unwrap();

        let mut update = NewTrackedAccount::new(ADDR1);
        update.name = Some("treasury".to_string());
        update.balance_threshold = Some(1_000_000);
        update.tags = ["whale", "dex"].into_iter().collect();
        tracking::upsert_tracked_account(&pool, &update).await.unwrap();

        let tracked = tracking::get_tracked_account(&pool, ADDR1).await.unwrap().unwrap();
        assert_eq!(tracked.activity_count, 1);
        assert_eq!(tracked.last_activity, Some(at(1)));
        assert_eq!(tracked.name.as_deref(), Some("treasury"));
        assert_eq!(tracked.tags, StringList(vec!["whale".to_string(), "dex".to_string()]));
    }

    #[tokio::test]
    async fn tracked_accounts_are_soft_deleted() {
        let pool = memory_store().await;
        track(&pool, ADDR1).await;
        track(&pool, "second").await;

        assert!(tracking::deactivate_tracked_account(&pool, "second").await.unwrap());
        assert!(!tracking::deactivate_tracked_account(&pool, "never-tracked").await.unwrap());

        let active = tracking::list_tracked_accounts(&pool, true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].address, ADDR1);
        assert_eq!(tracking::list_tracked_accounts(&pool, false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn finalized_slots_stay_finalized() {
        let pool = memory_store().await;
        let mut finalized = test_slot(5);
        finalized.finalized = true;
        slot::upsert_slot(&pool, &finalized).await.unwrap();

        let mut replay = test_slot(5);
        replay.blockhash = "replayed".to_string();
        slot::upsert_slot(&pool, &replay).await.unwrap();

        let stored = slot::get_slot(&pool, 5).await.unwrap().unwrap();
        assert!(stored.finalized);
        assert_eq!(stored.blockhash, "replayed");

        slot::upsert_slot(&pool, &test_slot(6)).await.unwrap();
        assert!(slot::mark_slot_finalized(&pool, 6).await.unwrap());
        assert!(!slot::mark_slot_finalized(&pool, 60).await.unwrap());

        let finalized = slot::get_finalized_slots(&pool, 10).await.unwrap();
        let numbers: Vec<i64> = finalized.iter().map(|s| s.slot).collect();
        assert_eq!(numbers, vec![6, 5]);
    }

    #[tokio::test]
    async fn parent_must_precede_slot() {
        let pool = memory_store().await;

        let mut orphan = test_slot(10);
        orphan.parent_slot = 10;
        assert_constraint(slot::upsert_slot(&pool, &orphan).await);

        let genesis = Slot {
            parent_slot: 0,
            ..test_slot(0)
        };
        slot::upsert_slot(&pool, &genesis).await.unwrap();
        assert!(slot::get_slot(&pool, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn slot_ranges_are_inclusive_and_ordered() {
        let pool = memory_store().await;
        for number in [4, 1, 3, 2, 5] {
            slot::upsert_slot(&pool, &test_slot(number)).await.unwrap();
        }

        let range: Vec<i64> = slot::query_slots_in_range(&pool, SlotRange::new(2, 4))
            .await
            .unwrap()
            .iter()
            .map(|s| s.slot)
            .collect();
        assert_eq!(range, vec![2, 3, 4]);

        let recent: Vec<i64> = slot::get_recent_slots(&pool, 2).await.unwrap().iter().map(|s| s.slot).collect();
        assert_eq!(recent, vec![5, 4]);
    }

    #[tokio::test]
    async fn slot_leaders_are_replaced_by_slot() {
        let pool = memory_store().await;
        slot::upsert_slot(&pool, &test_slot(3)).await.unwrap();

        let mut leader = SlotLeader {
            slot: 3,
            leader_pubkey: "leader_a".to_string(),
            validator_name: None,
        };
        slot::upsert_slot_leader(&pool, &leader).await.unwrap();
        leader.leader_pubkey = "leader_b".to_string();
        leader.validator_name = Some("Validator B".to_string());
        slot::upsert_slot_leader(&pool, &leader).await.unwrap();

        assert_eq!(slot::get_slot_leader(&pool, 3).await.unwrap(), Some(leader));

        let orphan = SlotLeader {
            slot: 30,
            leader_pubkey: "leader_c".to_string(),
            validator_name: None,
        };
        assert_constraint(slot::upsert_slot_leader(&pool, &orphan).await);
    }

    #[tokio::test]
    async fn transactions_refine_status_only() {
        let pool = memory_store().await;
        assert_constraint(transaction::upsert_transaction(&pool, &test_transaction("sig1", 8, &[PROGRAM])).await);

        slot::upsert_slot(&pool, &test_slot(8)).await.unwrap();
        transaction::upsert_transaction(&pool, &test_transaction("sig1", 8, &[PROGRAM]))
            .await
            .unwrap();

        let mut refined = test_transaction("sig1", 8, &[]);
        refined.status = TransactionStatus::Success;
        refined.fee = 1;
        transaction::upsert_transaction(&pool, &refined).await.unwrap();

        let stored = transaction::get_transaction(&pool, "sig1").await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Success);
        assert_eq!(stored.fee, 5000);
        assert_eq!(stored.program_ids, StringList(vec![PROGRAM.to_string()]));

        assert!(!transaction::ensure_transaction(&pool, &refined).await.unwrap());
        assert!(transaction::ensure_transaction(&pool, &test_transaction("sig2", 8, &[]))
            .await
            .unwrap());
        assert_eq!(transaction::get_transactions_by_slot(&pool, 8).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn containment_needs_a_capable_backend() {
        let pool = memory_store().await;
        for number in 1..=3 {
            slot::upsert_slot(&pool, &test_slot(number)).await.unwrap();
        }
        transaction::upsert_transaction(&pool, &test_transaction("a", 1, &[PROGRAM, "other"]))
            .await
            .unwrap();
        transaction::upsert_transaction(&pool, &test_transaction("b", 2, &["other"]))
            .await
            .unwrap();
        transaction::upsert_transaction(&pool, &test_transaction("c", 3, &[PROGRAM]))
            .await
            .unwrap();

        let err = transaction::transactions_containing_program(&pool, PROGRAM).await.unwrap_err();
        assert!(matches!(err, StoreError::TypeMappingGap { backend: Backend::Sqlite, .. }));

        let scanned = transaction::scan_transactions_for_program(&pool, PROGRAM, SlotRange::new(1, 2))
            .await
            .unwrap();
        let signatures: Vec<&str> = scanned.iter().map(|t| t.signature.as_str()).collect();
        assert_eq!(signatures, vec!["a"]);
    }

    #[tokio::test]
    async fn account_state_keeps_created_at() {
        let pool = memory_store().await;
        slot::upsert_slot(&pool, &test_slot(1)).await.unwrap();
        slot::upsert_slot(&pool, &test_slot(2)).await.unwrap();

        let mut state = AccountStateUpdate {
            address: ADDR1.to_string(),
            lamports: 1000,
            owner: "SystemProgram".to_string(),
            executable: false,
            slot: 1,
            data_size: 0,
        };
        account::upsert_account_state(&pool, &state).await.unwrap();
        let first = account::query_latest_account_state(&pool, ADDR1).await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        state.lamports = 2500;
        state.slot = 2;
        account::upsert_account_state(&pool, &state).await.unwrap();
        let second = account::query_latest_account_state(&pool, ADDR1).await.unwrap().unwrap();

        assert_eq!(second.lamports, 2500);
        assert_eq!(second.slot, 2);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);

        state.slot = 99;
        assert_constraint(account::upsert_account_state(&pool, &state).await);
        assert!(account::query_latest_account_state(&pool, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshots_are_appended_and_replayed() {
        let pool = memory_store().await;
        slot::upsert_slot(&pool, &test_slot(1)).await.unwrap();
        slot::upsert_slot(&pool, &test_slot(2)).await.unwrap();

        let snapshot = |slot: i64, lamports: i64| NewAccountSnapshot {
            account_address: ADDR1.to_string(),
            lamports,
            data_size: 165,
            owner: PROGRAM.to_string(),
            executable: false,
            rent_epoch: 361,
            timestamp: at(slot),
            slot,
        };

        assert_constraint(account::append_account_snapshot(&pool, &snapshot(1, 10)).await);
        track(&pool, ADDR1).await;
        account::append_account_snapshot(&pool, &snapshot(2, 20)).await.unwrap();
        account::append_account_snapshot(&pool, &snapshot(1, 10)).await.unwrap();
        assert_constraint(account::append_account_snapshot(&pool, &snapshot(3, 30)).await);

        let history = account::query_account_snapshots(&pool, ADDR1, TimeRange::until(at(100))).await.unwrap();
        let lamports: Vec<i64> = history.iter().map(|s| s.lamports).collect();
        assert_eq!(lamports, vec![10, 20]);
    }

    #[tokio::test]
    async fn wallet_activity_needs_its_transaction() {
        let pool = memory_store().await;
        slot::upsert_slot(&pool, &test_slot(4)).await.unwrap();
        wallet::upsert_tracked_wallet(&pool, &NewTrackedWallet::new(WALLET)).await.unwrap();

        let activity = wallet_receive("wsig", 4, 1.5);
        match wallet::append_wallet_activity(&pool, &activity).await {
            Err(StoreError::ConstraintViolation { detail, .. }) => assert!(detail.contains("transaction wsig")),
            other => panic!("expected a constraint violation, got {:?}", other),
        }

        transaction::ensure_transaction(&pool, &test_transaction("wsig", 4, &[])).await.unwrap();
        wallet::append_wallet_activity(&pool, &activity).await.unwrap();
        wallet::append_wallet_activity(&pool, &wallet_receive("wsig", 4, 2.0)).await.unwrap();

        let tracked = wallet::get_tracked_wallet(&pool, WALLET).await.unwrap().unwrap();
        assert_eq!(tracked.activity_count, 2);
        assert_eq!(tracked.last_activity, Some(at(4)));

        let history = wallet::query_wallet_activities(&pool, WALLET, TimeRange::until(at(100))).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount, Some(1.5));
        assert_eq!(history[0].status, TransactionStatus::Success);

        let recent = wallet::recent_wallet_activities(&pool, WALLET, 1).await.unwrap();
        assert_eq!(recent[0].amount, Some(2.0));

        assert!(wallet::deactivate_tracked_wallet(&pool, WALLET).await.unwrap());
        assert!(wallet::list_tracked_wallets(&pool, true).await.unwrap().is_empty());
        assert_eq!(wallet::list_tracked_wallets(&pool, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn latest_balance_wins_within_a_slot() {
        let pool = memory_store().await;
        for number in [10, 20] {
            slot::upsert_slot(&pool, &test_slot(number)).await.unwrap();
        }
        wallet::upsert_tracked_wallet(&pool, &NewTrackedWallet::new(WALLET)).await.unwrap();

        wallet::append_wallet_balance(&pool, &balance(None, 10, 1.0)).await.unwrap();
        wallet::append_wallet_balance(&pool, &balance(None, 20, 2.0)).await.unwrap();
        wallet::append_wallet_balance(&pool, &balance(None, 20, 2.5)).await.unwrap();
        wallet::append_wallet_balance(&pool, &balance(Some(PROGRAM), 20, 99.0)).await.unwrap();

        let current = |mint: Option<&'static str>, slot: i64| {
            let pool = pool.clone();
            async move {
                wallet::current_wallet_balance(&pool, WALLET, mint, slot)
                    .await
                    .unwrap()
                    .map(|b| b.balance)
            }
        };

        assert_eq!(current(None, 20).await, Some(2.5));
        assert_eq!(current(None, 15).await, Some(1.0));
        assert_eq!(current(None, 5).await, None);
        assert_eq!(current(Some(PROGRAM), 25).await, Some(99.0));
        assert_eq!(current(Some(PROGRAM), 15).await, None);

        let orphan = NewWalletBalance {
            wallet_address: "untracked".to_string(),
            ..balance(None, 10, 1.0)
        };
        assert_constraint(wallet::append_wallet_balance(&pool, &orphan).await);
    }

    #[tokio::test]
    async fn labels_are_validated_and_listed() {
        let pool = memory_store().await;

        let mut program_label = NewLabel::user(ADDR1, "Token Program", AccountLabelType::Program);
        program_label.confidence = 1.5;
        assert_constraint(label::add_account_label(&pool, &program_label).await);

        program_label.confidence = 0.9;
        program_label.source = LabelSource::System;
        label::add_account_label(&pool, &program_label).await.unwrap();
        label::add_account_label(&pool, &NewLabel::user(ADDR1, "SPL", AccountLabelType::Token))
            .await
            .unwrap();
        label::add_wallet_label(&pool, &NewLabel::user(WALLET, "Binance", WalletLabelType::Exchange))
            .await
            .unwrap();

        let labels = label::account_labels_for(&pool, ADDR1).await.unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].label_type, AccountLabelType::Program);
        assert_eq!(labels[0].source, LabelSource::System);
        assert_eq!(labels[0].confidence, 0.9);
        assert_eq!(labels[1].source, LabelSource::User);

        let wallet_labels = label::wallet_labels_for(&pool, WALLET).await.unwrap();
        assert_eq!(wallet_labels.len(), 1);
        assert_eq!(wallet_labels[0].label_type, WalletLabelType::Exchange);
        assert!(label::wallet_labels_for(&pool, ADDR1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn table_counts_follow_writes() {
        let pool = memory_store().await;
        slot::upsert_slot(&pool, &test_slot(1)).await.unwrap();
        slot::upsert_slot(&pool, &test_slot(2)).await.unwrap();
        track(&pool, ADDR1).await;

        let counts = stats::table_counts(&pool).await.unwrap();
        let rows = |table: &str| counts.iter().find(|c| c.table == table).map(|c| c.rows);
        assert_eq!(rows("slots"), Some(2));
        assert_eq!(rows("tracked_accounts"), Some(1));
        assert_eq!(rows("schema_migrations"), None);
    }
}
