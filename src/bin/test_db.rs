// Smoke run against whatever DATABASE_URL points at.
// Useful for checking the MySQL and PostgreSQL paths by hand.

use chain_store::config::Config;
use chain_store::db::{self, slot, tracking, transaction, wallet};
use chain_store::models::{
    AccountActivityType, NewAccountActivity, NewTrackedAccount, NewTrackedWallet, NewWalletActivity,
    NewWalletBalance, Slot, StringList, TimeRange, Transaction, TransactionStatus, WalletActivityType,
};
use chain_store::StoreError;
use chrono::Utc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    println!("Establishing {} connection...", config.database.backend);
    let pool = db::establish_connection(&config.database).await?;
    println!("✅ Database connection established and schema current!");

    let now = Utc::now();
    let slot_number = now.timestamp();
    let signature = format!("smoke_sig_{}", slot_number);
    let account = format!("smoke_account_{}", slot_number);
    let wallet_address = format!("smoke_wallet_{}", slot_number);

    slot::upsert_slot(
        &pool,
        &Slot {
            slot: slot_number,
            blockhash: format!("smoke_hash_{}", slot_number),
            parent_slot: slot_number - 1,
            finalized: false,
            timestamp: now,
        },
    )
    .await?;
    println!("✅ Slot {} stored", slot_number);

    transaction::upsert_transaction(
        &pool,
        &Transaction {
            signature: signature.clone(),
            slot: slot_number,
            fee: 5000,
            status: TransactionStatus::Success,
            program_ids: StringList(vec!["smoke_program".to_string()]),
            timestamp: now,
        },
    )
    .await?;
    println!("✅ Transaction {} stored", signature);

    match transaction::transactions_containing_program(&pool, "smoke_program").await {
        Ok(found) => println!("✅ Containment query found {} transaction(s)", found.len()),
        Err(StoreError::TypeMappingGap { .. }) => println!("Containment query not available on this backend"),
        Err(e) => return Err(e.into()),
    }

    tracking::upsert_tracked_account(&pool, &NewTrackedAccount::new(&account)).await?;
    tracking::append_account_activity(
        &pool,
        &NewAccountActivity {
            account_address: account.clone(),
            activity_type: AccountActivityType::BalanceChange,
            change_type: "lamports".to_string(),
            old_value: "1000".to_string(),
            new_value: "1500".to_string(),
            timestamp: now,
            block_slot: slot_number,
            lamports_change: 500,
            data_size_change: 0,
            transaction_signature: Some(signature.clone()),
            program_id: None,
            instruction_type: None,
        },
    )
    .await?;
    let tracked = tracking::get_tracked_account(&pool, &account).await?;
    println!(
        "✅ Account activity recorded, count = {}",
        tracked.map(|t| t.activity_count).unwrap_or_default()
    );

    wallet::upsert_tracked_wallet(&pool, &NewTrackedWallet::new(&wallet_address)).await?;
    wallet::append_wallet_activity(
        &pool,
        &NewWalletActivity {
            wallet_address: wallet_address.clone(),
            activity_type: WalletActivityType::Receive,
            transaction_signature: signature.clone(),
            amount: Some(1.5),
            token_symbol: Some("SOL".to_string()),
            counterparty: None,
            timestamp: now,
            block_slot: slot_number,
            fee: 5000,
            status: TransactionStatus::Success,
            details: None,
        },
    )
    .await?;
    wallet::append_wallet_balance(
        &pool,
        &NewWalletBalance {
            wallet_address: wallet_address.clone(),
            token_mint: None,
            token_symbol: Some("SOL".to_string()),
            balance: 1.5,
            slot: slot_number,
            timestamp: now,
        },
    )
    .await?;

    let activities =
        wallet::query_wallet_activities(&pool, &wallet_address, TimeRange::until(Utc::now() + chrono::Duration::seconds(1)))
            .await?;
    let balance = wallet::current_wallet_balance(&pool, &wallet_address, None, slot_number).await?;
    println!(
        "✅ Wallet has {} activity row(s), balance {:?}",
        activities.len(),
        balance.map(|b| b.balance)
    );

    println!("All smoke checks completed successfully!");
    Ok(())
}
