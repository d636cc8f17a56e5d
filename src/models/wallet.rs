use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{string_enum, StringList, TransactionStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TrackedWallet {
    pub id: i64,
    pub address: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
    pub activity_count: i64,
    pub balance_threshold: Option<f64>,
    #[sqlx(try_from = "String")]
    pub tags: StringList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTrackedWallet {
    pub address: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub balance_threshold: Option<f64>,
    pub tags: StringList,
}

impl NewTrackedWallet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            is_active: true,
            ..Self::default()
        }
    }
}

string_enum! {
    WalletActivityType, "wallet activity type" {
        Send => "SEND",
        Receive => "RECEIVE",
        Swap => "SWAP",
        Buy => "BUY",
        Sell => "SELL",
        Stake => "STAKE",
        Unstake => "UNSTAKE",
        Unknown => "UNKNOWN",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WalletActivity {
    pub id: i64,
    pub wallet_address: String,
    #[sqlx(try_from = "String")]
    pub activity_type: WalletActivityType,
    pub transaction_signature: String,
    pub amount: Option<f64>,
    pub token_symbol: Option<String>,
    pub counterparty: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub block_slot: i64,
    pub fee: i64,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWalletActivity {
    pub wallet_address: String,
    pub activity_type: WalletActivityType,
    pub transaction_signature: String,
    pub amount: Option<f64>,
    pub token_symbol: Option<String>,
    pub counterparty: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub block_slot: i64,
    pub fee: i64,
    pub status: TransactionStatus,
    pub details: Option<String>,
}

/// A balance observation. `token_mint == None` is the base-currency balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WalletBalance {
    pub id: i64,
    pub wallet_address: String,
    pub token_mint: Option<String>,
    pub token_symbol: Option<String>,
    pub balance: f64,
    pub slot: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWalletBalance {
    pub wallet_address: String,
    pub token_mint: Option<String>,
    pub token_symbol: Option<String>,
    pub balance: f64,
    pub slot: i64,
    pub timestamp: DateTime<Utc>,
}
