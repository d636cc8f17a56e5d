use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{string_enum, StringList};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Slot {
    pub slot: i64,
    pub blockhash: String,
    pub parent_slot: i64,
    pub finalized: bool,
    pub timestamp: DateTime<Utc>,
}

string_enum! {
    TransactionStatus, "transaction status" {
        Success => "success",
        Failed => "failed",
        Pending => "pending",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub signature: String,
    pub slot: i64,
    pub fee: i64,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    #[sqlx(try_from = "String")]
    pub program_ids: StringList,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SlotLeader {
    pub slot: i64,
    pub leader_pubkey: String,
    pub validator_name: Option<String>,
}

/// Latest known on-chain state of an address. `slot` is the slot the state was observed as of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AccountState {
    pub address: String,
    pub lamports: i64,
    pub owner: String,
    pub executable: bool,
    pub slot: i64,
    pub data_size: i64,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Input for an account upsert; the store maintains the timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStateUpdate {
    pub address: String,
    pub lamports: i64,
    pub owner: String,
    pub executable: bool,
    pub slot: i64,
    pub data_size: i64,
}
