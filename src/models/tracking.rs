use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{string_enum, StringList};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TrackedAccount {
    pub id: i64,
    pub address: String,
    pub name: Option<String>,
    pub program_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
    pub activity_count: i64,
    pub balance_threshold: Option<i64>,
    pub data_size_threshold: Option<i64>,
    #[sqlx(try_from = "String")]
    pub tags: StringList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrackedAccount {
    pub address: String,
    pub name: Option<String>,
    pub program_id: Option<String>,
    pub is_active: bool,
    pub balance_threshold: Option<i64>,
    pub data_size_threshold: Option<i64>,
    pub tags: StringList,
}

impl NewTrackedAccount {
    /// An active entry with nothing but its address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            is_active: true,
            ..Self::default()
        }
    }
}

string_enum! {
    AccountActivityType, "account activity type" {
        BalanceChange => "BALANCE_CHANGE",
        DataChange => "DATA_CHANGE",
        OwnerChange => "OWNER_CHANGE",
        ExecutableChange => "EXECUTABLE_CHANGE",
        RentEpochChange => "RENT_EPOCH_CHANGE",
        ProgramInteraction => "PROGRAM_INTERACTION",
        Unknown => "UNKNOWN",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AccountActivity {
    pub id: i64,
    pub account_address: String,
    #[sqlx(try_from = "String")]
    pub activity_type: AccountActivityType,
    pub change_type: String,
    pub old_value: String,
    pub new_value: String,
    pub timestamp: DateTime<Utc>,
    pub block_slot: i64,
    pub lamports_change: i64,
    pub data_size_change: i64,
    pub transaction_signature: Option<String>,
    pub program_id: Option<String>,
    pub instruction_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccountActivity {
    pub account_address: String,
    pub activity_type: AccountActivityType,
    pub change_type: String,
    pub old_value: String,
    pub new_value: String,
    pub timestamp: DateTime<Utc>,
    pub block_slot: i64,
    pub lamports_change: i64,
    pub data_size_change: i64,
    pub transaction_signature: Option<String>,
    pub program_id: Option<String>,
    pub instruction_type: Option<String>,
}

impl NewAccountActivity {
    /// The delta `new_value - old_value` must match, when both values are numeric.
    pub fn expected_delta(&self) -> Option<i64> {
        match self.activity_type {
            AccountActivityType::BalanceChange => Some(self.lamports_change),
            AccountActivityType::DataChange => Some(self.data_size_change),
            _ => None,
        }
    }

    /// `Err` carries a description of the mismatch.
    pub fn check_delta(&self) -> Result<(), String> {
        let Some(expected) = self.expected_delta() else {
            return Ok(());
        };
        let (Ok(old), Ok(new)) = (self.old_value.trim().parse::<i64>(), self.new_value.trim().parse::<i64>()) else {
            return Ok(());
        };

        match new.checked_sub(old) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(format!(
                "{} reports a change of {} but {} -> {} is {}",
                self.activity_type, expected, old, new, actual
            )),
            None => Err(format!("{} -> {} overflows", old, new)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AccountSnapshot {
    pub id: i64,
    pub account_address: String,
    pub lamports: i64,
    pub data_size: i64,
    pub owner: String,
    pub executable: bool,
    pub rent_epoch: i64,
    pub timestamp: DateTime<Utc>,
    pub slot: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccountSnapshot {
    pub account_address: String,
    pub lamports: i64,
    pub data_size: i64,
    pub owner: String,
    pub executable: bool,
    pub rent_epoch: i64,
    pub timestamp: DateTime<Utc>,
    pub slot: i64,
}
