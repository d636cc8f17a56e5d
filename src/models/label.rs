use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::string_enum;

string_enum! {
    AccountLabelType, "account label type" {
        Program => "program",
        Token => "token",
        Nft => "nft",
        Dex => "dex",
        Defi => "defi",
        Gaming => "gaming",
        Custom => "custom",
    }
}

string_enum! {
    WalletLabelType, "wallet label type" {
        Exchange => "exchange",
        Dex => "dex",
        Defi => "defi",
        Nft => "nft",
        Gaming => "gaming",
        Custom => "custom",
    }
}

string_enum! {
    LabelSource, "label source" {
        User => "user",
        System => "system",
        Api => "api",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AccountLabel {
    pub id: i64,
    pub address: String,
    pub label: String,
    #[sqlx(try_from = "String")]
    pub label_type: AccountLabelType,
    #[sqlx(try_from = "String")]
    pub source: LabelSource,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WalletLabel {
    pub id: i64,
    pub address: String,
    pub label: String,
    #[sqlx(try_from = "String")]
    pub label_type: WalletLabelType,
    #[sqlx(try_from = "String")]
    pub source: LabelSource,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Input for either label table; `T` is the table's closed label type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLabel<T> {
    pub address: String,
    pub label: String,
    pub label_type: T,
    pub source: LabelSource,
    pub confidence: f64,
}

impl<T> NewLabel<T> {
    /// A user-sourced label with full confidence.
    pub fn user(address: impl Into<String>, label: impl Into<String>, label_type: T) -> Self {
        Self {
            address: address.into(),
            label: label.into(),
            label_type,
            source: LabelSource::User,
            confidence: 1.0,
        }
    }

    pub fn confidence_in_range(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence)
    }
}
