//! The canonical relational model, declared once for every backend.

use super::types::{ColumnType, DefaultValue, TextRole};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            default: None,
        }
    }

    pub const fn nullable(self) -> Self {
        Self { nullable: true, ..self }
    }

    pub const fn default(self, value: DefaultValue) -> Self {
        Self {
            default: Some(value),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub table: &'static str,
    pub references: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Ordinary ordered index, available everywhere.
    BTree,
    /// Inverted index over a JSON column for containment lookups.
    Containment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub kind: IndexKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// Empty when the table is keyed by a surrogate column.
    pub primary_key: &'static [&'static str],
    pub unique: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKey],
    pub indexes: &'static [Index],
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}

const ID: ColumnType = ColumnType::Text(TextRole::Identifier);
const LABEL: ColumnType = ColumnType::Text(TextRole::Label);
const BODY: ColumnType = ColumnType::Text(TextRole::Body);
const INSTANT: ColumnType = ColumnType::Instant { auto_refresh: false };
const REFRESHED: ColumnType = ColumnType::Instant { auto_refresh: true };

const fn btree(name: &'static str, columns: &'static [&'static str]) -> Index {
    Index {
        name,
        columns,
        kind: IndexKind::BTree,
    }
}

const fn containment(name: &'static str, column: &'static [&'static str]) -> Index {
    Index {
        name,
        columns: column,
        kind: IndexKind::Containment,
    }
}

const fn fk(column: &'static str, table: &'static str, references: &'static str) -> ForeignKey {
    ForeignKey {
        column,
        table,
        references,
    }
}

pub const SCHEMA_MIGRATIONS: Table = Table {
    name: "schema_migrations",
    columns: &[
        Column::new("version", ColumnType::BigInt),
        Column::new("name", LABEL),
        Column::new("backend", LABEL),
        Column::new("checksum", LABEL),
        Column::new("applied_at", INSTANT),
    ],
    primary_key: &["version"],
    unique: &[],
    foreign_keys: &[],
    indexes: &[],
};

pub const SLOTS: Table = Table {
    name: "slots",
    columns: &[
        Column::new("slot", ColumnType::BigInt),
        Column::new("blockhash", ID),
        Column::new("parent_slot", ColumnType::BigInt),
        Column::new("finalized", ColumnType::Bool).default(DefaultValue::Bool(false)),
        Column::new("timestamp", INSTANT),
    ],
    primary_key: &["slot"],
    unique: &[],
    foreign_keys: &[],
    indexes: &[
        btree("idx_slots_parent_slot", &["parent_slot"]),
        btree("idx_slots_finalized", &["finalized"]),
        btree("idx_slots_timestamp", &["timestamp"]),
    ],
};

pub const TRANSACTIONS: Table = Table {
    name: "transactions",
    columns: &[
        Column::new("signature", ID),
        Column::new("slot", ColumnType::BigInt),
        Column::new("fee", ColumnType::BigInt).default(DefaultValue::Int(0)),
        Column::new("status", LABEL),
        Column::new("program_ids", ColumnType::Json),
        Column::new("timestamp", INSTANT),
    ],
    primary_key: &["signature"],
    unique: &[],
    foreign_keys: &[fk("slot", "slots", "slot")],
    indexes: &[
        btree("idx_transactions_slot", &["slot"]),
        btree("idx_transactions_timestamp", &["timestamp"]),
        btree("idx_transactions_status", &["status"]),
        containment("idx_transactions_program_ids", &["program_ids"]),
    ],
};

pub const SLOT_LEADERS: Table = Table {
    name: "slot_leaders",
    columns: &[
        Column::new("slot", ColumnType::BigInt),
        Column::new("leader_pubkey", ID),
        Column::new("validator_name", LABEL).nullable(),
    ],
    primary_key: &["slot"],
    unique: &[],
    foreign_keys: &[fk("slot", "slots", "slot")],
    indexes: &[btree("idx_slot_leaders_leader", &["leader_pubkey"])],
};

pub const ACCOUNTS: Table = Table {
    name: "accounts",
    columns: &[
        Column::new("address", ID),
        Column::new("lamports", ColumnType::BigInt),
        Column::new("owner", ID),
        Column::new("executable", ColumnType::Bool).default(DefaultValue::Bool(false)),
        Column::new("slot", ColumnType::BigInt),
        Column::new("data_size", ColumnType::BigInt).default(DefaultValue::Int(0)),
        Column::new("updated_at", REFRESHED),
        Column::new("created_at", INSTANT),
    ],
    primary_key: &["address"],
    unique: &[],
    foreign_keys: &[fk("slot", "slots", "slot")],
    indexes: &[
        btree("idx_accounts_owner", &["owner"]),
        btree("idx_accounts_slot", &["slot"]),
    ],
};

pub const TRACKED_ACCOUNTS: Table = Table {
    name: "tracked_accounts",
    columns: &[
        Column::new("id", ColumnType::Surrogate),
        Column::new("address", ID),
        Column::new("name", LABEL).nullable(),
        Column::new("program_id", ID).nullable(),
        Column::new("is_active", ColumnType::Bool).default(DefaultValue::Bool(true)),
        Column::new("created_at", INSTANT),
        Column::new("last_activity", INSTANT).nullable(),
        Column::new("activity_count", ColumnType::BigInt).default(DefaultValue::Int(0)),
        Column::new("balance_threshold", ColumnType::BigInt).nullable(),
        Column::new("data_size_threshold", ColumnType::BigInt).nullable(),
        Column::new("tags", ColumnType::Json).default(DefaultValue::EmptyJsonArray),
    ],
    primary_key: &[],
    unique: &["address"],
    foreign_keys: &[],
    indexes: &[
        btree("idx_tracked_accounts_active", &["is_active"]),
        btree("idx_tracked_accounts_program", &["program_id"]),
        containment("idx_tracked_accounts_tags", &["tags"]),
    ],
};

pub const ACCOUNT_ACTIVITIES: Table = Table {
    name: "account_activities",
    columns: &[
        Column::new("id", ColumnType::Surrogate),
        Column::new("account_address", ID),
        Column::new("activity_type", LABEL),
        Column::new("change_type", LABEL),
        Column::new("old_value", BODY),
        Column::new("new_value", BODY),
        Column::new("timestamp", INSTANT),
        Column::new("block_slot", ColumnType::BigInt),
        Column::new("lamports_change", ColumnType::BigInt).default(DefaultValue::Int(0)),
        Column::new("data_size_change", ColumnType::BigInt).default(DefaultValue::Int(0)),
        Column::new("transaction_signature", ID).nullable(),
        Column::new("program_id", ID).nullable(),
        Column::new("instruction_type", LABEL).nullable(),
    ],
    primary_key: &[],
    unique: &[],
    foreign_keys: &[
        fk("account_address", "tracked_accounts", "address"),
        fk("block_slot", "slots", "slot"),
    ],
    indexes: &[
        btree("idx_account_activities_address_time", &["account_address", "timestamp"]),
        btree("idx_account_activities_slot", &["block_slot"]),
        btree("idx_account_activities_type", &["activity_type"]),
    ],
};

pub const ACCOUNT_SNAPSHOTS: Table = Table {
    name: "account_snapshots",
    columns: &[
        Column::new("id", ColumnType::Surrogate),
        Column::new("account_address", ID),
        Column::new("lamports", ColumnType::BigInt),
        Column::new("data_size", ColumnType::BigInt),
        Column::new("owner", ID),
        Column::new("executable", ColumnType::Bool).default(DefaultValue::Bool(false)),
        Column::new("rent_epoch", ColumnType::BigInt),
        Column::new("timestamp", INSTANT),
        Column::new("slot", ColumnType::BigInt),
    ],
    primary_key: &[],
    unique: &[],
    foreign_keys: &[
        fk("account_address", "tracked_accounts", "address"),
        fk("slot", "slots", "slot"),
    ],
    indexes: &[
        btree("idx_account_snapshots_address_slot", &["account_address", "slot"]),
        btree("idx_account_snapshots_timestamp", &["timestamp"]),
    ],
};

pub const ACCOUNT_LABELS: Table = Table {
    name: "account_labels",
    columns: &[
        Column::new("id", ColumnType::Surrogate),
        Column::new("address", ID),
        Column::new("label", LABEL),
        Column::new("label_type", LABEL),
        Column::new("source", LABEL).default(DefaultValue::Text("user")),
        Column::new("confidence", ColumnType::Real).default(DefaultValue::Real(1.0)),
        Column::new("created_at", INSTANT),
    ],
    primary_key: &[],
    unique: &[],
    foreign_keys: &[],
    indexes: &[
        btree("idx_account_labels_address", &["address"]),
        btree("idx_account_labels_type", &["label_type"]),
    ],
};

pub const TRACKED_WALLETS: Table = Table {
    name: "tracked_wallets",
    columns: &[
        Column::new("id", ColumnType::Surrogate),
        Column::new("address", ID),
        Column::new("name", LABEL).nullable(),
        Column::new("is_active", ColumnType::Bool).default(DefaultValue::Bool(true)),
        Column::new("created_at", INSTANT),
        Column::new("last_activity", INSTANT).nullable(),
        Column::new("activity_count", ColumnType::BigInt).default(DefaultValue::Int(0)),
        Column::new("balance_threshold", ColumnType::Real).nullable(),
        Column::new("tags", ColumnType::Json).default(DefaultValue::EmptyJsonArray),
    ],
    primary_key: &[],
    unique: &["address"],
    foreign_keys: &[],
    indexes: &[
        btree("idx_tracked_wallets_active", &["is_active"]),
        containment("idx_tracked_wallets_tags", &["tags"]),
    ],
};

pub const WALLET_ACTIVITIES: Table = Table {
    name: "wallet_activities",
    columns: &[
        Column::new("id", ColumnType::Surrogate),
        Column::new("wallet_address", ID),
        Column::new("activity_type", LABEL),
        Column::new("transaction_signature", ID),
        Column::new("amount", ColumnType::Real).nullable(),
        Column::new("token_symbol", LABEL).nullable(),
        Column::new("counterparty", ID).nullable(),
        Column::new("timestamp", INSTANT),
        Column::new("block_slot", ColumnType::BigInt),
        Column::new("fee", ColumnType::BigInt).default(DefaultValue::Int(0)),
        Column::new("status", LABEL),
        Column::new("details", BODY).nullable(),
    ],
    primary_key: &[],
    unique: &[],
    foreign_keys: &[
        fk("wallet_address", "tracked_wallets", "address"),
        fk("transaction_signature", "transactions", "signature"),
        fk("block_slot", "slots", "slot"),
    ],
    indexes: &[
        btree("idx_wallet_activities_address_time", &["wallet_address", "timestamp"]),
        btree("idx_wallet_activities_signature", &["transaction_signature"]),
        btree("idx_wallet_activities_slot", &["block_slot"]),
    ],
};

pub const WALLET_BALANCES: Table = Table {
    name: "wallet_balances",
    columns: &[
        Column::new("id", ColumnType::Surrogate),
        Column::new("wallet_address", ID),
        Column::new("token_mint", ID).nullable(),
        Column::new("token_symbol", LABEL).nullable(),
        Column::new("balance", ColumnType::Real),
        Column::new("slot", ColumnType::BigInt),
        Column::new("timestamp", INSTANT),
    ],
    primary_key: &[],
    unique: &[],
    foreign_keys: &[
        fk("wallet_address", "tracked_wallets", "address"),
        fk("slot", "slots", "slot"),
    ],
    indexes: &[btree(
        "idx_wallet_balances_wallet_mint_slot",
        &["wallet_address", "token_mint", "slot"],
    )],
};

pub const WALLET_LABELS: Table = Table {
    name: "wallet_labels",
    columns: &[
        Column::new("id", ColumnType::Surrogate),
        Column::new("address", ID),
        Column::new("label", LABEL),
        Column::new("label_type", LABEL),
        Column::new("source", LABEL).default(DefaultValue::Text("user")),
        Column::new("confidence", ColumnType::Real).default(DefaultValue::Real(1.0)),
        Column::new("created_at", INSTANT),
    ],
    primary_key: &[],
    unique: &[],
    foreign_keys: &[],
    indexes: &[
        btree("idx_wallet_labels_address", &["address"]),
        btree("idx_wallet_labels_type", &["label_type"]),
    ],
};

/// Every table in creation order. The ledger comes first.
pub const TABLES: &[Table] = &[
    SCHEMA_MIGRATIONS,
    SLOTS,
    TRANSACTIONS,
    SLOT_LEADERS,
    ACCOUNTS,
    TRACKED_ACCOUNTS,
    ACCOUNT_ACTIVITIES,
    ACCOUNT_SNAPSHOTS,
    ACCOUNT_LABELS,
    TRACKED_WALLETS,
    WALLET_ACTIVITIES,
    WALLET_BALANCES,
    WALLET_LABELS,
];

/// The twelve entity tables, excluding the migration ledger.
pub fn entity_tables() -> impl Iterator<Item = &'static Table> {
    TABLES.iter().filter(|t| t.name != SCHEMA_MIGRATIONS.name)
}

pub fn table(name: &str) -> Option<&'static Table> {
    TABLES.iter().find(|t| t.name == name)
}
