//! Renders the canonical model into backend-specific DDL.

use super::backend::Backend;
use super::model::{Index, IndexKind, Table};
use super::types::ColumnType;

/// One executable schema statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    CreateTable {
        table: &'static str,
        sql: String,
    },
    CreateIndex {
        table: &'static str,
        index: &'static str,
        sql: String,
        /// The statement is not conditional; check for the index before running it.
        guarded: bool,
    },
}

impl Statement {
    pub fn sql(&self) -> &str {
        match self {
            Statement::CreateTable { sql, .. } | Statement::CreateIndex { sql, .. } => sql,
        }
    }
}

/// A column as a backend sees it: canonical name and nullability, native type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedColumn {
    pub name: &'static str,
    pub native_type: &'static str,
    pub nullable: bool,
    pub definition: String,
}

pub fn render_columns(table: &Table, backend: Backend) -> Vec<RenderedColumn> {
    table
        .columns
        .iter()
        .map(|column| {
            let native_type = column.ty.native(backend);
            let mut definition = format!("{} {}", column.name, native_type);

            if column.ty != ColumnType::Surrogate {
                if !column.nullable {
                    definition.push_str(" NOT NULL");
                }
                if let Some(clause) = column.ty.managed_clause(backend) {
                    definition.push(' ');
                    definition.push_str(clause);
                } else if let Some(default) = column.default {
                    definition.push(' ');
                    definition.push_str(&default.render(backend));
                }
            }

            RenderedColumn {
                name: column.name,
                native_type,
                nullable: column.nullable,
                definition,
            }
        })
        .collect()
}

pub fn create_table(table: &Table, backend: Backend) -> Statement {
    let mut parts: Vec<String> = render_columns(table, backend)
        .into_iter()
        .map(|c| c.definition)
        .collect();

    if !table.primary_key.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", table.primary_key.join(", ")));
    }
    for column in table.unique {
        parts.push(format!("UNIQUE ({})", column));
    }
    for fk in table.foreign_keys {
        parts.push(format!(
            "FOREIGN KEY ({}) REFERENCES {}({})",
            fk.column, fk.table, fk.references
        ));
    }

    let body = parts.join(",\n    ");
    let suffix = match backend {
        Backend::MySql => " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        _ => "",
    };

    Statement::CreateTable {
        table: table.name,
        sql: format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n){}",
            table.name, body, suffix
        ),
    }
}

/// `None` when the backend has no structure for this kind of index.
pub fn create_index(table: &Table, index: &Index, backend: Backend) -> Option<Statement> {
    let caps = backend.capabilities();
    let conditional = if caps.conditional_index { "IF NOT EXISTS " } else { "" };

    let sql = match index.kind {
        IndexKind::BTree => format!(
            "CREATE INDEX {}{} ON {} ({})",
            conditional,
            index.name,
            table.name,
            index.columns.join(", ")
        ),
        IndexKind::Containment if caps.json_containment => format!(
            "CREATE INDEX {}{} ON {} USING GIN ({})",
            conditional,
            index.name,
            table.name,
            index.columns.join(", ")
        ),
        IndexKind::Containment => return None,
    };

    Some(Statement::CreateIndex {
        table: table.name,
        index: index.name,
        sql,
        guarded: !caps.conditional_index,
    })
}

/// Table plus its ordinary indexes. Containment indexes are rendered separately.
pub fn table_statements(table: &Table, backend: Backend) -> Vec<Statement> {
    let mut statements = vec![create_table(table, backend)];
    statements.extend(
        table
            .indexes
            .iter()
            .filter(|i| i.kind == IndexKind::BTree)
            .filter_map(|i| create_index(table, i, backend)),
    );
    statements
}

pub fn containment_statements(tables: &[Table], backend: Backend) -> Vec<Statement> {
    tables
        .iter()
        .flat_map(|t| {
            t.indexes
                .iter()
                .filter(|i| i.kind == IndexKind::Containment)
                .filter_map(move |i| create_index(t, i, backend))
        })
        .collect()
}
