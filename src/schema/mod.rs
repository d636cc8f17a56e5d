pub mod backend;
pub mod ddl;
pub mod model;
pub mod types;

pub use backend::{Assignment, Backend, BackendCapabilities};
pub use ddl::{RenderedColumn, Statement};
pub use model::{Column, Table, TABLES};
pub use types::{ColumnType, DefaultValue, TextRole};
