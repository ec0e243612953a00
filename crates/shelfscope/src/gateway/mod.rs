//! SELECT-only access to the catalog store.

pub mod guardrail;

use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use serde_json::{Map, Value, json};

pub use guardrail::{SqlGuardrailViolation, validate_read_only_sql};

pub const DEFAULT_ROW_CAP: usize = 10_000;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub type Row = Map<String, Value>;

/// Tabular result of one SELECT, rows in the order the store returned them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub truncated: bool,
}

impl QueryRows {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    Rejected(SqlGuardrailViolation),
    Unavailable { target: String, cause: String },
    Execution { cause: String },
}

impl GatewayError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "sql_guardrail_violation",
            Self::Unavailable { .. } => "catalog_unavailable",
            Self::Execution { .. } => "query_execution_failed",
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Rejected(violation) => violation.message.clone(),
            Self::Unavailable { target, .. } => format!("unable to open catalog: {target}"),
            Self::Execution { .. } => "query execution failed".to_string(),
        }
    }

    #[must_use]
    pub fn details(&self) -> Value {
        match self {
            Self::Rejected(violation) => violation.details.clone(),
            Self::Unavailable { target, cause } => json!({ "target": target, "cause": cause }),
            Self::Execution { cause } => json!({ "cause": cause }),
        }
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(violation) => write!(f, "{}: {}", self.code(), violation.message),
            Self::Unavailable { target, cause } => {
                write!(f, "{}: {target}: {cause}", self.code())
            }
            Self::Execution { cause } => write!(f, "{}: {cause}", self.code()),
        }
    }
}

impl std::error::Error for GatewayError {}

pub trait QueryGateway {
    /// Executes one read-only statement. Implementations must refuse
    /// anything other than a SELECT.
    fn execute_select(&self, sql: &str) -> Result<QueryRows, GatewayError>;
}

impl<G: QueryGateway + ?Sized> QueryGateway for &G {
    fn execute_select(&self, sql: &str) -> Result<QueryRows, GatewayError> {
        (**self).execute_select(sql)
    }
}

/// Gateway over a SQLite catalog file opened with read-only flags.
#[derive(Debug)]
pub struct SqliteGateway {
    connection: Connection,
    row_cap: usize,
}

impl SqliteGateway {
    pub fn open(path: &Path) -> Result<Self, GatewayError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let connection = Connection::open_with_flags(path, flags).map_err(|error| {
            GatewayError::Unavailable {
                target: path.display().to_string(),
                cause: error.to_string(),
            }
        })?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(|error| GatewayError::Unavailable {
                target: path.display().to_string(),
                cause: error.to_string(),
            })?;

        Ok(Self {
            connection,
            row_cap: DEFAULT_ROW_CAP,
        })
    }

    /// Wraps an existing connection; the guardrail still applies.
    #[must_use]
    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection,
            row_cap: DEFAULT_ROW_CAP,
        }
    }

    #[must_use]
    pub fn with_row_cap(mut self, row_cap: usize) -> Self {
        self.row_cap = row_cap.max(1);
        self
    }

}

impl QueryGateway for SqliteGateway {
    fn execute_select(&self, sql: &str) -> Result<QueryRows, GatewayError> {
        validate_read_only_sql(sql).map_err(GatewayError::Rejected)?;
        let statement_sql = guardrail::strip_trailing_semicolons(sql);

        let mut statement =
            self.connection
                .prepare(statement_sql)
                .map_err(|error| GatewayError::Execution {
                    cause: format!("failed to prepare query: {error}"),
                })?;
        if !statement.readonly() {
            return Err(GatewayError::Rejected(SqlGuardrailViolation {
                message: "Statement is not read-only".to_string(),
                details: json!({
                    "guardrail": guardrail::GUARDRAIL_NAME,
                    "violation": {"reason":"engine_reported_write"}
                }),
            }));
        }

        let columns = statement
            .column_names()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let mut rows = statement.query([]).map_err(|error| GatewayError::Execution {
            cause: format!("failed to execute query: {error}"),
        })?;

        let mut result_rows = Vec::new();
        let mut truncated = false;
        while let Some(row) = rows.next().map_err(|error| GatewayError::Execution {
            cause: format!("failed to fetch query row: {error}"),
        })? {
            if result_rows.len() >= self.row_cap {
                truncated = true;
                break;
            }

            let mut record = Row::new();
            for (index, column_name) in columns.iter().enumerate() {
                let value =
                    row.get::<usize, SqlValue>(index)
                        .map_err(|error| GatewayError::Execution {
                            cause: format!("failed to decode query column: {error}"),
                        })?;
                record.insert(column_name.clone(), json_value_from_sql(value));
            }
            result_rows.push(record);
        }

        Ok(QueryRows {
            columns,
            rows: result_rows,
            truncated,
        })
    }
}

fn json_value_from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(value) => json!(value),
        SqlValue::Real(value) => json!(value),
        SqlValue::Text(value) => json!(value),
        SqlValue::Blob(value) => json!(encode_blob_hex(&value)),
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}
