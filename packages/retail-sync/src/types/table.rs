//! Target relation descriptions and record-to-row mapping.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use super::record::{lenient_i64, Record};
use crate::error::{LoadError, LoaderResult};

/// Column source that maps the whole record into a JSON column.
pub const WHOLE_RECORD: &str = "$";

/// Storage kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Boolean,
    Numeric,
    BigInt,
    Json,
}

impl ColumnKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Boolean => "BOOLEAN",
            ColumnKind::Numeric => "NUMERIC",
            ColumnKind::BigInt => "BIGINT",
            ColumnKind::Json => "JSONB",
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Numeric => "number",
            ColumnKind::BigInt => "integer",
            ColumnKind::Json => "json",
        }
    }
}

/// Value used when the source field is absent or null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    Null,
    Bool(bool),
    Zero,
    Text(&'static str),
    EmptyObject,
    EmptyArray,
    /// The tenant id of the run.
    Tenant,
}

impl ColumnDefault {
    fn value(&self, tenant: &str) -> Option<Value> {
        match self {
            ColumnDefault::Null => None,
            ColumnDefault::Bool(b) => Some(Value::Bool(*b)),
            ColumnDefault::Zero => Some(Value::from(0)),
            ColumnDefault::Text(s) => Some(Value::from(*s)),
            ColumnDefault::EmptyObject => Some(Value::Object(Map::new())),
            ColumnDefault::EmptyArray => Some(Value::Array(Vec::new())),
            ColumnDefault::Tenant => Some(Value::from(tenant)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    /// Record field feeding this column, or [`WHOLE_RECORD`].
    pub source: &'static str,
    pub kind: ColumnKind,
    /// Overwritten when an existing row is loaded again.
    pub mutable: bool,
    pub default: ColumnDefault,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            source: name,
            kind,
            mutable: false,
            default: ColumnDefault::Null,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Boolean)
    }

    pub const fn numeric(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Numeric)
    }

    pub const fn bigint(name: &'static str) -> Self {
        Self::new(name, ColumnKind::BigInt)
    }

    pub const fn json(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Json)
    }

    pub const fn mutable(mut self) -> Self {
        self.mutable = true;
        self
    }

    pub const fn or(mut self, default: ColumnDefault) -> Self {
        self.default = default;
        self
    }

    pub const fn from_field(mut self, source: &'static str) -> Self {
        self.source = source;
        self
    }
}

/// A column holding ids of another resource's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignRef {
    pub column: &'static str,
    /// Referenced resource; its table carries the same name.
    pub resource: &'static str,
    /// Primary key column of the referenced table.
    pub key: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [ColumnSpec],
    pub references: &'static [ForeignRef],
}

/// A column value ready to bind.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Bool(Option<bool>),
    Numeric(Option<Decimal>),
    BigInt(Option<i64>),
    Json(Option<Value>),
}

impl SqlValue {
    fn null(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Text => SqlValue::Text(None),
            ColumnKind::Boolean => SqlValue::Bool(None),
            ColumnKind::Numeric => SqlValue::Numeric(None),
            ColumnKind::BigInt => SqlValue::BigInt(None),
            ColumnKind::Json => SqlValue::Json(None),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(
            self,
            SqlValue::Text(None)
                | SqlValue::Bool(None)
                | SqlValue::Numeric(None)
                | SqlValue::BigInt(None)
                | SqlValue::Json(None)
        )
    }

    /// Text form of the value, as used for reference checks.
    pub fn as_key(&self) -> Option<String> {
        match self {
            SqlValue::Text(Some(s)) => Some(s.clone()),
            SqlValue::BigInt(Some(n)) => Some(n.to_string()),
            SqlValue::Numeric(Some(d)) => Some(d.to_string()),
            _ => None,
        }
    }
}

/// One mapped record: its key plus one value per column, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: String,
    pub values: Vec<SqlValue>,
}

impl TableSpec {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn mutable_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns
            .iter()
            .filter(|c| c.mutable && c.name != self.primary_key)
    }

    /// Map a record onto this table's columns.
    pub fn row(
        &self,
        resource: &str,
        key_field: &str,
        record: &Record,
        tenant: &str,
    ) -> LoaderResult<Row> {
        let key = record
            .primary_key(key_field)
            .ok_or_else(|| LoadError::MissingPrimaryKey {
                resource: resource.to_string(),
                field: key_field.to_string(),
            })?;

        let mut values = Vec::with_capacity(self.columns.len());
        for column in self.columns {
            let raw = if column.source == WHOLE_RECORD {
                Some(Value::from(record.clone()))
            } else {
                record.field(column.source).filter(|v| !v.is_null())
            };
            let value = match raw.or_else(|| column.default.value(tenant)) {
                Some(v) => coerce(column.kind, v).map_err(|found| LoadError::Coercion {
                    resource: resource.to_string(),
                    record_id: key.clone(),
                    column: column.name.to_string(),
                    expected: column.kind.expected(),
                    found,
                })?,
                None => SqlValue::null(column.kind),
            };
            values.push(value);
        }

        Ok(Row { key, values })
    }

    /// `CREATE TABLE IF NOT EXISTS` plus one index per reference column.
    pub fn ddl(&self) -> Vec<String> {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let mut line = format!("{} {}", quote_ident(c.name), c.kind.sql_type());
                if c.name == self.primary_key {
                    line.push_str(" PRIMARY KEY");
                }
                line
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(self.name),
            columns
        )];
        for reference in self.references {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_ident(&format!("{}_{}_idx", self.name, reference.column)),
                quote_ident(self.name),
                quote_ident(reference.column)
            ));
        }
        statements
    }
}

/// Double-quote an identifier; source field names like `default` and `from` are reserved words.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn coerce(kind: ColumnKind, value: Value) -> Result<SqlValue, String> {
    let coerced = match (kind, &value) {
        (ColumnKind::Json, _) => return Ok(SqlValue::Json(Some(value))),

        (ColumnKind::Text, Value::String(s)) => Some(SqlValue::Text(Some(s.clone()))),
        (ColumnKind::Text, Value::Number(n)) => Some(SqlValue::Text(Some(n.to_string()))),
        (ColumnKind::Text, Value::Bool(b)) => Some(SqlValue::Text(Some(b.to_string()))),

        (ColumnKind::Boolean, Value::Bool(b)) => Some(SqlValue::Bool(Some(*b))),
        (ColumnKind::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(SqlValue::Bool(Some(false))),
            Some(1) => Some(SqlValue::Bool(Some(true))),
            _ => None,
        },
        (ColumnKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(SqlValue::Bool(Some(true))),
            "false" | "0" => Some(SqlValue::Bool(Some(false))),
            _ => None,
        },

        (ColumnKind::Numeric, Value::Number(n)) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(Decimal::from_f64))
            .map(|d| SqlValue::Numeric(Some(d))),
        (ColumnKind::Numeric, Value::String(s)) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
                .map(|d| SqlValue::Numeric(Some(d)))
        }

        (ColumnKind::BigInt, Value::Number(_) | Value::String(_)) => {
            lenient_i64(&value).map(|n| SqlValue::BigInt(Some(n)))
        }

        _ => None,
    };

    coerced.ok_or_else(|| describe(&value))
}

fn describe(value: &Value) -> String {
    const MAX: usize = 60;
    let rendered = value.to_string();
    if rendered.chars().count() > MAX {
        format!("{}...", rendered.chars().take(MAX).collect::<String>())
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[ColumnSpec] = &[
        ColumnSpec::text("_id"),
        ColumnSpec::text("_client").or(ColumnDefault::Tenant),
        ColumnSpec::text("name").mutable(),
        ColumnSpec::boolean("default"),
        ColumnSpec::numeric("sum").or(ColumnDefault::Zero).mutable(),
        ColumnSpec::bigint("updated").mutable(),
        ColumnSpec::json("balance").or(ColumnDefault::EmptyObject),
        ColumnSpec::json("document").from_field(WHOLE_RECORD),
        ColumnSpec::text("store"),
    ];

    const TABLE: TableSpec = TableSpec {
        name: "widgets",
        primary_key: "_id",
        columns: COLUMNS,
        references: &[ForeignRef {
            column: "store",
            resource: "stores",
            key: "_id",
        }],
    };

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_row_mapping_with_defaults() {
        let r = record(json!({"_id": "w1", "name": "Widget", "updated": "1700000000"}));
        let row = TABLE.row("widgets", "_id", &r, "tenant-1").unwrap();

        assert_eq!(row.key, "w1");
        assert_eq!(row.values[1], SqlValue::Text(Some("tenant-1".into())));
        assert_eq!(row.values[3], SqlValue::Bool(None));
        assert_eq!(row.values[4], SqlValue::Numeric(Some(Decimal::ZERO)));
        assert_eq!(row.values[5], SqlValue::BigInt(Some(1_700_000_000)));
        assert_eq!(row.values[6], SqlValue::Json(Some(json!({}))));
        assert_eq!(
            row.values[7],
            SqlValue::Json(Some(json!({"_id": "w1", "name": "Widget", "updated": 1700000000})))
        );
    }

    #[test]
    fn test_lenient_coercions() {
        let r = record(json!({"_id": 5, "default": 1, "sum": "12.50", "name": 42}));
        let row = TABLE.row("widgets", "_id", &r, "t").unwrap();

        assert_eq!(row.key, "5");
        assert_eq!(row.values[2], SqlValue::Text(Some("42".into())));
        assert_eq!(row.values[3], SqlValue::Bool(Some(true)));
        assert_eq!(row.values[4], SqlValue::Numeric(Some(Decimal::new(1250, 2))));
    }

    #[test]
    fn test_mistyped_source_fields_reach_their_columns() {
        let r = record(json!({"_id": 18446744073709551615u64, "default": 1, "name": 42}));
        let row = TABLE.row("widgets", "_id", &r, "t").unwrap();

        assert_eq!(row.key, "18446744073709551615");
        assert_eq!(row.values[0], SqlValue::Text(Some("18446744073709551615".into())));
        assert_eq!(row.values[2], SqlValue::Text(Some("42".into())));
        assert_eq!(row.values[3], SqlValue::Bool(Some(true)));
    }

    #[test]
    fn test_unparseable_timestamp_is_a_coercion_error() {
        let r = record(json!({"_id": "w2", "updated": "yesterday"}));
        let err = TABLE.row("widgets", "_id", &r, "t").unwrap_err();
        assert!(matches!(err, LoadError::Coercion { ref column, .. } if column == "updated"));
    }

    #[test]
    fn test_coercion_error_names_record_and_column() {
        let r = record(json!({"_id": "w9", "sum": {"cash": 1}}));
        match TABLE.row("widgets", "_id", &r, "t") {
            Err(LoadError::Coercion {
                resource,
                record_id,
                column,
                expected,
                ..
            }) => {
                assert_eq!(resource, "widgets");
                assert_eq!(record_id, "w9");
                assert_eq!(column, "sum");
                assert_eq!(expected, "number");
            }
            other => panic!("expected coercion error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_primary_key() {
        let r = record(json!({"name": "orphan"}));
        assert!(matches!(
            TABLE.row("widgets", "_id", &r, "t"),
            Err(LoadError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn test_ddl_quotes_identifiers() {
        let ddl = TABLE.ddl();
        assert_eq!(ddl.len(), 2);
        assert!(ddl[0].starts_with("CREATE TABLE IF NOT EXISTS \"widgets\" (\"_id\" TEXT PRIMARY KEY"));
        assert!(ddl[0].contains("\"default\" BOOLEAN"));
        assert!(ddl[0].contains("\"balance\" JSONB"));
        assert_eq!(
            ddl[1],
            "CREATE INDEX IF NOT EXISTS \"widgets_store_idx\" ON \"widgets\" (\"store\")"
        );
    }

    #[test]
    fn test_mutable_columns() {
        let names: Vec<_> = TABLE.mutable_columns().map(|c| c.name).collect();
        assert_eq!(names, vec!["name", "sum", "updated"]);
    }
}
