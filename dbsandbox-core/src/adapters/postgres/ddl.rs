//! `CREATE TABLE` synthesis from `pg_catalog` metadata.
//!
//! PostgreSQL has no `SHOW CREATE TABLE`, so the statement is rebuilt from
//! the column list and the primary key. Foreign keys, indexes, checks and
//! user-defined types are not reproduced.

use crate::Dialect;
use std::fmt::Write as _;

/// Column list of a table, in `attnum` order.
pub(crate) const COLUMNS_QUERY: &str = r#"
SELECT a.attname::text AS column_name,
       pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
       a.attnotnull AS not_null,
       pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS default_expr,
       a.attidentity::text AS identity_kind,
       a.attgenerated::text AS generated_kind
FROM pg_catalog.pg_attribute a
LEFT JOIN pg_catalog.pg_attrdef d
       ON d.adrelid = a.attrelid AND d.adnum = a.attnum
WHERE a.attrelid = $1::regclass
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
"#;

/// Primary key columns in key order.
pub(crate) const PRIMARY_KEY_QUERY: &str = r#"
SELECT a.attname::text AS column_name
FROM pg_catalog.pg_constraint c
CROSS JOIN LATERAL unnest(c.conkey) WITH ORDINALITY AS k(attnum, position)
JOIN pg_catalog.pg_attribute a
  ON a.attrelid = c.conrelid AND a.attnum = k.attnum
WHERE c.conrelid = $1::regclass
  AND c.contype = 'p'
ORDER BY k.position
"#;

/// One row of [`COLUMNS_QUERY`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct PgColumn {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub default_expr: Option<String>,
    /// `a` (always), `d` (by default) or empty
    pub identity_kind: String,
    /// `s` (stored) or empty
    pub generated_kind: String,
}

impl PgColumn {
    pub(crate) fn is_generated(&self) -> bool {
        !self.generated_kind.is_empty()
    }

    pub(crate) fn is_identity(&self) -> bool {
        !self.identity_kind.is_empty()
    }

    /// Sequence named by a `nextval('...'::regclass)` default.
    pub(crate) fn nextval_sequence(&self) -> Option<&str> {
        if self.is_generated() {
            return None;
        }
        nextval_sequence(self.default_expr.as_deref()?)
    }
}

/// Extracts `seq` from `nextval('seq'::regclass)`.
pub(crate) fn nextval_sequence(expr: &str) -> Option<&str> {
    let start = expr.find("nextval('")? + "nextval('".len();
    let rest = &expr[start..];
    let end = rest.find("'::regclass")?;
    Some(&rest[..end]).filter(|name| !name.is_empty())
}

fn column_definition(column: &PgColumn) -> String {
    let mut definition = format!(
        "{} {}",
        Dialect::Postgres.quote_ident(&column.name),
        column.data_type
    );

    match (&column.default_expr, column.is_generated(), column.is_identity()) {
        (Some(expr), true, _) => {
            let _ = write!(definition, " GENERATED ALWAYS AS ({expr}) STORED");
        }
        // Copied rows carry explicit values, so identities must accept them
        (_, false, true) => definition.push_str(" GENERATED BY DEFAULT AS IDENTITY"),
        (Some(expr), false, false) => {
            let _ = write!(definition, " DEFAULT {expr}");
        }
        _ => {}
    }

    if column.not_null {
        definition.push_str(" NOT NULL");
    }
    definition
}

/// Builds the DDL for `table`.
///
/// Sequences referenced by `nextval` defaults are created first so the
/// `CREATE TABLE` can run against an empty sandbox.
pub(crate) fn build_create_table(table: &str, columns: &[PgColumn], primary_key: &[String]) -> String {
    let mut ddl = String::new();

    let mut sequences: Vec<&str> = Vec::new();
    for sequence in columns.iter().filter_map(PgColumn::nextval_sequence) {
        if !sequences.contains(&sequence) {
            sequences.push(sequence);
        }
    }
    for sequence in sequences {
        let _ = writeln!(ddl, "CREATE SEQUENCE IF NOT EXISTS {sequence};");
    }

    let mut definitions: Vec<String> = columns.iter().map(column_definition).collect();
    if !primary_key.is_empty() {
        let key = primary_key
            .iter()
            .map(|c| Dialect::Postgres.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        definitions.push(format!("PRIMARY KEY ({key})"));
    }

    let _ = write!(
        ddl,
        "CREATE TABLE {} (\n    {}\n)",
        Dialect::Postgres.quote_ident(table),
        definitions.join(",\n    ")
    );
    ddl
}

/// Sequence that must be advanced after rows are copied into a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SequenceFixup {
    /// A standalone sequence referenced by `nextval`
    Named { column: String, sequence: String },
    /// The implicit sequence of an identity column
    Identity { column: String },
}

impl SequenceFixup {
    pub(crate) fn column(&self) -> &str {
        match self {
            Self::Named { column, .. } | Self::Identity { column } => column,
        }
    }
}

pub(crate) fn sequence_fixups(columns: &[PgColumn]) -> Vec<SequenceFixup> {
    columns
        .iter()
        .filter_map(|column| {
            if column.is_identity() {
                Some(SequenceFixup::Identity {
                    column: column.name.clone(),
                })
            } else {
                column.nextval_sequence().map(|sequence| SequenceFixup::Named {
                    column: column.name.clone(),
                    sequence: sequence.to_string(),
                })
            }
        })
        .collect()
}

/// `setval` statement moving the sequence past the copied maximum.
///
/// `$1` is the sequence (for `Named`) or the quoted table name (for
/// `Identity`); `$2` is the raw column name for `Identity`.
pub(crate) fn setval_sql(table: &str, fixup: &SequenceFixup) -> String {
    let next_value = format!(
        "COALESCE((SELECT MAX({})::bigint FROM {}), 0) + 1",
        Dialect::Postgres.quote_ident(fixup.column()),
        Dialect::Postgres.quote_ident(table)
    );
    match fixup {
        SequenceFixup::Named { .. } => format!("SELECT setval($1::regclass, {next_value}, false)"),
        SequenceFixup::Identity { .. } => {
            format!("SELECT setval(pg_get_serial_sequence($1, $2), {next_value}, false)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str) -> PgColumn {
        PgColumn {
            name: name.to_string(),
            data_type: data_type.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_nextval_sequence() {
        assert_eq!(
            nextval_sequence("nextval('orders_id_seq'::regclass)"),
            Some("orders_id_seq")
        );
        assert_eq!(
            nextval_sequence("nextval('\"Mixed_seq\"'::regclass)"),
            Some("\"Mixed_seq\"")
        );
        assert_eq!(nextval_sequence("now()"), None);
        assert_eq!(nextval_sequence("'pending'::text"), None);
    }

    #[test]
    fn test_build_create_table_serial_with_primary_key() {
        let columns = vec![
            PgColumn {
                not_null: true,
                default_expr: Some("nextval('orders_id_seq'::regclass)".to_string()),
                ..column("id", "integer")
            },
            PgColumn {
                default_expr: Some("'pending'::character varying".to_string()),
                ..column("status", "character varying(20)")
            },
            PgColumn {
                not_null: true,
                ..column("total", "numeric(12,2)")
            },
        ];
        let ddl = build_create_table("orders", &columns, &["id".to_string()]);

        assert_eq!(
            ddl,
            "CREATE SEQUENCE IF NOT EXISTS orders_id_seq;\n\
             CREATE TABLE \"orders\" (\n    \
             \"id\" integer DEFAULT nextval('orders_id_seq'::regclass) NOT NULL,\n    \
             \"status\" character varying(20) DEFAULT 'pending'::character varying,\n    \
             \"total\" numeric(12,2) NOT NULL,\n    \
             PRIMARY KEY (\"id\")\n)"
        );
    }

    #[test]
    fn test_build_create_table_identity_and_generated() {
        let columns = vec![
            PgColumn {
                not_null: true,
                identity_kind: "a".to_string(),
                ..column("id", "bigint")
            },
            column("price", "numeric"),
            column("qty", "integer"),
            PgColumn {
                default_expr: Some("(price * (qty)::numeric)".to_string()),
                generated_kind: "s".to_string(),
                ..column("amount", "numeric")
            },
        ];
        let ddl = build_create_table("lines", &columns, &[]);

        assert!(ddl.contains("\"id\" bigint GENERATED BY DEFAULT AS IDENTITY NOT NULL"));
        assert!(ddl.contains(
            "\"amount\" numeric GENERATED ALWAYS AS ((price * (qty)::numeric)) STORED"
        ));
        assert!(!ddl.contains("PRIMARY KEY"));
        assert!(!ddl.contains("CREATE SEQUENCE"));
    }

    #[test]
    fn test_build_create_table_composite_key_order() {
        let columns = vec![column("tenant_id", "integer"), column("id", "integer")];
        let ddl = build_create_table(
            "accounts",
            &columns,
            &["tenant_id".to_string(), "id".to_string()],
        );
        assert!(ddl.ends_with("PRIMARY KEY (\"tenant_id\", \"id\")\n)"));
    }

    #[test]
    fn test_shared_sequence_created_once() {
        let default = Some("nextval('shared_seq'::regclass)".to_string());
        let columns = vec![
            PgColumn {
                default_expr: default.clone(),
                ..column("a", "bigint")
            },
            PgColumn {
                default_expr: default,
                ..column("b", "bigint")
            },
        ];
        let ddl = build_create_table("t", &columns, &[]);
        assert_eq!(ddl.matches("CREATE SEQUENCE").count(), 1);
    }

    #[test]
    fn test_sequence_fixups() {
        let columns = vec![
            PgColumn {
                identity_kind: "d".to_string(),
                ..column("id", "bigint")
            },
            PgColumn {
                default_expr: Some("nextval('ticket_seq'::regclass)".to_string()),
                ..column("ticket_no", "bigint")
            },
            column("note", "text"),
        ];
        let fixups = sequence_fixups(&columns);

        assert_eq!(
            fixups,
            vec![
                SequenceFixup::Identity {
                    column: "id".to_string()
                },
                SequenceFixup::Named {
                    column: "ticket_no".to_string(),
                    sequence: "ticket_seq".to_string()
                },
            ]
        );
        assert_eq!(
            setval_sql("orders", &fixups[1]),
            "SELECT setval($1::regclass, COALESCE((SELECT MAX(\"ticket_no\")::bigint FROM \"orders\"), 0) + 1, false)"
        );
        assert!(setval_sql("orders", &fixups[0]).contains("pg_get_serial_sequence($1, $2)"));
    }
}
