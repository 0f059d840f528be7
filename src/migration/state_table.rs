//! History table statements

use sea_query::{Alias, ColumnDef, Order, PostgresQueryBuilder, Query, Table};

/// `CREATE TABLE IF NOT EXISTS` for the history table
///
/// One row per applied migration: `version` (primary key), `description`, `checksum`.
pub fn create_history_table(schema: &str, table: &str) -> String {
    Table::create()
        .table((Alias::new(schema), Alias::new(table)))
        .if_not_exists()
        .col(
            ColumnDef::new(Alias::new("version"))
                .big_integer()
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(Alias::new("description")).text().not_null())
        .col(ColumnDef::new(Alias::new("checksum")).text().not_null())
        .to_owned()
        .build(PostgresQueryBuilder)
}

/// Select every history row ordered by version
pub fn select_applied(schema: &str, table: &str) -> String {
    let (sql, _values) = Query::select()
        .columns([
            Alias::new("version"),
            Alias::new("description"),
            Alias::new("checksum"),
        ])
        .from((Alias::new(schema), Alias::new(table)))
        .order_by(Alias::new("version"), Order::Asc)
        .to_owned()
        .build(PostgresQueryBuilder);
    sql
}

/// Parameterized insert of one history row (`$1` version, `$2` description, `$3` checksum)
pub fn insert_applied(schema: &str, table: &str) -> String {
    format!(
        "INSERT INTO \"{}\".\"{}\" (\"version\", \"description\", \"checksum\") VALUES ($1, $2, $3)",
        schema, table
    )
}

pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", schema)
}

pub fn drop_schema(schema: &str) -> String {
    format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_history_table_sql() {
        let sql = create_history_table("app", "history");
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"app\".\"history\""));
        assert!(sql.contains("\"version\" bigint NOT NULL PRIMARY KEY"));
        assert!(sql.contains("\"description\" text NOT NULL"));
        assert!(sql.contains("\"checksum\" text NOT NULL"));
    }

    #[test]
    fn test_select_applied_sql() {
        assert_eq!(
            select_applied("app", "history"),
            "SELECT \"version\", \"description\", \"checksum\" FROM \"app\".\"history\" ORDER BY \"version\" ASC"
        );
    }

    #[test]
    fn test_schema_statements() {
        assert_eq!(create_schema("app"), "CREATE SCHEMA IF NOT EXISTS \"app\"");
        assert_eq!(drop_schema("app"), "DROP SCHEMA IF EXISTS \"app\" CASCADE");
        assert!(insert_applied("app", "history").contains("\"app\".\"history\""));
    }
}
