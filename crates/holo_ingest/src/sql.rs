//! DDL/DML statement generation with typed identifier and parameter slots.
//!
//! SQL text is assembled only through [`SqlBuilder`], which keeps fixed
//! keywords, quoted identifiers and positional placeholders as distinct slots.
//! Row values never appear in the text; they travel as bound parameters.

use crate::dataset::{DatasetRow, PRIMARY_KEY_COLUMN};
use crate::identifier::Identifier;

/// Column type used for every user-supplied column.
pub const DEFAULT_COLUMN_TYPE: &str = "TEXT";

/// SQL text plus positional text parameters (`None` binds NULL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSql {
    pub text: String,
    pub params: Vec<Option<String>>,
}

/// Incremental SQL writer with separate keyword, identifier and placeholder slots.
#[derive(Debug, Default)]
pub struct SqlBuilder {
    text: String,
    params: Vec<Option<String>>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends fixed SQL text. Only compile-time strings are accepted.
    pub fn keyword(&mut self, sql: &'static str) -> &mut Self {
        self.text.push_str(sql);
        self
    }

    /// Appends a double-quoted, escaped identifier.
    pub fn identifier(&mut self, ident: &Identifier) -> &mut Self {
        self.text.push_str(&ident.quoted());
        self
    }

    /// Appends identifiers separated by `, `.
    pub fn identifier_list<'a>(
        &mut self,
        idents: impl IntoIterator<Item = &'a Identifier>,
    ) -> &mut Self {
        for (idx, ident) in idents.into_iter().enumerate() {
            if idx > 0 {
                self.keyword(", ");
            }
            self.identifier(ident);
        }
        self
    }

    /// Appends a `$n` placeholder and binds `value` to it.
    pub fn bind(&mut self, value: Option<&str>) -> &mut Self {
        self.params.push(value.map(str::to_string));
        let position = self.params.len();
        self.text.push('$');
        self.text.push_str(&position.to_string());
        self
    }

    pub fn finish(self) -> RenderedSql {
        RenderedSql {
            text: self.text,
            params: self.params,
        }
    }
}

/// Structural or data statement issued by one ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `CREATE TABLE` with the synthetic serial key and one TEXT column per entry.
    CreateTable {
        table: Identifier,
        columns: Vec<Identifier>,
    },
    /// `ALTER TABLE .. ADD COLUMN .. TEXT`; existing rows read NULL.
    AddColumn {
        table: Identifier,
        column: Identifier,
    },
    /// Parameterized single-row `INSERT`.
    InsertRow {
        table: Identifier,
        columns: Vec<Identifier>,
        values: Vec<Option<String>>,
    },
    /// `NOTIFY` on the schema-cache reload channel.
    Notify { channel: Identifier },
}

impl Statement {
    /// Short statement kind for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create_table",
            Self::AddColumn { .. } => "add_column",
            Self::InsertRow { .. } => "insert_row",
            Self::Notify { .. } => "notify",
        }
    }

    pub fn render(&self) -> RenderedSql {
        let mut sql = SqlBuilder::new();
        match self {
            Self::CreateTable { table, columns } => {
                let primary_key = primary_key_identifier();
                sql.keyword("CREATE TABLE ")
                    .identifier(table)
                    .keyword(" (")
                    .identifier(&primary_key)
                    .keyword(" SERIAL PRIMARY KEY");
                for column in columns {
                    sql.keyword(", ")
                        .identifier(column)
                        .keyword(" ")
                        .keyword(DEFAULT_COLUMN_TYPE);
                }
                sql.keyword(")");
            }
            Self::AddColumn { table, column } => {
                sql.keyword("ALTER TABLE ")
                    .identifier(table)
                    .keyword(" ADD COLUMN ")
                    .identifier(column)
                    .keyword(" ")
                    .keyword(DEFAULT_COLUMN_TYPE);
            }
            Self::InsertRow {
                table,
                columns,
                values,
            } => {
                sql.keyword("INSERT INTO ")
                    .identifier(table)
                    .keyword(" (")
                    .identifier_list(columns)
                    .keyword(") VALUES (");
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        sql.keyword(", ");
                    }
                    sql.bind(value.as_deref());
                }
                sql.keyword(")");
            }
            Self::Notify { channel } => {
                sql.keyword("NOTIFY ").identifier(channel);
            }
        }
        sql.finish()
    }
}

/// Identifier of the synthetic primary key column.
fn primary_key_identifier() -> Identifier {
    Identifier::from_static(PRIMARY_KEY_COLUMN)
}

/// Builds the `CREATE TABLE` statement for a new dataset table.
pub fn create_table(table: &Identifier, columns: &[Identifier]) -> Statement {
    Statement::CreateTable {
        table: table.clone(),
        columns: columns.to_vec(),
    }
}

/// Builds one `ALTER TABLE .. ADD COLUMN` statement per column.
pub fn add_columns<'a>(
    table: &Identifier,
    columns: impl IntoIterator<Item = &'a Identifier>,
) -> Vec<Statement> {
    columns
        .into_iter()
        .map(|column| Statement::AddColumn {
            table: table.clone(),
            column: column.clone(),
        })
        .collect()
}

/// Builds an `INSERT` using the row's own key order.
pub fn insert_row(table: &Identifier, row: &DatasetRow) -> Statement {
    Statement::InsertRow {
        table: table.clone(),
        columns: row.columns().cloned().collect(),
        values: row.values().map(|value| value.map(str::to_string)).collect(),
    }
}

/// Builds the schema-cache reload signal.
pub fn notify(channel: &Identifier) -> Statement {
    Statement::Notify {
        channel: channel.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dataset::validate;

    fn ident(name: &str) -> Identifier {
        Identifier::parse(name).expect("valid identifier")
    }

    #[test]
    fn create_table_quotes_every_identifier_and_adds_serial_key() {
        let statement = create_table(&ident("Products"), &[ident("name"), ident("price")]);
        let rendered = statement.render();
        assert_eq!(
            rendered.text,
            "CREATE TABLE \"Products\" (\"id\" SERIAL PRIMARY KEY, \"name\" TEXT, \"price\" TEXT)"
        );
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn add_columns_emits_one_statement_per_column() {
        let columns = [ident("email"), ident("phone")];
        let statements = add_columns(&ident("users"), columns.iter());
        let texts = statements
            .iter()
            .map(|statement| statement.render().text)
            .collect::<Vec<_>>();
        assert_eq!(
            texts,
            vec![
                "ALTER TABLE \"users\" ADD COLUMN \"email\" TEXT".to_string(),
                "ALTER TABLE \"users\" ADD COLUMN \"phone\" TEXT".to_string(),
            ]
        );
    }

    #[test]
    fn insert_row_binds_values_positionally_and_never_inlines_them() {
        let dataset = validate(&json!({
            "people": [{"name": "O'Brien", "note": "x'); DROP TABLE people; --", "age": null}]
        }))
        .expect("valid payload");
        let rendered = insert_row(dataset.table_name(), &dataset.rows()[0]).render();

        assert_eq!(
            rendered.text,
            "INSERT INTO \"people\" (\"name\", \"note\", \"age\") VALUES ($1, $2, $3)"
        );
        assert_eq!(
            rendered.params,
            vec![
                Some("O'Brien".to_string()),
                Some("x'); DROP TABLE people; --".to_string()),
                None,
            ]
        );
        assert!(!rendered.text.contains("O'Brien"));
    }

    #[test]
    fn notify_quotes_channel_name() {
        assert_eq!(notify(&ident("pgrst")).render().text, "NOTIFY \"pgrst\"");
    }

    #[test]
    fn builder_numbers_placeholders_in_bind_order() {
        let mut sql = SqlBuilder::new();
        sql.keyword("SELECT ")
            .bind(Some("a"))
            .keyword(", ")
            .bind(None)
            .keyword(", ")
            .bind(Some("c"));
        let rendered = sql.finish();
        assert_eq!(rendered.text, "SELECT $1, $2, $3");
        assert_eq!(rendered.params.len(), 3);
    }
}
