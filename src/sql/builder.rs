//! Dialect-specific SQL text generation.
//!
//! [`build`] is a pure translation from a [`QueryDescriptor`] to a SQL
//! string plus an ordered parameter list. The same descriptor always yields
//! byte-identical SQL for a given dialect. Every dialect difference —
//! identifier quoting, placeholder style, paging syntax — is isolated here;
//! no other component branches on [`Dialect`] for text generation.

use crate::models::{
    ColumnSpec, Condition, Conjunction, Operation, QueryDescriptor, SqlValue,
};
use crate::sql::Dialect;

/// Translate a descriptor into `(sql, ordered_params)`.
pub fn build(descriptor: &QueryDescriptor, dialect: Dialect) -> (String, Vec<SqlValue>) {
    let mut ctx = BuildContext::new(dialect);
    match descriptor.operation {
        Operation::Select => ctx.build_select(descriptor),
        Operation::Insert => ctx.build_insert(descriptor),
        Operation::Update => ctx.build_update(descriptor),
        Operation::Delete => ctx.build_delete(descriptor),
    }
    (ctx.sql, ctx.params)
}

/// Accumulates SQL text and parameters while keeping the positional
/// placeholder index correct across the whole statement.
struct BuildContext {
    dialect: Dialect,
    sql: String,
    params: Vec<SqlValue>,
}

impl BuildContext {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and append its placeholder to the SQL text.
    fn push_param(&mut self, value: SqlValue) {
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
    }

    /// Quote a column reference. Dotted names quote each segment; anything
    /// containing a parenthesis or space is treated as a raw expression.
    fn quote_column(&self, column: &str) -> String {
        if column == "*" || column.contains('(') || column.contains(' ') {
            return column.to_string();
        }
        if let Some((qualifier, name)) = column.split_once('.') {
            return format!(
                "{}.{}",
                self.dialect.quote_identifier(qualifier),
                self.dialect.quote_identifier(name)
            );
        }
        self.dialect.quote_identifier(column)
    }

    fn build_select(&mut self, d: &QueryDescriptor) {
        self.sql.push_str("SELECT ");

        // SQL Server expresses a plain row limit as TOP; OFFSET paging is
        // handled in the tail below.
        if self.dialect == Dialect::SqlServer {
            if let (Some(limit), None) = (d.limit, d.offset) {
                self.sql.push_str(&format!("TOP {} ", limit));
            }
        }

        match &d.columns {
            ColumnSpec::All => self.sql.push('*'),
            ColumnSpec::Named(name) => {
                let quoted = self.quote_column(name);
                self.sql.push_str(&quoted);
            }
            ColumnSpec::List(names) => {
                let quoted: Vec<String> = names.iter().map(|n| self.quote_column(n)).collect();
                self.sql.push_str(&quoted.join(", "));
            }
        }

        self.sql.push_str(" FROM ");
        let table = self.dialect.quote_identifier(&d.table);
        self.sql.push_str(&table);

        for join in &d.joins {
            self.sql.push(' ');
            self.sql.push_str(join.kind.as_sql());
            self.sql.push(' ');
            let table = self.dialect.quote_identifier(&join.table);
            self.sql.push_str(&table);
            self.sql.push_str(" ON ");
            self.sql.push_str(&join.on);
        }

        self.append_conditions(&d.conditions);

        if !d.grouping.is_empty() {
            self.sql.push_str(" GROUP BY ");
            let cols: Vec<String> = d.grouping.iter().map(|c| self.quote_column(c)).collect();
            self.sql.push_str(&cols.join(", "));
        }

        let needs_order_for_paging =
            self.dialect == Dialect::SqlServer && d.offset.is_some() && d.ordering.is_empty();
        if !d.ordering.is_empty() {
            self.sql.push_str(" ORDER BY ");
            let parts: Vec<String> = d
                .ordering
                .iter()
                .map(|(col, dir)| format!("{} {}", self.quote_column(col), dir.as_sql()))
                .collect();
            self.sql.push_str(&parts.join(", "));
        } else if needs_order_for_paging {
            // OFFSET/FETCH is only legal after an ORDER BY
            self.sql.push_str(" ORDER BY (SELECT NULL)");
        }

        self.append_paging(d);
    }

    fn build_insert(&mut self, d: &QueryDescriptor) {
        self.sql.push_str("INSERT INTO ");
        let table = self.dialect.quote_identifier(&d.table);
        self.sql.push_str(&table);
        self.sql.push_str(" (");
        let cols: Vec<String> = d
            .values
            .iter()
            .map(|(c, _)| self.dialect.quote_identifier(c))
            .collect();
        self.sql.push_str(&cols.join(", "));
        self.sql.push_str(") VALUES (");
        for (i, (_, value)) in d.values.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_param(value.clone());
        }
        self.sql.push(')');
    }

    fn build_update(&mut self, d: &QueryDescriptor) {
        self.sql.push_str("UPDATE ");
        let table = self.dialect.quote_identifier(&d.table);
        self.sql.push_str(&table);
        self.sql.push_str(" SET ");
        for (i, (column, value)) in d.values.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            let col = self.dialect.quote_identifier(column);
            self.sql.push_str(&col);
            self.sql.push_str(" = ");
            self.push_param(value.clone());
        }
        self.append_conditions(&d.conditions);
    }

    fn build_delete(&mut self, d: &QueryDescriptor) {
        self.sql.push_str("DELETE FROM ");
        let table = self.dialect.quote_identifier(&d.table);
        self.sql.push_str(&table);
        self.append_conditions(&d.conditions);
    }

    /// Append a WHERE clause. An empty condition list leaves the statement
    /// unfiltered; narrowing is always the caller's responsibility.
    fn append_conditions(&mut self, conditions: &[Condition]) {
        for (i, condition) in conditions.iter().enumerate() {
            if i == 0 {
                self.sql.push_str(" WHERE ");
            } else {
                self.sql.push_str(match condition.conjunction() {
                    Conjunction::And => " AND ",
                    Conjunction::Or => " OR ",
                });
            }
            self.append_condition(condition);
        }
    }

    fn append_condition(&mut self, condition: &Condition) {
        match condition {
            Condition::Compare {
                column, op, value, ..
            } => {
                let col = self.quote_column(column);
                self.sql.push_str(&col);
                self.sql.push(' ');
                self.sql.push_str(op.as_sql());
                self.sql.push(' ');
                self.push_param(value.clone());
            }
            Condition::Null {
                column, negated, ..
            } => {
                let col = self.quote_column(column);
                self.sql.push_str(&col);
                self.sql
                    .push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Condition::In {
                column,
                values,
                negated,
                ..
            } => {
                let col = self.quote_column(column);
                self.sql.push_str(&col);
                self.sql.push_str(if *negated { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.push_param(value.clone());
                }
                self.sql.push(')');
            }
            Condition::Raw { sql, params, .. } => {
                self.append_raw_fragment(sql, params);
            }
        }
    }

    /// Append a raw fragment, rewriting each `?` to the dialect's positional
    /// placeholder as its parameter is consumed.
    fn append_raw_fragment(&mut self, fragment: &str, params: &[SqlValue]) {
        let mut remaining = params.iter();
        for ch in fragment.chars() {
            if ch == '?' {
                match remaining.next() {
                    Some(value) => self.push_param(value.clone()),
                    // More markers than parameters: keep the literal so the
                    // engine reports the mismatch instead of hiding it
                    None => self.sql.push('?'),
                }
            } else {
                self.sql.push(ch);
            }
        }
        for value in remaining {
            self.params.push(value.clone());
        }
    }

    fn append_paging(&mut self, d: &QueryDescriptor) {
        match self.dialect {
            Dialect::Postgres => {
                if let Some(limit) = d.limit {
                    self.sql.push_str(&format!(" LIMIT {}", limit));
                }
                if let Some(offset) = d.offset {
                    self.sql.push_str(&format!(" OFFSET {}", offset));
                }
            }
            Dialect::Sqlite => {
                // SQLite requires LIMIT before OFFSET; -1 means unlimited
                match (d.limit, d.offset) {
                    (Some(limit), Some(offset)) => {
                        self.sql
                            .push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
                    }
                    (Some(limit), None) => self.sql.push_str(&format!(" LIMIT {}", limit)),
                    (None, Some(offset)) => {
                        self.sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset));
                    }
                    (None, None) => {}
                }
            }
            Dialect::MySql => match (d.limit, d.offset) {
                (Some(limit), Some(offset)) => {
                    self.sql
                        .push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
                }
                (Some(limit), None) => self.sql.push_str(&format!(" LIMIT {}", limit)),
                (None, Some(offset)) => {
                    // MySQL has no offset-without-limit form
                    self.sql.push_str(&format!(
                        " LIMIT 18446744073709551615 OFFSET {}",
                        offset
                    ));
                }
                (None, None) => {}
            },
            Dialect::SqlServer => {
                // TOP already emitted for the offset-less case
                if let Some(offset) = d.offset {
                    self.sql.push_str(&format!(" OFFSET {} ROWS", offset));
                    if let Some(limit) = d.limit {
                        self.sql
                            .push_str(&format!(" FETCH NEXT {} ROWS ONLY", limit));
                    }
                }
            }
        }
    }
}
