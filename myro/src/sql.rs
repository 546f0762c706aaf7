//! Query builder boundary.
//!
//! A [`Sql`] renders its statement text with a [`QueryBuilder`], the mysql
//! dialect description, and tells the driver what to do around it:
//!
//! - the declared [`ColumnKind`] of its parameters, used to format temporal value
//! - whether the generated id of an insert should be returned, see [`Insert::return_id`]
//! - whether it uses named parameters, which is not supported
use std::borrow::Cow;

use crate::{
    Result,
    error::Unsupported,
    value::ColumnKind,
};

/// Type that represent sql statement.
pub trait Sql {
    /// Render the statement text.
    fn sql(&self, builder: &QueryBuilder) -> Cow<'_, str>;

    /// Returns the table whose auto increment key should be returned after
    /// execution.
    fn return_id(&self) -> Option<&Table> {
        None
    }

    /// Returns the declared kind of each parameter target column.
    fn parameter_kinds(&self) -> Vec<ColumnKind> {
        Vec::new()
    }

    /// Returns `true` if statement uses named parameters.
    fn uses_named_parameters(&self) -> bool {
        false
    }
}

impl Sql for &str {
    fn sql(&self, _: &QueryBuilder) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Sql for String {
    fn sql(&self, _: &QueryBuilder) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Sql for &String {
    fn sql(&self, _: &QueryBuilder) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

/// Sql dialect.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    quote: char,
    placeholder: &'static str,
    last_insert_id: &'static str,
}

impl QueryBuilder {
    /// MySQL and MariaDB dialect.
    pub const MYSQL: QueryBuilder = QueryBuilder {
        quote: '`',
        placeholder: "?",
        last_insert_id: "LAST_INSERT_ID()",
    };

    /// Quote an identifier, quote character inside is doubled.
    pub fn quote_identifier(&self, ident: &str) -> String {
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(self.quote);
        for c in ident.chars() {
            if c == self.quote {
                out.push(c);
            }
            out.push(c);
        }
        out.push(self.quote);
        out
    }

    /// Positional parameter placeholder.
    pub fn placeholder(&self) -> &str {
        self.placeholder
    }

    /// Statement selecting the last generated id as `alias`.
    pub fn select_last_insert_id(&self, alias: &str) -> String {
        format!("SELECT {} AS {}", self.last_insert_id, self.quote_identifier(alias))
    }
}

/// Column declaration of a [`Table`].
#[derive(Debug, Clone)]
pub struct ColumnDef {
    name: String,
    kind: ColumnKind,
    primary_key: bool,
    auto_increment: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ColumnKind::Other, primary_key: false, auto_increment: false }
    }

    /// Declared kind, used to format temporal parameter.
    pub fn kind(mut self, kind: ColumnKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }
}

/// Table description.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<ColumnDef>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), columns: Vec::new() }
    }

    /// Add column declaration.
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|col| col.name == name)
    }

    /// Returns the auto increment primary key column.
    pub fn auto_increment_key(&self) -> Result<&ColumnDef, Unsupported> {
        self.columns
            .iter()
            .find(|col| col.primary_key && col.auto_increment)
            .ok_or_else(|| Unsupported::new(format!(
                "table {:?} has no auto increment primary key to return",
                self.name
            )))
    }
}

/// Type that describe its table.
///
/// Can be derived with `#[derive(Table)]`, requires `macros` feature.
pub trait Entity {
    fn table() -> Table;
}

/// `INSERT` statement builder.
///
/// ```
/// use myro::sql::{ColumnDef, Insert, QueryBuilder, Sql, Table};
///
/// let users = Table::new("users")
///     .column(ColumnDef::new("id").primary_key().auto_increment())
///     .column(ColumnDef::new("name"));
///
/// let insert = Insert::into(&users).columns(["name"]).rows(2);
/// assert_eq!(
///     insert.sql(&QueryBuilder::MYSQL),
///     "INSERT INTO `users` (`name`) VALUES (?), (?)",
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Insert<'t> {
    table: &'t Table,
    columns: Vec<String>,
    rows: usize,
    return_id: bool,
    named: bool,
}

impl<'t> Insert<'t> {
    pub fn into(table: &'t Table) -> Self {
        Self { table, columns: Vec::new(), rows: 1, return_id: false, named: false }
    }

    /// Inserted columns, all declared columns if not set.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Number of inserted rows.
    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = rows.max(1);
        self
    }

    /// Returns the generated auto increment id instead of affected rows.
    ///
    /// For multiple rows insert, the first generated id is returned.
    pub fn return_id(mut self) -> Self {
        self.return_id = true;
        self
    }

    /// Render `:column` placeholders.
    ///
    /// Named parameters are not supported by the binary protocol, executing
    /// this statement fails without round trip.
    pub fn named_parameters(mut self) -> Self {
        self.named = true;
        self
    }

    fn column_names(&self) -> Vec<&str> {
        match self.columns.is_empty() {
            true => self.table.columns.iter().map(ColumnDef::name).collect(),
            false => self.columns.iter().map(String::as_str).collect(),
        }
    }
}

impl Sql for Insert<'_> {
    fn sql(&self, builder: &QueryBuilder) -> Cow<'_, str> {
        let columns = self.column_names();
        let names = columns
            .iter()
            .map(|col| builder.quote_identifier(col))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = columns
            .iter()
            .map(|col| match self.named {
                true => format!(":{col}"),
                false => builder.placeholder().to_owned(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let values = vec![format!("({placeholders})"); self.rows].join(", ");

        Cow::Owned(format!(
            "INSERT INTO {} ({names}) VALUES {values}",
            builder.quote_identifier(&self.table.name),
        ))
    }

    fn return_id(&self) -> Option<&Table> {
        self.return_id.then_some(self.table)
    }

    fn parameter_kinds(&self) -> Vec<ColumnKind> {
        let row = self
            .column_names()
            .into_iter()
            .map(|col| self.table.get(col).map(ColumnDef::column_kind).unwrap_or_default())
            .collect::<Vec<_>>();
        row.repeat(self.rows)
    }

    fn uses_named_parameters(&self) -> bool {
        self.named
    }
}

/// Everything needed to prepare a statement, extracted from [`Sql`].
#[derive(Debug, Clone)]
pub(crate) struct PrepareRequest {
    pub sql: String,
    /// Alias of the returned generated id.
    pub return_id: Option<String>,
    pub kinds: Vec<ColumnKind>,
}

impl PrepareRequest {
    /// Fails for statement that cannot be executed, without round trip.
    pub fn new<S: Sql + ?Sized>(sql: &S) -> Result<Self> {
        if sql.uses_named_parameters() {
            return Err(Unsupported::new("named parameters").into());
        }
        let return_id = match sql.return_id() {
            Some(table) => Some(table.auto_increment_key()?.name.clone()),
            None => None,
        };
        Ok(Self {
            sql: sql.sql(&QueryBuilder::MYSQL).trim().to_owned(),
            return_id,
            kinds: sql.parameter_kinds(),
        })
    }

    /// Statement returning the generated id of the previous insert.
    pub fn last_insert_id(alias: &str) -> Self {
        Self {
            sql: QueryBuilder::MYSQL.select_last_insert_id(alias),
            return_id: None,
            kinds: Vec::new(),
        }
    }
}
