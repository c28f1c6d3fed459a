use super::{Row, TableError, INSTANCE_COLUMN};
use crate::experiment::Param;
use itertools::Itertools;
use rusqlite::{params_from_iter, types::ValueRef, Connection, OpenFlags};
use std::{collections::BTreeSet, iter, path::Path};
use tracing::{debug, info};

/// The result table only has a fixed identity part, every parameter and metric column is added
/// the first time a row carries it.
pub const SQL_SCHEMA: &str = "create table if not exists results (
    id integer primary key,
    instance text not null
);";

#[derive(Debug)]
pub struct ResultTable {
    connection: Connection,
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl ResultTable {
    /// open or create the table for writing
    pub fn open(path: &Path) -> Result<Self, TableError> {
        let connection = Connection::open(path)?;
        connection.execute(SQL_SCHEMA, [])?;

        info!(path = ?path, "Opened result table");

        Ok(Self { connection })
    }

    /// open an existing database without ever writing to it, `None` if the table is missing
    pub fn open_read_only(path: &Path) -> Result<Option<Self>, TableError> {
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let present: i64 = connection.query_row(
            "select count(*) from sqlite_master where type = 'table' and name = 'results'",
            [],
            |row| row.get(0),
        )?;

        Ok((present > 0).then_some(Self { connection }))
    }

    pub fn columns(&self) -> Result<BTreeSet<String>, TableError> {
        let mut statement = self
            .connection
            .prepare("select name from pragma_table_info('results')")?;
        let columns = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(columns)
    }

    pub fn rows(&self) -> Result<Vec<Row>, TableError> {
        let mut statement = self.connection.prepare("select * from results order by id")?;
        let names = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect_vec();

        let rows = statement
            .query_map([], |row| {
                let mut values = Row::new();

                for (index, name) in names.iter().enumerate() {
                    if name == "id" {
                        continue;
                    }

                    let value = match row.get_ref(index)? {
                        ValueRef::Integer(value) => Param::Int(value),
                        ValueRef::Real(value) => Param::Float(value),
                        ValueRef::Text(value) => {
                            Param::Text(String::from_utf8_lossy(value).into_owned())
                        }
                        ValueRef::Null | ValueRef::Blob(_) => continue,
                    };
                    values.insert(name.clone(), value);
                }

                Ok(values)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Store `rows`, replacing rows that agree on the instance and every key field.
    ///
    /// Everything happens in one transaction, so a failed call leaves the table untouched.
    pub fn replace(&mut self, rows: &[Row], key_fields: &[&str]) -> Result<usize, TableError> {
        let mut columns = self.columns()?;
        let transaction = self.connection.transaction()?;

        for row in rows {
            for name in row
                .keys()
                .map(String::as_str)
                .chain(key_fields.iter().copied())
            {
                if !columns.contains(name) {
                    transaction.execute(
                        &format!("alter table results add column {}", quote_identifier(name)),
                        [],
                    )?;
                    debug!(column = name, "Added column to result table");
                    columns.insert(name.to_owned());
                }
            }

            let mut clauses = Vec::new();
            let mut bindings = Vec::new();
            for field in iter::once(INSTANCE_COLUMN).chain(key_fields.iter().copied()) {
                match row.get(field) {
                    Some(value) => {
                        clauses.push(format!("{} = ?", quote_identifier(field)));
                        bindings.push(value);
                    }
                    None => clauses.push(format!("{} is null", quote_identifier(field))),
                }
            }

            let removed = transaction.execute(
                &format!("delete from results where {}", clauses.join(" and ")),
                params_from_iter(bindings),
            )?;
            if removed > 0 {
                debug!(removed = removed, "Replaced existing result rows");
            }

            transaction.execute(
                &format!(
                    "insert into results ({}) values ({})",
                    row.keys().map(|name| quote_identifier(name)).join(", "),
                    vec!["?"; row.len()].join(", ")
                ),
                params_from_iter(row.values()),
            )?;
        }

        transaction.commit()?;

        info!("Stored {} entries", rows.len());

        Ok(rows.len())
    }
}
