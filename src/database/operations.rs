/// Database operations for storing a weather snapshot
///
/// Both dialects execute the statement with bound parameters. On failure
/// the statement preview is logged together with the driver's error text,
/// and the connection is closed before the error is returned.
use log::error;
use mysql_async::prelude::Queryable;
use mysql_async::{Params, Value};
use tokio_postgres::types::ToSql;

use crate::config::{MySqlConfig, PgSqlConfig};
use crate::database::connection::{connect_mysql, connect_postgres, redact_target};
use crate::database::DbError;
use crate::error::Result;
use crate::logging::RunLog;
use crate::report::sql::{datetime_text, ColumnValue, Dialect, InsertStatement, SqlValue};
use crate::utils::to_primitive;

fn mysql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Float(v) => Value::Double(*v),
        SqlValue::Int(v) => Value::Int(i64::from(*v)),
        SqlValue::Text(v) => Value::Bytes(v.as_bytes().to_vec()),
        SqlValue::DateTime(ts) => Value::Bytes(datetime_text(ts).into_bytes()),
    }
}

fn pgsql_value(
    column: &str,
    value: &SqlValue,
) -> std::result::Result<Box<dyn ToSql + Sync + Send>, DbError> {
    let boxed: Box<dyn ToSql + Sync + Send> = match value {
        SqlValue::Float(v) => Box::new(*v),
        SqlValue::Int(v) => Box::new(*v),
        SqlValue::Text(v) => Box::new(v.clone()),
        SqlValue::DateTime(ts) => {
            Box::new(to_primitive(ts).ok_or_else(|| DbError::InvalidTimestamp {
                column: column.to_string(),
                value: datetime_text(ts),
            })?)
        }
    };
    Ok(boxed)
}

/// Insert one row into MySQL.
pub async fn store_mysql(stmt: &InsertStatement, config: &MySqlConfig, log: &RunLog) -> Result<()> {
    let sql = stmt.sql(Dialect::MySql)?;
    let preview = stmt.preview(Dialect::MySql)?;
    let params: Vec<Value> = stmt.parameters().into_iter().map(mysql_value).collect();

    log.max(format_args!("Assembled SQL statement:"));
    log.max(format_args!("{}", preview));

    log.max(format_args!("Connecting to MySQL"));
    let mut conn = match connect_mysql(config).await {
        Ok(conn) => conn,
        Err(e) => {
            error!("{}", e);
            error!("{}", preview);
            return Err(e.into());
        }
    };

    log.max(format_args!("Inserting data"));
    let inserted = conn.exec_drop(sql, Params::Positional(params)).await;

    log.max(format_args!("Closing MySQL"));
    if let Err(e) = conn.disconnect().await {
        error!("Failed to close MySQL connection: {}", e);
    }

    inserted.map_err(|e| {
        error!("Could not insert row: {}", e);
        error!("{}", preview);
        DbError::Query {
            statement: preview,
            reason: e.to_string(),
        }
        .into()
    })
}

/// Insert one row into PostgreSQL.
pub async fn store_pgsql(stmt: &InsertStatement, config: &PgSqlConfig, log: &RunLog) -> Result<()> {
    let sql = stmt.sql(Dialect::Postgres)?;
    let preview = stmt.preview(Dialect::Postgres)?;

    let mut params = Vec::new();
    for column in stmt.columns() {
        if let ColumnValue::Bound(value) = &column.value {
            params.push(pgsql_value(column.name, value)?);
        }
    }
    let refs: Vec<&(dyn ToSql + Sync)> = params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect();

    log.max(format_args!("Connecting to PostgreSQL at {}", redact_target(&config.connect)));
    let client = match connect_postgres(config).await {
        Ok(client) => client,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    log.max(format_args!("Inserting data into {}", stmt.table()));
    let inserted = client.execute(sql.as_str(), &refs).await;
    drop(client);

    match inserted {
        Ok(rows) => {
            log.med(format_args!("Inserted {} row(s)", rows));
            Ok(())
        }
        Err(e) => {
            error!("Could not insert row. {}:\n{}", e, preview);
            Err(DbError::Query {
                statement: preview,
                reason: e.to_string(),
            }
            .into())
        }
    }
}
