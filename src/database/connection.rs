use log::{debug, error};
use mysql_async::{Conn, OptsBuilder};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use postgres_openssl::MakeTlsConnector;
use tokio_postgres::{Client, NoTls};
use url::Url;

use crate::config::{MySqlConfig, PgSqlConfig};
use crate::database::DbError;

pub fn create_ssl_connector(sslrootcert_path: &str) -> Result<MakeTlsConnector, DbError> {
    let mut builder = SslConnector::builder(SslMethod::tls())
        .map_err(|e| DbError::Tls(format!("SSL builder error: {}", e)))?;

    builder
        .set_ca_file(sslrootcert_path)
        .map_err(|e| DbError::Tls(format!("Error loading CA cert: {}", e)))?;

    builder.set_verify(SslVerifyMode::NONE); // self-signed server certificates

    Ok(MakeTlsConnector::new(builder.build()))
}

fn is_url(connect: &str) -> bool {
    connect.starts_with("postgres://") || connect.starts_with("postgresql://")
}

/// Connection target with any password masked, for diagnostics
pub fn redact_target(connect: &str) -> String {
    if is_url(connect) {
        if let Ok(mut url) = Url::parse(connect) {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            return url.to_string();
        }
    }
    connect
        .split_whitespace()
        .map(|kv| {
            if kv.starts_with("password=") {
                "password=***"
            } else {
                kv
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a `sslrootcert` query parameter off a connection URL
///
/// tokio-postgres does not understand `sslrootcert`, so it is removed from
/// the URL and used to build an OpenSSL connector instead.
fn split_sslrootcert(connect: &str) -> Result<(String, Option<String>), DbError> {
    if !is_url(connect) {
        return Ok((connect.to_string(), None));
    }
    let url = Url::parse(connect).map_err(|e| DbError::Connect {
        target: redact_target(connect),
        reason: format!("URL parse error: {}", e),
    })?;

    let mut sslrootcert_path = None;
    let mut clean_params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert_path = Some(value.to_string());
        } else {
            clean_params.push((key.into_owned(), value.into_owned()));
        }
    }

    let mut clean_url = url.clone();
    clean_url.set_query(None);
    if !clean_params.is_empty() {
        let query = clean_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        clean_url.set_query(Some(&query));
    }
    Ok((clean_url.to_string(), sslrootcert_path))
}

/// Open a PostgreSQL connection and drive it on a background task.
pub async fn connect_postgres(config: &PgSqlConfig) -> Result<Client, DbError> {
    let target = redact_target(&config.connect);
    let (connect, sslrootcert) = split_sslrootcert(&config.connect)?;
    let failed = |e: tokio_postgres::Error| DbError::Connect {
        target: target.clone(),
        reason: e.to_string(),
    };

    let (client, task) = match sslrootcert {
        Some(path) => {
            let connector = create_ssl_connector(&path)?;
            let (client, connection) = tokio_postgres::connect(&connect, connector)
                .await
                .map_err(failed)?;
            let task = tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            (client, task)
        }
        None => {
            let (client, connection) = tokio_postgres::connect(&connect, NoTls)
                .await
                .map_err(failed)?;
            let task = tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            (client, task)
        }
    };
    // The task ends on its own once the client is dropped.
    drop(task);
    debug!("Connected to PostgreSQL at {}", target);
    Ok(client)
}

pub async fn connect_mysql(config: &MySqlConfig) -> Result<Conn, DbError> {
    let opts = OptsBuilder::default()
        .ip_or_hostname(config.host.clone())
        .tcp_port(config.port)
        .user(Some(config.user.clone()))
        .pass(Some(config.password.clone()))
        .db_name(Some(config.database.clone()));

    let conn = Conn::new(opts).await.map_err(|e| DbError::Connect {
        target: format!(
            "mysql://{}@{}:{}/{}",
            config.user, config.host, config.port, config.database
        ),
        reason: e.to_string(),
    })?;
    debug!("Connected to MySQL at {}:{}", config.host, config.port);
    Ok(conn)
}
