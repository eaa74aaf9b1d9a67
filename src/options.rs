//! Connection details copied into query spans.

use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

/// Address, user and database of the connection a query runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// `host:port` of the database server.
    pub addr: String,
    pub user: String,
    pub database: String,
}

impl ConnectionOptions {
    pub fn new(
        addr: impl Into<String>,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            addr: addr.into(),
            user: user.into(),
            database: database.into(),
        }
    }

    /// Parse the options out of a connection URL such as
    /// `postgres://app@db.internal:5432/orders`.
    ///
    /// The password is never kept.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        let host = url.host_str().ok_or(Error::MissingHost)?;

        let addr = match url.port().or_else(|| default_port(url.scheme())) {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        Ok(Self {
            addr,
            user: url.username().to_owned(),
            database: url.path().trim_start_matches('/').to_owned(),
        })
    }
}

impl FromStr for ConnectionOptions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_url(s)
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "postgres" | "postgresql" => Some(5432),
        "mysql" | "mariadb" => Some(3306),
        _ => None,
    }
}
