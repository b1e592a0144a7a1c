use anyhow::{Context, Result};
use std::env;

pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub encryption_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://sendcraft_imap.db".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3030);
        let encryption_key =
            env::var("ENCRYPTION_KEY").context("ENCRYPTION_KEY must be set")?;
        Ok(Config {
            database_url,
            port,
            encryption_key,
        })
    }
}
