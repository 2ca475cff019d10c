//! Worker configuration loaded from the environment.

use core_config::{env_parse, ConfigError, FromEnv};
use event_bus::BusConfig;
use strum::{Display, EnumString};

/// Which broker backend the consumers run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BrokerKind {
    Amqp,
    /// Single-process broker for local runs
    Memory,
}

/// Which transport delivers email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EmailProviderKind {
    Smtp,
    /// Log the email instead of sending it
    Log,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub broker: BrokerKind,
    pub bus: BusConfig,
    /// Postgres URL; in-memory store and sink when unset
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub email_provider: EmailProviderKind,
    pub health_port: u16,
    /// Connection attempts after the first before startup fails
    pub connect_retries: u32,
}

impl FromEnv for WorkerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(Self {
            broker: env_parse("BROKER", BrokerKind::Amqp)?,
            bus: BusConfig::from_env()?,
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
            email_provider: env_parse("EMAIL_PROVIDER", EmailProviderKind::Log)?,
            health_port: env_parse("HEALTH_PORT", 8083)?,
            connect_retries: env_parse("CONNECT_RETRIES", 5)?,
        })
    }
}
