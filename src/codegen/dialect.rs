use super::driver::{AiomysqlDriver, AiosqliteDriver, AsyncpgDriver};
use super::traits::Driver;
use crate::error::{GenError, GenResult};
use std::str::FromStr;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite];

    pub fn driver(&self) -> Box<dyn Driver> {
        match self {
            Dialect::Postgres => Box::new(AsyncpgDriver),
            Dialect::MySql => Box::new(AiomysqlDriver),
            Dialect::Sqlite => Box::new(AiosqliteDriver),
        }
    }

    /// Placeholder token for a 1-based parameter position.
    pub fn placeholder(&self, index: usize) -> String {
        self.driver().placeholder(index)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Resolve an optional dialect name, failing fast when absent.
    pub fn resolve(name: Option<&str>) -> GenResult<Self> {
        match name.map(str::trim) {
            None | Some("") => Err(GenError::MissingDialect),
            Some(name) => name.parse(),
        }
    }
}

impl FromStr for Dialect {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "" => Err(GenError::MissingDialect),
            _ => Err(GenError::UnsupportedDialect(s.to_string())),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
