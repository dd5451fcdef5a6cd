//! Catalog identifiers: database names, table names and their qualified form.

use crate::error::WarehouseError;
use std::fmt;

/// Business domain owning one of the bootstrap databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Sales,
    Factory,
    Marketing,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Sales, Domain::Factory, Domain::Marketing];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Sales => "SALES",
            Domain::Factory => "FACTORY",
            Domain::Marketing => "MARKETING",
        }
    }
}

fn validate_identifier(raw: &str) -> Result<(), WarehouseError> {
    let valid = !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(WarehouseError::InvalidIdentifier(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseName(String);

impl DatabaseName {
    pub fn new(raw: impl Into<String>) -> Result<Self, WarehouseError> {
        let raw = raw.into();
        validate_identifier(&raw)?;
        Ok(Self(raw))
    }

    /// `<prefix>_<DOMAIN>`, keeping the prefix's case.
    pub fn for_domain(prefix: &str, domain: Domain) -> Result<Self, WarehouseError> {
        Self::new(format!("{prefix}_{}", domain.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    pub fn new(raw: impl Into<String>) -> Result<Self, WarehouseError> {
        let raw = raw.into();
        validate_identifier(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `database.table`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub database: DatabaseName,
    pub table: TableName,
}

impl QualifiedName {
    pub fn new(database: DatabaseName, table: TableName) -> Self {
        Self { database, table }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// The three databases derived from a user prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    pub sales: DatabaseName,
    pub factory: DatabaseName,
    pub marketing: DatabaseName,
}

impl Namespaces {
    pub fn from_prefix(prefix: &str) -> Result<Self, WarehouseError> {
        validate_identifier(prefix)?;
        Ok(Self {
            sales: DatabaseName::for_domain(prefix, Domain::Sales)?,
            factory: DatabaseName::for_domain(prefix, Domain::Factory)?,
            marketing: DatabaseName::for_domain(prefix, Domain::Marketing)?,
        })
    }

    pub fn get(&self, domain: Domain) -> &DatabaseName {
        match domain {
            Domain::Sales => &self.sales,
            Domain::Factory => &self.factory,
            Domain::Marketing => &self.marketing,
        }
    }

    /// Sales, factory, marketing.
    pub fn all(&self) -> [&DatabaseName; 3] {
        Domain::ALL.map(|d| self.get(d))
    }
}
