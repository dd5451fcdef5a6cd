use super::names::{Domain, Namespaces, QualifiedName, TableName};
use crate::error::WarehouseError;

/// The five source datasets loaded by the bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    CarInstalls,
    CarSales,
    CustomerData,
    ExperimentalMotors,
    PostalCodes,
}

impl Dataset {
    /// Order in which source files are read.
    pub const READ_ORDER: [Dataset; 5] = [
        Dataset::CarInstalls,
        Dataset::CarSales,
        Dataset::CustomerData,
        Dataset::ExperimentalMotors,
        Dataset::PostalCodes,
    ];

    /// Order in which tables are written.
    pub const WRITE_ORDER: [Dataset; 5] = [
        Dataset::CarSales,
        Dataset::CarInstalls,
        Dataset::ExperimentalMotors,
        Dataset::CustomerData,
        Dataset::PostalCodes,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Dataset::CarInstalls => "car_installs.csv",
            Dataset::CarSales => "car_sales.csv",
            Dataset::CustomerData => "customer_data.csv",
            Dataset::ExperimentalMotors => "experimental_motors.csv",
            Dataset::PostalCodes => "postal_codes.csv",
        }
    }

    pub fn domain(self) -> Domain {
        match self {
            Dataset::CarSales => Domain::Sales,
            Dataset::CarInstalls | Dataset::ExperimentalMotors => Domain::Factory,
            Dataset::CustomerData | Dataset::PostalCodes => Domain::Marketing,
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            Dataset::CarInstalls => "CAR_INSTALLS",
            Dataset::CarSales => "CAR_SALES",
            Dataset::CustomerData => "CUSTOMER_DATA",
            Dataset::ExperimentalMotors => "EXPERIMENTAL_MOTORS",
            Dataset::PostalCodes => "GEO_DATA_XREF",
        }
    }

    pub fn target(self, namespaces: &Namespaces) -> Result<QualifiedName, WarehouseError> {
        Ok(QualifiedName::new(
            namespaces.get(self.domain()).clone(),
            TableName::new(self.table_name())?,
        ))
    }
}
