// Band Migrate - Core Library
// Exposes all modules for use in the CLI and tests

pub mod config;
pub mod connections;
pub mod db;
pub mod entities;
pub mod error;
pub mod gazetteer;
pub mod model;
pub mod normalize;
pub mod report;
pub mod resolver;
pub mod source;

// Re-export commonly used types
pub use config::{BandColumns, ConnectionColumns, LegacyTable, MigrationConfig};
pub use connections::{Connection, ConnectionSet};
pub use db::{open_database, setup_database, write_model, WriteSummary, MEMBER_ROLE};
pub use entities::{
    Band, BandRef, BandRegistry, City, CityRef, Country, CountryRef, Person, PersonRef,
    Registries, State, StateRef, Website, WebsiteRef,
};
pub use error::ConfigError;
pub use gazetteer::{Gazetteer, GazetteerCity, GazetteerCountry, GazetteerState, LinkCounts};
pub use model::{DataModel, LegacyRecord};
pub use report::{FinalReport, MigrationReport, ReportSettings};
pub use resolver::{CityStateResolver, Placement};
pub use source::CsvRecordSource;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
