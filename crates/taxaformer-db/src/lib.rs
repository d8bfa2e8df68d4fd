pub use sea_orm;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub mod entities;

/// Bounded so a boot against an unreachable database fails fast and the
/// server can fall back to uncached operation.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let mut opts = ConnectOptions::new(database_url);
    opts.connect_timeout(CONNECT_TIMEOUT);
    Database::connect(opts).await
}
