use std::path::Path;

use tokio_rusqlite::Connection;

use crate::model::store::sql::migrate_database;
use crate::tools::log::{log_info, LogServiceType};

use super::error::Result;


mod sql;


/// Durable side of the identity store: one SQLite file holding every `{name, vector}` record.
pub struct SqliteStore {
	connection: Connection,
}

// Constructor
impl SqliteStore {
	pub async fn new(db_path: &Path) -> Result<Self> {
        let connection = Connection::open(db_path).await?;
        Self::from_connection(connection).await
	}

    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().await?;
        Self::from_connection(connection).await
    }

    async fn from_connection(connection: Connection) -> Result<Self> {
        let version = migrate_database(&connection).await?;
        log_info(LogServiceType::Database, format!("Current Database version: {}", version));
		Ok(Self { connection })
    }

    pub async fn close(self) -> Result<()> {
        self.connection.close().await?;
        Ok(())
    }
}
