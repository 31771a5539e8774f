use rusqlite::{params, Row};
#[cfg(test)]
use rusqlite::OptionalExtension;

use crate::domain::identity::IdentityRecord;
use super::{blob_to_vector, vector_to_blob};
use super::super::{Result, SqliteStore};


impl SqliteStore {

    fn row_to_identity(row: &Row) -> rusqlite::Result<IdentityRecord> {
        let blob: Vec<u8> = row.get(1)?;
        Ok(IdentityRecord {
            name: row.get(0)?,
            vector: blob_to_vector(&blob),
        })
    }

    /// All records in insertion order.
    pub async fn get_identities(&self) -> Result<Vec<IdentityRecord>> {
        let rows = self.connection.call( move |conn| {
            let mut query = conn.prepare("SELECT name, vector FROM identities ORDER BY rowid")?;
            let rows = query.query_map([], Self::row_to_identity)?;
            let identities: Vec<IdentityRecord> = rows.collect::<std::result::Result<Vec<IdentityRecord>, rusqlite::Error>>()?;
            Ok(identities)
        }).await?;
        Ok(rows)
    }

    #[cfg(test)]
    pub async fn get_identity(&self, name: &str) -> Result<Option<IdentityRecord>> {
        let name = name.to_string();
        let row = self.connection.call( move |conn| {
            let mut query = conn.prepare("SELECT name, vector FROM identities WHERE name = ?")?;
            let row = query.query_row([name], Self::row_to_identity).optional()?;
            Ok(row)
        }).await?;
        Ok(row)
    }

    pub async fn add_identity(&self, identity: IdentityRecord) -> Result<()> {
        self.connection.call( move |conn| {
            conn.execute("INSERT INTO identities (name, vector) VALUES (?, ?)", params![
                identity.name,
                vector_to_blob(&identity.vector)
            ])?;
            Ok(())
        }).await?;
        Ok(())
    }

    /// Returns the number of deleted rows.
    pub async fn remove_identity(&self, name: &str) -> Result<usize> {
        let name = name.to_string();
        let removed = self.connection.call( move |conn| {
            let removed = conn.execute("DELETE FROM identities WHERE name = ?", [name])?;
            Ok(removed)
        }).await?;
        Ok(removed)
    }

    /// Single statement: the row keeps its rowid and vector, only the key changes.
    pub async fn rename_identity(&self, name: &str, new_name: &str) -> Result<usize> {
        let name = name.to_string();
        let new_name = new_name.to_string();
        let renamed = self.connection.call( move |conn| {
            let renamed = conn.execute("UPDATE identities SET name = ? WHERE name = ?", params![new_name, name])?;
            Ok(renamed)
        }).await?;
        Ok(renamed)
    }
}
