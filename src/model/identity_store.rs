use tokio::sync::RwLock;

use crate::{domain::identity::{squared_distance, IdentityMatch, IdentityRecord}, tools::{log::{log_info, LogServiceType}, recognition::EMBEDDING_SIZE}};

use super::{error::{Error, Result}, store::SqliteStore};


/// Name -> embedding registry backed by SQLite.
///
/// The whole record set is mirrored in memory behind a read/write lock. Every mutation holds the
/// write guard across both the SQL statement and the in-memory update, so readers always see
/// either the state before a mutation or the state after it, and a failed SQL write changes nothing.
/// Records are kept in insertion order, which is the tie-break for equal distances.
pub struct IdentityStore {
    store: SqliteStore,
    records: RwLock<Vec<IdentityRecord>>,
}

impl IdentityStore {
    pub async fn open(store: SqliteStore) -> Result<Self> {
        let records = store.get_identities().await?;
        log_info(LogServiceType::Database, format!("Loaded {} identities", records.len()));
        Ok(Self { store, records: RwLock::new(records) })
    }

    pub async fn close(self) -> Result<()> {
        self.store.close().await
    }

    pub async fn add(&self, name: &str, vector: Vec<f32>) -> Result<()> {
        check_name(name)?;
        check_embedding(&vector)?;
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.name == name) {
            return Err(Error::Duplicate(name.to_string()));
        }
        let record = IdentityRecord { name: name.to_string(), vector };
        self.store.add_identity(record.clone()).await?;
        records.push(record);
        log_info(LogServiceType::Database, format!("Added identity {}", name));
        Ok(())
    }

    /// Missing names are a no-op.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let mut records = self.records.write().await;
        let Some(position) = records.iter().position(|r| r.name == name) else {
            return Ok(());
        };
        self.store.remove_identity(name).await?;
        records.remove(position);
        log_info(LogServiceType::Database, format!("Removed identity {}", name));
        Ok(())
    }

    pub async fn rename(&self, name: &str, new_name: &str) -> Result<()> {
        check_name(new_name)?;
        let mut records = self.records.write().await;
        let position = records.iter().position(|r| r.name == name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        if name == new_name {
            return Ok(());
        }
        if records.iter().any(|r| r.name == new_name) {
            return Err(Error::Duplicate(new_name.to_string()));
        }
        self.store.rename_identity(name, new_name).await?;
        records[position].name = new_name.to_string();
        log_info(LogServiceType::Database, format!("Renamed identity {} to {}", name, new_name));
        Ok(())
    }

    #[cfg(test)]
    pub async fn get(&self, name: &str) -> Option<IdentityRecord> {
        let records = self.records.read().await;
        records.iter().find(|r| r.name == name).cloned()
    }

    pub async fn list_names(&self) -> Vec<String> {
        let records = self.records.read().await;
        records.iter().map(|r| r.name.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// The `limit` closest records, nearest first. Equal distances keep insertion order.
    pub async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<IdentityMatch>> {
        if limit == 0 {
            return Err(Error::InvalidSearchLimit);
        }
        check_embedding(query)?;
        let records = self.records.read().await;
        let mut matches: Vec<IdentityMatch> = records.iter()
            .map(|r| IdentityMatch { name: r.name.clone(), distance: squared_distance(query, &r.vector) })
            .collect();
        drop(records);
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(limit);
        Ok(matches)
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName);
    }
    Ok(())
}

fn check_embedding(vector: &[f32]) -> Result<()> {
    if vector.len() != EMBEDDING_SIZE {
        return Err(Error::InvalidEmbedding(vector.len()));
    }
    Ok(())
}
