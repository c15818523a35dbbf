use std::path::{Path, PathBuf};

use async_trait::async_trait;
use outreach_common::{FollowUpStatus, internal};
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};

use super::memory::{MemoryLeadStore, Tables};
use crate::{
    FollowUp, FollowUpId, FollowUpQuery, Lead, LeadId, LeadPatch, LeadQuery, SerializationError,
    r#trait::{FollowUpStore, LeadStore},
};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    leads: Vec<Lead>,
    followups: Vec<FollowUp>,
}

/// Lead store persisted to a single snapshot file.
///
/// Reads are served from memory. Every mutation rewrites the snapshot
/// through a temporary file that is renamed over the original, so a crash
/// leaves either the previous or the new state on disk, never a torn file.
///
/// Mutations are serialized and each one is written out before it returns.
/// A mutation whose snapshot cannot be written is undone in memory, so the
/// tables never hold a change the file does not.
#[derive(Debug)]
pub struct FileLeadStore {
    path: PathBuf,
    memory: MemoryLeadStore,
    persist: Mutex<()>,
}

impl FileLeadStore {
    /// Load the snapshot at `path`, starting empty if it does not exist.
    ///
    /// # Errors
    /// If the file exists but cannot be read or decoded.
    pub fn open(path: impl Into<PathBuf>, capacity: Option<usize>) -> crate::Result<Self> {
        let path = path.into();

        let tables = match std::fs::read(&path) {
            Ok(bytes) => decode(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                internal!(
                    level = INFO,
                    "No lead snapshot at {}, starting empty",
                    path.display()
                );
                Tables::default()
            }
            Err(e) => return Err(e.into()),
        };

        internal!(
            level = INFO,
            "Loaded {} leads and {} follow-ups from {}",
            tables.leads.len(),
            tables.followups.len(),
            path.display()
        );

        Ok(Self {
            path,
            memory: MemoryLeadStore::from_tables(tables, capacity),
            persist: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot, or run `rollback` and return the write error.
    ///
    /// Callers hold `persist` from before their mutation until this returns.
    async fn commit<F>(&self, rollback: F) -> crate::Result<()>
    where
        F: FnOnce(&MemoryLeadStore) -> crate::Result<()> + Send,
    {
        match self.write_snapshot().await {
            Ok(()) => Ok(()),
            Err(e) => {
                internal!(
                    level = ERROR,
                    error = %e,
                    "Failed to persist lead snapshot to {}, rolling back",
                    self.path.display()
                );
                rollback(&self.memory)?;
                Err(e)
            }
        }
    }

    async fn write_snapshot(&self) -> crate::Result<()> {
        let (leads, followups) = self.memory.snapshot()?;
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            leads,
            followups,
        };
        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(SerializationError::from)?;

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        fs::write(&temp, &bytes).await?;
        fs::rename(&temp, &self.path).await?;

        internal!(
            level = DEBUG,
            "Persisted lead snapshot ({} bytes) to {}",
            bytes.len(),
            self.path.display()
        );

        Ok(())
    }
}

fn decode(bytes: &[u8]) -> crate::Result<Tables> {
    let (snapshot, _): (Snapshot, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(SerializationError::from)?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SerializationError::Version {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        }
        .into());
    }

    Ok(Tables {
        leads: snapshot.leads.into_iter().map(|lead| (lead.id, lead)).collect(),
        followups: snapshot
            .followups
            .into_iter()
            .map(|followup| (followup.id, followup))
            .collect(),
    })
}

#[async_trait]
impl LeadStore for FileLeadStore {
    async fn insert(&self, lead: &Lead) -> crate::Result<LeadId> {
        let _guard = self.persist.lock().await;

        let id = self.memory.insert(lead).await?;
        self.commit(|memory| memory.restore_lead(id, None)).await?;
        Ok(id)
    }

    async fn get(&self, id: &LeadId) -> crate::Result<Lead> {
        self.memory.get(id).await
    }

    async fn query(&self, query: &LeadQuery) -> crate::Result<Vec<Lead>> {
        self.memory.query(query).await
    }

    async fn update(&self, id: &LeadId, patch: &LeadPatch) -> crate::Result<Lead> {
        let _guard = self.persist.lock().await;

        let previous = self.memory.get(id).await?;
        let lead = self.memory.update(id, patch).await?;
        self.commit(|memory| memory.restore_lead(*id, Some(previous)))
            .await?;
        Ok(lead)
    }
}

#[async_trait]
impl FollowUpStore for FileLeadStore {
    async fn insert_followup(&self, followup: &FollowUp) -> crate::Result<FollowUpId> {
        let _guard = self.persist.lock().await;

        let id = self.memory.insert_followup(followup).await?;
        self.commit(|memory| memory.restore_followup(id, None))
            .await?;
        Ok(id)
    }

    async fn get_followup(&self, id: &FollowUpId) -> crate::Result<FollowUp> {
        self.memory.get_followup(id).await
    }

    async fn query_followups(&self, query: &FollowUpQuery) -> crate::Result<Vec<FollowUp>> {
        self.memory.query_followups(query).await
    }

    async fn transition_followup(
        &self,
        id: &FollowUpId,
        status: FollowUpStatus,
        note: Option<String>,
    ) -> crate::Result<FollowUp> {
        let _guard = self.persist.lock().await;

        let previous = self.memory.get_followup(id).await?;
        let followup = self.memory.transition_followup(id, status, note).await?;
        self.commit(|memory| memory.restore_followup(*id, Some(previous)))
            .await?;
        Ok(followup)
    }
}
