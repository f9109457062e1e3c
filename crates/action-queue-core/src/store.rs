//! Persistent storage for action programs using redb.
//!
//! # Table design
//!
//! ```text
//! programs  programId → JSON ActionQueueItem { program, state }
//! claims    programId → JSON Claim { owner, claimedAt }
//! retired   programId → removal time (unix ms)
//! ```
//!
//! Program definition and progress share one record so a state write is a
//! single-key read-modify-write inside one write transaction. `claims` is the
//! cross-process execution marker: at most one runner advances a program at
//! a time. `retired` keeps removed ids so they are never reused.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};
use crate::program::{ActionProgram, ActionProgramState, ActionQueueItem, ActionQueueMap};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const PROGRAMS: TableDefinition<&str, &[u8]> = TableDefinition::new("programs");
const CLAIMS: TableDefinition<&str, &[u8]> = TableDefinition::new("claims");
const RETIRED: TableDefinition<&str, i64> = TableDefinition::new("retired");

fn store_err(e: impl std::fmt::Display) -> QueueError {
    QueueError::Store(e.to_string())
}

/// Who is executing a program, and since when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub owner: String,
    pub claimed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ProgramStore
// ---------------------------------------------------------------------------

pub struct ProgramStore {
    db: Database,
}

impl ProgramStore {
    /// Open or create the redb database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(PROGRAMS).map_err(store_err)?;
        wt.open_table(CLAIMS).map_err(store_err)?;
        wt.open_table(RETIRED).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(Self { db })
    }

    /// Store a new program with a fresh state. Ids of live or removed
    /// programs are rejected.
    pub fn insert(&self, program: &ActionProgram) -> Result<ActionQueueItem> {
        let item = ActionQueueItem::new(program.clone());
        let id = program.program_id.as_str();
        let value = serde_json::to_vec(&item)?;

        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let retired = wt.open_table(RETIRED).map_err(store_err)?;
            if retired.get(id).map_err(store_err)?.is_some() {
                return Err(QueueError::ProgramExists(id.to_string()));
            }
            let mut table = wt.open_table(PROGRAMS).map_err(store_err)?;
            if table.get(id).map_err(store_err)?.is_some() {
                return Err(QueueError::ProgramExists(id.to_string()));
            }
            table.insert(id, value.as_slice()).map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(item)
    }

    pub fn get(&self, program_id: &str) -> Result<Option<ActionQueueItem>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(PROGRAMS).map_err(store_err)?;
        match table.get(program_id).map_err(store_err)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    /// Every stored program keyed by id.
    pub fn list(&self) -> Result<ActionQueueMap> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(PROGRAMS).map_err(store_err)?;

        let mut result = ActionQueueMap::new();
        for entry in table.iter().map_err(store_err)? {
            let (k, v) = entry.map_err(store_err)?;
            let item: ActionQueueItem = serde_json::from_slice(v.value())?;
            result.insert(k.value().to_string(), item);
        }
        Ok(result)
    }

    /// Atomically apply `f` to the stored state of `program_id` and return
    /// the new state.
    pub fn update_state<F>(&self, program_id: &str, f: F) -> Result<ActionProgramState>
    where
        F: FnOnce(&mut ActionProgramState),
    {
        let wt = self.db.begin_write().map_err(store_err)?;
        let state = {
            let mut table = wt.open_table(PROGRAMS).map_err(store_err)?;
            let raw = table
                .get(program_id)
                .map_err(store_err)?
                .map(|v| v.value().to_vec())
                .ok_or_else(|| QueueError::ProgramNotFound(program_id.to_string()))?;
            let mut item: ActionQueueItem = serde_json::from_slice(&raw)?;
            f(&mut item.state);
            let value = serde_json::to_vec(&item)?;
            table
                .insert(program_id, value.as_slice())
                .map_err(store_err)?;
            item.state
        };
        wt.commit().map_err(store_err)?;
        Ok(state)
    }

    /// Replace the stored state with `state`.
    pub fn save_state(&self, state: &ActionProgramState) -> Result<()> {
        self.update_state(&state.program_id, |stored| *stored = state.clone())?;
        Ok(())
    }

    /// Delete a program and retire its id. Any claim is dropped with it.
    pub fn remove(&self, program_id: &str) -> Result<ActionQueueItem> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let item = {
            let mut table = wt.open_table(PROGRAMS).map_err(store_err)?;
            let raw = table
                .remove(program_id)
                .map_err(store_err)?
                .map(|v| v.value().to_vec())
                .ok_or_else(|| QueueError::ProgramNotFound(program_id.to_string()))?;
            let item: ActionQueueItem = serde_json::from_slice(&raw)?;

            let mut claims = wt.open_table(CLAIMS).map_err(store_err)?;
            claims.remove(program_id).map_err(store_err)?;
            let mut retired = wt.open_table(RETIRED).map_err(store_err)?;
            retired
                .insert(program_id, Utc::now().timestamp_millis())
                .map_err(store_err)?;
            item
        };
        wt.commit().map_err(store_err)?;
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Execution claims
    // -----------------------------------------------------------------------

    /// Compare-and-set the execution marker of `program_id`.
    ///
    /// Succeeds when the program is unclaimed, already claimed by `owner`,
    /// or held by a claim older than `ttl` (a runner that died mid-step).
    pub fn try_claim(
        &self,
        program_id: &str,
        owner: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool> {
        let ttl = chrono::Duration::from_std(ttl).map_err(store_err)?;
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut claims = wt.open_table(CLAIMS).map_err(store_err)?;
            let existing = claims
                .get(program_id)
                .map_err(store_err)?
                .map(|v| v.value().to_vec());
            if let Some(raw) = existing {
                let claim: Claim = serde_json::from_slice(&raw)?;
                if claim.owner != owner && claim.claimed_at + ttl > now {
                    return Ok(false);
                }
                if claim.owner != owner {
                    tracing::warn!(
                        program_id,
                        stale_owner = %claim.owner,
                        claimed_at = %claim.claimed_at,
                        "taking over stale program claim"
                    );
                }
            }
            let value = serde_json::to_vec(&Claim {
                owner: owner.to_string(),
                claimed_at: now,
            })?;
            claims
                .insert(program_id, value.as_slice())
                .map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(true)
    }

    /// Drop the marker if `owner` still holds it.
    pub fn release(&self, program_id: &str, owner: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut claims = wt.open_table(CLAIMS).map_err(store_err)?;
            let existing = claims
                .get(program_id)
                .map_err(store_err)?
                .map(|v| v.value().to_vec());
            if let Some(raw) = existing {
                let claim: Claim = serde_json::from_slice(&raw)?;
                if claim.owner == owner {
                    claims.remove(program_id).map_err(store_err)?;
                }
            }
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn claim(&self, program_id: &str) -> Result<Option<Claim>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let claims = rt.open_table(CLAIMS).map_err(store_err)?;
        match claims.get(program_id).map_err(store_err)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    /// On startup, drop every claim older than `max_age`. Their owners died
    /// mid-step; the next run re-checks the persisted effect.
    ///
    /// Returns the number of claims recovered.
    pub fn recover_stale_claims(&self, max_age: Duration) -> Result<u32> {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).map_err(store_err)?;

        let wt = self.db.begin_write().map_err(store_err)?;
        let count = {
            let mut claims = wt.open_table(CLAIMS).map_err(store_err)?;
            let mut stale = Vec::new();
            for entry in claims.iter().map_err(store_err)? {
                let (k, v) = entry.map_err(store_err)?;
                let claim: Claim = serde_json::from_slice(v.value())?;
                if claim.claimed_at < cutoff {
                    stale.push(k.value().to_string());
                }
            }
            for program_id in &stale {
                claims.remove(program_id.as_str()).map_err(store_err)?;
            }
            stale.len() as u32
        };
        wt.commit().map_err(store_err)?;
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
