//! Per-table pull checkpoints: the highest remote change-feed sequence
//! already applied locally.

use crate::db::LocalStore;
use crate::error::Result;

#[derive(Clone)]
pub struct CheckpointRepository {
    store: LocalStore,
}

impl CheckpointRepository {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub async fn last_seq(&self, table: &str) -> Result<i64> {
        let table = table.to_string();
        self.store
            .exec(move |conn| {
                let seq = conn
                    .query_row(
                        "SELECT last_seq FROM sync_checkpoint WHERE table_name = ?1",
                        [&table],
                        |row| row.get(0),
                    )
                    .or_else(|err| match err {
                        rusqlite::Error::QueryReturnedNoRows => Ok(0),
                        other => Err(other),
                    })?;
                Ok(seq)
            })
            .await
    }

    /// Advance the checkpoint. Never regresses: replaying an old feed page
    /// cannot move it backwards.
    pub async fn advance(&self, table: &str, seq: i64) -> Result<()> {
        let table = table.to_string();
        self.store
            .exec(move |conn| {
                conn.execute(
                    "INSERT INTO sync_checkpoint (table_name, last_seq) VALUES (?1, ?2)
                     ON CONFLICT(table_name) DO UPDATE
                     SET last_seq = MAX(last_seq, excluded.last_seq)",
                    rusqlite::params![table, seq],
                )?;
                Ok(())
            })
            .await
    }
}
