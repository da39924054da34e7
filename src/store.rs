use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension, params};

use crate::domain::Error;
use crate::domain::account::{AccountSnapshot, HistoryEntry};
use crate::domain::traits::{AccountStore, Change, CommitOutcome};

/// Most recent history entries kept per account; older rows are pruned
/// inside the committing transaction.
pub const HISTORY_CAP: u64 = 1000;

const SCHEMA: &str = "BEGIN;
CREATE TABLE IF NOT EXISTS accounts (
    id      TEXT PRIMARY KEY,
    balance INTEGER NOT NULL,
    version INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS cooldowns (
    account_id TEXT NOT NULL,
    action     TEXT NOT NULL,
    last_ms    INTEGER NOT NULL,
    PRIMARY KEY (account_id, action)
);
CREATE TABLE IF NOT EXISTS history (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL,
    ts_ms      INTEGER NOT NULL,
    delta      INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS history_account ON history (account_id, seq);
COMMIT;";

/// Account store over a single SQLite connection. Each commit is one
/// transaction, so a mutation is fully durable by the time the call
/// returns.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub(crate) fn in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Persistence(e.to_string())
}

fn snapshot(conn: &Connection, id: &str) -> Result<Option<AccountSnapshot>, Error> {
    let row = conn
        .query_row(
            "SELECT balance, version FROM accounts WHERE id = ?1",
            params![id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()
        .map_err(db_err)?;

    let Some((balance, version)) = row else {
        return Ok(None);
    };

    let mut cooldowns = HashMap::new();
    let mut stmt = conn
        .prepare("SELECT action, last_ms FROM cooldowns WHERE account_id = ?1")
        .map_err(db_err)?;
    let rows = stmt
        .query_map(params![id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(db_err)?;
    for row in rows {
        let (action, last_ms) = row.map_err(db_err)?;
        cooldowns.insert(action, last_ms as u64);
    }

    Ok(Some(AccountSnapshot {
        id: id.to_string(),
        balance: balance as u64,
        version: version as u64,
        cooldowns,
    }))
}

impl AccountStore for SqliteStore {
    fn ensure(&self, id: &str) -> Result<AccountSnapshot, Error> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO accounts (id, balance, version) VALUES (?1, 0, 0)",
            params![id],
        )
        .map_err(db_err)?;
        snapshot(&conn, id)?
            .ok_or_else(|| Error::Persistence(format!("account {id} missing after ensure")))
    }

    fn get(&self, id: &str) -> Result<Option<AccountSnapshot>, Error> {
        snapshot(&self.lock(), id)
    }

    fn commit(
        &self,
        id: &str,
        expected_version: u64,
        change: &Change,
    ) -> Result<CommitOutcome, Error> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(db_err)?;

        let updated = tx
            .execute(
                "UPDATE accounts SET balance = ?1, version = version + 1
                 WHERE id = ?2 AND version = ?3",
                params![change.new_balance as i64, id, expected_version as i64],
            )
            .map_err(db_err)?;
        if updated == 0 {
            // Dropping the transaction rolls it back.
            return Ok(CommitOutcome::Conflict);
        }

        tx.execute(
            "INSERT INTO history (account_id, ts_ms, delta) VALUES (?1, ?2, ?3)",
            params![id, change.ts_ms as i64, change.applied_delta],
        )
        .map_err(db_err)?;
        tx.execute(
            "DELETE FROM history WHERE account_id = ?1 AND seq NOT IN (
                 SELECT seq FROM history WHERE account_id = ?1
                 ORDER BY seq DESC LIMIT ?2
             )",
            params![id, HISTORY_CAP as i64],
        )
        .map_err(db_err)?;

        if let Some((action, last_ms)) = &change.set_cooldown {
            tx.execute(
                "INSERT INTO cooldowns (account_id, action, last_ms) VALUES (?1, ?2, ?3)
                 ON CONFLICT (account_id, action)
                 DO UPDATE SET last_ms = MAX(last_ms, excluded.last_ms)",
                params![id, action, *last_ms as i64],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        Ok(CommitOutcome::Applied {
            new_balance: change.new_balance,
        })
    }

    fn history(&self, id: &str) -> Result<Vec<HistoryEntry>, Error> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT ts_ms, delta FROM history WHERE account_id = ?1 ORDER BY seq ASC")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(HistoryEntry {
                    ts_ms: row.get::<_, i64>(0)? as u64,
                    delta: row.get(1)?,
                })
            })
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_err)?);
        }
        Ok(entries)
    }

    fn balances(&self) -> Result<Vec<(String, u64)>, Error> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT id, balance FROM accounts ORDER BY id ASC")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(db_err)?;

        let mut all = Vec::new();
        for row in rows {
            all.push(row.map_err(db_err)?);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_change(new_balance: u64, applied_delta: i64) -> Change {
        Change {
            new_balance,
            applied_delta,
            ts_ms: 1_000,
            set_cooldown: None,
        }
    }

    #[test]
    fn ensure_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();

        let first = store.ensure("alice").unwrap();
        assert_eq!(first.balance, 0);
        assert_eq!(first.version, 0);
        assert!(first.cooldowns.is_empty());

        let again = store.ensure("alice").unwrap();
        assert_eq!(again.balance, 0);
        assert_eq!(again.version, 0);
        assert_eq!(store.balances().unwrap().len(), 1);
    }

    #[test]
    fn get_returns_none_for_unknown_accounts() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get("ghost").unwrap().is_none());
    }

    #[test]
    fn commit_applies_and_bumps_the_version() {
        let store = SqliteStore::in_memory().unwrap();
        let snap = store.ensure("alice").unwrap();

        let outcome = store
            .commit("alice", snap.version, &plain_change(75, 75))
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Applied { new_balance: 75 });

        let snap = store.get("alice").unwrap().unwrap();
        assert_eq!(snap.balance, 75);
        assert_eq!(snap.version, 1);
    }

    #[test]
    fn stale_commit_conflicts_and_writes_nothing() {
        let store = SqliteStore::in_memory().unwrap();
        let snap = store.ensure("alice").unwrap();

        store
            .commit("alice", snap.version, &plain_change(75, 75))
            .unwrap();

        // Same version again: the first commit already consumed it.
        let outcome = store
            .commit("alice", snap.version, &plain_change(999, 999))
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);

        let snap = store.get("alice").unwrap().unwrap();
        assert_eq!(snap.balance, 75);
        assert_eq!(snap.version, 1);
        assert_eq!(store.history("alice").unwrap().len(), 1);
    }

    #[test]
    fn cooldowns_commit_with_the_balance_and_stay_monotone() {
        let store = SqliteStore::in_memory().unwrap();
        let snap = store.ensure("alice").unwrap();

        let change = Change {
            new_balance: 50,
            applied_delta: 50,
            ts_ms: 5_000,
            set_cooldown: Some(("daily".to_string(), 5_000)),
        };
        store.commit("alice", snap.version, &change).unwrap();

        let snap = store.get("alice").unwrap().unwrap();
        assert_eq!(snap.cooldown("daily"), 5_000);

        // An older timestamp must not rewind the record.
        let change = Change {
            new_balance: 60,
            applied_delta: 10,
            ts_ms: 6_000,
            set_cooldown: Some(("daily".to_string(), 4_000)),
        };
        store.commit("alice", snap.version, &change).unwrap();

        let snap = store.get("alice").unwrap().unwrap();
        assert_eq!(snap.cooldown("daily"), 5_000);
    }

    #[test]
    fn history_replay_matches_the_balance() {
        let store = SqliteStore::in_memory().unwrap();
        let mut snap = store.ensure("alice").unwrap();

        for delta in [100i64, -30, 55, -25] {
            let new_balance = (snap.balance as i64 + delta) as u64;
            store
                .commit("alice", snap.version, &plain_change(new_balance, delta))
                .unwrap();
            snap = store.get("alice").unwrap().unwrap();
        }

        let entries = store.history("alice").unwrap();
        let replayed: i64 = entries.iter().map(|e| e.delta).sum();
        assert_eq!(replayed, snap.balance as i64);
        assert_eq!(snap.balance, 100);
    }

    #[test]
    fn history_is_pruned_to_the_cap() {
        let store = SqliteStore::in_memory().unwrap();
        let mut snap = store.ensure("alice").unwrap();

        let extra = 25;
        for _ in 0..(HISTORY_CAP + extra) {
            store
                .commit("alice", snap.version, &plain_change(snap.balance + 1, 1))
                .unwrap();
            snap = store.get("alice").unwrap().unwrap();
        }

        let entries = store.history("alice").unwrap();
        assert_eq!(entries.len() as u64, HISTORY_CAP);
        assert_eq!(snap.balance, HISTORY_CAP + extra);

        // Replay covers exactly the retained window.
        let replayed: i64 = entries.iter().map(|e| e.delta).sum();
        assert_eq!(replayed as u64, HISTORY_CAP);
    }

    #[test]
    fn balances_list_is_ordered_by_id() {
        let store = SqliteStore::in_memory().unwrap();
        for id in ["zoe", "alice", "mike"] {
            store.ensure(id).unwrap();
        }
        let snap = store.ensure("mike").unwrap();
        store
            .commit("mike", snap.version, &plain_change(10, 10))
            .unwrap();

        let all = store.balances().unwrap();
        assert_eq!(
            all,
            vec![
                ("alice".to_string(), 0),
                ("mike".to_string(), 10),
                ("zoe".to_string(), 0)
            ]
        );
    }

    #[test]
    fn committed_state_survives_reopening() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chips.sqlite");

        {
            let store = SqliteStore::open(&path).unwrap();
            let snap = store.ensure("alice").unwrap();
            let change = Change {
                new_balance: 250,
                applied_delta: 250,
                ts_ms: 9_000,
                set_cooldown: Some(("weekly".to_string(), 9_000)),
            };
            store.commit("alice", snap.version, &change).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let snap = store.get("alice").unwrap().unwrap();
        assert_eq!(snap.balance, 250);
        assert_eq!(snap.cooldown("weekly"), 9_000);
        assert_eq!(store.history("alice").unwrap().len(), 1);
    }
}
