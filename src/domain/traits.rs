use futures::Stream;

use crate::domain::account::{AccountSnapshot, HistoryEntry};
use crate::domain::{Command, Error};

pub trait CommandStream {
    type CmdStream: Stream<Item = Result<Command, Error>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::CmdStream;
}

pub trait DeadLetterQueue {
    fn report(&self, error: &Error);
}

/// One mutation as committed: the new balance plus everything recorded
/// with it in the same transaction.
#[derive(Debug, Clone)]
pub struct Change {
    pub new_balance: u64,
    pub applied_delta: i64,
    pub ts_ms: u64,
    pub set_cooldown: Option<(String, u64)>, // action -> claim timestamp, unix ms
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied { new_balance: u64 },
    /// The expected version no longer matches; nothing was written.
    Conflict,
}

/// Durable keyed account storage. Mutation is snapshot plus versioned
/// commit: a commit only lands if the account version is unchanged since
/// the snapshot it was computed from.
pub trait AccountStore {
    /// Create the account with a zero balance iff absent. Idempotent.
    fn ensure(&self, id: &str) -> Result<AccountSnapshot, Error>;

    fn get(&self, id: &str) -> Result<Option<AccountSnapshot>, Error>;

    /// Apply a change as one durable transaction: balance write, history
    /// append, optional cooldown record.
    fn commit(
        &self,
        id: &str,
        expected_version: u64,
        change: &Change,
    ) -> Result<CommitOutcome, Error>;

    /// Retained history entries, oldest first.
    fn history(&self, id: &str) -> Result<Vec<HistoryEntry>, Error>;

    /// All (id, balance) pairs ordered by id.
    fn balances(&self) -> Result<Vec<(String, u64)>, Error>;
}

/// Uniform randomness the resolver and reward tables draw from.
pub trait DrawSource: Send {
    /// Uniform in [0, 1).
    fn next_f64(&mut self) -> f64;

    /// Uniform integer in [lo, hi], both ends inclusive.
    fn next_in(&mut self, lo: u64, hi: u64) -> u64;
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Where per-command reply lines go.
pub trait ReplySink {
    fn reply(&mut self, message: &str);
}
