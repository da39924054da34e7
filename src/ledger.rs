use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::cooldown::{self, ClaimCheck};
use crate::domain::Error;
use crate::domain::account::HistoryEntry;
use crate::domain::traits::{AccountStore, Change, Clock, CommitOutcome, DrawSource};
use crate::games::{self, Game, Reward, Settlement};

/// Commit attempts per operation before the conflict escalates.
pub const COMMIT_RETRY_BUDGET: u32 = 16;

/// Why an operation was declined. Declines are results, not faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReason {
    /// Zero or negative amount.
    InvalidAmount,
    /// Bet exceeds the current balance.
    InsufficientFunds { balance: u64, requested: u64 },
    /// Admin operation attempted without authorization.
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    Granted {
        amount: u64,
        note: String,
        new_balance: u64,
    },
    OnCooldown {
        remaining_ms: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Wager {
    Settled {
        settlement: Settlement,
        new_balance: u64,
    },
    Declined(DeclineReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminChange {
    Applied {
        applied_delta: i64,
        new_balance: u64,
    },
    Declined(DeclineReason),
}

#[derive(Debug, Clone, Copy)]
enum AdminOp {
    Credit,
    Take,
}

impl AdminOp {
    fn name(&self) -> &'static str {
        match self {
            AdminOp::Credit => "credit",
            AdminOp::Take => "take",
        }
    }
}

/// Orchestrates store, gate and resolver. Every mutation is one versioned
/// commit; a lost race re-reads and re-validates before trying again, so
/// per-account changes serialize without holding any lock across the
/// read-compute-write window.
pub struct Ledger<S, D, C> {
    store: S,
    draws: Mutex<D>,
    clock: C,
}

impl<S, D, C> Ledger<S, D, C>
where
    S: AccountStore,
    D: DrawSource,
    C: Clock,
{
    pub fn new(store: S, draws: D, clock: C) -> Self {
        Self {
            store,
            draws: Mutex::new(draws),
            clock,
        }
    }

    pub fn ensure_account(&self, id: &str) -> Result<(), Error> {
        self.store.ensure(id).map(|_| ())
    }

    /// Current balance; unknown accounts read as zero without being created.
    pub fn balance(&self, id: &str) -> Result<u64, Error> {
        Ok(self.store.get(id)?.map(|snap| snap.balance).unwrap_or(0))
    }

    pub fn history(&self, id: &str) -> Result<Vec<HistoryEntry>, Error> {
        self.store.history(id)
    }

    pub fn balances(&self) -> Result<Vec<(String, u64)>, Error> {
        self.store.balances()
    }

    /// Claim a timed earning. The reward is drawn once; the credit and the
    /// cooldown timestamp land in one commit. A conflicted commit re-reads
    /// and re-runs the gate, since a parallel claim may have won the race.
    pub fn claim_earning<F>(
        &self,
        id: &str,
        action: &str,
        period_ms: u64,
        reward_fn: F,
    ) -> Result<Claim, Error>
    where
        F: FnOnce(&mut D) -> Reward,
    {
        let mut reward_fn = Some(reward_fn);
        let mut drawn: Option<Reward> = None;

        for _ in 0..COMMIT_RETRY_BUDGET {
            let snap = self.store.ensure(id)?;
            let now = self.clock.now_ms();
            if let ClaimCheck::Wait { remaining_ms } =
                cooldown::check(snap.cooldown(action), now, period_ms)
            {
                return Ok(Claim::OnCooldown { remaining_ms });
            }

            if drawn.is_none() {
                if let Some(f) = reward_fn.take() {
                    let mut draws = self.draw_source();
                    drawn = Some(f(&mut *draws));
                }
            }
            let Some(reward) = drawn.as_ref() else { break };

            let applied = snap.credit(reward.amount);
            let change = Change {
                new_balance: applied.new_balance,
                applied_delta: applied.applied_delta,
                ts_ms: now,
                set_cooldown: Some((action.to_string(), now)),
            };
            match self.store.commit(id, snap.version, &change)? {
                CommitOutcome::Applied { new_balance } => {
                    return Ok(Claim::Granted {
                        amount: reward.amount,
                        note: reward.note.clone(),
                        new_balance,
                    });
                }
                CommitOutcome::Conflict => {}
            }
        }

        Err(Self::conflict_exhausted(id, action))
    }

    /// Settle a wager. The bet is validated against the same snapshot the
    /// commit is checked against; the game resolves once per accepted
    /// wager, and a conflicted commit re-validates funds before reusing
    /// the settlement.
    pub fn place_wager(&self, id: &str, game: &Game, bet: i64) -> Result<Wager, Error> {
        if bet <= 0 {
            return Ok(Wager::Declined(DeclineReason::InvalidAmount));
        }
        let bet = bet as u64;
        let mut settlement: Option<Settlement> = None;

        for _ in 0..COMMIT_RETRY_BUDGET {
            let snap = self.store.ensure(id)?;
            if bet > snap.balance {
                return Ok(Wager::Declined(DeclineReason::InsufficientFunds {
                    balance: snap.balance,
                    requested: bet,
                }));
            }

            if settlement.is_none() {
                let mut draws = self.draw_source();
                settlement = Some(games::resolve(game, bet, &mut *draws));
            }
            let Some(settled) = settlement.as_ref() else {
                break;
            };

            let Some(applied) = snap.settle(settled.delta) else {
                return Ok(Wager::Declined(DeclineReason::InsufficientFunds {
                    balance: snap.balance,
                    requested: bet,
                }));
            };
            let change = Change {
                new_balance: applied.new_balance,
                applied_delta: applied.applied_delta,
                ts_ms: self.clock.now_ms(),
                set_cooldown: None,
            };
            match self.store.commit(id, snap.version, &change)? {
                CommitOutcome::Applied { new_balance } => {
                    return Ok(Wager::Settled {
                        settlement: settled.clone(),
                        new_balance,
                    });
                }
                CommitOutcome::Conflict => {}
            }
        }

        Err(Self::conflict_exhausted(id, game.name()))
    }

    /// Plain credit with no gate and no clamping concerns.
    pub fn credit_admin(
        &self,
        id: &str,
        amount: i64,
        authorized: bool,
    ) -> Result<AdminChange, Error> {
        self.admin_change(id, amount, authorized, AdminOp::Credit)
    }

    /// Administrative debit that floors at zero; history records what was
    /// actually removed.
    pub fn take_admin(&self, id: &str, amount: i64, authorized: bool) -> Result<AdminChange, Error> {
        self.admin_change(id, amount, authorized, AdminOp::Take)
    }

    fn admin_change(
        &self,
        id: &str,
        amount: i64,
        authorized: bool,
        op: AdminOp,
    ) -> Result<AdminChange, Error> {
        if !authorized {
            return Ok(AdminChange::Declined(DeclineReason::Unauthorized));
        }
        if amount <= 0 {
            return Ok(AdminChange::Declined(DeclineReason::InvalidAmount));
        }
        let amount = amount as u64;

        for _ in 0..COMMIT_RETRY_BUDGET {
            let snap = self.store.ensure(id)?;
            let applied = match op {
                AdminOp::Credit => snap.credit(amount),
                AdminOp::Take => snap.debit_clamped(amount),
            };
            let change = Change {
                new_balance: applied.new_balance,
                applied_delta: applied.applied_delta,
                ts_ms: self.clock.now_ms(),
                set_cooldown: None,
            };
            match self.store.commit(id, snap.version, &change)? {
                CommitOutcome::Applied { new_balance } => {
                    return Ok(AdminChange::Applied {
                        applied_delta: applied.applied_delta,
                        new_balance,
                    });
                }
                CommitOutcome::Conflict => {}
            }
        }

        Err(Self::conflict_exhausted(id, op.name()))
    }

    fn draw_source(&self) -> MutexGuard<'_, D> {
        self.draws.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn conflict_exhausted(id: &str, op: &str) -> Error {
        warn!(account = id, operation = op, "commit retry budget exhausted");
        Error::Persistence(format!(
            "commit retry budget exhausted for {id} during {op}"
        ))
    }
}
