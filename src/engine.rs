use std::collections::HashSet;

use futures::StreamExt;
use tracing::{debug, info};

use crate::cooldown::{self, DAY_MS, HOUR_MS, MINUTE_MS, WEEK_MS};
use crate::domain::{
    Command, CommandKind, Error, HistoryEntry,
    traits::{AccountStore, Clock, CommandStream, DeadLetterQueue, DrawSource, ReplySink},
};
use crate::games::{self, EarnAction, Game};
use crate::ledger::{AdminChange, Claim, DeclineReason, Ledger, Wager};

pub const DIG_PERIOD_MS: u64 = 5 * MINUTE_MS;
pub const FISH_PERIOD_MS: u64 = 3 * MINUTE_MS;
pub const WORK_PERIOD_MS: u64 = HOUR_MS;
pub const DAILY_PERIOD_MS: u64 = DAY_MS;
pub const WEEKLY_PERIOD_MS: u64 = WEEK_MS;

/// How many of the most recent history entries a history reply shows.
const HISTORY_TAIL: usize = 5;

pub fn period_for(action: &EarnAction) -> u64 {
    match action {
        EarnAction::Dig => DIG_PERIOD_MS,
        EarnAction::Fish => FISH_PERIOD_MS,
        EarnAction::Work { .. } => WORK_PERIOD_MS,
        EarnAction::Daily => DAILY_PERIOD_MS,
        EarnAction::Weekly => WEEKLY_PERIOD_MS,
    }
}

pub struct Engine<I, R, Q, S, D, C>
where
    I: CommandStream,
    R: ReplySink,
    Q: DeadLetterQueue,
    S: AccountStore,
    D: DrawSource,
    C: Clock,
{
    ingestion: I,
    replies: R,
    dlq: Q,
    ledger: Ledger<S, D, C>,
    owners: HashSet<String>,
}

impl<I, R, Q, S, D, C> Engine<I, R, Q, S, D, C>
where
    I: CommandStream,
    R: ReplySink,
    Q: DeadLetterQueue,
    S: AccountStore,
    D: DrawSource,
    C: Clock,
{
    pub fn new(
        ingestion: I,
        replies: R,
        dlq: Q,
        ledger: Ledger<S, D, C>,
        owners: HashSet<String>,
    ) -> Self {
        Self {
            ingestion,
            replies,
            dlq,
            ledger,
            owners,
        }
    }

    pub async fn process(&mut self) -> Result<(), Error> {
        let mut res = self.ingestion.stream();
        let mut processed: u64 = 0;
        let mut failed: u64 = 0;

        while let Some(cmd) = res.next().await {
            match cmd {
                Ok(cmd) => {
                    debug!(%cmd, "processing command");
                    match self.handle_command(cmd) {
                        Ok(()) => processed += 1,
                        Err(e) => {
                            failed += 1;
                            self.dlq.report(&e);
                        }
                    }
                }
                Err(e) => {
                    failed += 1;
                    self.dlq.report(&e);
                }
            }
        }

        info!(processed, failed, "command stream drained");
        Ok(())
    }

    fn handle_command(&mut self, cmd: Command) -> Result<(), Error> {
        // Whoever speaks gets an account; targets are ensured by the ledger.
        self.ledger.ensure_account(&cmd.user)?;

        match cmd.kind {
            CommandKind::Earn { action } => self.earn(&cmd.user, action),
            CommandKind::Wager { game, bet } => self.wager(&cmd.user, game, bet),
            CommandKind::Give { to, amount } => self.give(&cmd.user, &to, amount),
            CommandKind::Take { from, amount } => self.take(&cmd.user, &from, amount),
            CommandKind::Balance => self.balance(&cmd.user),
            CommandKind::History => self.history(&cmd.user),
        }
    }

    fn earn(&mut self, user: &str, action: EarnAction) -> Result<(), Error> {
        let period = period_for(&action);
        let name = action.name();
        let claim = self
            .ledger
            .claim_earning(user, name, period, |draws| games::reward(&action, draws))?;

        let line = match claim {
            Claim::Granted {
                amount,
                note,
                new_balance,
            } => format!("{user} earned {amount} chips from {note} (balance: {new_balance})"),
            Claim::OnCooldown { remaining_ms } => format!(
                "{user} must wait {} before trying {name} again",
                cooldown::format_wait(period, remaining_ms)
            ),
        };
        self.replies.reply(&line);
        Ok(())
    }

    fn wager(&mut self, user: &str, game: Game, bet: i64) -> Result<(), Error> {
        let outcome = self.ledger.place_wager(user, &game, bet)?;

        let line = match outcome {
            Wager::Settled {
                settlement,
                new_balance,
            } => format!(
                "{user} bet {bet} on {}: {} (balance: {new_balance})",
                game.name(),
                settlement.outcome
            ),
            Wager::Declined(reason) => declined(user, &reason),
        };
        self.replies.reply(&line);
        Ok(())
    }

    fn give(&mut self, user: &str, to: &str, amount: i64) -> Result<(), Error> {
        let authorized = self.owners.contains(user);
        let change = self.ledger.credit_admin(to, amount, authorized)?;

        let line = match change {
            AdminChange::Applied {
                applied_delta,
                new_balance,
            } => format!("{user} granted {applied_delta} chips to {to} (balance: {new_balance})"),
            AdminChange::Declined(reason) => declined(user, &reason),
        };
        self.replies.reply(&line);
        Ok(())
    }

    fn take(&mut self, user: &str, from: &str, amount: i64) -> Result<(), Error> {
        let authorized = self.owners.contains(user);
        let change = self.ledger.take_admin(from, amount, authorized)?;

        let line = match change {
            AdminChange::Applied {
                applied_delta,
                new_balance,
            } => format!(
                "{user} confiscated {} chips from {from} (balance: {new_balance})",
                -applied_delta
            ),
            AdminChange::Declined(reason) => declined(user, &reason),
        };
        self.replies.reply(&line);
        Ok(())
    }

    fn balance(&mut self, user: &str) -> Result<(), Error> {
        let balance = self.ledger.balance(user)?;
        self.replies.reply(&format!("{user} has {balance} chips"));
        Ok(())
    }

    fn history(&mut self, user: &str) -> Result<(), Error> {
        let entries = self.ledger.history(user)?;
        self.replies.reply(&render_history(user, &entries));
        Ok(())
    }

    /// Appends the balance summary, one `user,balance` row per account.
    pub fn flush(&mut self) -> Result<(), Error> {
        let balances = self.ledger.balances()?;

        self.replies.reply("user,balance");
        for (user, balance) in balances {
            self.replies.reply(&format!("{user},{balance}"));
        }
        Ok(())
    }
}

fn declined(user: &str, reason: &DeclineReason) -> String {
    match reason {
        DeclineReason::InvalidAmount => {
            format!("{user}: the amount must be a positive whole number of chips")
        }
        DeclineReason::InsufficientFunds { balance, requested } => {
            format!("{user}: cannot stake {requested} chips, only {balance} available")
        }
        DeclineReason::Unauthorized => format!("{user} is not allowed to do that"),
    }
}

fn render_history(user: &str, entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return format!("{user} has no recorded activity");
    }

    let tail = entries.len().saturating_sub(HISTORY_TAIL);
    let deltas: Vec<String> = entries[tail..]
        .iter()
        .map(|e| {
            if e.delta >= 0 {
                format!("+{}", e.delta)
            } else {
                e.delta.to_string()
            }
        })
        .collect();
    format!("{user} recent activity: {}", deltas.join(", "))
}
