use std::collections::HashMap;

// Balances never exceed i64::MAX so applied deltas stay exact in history.
pub const MAX_BALANCE: u64 = i64::MAX as u64;

/// Point-in-time view of one account, read under its current version.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub id: String,
    pub balance: u64,                    // non-negative chip count
    pub version: u64,                    // bumped by every committed mutation
    pub cooldowns: HashMap<String, u64>, // action -> last claim, unix ms
}

/// Result of applying a delta to a snapshot balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub new_balance: u64,
    pub applied_delta: i64, // what actually lands in history, post-clamp
}

/// One history record: the delta that was actually committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub ts_ms: u64,
    pub delta: i64,
}

impl AccountSnapshot {
    /// Last claim timestamp for an action; never claimed reads as 0.
    pub fn cooldown(&self, action: &str) -> u64 {
        self.cooldowns.get(action).copied().unwrap_or(0)
    }

    pub fn credit(&self, amount: u64) -> Applied {
        let new_balance = self.balance.saturating_add(amount).min(MAX_BALANCE);
        self.applied(new_balance)
    }

    /// Debit that floors at zero; the applied delta records the truncation.
    pub fn debit_clamped(&self, amount: u64) -> Applied {
        let new_balance = self.balance.saturating_sub(amount);
        self.applied(new_balance)
    }

    /// Debit that must fit. None when the balance cannot cover it.
    pub fn debit_checked(&self, amount: u64) -> Option<Applied> {
        let new_balance = self.balance.checked_sub(amount)?;
        Some(self.applied(new_balance))
    }

    /// Route a signed settlement delta: credits always land, debits must fit.
    pub fn settle(&self, delta: i64) -> Option<Applied> {
        if delta >= 0 {
            Some(self.credit(delta as u64))
        } else {
            self.debit_checked(delta.unsigned_abs())
        }
    }

    fn applied(&self, new_balance: u64) -> Applied {
        Applied {
            new_balance,
            applied_delta: new_balance as i64 - self.balance as i64,
        }
    }
}
