use crate::games::{EarnAction, Game};

#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    Earn { action: EarnAction },
    Wager { game: Game, bet: i64 },
    Give { to: String, amount: i64 },
    Take { from: String, amount: i64 },
    Balance,
    History,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub user: String,
    pub kind: CommandKind,
}

impl core::fmt::Display for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.kind {
            CommandKind::Earn { action } => write!(f, "{},user={}", action.name(), self.user),
            CommandKind::Wager { game, bet } => {
                write!(f, "{},user={},bet={}", game.name(), self.user, bet)
            }
            CommandKind::Give { to, amount } => {
                write!(f, "give,user={},to={},amount={}", self.user, to, amount)
            }
            CommandKind::Take { from, amount } => {
                write!(f, "take,user={},from={},amount={}", self.user, from, amount)
            }
            CommandKind::Balance => write!(f, "balance,user={}", self.user),
            CommandKind::History => write!(f, "history,user={}", self.user),
        }
    }
}
