//! Earning reward tables and wager resolution.
//!
//! Every game is a pure decision table over draws from an injected
//! [`DrawSource`]; nothing here touches account state. A win settles
//! `+bet * multiplier` (the stake is implicitly returned), a loss settles
//! `-bet`.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::domain::traits::DrawSource;

/// Production draw source over a seedable RNG.
pub struct StdDraws(StdRng);

impl StdDraws {
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl DrawSource for StdDraws {
    fn next_f64(&mut self) -> f64 {
        use rand::Rng;
        self.0.gen_range(0.0..1.0)
    }

    fn next_in(&mut self, lo: u64, hi: u64) -> u64 {
        use rand::Rng;
        self.0.gen_range(lo..=hi)
    }
}

/// Timed earning actions. The work job rides along; the cooldown key is the
/// action name alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EarnAction {
    Dig,
    Fish,
    Work { job: Option<String> },
    Daily,
    Weekly,
}

impl EarnAction {
    pub fn name(&self) -> &'static str {
        match self {
            EarnAction::Dig => "dig",
            EarnAction::Fish => "fish",
            EarnAction::Work { .. } => "work",
            EarnAction::Daily => "daily",
            EarnAction::Weekly => "weekly",
        }
    }
}

/// Reward drawn for one earning claim, with a fragment describing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reward {
    pub amount: u64,
    pub note: String,
}

/// Job name with its inclusive reward range. Work with no job picks one of
/// these uniformly; a job outside the table pays the unlisted range.
pub const WORK_JOBS: [(&str, u64, u64); 5] = [
    ("miner", 100, 300),
    ("developer", 150, 350),
    ("chef", 60, 200),
    ("driver", 50, 180),
    ("artist", 40, 150),
];

const UNLISTED_JOB_RANGE: (u64, u64) = (50, 200);

pub fn reward<D: DrawSource + ?Sized>(action: &EarnAction, draws: &mut D) -> Reward {
    match action {
        EarnAction::Dig => Reward {
            amount: draws.next_in(10, 60),
            note: "digging around".to_string(),
        },
        EarnAction::Fish => Reward {
            amount: draws.next_in(8, 50),
            note: "a fishing trip".to_string(),
        },
        EarnAction::Work { job } => work_reward(job.as_deref(), draws),
        EarnAction::Daily => Reward {
            amount: draws.next_in(150, 400),
            note: "the daily reward".to_string(),
        },
        EarnAction::Weekly => Reward {
            amount: draws.next_in(1000, 3000),
            note: "the weekly reward".to_string(),
        },
    }
}

fn work_reward<D: DrawSource + ?Sized>(job: Option<&str>, draws: &mut D) -> Reward {
    match job {
        None => {
            let idx = draws.next_in(0, WORK_JOBS.len() as u64 - 1) as usize;
            let (name, lo, hi) = WORK_JOBS[idx];
            Reward {
                amount: draws.next_in(lo, hi),
                note: format!("a shift as a {name}"),
            }
        }
        Some(requested) => {
            let (lo, hi) = WORK_JOBS
                .iter()
                .find(|(name, _, _)| *name == requested)
                .map(|(_, lo, hi)| (*lo, *hi))
                .unwrap_or(UNLISTED_JOB_RANGE);
            Reward {
                amount: draws.next_in(lo, hi),
                note: format!("a shift as a {requested}"),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
    Green,
}

impl Color {
    pub fn name(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Black => "black",
            Color::Green => "green",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoulettePick {
    Number(u8),
    Color(Color),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Game {
    Spin,
    Slots,
    Roulette { pick: Option<RoulettePick> },
    Casino,
}

impl Game {
    pub fn name(&self) -> &'static str {
        match self {
            Game::Spin => "spin",
            Game::Slots => "slots",
            Game::Roulette { .. } => "roulette",
            Game::Casino => "casino",
        }
    }
}

/// Outcome of one resolved wager: the signed balance delta plus a line
/// describing what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub delta: i64,
    pub outcome: String,
}

pub fn resolve<D: DrawSource + ?Sized>(game: &Game, bet: u64, draws: &mut D) -> Settlement {
    match game {
        Game::Spin => spin(bet, draws),
        Game::Slots => slots(bet, draws),
        Game::Roulette { pick } => roulette(bet, *pick, draws),
        Game::Casino => casino(bet, draws),
    }
}

/// Wheel buckets on a [0, 100) roll: [0,50) lose, [50,85) x2, [85,97) x5,
/// [97,100) x10.
fn spin<D: DrawSource + ?Sized>(bet: u64, draws: &mut D) -> Settlement {
    let roll = draws.next_f64() * 100.0;
    match roll {
        r if r < 50.0 => loss(bet, "the wheel stopped on a blank"),
        r if r < 85.0 => win(bet, 2, "the wheel stopped on x2"),
        r if r < 97.0 => win(bet, 5, "the wheel stopped on x5"),
        _ => win(bet, 10, "the wheel stopped on x10"),
    }
}

pub const SLOT_SYMBOLS: [&str; 5] = ["🍒", "🍋", "🍉", "🔔", "💎"];

/// Three independent reels. Triple of the top symbol pays x10, any other
/// triple x5, a pair x2.
fn slots<D: DrawSource + ?Sized>(bet: u64, draws: &mut D) -> Settlement {
    let top = SLOT_SYMBOLS.len() - 1;
    let a = draws.next_in(0, SLOT_SYMBOLS.len() as u64 - 1) as usize;
    let b = draws.next_in(0, SLOT_SYMBOLS.len() as u64 - 1) as usize;
    let c = draws.next_in(0, SLOT_SYMBOLS.len() as u64 - 1) as usize;
    let row = format!(
        "[ {} | {} | {} ]",
        SLOT_SYMBOLS[a], SLOT_SYMBOLS[b], SLOT_SYMBOLS[c]
    );

    if a == b && b == c {
        if a == top {
            win(bet, 10, &format!("{row} jackpot"))
        } else {
            win(bet, 5, &format!("{row} three of a kind"))
        }
    } else if a == b || b == c || a == c {
        win(bet, 2, &format!("{row} two of a kind"))
    } else {
        loss(bet, &format!("{row} no match"))
    }
}

pub const WHEEL_MAX: u8 = 36;

/// Pocket 0 is green; odd pockets are red, even pockets black.
pub fn pocket_color(pocket: u8) -> Color {
    if pocket == 0 {
        Color::Green
    } else if pocket % 2 == 1 {
        Color::Red
    } else {
        Color::Black
    }
}

/// Straight number pays x36, a matched color x2, a matched green x14.
/// A wager without a pick is forfeit.
fn roulette<D: DrawSource + ?Sized>(
    bet: u64,
    pick: Option<RoulettePick>,
    draws: &mut D,
) -> Settlement {
    let pocket = draws.next_in(0, WHEEL_MAX as u64) as u8;
    let color = pocket_color(pocket);
    let landed = format!("the ball landed on {pocket} {}", color.name());

    match pick {
        Some(RoulettePick::Number(n)) if n == pocket => win(bet, 36, &landed),
        Some(RoulettePick::Color(c)) if c == color => {
            let multiplier = if c == Color::Green { 14 } else { 2 };
            win(bet, multiplier, &landed)
        }
        Some(_) => loss(bet, &landed),
        None => loss(bet, &format!("{landed} with no pick placed")),
    }
}

/// House buckets on a [0, 100) roll: [0,45) lose, [45,85) x2, [85,100) x5.
fn casino<D: DrawSource + ?Sized>(bet: u64, draws: &mut D) -> Settlement {
    let roll = draws.next_f64() * 100.0;
    match roll {
        r if r < 45.0 => loss(bet, "the house draw came up short"),
        r if r < 85.0 => win(bet, 2, "the house draw hit x2"),
        _ => win(bet, 5, "the house draw hit x5"),
    }
}

fn win(bet: u64, multiplier: u64, what: &str) -> Settlement {
    let payout = bet.saturating_mul(multiplier).min(i64::MAX as u64);
    Settlement {
        delta: payout as i64,
        outcome: format!("{what} and won {payout} chips (x{multiplier})"),
    }
}

fn loss(bet: u64, what: &str) -> Settlement {
    Settlement {
        delta: -(bet.min(i64::MAX as u64) as i64),
        outcome: format!("{what} and lost {bet} chips"),
    }
}

/// Replays a fixed sequence of unit draws; integer draws are derived by
/// scaling. With a fallback set, the last resort value repeats forever.
#[cfg(test)]
pub(crate) struct ScriptedDraws {
    draws: std::collections::VecDeque<f64>,
    fallback: Option<f64>,
}

#[cfg(test)]
impl ScriptedDraws {
    pub(crate) fn new(draws: &[f64]) -> Self {
        Self {
            draws: draws.iter().copied().collect(),
            fallback: None,
        }
    }

    pub(crate) fn constant(value: f64) -> Self {
        Self {
            draws: std::collections::VecDeque::new(),
            fallback: Some(value),
        }
    }
}

#[cfg(test)]
impl DrawSource for ScriptedDraws {
    fn next_f64(&mut self) -> f64 {
        match self.draws.pop_front() {
            Some(v) => v,
            None => self.fallback.expect("scripted draws exhausted"),
        }
    }

    fn next_in(&mut self, lo: u64, hi: u64) -> u64 {
        let span = hi - lo + 1;
        lo + ((self.next_f64() * span as f64) as u64).min(span - 1)
    }
}
