use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::domain::traits::CommandStream;
use crate::domain::{Command, CommandKind, Error};
use crate::games::{Color, EarnAction, Game, RoulettePick, WHEEL_MAX};

pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R) -> Result<Self, Error> {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        Ok(Self { reader: Some(rdr) })
    }
}

/// Internal shape used only for CSV deserialization.
#[derive(Debug, Deserialize)]
struct CsvRow {
    user: String,
    action: String,
    amount: Option<String>,
    arg: Option<String>,
}

fn parse_amount(action: &str, raw: Option<String>) -> Result<i64, Error> {
    let raw = raw.ok_or_else(|| Error::Ingestion(format!("Missing amount for {}", action)))?;
    raw.parse::<i64>()
        .map_err(|_| Error::Ingestion(format!("Invalid amount '{}' for {}", raw, action)))
}

fn target(action: &str, raw: Option<String>) -> Result<String, Error> {
    raw.ok_or_else(|| Error::Ingestion(format!("Missing target user for {}", action)))
}

fn parse_pick(raw: &str) -> Result<RoulettePick, Error> {
    let lowered = raw.to_ascii_lowercase();
    match lowered.as_str() {
        "red" => Ok(RoulettePick::Color(Color::Red)),
        "black" => Ok(RoulettePick::Color(Color::Black)),
        "green" => Ok(RoulettePick::Color(Color::Green)),
        _ => match lowered.parse::<u8>() {
            Ok(n) if n <= WHEEL_MAX => Ok(RoulettePick::Number(n)),
            _ => Err(Error::Ingestion(format!("Invalid roulette pick: {}", raw))),
        },
    }
}

impl TryFrom<CsvRow> for Command {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        if row.user.is_empty() {
            return Err(Error::Ingestion("Missing user column".to_string()));
        }

        let action = row.action.trim().to_ascii_lowercase();
        let kind = match action.as_str() {
            "dig" => CommandKind::Earn {
                action: EarnAction::Dig,
            },
            "fish" => CommandKind::Earn {
                action: EarnAction::Fish,
            },
            "work" => CommandKind::Earn {
                action: EarnAction::Work {
                    job: row.arg.map(|j| j.to_ascii_lowercase()),
                },
            },
            "daily" => CommandKind::Earn {
                action: EarnAction::Daily,
            },
            "weekly" => CommandKind::Earn {
                action: EarnAction::Weekly,
            },
            "spin" => CommandKind::Wager {
                game: Game::Spin,
                bet: parse_amount(&action, row.amount)?,
            },
            "slots" => CommandKind::Wager {
                game: Game::Slots,
                bet: parse_amount(&action, row.amount)?,
            },
            "roulette" => CommandKind::Wager {
                game: Game::Roulette {
                    pick: row.arg.as_deref().map(parse_pick).transpose()?,
                },
                bet: parse_amount(&action, row.amount)?,
            },
            "casino" => CommandKind::Wager {
                game: Game::Casino,
                bet: parse_amount(&action, row.amount)?,
            },
            "give" => CommandKind::Give {
                to: target(&action, row.arg)?,
                amount: parse_amount(&action, row.amount)?,
            },
            "take" => CommandKind::Take {
                from: target(&action, row.arg)?,
                amount: parse_amount(&action, row.amount)?,
            },
            "balance" => CommandKind::Balance,
            "history" => CommandKind::History,
            other => {
                return Err(Error::Ingestion(format!("Unknown action: {}", other)));
            }
        };

        Ok(Command {
            user: row.user,
            kind,
        })
    }
}

impl<R: Read + Send + 'static> CommandStream for CsvReader<R> {
    type CmdStream = Pin<Box<dyn Stream<Item = Result<Command, Error>> + Send>>;

    fn stream(&mut self) -> Self::CmdStream {
        // Take ownership of the reader so the iterator we build owns all data and is 'static.
        let reader = match self.reader.take() {
            Some(r) => r,
            None => {
                // Already consumed; return an empty stream.
                return Box::pin(stream::iter(Vec::<Result<Command, Error>>::new()));
            }
        };

        let iter = reader
            .into_deserialize::<CsvRow>()
            .map(|row_res| match row_res {
                Ok(row) => Command::try_from(row),
                Err(e) => Err(Error::Ingestion(format!(
                    "CSV deserialization error: {}",
                    e
                ))),
            });

        Box::pin(stream::iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn row(user: &str, action: &str, amount: Option<&str>, arg: Option<&str>) -> CsvRow {
        CsvRow {
            user: user.to_string(),
            action: action.to_string(),
            amount: amount.map(str::to_string),
            arg: arg.map(str::to_string),
        }
    }

    #[test]
    fn wager_rows_parse_into_games_and_bets() {
        let cmd = Command::try_from(row("alice", "spin", Some("100"), None)).unwrap();
        assert_eq!(cmd.user, "alice");
        assert!(matches!(
            cmd.kind,
            CommandKind::Wager {
                game: Game::Spin,
                bet: 100
            }
        ));

        let cmd = Command::try_from(row("bob", "roulette", Some("50"), Some("RED"))).unwrap();
        assert!(matches!(
            cmd.kind,
            CommandKind::Wager {
                game: Game::Roulette {
                    pick: Some(RoulettePick::Color(Color::Red))
                },
                bet: 50
            }
        ));

        let cmd = Command::try_from(row("bob", "roulette", Some("50"), Some("17"))).unwrap();
        assert!(matches!(
            cmd.kind,
            CommandKind::Wager {
                game: Game::Roulette {
                    pick: Some(RoulettePick::Number(17))
                },
                ..
            }
        ));
    }

    #[test]
    fn transfer_rows_carry_the_target_user() {
        let cmd = Command::try_from(row("boss", "give", Some("250"), Some("carol"))).unwrap();
        match cmd.kind {
            CommandKind::Give { to, amount } => {
                assert_eq!(to, "carol");
                assert_eq!(amount, 250);
            }
            other => panic!("expected give, got {other:?}"),
        }

        let err = Command::try_from(row("boss", "take", Some("250"), None)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Ingestion failed with: Missing target user for take"
        );
    }

    #[test]
    fn work_rows_normalize_the_job_name() {
        let cmd = Command::try_from(row("alice", "work", None, Some("Developer"))).unwrap();
        match cmd.kind {
            CommandKind::Earn {
                action: EarnAction::Work { job },
            } => assert_eq!(job.as_deref(), Some("developer")),
            other => panic!("expected work, got {other:?}"),
        }
    }

    #[test]
    fn malformed_rows_are_rejected_with_context() {
        let err = Command::try_from(row("alice", "spin", Some("zzz"), None)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Ingestion failed with: Invalid amount 'zzz' for spin"
        );

        let err = Command::try_from(row("alice", "spin", None, None)).unwrap_err();
        assert_eq!(err.to_string(), "Ingestion failed with: Missing amount for spin");

        let err = Command::try_from(row("alice", "jackhammer", Some("5"), None)).unwrap_err();
        assert_eq!(err.to_string(), "Ingestion failed with: Unknown action: jackhammer");

        let err = Command::try_from(row("", "balance", None, None)).unwrap_err();
        assert_eq!(err.to_string(), "Ingestion failed with: Missing user column");

        let err =
            Command::try_from(row("alice", "roulette", Some("10"), Some("37"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Ingestion failed with: Invalid roulette pick: 37"
        );
    }

    #[test]
    fn short_rows_stream_with_missing_fields_as_none() {
        let script = "\
user,action,amount,arg
alice,daily
bob,balance
carol,spin,75
";
        let mut reader = CsvReader::new(script.as_bytes()).unwrap();
        let rows: Vec<_> = futures::executor::block_on(reader.stream().collect());

        assert_eq!(rows.len(), 3);
        assert!(matches!(
            rows[0].as_ref().unwrap().kind,
            CommandKind::Earn {
                action: EarnAction::Daily
            }
        ));
        assert!(matches!(rows[1].as_ref().unwrap().kind, CommandKind::Balance));
        assert!(matches!(
            rows[2].as_ref().unwrap().kind,
            CommandKind::Wager {
                game: Game::Spin,
                bet: 75
            }
        ));
    }
}
