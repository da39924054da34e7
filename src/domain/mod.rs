pub mod account;
pub mod command;
pub mod error;
pub mod traits;

pub use account::{AccountSnapshot, Applied, HistoryEntry};
pub use command::{Command, CommandKind};
pub use error::Error;
pub use traits::{DeadLetterQueue, ReplySink};
