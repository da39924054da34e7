use crate::domain::{DeadLetterQueue, Error};

/// Reports rejected commands on stderr so stdout stays reserved for replies.
#[derive(Default, Debug)]
pub struct StdErrDLQ {}

impl DeadLetterQueue for StdErrDLQ {
    fn report(&self, error: &Error) {
        eprintln!("Rejected command - {}", error);
    }
}
