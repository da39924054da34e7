use crate::domain::ReplySink;

/// Prints one reply line per processed command to stdout.
#[derive(Default, Debug)]
pub struct StdOutReplies {}

impl ReplySink for StdOutReplies {
    fn reply(&mut self, line: &str) {
        println!("{}", line);
    }
}
