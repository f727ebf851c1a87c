use super::model::{ParsedRecord, RejectReason};

pub trait LineParser: Send + Sync {
    /// parse one non-blank line into a validated record
    fn parse(&self, line: &str) -> Result<ParsedRecord, RejectReason>;
}
