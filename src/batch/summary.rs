use crate::model::Status;
use serde::Serialize;

pub const NOTHING_TO_RUN: &str = "No items checked - nothing to publish!";

/// Outcome of one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub aborted: bool,
}

impl BatchSummary {
    pub fn status(&self) -> Status {
        if self.succeeded == 0 {
            Status::Error
        } else if self.failed == 0 {
            Status::Success
        } else {
            Status::Warning
        }
    }

    pub fn message(&self) -> String {
        let plural = if self.total > 1 { "s" } else { "" };
        let mut msg = match self.status() {
            Status::Success => format!(
                "Successfully published {}/{} asset{}!",
                self.succeeded, self.total, plural
            ),
            Status::Warning => format!(
                "Successfully published {}/{} asset{}, {} failed - check logs for more information!",
                self.succeeded, self.total, plural, self.failed
            ),
            _ => format!("Could not publish asset{plural} - check logs for more information!"),
        };
        if self.aborted {
            msg.push_str(" (aborted)");
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(total: usize, succeeded: usize, failed: usize) -> BatchSummary {
        BatchSummary {
            total,
            succeeded,
            failed,
            aborted: false,
        }
    }

    #[test]
    fn wording_distinguishes_all_partial_none() {
        assert_eq!(summary(1, 1, 0).message(), "Successfully published 1/1 asset!");
        assert_eq!(summary(3, 3, 0).message(), "Successfully published 3/3 assets!");
        assert_eq!(
            summary(3, 2, 1).message(),
            "Successfully published 2/3 assets, 1 failed - check logs for more information!"
        );
        assert_eq!(summary(3, 2, 1).status(), Status::Warning);
        assert_eq!(
            summary(2, 0, 2).message(),
            "Could not publish assets - check logs for more information!"
        );
        assert_eq!(summary(1, 0, 1).status(), Status::Error);
    }

    #[test]
    fn aborted_runs_say_so() {
        let s = BatchSummary {
            total: 1,
            succeeded: 1,
            failed: 0,
            aborted: true,
        };
        assert_eq!(s.message(), "Successfully published 1/1 asset! (aborted)");
    }
}
