//! Job status transition validation.
//!
//! Legal transitions form a path from `pending` through `running` into
//! exactly one terminal state. Terminal states are write-once.

use crate::status::JobStatus;

/// Validate a status transition. Returns a human-readable message on
/// rejection, suitable for logging and for Conflict responses.
pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), String> {
    use JobStatus::*;

    let ok = match (from, to) {
        (Pending, Running) => true,
        // Admission-time cancellation: a pending job may be cancelled
        // before any worker picks it up.
        (Pending, Cancelled) => true,
        // A pending job can fail terminally when queue delivery is exhausted.
        (Pending, Error) => true,
        (Running, Completed) | (Running, Error) | (Running, Cancelled) => true,
        _ => false,
    };

    if ok {
        Ok(())
    } else {
        Err(format!(
            "Illegal job status transition: {} -> {}",
            from.as_str(),
            to.as_str()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::JobStatus::*;

    #[test]
    fn happy_path_is_legal() {
        assert!(validate_transition(Pending, Running).is_ok());
        assert!(validate_transition(Running, Completed).is_ok());
    }

    #[test]
    fn running_can_terminate_three_ways() {
        assert!(validate_transition(Running, Completed).is_ok());
        assert!(validate_transition(Running, Error).is_ok());
        assert!(validate_transition(Running, Cancelled).is_ok());
    }

    #[test]
    fn terminal_states_are_write_once() {
        for terminal in [Completed, Error, Cancelled] {
            for to in [Pending, Running, Completed, Error, Cancelled] {
                assert!(validate_transition(terminal, to).is_err());
            }
        }
    }

    #[test]
    fn no_backward_transitions() {
        assert!(validate_transition(Running, Pending).is_err());
        assert!(validate_transition(Completed, Running).is_err());
    }
}
