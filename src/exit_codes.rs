//! Exit code constants for the roster CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, template or policy error)
//! - 2: The external agent process failed (non-zero exit, spawn failure)
//! - 3: The external agent process timed out
//! - 4: A dangerous operation was denied approval
//! - 5: The run was cancelled or interrupted

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, template or policy error.
pub const USER_ERROR: i32 = 1;

/// The external process exited non-zero or could not be started.
pub const PROCESS_FAILURE: i32 = 2;

/// The external process exceeded its timeout and was killed.
pub const TIMEOUT: i32 = 3;

/// Approval was denied (explicitly or by approval timeout).
pub const APPROVAL_DENIED: i32 = 4;

/// The run was cancelled before invocation or interrupted during it.
pub const INTERRUPTED: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            PROCESS_FAILURE,
            TIMEOUT,
            APPROVAL_DENIED,
            INTERRUPTED,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn only_success_is_zero() {
        assert_eq!(SUCCESS, 0);
        for code in [USER_ERROR, PROCESS_FAILURE, TIMEOUT, APPROVAL_DENIED, INTERRUPTED] {
            assert_ne!(code, 0);
        }
    }
}
