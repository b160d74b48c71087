//! Stable exit codes for devpilot CLI commands.

use crate::stages::StageError;

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed: bad workspace or config, collaborator or filesystem error.
pub const ERROR: i32 = 1;
/// A model stage never produced a valid answer within its attempt bound.
pub const STAGE_EXHAUSTED: i32 = 2;

/// Exit code for an error returned by a command.
pub fn for_error(err: &anyhow::Error) -> i32 {
    let exhausted = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<StageError>(),
            Some(StageError::RetriesExhausted { .. })
        )
    });
    if exhausted { STAGE_EXHAUSTED } else { ERROR }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;
    use crate::core::stage::StageName;

    #[test]
    fn exhausted_stage_maps_through_context() {
        let err: anyhow::Result<()> = Err(StageError::RetriesExhausted {
            stage: StageName::Coder,
            attempts: 5,
            last_failure: "missing ~~~ delimiter block".to_string(),
        }
        .into());
        let err = err.context("execute task").unwrap_err();
        assert_eq!(for_error(&err), STAGE_EXHAUSTED);
        assert_eq!(for_error(&anyhow::anyhow!("disk full")), ERROR);
    }
}
