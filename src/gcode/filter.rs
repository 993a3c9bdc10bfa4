//! Filtering of commands captured from the queue at pause time.
//!
//! A captured command is dropped before replay when it would pause the
//! print again: the pause command itself or a filament-change start.
//! Matching only looks at the leading command token.

/// Pause/resume command handled by [`crate::pause::PauseResumeController`].
pub const PAUSE_COMMAND: &str = "M1125";

/// Generic filament-change start.
pub const FILAMENT_CHANGE_COMMAND: &str = "M600";

const FILTERED_COMMANDS: [&str; 2] = [FILAMENT_CHANGE_COMMAND, PAUSE_COMMAND];

/// True when `cmd` starts with `target` (ASCII case-insensitive) followed
/// by end of line, a space, a tab or a comment marker. Leading spaces are
/// skipped; leading tabs are not.
pub fn command_matches(cmd: &str, target: &str) -> bool {
    let cmd = cmd.trim_start_matches(' ');
    let (Some(head), Some(tail)) = (cmd.get(..target.len()), cmd.get(target.len()..)) else {
        return false;
    };
    if !head.eq_ignore_ascii_case(target) {
        return false;
    }
    matches!(tail.chars().next(), None | Some(' ') | Some('\t') | Some(';'))
}

/// True when a captured line must not be replayed on resume. Blank lines
/// are dropped as well.
pub fn should_skip_saved_command(cmd: &str) -> bool {
    if cmd.trim_start_matches([' ', '\t']).is_empty() {
        return true;
    }
    FILTERED_COMMANDS
        .iter()
        .any(|target| command_matches(cmd, target))
}
