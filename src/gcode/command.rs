// src/gcode/command.rs - Pause/resume command surface (M1125)
use thiserror::Error;

use super::filter::{command_matches, PAUSE_COMMAND};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UsageError {
    #[error("Usage: M1125 P  (pause/park)  or M1125 R [F<feedrate>]  (resume)")]
    NeitherFlag,
    #[error("M1125: P and R are mutually exclusive")]
    BothFlags,
    #[error("M1125: invalid feedrate '{0}'")]
    BadFeedrate(String),
}

/// A parsed pause/resume request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PauseCommand {
    Pause,
    /// Optional return-move feedrate override in mm/s.
    Resume { feedrate: Option<f64> },
}

impl PauseCommand {
    /// Parse a full line. `None` when the line is some other command.
    pub fn parse_line(line: &str) -> Option<Result<Self, UsageError>> {
        if !command_matches(line, PAUSE_COMMAND) {
            return None;
        }
        let rest = line.trim_start_matches(' ');
        Some(Self::parse_params(&rest[PAUSE_COMMAND.len()..]))
    }

    /// Parse the parameter words after the command token. `F` is given in
    /// mm/min as usual for G-code and converted to mm/s.
    pub fn parse_params(params: &str) -> Result<Self, UsageError> {
        let params = params.split(';').next().unwrap_or("");
        let mut has_p = false;
        let mut has_r = false;
        let mut feedrate = None;

        for word in params.split_whitespace() {
            let mut chars = word.chars();
            let Some(letter) = chars.next() else { continue };
            let value = chars.as_str();
            match letter.to_ascii_uppercase() {
                'P' => has_p = true,
                'R' => has_r = true,
                'F' => {
                    let mm_per_min: f64 = value
                        .parse()
                        .map_err(|_| UsageError::BadFeedrate(value.to_string()))?;
                    if !mm_per_min.is_finite() || mm_per_min <= 0.0 {
                        return Err(UsageError::BadFeedrate(value.to_string()));
                    }
                    feedrate = Some(mm_per_min / 60.0);
                }
                other => tracing::debug!("M1125: ignoring parameter '{}'", other),
            }
        }

        match (has_p, has_r) {
            (true, false) => Ok(PauseCommand::Pause),
            (false, true) => Ok(PauseCommand::Resume { feedrate }),
            (true, true) => Err(UsageError::BothFlags),
            (false, false) => Err(UsageError::NeitherFlag),
        }
    }
}
