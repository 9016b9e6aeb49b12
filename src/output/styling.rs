use std::fmt::Display;

use console::{style, StyledObject};

use crate::providers::gitlab::types::Status;

/// Colours a pipeline or job status the way GitLab's UI does.
pub fn status(status: &Status) -> StyledObject<String> {
    let styled = style(status.to_string()).bright();
    match status {
        Status::Success | Status::Manual => styled.green(),
        Status::Failed => styled.red(),
        Status::Canceled | Status::Skipped => styled.dim(),
        _ => styled.yellow(),
    }
}

pub fn success(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn failure(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn highlight(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn link(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn muted(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn title(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}
