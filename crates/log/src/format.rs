//! Format utilities (time)

use std::fmt;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};

/// Timer that can be switched off without changing the layer type
#[derive(Debug, Clone, Copy)]
pub(crate) enum Timer {
    System(SystemTime),
    Off,
}

impl FormatTime for Timer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        match self {
            Self::System(timer) => timer.format_time(w),
            Self::Off => Ok(()),
        }
    }
}

pub(crate) fn make_timer(enabled: bool) -> Timer {
    if enabled {
        Timer::System(SystemTime)
    } else {
        Timer::Off
    }
}
