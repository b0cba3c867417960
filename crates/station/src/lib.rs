#![forbid(unsafe_code)]

mod journal;
mod messages;
mod station;
mod support;
mod view;

pub use journal::StationJournal;
pub use messages::{Severity, StationError, UserMessage};
pub use station::{
    ChecklistPage, ClosedChecklist, DEFAULT_REFRESH_INTERVAL_MS, OpenOutcome, OutlineRow,
    RegistrationOutcome, Station, ToggleUpdate,
};
pub use view::{RosterRowView, RosterView, SummaryView, ValidationError};
