//! 番組の切り出し・追跡を行うフィルター。

mod airtime;
mod program;

pub use airtime::{AirtimeTracker, AirtimeTrackerOptions};
pub use program::{ProgramFilter, ProgramFilterOptions};
