//! Service layer for the harvester.
//!
//! Domain logic shared by the ad hoc CLI crawl and the periodic jobs.

pub mod compact;
pub mod filters;
pub mod purge;
pub mod scanner;

pub use compact::{CompactStats, RangeCompactor, DEFAULT_MAX_ROWS_PER_YEAR};
pub use filters::{Candidate, Exclusion, ExclusionPolicy, ProtectionPolicy, NOMINATION_PATTERNS};
pub use purge::{BudgetEnforcer, PurgeStats};
pub use scanner::{year_window, ScanParams, ScanStats, Scanner, UnitOutcome};
