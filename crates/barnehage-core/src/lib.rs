pub mod dates;
pub mod diagnostics;
pub mod matcher;
pub mod model;
pub mod parser;
pub mod patterns;
pub mod reconcile;
pub mod registry;
pub mod spot_id;

pub use diagnostics::MappingError;
pub use matcher::{EntityMatcher, MATCH_THRESHOLD};
pub use model::{AgeGroup, Kindergarten, KindergartenDetails, Observation, SpotRecord, SpotStatus};
pub use parser::{DateScan, PageParser, ParseOutcome, ParserOptions, parse_page};
pub use reconcile::{HistoryMutation, ReconcileReport, reconcile};
pub use registry::{RegistryStore, apply_bootstrap, run_reconciliation};
pub use spot_id::SpotId;
