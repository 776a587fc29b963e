pub mod invoice;
pub mod result;
pub mod shipment;

pub use invoice::{InvoiceRecord, LineItem};
pub use result::{
    Assignment, CandidateGroup, MatchCandidate, MatchMethod, MatchResult, RunStats,
    UnmatchedReason,
};
pub use shipment::{ShipmentRecord, ShipmentStatus};
