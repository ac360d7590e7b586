//! Domain models - location records, linear events and geometry
//!
//! - `LocationRecord` - one observed point on a route, annotated with its measure
//! - `EventGroup` - a pair of records spanning a from/to measure range
//! - `geometry` - polyline end points for locate probes

pub mod event;
pub mod geometry;
pub mod location;

// Re-export commonly used types at module level
pub use event::{EventFields, EventGroup};
pub use geometry::Point;
pub use location::{LocateStatus, LocationRecord, Probe, RecordId};
