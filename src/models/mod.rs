pub mod fare;
pub mod segment;
pub mod trip;

pub use fare::{FareSchedule, Money};
pub use segment::{ActivityKind, Candidate, ConfidenceThreshold, Coordinate, MovementSegment};
pub use trip::Trip;
