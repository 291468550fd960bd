pub mod journey;

pub use journey::{City, Journey, JourneyResolution, JourneyState};
