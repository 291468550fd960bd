pub mod activities;
pub mod cities;
pub mod journeys;
pub mod run_lock;
