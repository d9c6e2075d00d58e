pub mod stores;
pub mod tags;
