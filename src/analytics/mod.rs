// src/analytics/mod.rs

pub mod people;
pub mod traffic;

pub use people::PeopleAnalytics;
pub use traffic::VehicleAnalytics;
