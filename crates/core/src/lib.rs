#![forbid(unsafe_code)]

pub mod bank;
pub mod exam;
pub mod model;
pub mod report;
pub mod time;

pub use time::Clock;
