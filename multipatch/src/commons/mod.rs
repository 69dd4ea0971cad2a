pub mod options;
pub mod units;
