pub mod collect;
pub mod commons;
pub mod error;
pub mod geo_core;
pub mod geometric;

pub use commons::options::{ConvertOptions, OutputFormat};
pub use commons::units::ZUnit;
pub use error::ConvertError;
pub use geometric::footprint::{Footprint, FootprintCollection};
pub use geometric::multipatch::{multipatch_convertor, ConvertOutput, MultipatchCollection, MultipatchFeature};
