pub mod footprint;
pub mod multipatch;
pub mod shapefile;
