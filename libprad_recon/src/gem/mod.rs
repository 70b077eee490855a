//! GEM tracker: planes, APV processing, strip clustering and 2D hits
pub mod apv;
pub mod cluster;
pub mod detector;
pub mod plane;
pub mod strip;
