//! HyCal calorimeter: module layout, clustering methods and cluster reconstruction
pub mod cluster;
pub mod detector;
pub mod grid_island;
pub mod grouping;
pub mod hit;
pub mod island;
pub mod layout;
pub mod method;
pub mod module;
pub mod primex;
pub mod profile;
pub mod square;
