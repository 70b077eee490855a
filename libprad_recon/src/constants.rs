// Detector-wide constants for PRad reconstruction. Lengths are in mm, energies in MeV.

// HyCal module geometry
pub const CRYSTAL_SIZE: f32 = 20.77;
pub const LEAD_GLASS_SIZE: f32 = 38.15;
pub const CRYSTAL_GRID: usize = 34;
pub const LEAD_GLASS_ROWS: usize = 6;
pub const LEAD_GLASS_COLUMNS: usize = 24;
pub const NUM_SECTORS: usize = 5;
// First id of the crystal modules, lead glass ids start at 1
pub const CRYSTAL_ID_OFFSET: i32 = 1000;

// Normalized distances (in units of module size) for adjacency tests
pub const SIDE_ADJACENT: f32 = 1.3;
pub const CORNER_ADJACENT: f32 = 1.6;

// Shower depth parameters: radiation length (mm) and critical energy (MeV)
pub const CRYSTAL_X0: f32 = 8.6;
pub const CRYSTAL_EC: f32 = 1.1;
pub const LEAD_GLASS_X0: f32 = 26.7;
pub const LEAD_GLASS_EC: f32 = 2.84;

// Per event capacity limits
pub const MAX_HYCAL_CLUSTERS: usize = 250;
pub const MAX_GEM_HITS: usize = 250;

// GEM readout
pub const STRIP_PITCH: f32 = 0.4;
pub const APV_CHANNELS: usize = 128;
pub const X_PLANE_SIZE: f32 = 550.4;
pub const Y_PLANE_SIZE: f32 = 1228.8;
pub const X_PLANE_APVS: usize = 12;
pub const Y_PLANE_APVS: usize = 24;
// Floating/guard strips on the X plane
pub const X_STRIP_MIN: i32 = 16;
pub const X_STRIP_MAX: i32 = 1391;
// Overlap between the two halves of the X plane, in strips
pub const X_PLANE_OVERLAP_STRIPS: f32 = 31.0;

// Nominal detector positions along the beam line (target at z = 0)
pub const HYCAL_NOMINAL_Z: f32 = 5817.0;
pub const GEM1_NOMINAL_Z: f32 = 5407.0;
pub const GEM2_NOMINAL_Z: f32 = 5367.0;
