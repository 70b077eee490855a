// The PRad HyCal layout: a 34x34 PbWO4 crystal core (sector 0) with a 2x2 hole for the
// beam, surrounded by four lead glass sectors of 6x24 blocks arranged as a pinwheel.
// Sector 1 sits on top, and sectors 2, 3, 4 (right, bottom, left) are the top sector
// rotated clockwise in 90 degree steps. Each sector keeps its own local row/column grid,
// which is what the sector-based clustering works on.
use super::detector::{CalibConst, HyCalModule};
use super::module::{set_flag, Geometry, HitFlag, Layout, ModuleType};
use crate::constants::{
    CRYSTAL_GRID, CRYSTAL_ID_OFFSET, CRYSTAL_SIZE, LEAD_GLASS_COLUMNS, LEAD_GLASS_ROWS,
    LEAD_GLASS_SIZE, NUM_SECTORS,
};

/// Rows and columns of a sector grid
pub fn sector_shape(sector: usize) -> (usize, usize) {
    if sector == 0 {
        (CRYSTAL_GRID, CRYSTAL_GRID)
    } else {
        (LEAD_GLASS_ROWS, LEAD_GLASS_COLUMNS)
    }
}

/// Module material of a sector
pub fn sector_type(sector: usize) -> ModuleType {
    if sector == 0 {
        ModuleType::PbWO4
    } else {
        ModuleType::PbGlass
    }
}

fn is_beam_hole(row: usize, column: usize) -> bool {
    let lo = CRYSTAL_GRID / 2 - 1;
    let hi = CRYSTAL_GRID / 2;
    (lo..=hi).contains(&row) && (lo..=hi).contains(&column)
}

fn crystal_modules() -> Vec<HyCalModule> {
    let half = CRYSTAL_GRID as f32 / 2.0 - 0.5;
    let mut modules = Vec::with_capacity(CRYSTAL_GRID * CRYSTAL_GRID);
    for row in 0..CRYSTAL_GRID {
        for column in 0..CRYSTAL_GRID {
            if is_beam_hole(row, column) {
                continue;
            }
            let mut flag = 0;
            set_flag(&mut flag, HitFlag::PbWO4);
            let edge = CRYSTAL_GRID - 1;
            if row == 0 || column == 0 || row == edge || column == edge {
                set_flag(&mut flag, HitFlag::Transition);
            }
            let inner = (CRYSTAL_GRID / 2 - 2)..=(CRYSTAL_GRID / 2 + 1);
            if inner.contains(&row) && inner.contains(&column) {
                set_flag(&mut flag, HitFlag::InnerBound);
            }
            let index = (row * CRYSTAL_GRID + column) as i32 + 1;
            modules.push(HyCalModule {
                id: CRYSTAL_ID_OFFSET + index,
                name: format!("W{index}"),
                geo: Geometry {
                    kind: ModuleType::PbWO4,
                    size_x: CRYSTAL_SIZE,
                    size_y: CRYSTAL_SIZE,
                    x: (column as f32 - half) * CRYSTAL_SIZE,
                    y: (half - row as f32) * CRYSTAL_SIZE,
                    z: 0.0,
                },
                layout: Layout {
                    flag,
                    sector: 0,
                    row,
                    column,
                },
                calib: CalibConst::default(),
            });
        }
    }
    modules
}

fn lead_glass_modules() -> Vec<HyCalModule> {
    let core = CRYSTAL_GRID as f32 / 2.0 * CRYSTAL_SIZE;
    let outer = core + LEAD_GLASS_ROWS as f32 * LEAD_GLASS_SIZE;
    let mut modules = Vec::with_capacity((NUM_SECTORS - 1) * LEAD_GLASS_ROWS * LEAD_GLASS_COLUMNS);
    let mut index = 0;
    for sector in 1..NUM_SECTORS {
        for row in 0..LEAD_GLASS_ROWS {
            for column in 0..LEAD_GLASS_COLUMNS {
                index += 1;
                // position in the top sector, then rotate clockwise into place
                let mut x = -outer + (column as f32 + 0.5) * LEAD_GLASS_SIZE;
                let mut y = outer - (row as f32 + 0.5) * LEAD_GLASS_SIZE;
                for _ in 1..sector {
                    (x, y) = (y, -x);
                }

                let mut flag = 0;
                set_flag(&mut flag, HitFlag::PbGlass);
                if row == 0 || column == 0 {
                    set_flag(&mut flag, HitFlag::OuterBound);
                }
                if row == LEAD_GLASS_ROWS - 1 && column >= LEAD_GLASS_ROWS {
                    set_flag(&mut flag, HitFlag::Transition);
                }

                modules.push(HyCalModule {
                    id: index,
                    name: format!("G{index}"),
                    geo: Geometry {
                        kind: ModuleType::PbGlass,
                        size_x: LEAD_GLASS_SIZE,
                        size_y: LEAD_GLASS_SIZE,
                        x,
                        y,
                        z: 0.0,
                    },
                    layout: Layout {
                        flag,
                        sector,
                        row,
                        column,
                    },
                    calib: CalibConst::default(),
                });
            }
        }
    }
    modules
}

/// Build the full list of HyCal modules, lead glass first
pub fn prad_modules() -> Vec<HyCalModule> {
    let mut modules = lead_glass_modules();
    modules.extend(crystal_modules());
    modules
}
