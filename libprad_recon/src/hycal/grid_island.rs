// Island finder on a single sector grid.
//
// The sector is handed over as a dense 2D array of module energies (rows x columns, zero
// for modules without a hit) and the result is a list of raw clusters expressed in grid
// coordinates. The function keeps no state between calls.
//
// 1. Cells above the cell threshold are grouped into islands by flood fill, with side
//    neighbors only or also corner neighbors.
// 2. Peaks are the cells above the center threshold that are not below any of their
//    eight neighbors (on a tie, the earlier cell in row-major order wins).
// 3. An island with one peak becomes one cluster. An island with several peaks has each
//    cell's energy shared between the peaks in proportion to the expected shower profile,
//    iterating to refine the peak positions.
use bit_set::BitSet;
use ndarray::ArrayView2;
use std::collections::VecDeque;

/// Thresholds of the grid island finder
#[derive(Debug, Clone, PartialEq)]
pub struct GridIslandParams {
    pub min_cell_energy: f32,
    pub min_center_energy: f32,
    pub corner_connection: bool,
    pub split_iter: usize,
    pub least_split: f32,
}

/// A cluster in grid coordinates: (row, column, energy) of every cell
#[derive(Debug, Clone, PartialEq)]
pub struct RawCluster {
    pub cells: Vec<(usize, usize, f32)>,
    pub energy: f32,
    pub peak: (usize, usize),
    pub split: bool,
}

const SIDE_OFFSETS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const ALL_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

fn neighbors(
    (row, col): (usize, usize),
    (rows, cols): (usize, usize),
    offsets: &'static [(isize, isize)],
) -> impl Iterator<Item = (usize, usize)> {
    offsets.iter().filter_map(move |(dr, dc)| {
        let r = row.checked_add_signed(*dr)?;
        let c = col.checked_add_signed(*dc)?;
        (r < rows && c < cols).then_some((r, c))
    })
}

fn flood_fill(
    grid: &ArrayView2<f32>,
    start: (usize, usize),
    params: &GridIslandParams,
    visited: &mut BitSet,
) -> Vec<(usize, usize)> {
    let dim = grid.dim();
    let offsets: &'static [(isize, isize)] = if params.corner_connection {
        &ALL_OFFSETS
    } else {
        &SIDE_OFFSETS
    };
    let mut island = Vec::new();
    let mut queue = VecDeque::from([start]);
    visited.insert(start.0 * dim.1 + start.1);
    while let Some(cell) = queue.pop_front() {
        island.push(cell);
        for next in neighbors(cell, dim, offsets) {
            if grid[next] >= params.min_cell_energy && visited.insert(next.0 * dim.1 + next.1) {
                queue.push_back(next);
            }
        }
    }
    island.sort();
    island
}

fn is_peak(grid: &ArrayView2<f32>, cell: (usize, usize), params: &GridIslandParams) -> bool {
    let energy = grid[cell];
    if energy < params.min_center_energy {
        return false;
    }
    neighbors(cell, grid.dim(), &ALL_OFFSETS).all(|n| {
        let other = grid[n];
        other < energy || (other == energy && n > cell)
    })
}

fn share_energy<F>(
    grid: &ArrayView2<f32>,
    island: &[(usize, usize)],
    peaks: &[(usize, usize)],
    params: &GridIslandParams,
    profile: &F,
) -> Vec<Vec<f32>>
where
    F: Fn(f32, f32) -> f32,
{
    // (column, row, energy) of every peak
    let mut centers: Vec<(f32, f32, f32)> = peaks
        .iter()
        .map(|&(r, c)| (c as f32, r as f32, grid[(r, c)]))
        .collect();
    let mut shares = vec![vec![0.0; peaks.len()]; island.len()];

    for _ in 0..params.split_iter.max(1) {
        for (i, &(r, c)) in island.iter().enumerate() {
            let weights: Vec<f32> = centers
                .iter()
                .map(|(x, y, e)| e * profile(c as f32 - x, r as f32 - y))
                .collect();
            let total: f32 = weights.iter().sum();
            if total > 0.0 {
                for (k, w) in weights.iter().enumerate() {
                    shares[i][k] = w / total;
                }
            } else {
                let nearest = peaks
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, &(pr, pc))| pr.abs_diff(r).max(pc.abs_diff(c)))
                    .map(|(k, _)| k)
                    .unwrap_or(0);
                shares[i].fill(0.0);
                shares[i][nearest] = 1.0;
            }
        }

        for (k, &(pr, pc)) in peaks.iter().enumerate() {
            let (mut sx, mut sy, mut se, mut total) = (0.0, 0.0, 0.0, 0.0);
            for (i, &(r, c)) in island.iter().enumerate() {
                let e = grid[(r, c)] * shares[i][k];
                total += e;
                if pr.abs_diff(r) <= 1 && pc.abs_diff(c) <= 1 {
                    sx += e * c as f32;
                    sy += e * r as f32;
                    se += e;
                }
            }
            if se > 0.0 {
                centers[k] = (sx / se, sy / se, total);
            } else {
                centers[k].2 = total;
            }
        }
    }
    shares
}

/// Find the clusters of one sector grid.
///
/// `profile(dx, dy)` gives the expected energy fraction of a cell at (dx, dy) cells from
/// a shower center.
pub fn island<F>(grid: ArrayView2<f32>, params: &GridIslandParams, profile: F) -> Vec<RawCluster>
where
    F: Fn(f32, f32) -> f32,
{
    let (rows, cols) = grid.dim();
    let mut visited = BitSet::with_capacity(rows * cols);
    let mut clusters = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if grid[(row, col)] < params.min_cell_energy || visited.contains(row * cols + col) {
                continue;
            }
            let island = flood_fill(&grid, (row, col), params, &mut visited);
            let peaks: Vec<(usize, usize)> = island
                .iter()
                .copied()
                .filter(|&cell| is_peak(&grid, cell, params))
                .collect();

            match peaks.len() {
                0 => (),
                1 => {
                    let cells: Vec<(usize, usize, f32)> =
                        island.iter().map(|&(r, c)| (r, c, grid[(r, c)])).collect();
                    clusters.push(RawCluster {
                        energy: cells.iter().map(|cell| cell.2).sum(),
                        cells,
                        peak: peaks[0],
                        split: false,
                    });
                }
                _ => {
                    let shares = share_energy(&grid, &island, &peaks, params, &profile);
                    for (k, &peak) in peaks.iter().enumerate() {
                        let cells: Vec<(usize, usize, f32)> = island
                            .iter()
                            .enumerate()
                            .filter(|(i, &cell)| cell == peak || shares[*i][k] >= params.least_split)
                            .map(|(i, &(r, c))| (r, c, grid[(r, c)] * shares[i][k]))
                            .collect();
                        clusters.push(RawCluster {
                            energy: cells.iter().map(|cell| cell.2).sum(),
                            cells,
                            peak,
                            split: true,
                        });
                    }
                }
            }
        }
    }
    clusters
}
