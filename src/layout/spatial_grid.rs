// Spatial hash grid over projected points.
//
// Instead of O(n) scans over every point at a zoom level, this provides O(1)
// average radius lookup by dividing the unit square into cells. Box queries
// walk the covered cells, or the occupied cells when that is fewer.

use std::collections::HashMap;

/// A spatial hash grid for point radius and box queries.
#[derive(Debug, Clone)]
pub struct PointGrid {
    /// Size of each cell in the grid.
    cell_size: f64,
    /// Map from cell coordinates to the ids of points in that cell.
    cells: HashMap<(i64, i64), Vec<usize>>,
    /// Point coordinates by id.
    coords: Vec<(f64, f64)>,
}

impl PointGrid {
    /// Create a new grid. Cell size should be about the radius used in
    /// `within` queries.
    pub fn new(cell_size: f64) -> Self {
        Self {
            // Avoid division by zero
            cell_size: if cell_size > 0.0 { cell_size } else { 1.0 },
            cells: HashMap::new(),
            coords: Vec::new(),
        }
    }

    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    /// Insert a point; returns its id (insertion order).
    pub fn insert(&mut self, x: f64, y: f64) -> usize {
        let id = self.coords.len();
        self.coords.push((x, y));
        let cell = self.cell_of(x, y);
        self.cells.entry(cell).or_default().push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Ids of points within distance `r` (inclusive) of (x, y), ascending.
    pub fn within(&self, x: f64, y: f64, r: f64) -> Vec<usize> {
        let r2 = r * r;
        let mut result: Vec<usize> = self
            .candidates(x - r, y - r, x + r, y + r)
            .filter(|&id| {
                let (px, py) = self.coords[id];
                let (dx, dy) = (px - x, py - y);
                dx * dx + dy * dy <= r2
            })
            .collect();
        result.sort_unstable();
        result
    }

    /// Ids of points inside the box (inclusive), ascending.
    pub fn range(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<usize> {
        let mut result: Vec<usize> = self
            .candidates(min_x, min_y, max_x, max_y)
            .filter(|&id| {
                let (px, py) = self.coords[id];
                px >= min_x && px <= max_x && py >= min_y && py <= max_y
            })
            .collect();
        result.sort_unstable();
        result
    }

    /// Points in every cell the box touches. May include false positives;
    /// callers do the exact check.
    fn candidates(
        &self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Box<dyn Iterator<Item = usize> + '_> {
        let (cx0, cy0) = self.cell_of(min_x, min_y);
        let (cx1, cy1) = self.cell_of(max_x, max_y);
        if cx1 < cx0 || cy1 < cy0 {
            return Box::new(std::iter::empty());
        }

        let covered = (cx1 - cx0)
            .checked_add(1)
            .and_then(|w| (cy1 - cy0).checked_add(1).and_then(|h| w.checked_mul(h)));
        match covered {
            Some(n) if (n as u64) <= self.cells.len() as u64 => Box::new(
                (cx0..=cx1)
                    .flat_map(move |cx| (cy0..=cy1).map(move |cy| (cx, cy)))
                    .filter_map(move |cell| self.cells.get(&cell))
                    .flatten()
                    .copied(),
            ),
            _ => Box::new(
                self.cells
                    .iter()
                    .filter(move |((cx, cy), _)| {
                        *cx >= cx0 && *cx <= cx1 && *cy >= cy0 && *cy <= cy1
                    })
                    .flat_map(|(_, ids)| ids.iter().copied()),
            ),
        }
    }
}
