use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::position::Position;

/// Terrain classification of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Biome {
    /// Open water far from shore.
    DeepOcean,
    /// Coastal water.
    ShallowWater,
    /// Beaches and dunes.
    Sand,
    /// Open grassland.
    Grass,
    /// Woodland.
    Forest,
    /// Bare highland.
    Rock,
}

/// Upper elevation bound (exclusive) for each biome, lowest first.
const ELEVATION_THRESHOLDS: [(Biome, f64); 6] = [
    (Biome::DeepOcean, 0.30),
    (Biome::ShallowWater, 0.40),
    (Biome::Sand, 0.45),
    (Biome::Grass, 0.65),
    (Biome::Forest, 0.78),
    (Biome::Rock, 1.0),
];

impl Biome {
    /// All biomes, ordered from lowest to highest elevation.
    pub const ALL: [Biome; 6] = [
        Biome::DeepOcean,
        Biome::ShallowWater,
        Biome::Sand,
        Biome::Grass,
        Biome::Forest,
        Biome::Rock,
    ];

    /// Classify a normalized elevation in `[0, 1]`.
    ///
    /// Returns `None` for non-finite values or values outside the range.
    pub fn from_elevation(elevation: f64) -> Option<Self> {
        if !elevation.is_finite() || !(0.0..=1.0).contains(&elevation) {
            return None;
        }
        ELEVATION_THRESHOLDS
            .iter()
            .find(|(_, threshold)| elevation < *threshold)
            .map(|(biome, _)| *biome)
            .or(Some(Biome::Rock))
    }

    /// Whether agents may stand on this biome.
    pub fn is_passable(self) -> bool {
        !matches!(self, Self::DeepOcean | Self::ShallowWater)
    }

    /// Whether agents can drink from this biome.
    pub fn is_water(self) -> bool {
        matches!(self, Self::DeepOcean | Self::ShallowWater)
    }

    /// Default resource capacity of a cell of this biome.
    pub fn resource_capacity(self) -> f64 {
        match self {
            Self::DeepOcean | Self::ShallowWater | Self::Rock => 0.0,
            Self::Sand => 2.0,
            Self::Grass => 10.0,
            Self::Forest => 20.0,
        }
    }
}

impl fmt::Display for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeepOcean => write!(f, "deep-ocean"),
            Self::ShallowWater => write!(f, "shallow-water"),
            Self::Sand => write!(f, "sand"),
            Self::Grass => write!(f, "grass"),
            Self::Forest => write!(f, "forest"),
            Self::Rock => write!(f, "rock"),
        }
    }
}

/// A single terrain cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Terrain classification.
    pub biome: Biome,
    /// Resource currently available for foraging. Never negative.
    pub resource: f64,
    /// Regeneration ceiling for `resource`.
    pub max_resource: f64,
    /// Whether agents may stand on this cell.
    pub passable: bool,
}

impl Cell {
    /// A cell of the given biome, filled to the biome's default capacity.
    pub fn new(biome: Biome) -> Self {
        let capacity = biome.resource_capacity();
        Self {
            biome,
            resource: capacity,
            max_resource: capacity,
            passable: biome.is_passable(),
        }
    }

    /// Override the current resource and ceiling.
    pub fn with_resource(mut self, resource: f64, max_resource: f64) -> Self {
        self.resource = resource;
        self.max_resource = max_resource;
        self
    }
}

/// Integer cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl CellCoord {
    /// Create a coordinate.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// World-space center of this cell.
    pub fn center(self) -> Position {
        Position::new(f64::from(self.x) + 0.5, f64::from(self.y) + 0.5)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// The terrain map the simulation runs on.
///
/// Cells are stored row-major (`index = y * width + x`). The grid's shape is
/// fixed; only resource quantities change while a session runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldGrid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl WorldGrid {
    /// Build a grid from explicit cells, validating its invariants.
    pub fn new(width: u32, height: u32, cells: Vec<Cell>) -> CoreResult<Self> {
        let grid = Self {
            width,
            height,
            cells,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// A grid where every cell has the same biome and resource.
    pub fn uniform(width: u32, height: u32, biome: Biome, resource: f64) -> CoreResult<Self> {
        let cell = Cell::new(biome).with_resource(resource, resource);
        let count = width as usize * height as usize;
        Self::new(width, height, vec![cell; count])
    }

    /// Build a grid from normalized elevations, classifying each cell's biome
    /// and filling it to the biome's capacity.
    pub fn from_elevations(width: u32, height: u32, elevations: &[f64]) -> CoreResult<Self> {
        let cells = elevations
            .iter()
            .enumerate()
            .map(|(i, &e)| {
                Biome::from_elevation(e).map(Cell::new).ok_or_else(|| {
                    CoreError::MalformedGrid(format!("elevation {e} at index {i} is not in [0, 1]"))
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Self::new(width, height, cells)
    }

    /// Check structural and resource invariants.
    ///
    /// Deserialized grids skip the constructor, so callers that accept grids
    /// from outside must run this before use.
    pub fn validate(&self) -> CoreResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CoreError::MalformedGrid(format!(
                "dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize;
        if self.cells.len() != expected {
            return Err(CoreError::MalformedGrid(format!(
                "expected {expected} cells for {}x{}, got {}",
                self.width,
                self.height,
                self.cells.len()
            )));
        }
        for (i, cell) in self.cells.iter().enumerate() {
            if !cell.resource.is_finite() || !cell.max_resource.is_finite() {
                return Err(CoreError::MalformedGrid(format!(
                    "cell {i} has a non-finite resource"
                )));
            }
            if cell.resource < 0.0 || cell.max_resource < 0.0 {
                return Err(CoreError::MalformedGrid(format!(
                    "cell {i} has a negative resource"
                )));
            }
            if cell.resource > cell.max_resource {
                return Err(CoreError::MalformedGrid(format!(
                    "cell {i} resource {} exceeds its maximum {}",
                    cell.resource, cell.max_resource
                )));
            }
        }
        Ok(())
    }

    /// Grid width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// All cells, row-major.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    fn index(&self, coord: CellCoord) -> Option<usize> {
        if coord.x < self.width && coord.y < self.height {
            Some(coord.y as usize * self.width as usize + coord.x as usize)
        } else {
            None
        }
    }

    /// The cell at `coord`, if inside the grid.
    pub fn cell(&self, coord: CellCoord) -> Option<&Cell> {
        self.index(coord).map(|i| &self.cells[i])
    }

    /// Mutable access to the cell at `coord`.
    pub fn cell_mut(&mut self, coord: CellCoord) -> CoreResult<&mut Cell> {
        let i = self.index(coord).ok_or(CoreError::OutOfBounds {
            x: coord.x,
            y: coord.y,
            width: self.width,
            height: self.height,
        })?;
        Ok(&mut self.cells[i])
    }

    /// Whether `pos` lies inside the world.
    pub fn contains(&self, pos: Position) -> bool {
        pos.is_finite()
            && pos.x >= 0.0
            && pos.y >= 0.0
            && pos.x < f64::from(self.width)
            && pos.y < f64::from(self.height)
    }

    /// The cell coordinate containing `pos`, if inside the world.
    pub fn coord_of(&self, pos: Position) -> Option<CellCoord> {
        self.contains(pos)
            .then(|| CellCoord::new(pos.x.floor() as u32, pos.y.floor() as u32))
    }

    /// The cell containing `pos`, if inside the world.
    pub fn cell_at(&self, pos: Position) -> Option<&Cell> {
        self.coord_of(pos).and_then(|c| self.cell(c))
    }

    /// Whether an agent may stand at `pos`.
    pub fn is_passable(&self, pos: Position) -> bool {
        self.cell_at(pos).is_some_and(|c| c.passable)
    }

    /// Clamp a finite position into the world rectangle.
    pub fn clamp(&self, pos: Position) -> Position {
        Position::new(
            pos.x.clamp(0.0, f64::from(self.width).next_down()),
            pos.y.clamp(0.0, f64::from(self.height).next_down()),
        )
    }

    /// Coordinates of every passable cell, row-major.
    pub fn passable_cells(&self) -> Vec<CellCoord> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.passable)
            .map(|(i, _)| self.coord_from_index(i))
            .collect()
    }

    /// Whether the cell containing `pos`, or any of its eight neighbors, is water.
    pub fn borders_water(&self, pos: Position) -> bool {
        self.coord_of(pos).is_some_and(|coord| self.is_shore(coord))
    }

    /// Whether `coord` or any cell around it is water.
    pub fn is_shore(&self, coord: CellCoord) -> bool {
        let x0 = coord.x.saturating_sub(1);
        let y0 = coord.y.saturating_sub(1);
        let x1 = coord.x.saturating_add(1).min(self.width.saturating_sub(1));
        let y1 = coord.y.saturating_add(1).min(self.height.saturating_sub(1));
        (y0..=y1).any(|y| {
            (x0..=x1).any(|x| {
                self.cell(CellCoord::new(x, y))
                    .is_some_and(|c| c.biome.is_water())
            })
        })
    }

    fn coord_from_index(&self, i: usize) -> CellCoord {
        let w = self.width as usize;
        CellCoord::new((i % w) as u32, (i / w) as u32)
    }

    /// Cells whose centers lie within `radius` of `pos`, row-major.
    ///
    /// Positions outside the world yield nothing.
    pub fn coords_within(&self, pos: Position, radius: f64) -> Vec<CellCoord> {
        if !self.contains(pos) || !radius.is_finite() || radius < 0.0 {
            return Vec::new();
        }
        let min_x = (pos.x - radius).floor().max(0.0) as u32;
        let min_y = (pos.y - radius).floor().max(0.0) as u32;
        let max_x = ((pos.x + radius).floor() as u32).min(self.width - 1);
        let max_y = ((pos.y + radius).floor() as u32).min(self.height - 1);
        let radius_sq = radius * radius;
        let mut coords = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let coord = CellCoord::new(x, y);
                if coord.center().distance_sq(pos) <= radius_sq {
                    coords.push(coord);
                }
            }
        }
        coords
    }

    /// Remove up to `amount` resource from a cell. Returns the amount taken,
    /// which is never more than what the cell held.
    pub fn take_resource(&mut self, coord: CellCoord, amount: f64) -> CoreResult<f64> {
        let cell = self.cell_mut(coord)?;
        let taken = amount.max(0.0).min(cell.resource);
        cell.resource = (cell.resource - taken).max(0.0);
        Ok(taken)
    }

    /// Regrow every cell by `rate`, capped at its maximum.
    pub fn regenerate(&mut self, rate: f64) {
        for cell in &mut self.cells {
            cell.resource = (cell.resource + rate).min(cell.max_resource);
        }
    }

    /// Sum of resource over all cells.
    pub fn total_resource(&self) -> f64 {
        self.cells.iter().map(|c| c.resource).sum()
    }

    /// Mean fill ratio (`resource / max_resource`) over cells that can hold
    /// resource. Zero when no cell can.
    pub fn mean_resource_density(&self) -> f64 {
        let (sum, count) = self
            .cells
            .iter()
            .filter(|c| c.max_resource > 0.0)
            .fold((0.0, 0usize), |(sum, n), c| {
                (sum + c.resource / c.max_resource, n + 1)
            });
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biome_thresholds_classify_elevation() {
        assert_eq!(Biome::from_elevation(0.0), Some(Biome::DeepOcean));
        assert_eq!(Biome::from_elevation(0.35), Some(Biome::ShallowWater));
        assert_eq!(Biome::from_elevation(0.44), Some(Biome::Sand));
        assert_eq!(Biome::from_elevation(0.5), Some(Biome::Grass));
        assert_eq!(Biome::from_elevation(0.7), Some(Biome::Forest));
        assert_eq!(Biome::from_elevation(0.9), Some(Biome::Rock));
        assert_eq!(Biome::from_elevation(1.0), Some(Biome::Rock));
        assert_eq!(Biome::from_elevation(1.2), None);
        assert_eq!(Biome::from_elevation(f64::NAN), None);
    }

    #[test]
    fn water_is_impassable() {
        assert!(!Biome::DeepOcean.is_passable());
        assert!(!Biome::ShallowWater.is_passable());
        assert!(Biome::Grass.is_passable());
        assert!(Biome::Rock.is_passable());
    }

    #[test]
    fn shore_cells_touch_water() {
        // water | grass | grass
        let grid = WorldGrid::from_elevations(3, 1, &[0.35, 0.5, 0.5]).unwrap();
        assert!(Biome::ShallowWater.is_water());
        assert!(!Biome::Sand.is_water());
        assert!(grid.is_shore(CellCoord::new(1, 0)));
        assert!(!grid.is_shore(CellCoord::new(2, 0)));
        assert!(grid.borders_water(Position::new(1.9, 0.5)));
        assert!(!grid.borders_water(Position::new(2.1, 0.5)));
        assert!(!grid.borders_water(Position::new(7.0, 0.5)));
    }

    #[test]
    fn new_rejects_wrong_cell_count() {
        let err = WorldGrid::new(2, 2, vec![Cell::new(Biome::Grass); 3]).unwrap_err();
        assert!(err.to_string().contains("expected 4 cells"));
    }

    #[test]
    fn new_rejects_zero_dimensions() {
        assert!(WorldGrid::new(0, 3, Vec::new()).is_err());
    }

    #[test]
    fn validate_rejects_resource_above_max() {
        let cell = Cell::new(Biome::Grass).with_resource(11.0, 10.0);
        assert!(WorldGrid::new(1, 1, vec![cell]).is_err());
    }

    #[test]
    fn validate_rejects_negative_resource() {
        let cell = Cell::new(Biome::Grass).with_resource(-1.0, 10.0);
        assert!(WorldGrid::new(1, 1, vec![cell]).is_err());
    }

    #[test]
    fn from_elevations_fills_to_capacity() {
        let grid = WorldGrid::from_elevations(2, 1, &[0.1, 0.7]).unwrap();
        let water = grid.cell(CellCoord::new(0, 0)).unwrap();
        let forest = grid.cell(CellCoord::new(1, 0)).unwrap();
        assert_eq!(water.biome, Biome::DeepOcean);
        assert!(!water.passable);
        assert_eq!(forest.biome, Biome::Forest);
        assert!((forest.resource - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn coord_of_quantizes_and_bounds() {
        let grid = WorldGrid::uniform(4, 3, Biome::Grass, 5.0).unwrap();
        assert_eq!(grid.coord_of(Position::new(2.7, 0.2)), Some(CellCoord::new(2, 0)));
        assert_eq!(grid.coord_of(Position::new(4.0, 0.0)), None);
        assert_eq!(grid.coord_of(Position::new(-0.1, 1.0)), None);
        assert_eq!(grid.coord_of(Position::new(f64::NAN, 1.0)), None);
    }

    #[test]
    fn clamp_keeps_positions_inside() {
        let grid = WorldGrid::uniform(4, 3, Biome::Grass, 5.0).unwrap();
        let clamped = grid.clamp(Position::new(9.0, -2.0));
        assert!(grid.contains(clamped));
        assert_eq!(clamped.y, 0.0);
    }

    #[test]
    fn take_resource_never_goes_negative() {
        let mut grid = WorldGrid::uniform(1, 1, Biome::Grass, 5.0).unwrap();
        let coord = CellCoord::new(0, 0);
        assert!((grid.take_resource(coord, 3.0).unwrap() - 3.0).abs() < f64::EPSILON);
        assert!((grid.take_resource(coord, 3.0).unwrap() - 2.0).abs() < f64::EPSILON);
        assert_eq!(grid.take_resource(coord, 3.0).unwrap(), 0.0);
        assert_eq!(grid.cell(coord).unwrap().resource, 0.0);
    }

    #[test]
    fn take_resource_out_of_bounds_errors() {
        let mut grid = WorldGrid::uniform(1, 1, Biome::Grass, 5.0).unwrap();
        assert!(grid.take_resource(CellCoord::new(3, 0), 1.0).is_err());
    }

    #[test]
    fn regenerate_caps_at_max() {
        let cell = Cell::new(Biome::Grass).with_resource(9.5, 10.0);
        let mut grid = WorldGrid::new(1, 1, vec![cell]).unwrap();
        grid.regenerate(1.0);
        assert!((grid.total_resource() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn coords_within_respects_radius() {
        let grid = WorldGrid::uniform(10, 10, Biome::Grass, 1.0).unwrap();
        let coords = grid.coords_within(Position::new(5.5, 5.5), 1.0);
        assert_eq!(coords.len(), 5);
        assert!(coords.contains(&CellCoord::new(5, 5)));
        assert!(grid.coords_within(Position::new(-3.0, 5.0), 2.0).is_empty());
    }

    #[test]
    fn density_ignores_barren_cells() {
        let cells = vec![
            Cell::new(Biome::DeepOcean),
            Cell::new(Biome::Grass).with_resource(5.0, 10.0),
        ];
        let grid = WorldGrid::new(2, 1, cells).unwrap();
        assert!((grid.mean_resource_density() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn grid_json_roundtrip_preserves_cells() {
        let grid = WorldGrid::from_elevations(2, 2, &[0.1, 0.5, 0.7, 0.9]).unwrap();
        let json = serde_json::to_string(&grid).unwrap();
        let restored: WorldGrid = serde_json::from_str(&json).unwrap();
        assert_eq!(grid, restored);
        assert!(json.contains("\"deep-ocean\""));
    }
}
