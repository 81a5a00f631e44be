//! # Maze module
//!
//! Static occupancy grid the robot drives in. Cell `(col, row)` covers
//! `[col * cell_size, (col + 1) * cell_size)` in x and
//! `[row * cell_size, (row + 1) * cell_size)` in y, so the first row of the
//! grid is the bottom edge of the arena.
//!
//! Maze files are JSON documents of the form
//!
//! ```json
//! {"name": "corridor", "cell_size": 0.2, "grid": [[1, 1, 1], [1, 0, 1], [1, 1, 1]]}
//! ```
//!
//! where `1` is a wall and `0` is open floor.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Side length of the built-in arena, in cells.
pub const DEFAULT_ARENA_CELLS: usize = 10;

/// Cell size used by the built-in arena and by maze files that don't give one.
pub const DEFAULT_CELL_SIZE_M: f64 = 0.2;

/// Name of the built-in arena.
pub const DEFAULT_MAZE_NAME: &str = "default";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An immutable maze grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Maze {
    name: String,

    /// Side length of each square cell.
    ///
    /// Units: meters
    cell_size_m: f64,

    /// Cells indexed as `grid[row][col]`.
    grid: Vec<Vec<CellKind>>,
}

/// Contents of a maze file.
#[derive(Debug, Serialize, Deserialize)]
pub struct MazeFile {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_cell_size")]
    pub cell_size: f64,

    pub grid: Vec<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Open,
    Wall,
}

#[derive(Debug, thiserror::Error)]
pub enum MazeError {
    #[error("Cannot read the maze file: {0}")]
    FileReadError(std::io::Error),

    #[error("Cannot parse the maze file: {0}")]
    ParseError(serde_json::Error),

    #[error("The maze grid must have at least one row and one column")]
    EmptyGrid,

    #[error("Maze row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid value {value} in maze cell (col {col}, row {row}), expected 0 or 1")]
    InvalidCell { col: usize, row: usize, value: u8 },

    #[error("The cell size must be positive and finite, found {0}")]
    InvalidCellSize(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Maze {
    /// Create a new maze, checking that the grid is well formed.
    pub fn new(
        name: &str,
        cell_size_m: f64,
        grid: Vec<Vec<CellKind>>,
    ) -> Result<Self, MazeError> {
        if !(cell_size_m > 0.0 && cell_size_m.is_finite()) {
            return Err(MazeError::InvalidCellSize(cell_size_m));
        }

        let width = match grid.first() {
            Some(r) if !r.is_empty() => r.len(),
            _ => return Err(MazeError::EmptyGrid),
        };

        if let Some((row, r)) = grid.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(MazeError::RaggedRow {
                row,
                expected: width,
                found: r.len(),
            });
        }

        Ok(Self {
            name: name.into(),
            cell_size_m,
            grid,
        })
    }

    /// Build a maze from rows of text, `#` being a wall and anything else
    /// open floor. The first string is the bottom row.
    pub fn from_ascii(name: &str, cell_size_m: f64, rows: &[&str]) -> Result<Self, MazeError> {
        let grid = rows
            .iter()
            .map(|r| {
                r.chars()
                    .map(|c| match c {
                        '#' => CellKind::Wall,
                        _ => CellKind::Open,
                    })
                    .collect()
            })
            .collect();

        Self::new(name, cell_size_m, grid)
    }

    /// Parse a maze from the contents of a maze file.
    ///
    /// `fallback_name` is used if the file doesn't name the maze.
    pub fn from_json_str(json: &str, fallback_name: &str) -> Result<Self, MazeError> {
        let file: MazeFile = serde_json::from_str(json).map_err(MazeError::ParseError)?;

        let mut grid = Vec::with_capacity(file.grid.len());
        for (row, values) in file.grid.iter().enumerate() {
            let mut cells = Vec::with_capacity(values.len());
            for (col, value) in values.iter().enumerate() {
                cells.push(match value {
                    0 => CellKind::Open,
                    1 => CellKind::Wall,
                    v => return Err(MazeError::InvalidCell { col, row, value: *v }),
                });
            }
            grid.push(cells);
        }

        let name = file.name.unwrap_or_else(|| fallback_name.into());

        Self::new(&name, file.cell_size, grid)
    }

    /// Load a maze file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MazeError> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(MazeError::FileReadError)?;

        let stem = path
            .as_ref()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed");

        Self::from_json_str(&json, stem)
    }

    /// Load a maze file, falling back to the built-in arena if the file
    /// doesn't exist.
    ///
    /// A file which exists but cannot be read or parsed is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, MazeError> {
        match Self::load(path.as_ref()) {
            Err(MazeError::FileReadError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Maze file {:?} not found, using the built-in {}x{} arena",
                    path.as_ref(),
                    DEFAULT_ARENA_CELLS,
                    DEFAULT_ARENA_CELLS
                );
                Ok(Self::default())
            }
            Ok(m) => {
                info!(
                    "Loaded maze \"{}\" ({}x{} cells of {} m)",
                    m.name,
                    m.width_cells(),
                    m.height_cells(),
                    m.cell_size_m
                );
                Ok(m)
            }
            Err(e) => Err(e),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size_m
    }

    /// Number of columns in the grid.
    pub fn width_cells(&self) -> usize {
        self.grid[0].len()
    }

    /// Number of rows in the grid.
    pub fn height_cells(&self) -> usize {
        self.grid.len()
    }

    /// Size of the arena as `(width, height)` in meters.
    pub fn dimensions(&self) -> (f64, f64) {
        (
            self.width_cells() as f64 * self.cell_size_m,
            self.height_cells() as f64 * self.cell_size_m,
        )
    }

    /// Centre point of the arena.
    pub fn centre(&self) -> Point2<f64> {
        let (w, h) = self.dimensions();
        Point2::new(w / 2.0, h / 2.0)
    }

    /// Get a cell by index, cells outside the grid are walls.
    pub fn cell(&self, col: i64, row: i64) -> CellKind {
        if col < 0 || row < 0 {
            return CellKind::Wall;
        }

        self.grid
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .copied()
            .unwrap_or(CellKind::Wall)
    }

    /// Get the cell containing a world point.
    pub fn cell_at(&self, x: f64, y: f64) -> CellKind {
        let (col, row) = self.cell_index(x, y);
        self.cell(col, row)
    }

    /// Get the index `(col, row)` of the cell containing a world point. The
    /// index may lie outside the grid.
    pub fn cell_index(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size_m).floor() as i64,
            (y / self.cell_size_m).floor() as i64,
        )
    }
}

impl Default for Maze {
    /// The built-in arena, open floor surrounded by a one cell wall.
    fn default() -> Self {
        let n = DEFAULT_ARENA_CELLS;
        let grid = (0..n)
            .map(|row| {
                (0..n)
                    .map(|col| {
                        if row == 0 || col == 0 || row == n - 1 || col == n - 1 {
                            CellKind::Wall
                        } else {
                            CellKind::Open
                        }
                    })
                    .collect()
            })
            .collect();

        Self {
            name: DEFAULT_MAZE_NAME.into(),
            cell_size_m: DEFAULT_CELL_SIZE_M,
            grid,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_cell_size() -> f64 {
    DEFAULT_CELL_SIZE_M
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_arena() {
        let maze = Maze::default();

        assert_eq!(maze.name(), "default");
        assert_eq!(maze.width_cells(), 10);
        assert_eq!(maze.height_cells(), 10);
        assert_eq!(maze.dimensions(), (2.0, 2.0));
        assert_eq!(maze.cell(0, 5), CellKind::Wall);
        assert_eq!(maze.cell(9, 9), CellKind::Wall);
        assert_eq!(maze.cell(5, 5), CellKind::Open);
        assert_eq!(maze.cell_at(1.0, 1.0), CellKind::Open);
    }

    #[test]
    fn test_out_of_bounds_is_wall() {
        let maze = Maze::from_ascii("open", 0.5, &["...", "..."]).unwrap();

        assert_eq!(maze.cell_at(0.1, 0.1), CellKind::Open);
        assert_eq!(maze.cell_at(-0.1, 0.1), CellKind::Wall);
        assert_eq!(maze.cell_at(0.1, -0.01), CellKind::Wall);
        assert_eq!(maze.cell_at(1.5, 0.1), CellKind::Wall);
        assert_eq!(maze.cell_at(0.1, 1.0), CellKind::Wall);
        assert_eq!(maze.cell(3, 0), CellKind::Wall);
    }

    #[test]
    fn test_rows_are_y() {
        let maze = Maze::from_ascii("l", 1.0, &["#..", "..."]).unwrap();

        assert_eq!(maze.cell_at(0.5, 0.5), CellKind::Wall);
        assert_eq!(maze.cell_at(0.5, 1.5), CellKind::Open);
        assert_eq!(maze.cell_at(2.5, 0.5), CellKind::Open);
        assert_eq!(maze.dimensions(), (3.0, 2.0));
    }

    #[test]
    fn test_from_json() {
        let maze = Maze::from_json_str(
            r#"{"name": "box", "cell_size": 0.25, "grid": [[1, 1, 1], [1, 0, 1], [1, 1, 1]]}"#,
            "fallback",
        )
        .unwrap();

        assert_eq!(maze.name(), "box");
        assert_eq!(maze.cell_size(), 0.25);
        assert_eq!(maze.cell(1, 1), CellKind::Open);
        assert_eq!(maze.cell(0, 1), CellKind::Wall);

        let maze = Maze::from_json_str(r#"{"grid": [[0]]}"#, "fallback").unwrap();
        assert_eq!(maze.name(), "fallback");
        assert_eq!(maze.cell_size(), DEFAULT_CELL_SIZE_M);
    }

    #[test]
    fn test_invalid_mazes() {
        assert!(matches!(
            Maze::from_json_str(r#"{"grid": []}"#, "m"),
            Err(MazeError::EmptyGrid)
        ));
        assert!(matches!(
            Maze::from_json_str(r#"{"grid": [[]]}"#, "m"),
            Err(MazeError::EmptyGrid)
        ));
        assert!(matches!(
            Maze::from_json_str(r#"{"grid": [[0, 0], [0]]}"#, "m"),
            Err(MazeError::RaggedRow { row: 1, expected: 2, found: 1 })
        ));
        assert!(matches!(
            Maze::from_json_str(r#"{"grid": [[0, 2]]}"#, "m"),
            Err(MazeError::InvalidCell { col: 1, row: 0, value: 2 })
        ));
        assert!(matches!(
            Maze::from_json_str(r#"{"cell_size": 0.0, "grid": [[0]]}"#, "m"),
            Err(MazeError::InvalidCellSize(_))
        ));
        assert!(matches!(
            Maze::from_json_str(r#"{"grid": "#, "m"),
            Err(MazeError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let maze = Maze::load_or_default("/nonexistent/dir/maze.json").unwrap();
        assert_eq!(maze, Maze::default());

        assert!(matches!(
            Maze::load("/nonexistent/dir/maze.json"),
            Err(MazeError::FileReadError(_))
        ));
    }

    #[test]
    fn test_load_malformed_file() {
        let path = std::env::temp_dir().join(format!("bad_maze_{}.json", std::process::id()));
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            Maze::load_or_default(&path),
            Err(MazeError::ParseError(_))
        ));

        std::fs::remove_file(&path).ok();
    }
}
