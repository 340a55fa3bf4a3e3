use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::ElementId;

use super::registry::StructureId;
use super::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Offsets by a signed delta; `None` when the result would be negative.
    pub fn offset(self, d_row: i64, d_col: i64) -> Option<CellCoord> {
        let row = u32::try_from(i64::from(self.row) + d_row).ok()?;
        let col = u32::try_from(i64::from(self.col) + d_col).ok()?;
        Some(CellCoord { row, col })
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroundKind {
    Plain,
    PlainVariant1,
    PlainVariant2,
    PlainVariant3,
    Corner,
    Side,
    FarmPlowed,
    PathDirt,
    PathStone,
}

impl GroundKind {
    pub const ALL: [GroundKind; 9] = [
        GroundKind::Plain,
        GroundKind::PlainVariant1,
        GroundKind::PlainVariant2,
        GroundKind::PlainVariant3,
        GroundKind::Corner,
        GroundKind::Side,
        GroundKind::FarmPlowed,
        GroundKind::PathDirt,
        GroundKind::PathStone,
    ];

    pub fn is_border(self) -> bool {
        matches!(self, GroundKind::Corner | GroundKind::Side)
    }

    pub fn is_natural(self) -> bool {
        matches!(
            self,
            GroundKind::Plain
                | GroundKind::PlainVariant1
                | GroundKind::PlainVariant2
                | GroundKind::PlainVariant3
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            GroundKind::Plain => "Plain",
            GroundKind::PlainVariant1 => "PlainVariant1",
            GroundKind::PlainVariant2 => "PlainVariant2",
            GroundKind::PlainVariant3 => "PlainVariant3",
            GroundKind::Corner => "Corner",
            GroundKind::Side => "Side",
            GroundKind::FarmPlowed => "FarmPlowed",
            GroundKind::PathDirt => "PathDirt",
            GroundKind::PathStone => "PathStone",
        }
    }

    pub fn parse(name: &str) -> Option<GroundKind> {
        GroundKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
    }

    pub fn sprite_key(self) -> &'static str {
        match self {
            GroundKind::Plain => "ground/plain",
            GroundKind::PlainVariant1 => "ground/plain_v1",
            GroundKind::PlainVariant2 => "ground/plain_v2",
            GroundKind::PlainVariant3 => "ground/plain_v3",
            GroundKind::Corner => "ground/corner",
            GroundKind::Side => "ground/side",
            GroundKind::FarmPlowed => "ground/farm",
            GroundKind::PathDirt => "ground/path_dirt",
            GroundKind::PathStone => "ground/path_stone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OccupantId(pub u64);

#[derive(Debug, Default, Clone)]
pub struct OccupantIdAllocator {
    next: u64,
}

impl OccupantIdAllocator {
    pub fn allocate(&mut self) -> OccupantId {
        let id = OccupantId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Which of an element's visuals an occupant currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccupantVisual {
    Primary,
    Piece(u8),
    Stage(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub id: OccupantId,
    pub element: ElementId,
    pub visual: OccupantVisual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    ground: GroundKind,
    occupant: Option<Occupant>,
    structure: Option<StructureId>,
}

impl Cell {
    fn new(ground: GroundKind) -> Self {
        Self {
            ground,
            occupant: None,
            structure: None,
        }
    }

    pub fn ground(&self) -> GroundKind {
        self.ground
    }

    pub fn occupant(&self) -> Option<&Occupant> {
        self.occupant.as_ref()
    }

    pub fn structure(&self) -> Option<StructureId> {
        self.structure
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid dimensions must be non-zero, got {rows}x{cols}")]
    EmptyDimensions { rows: u32, cols: u32 },
    #[error("grid of {rows}x{cols} cells does not fit in memory")]
    TooLarge { rows: u32, cols: u32 },
}

/// Fixed rows x cols array of cells, created once per world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    rows: u32,
    cols: u32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Border cells are forced to `Side`, the four corners to `Corner`; every
    /// interior cell asks `generator`.
    pub fn new(
        rows: u32,
        cols: u32,
        mut generator: impl FnMut(CellCoord) -> GroundKind,
    ) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::EmptyDimensions { rows, cols });
        }
        let count = (rows as usize)
            .checked_mul(cols as usize)
            .ok_or(GridError::TooLarge { rows, cols })?;

        let mut cells = Vec::with_capacity(count);
        for row in 0..rows {
            for col in 0..cols {
                let on_row_edge = row == 0 || row == rows - 1;
                let on_col_edge = col == 0 || col == cols - 1;
                let ground = match (on_row_edge, on_col_edge) {
                    (true, true) => GroundKind::Corner,
                    (true, false) | (false, true) => GroundKind::Side,
                    (false, false) => generator(CellCoord::new(row, col)),
                };
                cells.push(Cell::new(ground));
            }
        }

        Ok(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_in_bounds(&self, row: i64, col: i64) -> bool {
        row >= 0 && col >= 0 && row < i64::from(self.rows) && col < i64::from(self.cols)
    }

    /// Signed coordinates to a cell, if they land inside the grid.
    pub fn coord(&self, row: i64, col: i64) -> Option<CellCoord> {
        if self.is_in_bounds(row, col) {
            Some(CellCoord::new(row as u32, col as u32))
        } else {
            None
        }
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.row < self.rows && coord.col < self.cols
    }

    fn index_of(&self, coord: CellCoord) -> Option<usize> {
        if !self.contains(coord) {
            return None;
        }
        Some(coord.row as usize * self.cols as usize + coord.col as usize)
    }

    pub fn cell(&self, coord: CellCoord) -> Option<&Cell> {
        self.index_of(coord).map(|idx| &self.cells[idx])
    }

    fn cell_mut(&mut self, coord: CellCoord) -> Option<&mut Cell> {
        self.index_of(coord).map(move |idx| &mut self.cells[idx])
    }

    pub fn is_occupied(&self, coord: CellCoord) -> bool {
        self.cell(coord).is_some_and(Cell::is_occupied)
    }

    pub fn ground(&self, coord: CellCoord) -> Option<GroundKind> {
        self.cell(coord).map(Cell::ground)
    }

    pub fn occupant(&self, coord: CellCoord) -> Option<&Occupant> {
        self.cell(coord).and_then(Cell::occupant)
    }

    pub fn structure_at(&self, coord: CellCoord) -> Option<StructureId> {
        self.cell(coord).and_then(Cell::structure)
    }

    pub fn set_occupant(&mut self, coord: CellCoord, occupant: Occupant) -> Option<Occupant> {
        self.cell_mut(coord)
            .and_then(|cell| cell.occupant.replace(occupant))
    }

    pub fn clear_occupant(&mut self, coord: CellCoord) -> Option<Occupant> {
        self.cell_mut(coord).and_then(|cell| cell.occupant.take())
    }

    pub fn set_ground(&mut self, coord: CellCoord, ground: GroundKind) -> bool {
        match self.cell_mut(coord) {
            Some(cell) => {
                cell.ground = ground;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_structure(&mut self, coord: CellCoord, structure: Option<StructureId>) {
        if let Some(cell) = self.cell_mut(coord) {
            cell.structure = structure;
        }
    }

    pub(crate) fn set_occupant_visual(&mut self, coord: CellCoord, visual: OccupantVisual) -> bool {
        match self.cell_mut(coord).and_then(|cell| cell.occupant.as_mut()) {
            Some(occupant) => {
                occupant.visual = visual;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, &Cell)> + '_ {
        let cols = self.cols as usize;
        self.cells.iter().enumerate().map(move |(idx, cell)| {
            (
                CellCoord::new((idx / cols) as u32, (idx % cols) as u32),
                cell,
            )
        })
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_occupied()).count()
    }

    pub fn extent_px(&self, cell_size_px: f32) -> Vec2 {
        Vec2 {
            x: self.cols as f32 * cell_size_px,
            y: self.rows as f32 * cell_size_px,
        }
    }

    /// Walks square rings outward from `from` and returns the first cell
    /// `accept` agrees to.
    pub fn nearest_cell_where(
        &self,
        from: CellCoord,
        accept: impl Fn(&Cell) -> bool,
    ) -> Option<CellCoord> {
        if !self.contains(from) {
            return None;
        }
        let max_ring = i64::from(self.rows.max(self.cols));
        let origin_row = i64::from(from.row);
        let origin_col = i64::from(from.col);

        for ring in 0..=max_ring {
            for d_row in -ring..=ring {
                for d_col in -ring..=ring {
                    if d_row.abs() != ring && d_col.abs() != ring {
                        continue;
                    }
                    let Some(coord) = self.coord(origin_row + d_row, origin_col + d_col) else {
                        continue;
                    };
                    if self.cell(coord).is_some_and(&accept) {
                        return Some(coord);
                    }
                }
            }
        }
        None
    }

    /// Nearest unoccupied, non-border cell.
    pub fn nearest_free_cell(&self, from: CellCoord) -> Option<CellCoord> {
        self.nearest_cell_where(from, |cell| {
            !cell.is_occupied() && !cell.ground().is_border()
        })
    }
}

/// Deterministic interior ground used by world generation.
pub fn natural_ground_variation(coord: CellCoord) -> GroundKind {
    let x = u64::from(coord.col);
    let y = u64::from(coord.row);
    let seed = (x * 73 + y * 37 + x * y * 13) % 1000;
    match seed {
        0..=599 => GroundKind::Plain,
        600..=779 => GroundKind::PlainVariant1,
        780..=919 => GroundKind::PlainVariant2,
        _ => GroundKind::PlainVariant3,
    }
}
