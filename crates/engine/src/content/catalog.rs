use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::world::{GroundKind, OccupantVisual};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u32);

/// Which ground a cell must have before an element may occupy it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundRequirement {
    Any,
    /// Anything except border ground.
    Buildable,
    /// Untouched plain ground or one of its variants.
    Natural,
    Exactly(GroundKind),
}

impl GroundRequirement {
    pub fn accepts(self, ground: GroundKind) -> bool {
        match self {
            GroundRequirement::Any => true,
            GroundRequirement::Buildable => !ground.is_border(),
            GroundRequirement::Natural => ground.is_natural(),
            GroundRequirement::Exactly(kind) => ground == kind,
        }
    }

    pub fn prepared_ground(self) -> Option<GroundKind> {
        match self {
            GroundRequirement::Exactly(kind) => Some(kind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceYield {
    pub resource: String,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRule {
    pub ground: GroundRequirement,
    /// Rewrite the ground to the required kind instead of rejecting.
    pub auto_prepare: bool,
    pub consumes_quantity: bool,
    pub yields: Option<ResourceYield>,
}

impl Default for PlacementRule {
    fn default() -> Self {
        Self {
            ground: GroundRequirement::Buildable,
            auto_prepare: false,
            consumes_quantity: true,
            yields: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternCode {
    Empty,
    Piece(u8),
    Primary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellOffset {
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternSpec {
    pub rows: Vec<Vec<PatternCode>>,
    /// Pattern cell that the anchor cell stands for.
    pub inner_offset: CellOffset,
    pub pieces: Vec<String>,
}

impl PatternSpec {
    pub fn height(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn width(&self) -> u32 {
        self.rows.first().map_or(0, |row| row.len() as u32)
    }

    /// Non-empty entries as `(row, col, code)` relative to the top-left.
    pub fn filled_cells(&self) -> impl Iterator<Item = (u32, u32, PatternCode)> + '_ {
        self.rows.iter().enumerate().flat_map(|(row, codes)| {
            codes
                .iter()
                .enumerate()
                .filter(|(_, code)| **code != PatternCode::Empty)
                .map(move |(col, code)| (row as u32, col as u32, *code))
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        let width = self.width();
        if self.rows.is_empty() || width == 0 {
            return Err("pattern must have at least one row and one column".to_string());
        }
        if let Some(row) = self.rows.iter().position(|row| row.len() as u32 != width) {
            return Err(format!(
                "pattern row {row} has {} entries; expected {width}",
                self.rows[row].len()
            ));
        }
        if self.filled_cells().next().is_none() {
            return Err("pattern has no filled cells".to_string());
        }
        let height = self.height();
        let touches = |predicate: &dyn Fn(u32, u32) -> bool| {
            self.filled_cells().any(|(row, col, _)| predicate(row, col))
        };
        if !touches(&|row, _| row == 0)
            || !touches(&|row, _| row == height - 1)
            || !touches(&|_, col| col == 0)
            || !touches(&|_, col| col == width - 1)
        {
            return Err("pattern has an empty outer row or column".to_string());
        }
        for (_, _, code) in self.filled_cells() {
            if let PatternCode::Piece(index) = code {
                if usize::from(index) >= self.pieces.len() {
                    return Err(format!(
                        "pattern references piece {index} but only {} pieces are defined",
                        self.pieces.len()
                    ));
                }
            }
        }
        if self.inner_offset.row >= self.height() || self.inner_offset.col >= width {
            return Err(format!(
                "inner offset {},{} lies outside the {}x{} pattern",
                self.inner_offset.row,
                self.inner_offset.col,
                self.height(),
                width
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterSpec {
    pub radius: u32,
    pub count: u32,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthSpec {
    pub stage_sprites: Vec<String>,
    pub stage_duration_units: u32,
}

impl GrowthSpec {
    pub fn stage_count(&self) -> u16 {
        self.stage_sprites.len().min(usize::from(u16::MAX)) as u16
    }

    pub fn final_stage(&self) -> u16 {
        self.stage_count().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAction {
    Clear,
    Pave(GroundKind),
    Plow,
    Unplow,
    Harvest,
    Inspect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementBehavior {
    SingleCell,
    AreaPrompted,
    Pattern(PatternSpec),
    Scatter(ScatterSpec),
    Tool(ToolAction),
}

impl ElementBehavior {
    pub fn name(&self) -> &'static str {
        match self {
            ElementBehavior::SingleCell => "SingleCell",
            ElementBehavior::AreaPrompted => "AreaPrompted",
            ElementBehavior::Pattern(_) => "Pattern",
            ElementBehavior::Scatter(_) => "Scatter",
            ElementBehavior::Tool(_) => "Tool",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementDef {
    pub id: ElementId,
    pub def_name: String,
    pub label: String,
    pub sprite: String,
    /// Percent chance in `[0, 100]` used by the natural spawn pass.
    pub natural_spawn_chance: Option<f32>,
    pub rule: PlacementRule,
    pub behavior: ElementBehavior,
    pub growth: Option<GrowthSpec>,
    /// Single-cell elements with a kind always get an entity record.
    pub record_kind: Option<String>,
}

impl ElementDef {
    pub fn new(
        def_name: impl Into<String>,
        label: impl Into<String>,
        sprite: impl Into<String>,
        behavior: ElementBehavior,
    ) -> Self {
        Self {
            id: ElementId(0),
            def_name: def_name.into(),
            label: label.into(),
            sprite: sprite.into(),
            natural_spawn_chance: None,
            rule: PlacementRule::default(),
            behavior,
            growth: None,
            record_kind: None,
        }
    }

    pub fn with_rule(mut self, rule: PlacementRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_growth(mut self, growth: GrowthSpec) -> Self {
        self.growth = Some(growth);
        self
    }

    pub fn with_natural_spawn_chance(mut self, chance: f32) -> Self {
        self.natural_spawn_chance = Some(chance);
        self
    }

    pub fn with_record_kind(mut self, kind: impl Into<String>) -> Self {
        self.record_kind = Some(kind.into());
        self
    }

    pub fn is_crop(&self) -> bool {
        self.growth.is_some()
    }

    pub fn is_grown(&self, visual: OccupantVisual) -> bool {
        match (&self.growth, visual) {
            (Some(growth), OccupantVisual::Stage(stage)) => stage >= growth.final_stage(),
            _ => false,
        }
    }

    pub fn sprite_for(&self, visual: OccupantVisual) -> &str {
        let resolved = match (visual, &self.behavior, &self.growth) {
            (OccupantVisual::Stage(stage), _, Some(growth)) => {
                growth.stage_sprites.get(usize::from(stage))
            }
            (OccupantVisual::Piece(index), ElementBehavior::Pattern(pattern), _) => {
                pattern.pieces.get(usize::from(index))
            }
            (OccupantVisual::Piece(index), ElementBehavior::Scatter(scatter), _) => {
                scatter.variants.get(usize::from(index))
            }
            _ => None,
        };
        resolved.map_or(self.sprite.as_str(), String::as_str)
    }
}

/// Immutable element definitions, built once and shared by reference.
#[derive(Debug, Default, Clone)]
pub struct ElementCatalog {
    defs: Vec<ElementDef>,
    ids_by_name: HashMap<String, ElementId>,
}

impl ElementCatalog {
    /// Assigns ids by position.
    pub fn from_defs(mut defs: Vec<ElementDef>) -> Self {
        let mut ids_by_name = HashMap::with_capacity(defs.len());
        for (idx, def) in defs.iter_mut().enumerate() {
            let id = ElementId(idx as u32);
            def.id = id;
            ids_by_name.insert(def.def_name.clone(), id);
        }
        Self { defs, ids_by_name }
    }

    pub fn id_by_name(&self, name: &str) -> Option<ElementId> {
        self.ids_by_name.get(name).copied()
    }

    pub fn get(&self, id: ElementId) -> Option<&ElementDef> {
        self.defs.get(id.0 as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&ElementDef> {
        self.id_by_name(name).and_then(|id| self.get(id))
    }

    pub fn defs(&self) -> &[ElementDef] {
        &self.defs
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn natural_spawners(&self) -> Vec<ElementId> {
        self.defs
            .iter()
            .filter(|def| def.natural_spawn_chance.is_some_and(|chance| chance > 0.0))
            .map(|def| def.id)
            .collect()
    }

    /// Everything a player can hold in hand, tools included.
    pub fn selectable(&self) -> Vec<ElementId> {
        self.defs
            .iter()
            .filter(|def| def.natural_spawn_chance.is_none())
            .map(|def| def.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corral_pattern() -> PatternSpec {
        use PatternCode::{Piece, Primary};
        PatternSpec {
            rows: vec![
                vec![Piece(3), Piece(2), Piece(2), Piece(2), Piece(4)],
                vec![Piece(0), Primary, Primary, Primary, Piece(0)],
                vec![Piece(0), Primary, Primary, Primary, Piece(0)],
                vec![Piece(3), Piece(2), Piece(2), Piece(2), Piece(4)],
            ],
            inner_offset: CellOffset { row: 1, col: 1 },
            pieces: vec![
                "fence/wood_4".to_string(),
                "fence/unused".to_string(),
                "fence/wood_1".to_string(),
                "fence/wood_2".to_string(),
                "fence/wood_3".to_string(),
            ],
        }
    }

    #[test]
    fn from_defs_assigns_ids_by_position() {
        let catalog = ElementCatalog::from_defs(vec![
            ElementDef::new("a", "A", "a", ElementBehavior::SingleCell),
            ElementDef::new("b", "B", "b", ElementBehavior::SingleCell),
        ]);
        assert_eq!(catalog.id_by_name("a"), Some(ElementId(0)));
        assert_eq!(catalog.id_by_name("b"), Some(ElementId(1)));
        assert_eq!(catalog.get(ElementId(1)).expect("b").def_name, "b");
        assert!(catalog.get(ElementId(2)).is_none());
    }

    #[test]
    fn corral_pattern_is_valid_and_has_twenty_cells() {
        let pattern = corral_pattern();
        assert_eq!(pattern.validate(), Ok(()));
        assert_eq!(pattern.width(), 5);
        assert_eq!(pattern.height(), 4);
        assert_eq!(pattern.filled_cells().count(), 20);
        let primaries = pattern
            .filled_cells()
            .filter(|(_, _, code)| *code == PatternCode::Primary)
            .count();
        assert_eq!(primaries, 6);
    }

    #[test]
    fn ragged_pattern_is_invalid() {
        let mut pattern = corral_pattern();
        pattern.rows[2].pop();
        assert!(pattern.validate().is_err());
    }

    #[test]
    fn pattern_piece_out_of_range_is_invalid() {
        let mut pattern = corral_pattern();
        pattern.pieces.truncate(2);
        let err = pattern.validate().expect_err("invalid");
        assert!(err.contains("piece"));
    }

    #[test]
    fn untrimmed_pattern_is_invalid() {
        let mut pattern = corral_pattern();
        pattern.rows.push(vec![PatternCode::Empty; 5]);
        let err = pattern.validate().expect_err("invalid");
        assert!(err.contains("outer"));
    }

    #[test]
    fn inner_offset_outside_pattern_is_invalid() {
        let mut pattern = corral_pattern();
        pattern.inner_offset = CellOffset { row: 4, col: 0 };
        assert!(pattern.validate().is_err());
    }

    #[test]
    fn sprite_for_follows_visual() {
        let crop = ElementDef::new("crop.wheat", "Wheat", "crops/wheat", ElementBehavior::AreaPrompted)
            .with_growth(GrowthSpec {
                stage_sprites: vec!["crops/wheat_1".to_string(), "crops/wheat_2".to_string()],
                stage_duration_units: 10,
            });
        assert_eq!(crop.sprite_for(OccupantVisual::Stage(1)), "crops/wheat_2");
        assert_eq!(crop.sprite_for(OccupantVisual::Stage(9)), "crops/wheat");
        assert_eq!(crop.sprite_for(OccupantVisual::Primary), "crops/wheat");
        assert!(crop.is_grown(OccupantVisual::Stage(1)));
        assert!(!crop.is_grown(OccupantVisual::Stage(0)));

        let corral = ElementDef::new(
            "corral.pig",
            "Pig Corral",
            "animals/pig",
            ElementBehavior::Pattern(corral_pattern()),
        );
        assert_eq!(corral.sprite_for(OccupantVisual::Piece(2)), "fence/wood_1");
        assert_eq!(corral.sprite_for(OccupantVisual::Primary), "animals/pig");
    }

    #[test]
    fn requirement_acceptance() {
        assert!(GroundRequirement::Any.accepts(GroundKind::Corner));
        assert!(!GroundRequirement::Buildable.accepts(GroundKind::Side));
        assert!(GroundRequirement::Buildable.accepts(GroundKind::PathStone));
        assert!(GroundRequirement::Natural.accepts(GroundKind::PlainVariant3));
        assert!(!GroundRequirement::Natural.accepts(GroundKind::FarmPlowed));
        assert!(GroundRequirement::Exactly(GroundKind::FarmPlowed).accepts(GroundKind::FarmPlowed));
        assert_eq!(
            GroundRequirement::Exactly(GroundKind::FarmPlowed).prepared_ground(),
            Some(GroundKind::FarmPlowed)
        );
        assert_eq!(GroundRequirement::Buildable.prepared_ground(), None);
    }

    #[test]
    fn natural_spawners_and_selectable_are_disjoint() {
        let catalog = ElementCatalog::from_defs(vec![
            ElementDef::new("plant", "Plant", "plants/plant0", ElementBehavior::SingleCell)
                .with_natural_spawn_chance(20.0),
            ElementDef::new("house", "House", "buildings/house", ElementBehavior::SingleCell),
        ]);
        assert_eq!(catalog.natural_spawners(), vec![ElementId(0)]);
        assert_eq!(catalog.selectable(), vec![ElementId(1)]);
    }
}
