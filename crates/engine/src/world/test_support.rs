use std::sync::Arc;

use crate::content::{
    CellOffset, ElementBehavior, ElementCatalog, ElementDef, GroundRequirement, GrowthSpec,
    PatternCode, PatternSpec, PlacementRule, ResourceYield, ScatterSpec, ToolAction,
};

use super::{FarmWorld, Grid, GroundKind, TileSpan, Viewport, WorldConfig};

pub(crate) fn farm_catalog() -> ElementCatalog {
    use PatternCode::{Piece, Primary};
    ElementCatalog::from_defs(vec![
        ElementDef::new("corral.pig", "Pig corral", "animals/pig", ElementBehavior::Pattern(PatternSpec {
            rows: vec![
                vec![Piece(3), Piece(2), Piece(2), Piece(2), Piece(4)],
                vec![Piece(0), Primary, Primary, Primary, Piece(0)],
                vec![Piece(0), Primary, Primary, Primary, Piece(0)],
                vec![Piece(1), Piece(2), Piece(2), Piece(2), Piece(1)],
            ],
            inner_offset: CellOffset { row: 1, col: 1 },
            pieces: vec![
                "fence/side".into(),
                "fence/foot".into(),
                "fence/rail".into(),
                "fence/corner_left".into(),
                "fence/corner_right".into(),
            ],
        }))
        .with_rule(PlacementRule {
            ground: GroundRequirement::Exactly(GroundKind::Plain),
            auto_prepare: true,
            ..PlacementRule::default()
        })
        .with_record_kind("corral"),
        ElementDef::new("crop.wheat", "Wheat", "crops/wheat_3", ElementBehavior::AreaPrompted)
            .with_rule(PlacementRule {
                ground: GroundRequirement::Exactly(GroundKind::FarmPlowed),
                auto_prepare: true,
                consumes_quantity: true,
                yields: Some(ResourceYield {
                    resource: "wheat".into(),
                    amount: 3,
                }),
            })
            .with_growth(GrowthSpec {
                stage_sprites: (0..4).map(|stage| format!("crops/wheat_{stage}")).collect(),
                stage_duration_units: 100,
            }),
        ElementDef::new("forest", "Forest", "trees/oak", ElementBehavior::Scatter(ScatterSpec {
            radius: 2,
            count: 5,
            variants: vec!["trees/oak".into(), "trees/pine".into()],
        }))
        .with_rule(PlacementRule {
            ground: GroundRequirement::Natural,
            ..PlacementRule::default()
        }),
        ElementDef::new("house", "House", "buildings/house", ElementBehavior::SingleCell)
            .with_record_kind("house"),
        ElementDef::new("plant.daisy", "Daisy", "plants/daisy", ElementBehavior::SingleCell)
            .with_rule(PlacementRule {
                ground: GroundRequirement::Natural,
                yields: Some(ResourceYield {
                    resource: "flowers".into(),
                    amount: 1,
                }),
                ..PlacementRule::default()
            })
            .with_natural_spawn_chance(60.0),
        ElementDef::new("tool.clear", "Pickaxe", "ui/pickaxe", ElementBehavior::Tool(ToolAction::Clear)),
        ElementDef::new("water.pond", "Pond", "water/pond", ElementBehavior::SingleCell)
            .with_record_kind("water"),
        ElementDef::new(
            "tool.harvest",
            "Sickle",
            "ui/sickle",
            ElementBehavior::Tool(ToolAction::Harvest),
        ),
    ])
}

pub(crate) fn test_config() -> WorldConfig {
    WorldConfig {
        rows: 20,
        cols: 30,
        seed: 99,
        natural_generation_percent: 0.0,
        infinite_resources: false,
        tiles_in_view: TileSpan::new(11, 11),
        ..WorldConfig::default()
    }
}

pub(crate) fn plain_world(config: WorldConfig) -> FarmWorld {
    let grid = Grid::new(config.rows, config.cols, |_| GroundKind::Plain).expect("grid");
    FarmWorld::with_grid(
        config,
        Arc::new(farm_catalog()),
        grid,
        Viewport::new(352, 352),
    )
}
