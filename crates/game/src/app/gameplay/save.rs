use std::fmt::Display;
use std::fs;
use std::path::Path;

use farm_engine::{FarmWorld, WorldConfig, WorldSnapshot};
use serde::{Deserialize, Serialize};

pub(crate) const SAVE_VERSION: u32 = 1;
pub(crate) const SAVE_FILE_NAME: &str = "farm.save.json";

pub(crate) type SaveLoadResult<T> = Result<T, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SaveGame {
    pub(crate) save_version: u32,
    pub(crate) rows: u32,
    pub(crate) cols: u32,
    pub(crate) seed: u64,
    pub(crate) world: WorldSnapshot,
}

impl SaveGame {
    pub(crate) fn capture(world: &FarmWorld) -> Self {
        let config = world.config();
        Self {
            save_version: SAVE_VERSION,
            rows: config.rows,
            cols: config.cols,
            seed: config.seed,
            world: world.snapshot(),
        }
    }

    /// A save only fits a world of the same grid size. The seed is kept for
    /// reference and may differ.
    pub(crate) fn validate_for(&self, config: &WorldConfig) -> SaveLoadResult<()> {
        if self.save_version != SAVE_VERSION {
            return Err(expected_actual("save_version", SAVE_VERSION, self.save_version));
        }
        if self.rows != config.rows {
            return Err(expected_actual("rows", config.rows, self.rows));
        }
        if self.cols != config.cols {
            return Err(expected_actual("cols", config.cols, self.cols));
        }
        for (index, structure) in self.world.structures.iter().enumerate() {
            if structure.footprint.width == 0 || structure.footprint.height == 0 {
                return Err(validation_err(
                    &format!("world.structures[{index}].footprint"),
                    "footprint must be at least 1x1",
                ));
            }
        }
        Ok(())
    }
}

pub(crate) fn write_save(path: &Path, save: &SaveGame) -> SaveLoadResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|error| format!("create save dir '{}': {error}", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(save).map_err(|error| format!("encode save json: {error}"))?;
    fs::write(path, json).map_err(|error| format!("write save '{}': {error}", path.display()))
}

pub(crate) fn read_save(path: &Path) -> SaveLoadResult<SaveGame> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read save '{}': {error}", path.display()))?;
    parse_save_json(&raw)
}

fn parse_save_json(raw: &str) -> SaveLoadResult<SaveGame> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SaveGame>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            format!("parse save json: {source}")
        } else {
            format!("parse save json at {path}: {source}")
        }
    })
}

fn validation_err(path: &str, message: impl Into<String>) -> String {
    format!("validation failed at {path}: {}", message.into())
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> String {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

#[cfg(test)]
mod tests {
    use farm_engine::world::{Footprint, OccupantVisual, SavedGround, SavedOccupant, SavedStructure};
    use farm_engine::{CellCoord, GroundKind};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn sample_save() -> SaveGame {
        SaveGame {
            save_version: SAVE_VERSION,
            rows: 20,
            cols: 30,
            seed: 7,
            world: WorldSnapshot {
                structures: vec![SavedStructure {
                    kind: "corral".to_string(),
                    element: "corral.pig".to_string(),
                    footprint: Footprint {
                        width: 5,
                        height: 4,
                    },
                    origin: CellCoord::new(3, 4),
                    metadata: json!({ "name": "North pen" }),
                    cleared: Vec::new(),
                }],
                occupants: vec![SavedOccupant {
                    element: "crop.wheat".to_string(),
                    cell: CellCoord::new(9, 9),
                    visual: OccupantVisual::Stage(2),
                }],
                ground: vec![SavedGround {
                    cell: CellCoord::new(9, 9),
                    ground: GroundKind::FarmPlowed,
                }],
            },
        }
    }

    fn config(rows: u32, cols: u32) -> WorldConfig {
        WorldConfig {
            rows,
            cols,
            ..WorldConfig::default()
        }
    }

    #[test]
    fn written_save_reads_back() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("saves").join(SAVE_FILE_NAME);
        write_save(&path, &sample_save()).expect("write");
        assert_eq!(read_save(&path).expect("read"), sample_save());
    }

    #[test]
    fn parse_error_names_json_path() {
        let raw = r#"{"save_version":1,"rows":"twenty","cols":30,"seed":7,"world":{"structures":[]}}"#;
        let error = parse_save_json(raw).expect_err("bad rows");
        assert!(error.starts_with("parse save json at rows:"), "{error}");
    }

    #[test]
    fn nested_parse_error_names_structure_index() {
        let raw = r#"{"save_version":1,"rows":20,"cols":30,"seed":7,"world":{"structures":[
            {"kind":"house","element":"house","footprint":{"width":1,"height":1},"origin":{"row":-1,"col":2}}
        ]}}"#;
        let error = parse_save_json(raw).expect_err("negative row");
        assert!(error.contains("world.structures[0].origin.row"), "{error}");
    }

    #[test]
    fn missing_file_reports_path() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("absent.json");
        let error = read_save(&path).expect_err("missing");
        assert!(error.contains("absent.json"), "{error}");
    }

    #[test]
    fn validation_checks_version_and_grid_size() {
        let save = sample_save();
        assert!(save.validate_for(&config(20, 30)).is_ok());
        assert_eq!(
            save.validate_for(&config(20, 31)).expect_err("cols"),
            "validation failed at cols: expected 31, got 30"
        );

        let mut old = sample_save();
        old.save_version = 0;
        assert_eq!(
            old.validate_for(&config(20, 30)).expect_err("version"),
            "validation failed at save_version: expected 1, got 0"
        );

        let mut empty_footprint = sample_save();
        empty_footprint.world.structures[0].footprint.width = 0;
        let error = empty_footprint
            .validate_for(&config(20, 30))
            .expect_err("footprint");
        assert!(error.contains("world.structures[0].footprint"), "{error}");
    }
}
