use std::env::{self, VarError};

use farm_engine::{resolve_app_paths, LoopConfig, Scene, WorldConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay::{FarmScene, SAVE_FILE_NAME};

const SEED_ENV_VAR: &str = "FARMSIM_SEED";
const INFINITE_RESOURCES_ENV_VAR: &str = "FARMSIM_INFINITE_RESOURCES";
const GRID_ENV_VAR: &str = "FARMSIM_GRID";
const GROWTH_SCALE_ENV_VAR: &str = "FARMSIM_GROWTH_SCALE";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Farm Startup ===");

    let mut config = LoopConfig::default();
    apply_world_overrides(&mut config.world, |var| env::var(var));
    info!(
        rows = config.world.rows,
        cols = config.world.cols,
        seed = config.world.seed,
        infinite_resources = config.world.infinite_resources,
        growth_time_scale_ms = config.world.growth_time_scale_ms,
        "world_config"
    );

    // Saving is optional; a bad root fails loudly later in run_app anyway.
    let save_path = match resolve_app_paths() {
        Ok(paths) => Some(paths.saves_dir.join(SAVE_FILE_NAME)),
        Err(error) => {
            warn!(error = %error, "save_path_unavailable");
            None
        }
    };

    AppWiring {
        config,
        scene: Box::new(FarmScene::new(save_path)),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn apply_world_overrides(world: &mut WorldConfig, lookup: impl Fn(&'static str) -> Result<String, VarError>) {
    if let Some(seed) = read_override(&lookup, SEED_ENV_VAR, parse_seed) {
        world.seed = seed;
    }
    if let Some(infinite) = read_override(&lookup, INFINITE_RESOURCES_ENV_VAR, parse_flag) {
        world.infinite_resources = infinite;
    }
    if let Some((rows, cols)) = read_override(&lookup, GRID_ENV_VAR, parse_grid_size) {
        world.rows = rows;
        world.cols = cols;
    }
    if let Some(scale_ms) = read_override(&lookup, GROWTH_SCALE_ENV_VAR, parse_growth_scale) {
        world.growth_time_scale_ms = scale_ms;
    }
}

fn read_override<T>(
    lookup: &impl Fn(&'static str) -> Result<String, VarError>,
    var: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Option<T> {
    match lookup(var) {
        Ok(raw) => {
            let parsed = parse(raw.trim());
            if parsed.is_none() {
                warn!(
                    env_var = var,
                    value = raw.as_str(),
                    "invalid env override value; keeping default"
                );
            }
            parsed
        }
        Err(VarError::NotPresent) => None,
        Err(err) => {
            warn!(env_var = var, error = %err, "unable to read env override; keeping default");
            None
        }
    }
}

/// Decimal, or hex with a `0x` prefix.
fn parse_seed(raw: &str) -> Option<u64> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// `ROWSxCOLS`, both non-zero.
fn parse_grid_size(raw: &str) -> Option<(u32, u32)> {
    let (rows, cols) = raw.split_once(['x', 'X'])?;
    let rows = rows.trim().parse::<u32>().ok().filter(|rows| *rows > 0)?;
    let cols = cols.trim().parse::<u32>().ok().filter(|cols| *cols > 0)?;
    Some((rows, cols))
}

fn parse_growth_scale(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|ms| *ms > 0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(
        pairs: &[(&'static str, &str)],
    ) -> impl Fn(&'static str) -> Result<String, VarError> {
        let values: HashMap<&'static str, String> = pairs
            .iter()
            .map(|(key, value)| (*key, value.to_string()))
            .collect();
        move |var| values.get(var).cloned().ok_or(VarError::NotPresent)
    }

    #[test]
    fn overrides_apply_to_world_config() {
        let mut world = WorldConfig::default();
        apply_world_overrides(
            &mut world,
            lookup_from(&[
                (SEED_ENV_VAR, "0xff"),
                (INFINITE_RESOURCES_ENV_VAR, "0"),
                (GRID_ENV_VAR, "20x40"),
                (GROWTH_SCALE_ENV_VAR, " 250 "),
            ]),
        );
        assert_eq!(world.seed, 255);
        assert!(!world.infinite_resources);
        assert_eq!((world.rows, world.cols), (20, 40));
        assert_eq!(world.growth_time_scale_ms, 250);
    }

    #[test]
    fn invalid_overrides_keep_defaults() {
        let defaults = WorldConfig::default();
        let mut world = WorldConfig::default();
        apply_world_overrides(
            &mut world,
            lookup_from(&[
                (SEED_ENV_VAR, "not-a-seed"),
                (INFINITE_RESOURCES_ENV_VAR, "maybe"),
                (GRID_ENV_VAR, "0x10"),
                (GROWTH_SCALE_ENV_VAR, "0"),
            ]),
        );
        assert_eq!(world.seed, defaults.seed);
        assert_eq!(world.infinite_resources, defaults.infinite_resources);
        assert_eq!((world.rows, world.cols), (defaults.rows, defaults.cols));
        assert_eq!(world.growth_time_scale_ms, defaults.growth_time_scale_ms);
    }

    #[test]
    fn unreadable_override_is_ignored() {
        let mut world = WorldConfig::default();
        let seed = world.seed;
        apply_world_overrides(&mut world, |var| {
            if var == SEED_ENV_VAR {
                Err(VarError::NotUnicode("\u{fffd}".into()))
            } else {
                Err(VarError::NotPresent)
            }
        });
        assert_eq!(world.seed, seed);
    }

    #[test]
    fn flag_and_grid_parsing() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag("yes"), None);
        assert_eq!(parse_grid_size("50X100"), Some((50, 100)));
        assert_eq!(parse_grid_size("50 x 100"), Some((50, 100)));
        assert_eq!(parse_grid_size("50"), None);
        assert_eq!(parse_grid_size("ax3"), None);
        assert_eq!(parse_seed("42"), Some(42));
        assert_eq!(parse_seed("0xZZ"), None);
    }
}
