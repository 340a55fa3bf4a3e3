mod catalog;
mod compiler;

pub use catalog::{
    CellOffset, ElementBehavior, ElementCatalog, ElementDef, ElementId, GroundRequirement,
    GrowthSpec, PatternCode, PatternSpec, PlacementRule, ResourceYield, ScatterSpec, ToolAction,
};
pub use compiler::{
    compile_catalog_dir, compile_element_catalog, ContentCompileError, ContentErrorCode,
    SourceLocation,
};
