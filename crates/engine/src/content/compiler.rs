use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::info;

use crate::sprite_keys::validate_sprite_key;
use crate::world::GroundKind;
use crate::AppPaths;

use super::catalog::{
    CellOffset, ElementBehavior, ElementCatalog, ElementDef, GroundRequirement, GrowthSpec,
    PatternCode, PatternSpec, PlacementRule, ResourceYield, ScatterSpec, ToolAction,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {} (file={}", self.code, self.message, self.file_path.display())?;
        if let Some(loc) = self.location {
            write!(f, ", line={}, column={}", loc.line, loc.column)?;
        }
        write!(f, ")")
    }
}

impl std::error::Error for ContentCompileError {}

/// Compiles every `*.xml` under the base content directory.
pub fn compile_element_catalog(app_paths: &AppPaths) -> Result<ElementCatalog, ContentCompileError> {
    compile_catalog_dir(&app_paths.base_content_dir)
}

/// Files are read in sorted relative-path order; ids follow `defName` order.
pub fn compile_catalog_dir(content_dir: &Path) -> Result<ElementCatalog, ContentCompileError> {
    let xml_files = collect_xml_files_sorted(content_dir)
        .map_err(|error| read_error(error.path, error.source))?;

    let mut by_name = BTreeMap::<String, ElementDef>::new();
    for xml_file in &xml_files {
        let raw = fs::read_to_string(xml_file)
            .map_err(|source| read_error(xml_file.clone(), source))?;
        let doc = Document::parse(&raw).map_err(|error| ContentCompileError {
            code: ContentErrorCode::XmlMalformed,
            message: format!("malformed XML: {error}"),
            file_path: xml_file.clone(),
            location: Some(SourceLocation {
                line: error.pos().row as usize,
                column: error.pos().col as usize,
            }),
        })?;
        let file = FileContext {
            path: xml_file,
            doc: &doc,
        };
        for (node, def) in file.parse_defs()? {
            if by_name.contains_key(&def.def_name) {
                return Err(file.error_at(
                    ContentErrorCode::DuplicateDef,
                    format!("duplicate ElementDef '{}'; each defName may appear once", def.def_name),
                    node,
                ));
            }
            by_name.insert(def.def_name.clone(), def);
        }
    }

    let catalog = ElementCatalog::from_defs(by_name.into_values().collect());
    info!(
        dir = %content_dir.display(),
        files = xml_files.len(),
        elements = catalog.len(),
        "element_catalog_compiled"
    );
    Ok(catalog)
}

struct FileContext<'a, 'input> {
    path: &'a Path,
    doc: &'a Document<'input>,
}

impl<'a, 'input> FileContext<'a, 'input> {
    fn error_at(&self, code: ContentErrorCode, message: String, node: Node<'_, '_>) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            file_path: self.path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn invalid(&self, message: String, node: Node<'_, '_>) -> ContentCompileError {
        self.error_at(ContentErrorCode::InvalidValue, message, node)
    }

    fn parse_defs(&self) -> Result<Vec<(Node<'a, 'input>, ElementDef)>, ContentCompileError> {
        let root = self.doc.root_element();
        if root.tag_name().name() != "Defs" {
            return Err(self.error_at(
                ContentErrorCode::InvalidRoot,
                "root element must be <Defs>".to_string(),
                root,
            ));
        }

        let mut defs = Vec::new();
        for child in root.children().filter(|node| node.is_element()) {
            if child.tag_name().name() != "ElementDef" {
                return Err(self.error_at(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{}>; only <ElementDef> is supported",
                        child.tag_name().name()
                    ),
                    child,
                ));
            }
            defs.push((child, self.parse_element_def(child)?));
        }
        Ok(defs)
    }

    fn parse_element_def(&self, node: Node<'_, '_>) -> Result<ElementDef, ContentCompileError> {
        let mut seen_fields = HashSet::<String>::new();
        let mut def_name = None;
        let mut label = None;
        let mut sprite = None;
        let mut behavior_name = None;
        let mut rule = PlacementRule::default();
        let mut yield_resource = None;
        let mut yield_amount = None;
        let mut natural_spawn_chance = None;
        let mut record_kind = None;
        let mut growth = None;
        let mut pattern = None;
        let mut scatter = None;
        let mut tool = None;

        for field in node.children().filter(|child| child.is_element()) {
            let field_name = field.tag_name().name().to_string();
            if !seen_fields.insert(field_name.clone()) {
                return Err(self.error_at(
                    ContentErrorCode::DuplicateField,
                    format!("duplicate field <{field_name}> in <ElementDef>"),
                    field,
                ));
            }

            match field_name.as_str() {
                "defName" => def_name = Some(self.required_text(field, "defName")?),
                "label" => label = Some(self.required_text(field, "label")?),
                "sprite" => sprite = Some(self.sprite_key(field)?),
                "behavior" => behavior_name = Some((self.required_text(field, "behavior")?, field)),
                "ground" => rule.ground = self.parse_ground_requirement(field)?,
                "autoPrepare" => rule.auto_prepare = self.parse_bool(field, "autoPrepare")?,
                "consumesQuantity" => {
                    rule.consumes_quantity = self.parse_bool(field, "consumesQuantity")?
                }
                "yieldResource" => yield_resource = Some(self.required_text(field, "yieldResource")?),
                "yieldAmount" => yield_amount = Some(self.parse_number::<u32>(field, "yieldAmount")?),
                "naturalSpawnChance" => {
                    let chance = self.parse_number::<f32>(field, "naturalSpawnChance")?;
                    if !chance.is_finite() || !(0.0..=100.0).contains(&chance) {
                        return Err(self.invalid(
                            "naturalSpawnChance must be between 0 and 100".to_string(),
                            field,
                        ));
                    }
                    natural_spawn_chance = Some(chance);
                }
                "recordKind" => record_kind = Some(self.required_text(field, "recordKind")?),
                "growth" => growth = Some((self.parse_growth(field)?, field)),
                "pattern" => pattern = Some((self.parse_pattern(field)?, field)),
                "scatter" => scatter = Some((self.parse_scatter(field)?, field)),
                "tool" => tool = Some(self.parse_tool(field)?),
                _ => {
                    return Err(self.error_at(
                        ContentErrorCode::UnknownField,
                        format!("unknown field <{field_name}> in <ElementDef>"),
                        field,
                    ))
                }
            }
        }

        let def_name = self.require(def_name, "defName", node)?;
        let label = self.require(label, "label", node)?;
        let sprite = self.require(sprite, "sprite", node)?;
        let (behavior_name, behavior_node) = self.require(behavior_name, "behavior", node)?;

        rule.yields = match (yield_resource, yield_amount) {
            (Some(resource), amount) => Some(ResourceYield {
                resource,
                amount: amount.unwrap_or(1),
            }),
            (None, Some(_)) => {
                return Err(self.error_at(
                    ContentErrorCode::MissingField,
                    "<yieldAmount> needs a <yieldResource>".to_string(),
                    node,
                ))
            }
            (None, None) => None,
        };

        let behavior = match behavior_name.as_str() {
            "SingleCell" => ElementBehavior::SingleCell,
            "AreaPrompted" => ElementBehavior::AreaPrompted,
            "Pattern" => {
                let (spec, _) = pattern.take().ok_or_else(|| {
                    self.error_at(
                        ContentErrorCode::MissingField,
                        "behavior Pattern requires a <pattern> block".to_string(),
                        node,
                    )
                })?;
                ElementBehavior::Pattern(spec)
            }
            "Scatter" => {
                let (spec, _) = scatter.take().ok_or_else(|| {
                    self.error_at(
                        ContentErrorCode::MissingField,
                        "behavior Scatter requires a <scatter> block".to_string(),
                        node,
                    )
                })?;
                ElementBehavior::Scatter(spec)
            }
            "Tool" => {
                let action = tool.take().ok_or_else(|| {
                    self.error_at(
                        ContentErrorCode::MissingField,
                        "behavior Tool requires a <tool> field".to_string(),
                        node,
                    )
                })?;
                ElementBehavior::Tool(action)
            }
            other => {
                return Err(self.invalid(
                    format!(
                        "invalid behavior '{other}'; allowed values: SingleCell, AreaPrompted, Pattern, Scatter, Tool"
                    ),
                    behavior_node,
                ))
            }
        };

        let stray = [
            pattern.map(|(_, field)| ("pattern", field)),
            scatter.map(|(_, field)| ("scatter", field)),
        ];
        if let Some((name, field)) = stray.into_iter().flatten().next() {
            return Err(self.invalid(
                format!("<{name}> is only valid with behavior {}", capitalize(name)),
                field,
            ));
        }
        if tool.is_some() {
            return Err(self.invalid(
                "<tool> is only valid with behavior Tool".to_string(),
                behavior_node,
            ));
        }
        if let (ElementBehavior::Tool(_), Some((_, field))) = (&behavior, &growth) {
            return Err(self.invalid("tools cannot grow".to_string(), *field));
        }

        let mut def = ElementDef::new(def_name, label, sprite, behavior).with_rule(rule);
        if let Some((spec, _)) = growth {
            def = def.with_growth(spec);
        }
        if let Some(chance) = natural_spawn_chance {
            def = def.with_natural_spawn_chance(chance);
        }
        if let Some(kind) = record_kind {
            def = def.with_record_kind(kind);
        }
        Ok(def)
    }

    fn require<T>(&self, value: Option<T>, field: &str, node: Node<'_, '_>) -> Result<T, ContentCompileError> {
        value.ok_or_else(|| {
            self.error_at(
                ContentErrorCode::MissingField,
                format!("missing required field <{field}> in <ElementDef>"),
                node,
            )
        })
    }

    fn required_text(&self, node: Node<'_, '_>, field_name: &str) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn sprite_key(&self, node: Node<'_, '_>) -> Result<String, ContentCompileError> {
        let key = self.required_text(node, node.tag_name().name())?;
        validate_sprite_key(&key)
            .map_err(|error| self.invalid(format!("sprite key '{key}': {error}"), node))?;
        Ok(key)
    }

    fn parse_bool(&self, node: Node<'_, '_>, field_name: &str) -> Result<bool, ContentCompileError> {
        match self.required_text(node, field_name)?.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(self.invalid(
                format!("{field_name} '{other}' must be true or false"),
                node,
            )),
        }
    }

    fn parse_number<T: std::str::FromStr>(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<T, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        value
            .parse::<T>()
            .map_err(|_| self.invalid(format!("{field_name} '{value}' is not a valid number"), node))
    }

    fn parse_ground_requirement(&self, node: Node<'_, '_>) -> Result<GroundRequirement, ContentCompileError> {
        let value = self.required_text(node, "ground")?;
        match value.as_str() {
            "Any" => Ok(GroundRequirement::Any),
            "Buildable" => Ok(GroundRequirement::Buildable),
            "Natural" => Ok(GroundRequirement::Natural),
            name => GroundKind::parse(name)
                .map(GroundRequirement::Exactly)
                .ok_or_else(|| {
                    self.invalid(
                        format!("invalid ground '{name}'; expected Any, Buildable, Natural or a ground kind"),
                        node,
                    )
                }),
        }
    }

    fn parse_tool(&self, node: Node<'_, '_>) -> Result<ToolAction, ContentCompileError> {
        let value = self.required_text(node, "tool")?;
        let action = match value.split_once(':') {
            Some(("Pave", ground)) => GroundKind::parse(ground).map(ToolAction::Pave),
            Some(_) => None,
            None => match value.as_str() {
                "Clear" => Some(ToolAction::Clear),
                "Plow" => Some(ToolAction::Plow),
                "Unplow" => Some(ToolAction::Unplow),
                "Harvest" => Some(ToolAction::Harvest),
                "Inspect" => Some(ToolAction::Inspect),
                _ => None,
            },
        };
        action.ok_or_else(|| {
            self.invalid(
                format!(
                    "invalid tool '{value}'; allowed values: Clear, Plow, Unplow, Harvest, Inspect, Pave:<ground>"
                ),
                node,
            )
        })
    }

    fn list_items(&self, node: Node<'_, '_>, field_name: &str) -> Result<Vec<String>, ContentCompileError> {
        let mut items = Vec::new();
        for child in node.children().filter(|child| child.is_element()) {
            if child.tag_name().name() != "li" {
                return Err(self.error_at(
                    ContentErrorCode::UnknownField,
                    format!("<{field_name}> may only contain <li> items"),
                    child,
                ));
            }
            items.push(self.required_text(child, "li")?);
        }
        if items.is_empty() {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                format!("<{field_name}> must list at least one <li>"),
                node,
            ));
        }
        Ok(items)
    }

    fn sprite_list(&self, node: Node<'_, '_>, field_name: &str) -> Result<Vec<String>, ContentCompileError> {
        let items = self.list_items(node, field_name)?;
        for key in &items {
            validate_sprite_key(key)
                .map_err(|error| self.invalid(format!("sprite key '{key}': {error}"), node))?;
        }
        Ok(items)
    }

    /// Children of a nested block, rejecting unknown and repeated fields.
    fn block_fields<'n, 'i>(
        &self,
        node: Node<'n, 'i>,
        block: &str,
        allowed: &[&str],
    ) -> Result<BTreeMap<String, Node<'n, 'i>>, ContentCompileError> {
        let mut fields = BTreeMap::new();
        for child in node.children().filter(|child| child.is_element()) {
            let name = child.tag_name().name();
            if !allowed.contains(&name) {
                return Err(self.error_at(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{name}> in <{block}>"),
                    child,
                ));
            }
            if fields.insert(name.to_string(), child).is_some() {
                return Err(self.error_at(
                    ContentErrorCode::DuplicateField,
                    format!("duplicate field <{name}> in <{block}>"),
                    child,
                ));
            }
        }
        Ok(fields)
    }

    fn block_field<'n, 'i>(
        &self,
        fields: &BTreeMap<String, Node<'n, 'i>>,
        block: &str,
        name: &str,
        node: Node<'_, '_>,
    ) -> Result<Node<'n, 'i>, ContentCompileError> {
        fields.get(name).copied().ok_or_else(|| {
            self.error_at(
                ContentErrorCode::MissingField,
                format!("missing required field <{name}> in <{block}>"),
                node,
            )
        })
    }

    fn parse_growth(&self, node: Node<'_, '_>) -> Result<GrowthSpec, ContentCompileError> {
        let fields = self.block_fields(node, "growth", &["stageDurationUnits", "stages"])?;
        let duration_node = self.block_field(&fields, "growth", "stageDurationUnits", node)?;
        let stages_node = self.block_field(&fields, "growth", "stages", node)?;
        let stage_duration_units = self.parse_number::<u32>(duration_node, "stageDurationUnits")?;
        let stage_sprites = self.sprite_list(stages_node, "stages")?;
        if stage_sprites.len() > usize::from(u16::MAX) {
            return Err(self.invalid("too many growth stages".to_string(), stages_node));
        }
        Ok(GrowthSpec {
            stage_sprites,
            stage_duration_units,
        })
    }

    fn parse_scatter(&self, node: Node<'_, '_>) -> Result<ScatterSpec, ContentCompileError> {
        let fields = self.block_fields(node, "scatter", &["radius", "count", "variants"])?;
        let radius_node = self.block_field(&fields, "scatter", "radius", node)?;
        let count_node = self.block_field(&fields, "scatter", "count", node)?;
        let radius = self.parse_number::<u32>(radius_node, "radius")?;
        let count = self.parse_number::<u32>(count_node, "count")?;
        if radius == 0 {
            return Err(self.invalid("scatter radius must be at least 1".to_string(), radius_node));
        }
        let variants = match fields.get("variants") {
            Some(variants) => self.sprite_list(*variants, "variants")?,
            None => Vec::new(),
        };
        if variants.len() > usize::from(u8::MAX) + 1 {
            return Err(self.invalid("too many scatter variants".to_string(), node));
        }
        Ok(ScatterSpec {
            radius,
            count,
            variants,
        })
    }

    fn parse_pattern(&self, node: Node<'_, '_>) -> Result<PatternSpec, ContentCompileError> {
        let fields = self.block_fields(node, "pattern", &["innerOffset", "rows", "pieces"])?;
        let rows_node = self.block_field(&fields, "pattern", "rows", node)?;

        let inner_offset = match fields.get("innerOffset") {
            Some(offset_node) => self.parse_offset(*offset_node)?,
            None => CellOffset::default(),
        };
        let pieces = match fields.get("pieces") {
            Some(pieces_node) => self.sprite_list(*pieces_node, "pieces")?,
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        for line in self.list_items(rows_node, "rows")? {
            let codes = line
                .split_whitespace()
                .map(parse_pattern_code)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    self.invalid(
                        format!("pattern row '{line}' may only contain '.', 'P' or piece indices"),
                        rows_node,
                    )
                })?;
            rows.push(codes);
        }

        let spec = PatternSpec {
            rows,
            inner_offset,
            pieces,
        };
        spec.validate().map_err(|message| self.invalid(message, node))?;
        Ok(spec)
    }

    fn parse_offset(&self, node: Node<'_, '_>) -> Result<CellOffset, ContentCompileError> {
        let value = self.required_text(node, "innerOffset")?;
        let parsed = value.split_once(',').and_then(|(row, col)| {
            Some(CellOffset {
                row: row.trim().parse().ok()?,
                col: col.trim().parse().ok()?,
            })
        });
        parsed.ok_or_else(|| self.invalid(format!("innerOffset '{value}' must be 'row,col'"), node))
    }
}

fn parse_pattern_code(token: &str) -> Option<PatternCode> {
    match token {
        "." => Some(PatternCode::Empty),
        "P" => Some(PatternCode::Primary),
        digits => digits.parse::<u8>().ok().map(PatternCode::Piece),
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_cached_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read content: {source}"),
        file_path: path,
        location: None,
    }
}
