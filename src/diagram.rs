//! Diagram model and the builder that assembles it from definition
//! mappings: the tagged grid, blocks with rectangular covers (explicit
//! and auto-generated), and connections with entry/exit constraints.

use std::path::Path;

use indexmap::IndexMap;
use log::warn;
use serde_yaml::{Mapping, Value};

use crate::attributes::{
    Attributes, BlockAttributes, ConnectionAttributes, DiagramAttributes, TextStyle,
};
use crate::error::{DefinitionError, LayoutError, Result};
use crate::loader;

/// Inclusive rectangle of logical grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBounds {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl CellBounds {
    fn of_cell(row: usize, column: usize) -> Self {
        Self {
            top: row,
            left: column,
            bottom: row,
            right: column,
        }
    }

    fn expand_to(&mut self, row: usize, column: usize) {
        self.top = self.top.min(row);
        self.left = self.left.min(column);
        self.bottom = self.bottom.max(row);
        self.right = self.right.max(column);
    }

    pub fn contains(&self, row: usize, column: usize) -> bool {
        row >= self.top && row <= self.bottom && column >= self.left && column <= self.right
    }
}

/// The logical grid: rows of cells, each carrying at most one tag.
/// Rows are padded to a common width.
#[derive(Debug, Clone)]
pub struct Grid {
    pub height: usize,
    pub width: usize,
    cells: Vec<Option<String>>,
}

impl Grid {
    fn new(mut rows: Vec<Vec<Option<String>>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, None);
        }
        let height = rows.len();
        let cells = rows.into_iter().flatten().collect();
        Self {
            height,
            width,
            cells,
        }
    }

    pub fn tag_at(&self, row: usize, column: usize) -> Option<&str> {
        self.cells[row * self.width + column].as_deref()
    }

    /// Iterate over all cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, Option<&str>)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, tag)| (index / width, index % width, tag.as_deref()))
    }
}

/// A named rectangle of grid cells, drawn as a box.
#[derive(Debug, Clone)]
pub struct Block {
    pub name: Option<String>,
    /// Tags this block claims: its name plus the extra `tags` entries.
    pub tags: Vec<String>,
    pub bounds: CellBounds,
    pub attrs: BlockAttributes,
    pub is_auto: bool,
}

impl Block {
    /// True if the tag belongs to this block's cover.
    pub fn claims(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    /// Text drawn on the block: the explicit label, or the name.
    pub fn effective_label(&self) -> Option<&str> {
        self.attrs.label.as_deref().or(self.name.as_deref())
    }

    /// Name used in diagnostics.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }
}

/// One end of a connection: a block, optionally narrowed down to a
/// single cell of its cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminal {
    pub block: usize,
    pub cell: Option<(usize, usize)>,
}

/// A resolved connection label.
#[derive(Debug, Clone)]
pub struct ConnectionLabel {
    pub text: String,
    pub distance: f64,
    pub style: TextStyle,
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub start: Terminal,
    pub end: Terminal,
    pub group: Option<String>,
    pub attrs: ConnectionAttributes,
    pub start_label: Option<ConnectionLabel>,
    pub middle_label: Option<ConnectionLabel>,
    pub end_label: Option<ConnectionLabel>,
}

/// The complete diagram definition after building: immutable input of
/// the layout pipeline.
#[derive(Debug, Clone)]
pub struct Diagram {
    pub attrs: DiagramAttributes,
    pub grid: Grid,
    pub blocks: Vec<Block>,
    pub connections: Vec<Connection>,
}

impl Diagram {
    pub fn block_by_name(&self, name: &str) -> Option<usize> {
        self.blocks
            .iter()
            .position(|block| block.name.as_deref() == Some(name))
    }

    pub fn block_name(&self, index: usize) -> &str {
        self.blocks[index].display_name()
    }
}

/// Load a diagram from a definition file, resolving includes.
pub fn load_diagram(path: &Path) -> Result<Diagram> {
    let documents = loader::load_files(path)?;
    let mut builder = Builder::new();
    for document in &documents {
        builder.add(document)?;
    }
    builder.build()
}

/// Build a diagram from a single YAML document, without includes.
pub fn diagram_from_str(yaml: &str) -> Result<Diagram> {
    let value: Value = serde_yaml::from_str(yaml).map_err(|err| DefinitionError::Parse {
        path: "<string>".into(),
        message: err.to_string(),
    })?;
    let mapping = match value {
        Value::Null => Mapping::new(),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(DefinitionError::Parse {
                path: "<string>".into(),
                message: "expected a mapping at the top level".to_string(),
            }
            .into())
        }
    };
    let mut builder = Builder::new();
    builder.add(&mapping)?;
    builder.build()
}

struct BlockDef {
    name: Option<String>,
    tags: Vec<String>,
    attrs: Attributes,
}

struct TerminalDef {
    block: String,
    tag: Option<String>,
}

struct LabelDef {
    text: Option<String>,
    attrs: Attributes,
}

struct ConnectionDef {
    starts: Vec<TerminalDef>,
    ends: Vec<TerminalDef>,
    group: Option<String>,
    attrs: Attributes,
    start_label: Option<LabelDef>,
    middle_label: Option<LabelDef>,
    end_label: Option<LabelDef>,
}

/// Accumulates definitions from one or more files and assembles the
/// diagram. Definition order is preserved everywhere it is semantic.
pub struct Builder {
    named_styles: IndexMap<String, Attributes>,
    group_attrs: IndexMap<String, Attributes>,
    diagram_attrs: Attributes,
    rows: Vec<Vec<Option<String>>>,
    block_defs: Vec<BlockDef>,
    connection_defs: Vec<ConnectionDef>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            named_styles: IndexMap::new(),
            group_attrs: IndexMap::new(),
            diagram_attrs: Attributes::default(),
            rows: Vec::new(),
            block_defs: Vec::new(),
            connection_defs: Vec::new(),
        }
    }

    /// Add one file's worth of definitions.
    pub fn add(&mut self, defs: &Mapping) -> Result<()> {
        if let Some(styles) = defs.get(&Value::from("styles")) {
            self.add_styles(styles)?;
        }
        if let Some(groups) = defs.get(&Value::from("groups")) {
            self.add_groups(groups)?;
        }
        if let Some(diagram) = defs.get(&Value::from("diagram")) {
            self.configure_diagram(diagram)?;
        }
        if let Some(rows) = defs.get(&Value::from("rows")) {
            self.add_rows(rows)?;
        }
        if let Some(blocks) = defs.get(&Value::from("blocks")) {
            self.add_blocks(blocks)?;
        }
        if let Some(connections) = defs.get(&Value::from("connections")) {
            self.add_connections(connections)?;
        }
        Ok(())
    }

    fn add_styles(&mut self, value: &Value) -> Result<()> {
        let mapping = expect_mapping(value, "styles")?;
        for (name, style_def) in mapping {
            let name = expect_key_str(name, "styles")?;
            let style_map = expect_mapping(style_def, &format!("style '{name}'"))?;
            let attrs = Attributes::from_mapping(style_map, &format!("style '{name}'"), &[])?;
            if self.named_styles.insert(name.to_string(), attrs).is_some() {
                warn!("replacing style '{name}'");
            }
        }
        Ok(())
    }

    fn add_groups(&mut self, value: &Value) -> Result<()> {
        let mapping = expect_mapping(value, "groups")?;
        for (name, group_def) in mapping {
            let name = expect_key_str(name, "groups")?;
            let context = format!("group '{name}'");
            let group_map = expect_mapping(group_def, &context)?;
            let mut attrs = self.style_attributes(group_map, &context)?;
            attrs.merge(&Attributes::from_mapping(group_map, &context, &["style"])?);
            if self.group_attrs.insert(name.to_string(), attrs).is_some() {
                warn!("replacing attributes of group '{name}'");
            }
        }
        Ok(())
    }

    fn configure_diagram(&mut self, value: &Value) -> Result<()> {
        let mapping = expect_mapping(value, "diagram")?;
        let mut attrs = self.style_attributes(mapping, "diagram")?;
        attrs.merge(&Attributes::from_mapping(mapping, "diagram", &["style"])?);
        self.diagram_attrs.merge(&attrs);
        Ok(())
    }

    fn add_rows(&mut self, value: &Value) -> Result<()> {
        let rows = value
            .as_sequence()
            .ok_or_else(|| type_error("rows", "a sequence of rows"))?;
        for row in rows {
            let cells = row
                .as_sequence()
                .ok_or_else(|| type_error("rows", "a sequence of cell tags"))?;
            let mut tags = Vec::with_capacity(cells.len());
            for cell in cells {
                let tag = match cell {
                    Value::Null => None,
                    Value::String(text) if text.is_empty() => None,
                    Value::String(text) => Some(text.clone()),
                    Value::Number(number) => Some(number.to_string()),
                    _ => return Err(type_error("rows", "a string or null cell tag").into()),
                };
                tags.push(tag);
            }
            self.rows.push(tags);
        }
        Ok(())
    }

    fn add_blocks(&mut self, value: &Value) -> Result<()> {
        let blocks = value
            .as_sequence()
            .ok_or_else(|| type_error("blocks", "a sequence of block definitions"))?;
        for block_def in blocks {
            self.add_block(block_def)?;
        }
        Ok(())
    }

    fn add_block(&mut self, value: &Value) -> Result<()> {
        // An empty definition is a valid (anonymous, unstyled) block.
        if value.is_null() {
            self.block_defs.push(BlockDef {
                name: None,
                tags: Vec::new(),
                attrs: self.default_style("default_block"),
            });
            return Ok(());
        }
        let mapping = expect_mapping(value, "block definition")?;
        let name = mapping
            .get(&Value::from("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let context = match &name {
            Some(name) => format!("block '{name}'"),
            None => "block".to_string(),
        };
        let mut tags = Vec::new();
        if let Some(tag_value) = mapping.get(&Value::from("tags")) {
            let seq = tag_value
                .as_sequence()
                .ok_or_else(|| type_error(&context, "a sequence of tags"))?;
            for tag in seq {
                tags.push(
                    tag.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| type_error(&context, "a string tag"))?,
                );
            }
        }
        let mut attrs = self.default_style("default_block");
        attrs.merge(&self.style_attributes(mapping, &context)?);
        attrs.merge(&Attributes::from_mapping(
            mapping,
            &context,
            &["name", "tags", "style"],
        )?);
        self.block_defs.push(BlockDef { name, tags, attrs });
        Ok(())
    }

    fn add_connections(&mut self, value: &Value) -> Result<()> {
        let connections = value
            .as_sequence()
            .ok_or_else(|| type_error("connections", "a sequence of connection definitions"))?;
        for connection_def in connections {
            self.add_connection(connection_def)?;
        }
        Ok(())
    }

    fn add_connection(&mut self, value: &Value) -> Result<()> {
        let mapping = expect_mapping(value, "connection definition")?;
        let starts = parse_terminals(
            mapping
                .get(&Value::from("start"))
                .ok_or(DefinitionError::MissingField { field: "start" })?,
        )?;
        let ends = parse_terminals(
            mapping
                .get(&Value::from("end"))
                .ok_or(DefinitionError::MissingField { field: "end" })?,
        )?;
        let group = mapping
            .get(&Value::from("group"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let context = "connection".to_string();

        let mut attrs = self.default_style("default_connection");
        if let Some(group) = &group {
            if let Some(group_attrs) = self.group_attrs.get(group) {
                attrs.merge(group_attrs);
            }
        }
        attrs.merge(&self.style_attributes(mapping, &context)?);
        attrs.merge(&Attributes::from_mapping(
            mapping,
            &context,
            &[
                "start",
                "end",
                "group",
                "style",
                "start_label",
                "middle_label",
                "end_label",
                "label",
            ],
        )?);

        let start_label = self.parse_label(mapping.get(&Value::from("start_label")))?;
        // `label` is an alias for the middle label; the explicit key wins.
        let mut middle_label = self.parse_label(mapping.get(&Value::from("label")))?;
        if let Some(explicit) = self.parse_label(mapping.get(&Value::from("middle_label")))? {
            middle_label = Some(explicit);
        }
        let end_label = self.parse_label(mapping.get(&Value::from("end_label")))?;

        self.connection_defs.push(ConnectionDef {
            starts,
            ends,
            group,
            attrs,
            start_label,
            middle_label,
            end_label,
        });
        Ok(())
    }

    fn parse_label(&self, value: Option<&Value>) -> Result<Option<LabelDef>> {
        let Some(value) = value else {
            return Ok(None);
        };
        match value {
            Value::Null => Ok(Some(LabelDef {
                text: None,
                attrs: Attributes::default(),
            })),
            Value::String(text) => Ok(Some(LabelDef {
                text: Some(text.clone()),
                attrs: Attributes::default(),
            })),
            Value::Mapping(mapping) => {
                let mut attrs = self.style_attributes(mapping, "label")?;
                attrs.merge(&Attributes::from_mapping(mapping, "label", &["style"])?);
                Ok(Some(LabelDef { text: None, attrs }))
            }
            _ => Err(type_error("label", "a string, null or mapping").into()),
        }
    }

    /// Attributes inherited through the `style` reference list of a
    /// definition. Later styles override earlier ones.
    fn style_attributes(&self, mapping: &Mapping, context: &str) -> Result<Attributes> {
        let mut attrs = Attributes::default();
        let Some(value) = mapping.get(&Value::from("style")) else {
            return Ok(attrs);
        };
        let names: Vec<String> = match value {
            Value::String(name) => vec![name.clone()],
            Value::Sequence(seq) => seq
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| type_error(context, "a style name"))
                })
                .collect::<Result<_, _>>()?,
            _ => return Err(type_error(context, "a style name or list of names").into()),
        };
        for name in names {
            match self.named_styles.get(&name) {
                Some(style) => attrs.merge(style),
                None => warn!("style '{name}' not found"),
            }
        }
        Ok(attrs)
    }

    fn default_style(&self, name: &str) -> Attributes {
        self.named_styles.get(name).cloned().unwrap_or_default()
    }

    /// Assemble the diagram: pad the grid, place blocks, synthesize
    /// autoblocks for leftover tags, validate covers and expand
    /// connection definitions.
    pub fn build(self) -> Result<Diagram> {
        let auto_attrs = self.default_style("default_block");
        let grid = Grid::new(self.rows);

        // Explicit block names must be unique, and a tag may not double
        // as another block's name.
        let mut names: Vec<&str> = Vec::new();
        for def in &self.block_defs {
            if let Some(name) = &def.name {
                if names.contains(&name.as_str()) {
                    return Err(LayoutError::DuplicateBlock { name: name.clone() }.into());
                }
                names.push(name);
            }
        }
        // A tags entry naming another block makes the two covers
        // overlap (the frame idiom); worth a note but not an error.
        for def in &self.block_defs {
            for tag in &def.tags {
                if names.contains(&tag.as_str()) && def.name.as_deref() != Some(tag.as_str()) {
                    warn!(
                        "block '{}' absorbs the cells of block '{tag}' into its cover",
                        def.name.as_deref().unwrap_or("(unnamed)"),
                    );
                }
            }
        }

        // Tags claimed by explicit blocks; everything else in the grid
        // is leftover and synthesizes an autoblock.
        let claimed: Vec<&str> = self
            .block_defs
            .iter()
            .flat_map(|def| {
                def.name
                    .as_deref()
                    .into_iter()
                    .chain(def.tags.iter().map(String::as_str))
            })
            .collect();
        let mut leftover: Vec<String> = Vec::new();
        for (_, _, tag) in grid.cells() {
            if let Some(tag) = tag {
                if !claimed.contains(&tag) && !leftover.iter().any(|seen| seen == tag) {
                    leftover.push(tag.to_string());
                }
            }
        }

        // Autoblocks are drawn (and indexed) before all explicit blocks.
        let mut all_defs: Vec<BlockDef> = leftover
            .into_iter()
            .map(|tag| BlockDef {
                name: Some(tag),
                tags: Vec::new(),
                attrs: auto_attrs.clone(),
            })
            .collect();
        let auto_count = all_defs.len();
        all_defs.extend(self.block_defs);

        let mut blocks = Vec::with_capacity(all_defs.len());
        for index in 0..all_defs.len() {
            let block = place_block(index, &all_defs, &grid, auto_count)?;
            blocks.push(block);
        }

        // Expand connection definitions: the Cartesian product of the
        // starts and ends, in declaration order.
        let mut connections = Vec::new();
        for def in &self.connection_defs {
            let base = {
                let mut resolved = ConnectionAttributes::default();
                resolved.apply(&def.attrs);
                resolved
            };
            let start_label = resolve_label(&def.start_label, &base);
            let middle_label = resolve_label(&def.middle_label, &base);
            let end_label = resolve_label(&def.end_label, &base);
            for start in &def.starts {
                let start = resolve_terminal(start, &blocks, &grid)?;
                for end in &def.ends {
                    let end = resolve_terminal(end, &blocks, &grid)?;
                    connections.push(Connection {
                        start,
                        end,
                        group: def.group.clone(),
                        attrs: base.clone(),
                        start_label: start_label.clone(),
                        middle_label: middle_label.clone(),
                        end_label: end_label.clone(),
                    });
                }
            }
        }

        let mut attrs = DiagramAttributes::default();
        attrs.apply(&self.diagram_attrs);

        Ok(Diagram {
            attrs,
            grid,
            blocks,
            connections,
        })
    }
}

/// Compute and validate the cover of one block. The leading
/// `auto_count` entries of `all_defs` are the autoblocks.
fn place_block(
    index: usize,
    all_defs: &[BlockDef],
    grid: &Grid,
    auto_count: usize,
) -> Result<Block> {
    let def = &all_defs[index];
    let claims = |candidate: &str| {
        def.name.as_deref() == Some(candidate) || def.tags.iter().any(|tag| tag == candidate)
    };
    let mut bounds: Option<CellBounds> = None;
    for (row, column, tag) in grid.cells() {
        if let Some(tag) = tag {
            if claims(tag) {
                match &mut bounds {
                    Some(bounds) => bounds.expand_to(row, column),
                    None => bounds = Some(CellBounds::of_cell(row, column)),
                }
            }
        }
    }
    let display = def.name.as_deref().unwrap_or("(unnamed)");
    let Some(bounds) = bounds else {
        return Err(LayoutError::EmptyBlock {
            name: display.to_string(),
        }
        .into());
    };

    // The bounding rectangle may contain anonymous or leftover cells,
    // but never a cell claimed by a different explicit block.
    for row in bounds.top..=bounds.bottom {
        for column in bounds.left..=bounds.right {
            let Some(tag) = grid.tag_at(row, column) else {
                continue;
            };
            if claims(tag) {
                continue;
            }
            let foreign_owner = all_defs.iter().enumerate().find(|(other_index, other)| {
                *other_index != index
                    && *other_index >= auto_count
                    && (other.name.as_deref() == Some(tag)
                        || other.tags.iter().any(|other_tag| other_tag == tag))
            });
            if let Some((_, owner)) = foreign_owner {
                return Err(LayoutError::NonRectangularCover {
                    block: display.to_string(),
                    other: owner.name.as_deref().unwrap_or("(unnamed)").to_string(),
                    row,
                    column,
                }
                .into());
            }
        }
    }

    let mut attrs = BlockAttributes::default();
    attrs.apply(&def.attrs);
    let mut tags: Vec<String> = def.name.iter().cloned().collect();
    for tag in &def.tags {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    Ok(Block {
        name: def.name.clone(),
        tags,
        bounds,
        attrs,
        is_auto: index < auto_count,
    })
}

fn resolve_terminal(def: &TerminalDef, blocks: &[Block], grid: &Grid) -> Result<Terminal> {
    let index = blocks
        .iter()
        .position(|block| block.name.as_deref() == Some(def.block.as_str()))
        .ok_or_else(|| LayoutError::UnknownBlock {
            name: def.block.clone(),
        })?;
    let cell = match &def.tag {
        None => None,
        Some(tag) => {
            let bounds = blocks[index].bounds;
            let mut found = None;
            'rows: for row in bounds.top..=bounds.bottom {
                for column in bounds.left..=bounds.right {
                    if grid.tag_at(row, column) == Some(tag.as_str()) {
                        found = Some((row, column));
                        break 'rows;
                    }
                }
            }
            Some(found.ok_or_else(|| LayoutError::UnknownCell {
                block: def.block.clone(),
                tag: tag.clone(),
            })?)
        }
    };
    Ok(Terminal {
        block: index,
        cell,
    })
}

fn resolve_label(
    def: &Option<LabelDef>,
    connection: &ConnectionAttributes,
) -> Option<ConnectionLabel> {
    let def = def.as_ref()?;
    let mut style = connection.text.clone();
    let mut distance = connection.label_distance;
    style.apply(&def.attrs);
    if let Some(value) = def.attrs.label_distance {
        distance = value;
    }
    let text = def
        .text
        .clone()
        .or_else(|| def.attrs.label.clone().flatten())?;
    Some(ConnectionLabel {
        text,
        distance,
        style,
    })
}

fn parse_terminals(value: &Value) -> Result<Vec<TerminalDef>, DefinitionError> {
    match value {
        Value::String(name) => Ok(vec![TerminalDef {
            block: name.clone(),
            tag: None,
        }]),
        Value::Sequence(seq) => {
            let mut terminals = Vec::with_capacity(seq.len());
            for item in seq {
                let name = item
                    .as_str()
                    .ok_or_else(|| type_error("connection terminal", "a block name"))?;
                terminals.push(TerminalDef {
                    block: name.to_string(),
                    tag: None,
                });
            }
            Ok(terminals)
        }
        Value::Mapping(mapping) => {
            let mut terminals = Vec::with_capacity(mapping.len());
            for (block, tag) in mapping {
                let block = block
                    .as_str()
                    .ok_or_else(|| type_error("connection terminal", "a block name"))?;
                let tag = tag
                    .as_str()
                    .ok_or_else(|| type_error("connection terminal", "a cell tag"))?;
                terminals.push(TerminalDef {
                    block: block.to_string(),
                    tag: Some(tag.to_string()),
                });
            }
            Ok(terminals)
        }
        _ => Err(type_error(
            "connection terminal",
            "a block name, list of names, or {block: tag} mapping",
        )),
    }
}

fn expect_mapping<'a>(value: &'a Value, context: &str) -> Result<&'a Mapping, DefinitionError> {
    value.as_mapping().ok_or_else(|| type_error(context, "a mapping"))
}

fn expect_key_str<'a>(value: &'a Value, context: &str) -> Result<&'a str, DefinitionError> {
    value.as_str().ok_or_else(|| type_error(context, "a string key"))
}

fn type_error(context: &str, expected: &'static str) -> DefinitionError {
    DefinitionError::TypeMismatch {
        context: context.to_string(),
        expected,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::attributes::Side;
    use crate::error::Error;

    pub(crate) fn diagram_from_yaml(yaml: &str) -> Result<Diagram> {
        diagram_from_str(yaml)
    }

    #[test]
    fn pads_rows_and_places_blocks() {
        let diagram = diagram_from_yaml(
            "rows:\n  - [a]\n  - [~, b]\nblocks:\n  - name: a\n  - name: b\n",
        )
        .unwrap();
        assert_eq!(diagram.grid.width, 2);
        assert_eq!(diagram.grid.height, 2);
        let a = diagram.block_by_name("a").unwrap();
        let b = diagram.block_by_name("b").unwrap();
        assert_eq!(diagram.blocks[a].bounds, CellBounds::of_cell(0, 0));
        assert_eq!(diagram.blocks[b].bounds, CellBounds::of_cell(1, 1));
    }

    #[test]
    fn block_cover_spans_name_and_extra_tags() {
        let diagram = diagram_from_yaml(
            "rows:\n  - [a, x]\n  - [y, a]\nblocks:\n  - name: a\n    tags: [x, y]\n",
        )
        .unwrap();
        let a = diagram.block_by_name("a").unwrap();
        assert_eq!(
            diagram.blocks[a].bounds,
            CellBounds {
                top: 0,
                left: 0,
                bottom: 1,
                right: 1
            }
        );
    }

    #[test]
    fn leftover_tags_become_leading_autoblocks() {
        let diagram = diagram_from_yaml(
            "rows:\n  - [x, a]\nblocks:\n  - name: a\n",
        )
        .unwrap();
        assert_eq!(diagram.blocks.len(), 2);
        assert!(diagram.blocks[0].is_auto);
        assert_eq!(diagram.blocks[0].name.as_deref(), Some("x"));
        assert_eq!(diagram.blocks[0].effective_label(), Some("x"));
        assert!(!diagram.blocks[1].is_auto);
    }

    #[test]
    fn foreign_cell_inside_cover_is_rejected() {
        let err = diagram_from_yaml(
            "rows:\n  - [a, b, a]\nblocks:\n  - name: a\n  - name: b\n",
        );
        assert!(matches!(
            err,
            Err(Error::Layout(LayoutError::NonRectangularCover { .. }))
        ));
    }

    #[test]
    fn anonymous_gap_inside_cover_is_allowed() {
        let diagram = diagram_from_yaml(
            "rows:\n  - [a, ~, a]\nblocks:\n  - name: a\n",
        )
        .unwrap();
        let a = diagram.block_by_name("a").unwrap();
        assert_eq!(diagram.blocks[a].bounds.right, 2);
    }

    #[test]
    fn duplicate_block_name_is_rejected() {
        let err = diagram_from_yaml(
            "rows:\n  - [a]\nblocks:\n  - name: a\n  - name: a\n",
        );
        assert!(matches!(
            err,
            Err(Error::Layout(LayoutError::DuplicateBlock { .. }))
        ));
    }

    #[test]
    fn zero_cover_block_is_rejected() {
        let err = diagram_from_yaml("rows:\n  - [a]\nblocks:\n  - name: a\n  - name: ghost\n");
        assert!(matches!(
            err,
            Err(Error::Layout(LayoutError::EmptyBlock { .. }))
        ));
    }

    #[test]
    fn connection_cartesian_product_preserves_order() {
        let diagram = diagram_from_yaml(
            "rows:\n  - [a, b, c, d]\nblocks:\n  - name: a\n  - name: b\n  - name: c\n  - name: d\nconnections:\n  - start: [a, b]\n    end: [c, d]\n",
        )
        .unwrap();
        let names: Vec<(String, String)> = diagram
            .connections
            .iter()
            .map(|connection| {
                (
                    diagram.block_name(connection.start.block).to_string(),
                    diagram.block_name(connection.end.block).to_string(),
                )
            })
            .collect();
        let expected = [
            ("a", "c"),
            ("a", "d"),
            ("b", "c"),
            ("b", "d"),
        ];
        assert_eq!(
            names,
            expected
                .iter()
                .map(|(s, e)| (s.to_string(), e.to_string()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn styles_fold_with_precedence() {
        let diagram = diagram_from_yaml(
            "rows:\n  - [a]\nstyles:\n  default_block:\n    stroke_width: 5\n  thick:\n    stroke_width: 7\n    min_width: 10\nblocks:\n  - name: a\n    style: thick\n    min_width: 20\n",
        )
        .unwrap();
        let a = &diagram.blocks[diagram.block_by_name("a").unwrap()];
        assert_eq!(a.attrs.stroke_width, 7.0);
        assert_eq!(a.attrs.min_width, 20.0);
    }

    #[test]
    fn group_attributes_reach_member_connections() {
        let diagram = diagram_from_yaml(
            "rows:\n  - [a, b]\nblocks:\n  - name: a\n  - name: b\ngroups:\n  water:\n    stroke_width: 4\nconnections:\n  - start: a\n    end: b\n    group: water\n",
        )
        .unwrap();
        assert_eq!(diagram.connections[0].attrs.stroke_width, 4.0);
        assert_eq!(diagram.connections[0].group.as_deref(), Some("water"));
    }

    #[test]
    fn cell_targeted_terminal_resolves_inside_cover() {
        let diagram = diagram_from_yaml(
            "rows:\n  - [a, x, b]\nblocks:\n  - name: a\n    tags: [x]\n  - name: b\nconnections:\n  - start: {a: x}\n    end: b\n",
        )
        .unwrap();
        assert_eq!(diagram.connections[0].start.cell, Some((0, 1)));
    }

    #[test]
    fn entrances_and_exits_parse_into_side_sets() {
        let diagram = diagram_from_yaml(
            "rows:\n  - [a, b]\nblocks:\n  - name: a\n  - name: b\nconnections:\n  - start: a\n    end: b\n    exits: [right]\n    entrances: [left]\n",
        )
        .unwrap();
        assert_eq!(diagram.connections[0].attrs.exits, vec![Side::Right]);
        assert_eq!(diagram.connections[0].attrs.entrances, vec![Side::Left]);
    }
}
