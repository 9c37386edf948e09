//! Attribute model: the raw attribute record collected from definition
//! files, and the resolved per-entity attribute structs with built-in
//! defaults. Attributes merge with explicit precedence; later sources
//! override earlier ones field by field.

use serde::Serialize;
use serde_yaml::Value;

use crate::error::DefinitionError;

/// Sides of a block, in the fixed order used for sorted side sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Side {
    Bottom,
    Left,
    Right,
    Top,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Bottom, Side::Left, Side::Right, Side::Top];

    fn parse(text: &str) -> Option<Side> {
        match text.trim().to_ascii_lowercase().as_str() {
            "bottom" => Some(Side::Bottom),
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            "top" => Some(Side::Top),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextOrientation {
    Horizontal,
    Vertical,
    Follow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FontStyle {
    Normal,
    Italic,
    Oblique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FontWeight {
    Normal,
    Bold,
}

/// Position of a label relative to the shape that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LabelPosition {
    Bottom,
    BottomLeft,
    BottomRight,
    Center,
    Top,
    TopLeft,
    TopRight,
}

impl LabelPosition {
    pub fn is_top(self) -> bool {
        matches!(
            self,
            LabelPosition::Top | LabelPosition::TopLeft | LabelPosition::TopRight
        )
    }

    pub fn is_bottom(self) -> bool {
        matches!(
            self,
            LabelPosition::Bottom | LabelPosition::BottomLeft | LabelPosition::BottomRight
        )
    }

    pub fn is_left(self) -> bool {
        matches!(self, LabelPosition::BottomLeft | LabelPosition::TopLeft)
    }

    pub fn is_right(self) -> bool {
        matches!(self, LabelPosition::BottomRight | LabelPosition::TopRight)
    }

    fn parse(text: &str) -> Option<LabelPosition> {
        match text.trim().to_ascii_lowercase().as_str() {
            "bottom" => Some(LabelPosition::Bottom),
            "bottom_left" => Some(LabelPosition::BottomLeft),
            "bottom_right" => Some(LabelPosition::BottomRight),
            "center" => Some(LabelPosition::Center),
            "top" => Some(LabelPosition::Top),
            "top_left" => Some(LabelPosition::TopLeft),
            "top_right" => Some(LabelPosition::TopRight),
            _ => None,
        }
    }
}

/// RGBA color with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    pub fn white() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }

    /// CSS serialization for the SVG surface.
    pub fn css(&self) -> String {
        let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        if (self.a - 1.0).abs() < f64::EPSILON {
            format!(
                "rgb({},{},{})",
                channel(self.r),
                channel(self.g),
                channel(self.b)
            )
        } else {
            format!(
                "rgba({},{},{},{})",
                channel(self.r),
                channel(self.g),
                channel(self.b),
                self.a.clamp(0.0, 1.0)
            )
        }
    }
}

/// Raw attribute record as collected from a definition mapping. Every
/// field is optional; a `None` means the source did not mention the
/// attribute at all. Nullable attributes (colors, label) use a nested
/// `Option` so that an explicit `null` can clear an inherited value.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    pub arrow_aspect: Option<f64>,
    pub arrow_back: Option<bool>,
    pub arrow_base: Option<f64>,
    pub arrow_forward: Option<bool>,
    pub buffer_fill: Option<Option<Color>>,
    pub buffer_width: Option<f64>,
    pub collapse_connections: Option<bool>,
    pub connection_distance: Option<f64>,
    pub drawing_priority: Option<i32>,
    pub entrances: Option<Vec<Side>>,
    pub exits: Option<Vec<Side>>,
    pub fill: Option<Option<Color>>,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub font_style: Option<FontStyle>,
    pub font_weight: Option<FontWeight>,
    pub label: Option<Option<String>>,
    pub label_distance: Option<f64>,
    pub label_position: Option<LabelPosition>,
    pub margin_bottom: Option<f64>,
    pub margin_left: Option<f64>,
    pub margin_right: Option<f64>,
    pub margin_top: Option<f64>,
    pub min_height: Option<f64>,
    pub min_width: Option<f64>,
    pub padding_bottom: Option<f64>,
    pub padding_left: Option<f64>,
    pub padding_right: Option<f64>,
    pub padding_top: Option<f64>,
    pub pass_through: Option<bool>,
    pub scale: Option<f64>,
    pub stroke: Option<Option<Color>>,
    pub stroke_dasharray: Option<Vec<f64>>,
    pub stroke_width: Option<f64>,
    pub text_fill: Option<Option<Color>>,
    pub text_line_height: Option<f64>,
    pub text_orientation: Option<TextOrientation>,
}

macro_rules! merge_fields {
    ($dst:expr, $src:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$src.$field {
                $dst.$field = Some(value.clone());
            }
        )+
    };
}

impl Attributes {
    /// Merge `src` over `self`: attributes present in `src` win.
    pub fn merge(&mut self, src: &Attributes) {
        merge_fields!(
            self,
            src,
            arrow_aspect,
            arrow_back,
            arrow_base,
            arrow_forward,
            buffer_fill,
            buffer_width,
            collapse_connections,
            connection_distance,
            drawing_priority,
            entrances,
            exits,
            fill,
            font_family,
            font_size,
            font_style,
            font_weight,
            label,
            label_distance,
            label_position,
            margin_bottom,
            margin_left,
            margin_right,
            margin_top,
            min_height,
            min_width,
            padding_bottom,
            padding_left,
            padding_right,
            padding_top,
            pass_through,
            scale,
            stroke,
            stroke_dasharray,
            stroke_width,
            text_fill,
            text_line_height,
            text_orientation,
        );
    }

    /// Collect attributes from a definition mapping. Keys listed in
    /// `structural` belong to the surrounding definition (e.g. `name`,
    /// `tags`, `style`) and are skipped; any other unrecognized key is
    /// a definition error.
    pub fn from_mapping(
        map: &serde_yaml::Mapping,
        context: &str,
        structural: &[&str],
    ) -> Result<Attributes, DefinitionError> {
        let mut attrs = Attributes::default();
        for (key, value) in map {
            let key = key.as_str().ok_or_else(|| DefinitionError::TypeMismatch {
                context: context.to_string(),
                expected: "string keys",
            })?;
            if structural.contains(&key) {
                continue;
            }
            let ctx = || format!("{context}.{key}");
            match key {
                "arrow_aspect" => attrs.arrow_aspect = Some(expect_f64(value, &ctx())?),
                "arrow_back" => attrs.arrow_back = Some(expect_bool(value, &ctx())?),
                "arrow_base" => attrs.arrow_base = Some(expect_f64(value, &ctx())?),
                "arrow_forward" => attrs.arrow_forward = Some(expect_bool(value, &ctx())?),
                "buffer_fill" => attrs.buffer_fill = Some(parse_color(value, &ctx())?),
                "buffer_width" => attrs.buffer_width = Some(expect_f64(value, &ctx())?),
                "collapse_connections" => {
                    attrs.collapse_connections = Some(expect_bool(value, &ctx())?)
                }
                "connection_distance" => {
                    attrs.connection_distance = Some(expect_f64(value, &ctx())?)
                }
                "drawing_priority" => {
                    attrs.drawing_priority = Some(expect_f64(value, &ctx())? as i32)
                }
                "entrances" => attrs.entrances = Some(parse_sides(value, &ctx())?),
                "exits" => attrs.exits = Some(parse_sides(value, &ctx())?),
                "fill" => attrs.fill = Some(parse_color(value, &ctx())?),
                "font_family" => attrs.font_family = Some(expect_str(value, &ctx())?),
                "font_size" => attrs.font_size = Some(expect_f64(value, &ctx())?),
                "font_style" => {
                    attrs.font_style = Some(parse_enum(value, &ctx(), |text| match text {
                        "normal" => Some(FontStyle::Normal),
                        "italic" => Some(FontStyle::Italic),
                        "oblique" => Some(FontStyle::Oblique),
                        _ => None,
                    })?)
                }
                "font_weight" => {
                    attrs.font_weight = Some(parse_enum(value, &ctx(), |text| match text {
                        "normal" => Some(FontWeight::Normal),
                        "bold" => Some(FontWeight::Bold),
                        _ => None,
                    })?)
                }
                "label" => {
                    attrs.label = Some(match value {
                        Value::Null => None,
                        other => Some(stringify(other, &ctx())?),
                    })
                }
                "label_distance" => attrs.label_distance = Some(expect_f64(value, &ctx())?),
                "label_position" => {
                    attrs.label_position =
                        Some(parse_enum(value, &ctx(), LabelPosition::parse)?)
                }
                "margin_bottom" => attrs.margin_bottom = Some(expect_f64(value, &ctx())?),
                "margin_left" => attrs.margin_left = Some(expect_f64(value, &ctx())?),
                "margin_right" => attrs.margin_right = Some(expect_f64(value, &ctx())?),
                "margin_top" => attrs.margin_top = Some(expect_f64(value, &ctx())?),
                "min_height" => attrs.min_height = Some(expect_f64(value, &ctx())?),
                "min_width" => attrs.min_width = Some(expect_f64(value, &ctx())?),
                "padding_bottom" => attrs.padding_bottom = Some(expect_f64(value, &ctx())?),
                "padding_left" => attrs.padding_left = Some(expect_f64(value, &ctx())?),
                "padding_right" => attrs.padding_right = Some(expect_f64(value, &ctx())?),
                "padding_top" => attrs.padding_top = Some(expect_f64(value, &ctx())?),
                "pass_through" => attrs.pass_through = Some(expect_bool(value, &ctx())?),
                "scale" => attrs.scale = Some(expect_f64(value, &ctx())?),
                "stroke" => attrs.stroke = Some(parse_color(value, &ctx())?),
                "stroke_dasharray" => {
                    attrs.stroke_dasharray = Some(parse_numbers(value, &ctx())?)
                }
                "stroke_width" => attrs.stroke_width = Some(expect_f64(value, &ctx())?),
                "text_fill" => attrs.text_fill = Some(parse_color(value, &ctx())?),
                "text_line_height" => attrs.text_line_height = Some(expect_f64(value, &ctx())?),
                "text_orientation" => {
                    attrs.text_orientation =
                        Some(parse_enum(value, &ctx(), |text| match text {
                            "horizontal" => Some(TextOrientation::Horizontal),
                            "vertical" => Some(TextOrientation::Vertical),
                            "follow" => Some(TextOrientation::Follow),
                            _ => None,
                        })?)
                }
                other => {
                    return Err(DefinitionError::UnknownKey {
                        key: other.to_string(),
                        context: context.to_string(),
                    })
                }
            }
        }
        Ok(attrs)
    }
}

fn expect_f64(value: &Value, context: &str) -> Result<f64, DefinitionError> {
    value.as_f64().ok_or_else(|| DefinitionError::TypeMismatch {
        context: context.to_string(),
        expected: "a number",
    })
}

fn expect_bool(value: &Value, context: &str) -> Result<bool, DefinitionError> {
    value.as_bool().ok_or_else(|| DefinitionError::TypeMismatch {
        context: context.to_string(),
        expected: "a boolean",
    })
}

fn expect_str(value: &Value, context: &str) -> Result<String, DefinitionError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DefinitionError::TypeMismatch {
            context: context.to_string(),
            expected: "a string",
        })
}

fn stringify(value: &Value, context: &str) -> Result<String, DefinitionError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(DefinitionError::TypeMismatch {
            context: context.to_string(),
            expected: "a scalar",
        }),
    }
}

fn parse_numbers(value: &Value, context: &str) -> Result<Vec<f64>, DefinitionError> {
    let seq = value
        .as_sequence()
        .ok_or_else(|| DefinitionError::TypeMismatch {
            context: context.to_string(),
            expected: "a sequence of numbers",
        })?;
    seq.iter().map(|item| expect_f64(item, context)).collect()
}

/// Colors are `[r, g, b]` or `[r, g, b, a]` with components in [0, 1];
/// `null` clears the color.
fn parse_color(value: &Value, context: &str) -> Result<Option<Color>, DefinitionError> {
    if value.is_null() {
        return Ok(None);
    }
    let numbers = parse_numbers(value, context)?;
    if numbers.len() < 3 || numbers.len() > 4 {
        return Err(DefinitionError::TypeMismatch {
            context: context.to_string(),
            expected: "3 or 4 color components",
        });
    }
    let alpha = numbers.get(3).copied().unwrap_or(1.0);
    Ok(Some(Color::new(numbers[0], numbers[1], numbers[2], alpha)))
}

fn parse_sides(value: &Value, context: &str) -> Result<Vec<Side>, DefinitionError> {
    let seq = value
        .as_sequence()
        .ok_or_else(|| DefinitionError::TypeMismatch {
            context: context.to_string(),
            expected: "a sequence of sides",
        })?;
    let mut sides = Vec::new();
    for item in seq {
        let text = expect_str(item, context)?;
        let side = Side::parse(&text).ok_or_else(|| DefinitionError::TypeMismatch {
            context: context.to_string(),
            expected: "one of top, bottom, left, right",
        })?;
        if !sides.contains(&side) {
            sides.push(side);
        }
    }
    sides.sort();
    Ok(sides)
}

fn parse_enum<T>(
    value: &Value,
    context: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, DefinitionError> {
    let text = expect_str(value, context)?;
    parse(&text.trim().to_ascii_lowercase()).ok_or_else(|| DefinitionError::TypeMismatch {
        context: context.to_string(),
        expected: "a recognized keyword",
    })
}

/// Text styling shared by every labelled entity.
#[derive(Debug, Clone)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    pub font_style: FontStyle,
    pub font_weight: FontWeight,
    pub text_fill: Option<Color>,
    pub text_line_height: f64,
    pub text_orientation: TextOrientation,
}

impl TextStyle {
    fn base() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 10.0,
            font_style: FontStyle::Normal,
            font_weight: FontWeight::Normal,
            text_fill: Some(Color::black()),
            text_line_height: 1.2,
            text_orientation: TextOrientation::Horizontal,
        }
    }

    pub fn apply(&mut self, attrs: &Attributes) {
        if let Some(value) = &attrs.font_family {
            self.font_family = value.clone();
        }
        if let Some(value) = attrs.font_size {
            self.font_size = value;
        }
        if let Some(value) = attrs.font_style {
            self.font_style = value;
        }
        if let Some(value) = attrs.font_weight {
            self.font_weight = value;
        }
        if let Some(value) = attrs.text_fill {
            self.text_fill = value;
        }
        if let Some(value) = attrs.text_line_height {
            self.text_line_height = value;
        }
        if let Some(value) = attrs.text_orientation {
            self.text_orientation = value;
        }
    }
}

/// Resolved attributes of the diagram itself.
#[derive(Debug, Clone)]
pub struct DiagramAttributes {
    pub collapse_connections: bool,
    pub connection_distance: f64,
    pub fill: Option<Color>,
    pub label: Option<String>,
    pub label_distance: f64,
    pub label_position: LabelPosition,
    pub min_height: f64,
    pub min_width: f64,
    pub padding_bottom: f64,
    pub padding_left: f64,
    pub padding_right: f64,
    pub padding_top: f64,
    pub scale: f64,
    pub stroke: Option<Color>,
    pub stroke_width: f64,
    pub text: TextStyle,
}

impl Default for DiagramAttributes {
    fn default() -> Self {
        let mut text = TextStyle::base();
        text.font_size = 14.0;
        Self {
            collapse_connections: false,
            connection_distance: 4.0,
            fill: Some(Color::white()),
            label: None,
            label_distance: 6.0,
            label_position: LabelPosition::Top,
            min_height: 256.0,
            min_width: 256.0,
            padding_bottom: 0.0,
            padding_left: 0.0,
            padding_right: 0.0,
            padding_top: 0.0,
            scale: 1.0,
            stroke: None,
            stroke_width: 0.0,
            text,
        }
    }
}

impl DiagramAttributes {
    pub fn apply(&mut self, attrs: &Attributes) {
        self.text.apply(attrs);
        if let Some(value) = attrs.collapse_connections {
            self.collapse_connections = value;
        }
        if let Some(value) = attrs.connection_distance {
            self.connection_distance = value;
        }
        if let Some(value) = &attrs.fill {
            self.fill = *value;
        }
        if let Some(value) = &attrs.label {
            self.label = value.clone();
        }
        if let Some(value) = attrs.label_distance {
            self.label_distance = value;
        }
        if let Some(value) = attrs.label_position {
            self.label_position = value;
        }
        if let Some(value) = attrs.min_height {
            self.min_height = value;
        }
        if let Some(value) = attrs.min_width {
            self.min_width = value;
        }
        if let Some(value) = attrs.padding_bottom {
            self.padding_bottom = value;
        }
        if let Some(value) = attrs.padding_left {
            self.padding_left = value;
        }
        if let Some(value) = attrs.padding_right {
            self.padding_right = value;
        }
        if let Some(value) = attrs.padding_top {
            self.padding_top = value;
        }
        if let Some(value) = attrs.scale {
            self.scale = value;
        }
        if let Some(value) = &attrs.stroke {
            self.stroke = *value;
        }
        if let Some(value) = attrs.stroke_width {
            self.stroke_width = value;
        }
    }
}

/// Resolved attributes of a block.
#[derive(Debug, Clone)]
pub struct BlockAttributes {
    pub fill: Option<Color>,
    pub label: Option<String>,
    pub label_distance: f64,
    pub label_position: LabelPosition,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub min_height: f64,
    pub min_width: f64,
    pub padding_bottom: f64,
    pub padding_left: f64,
    pub padding_right: f64,
    pub padding_top: f64,
    pub pass_through: bool,
    pub stroke: Option<Color>,
    pub stroke_dasharray: Option<Vec<f64>>,
    pub stroke_width: f64,
    pub text: TextStyle,
}

impl Default for BlockAttributes {
    fn default() -> Self {
        Self {
            fill: None,
            label: None,
            label_distance: 6.0,
            label_position: LabelPosition::Center,
            margin_bottom: 24.0,
            margin_left: 24.0,
            margin_right: 24.0,
            margin_top: 24.0,
            min_height: 48.0,
            min_width: 96.0,
            padding_bottom: 8.0,
            padding_left: 8.0,
            padding_right: 8.0,
            padding_top: 8.0,
            pass_through: false,
            stroke: Some(Color::black()),
            stroke_dasharray: None,
            stroke_width: 2.0,
            text: TextStyle::base(),
        }
    }
}

impl BlockAttributes {
    pub fn apply(&mut self, attrs: &Attributes) {
        self.text.apply(attrs);
        if let Some(value) = &attrs.fill {
            self.fill = *value;
        }
        if let Some(value) = &attrs.label {
            self.label = value.clone();
        }
        if let Some(value) = attrs.label_distance {
            self.label_distance = value;
        }
        if let Some(value) = attrs.label_position {
            self.label_position = value;
        }
        if let Some(value) = attrs.margin_bottom {
            self.margin_bottom = value;
        }
        if let Some(value) = attrs.margin_left {
            self.margin_left = value;
        }
        if let Some(value) = attrs.margin_right {
            self.margin_right = value;
        }
        if let Some(value) = attrs.margin_top {
            self.margin_top = value;
        }
        if let Some(value) = attrs.min_height {
            self.min_height = value;
        }
        if let Some(value) = attrs.min_width {
            self.min_width = value;
        }
        if let Some(value) = attrs.padding_bottom {
            self.padding_bottom = value;
        }
        if let Some(value) = attrs.padding_left {
            self.padding_left = value;
        }
        if let Some(value) = attrs.padding_right {
            self.padding_right = value;
        }
        if let Some(value) = attrs.padding_top {
            self.padding_top = value;
        }
        if let Some(value) = attrs.pass_through {
            self.pass_through = value;
        }
        if let Some(value) = &attrs.stroke {
            self.stroke = *value;
        }
        if let Some(value) = &attrs.stroke_dasharray {
            self.stroke_dasharray = Some(value.clone());
        }
        if let Some(value) = attrs.stroke_width {
            self.stroke_width = value;
        }
    }
}

/// Resolved attributes of a connection.
#[derive(Debug, Clone)]
pub struct ConnectionAttributes {
    pub arrow_aspect: f64,
    pub arrow_back: bool,
    pub arrow_base: f64,
    pub arrow_forward: bool,
    pub buffer_fill: Option<Color>,
    pub buffer_width: f64,
    pub drawing_priority: i32,
    pub entrances: Vec<Side>,
    pub exits: Vec<Side>,
    pub label_distance: f64,
    pub stroke: Option<Color>,
    pub stroke_dasharray: Option<Vec<f64>>,
    pub stroke_width: f64,
    pub text: TextStyle,
}

impl Default for ConnectionAttributes {
    fn default() -> Self {
        let mut text = TextStyle::base();
        text.text_orientation = TextOrientation::Follow;
        Self {
            arrow_aspect: 1.5,
            arrow_back: false,
            arrow_base: 3.0,
            arrow_forward: true,
            buffer_fill: None,
            buffer_width: 0.0,
            drawing_priority: 0,
            entrances: Side::ALL.to_vec(),
            exits: Side::ALL.to_vec(),
            label_distance: 4.0,
            stroke: Some(Color::black()),
            stroke_dasharray: None,
            stroke_width: 2.0,
            text,
        }
    }
}

impl ConnectionAttributes {
    pub fn apply(&mut self, attrs: &Attributes) {
        self.text.apply(attrs);
        if let Some(value) = attrs.arrow_aspect {
            self.arrow_aspect = value;
        }
        if let Some(value) = attrs.arrow_back {
            self.arrow_back = value;
        }
        if let Some(value) = attrs.arrow_base {
            self.arrow_base = value;
        }
        if let Some(value) = attrs.arrow_forward {
            self.arrow_forward = value;
        }
        if let Some(value) = &attrs.buffer_fill {
            self.buffer_fill = *value;
        }
        if let Some(value) = attrs.buffer_width {
            self.buffer_width = value;
        }
        if let Some(value) = attrs.drawing_priority {
            self.drawing_priority = value;
        }
        if let Some(value) = &attrs.entrances {
            if !value.is_empty() {
                self.entrances = value.clone();
            }
        }
        if let Some(value) = &attrs.exits {
            if !value.is_empty() {
                self.exits = value.clone();
            }
        }
        if let Some(value) = attrs.label_distance {
            self.label_distance = value;
        }
        if let Some(value) = &attrs.stroke {
            self.stroke = *value;
        }
        if let Some(value) = &attrs.stroke_dasharray {
            self.stroke_dasharray = Some(value.clone());
        }
        if let Some(value) = attrs.stroke_width {
            self.stroke_width = value;
        }
    }

    /// Width of the drawn line including the buffer on both sides.
    pub fn wire_width(&self) -> f64 {
        self.stroke_width + 2.0 * self.buffer_width
    }

    /// Base width of the arrow head.
    pub fn arrow_width(&self) -> f64 {
        self.stroke_width * self.arrow_base
    }

    /// Length of the arrow head along the wire.
    pub fn arrow_length(&self) -> f64 {
        self.arrow_width() * self.arrow_aspect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> serde_yaml::Mapping {
        serde_yaml::from_str(yaml).expect("test mapping")
    }

    #[test]
    fn collects_and_merges_with_precedence() {
        let base =
            Attributes::from_mapping(&mapping("stroke_width: 1\nmin_width: 10"), "style", &[])
                .unwrap();
        let over = Attributes::from_mapping(&mapping("stroke_width: 3"), "style", &[]).unwrap();
        let mut merged = Attributes::default();
        merged.merge(&base);
        merged.merge(&over);
        assert_eq!(merged.stroke_width, Some(3.0));
        assert_eq!(merged.min_width, Some(10.0));
    }

    #[test]
    fn null_fill_clears_inherited_color() {
        let mut resolved = BlockAttributes::default();
        resolved.fill = Some(Color::white());
        let cleared = Attributes::from_mapping(&mapping("fill: ~"), "block", &[]).unwrap();
        resolved.apply(&cleared);
        assert_eq!(resolved.fill, None);
    }

    #[test]
    fn rejects_unknown_attribute() {
        let err = Attributes::from_mapping(&mapping("striped: true"), "block 'a'", &[]);
        assert!(matches!(err, Err(DefinitionError::UnknownKey { .. })));
    }

    #[test]
    fn sides_are_sorted_and_unique() {
        let attrs =
            Attributes::from_mapping(&mapping("exits: [top, left, top]"), "connection", &[])
                .unwrap();
        assert_eq!(attrs.exits, Some(vec![Side::Left, Side::Top]));
    }
}
