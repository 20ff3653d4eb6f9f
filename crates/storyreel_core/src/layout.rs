//! Layout elements, per-item validation, the built-in default layout, and
//! geometry scaling from the 800x450 reference canvas to the output resolution.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::types::Resolution;

pub const REFERENCE_WIDTH: f64 = 800.0;
pub const REFERENCE_HEIGHT: f64 = 450.0;

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    pub width: f64,
    pub height: f64,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    pub font_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    pub position: Position,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_border_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_spacing: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayoutElement {
    Image(ImageElement),
    Text(TextElement),
}

impl LayoutElement {
    /// Rescale geometry: x/width by `sx`, y/height by `sy`, font metrics by `sy`.
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        match self {
            LayoutElement::Image(img) => LayoutElement::Image(ImageElement {
                width: img.width * sx,
                height: img.height * sy,
                position: Position {
                    x: img.position.x * sx,
                    y: img.position.y * sy,
                },
            }),
            LayoutElement::Text(text) => LayoutElement::Text(TextElement {
                width: text.width * sx,
                height: text.height * sy,
                position: Position {
                    x: text.position.x * sx,
                    y: text.position.y * sy,
                },
                font_size: text.font_size * sy,
                box_border_width: text.box_border_width.map(|w| w * sy),
                line_spacing: text.line_spacing.map(|s| s * sy),
                ..text.clone()
            }),
        }
    }
}

/// Where a resolved layout came from. Every `Default*` variant is a fallback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LayoutSource {
    Saved,
    /// The story references no layout.
    DefaultUnset,
    DefaultFetchFailed,
    /// The referenced layout does not exist.
    DefaultMissing,
    /// The saved layout had no valid items.
    DefaultEmpty,
}

impl LayoutSource {
    pub fn is_fallback(self) -> bool {
        self != LayoutSource::Saved
    }
}

/// A layout as stored: untrusted items that are validated one by one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawLayout {
    #[serde(default)]
    pub items: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate one raw layout item.
pub fn validate_item(item: &Value) -> Result<LayoutElement> {
    let obj = item
        .as_object()
        .ok_or_else(|| invalid("item is not an object"))?;

    let kind = obj
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing kind"))?;

    let width = number(obj.get("width")).ok_or_else(|| invalid("width must be a number"))?;
    let height = number(obj.get("height")).ok_or_else(|| invalid("height must be a number"))?;
    let position = obj
        .get("position")
        .and_then(position)
        .ok_or_else(|| invalid("position must be an object with numeric x and y"))?;

    match kind {
        "image" => Ok(LayoutElement::Image(ImageElement {
            width,
            height,
            position,
        })),
        "text" => {
            let color = obj
                .get("color")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("text color must be a string"))?
                .to_string();
            let font_size =
                number(obj.get("fontSize")).ok_or_else(|| invalid("fontSize must be a number"))?;
            Ok(LayoutElement::Text(TextElement {
                color,
                background_color: string(obj.get("backgroundColor")),
                font_size,
                font_family: string(obj.get("fontFamily")),
                position,
                width,
                height,
                box_border_width: number(obj.get("boxBorderWidth")),
                line_spacing: number(obj.get("lineSpacing")),
            }))
        }
        other => Err(invalid(&format!("unknown kind '{other}'"))),
    }
}

/// Validate every item, dropping (and logging) the ones that fail.
pub fn normalize_layout(items: &[Value]) -> Vec<LayoutElement> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match validate_item(item) {
            Ok(element) => Some(element),
            Err(e) => {
                warn!(index, error = %e, "dropping layout item");
                None
            }
        })
        .collect()
}

fn invalid(reason: &str) -> CoreError {
    CoreError::InvalidElement(reason.to_string())
}

fn number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|n| n.is_finite())
}

fn string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn position(value: &Value) -> Option<Position> {
    let obj = value.as_object()?;
    Some(Position {
        x: number(obj.get("x"))?,
        y: number(obj.get("y"))?,
    })
}

// ---------------------------------------------------------------------------
// Default layout / lookup / scaling
// ---------------------------------------------------------------------------

/// Illustration on the left half, narration text boxed on the right.
pub fn default_layout() -> Vec<LayoutElement> {
    vec![
        LayoutElement::Image(ImageElement {
            width: 360.0,
            height: 360.0,
            position: Position { x: 30.0, y: 45.0 },
        }),
        LayoutElement::Text(TextElement {
            color: "#ffffff".into(),
            background_color: Some("rgba(0,0,0,0.5)".into()),
            font_size: 20.0,
            font_family: None,
            position: Position { x: 410.0, y: 45.0 },
            width: 360.0,
            height: 360.0,
            box_border_width: Some(10.0),
            line_spacing: Some(6.0),
        }),
    ]
}

pub fn first_image(elements: &[LayoutElement]) -> Option<&ImageElement> {
    elements.iter().find_map(|e| match e {
        LayoutElement::Image(img) => Some(img),
        _ => None,
    })
}

pub fn first_text(elements: &[LayoutElement]) -> Option<&TextElement> {
    elements.iter().find_map(|e| match e {
        LayoutElement::Text(text) => Some(text),
        _ => None,
    })
}

/// Map reference-canvas geometry onto `target`. Returns new elements.
pub fn scale_layout(elements: &[LayoutElement], target: Resolution) -> Vec<LayoutElement> {
    let sx = target.width as f64 / REFERENCE_WIDTH;
    let sy = target.height as f64 / REFERENCE_HEIGHT;
    elements.iter().map(|e| e.scaled(sx, sy)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
