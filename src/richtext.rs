//! The `tellraw` rich-text payload: a tagged sum type with a structured binary
//! encoding, parsed from a JSON-like surface syntax.
//!
//! Grounded on `compiler.py::compile_component/compile_minecraft_json` (encode
//! side) and `vm.py::parse_json_text_format` (decode side).

use std::collections::BTreeMap;

/// Boolean style ids, per the fixed style vocabulary (spec.md §3).
pub const STYLE_BOLD: u8 = 0;
pub const STYLE_ITALIC: u8 = 1;
pub const STYLE_STRIKETHROUGH: u8 = 2;
pub const STYLE_UNDERLINED: u8 = 3;
pub const STYLE_COLOR: u8 = 4;

pub const COLORS: &[&str] = &[
    "black", "red", "green", "yellow", "blue", "magenta", "cyan", "white",
];

/// A style value: the boolean styles are always `true` when present (absence
/// means `false`); color carries a string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StyleValue {
    Flag,
    Color(String),
}

pub type Styles = BTreeMap<u8, StyleValue>;

/// The `tellraw` rich-text payload (spec.md §3 "Rich-text component").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Component {
    /// Tag 0: an opaque fallback blob, used when the surface payload could
    /// not be parsed as a recognized component shape.
    Raw(Vec<u8>),
    /// Tag 1.
    Score {
        name: String,
        objective: String,
        styles: Styles,
    },
    /// Tag 2.
    Text { text: String, styles: Styles },
    /// Tag 3: not itself nested — each element is Raw/Score/Text.
    Array(Vec<Component>),
}

#[derive(Debug)]
pub enum RichTextError {
    InvalidJson(String),
    ComponentTooLarge,
    FieldTooLong(&'static str),
    NotAComponent,
}

impl std::fmt::Display for RichTextError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RichTextError::InvalidJson(e) => write!(f, "invalid JSON in tellraw payload: {e}"),
            RichTextError::ComponentTooLarge => write!(f, "component encodes to more than 255 bytes"),
            RichTextError::FieldTooLong(field) => write!(f, "{field} is longer than 255 bytes"),
            RichTextError::NotAComponent => write!(f, "value is not a score or text component"),
        }
    }
}

fn styles_from_json(obj: &serde_json::Map<String, serde_json::Value>) -> Styles {
    let mut styles = Styles::new();
    let flag = |key: &str| obj.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
    if flag("bold") {
        styles.insert(STYLE_BOLD, StyleValue::Flag);
    }
    if flag("italic") {
        styles.insert(STYLE_ITALIC, StyleValue::Flag);
    }
    if flag("strikethrough") {
        styles.insert(STYLE_STRIKETHROUGH, StyleValue::Flag);
    }
    if flag("underlined") {
        styles.insert(STYLE_UNDERLINED, StyleValue::Flag);
    }
    if let Some(color) = obj.get("color").and_then(|v| v.as_str()) {
        if color != "white" {
            styles.insert(STYLE_COLOR, StyleValue::Color(color.to_string()));
        }
    }
    styles
}

fn component_from_json(value: &serde_json::Value) -> Result<Component, RichTextError> {
    let obj = value.as_object().ok_or(RichTextError::NotAComponent)?;
    let styles = styles_from_json(obj);
    if let Some(score) = obj.get("score").and_then(|v| v.as_object()) {
        let name = score.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let objective = score
            .get("objective")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        if name.len() > 255 {
            return Err(RichTextError::FieldTooLong("name"));
        }
        if objective.len() > 255 {
            return Err(RichTextError::FieldTooLong("objective"));
        }
        Ok(Component::Score {
            name,
            objective,
            styles,
        })
    } else if let Some(text) = obj.get("text").and_then(|v| v.as_str()) {
        if text.len() > 255 {
            return Err(RichTextError::FieldTooLong("text"));
        }
        Ok(Component::Text {
            text: text.to_string(),
            styles,
        })
    } else {
        Err(RichTextError::NotAComponent)
    }
}

/// Parse a `tellraw` surface payload (JSON text, object, or array of objects)
/// into a `Component` tree, ready for `encode`.
///
/// On any non-JSON-syntax failure (missing fields, oversize strings), the
/// caller should fall back to `Component::Raw` of the original payload bytes
/// -- see spec.md §4.2's "fallback raw blob" rule.
pub fn parse(payload: &str) -> Result<Component, RichTextError> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| RichTextError::InvalidJson(e.to_string()))?;

    match value {
        serde_json::Value::Array(items) => {
            if items.len() > 255 {
                return Err(RichTextError::ComponentTooLarge);
            }
            let components = items
                .iter()
                .map(component_from_json)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Component::Array(components))
        }
        other => component_from_json(&other),
    }
}

fn encode_styles(out: &mut Vec<u8>, styles: &Styles) -> Result<(), RichTextError> {
    out.push(styles.len() as u8);
    for (id, value) in styles {
        out.push(*id);
        match value {
            StyleValue::Flag => out.push(1),
            StyleValue::Color(c) => {
                let bytes = c.as_bytes();
                if bytes.len() > 255 {
                    return Err(RichTextError::FieldTooLong("color"));
                }
                out.push(bytes.len() as u8);
                out.extend_from_slice(bytes);
            }
        }
    }
    Ok(())
}

fn encode_component(out: &mut Vec<u8>, component: &Component) -> Result<(), RichTextError> {
    match component {
        Component::Raw(bytes) => {
            out.push(0);
            if bytes.len() > 255 {
                return Err(RichTextError::ComponentTooLarge);
            }
            out.push(bytes.len() as u8);
            out.extend_from_slice(bytes);
        }
        Component::Score {
            name,
            objective,
            styles,
        } => {
            out.push(1);
            let name_bytes = name.as_bytes();
            if name_bytes.len() > 255 {
                return Err(RichTextError::FieldTooLong("name"));
            }
            out.push(name_bytes.len() as u8);
            out.extend_from_slice(name_bytes);
            let obj_bytes = objective.as_bytes();
            if obj_bytes.len() > 255 {
                return Err(RichTextError::FieldTooLong("objective"));
            }
            out.push(obj_bytes.len() as u8);
            out.extend_from_slice(obj_bytes);
            encode_styles(out, styles)?;
        }
        Component::Text { text, styles } => {
            out.push(2);
            let text_bytes = text.as_bytes();
            if text_bytes.len() > 255 {
                return Err(RichTextError::FieldTooLong("text"));
            }
            out.push(text_bytes.len() as u8);
            out.extend_from_slice(text_bytes);
            encode_styles(out, styles)?;
        }
        Component::Array(items) => {
            out.push(3);
            if items.len() > 255 {
                return Err(RichTextError::ComponentTooLarge);
            }
            out.push(items.len() as u8);
            for item in items {
                let mut inner = Vec::new();
                encode_component(&mut inner, item)?;
                if inner.len() > 255 {
                    return Err(RichTextError::ComponentTooLarge);
                }
                out.push(inner.len() as u8);
                out.extend_from_slice(&inner);
            }
        }
    }
    Ok(())
}

/// Encode a `Component` tree into its binary sub-format.
pub fn encode(component: &Component) -> Result<Vec<u8>, RichTextError> {
    let mut out = Vec::new();
    encode_component(&mut out, component)?;
    Ok(out)
}

fn decode_styles(bytes: &[u8], pos: &mut usize) -> Styles {
    let mut styles = Styles::new();
    if *pos >= bytes.len() {
        return styles;
    }
    let count = bytes[*pos] as usize;
    *pos += 1;
    for _ in 0..count {
        if *pos >= bytes.len() {
            break;
        }
        let id = bytes[*pos];
        *pos += 1;
        if id == STYLE_COLOR {
            let len = bytes[*pos] as usize;
            *pos += 1;
            let color = String::from_utf8_lossy(&bytes[*pos..*pos + len]).into_owned();
            *pos += len;
            styles.insert(id, StyleValue::Color(color));
        } else {
            *pos += 1; // the literal `1` byte
            styles.insert(id, StyleValue::Flag);
        }
    }
    styles
}

/// Decode a `tellraw` binary payload. Returns `None` only if `bytes` is empty;
/// an unrecognized tag decodes to `Component::Raw` of the remaining bytes
/// rather than failing, mirroring the decoder's permissive stance elsewhere.
pub fn decode(bytes: &[u8]) -> Option<Component> {
    if bytes.is_empty() {
        return None;
    }
    let tag = bytes[0];
    let mut pos = 1usize;
    Some(match tag {
        0 => {
            let len = *bytes.get(pos)? as usize;
            pos += 1;
            Component::Raw(bytes.get(pos..pos + len)?.to_vec())
        }
        1 => {
            let name_len = *bytes.get(pos)? as usize;
            pos += 1;
            let name = String::from_utf8_lossy(bytes.get(pos..pos + name_len)?).into_owned();
            pos += name_len;
            let obj_len = *bytes.get(pos)? as usize;
            pos += 1;
            let objective = String::from_utf8_lossy(bytes.get(pos..pos + obj_len)?).into_owned();
            pos += obj_len;
            let styles = decode_styles(bytes, &mut pos);
            Component::Score {
                name,
                objective,
                styles,
            }
        }
        2 => {
            let text_len = *bytes.get(pos)? as usize;
            pos += 1;
            let text = String::from_utf8_lossy(bytes.get(pos..pos + text_len)?).into_owned();
            pos += text_len;
            let styles = decode_styles(bytes, &mut pos);
            Component::Text { text, styles }
        }
        3 => {
            let count = *bytes.get(pos)? as usize;
            pos += 1;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let len = *bytes.get(pos)? as usize;
                pos += 1;
                let inner = bytes.get(pos..pos + len)?;
                pos += len;
                items.push(decode(inner)?);
            }
            Component::Array(items)
        }
        _ => Component::Raw(bytes[1..].to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_component_round_trips() {
        let payload = r#"{"text":"hello","bold":true,"color":"red"}"#;
        let component = parse(payload).unwrap();
        let encoded = encode(&component).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(component, decoded);
        match decoded {
            Component::Text { text, styles } => {
                assert_eq!(text, "hello");
                assert_eq!(styles.get(&STYLE_BOLD), Some(&StyleValue::Flag));
                assert_eq!(
                    styles.get(&STYLE_COLOR),
                    Some(&StyleValue::Color("red".to_string()))
                );
            }
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[test]
    fn white_color_is_the_default_and_not_stored() {
        let component = parse(r#"{"text":"hi","color":"white"}"#).unwrap();
        match component {
            Component::Text { styles, .. } => assert!(!styles.contains_key(&STYLE_COLOR)),
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[test]
    fn score_component_round_trips() {
        let payload = r#"{"score":{"name":"@s","objective":"health"}}"#;
        let component = parse(payload).unwrap();
        let encoded = encode(&component).unwrap();
        assert_eq!(decode(&encoded).unwrap(), component);
    }

    #[test]
    fn array_of_components_round_trips() {
        let payload = r#"[{"text":"a"},{"text":"b","italic":true}]"#;
        let component = parse(payload).unwrap();
        assert!(matches!(component, Component::Array(ref v) if v.len() == 2));
        let encoded = encode(&component).unwrap();
        assert_eq!(decode(&encoded).unwrap(), component);
    }

    #[test]
    fn invalid_json_is_an_error_the_caller_can_fall_back_on() {
        assert!(parse("not json").is_err());
    }

    #[test]
    fn unrecognized_tag_decodes_as_raw() {
        let bytes = vec![9, 1, 2, 3];
        assert_eq!(decode(&bytes), Some(Component::Raw(vec![1, 2, 3])));
    }
}
