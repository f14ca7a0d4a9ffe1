// entity.rs — entity lump text: parsing, editing and serialization

use crate::error::BspError;
use hlmerge_common::Vec3;

/// One entity: an ordered list of key/value pairs. Duplicate keys are
/// preserved (multi_manager relies on them).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub keyvalues: Vec<(String, String)>,
    /// Name of the source map this entity came from. Set during a merge,
    /// never serialized.
    pub source_map: String,
}

impl Entity {
    pub fn new(classname: &str) -> Self {
        Self {
            keyvalues: vec![("classname".to_string(), classname.to_string())],
            source_map: String::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.keyvalues
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the first occurrence of `key`, or appends a new pair.
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(kv) = self.keyvalues.iter_mut().find(|(k, _)| k == key) {
            kv.1 = value.to_string();
        } else {
            self.keyvalues.push((key.to_string(), value.to_string()));
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.keyvalues.len();
        self.keyvalues.retain(|(k, _)| k != key);
        self.keyvalues.len() != before
    }

    pub fn classname(&self) -> &str {
        self.get("classname").unwrap_or("")
    }

    pub fn targetname(&self) -> Option<&str> {
        self.get("targetname").filter(|v| !v.is_empty())
    }

    /// Brush-model reference, e.g. `"model" "*7"` -> `Some(7)`.
    pub fn model_ref(&self) -> Option<usize> {
        let v = self.get("model")?;
        v.strip_prefix('*')?.parse().ok()
    }

    pub fn set_model_ref(&mut self, index: usize) {
        self.set("model", &format!("*{index}"));
    }

    pub fn origin(&self) -> Option<Vec3> {
        let v = self.get("origin")?;
        let mut it = v.split_ascii_whitespace();
        let x = it.next()?.parse().ok()?;
        let y = it.next()?.parse().ok()?;
        let z = it.next()?.parse().ok()?;
        Some([x, y, z])
    }

    pub fn set_origin(&mut self, origin: &Vec3) {
        self.set(
            "origin",
            &format!("{} {} {}", origin[0], origin[1], origin[2]),
        );
    }
}

// ============================================================
// Parsing
// ============================================================

/// Parse the entity lump text into entities. Tolerates trailing garbage
/// (including the customary NUL terminator) after the final `}`.
pub fn parse_entities(text: &str) -> Result<Vec<Entity>, BspError> {
    let bytes = text.as_bytes();
    let mut ents = Vec::new();
    let mut pos = 0usize;

    loop {
        skip_whitespace(bytes, &mut pos);
        if pos >= bytes.len() || bytes[pos] == 0 {
            break;
        }
        if bytes[pos] != b'{' {
            return Err(BspError::EntityParse("expected '{'", pos));
        }
        pos += 1;

        let mut ent = Entity::default();
        loop {
            skip_whitespace(bytes, &mut pos);
            if pos >= bytes.len() {
                return Err(BspError::EntityParse("unterminated entity", pos));
            }
            if bytes[pos] == b'}' {
                pos += 1;
                break;
            }
            let key = parse_quoted(bytes, &mut pos)?;
            skip_whitespace(bytes, &mut pos);
            let value = parse_quoted(bytes, &mut pos)?;
            ent.keyvalues.push((key, value));
        }
        ents.push(ent);
    }

    Ok(ents)
}

fn skip_whitespace(bytes: &[u8], pos: &mut usize) {
    while *pos < bytes.len() && bytes[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
}

fn parse_quoted(bytes: &[u8], pos: &mut usize) -> Result<String, BspError> {
    if *pos >= bytes.len() || bytes[*pos] != b'"' {
        return Err(BspError::EntityParse("expected quoted token", *pos));
    }
    *pos += 1;
    let start = *pos;
    while *pos < bytes.len() && bytes[*pos] != b'"' {
        *pos += 1;
    }
    if *pos >= bytes.len() {
        return Err(BspError::EntityParse("unterminated quoted token", start));
    }
    let s = String::from_utf8_lossy(&bytes[start..*pos]).into_owned();
    *pos += 1;
    Ok(s)
}

// ============================================================
// Serialization
// ============================================================

pub fn serialize_entities(ents: &[Entity]) -> String {
    let mut out = String::new();
    for ent in ents {
        out.push_str("{\n");
        for (k, v) in &ent.keyvalues {
            out.push('"');
            out.push_str(k);
            out.push_str("\" \"");
            out.push_str(v);
            out.push_str("\"\n");
        }
        out.push_str("}\n");
    }
    out
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "{\n\"classname\" \"worldspawn\"\n\"wad\" \"halflife.wad\"\n}\n{\n\"classname\" \"func_door\"\n\"model\" \"*2\"\n\"targetname\" \"door1\"\n\"origin\" \"10 -20 30.5\"\n}\n\0";

    #[test]
    fn parse_two_entities() {
        let ents = parse_entities(SAMPLE).unwrap();
        assert_eq!(ents.len(), 2);
        assert_eq!(ents[0].classname(), "worldspawn");
        assert_eq!(ents[1].classname(), "func_door");
        assert_eq!(ents[1].targetname(), Some("door1"));
        assert_eq!(ents[1].model_ref(), Some(2));
        assert_eq!(ents[1].origin(), Some([10.0, -20.0, 30.5]));
    }

    #[test]
    fn parse_rejects_unterminated_entity() {
        assert!(parse_entities("{\n\"classname\" \"worldspawn\"\n").is_err());
    }

    #[test]
    fn parse_rejects_bare_token() {
        assert!(parse_entities("{ classname }").is_err());
    }

    #[test]
    fn round_trip() {
        let ents = parse_entities(SAMPLE).unwrap();
        let text = serialize_entities(&ents);
        let again = parse_entities(&text).unwrap();
        assert_eq!(ents, again);
    }

    #[test]
    fn set_replaces_first_occurrence() {
        let mut ent = Entity::new("light");
        ent.set("style", "33");
        ent.set("style", "40");
        assert_eq!(ent.get("style"), Some("40"));
        assert_eq!(
            ent.keyvalues.iter().filter(|(k, _)| k == "style").count(),
            1
        );
    }

    #[test]
    fn duplicate_keys_preserved() {
        let text = "{\n\"classname\" \"multi_manager\"\n\"door1\" \"0\"\n\"door1\" \"2.5\"\n}\n";
        let ents = parse_entities(text).unwrap();
        assert_eq!(ents[0].keyvalues.len(), 3);
        let again = parse_entities(&serialize_entities(&ents)).unwrap();
        assert_eq!(ents, again);
    }

    #[test]
    fn model_ref_requires_star_prefix() {
        let mut ent = Entity::new("func_wall");
        ent.set("model", "models/can.mdl");
        assert_eq!(ent.model_ref(), None);
        ent.set_model_ref(12);
        assert_eq!(ent.model_ref(), Some(12));
    }
}
