use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Kind of a programmable object, stored everywhere else as its short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ObjectKind {
    Procedure,
    View,
    ScalarFunction,
    TableFunction,
    InlineFunction,
}

impl ObjectKind {
    pub fn code(&self) -> &'static str {
        match self {
            ObjectKind::Procedure => "P",
            ObjectKind::View => "V",
            ObjectKind::ScalarFunction => "FN",
            ObjectKind::TableFunction => "TF",
            ObjectKind::InlineFunction => "IF",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "P" => Some(ObjectKind::Procedure),
            "V" => Some(ObjectKind::View),
            "FN" => Some(ObjectKind::ScalarFunction),
            "TF" => Some(ObjectKind::TableFunction),
            "IF" => Some(ObjectKind::InlineFunction),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// An object as read straight off a target's catalog; never persisted as-is.
#[derive(Debug, Clone)]
pub struct ProgrammableObject {
    pub schema: String,
    pub name: String,
    pub kind: ObjectKind,
    pub definition: String,
    pub last_modified: DateTime<Utc>,
}

impl ProgrammableObject {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    pub fn normalized_definition(&self) -> String {
        normalize_definition(&self.definition)
    }

    pub fn definition_hash(&self) -> String {
        definition_hash(&self.normalized_definition())
    }
}

/// Line-by-line right-trim, CRLF/CR → LF, drop blank-only lines, join with LF
///. Idempotent: `normalize_definition(normalize_definition(s)) ==
/// normalize_definition(s)` for all `s`.
pub fn normalize_definition(definition: &str) -> String {
    let unified = definition.replace("\r\n", "\n").replace('\r', "\n");
    unified
        .lines()
        .map(|line| line.trim_end())
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hex SHA-256 of the UTF-8 bytes of an already-normalized definition. The
/// canonical equality key for two versions of an object.
pub fn definition_hash(normalized_definition: &str) -> String {
    let digest = Sha256::digest(normalized_definition.as_bytes());
    format!("{:x}", digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(schema: &str, name: &str, definition: &str) -> ProgrammableObject {
        ProgrammableObject {
            schema: schema.into(),
            name: name.into(),
            kind: ObjectKind::Procedure,
            definition: definition.into(),
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn full_name_joins_schema_and_name() {
        assert_eq!(obj("dbo", "GetOrders", "x").full_name(), "dbo.GetOrders");
    }

    #[test]
    fn normalize_is_idempotent() {
        let s = "line1\r\n  line2  \r\n\r\n   \r\nline3\n";
        let once = normalize_definition(s);
        let twice = normalize_definition(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_drops_blank_lines_and_right_trims() {
        let s = "CREATE PROC p\r\nAS\r\n   \r\nSELECT 1   \r\n";
        assert_eq!(normalize_definition(s), "CREATE PROC p\nAS\nSELECT 1");
    }

    #[test]
    fn definition_hash_depends_only_on_normalized_form() {
        let a = obj("dbo", "p", "SELECT 1  \r\n");
        let b = obj("dbo", "p", "SELECT 1\n\n");
        assert_eq!(a.definition_hash(), b.definition_hash());
    }

    #[test]
    fn empty_definition_objects_hash_equal() {
        let a = obj("dbo", "v1", "");
        let b = obj("dbo", "v2", "");
        assert_eq!(a.definition_hash(), b.definition_hash());
    }

    #[test]
    fn different_definitions_hash_differently() {
        let a = obj("dbo", "p", "SELECT 1");
        let b = obj("dbo", "p", "SELECT 2");
        assert_ne!(a.definition_hash(), b.definition_hash());
    }

    #[test]
    fn kind_code_round_trips() {
        for kind in [
            ObjectKind::Procedure,
            ObjectKind::View,
            ObjectKind::ScalarFunction,
            ObjectKind::TableFunction,
            ObjectKind::InlineFunction,
        ] {
            assert_eq!(ObjectKind::from_code(kind.code()), Some(kind));
        }
    }
}
