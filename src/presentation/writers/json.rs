use crate::domain::compare::CompareResult;
use crate::domain::error::ScanError;
use crate::domain::ports::OutputWriter;

pub struct JsonWriter;

impl OutputWriter for JsonWriter {
    fn format(&self, result: &CompareResult) -> Result<String, ScanError> {
        serde_json::to_string_pretty(result).map_err(|e| ScanError::Invariant(e.to_string()))
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compare::{CompareItem, CompareStatus};
    use crate::domain::programmable_object::ObjectKind;

    #[test]
    fn formats_valid_json() {
        let result = CompareResult {
            items: vec![CompareItem {
                full_name: "dbo.A".into(),
                kind: ObjectKind::Procedure,
                status: CompareStatus::Equal,
                source_hash: Some("h1".into()),
                target_hash: Some("h1".into()),
            }],
        };
        let out = JsonWriter.format(&result).unwrap();
        assert!(out.contains("\"full_name\": \"dbo.A\""));
    }
}
