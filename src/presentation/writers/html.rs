use sailfish::TemplateOnce;

use crate::domain::compare::CompareResult;
use crate::domain::error::ScanError;
use crate::domain::ports::OutputWriter;

#[derive(TemplateOnce)]
#[template(path = "compare.stpl")] // base dir declared inside sailfish.toml
struct CompareTemplate<'a> {
    result: &'a CompareResult,
}

pub struct HtmlWriter;

impl OutputWriter for HtmlWriter {
    fn format(&self, result: &CompareResult) -> Result<String, ScanError> {
        CompareTemplate { result }
            .render_once()
            .map_err(|e| ScanError::Invariant(e.to_string()))
    }

    fn extension(&self) -> &'static str {
        "html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compare::{CompareItem, CompareStatus};
    use crate::domain::programmable_object::ObjectKind;

    #[test]
    fn renders_without_error() {
        let result = CompareResult {
            items: vec![CompareItem {
                full_name: "dbo.A".into(),
                kind: ObjectKind::Procedure,
                status: CompareStatus::Modified,
                source_hash: Some("h1".into()),
                target_hash: Some("h2".into()),
            }],
        };
        let html = HtmlWriter.format(&result).unwrap();
        assert!(html.contains("dbo.A"));
    }
}
