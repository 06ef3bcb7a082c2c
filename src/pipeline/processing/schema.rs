use std::collections::BTreeSet;
use tracing::{info, instrument};

use crate::domain::{RawRecordSet, Schema};
use crate::error::{PipelineError, Result};

/// Check that the raw columns are exactly the schema's columns.
///
/// Column order is not compared. Any difference aborts with both the
/// missing and the extra names.
#[instrument(skip_all, fields(columns = records.columns().len(), expected = schema.len()))]
pub fn validate(records: &RawRecordSet, schema: &Schema) -> Result<()> {
    let actual: BTreeSet<&str> = records.columns().iter().map(String::as_str).collect();
    let expected: BTreeSet<&str> = schema.columns().iter().map(String::as_str).collect();

    let missing: BTreeSet<String> = expected.difference(&actual).map(|s| s.to_string()).collect();
    let extra: BTreeSet<String> = actual.difference(&expected).map(|s| s.to_string()).collect();

    if missing.is_empty() && extra.is_empty() {
        info!("Columns are valid and match the expected structure");
        Ok(())
    } else {
        Err(PipelineError::SchemaMismatch { missing, extra })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(cols: &[&str]) -> RawRecordSet {
        RawRecordSet::new(cols.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn same_columns_in_any_order_pass() {
        let schema = Schema::new(["a", "b", "c"]).unwrap();
        assert!(validate(&records(&["c", "a", "b"]), &schema).is_ok());
    }

    #[test]
    fn mismatch_reports_both_sides() {
        let schema = Schema::new(["a", "b", "c"]).unwrap();
        match validate(&records(&["a", "c", "d", "e"]), &schema) {
            Err(PipelineError::SchemaMismatch { missing, extra }) => {
                assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["b"]);
                assert_eq!(extra.into_iter().collect::<Vec<_>>(), vec!["d", "e"]);
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn only_missing_or_only_extra_still_fails() {
        let schema = Schema::new(["a", "b"]).unwrap();
        assert!(validate(&records(&["a"]), &schema).is_err());
        assert!(validate(&records(&["a", "b", "z"]), &schema).is_err());
    }
}
