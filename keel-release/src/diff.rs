//! Dry-run diff support for `keel diff`.

use keel_core::{ReleaseRecord, ReleaseSpec, Revision};
use serde::Serialize;
use similar::TextDiff;

use crate::error::ReleaseError;
use crate::reconcile::Plan;

/// What an upgrade to a new description would change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseDiff {
    /// Latest recorded revision the diff is taken against, if any.
    pub base_revision: Option<Revision>,
    pub plan: Plan,
    /// Unified diff of the recorded spec against the new one, as YAML.
    /// Empty when they are identical.
    pub unified_diff: String,
}

impl ReleaseDiff {
    pub fn is_empty(&self) -> bool {
        self.plan.is_empty() && self.unified_diff.is_empty()
    }
}

/// Unified diff of `base`'s spec against `desired`. An absent base diffs
/// against an empty document.
pub(crate) fn spec_diff(
    base: Option<&ReleaseRecord>,
    desired: &ReleaseSpec,
) -> Result<String, ReleaseError> {
    let old = match base {
        Some(record) => serde_yaml::to_string(&record.spec)?,
        None => String::new(),
    };
    let new = serde_yaml::to_string(desired)?;
    if old == new {
        return Ok(String::new());
    }

    let old_header = match base {
        Some(record) => format!("a/{}@{}", record.spec.name, record.revision),
        None => "/dev/null".to_string(),
    };
    let new_header = format!("b/{}", desired.name);
    Ok(TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string())
}

#[cfg(test)]
mod tests {
    use keel_core::{ComponentSpec, ReleaseStatus};

    use super::*;

    fn record(spec: ReleaseSpec) -> ReleaseRecord {
        ReleaseRecord::new(spec, Revision(2), ReleaseStatus::Applied, "Upgrade complete")
    }

    fn spec(image: &str) -> ReleaseSpec {
        ReleaseSpec::new("webapp", vec![ComponentSpec::new("frontend", image, 2)])
    }

    #[test]
    fn identical_specs_have_empty_diff() {
        let diff = spec_diff(Some(&record(spec("web:1"))), &spec("web:1")).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn image_change_shows_up_as_line_change() {
        let diff = spec_diff(Some(&record(spec("web:1"))), &spec("web:2")).unwrap();
        assert!(diff.contains("--- a/webapp@2"), "{diff}");
        assert!(diff.contains("+++ b/webapp"), "{diff}");
        assert!(diff.contains("-  image: web:1"), "{diff}");
        assert!(diff.contains("+  image: web:2"), "{diff}");
    }

    #[test]
    fn new_release_diffs_against_nothing() {
        let diff = spec_diff(None, &spec("web:1")).unwrap();
        assert!(diff.contains("--- /dev/null"));
        assert!(diff.contains("+name: webapp"));
    }
}
