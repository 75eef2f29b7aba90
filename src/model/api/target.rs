use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::common::audience::TargetFilter;

/// Check a target filter supplied by an admin before it is stored.
///
/// The matcher itself tolerates anything; this only catches filters that
/// could never have been meant, such as an inverted age range.
pub fn validate_target(target: &TargetFilter) -> Result<()> {
    for (name, bound) in [("age_min", target.age_min), ("age_max", target.age_max)] {
        if matches!(bound, Some(bound) if bound < 0) {
            return Err(Error::bad_request(format!("Target {name} must not be negative")));
        }
    }
    if let (Some(min), Some(max)) = (target.age_min, target.age_max) {
        if min > max {
            return Err(Error::bad_request(format!(
                "Target age_min {min} is greater than age_max {max}"
            )));
        }
    }
    for (name, set) in [
        ("states", &target.states),
        ("constituencies", &target.constituencies),
        ("genders", &target.genders),
    ] {
        if has_blank(set) {
            return Err(Error::bad_request(format!("Target {name} contains a blank entry")));
        }
    }
    Ok(())
}

fn has_blank(set: &HashSet<String>) -> bool {
    set.iter().any(|value| value.trim().is_empty())
}

/// Drop a filter that restricts nobody, so it is stored as absent.
pub fn normalise_target(target: Option<TargetFilter>) -> Option<TargetFilter> {
    target.filter(|target| !target.is_unrestricted())
}
