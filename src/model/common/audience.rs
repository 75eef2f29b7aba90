use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// The demographic attributes of whoever is looking at a poll or notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub state: Option<String>,
    pub constituency: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl Viewer {
    /// Whole years between the viewer's birth date and `today`, if known.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.birth_date.and_then(|birth| age_on(birth, today))
    }
}

/// Age in completed years on the given day.
/// Returns `None` for a birth date after `today`.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birth_date > today {
        return None;
    }
    let mut years = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// A demographic restriction on who sees a poll or notification.
///
/// Each non-empty sub-filter must be satisfied; within a set, any member
/// matches. A filter with nothing set restricts nobody.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFilter {
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub states: HashSet<String>,
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub constituencies: HashSet<String>,
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub genders: HashSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_min: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_max: Option<i32>,
}

impl TargetFilter {
    /// Does this filter impose no restriction at all?
    pub fn is_unrestricted(&self) -> bool {
        self.states.is_empty()
            && self.constituencies.is_empty()
            && self.genders.is_empty()
            && self.age_min.is_none()
            && self.age_max.is_none()
    }

    /// Is the viewer inside this filter's audience on the given day?
    pub fn admits(&self, viewer: &Viewer, today: NaiveDate) -> bool {
        if !set_admits(&self.states, viewer.state.as_deref())
            || !set_admits(&self.constituencies, viewer.constituency.as_deref())
            || !set_admits(&self.genders, viewer.gender.as_deref())
        {
            return false;
        }

        if self.age_min.is_none() && self.age_max.is_none() {
            return true;
        }
        match viewer.age_on(today) {
            Some(age) => {
                let age = i64::from(age);
                self.age_min.map_or(true, |min| age >= i64::from(min))
                    && self.age_max.map_or(true, |max| age <= i64::from(max))
            }
            None => false,
        }
    }
}

/// An empty set admits everyone; otherwise the value must be present and listed.
fn set_admits(set: &HashSet<String>, value: Option<&str>) -> bool {
    set.is_empty() || value.map_or(false, |value| set.contains(value))
}

/// Decide whether `viewer` belongs to the audience described by `filter`.
/// An absent filter matches everyone.
pub fn matches(viewer: &Viewer, filter: Option<&TargetFilter>, today: NaiveDate) -> bool {
    filter.map_or(true, |filter| filter.admits(viewer, today))
}
