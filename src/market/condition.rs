use serde::{Deserialize, Serialize};

/// Normalized tri-state item condition used to segment price statistics.
///
/// Marketplace APIs report condition two ways (free-text label, numeric
/// condition id); both collapse onto this enum so scoring stays
/// encoding-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionBucket {
    New,
    Used,
    ForParts,
}

/// Free-text labels with a known bucket. Anything else defaults to `Used`.
const LABEL_TABLE: &[(&str, ConditionBucket)] = &[
    ("new", ConditionBucket::New),
    ("brand new", ConditionBucket::New),
    ("new with tags", ConditionBucket::New),
    ("new without tags", ConditionBucket::New),
    ("new other", ConditionBucket::New),
    ("new other (see details)", ConditionBucket::New),
    ("open box", ConditionBucket::New),
    ("like new", ConditionBucket::Used),
    ("used", ConditionBucket::Used),
    ("pre-owned", ConditionBucket::Used),
    ("very good", ConditionBucket::Used),
    ("good", ConditionBucket::Used),
    ("acceptable", ConditionBucket::Used),
    ("seller refurbished", ConditionBucket::Used),
    ("certified refurbished", ConditionBucket::Used),
    ("certified - refurbished", ConditionBucket::Used),
    ("for parts or not working", ConditionBucket::ForParts),
    ("for parts", ConditionBucket::ForParts),
    ("not working", ConditionBucket::ForParts),
];

/// eBay condition ids: 1000 = New, 1500 = New other; 7000 = For parts.
const MAX_NEW_CONDITION_ID: u32 = 1500;
const FOR_PARTS_CONDITION_ID: u32 = 7000;

impl ConditionBucket {
    pub fn from_label(label: &str) -> Self {
        let needle = label.trim().to_lowercase();
        LABEL_TABLE
            .iter()
            .find(|(key, _)| *key == needle)
            .map(|(_, bucket)| *bucket)
            .unwrap_or(Self::Used)
    }

    pub fn from_condition_id(id: u32) -> Self {
        if id <= MAX_NEW_CONDITION_ID {
            Self::New
        } else if id == FOR_PARTS_CONDITION_ID {
            Self::ForParts
        } else {
            Self::Used
        }
    }

    /// Resolve from whatever the marketplace row carried: a parseable numeric
    /// id wins, then the label, then the `Used` default.
    pub fn resolve(condition_id: Option<&str>, label: Option<&str>) -> Self {
        if let Some(id) = condition_id.and_then(|value| value.trim().parse::<u32>().ok()) {
            return Self::from_condition_id(id);
        }
        label.map(Self::from_label).unwrap_or(Self::Used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_and_numeric_encodings_agree_on_parts() {
        assert_eq!(
            ConditionBucket::from_label("For parts or not working"),
            ConditionBucket::ForParts
        );
        assert_eq!(
            ConditionBucket::from_condition_id(7000),
            ConditionBucket::ForParts
        );
    }

    #[test]
    fn unrecognized_label_defaults_to_used() {
        assert_eq!(ConditionBucket::from_label("Mint"), ConditionBucket::Used);
        assert_eq!(ConditionBucket::from_label(""), ConditionBucket::Used);
    }

    #[test]
    fn label_lookup_ignores_case_and_padding() {
        assert_eq!(
            ConditionBucket::from_label("  Brand New "),
            ConditionBucket::New
        );
        assert_eq!(
            ConditionBucket::from_label("LIKE NEW"),
            ConditionBucket::Used
        );
    }

    #[test]
    fn numeric_thresholds() {
        assert_eq!(
            ConditionBucket::from_condition_id(1000),
            ConditionBucket::New
        );
        assert_eq!(
            ConditionBucket::from_condition_id(1500),
            ConditionBucket::New
        );
        assert_eq!(
            ConditionBucket::from_condition_id(2750),
            ConditionBucket::Used
        );
        assert_eq!(
            ConditionBucket::from_condition_id(3000),
            ConditionBucket::Used
        );
    }

    #[test]
    fn resolve_prefers_numeric_id() {
        assert_eq!(
            ConditionBucket::resolve(Some("7000"), Some("Like New")),
            ConditionBucket::ForParts
        );
        assert_eq!(
            ConditionBucket::resolve(Some("not-a-number"), Some("New")),
            ConditionBucket::New
        );
        assert_eq!(ConditionBucket::resolve(None, None), ConditionBucket::Used);
    }
}
