use serde::Deserialize;

use crate::kuma::Monitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameFilter {
    Contains,
    StartsWith,
    EndsWith,
    /// Unknown modes (including `"none"`) leave the name unconstrained.
    #[serde(other)]
    None,
}

/// Selection criteria for delete-by-filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub name_filter: Option<NameFilter>,
    #[serde(default)]
    pub name_keyword: String,
    #[serde(default)]
    pub type_filter: Option<String>,
}

impl FilterSpec {
    /// A monitor matches when it passes every active predicate. The name
    /// predicate is active only when both the mode and a non-empty keyword are
    /// given; the type predicate is active unless it is empty or `all`.
    pub fn matches(&self, monitor: &Monitor) -> bool {
        self.name_matches(&monitor.name) && self.type_matches(&monitor.monitor_type)
    }

    pub fn select<'a>(&self, monitors: &'a [Monitor]) -> Vec<&'a Monitor> {
        monitors.iter().filter(|m| self.matches(m)).collect()
    }

    fn name_matches(&self, name: &str) -> bool {
        let Some(mode) = self.name_filter else {
            return true;
        };
        if self.name_keyword.is_empty() {
            return true;
        }
        let keyword = self.name_keyword.to_lowercase();
        let name = name.to_lowercase();
        match mode {
            NameFilter::Contains => name.contains(&keyword),
            NameFilter::StartsWith => name.starts_with(&keyword),
            NameFilter::EndsWith => name.ends_with(&keyword),
            NameFilter::None => true,
        }
    }

    fn type_matches(&self, monitor_type: &str) -> bool {
        match self.type_filter.as_deref() {
            None | Some("") | Some("all") => true,
            Some(wanted) => monitor_type == wanted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn monitors() -> Vec<Monitor> {
        vec![
            Monitor::new(1, "DB-Prod", "port"),
            Monitor::new(2, "api", "http"),
            Monitor::new(3, "db-backup", "ping"),
        ]
    }

    fn parse_filter(value: serde_json::Value) -> FilterSpec {
        serde_json::from_value(value).unwrap()
    }

    fn ids(filter: &FilterSpec) -> Vec<i64> {
        filter.select(&monitors()).iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let filter = parse_filter(json!({"name_filter": "contains", "name_keyword": "db"}));
        let two = vec![Monitor::new(1, "DB-Prod", "port"), Monitor::new(2, "api", "http")];
        let matched: Vec<_> = filter.select(&two).iter().map(|m| m.name.clone()).collect();
        assert_eq!(matched, vec!["DB-Prod"]);
    }

    #[test]
    fn test_starts_and_ends_with() {
        assert_eq!(
            ids(&parse_filter(json!({"name_filter": "starts_with", "name_keyword": "DB"}))),
            vec![1, 3]
        );
        assert_eq!(
            ids(&parse_filter(json!({"name_filter": "ends_with", "name_keyword": "PROD"}))),
            vec![1]
        );
    }

    #[test]
    fn test_type_all_matches_everything() {
        assert_eq!(ids(&parse_filter(json!({"type_filter": "all"}))), vec![1, 2, 3]);
        assert_eq!(ids(&parse_filter(json!({}))), vec![1, 2, 3]);
        assert_eq!(ids(&parse_filter(json!({"type_filter": ""}))), vec![1, 2, 3]);
    }

    #[test]
    fn test_type_is_exact_match() {
        assert_eq!(ids(&parse_filter(json!({"type_filter": "ping"}))), vec![3]);
        assert!(ids(&parse_filter(json!({"type_filter": "PING"}))).is_empty());
    }

    #[test]
    fn test_name_predicate_needs_mode_and_keyword() {
        assert_eq!(ids(&parse_filter(json!({"name_keyword": "api"}))), vec![1, 2, 3]);
        assert_eq!(ids(&parse_filter(json!({"name_filter": "contains"}))), vec![1, 2, 3]);
        assert_eq!(
            ids(&parse_filter(json!({"name_filter": "none", "name_keyword": "api"}))),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_predicates_combine() {
        let filter = parse_filter(json!({
            "name_filter": "contains",
            "name_keyword": "db",
            "type_filter": "ping"
        }));
        assert_eq!(ids(&filter), vec![3]);
    }
}
