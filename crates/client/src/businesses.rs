//! Business match parameters and search filters.

use explorium_engine::MatchDescriptor;
use serde_json::{json, Map, Value};

/// Default look-back for `--events`.
pub const DEFAULT_EVENTS_DAYS: u32 = 45;

/// One `businesses_to_match` entry.
pub fn match_params(d: &MatchDescriptor) -> Value {
    let mut params = Map::new();
    if let Some(name) = &d.name {
        params.insert("name".into(), json!(name));
    }
    if let Some(domain) = &d.domain {
        params.insert("domain".into(), json!(domain));
    }
    if let Some(url) = &d.linkedin_url {
        params.insert("linkedin_url".into(), json!(url));
    }
    Value::Object(params)
}

/// `businesses search` filters. Empty lists are left out of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessFilters {
    pub country: Vec<String>,
    pub size: Vec<String>,
    pub revenue: Vec<String>,
    pub industry: Vec<String>,
    pub tech: Vec<String>,
    pub events: Vec<String>,
    pub events_days: u32,
}

impl Default for BusinessFilters {
    fn default() -> Self {
        Self {
            country: Vec::new(),
            size: Vec::new(),
            revenue: Vec::new(),
            industry: Vec::new(),
            tech: Vec::new(),
            events: Vec::new(),
            events_days: DEFAULT_EVENTS_DAYS,
        }
    }
}

impl BusinessFilters {
    pub fn to_json(&self) -> Value {
        let mut filters = Map::new();
        let lists = [
            ("country_code", &self.country),
            ("company_size", &self.size),
            ("company_revenue", &self.revenue),
            ("linkedin_category", &self.industry),
            ("company_tech_stack_tech", &self.tech),
        ];
        for (key, values) in lists {
            if !values.is_empty() {
                filters.insert(key.into(), json!({ "values": values }));
            }
        }
        if !self.events.is_empty() {
            filters.insert(
                "events".into(),
                json!({ "values": self.events, "last_occurrence": self.events_days }),
            );
        }
        Value::Object(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use explorium_engine::EntityKind;

    #[test]
    fn test_match_params_skip_absent() {
        let mut d = MatchDescriptor::new(EntityKind::Business, 0);
        d.name = Some("Acme".into());
        d.linkedin_url = Some("https://linkedin.com/company/acme".into());
        assert_eq!(
            match_params(&d),
            json!({"name": "Acme", "linkedin_url": "https://linkedin.com/company/acme"})
        );
    }

    #[test]
    fn test_filters_json() {
        let filters = BusinessFilters {
            country: vec!["us".into(), "ca".into()],
            tech: vec!["Salesforce".into()],
            events: vec!["new_funding_round".into()],
            events_days: 30,
            ..Default::default()
        };
        assert_eq!(
            filters.to_json(),
            json!({
                "country_code": {"values": ["us", "ca"]},
                "company_tech_stack_tech": {"values": ["Salesforce"]},
                "events": {"values": ["new_funding_round"], "last_occurrence": 30},
            })
        );
        assert_eq!(BusinessFilters::default().to_json(), json!({}));
    }
}
