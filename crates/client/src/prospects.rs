//! Prospect match parameters and search filters.

use explorium_engine::MatchDescriptor;
use serde_json::{json, Map, Value};

/// One `prospects_to_match` entry.
///
/// The person name is sent only alongside a company, or when there is no
/// email or LinkedIn URL to match on; a bare name next to a strong
/// identifier tends to pull in the wrong person.
pub fn match_params(d: &MatchDescriptor) -> Value {
    let mut params = Map::new();
    if d.company_name.is_some() || !d.has_strong_identifier() {
        if let Some(name) = d.person_name() {
            params.insert("full_name".into(), json!(name));
        }
    }
    if let Some(email) = &d.email {
        params.insert("email".into(), json!(email));
    }
    if let Some(url) = &d.linkedin_url {
        params.insert("linkedin".into(), json!(url));
    }
    if let Some(company) = &d.company_name {
        params.insert("company_name".into(), json!(company));
    }
    Value::Object(params)
}

/// Inclusive month range; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthRange {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl MonthRange {
    fn to_json(self) -> Option<Value> {
        if self.min.is_none() && self.max.is_none() {
            return None;
        }
        let mut range = Map::new();
        range.insert("type".into(), json!("range"));
        if let Some(min) = self.min {
            range.insert("gte".into(), json!(min));
        }
        if let Some(max) = self.max {
            range.insert("lte".into(), json!(max));
        }
        Some(Value::Object(range))
    }
}

/// `prospects search` filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProspectFilters {
    pub business_ids: Vec<String>,
    pub job_level: Vec<String>,
    pub department: Vec<String>,
    pub job_title: Option<String>,
    pub country: Vec<String>,
    pub has_email: bool,
    pub has_phone: bool,
    pub experience: MonthRange,
    pub role_tenure: MonthRange,
}

impl ProspectFilters {
    pub fn to_json(&self) -> Value {
        let mut filters = Map::new();
        let lists = [
            ("business_id", &self.business_ids),
            ("job_level", &self.job_level),
            ("job_department", &self.department),
            ("country_code", &self.country),
        ];
        for (key, values) in lists {
            if !values.is_empty() {
                filters.insert(key.into(), json!({ "type": "includes", "values": values }));
            }
        }
        if let Some(title) = &self.job_title {
            filters.insert(
                "job_title".into(),
                json!({ "type": "any_match_phrase", "values": [title], "include_related_job_titles": true }),
            );
        }
        if self.has_email {
            filters.insert("has_email".into(), json!({ "type": "exists", "value": true }));
        }
        if self.has_phone {
            filters.insert("has_phone_number".into(), json!({ "type": "exists", "value": true }));
        }
        if let Some(range) = self.experience.to_json() {
            filters.insert("total_experience_months".into(), range);
        }
        if let Some(range) = self.role_tenure.to_json() {
            filters.insert("current_role_months".into(), range);
        }
        Value::Object(filters)
    }

    /// Filters for one company of a fan-out search: the shared filters with
    /// the business list replaced by `business_id`.
    pub fn for_business(&self, business_id: &str) -> Value {
        let mut filters = Self { business_ids: Vec::new(), ..self.clone() }.to_json();
        filters["business_id"] = json!({ "values": [business_id] });
        filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use explorium_engine::EntityKind;

    fn prospect() -> MatchDescriptor {
        let mut d = MatchDescriptor::new(EntityKind::Prospect, 0);
        d.first_name = Some("Jane".into());
        d.last_name = Some("Doe".into());
        d
    }

    #[test]
    fn test_name_dropped_next_to_strong_identifier() {
        let mut d = prospect();
        d.linkedin_url = Some("https://linkedin.com/in/jane".into());
        assert_eq!(match_params(&d), json!({"linkedin": "https://linkedin.com/in/jane"}));
    }

    #[test]
    fn test_name_kept_with_company() {
        let mut d = prospect();
        d.email = Some("jane@acme.com".into());
        d.company_name = Some("Acme".into());
        assert_eq!(
            match_params(&d),
            json!({"full_name": "Jane Doe", "email": "jane@acme.com", "company_name": "Acme"})
        );
    }

    #[test]
    fn test_filters_json() {
        let filters = ProspectFilters {
            business_ids: vec!["b1".into(), "b2".into()],
            job_level: vec!["cxo".into()],
            job_title: Some("engineer".into()),
            has_email: true,
            experience: MonthRange { min: Some(24), max: None },
            ..Default::default()
        };
        assert_eq!(
            filters.to_json(),
            json!({
                "business_id": {"type": "includes", "values": ["b1", "b2"]},
                "job_level": {"type": "includes", "values": ["cxo"]},
                "job_title": {"type": "any_match_phrase", "values": ["engineer"], "include_related_job_titles": true},
                "has_email": {"type": "exists", "value": true},
                "total_experience_months": {"type": "range", "gte": 24},
            })
        );
    }

    #[test]
    fn test_for_business_replaces_list() {
        let filters = ProspectFilters {
            business_ids: vec!["b1".into(), "b2".into()],
            has_phone: true,
            ..Default::default()
        };
        assert_eq!(
            filters.for_business("b2"),
            json!({
                "has_phone_number": {"type": "exists", "value": true},
                "business_id": {"values": ["b2"]},
            })
        );
    }
}
