//! Enrichment type names accepted by `--types`, and their endpoints.

use crate::client::ClientError;

/// One `--types` entry: the name users type and the endpoint segment it
/// maps to under `/businesses/` or `/prospects/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichType {
    pub name: &'static str,
    pub endpoint: &'static str,
}

const fn t(name: &'static str, endpoint: &'static str) -> EnrichType {
    EnrichType { name, endpoint }
}

pub const BUSINESS_TYPES: &[EnrichType] = &[
    t("firmographics", "firmographics"),
    t("technographics", "technographics"),
    t("financial", "financial_indicators"),
    t("funding", "funding_and_acquisition"),
    t("workforce", "workforce_trends"),
    t("traffic", "website_traffic"),
    t("social", "linkedin_posts"),
    t("ratings", "company_ratings_by_employees"),
    t("challenges", "pc_business_challenges_10k"),
    t("competitive", "pc_competitive_landscape_10k"),
    t("strategic", "pc_strategy_10k"),
    t("website-changes", "website_changes"),
    t("webstack", "webstack"),
    t("hierarchy", "company_hierarchies"),
    t("intent", "bombora_intent"),
];

pub const PROSPECT_TYPES: &[EnrichType] = &[
    t("contacts", "contacts_information"),
    t("profile", "profiles"),
    t("social", "linkedin_posts"),
];

pub const DEFAULT_BUSINESS_TYPE: &str = "firmographics";
pub const DEFAULT_PROSPECT_TYPE: &str = "contacts";

pub fn lookup(table: &[EnrichType], name: &str) -> Option<EnrichType> {
    table.iter().copied().find(|t| t.name == name)
}

/// Parse a comma-separated `--types` value against `table`.
///
/// Names are trimmed and lowercased, duplicates dropped, and `all` expands
/// to every entry. A blank value yields `default`.
pub fn parse_types(
    table: &[EnrichType],
    value: &str,
    default: &str,
) -> Result<Vec<String>, ClientError> {
    let mut out: Vec<String> = Vec::new();
    for raw in value.split(',') {
        let name = raw.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        let names: Vec<&str> = if name == "all" {
            table.iter().map(|t| t.name).collect()
        } else if let Some(t) = lookup(table, &name) {
            vec![t.name]
        } else {
            return Err(ClientError::UnknownType {
                name,
                valid: table.iter().map(|t| t.name).collect::<Vec<_>>().join(", "),
            });
        };
        for n in names {
            if !out.iter().any(|o| o == n) {
                out.push(n.to_string());
            }
        }
    }
    if out.is_empty() {
        out.push(default.to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_types_normalizes() {
        let types = parse_types(BUSINESS_TYPES, " Funding, firmographics,funding ", "x").unwrap();
        assert_eq!(types, vec!["funding", "firmographics"]);
    }

    #[test]
    fn test_parse_types_all_and_default() {
        assert_eq!(
            parse_types(PROSPECT_TYPES, "all", DEFAULT_PROSPECT_TYPE).unwrap(),
            vec!["contacts", "profile", "social"]
        );
        assert_eq!(
            parse_types(PROSPECT_TYPES, "", DEFAULT_PROSPECT_TYPE).unwrap(),
            vec!["contacts"]
        );
    }

    #[test]
    fn test_parse_types_unknown() {
        let err = parse_types(PROSPECT_TYPES, "contacts,phones", "contacts").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown enrichment type 'phones' (valid: contacts, profile, social)"
        );
    }

    #[test]
    fn test_business_endpoints() {
        assert_eq!(lookup(BUSINESS_TYPES, "financial").unwrap().endpoint, "financial_indicators");
        assert_eq!(lookup(BUSINESS_TYPES, "intent").unwrap().endpoint, "bombora_intent");
        assert!(lookup(BUSINESS_TYPES, "contacts").is_none());
        assert_eq!(lookup(PROSPECT_TYPES, "social").unwrap().endpoint, "linkedin_posts");
    }
}
