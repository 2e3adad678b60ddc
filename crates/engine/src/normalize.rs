//! Descriptor normalizer.
//!
//! Maps heterogeneous column names onto canonical match fields through a
//! static alias table. Lookup is case-insensitive after trimming and the
//! first column matching a canonical field wins.

use crate::error::NormalizeError;
use crate::model::{EntityKind, MatchDescriptor, RawRow};

struct FieldAliases {
    canonical: &'static str,
    aliases: &'static [&'static str],
}

const BUSINESS_FIELDS: &[FieldAliases] = &[
    FieldAliases { canonical: "name", aliases: &["company_name", "company", "business_name"] },
    FieldAliases {
        canonical: "domain",
        aliases: &["website", "url", "company_domain", "company_website", "site"],
    },
    FieldAliases {
        canonical: "linkedin_url",
        aliases: &["linkedin", "linkedin_company_url", "company_linkedin"],
    },
    FieldAliases { canonical: "business_id", aliases: &[] },
];

const PROSPECT_FIELDS: &[FieldAliases] = &[
    FieldAliases { canonical: "first_name", aliases: &["firstname", "first"] },
    FieldAliases { canonical: "last_name", aliases: &["lastname", "last", "surname"] },
    FieldAliases { canonical: "full_name", aliases: &["name", "fullname", "prospect_name"] },
    FieldAliases { canonical: "email", aliases: &["email_address", "e-mail", "e_mail"] },
    FieldAliases { canonical: "linkedin", aliases: &["linkedin_url", "linkedin_profile"] },
    FieldAliases {
        canonical: "company_name",
        aliases: &["company", "employer", "organization"],
    },
    FieldAliases { canonical: "prospect_id", aliases: &[] },
];

fn fields_for(kind: EntityKind) -> &'static [FieldAliases] {
    match kind {
        EntityKind::Business => BUSINESS_FIELDS,
        EntityKind::Prospect => PROSPECT_FIELDS,
    }
}

impl FieldAliases {
    fn accepts(&self, column: &str) -> bool {
        let column = column.trim();
        column.eq_ignore_ascii_case(self.canonical)
            || self.aliases.iter().any(|a| column.eq_ignore_ascii_case(a))
    }
}

/// Canonical field names accepted for `kind`, in table order.
pub fn canonical_fields(kind: EntityKind) -> Vec<&'static str> {
    fields_for(kind).iter().map(|f| f.canonical).collect()
}

/// Resolve a column name to its canonical field, if any.
pub fn canonical_for(kind: EntityKind, column: &str) -> Option<&'static str> {
    fields_for(kind)
        .iter()
        .find(|f| f.accepts(column))
        .map(|f| f.canonical)
}

/// Prepend `https://` when the URL has no http(s) scheme.
pub fn normalize_linkedin_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Normalize one row. `index` becomes the descriptor's `source_index`.
pub fn normalize_row(
    index: usize,
    row: &RawRow,
    kind: EntityKind,
) -> Result<MatchDescriptor, NormalizeError> {
    let fields = fields_for(kind);

    if !row.columns.iter().any(|(col, _)| fields.iter().any(|f| f.accepts(col))) {
        return Err(NormalizeError::UnrecognizedColumns {
            found: row.headers(),
            expected: fields.iter().map(|f| f.canonical.to_string()).collect(),
        });
    }

    // First column per canonical field; blank values count as absent.
    let value = |canonical: &str| -> Option<String> {
        let field = fields.iter().find(|f| f.canonical == canonical)?;
        row.columns
            .iter()
            .find(|(col, _)| field.accepts(col))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut d = MatchDescriptor::new(kind, index);
    match kind {
        EntityKind::Business => {
            d.existing_id = value("business_id");
            d.name = value("name");
            d.domain = value("domain");
            d.linkedin_url = value("linkedin_url").map(|u| normalize_linkedin_url(&u));
        }
        EntityKind::Prospect => {
            d.existing_id = value("prospect_id");
            d.first_name = value("first_name");
            d.last_name = value("last_name");
            d.full_name = value("full_name");
            d.email = value("email");
            d.linkedin_url = value("linkedin").map(|u| normalize_linkedin_url(&u));
            d.company_name = value("company_name");
        }
    }
    Ok(d)
}

/// Normalize every row, in input order. Failures are per row.
pub fn normalize(rows: &[RawRow], kind: EntityKind) -> Vec<Result<MatchDescriptor, NormalizeError>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| normalize_row(i, row, kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        RawRow::new(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn business_aliases_resolve() {
        let d = normalize_row(
            3,
            &row(&[("Company", " Acme "), ("Website", "acme.com"), ("LinkedIn", "linkedin.com/company/acme")]),
            EntityKind::Business,
        )
        .unwrap();
        assert_eq!(d.source_index, 3);
        assert_eq!(d.name.as_deref(), Some("Acme"));
        assert_eq!(d.domain.as_deref(), Some("acme.com"));
        assert_eq!(d.linkedin_url.as_deref(), Some("https://linkedin.com/company/acme"));
    }

    #[test]
    fn first_matching_column_wins() {
        let d = normalize_row(
            0,
            &row(&[("company_name", "First"), ("name", "Second")]),
            EntityKind::Business,
        )
        .unwrap();
        assert_eq!(d.name.as_deref(), Some("First"));
    }

    #[test]
    fn prospect_aliases_resolve() {
        let d = normalize_row(
            0,
            &row(&[
                ("firstname", "Jane"),
                ("Surname", "Doe"),
                ("E-Mail", "jane@acme.com"),
                ("employer", "Acme"),
                ("linkedin_url", "http://linkedin.com/in/jane"),
            ]),
            EntityKind::Prospect,
        )
        .unwrap();
        assert_eq!(d.person_name().as_deref(), Some("Jane Doe"));
        assert_eq!(d.email.as_deref(), Some("jane@acme.com"));
        assert_eq!(d.company_name.as_deref(), Some("Acme"));
        assert_eq!(d.linkedin_url.as_deref(), Some("http://linkedin.com/in/jane"));
    }

    #[test]
    fn id_column_is_recognized() {
        let d = normalize_row(0, &row(&[("BUSINESS_ID", "b-9")]), EntityKind::Business).unwrap();
        assert_eq!(d.existing_id.as_deref(), Some("b-9"));
    }

    #[test]
    fn blank_values_are_absent() {
        let d = normalize_row(0, &row(&[("name", "  "), ("domain", "acme.com")]), EntityKind::Business)
            .unwrap();
        assert_eq!(d.name, None);
    }

    #[test]
    fn unrecognized_columns_reported_per_row() {
        let rows = vec![row(&[("foo", "x")]), row(&[("domain", "acme.com")])];
        let out = normalize(&rows, EntityKind::Business);
        match &out[0] {
            Err(NormalizeError::UnrecognizedColumns { found, expected }) => {
                assert_eq!(found, &vec!["foo".to_string()]);
                assert!(expected.contains(&"domain".to_string()));
            }
            other => panic!("expected unrecognized columns, got {other:?}"),
        }
        assert!(out[1].is_ok());
    }

    #[test]
    fn linkedin_scheme_check_is_case_insensitive() {
        assert_eq!(normalize_linkedin_url("HTTPS://x.com/a"), "HTTPS://x.com/a");
        assert_eq!(normalize_linkedin_url(" www.linkedin.com/in/a "), "https://www.linkedin.com/in/a");
        assert_eq!(normalize_linkedin_url(""), "");
    }

    #[test]
    fn canonical_lookup() {
        assert_eq!(canonical_for(EntityKind::Prospect, " Name "), Some("full_name"));
        assert_eq!(canonical_for(EntityKind::Business, "name"), Some("name"));
        assert_eq!(canonical_for(EntityKind::Business, "email"), None);
        assert_eq!(canonical_fields(EntityKind::Business).len(), 4);
    }
}
