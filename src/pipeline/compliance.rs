//! Compliance check: does the classified type satisfy what the request
//! asked for?

/// Score for a recognized-synonym match.
const SYNONYM_SCORE: f32 = 0.8;

/// Type labels considered interchangeable for compliance purposes.
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["passport", "travel document"],
    &["id card", "identity card", "national id"],
    &["drivers license", "driver license", "driving licence"],
    &["payslip", "salary slip", "pay stub", "wage slip"],
    &["contract", "employment contract", "work agreement"],
    &["visa", "residence permit"],
    &["certificate", "attestation"],
];

/// 1.0 for an exact match, a partial score for a recognized synonym, 0.0
/// for a clear mismatch. A request with no requested type accepts anything.
pub fn compliance_score(classified_type: &str, requested_type: Option<&str>) -> f32 {
    let requested = match requested_type {
        Some(r) if !r.trim().is_empty() => r.trim().to_lowercase(),
        _ => return 1.0,
    };
    let classified = classified_type.trim().to_lowercase();

    if classified == requested {
        return 1.0;
    }
    if SYNONYM_GROUPS
        .iter()
        .any(|group| group.contains(&classified.as_str()) && group.contains(&requested.as_str()))
    {
        return SYNONYM_SCORE;
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_full_score() {
        assert_eq!(compliance_score("passport", Some("passport")), 1.0);
        assert_eq!(compliance_score("Passport", Some("PASSPORT")), 1.0);
    }

    #[test]
    fn synonyms_score_partial() {
        assert_eq!(compliance_score("travel document", Some("passport")), 0.8);
        assert_eq!(compliance_score("salary slip", Some("payslip")), 0.8);
        assert_eq!(compliance_score("identity card", Some("national id")), 0.8);
    }

    #[test]
    fn mismatch_is_zero() {
        assert_eq!(compliance_score("payslip", Some("passport")), 0.0);
        assert_eq!(compliance_score("unknown", Some("passport")), 0.0);
    }

    #[test]
    fn no_requested_type_accepts_anything() {
        assert_eq!(compliance_score("payslip", None), 1.0);
        assert_eq!(compliance_score("unknown", Some("  ")), 1.0);
    }
}
