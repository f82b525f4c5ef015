//! Subject normalization shared by the routing matcher and the correlator.

/// Lowercase a subject, strip chained reply/forward markers and leading
/// bracketed tags, and trim. Idempotent:
/// `normalize_subject(normalize_subject(s)) == normalize_subject(s)`.
pub fn normalize_subject(subject: &str) -> String {
    const MARKERS: [&str; 3] = ["re:", "fwd:", "fw:"];

    let mut s = subject.to_lowercase();
    loop {
        let trimmed = s.trim_start();

        if let Some(rest) = MARKERS
            .iter()
            .find_map(|m| trimmed.strip_prefix(m))
        {
            s = rest.to_string();
            continue;
        }

        // Leading bracketed tag like "[External]" or "[SPAM]"
        if trimmed.starts_with('[') {
            if let Some(end) = trimmed.find(']') {
                s = trimmed[end + 1..].to_string();
                continue;
            }
        }

        break;
    }

    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_chained_prefixes_and_tag() {
        assert_eq!(
            normalize_subject("Re: Fwd: [External] Passport Request"),
            "passport request"
        );
    }

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(normalize_subject("  Payslip January  "), "payslip january");
    }

    #[test]
    fn strips_fw_variant() {
        assert_eq!(normalize_subject("FW: contract"), "contract");
    }

    #[test]
    fn repeated_markers() {
        assert_eq!(normalize_subject("RE: re: Re: invoice"), "invoice");
    }

    #[test]
    fn marker_after_tag() {
        assert_eq!(normalize_subject("[ext] Re: invoice"), "invoice");
    }

    #[test]
    fn unclosed_bracket_left_alone() {
        assert_eq!(normalize_subject("[broken subject"), "[broken subject");
    }

    #[test]
    fn plain_subject_unchanged() {
        assert_eq!(normalize_subject("quarterly report"), "quarterly report");
    }

    #[test]
    fn empty_subject() {
        assert_eq!(normalize_subject(""), "");
        assert_eq!(normalize_subject("Re:"), "");
    }

    #[test]
    fn idempotent() {
        for s in [
            "Re: Fwd: [External] Passport Request",
            "[a][b] double tagged",
            "plain",
            "RE: re: [x] nested",
            "",
        ] {
            let once = normalize_subject(s);
            assert_eq!(normalize_subject(&once), once, "not idempotent for {s:?}");
        }
    }
}
