//! Output names and short codes derived from a record's identity.
//!
//! Every backend uses these functions; none of them formats ids itself.

/// Filename prefix for every generated document.
pub const FILENAME_PREFIX: &str = "bitacora";
pub const MISSING_CENTER: &str = "sin-centro";
pub const MISSING_DATE: &str = "sin-fecha";
pub const VERIFICATION_PREFIX: &str = "DL-";

const SHORT_ID_LEN: usize = 6;
const VERIFICATION_ID_LEN: usize = 8;

/// `bitacora-{center-slug}-{iso-date}-{last6-of-id}.pdf`
pub fn document_filename(
    center_name: Option<&str>,
    log_date: Option<&str>,
    record_id: &str,
) -> String {
    let center = center_name
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| MISSING_CENTER.to_string());
    let date = log_date
        .map(iso_date_part)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| MISSING_DATE.to_string());

    format!(
        "{}-{}-{}-{}.pdf",
        FILENAME_PREFIX, center, date, last_chars(record_id, SHORT_ID_LEN)
    )
}

/// `DL-` followed by the first 8 characters of the id, upper-cased.
pub fn verification_code(record_id: &str) -> String {
    let head: String = record_id.trim().chars().take(VERIFICATION_ID_LEN).collect();
    format!("{}{}", VERIFICATION_PREFIX, head.to_uppercase())
}

/// Six-character identifier printed in every page header.
pub fn short_id(record_id: &str) -> String {
    last_chars(record_id.trim(), SHORT_ID_LEN).to_uppercase()
}

/// Runs of characters outside `[A-Za-z0-9]` become a single `-`;
/// leading and trailing dashes are dropped.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Date portion of an ISO timestamp (`2024-03-10T12:00:00Z` -> `2024-03-10`).
fn iso_date_part(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .split('T')
        .next()
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn last_chars(text: &str, count: usize) -> String {
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(count)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_example_record() {
        assert_eq!(
            document_filename(Some("Puerto Varas"), Some("2024-03-10"), "abc123def456"),
            "bitacora-Puerto-Varas-2024-03-10-def456.pdf"
        );
    }

    #[test]
    fn test_filename_defaults() {
        assert_eq!(
            document_filename(None, None, "abc123def456"),
            "bitacora-sin-centro-sin-fecha-def456.pdf"
        );
        assert_eq!(
            document_filename(Some("  ***  "), Some("   "), "abc"),
            "bitacora-sin-centro-sin-fecha-abc.pdf"
        );
    }

    #[test]
    fn test_filename_strips_time_component() {
        assert_eq!(
            document_filename(
                Some("Chaitén"),
                Some("2024-03-10T08:00:00Z"),
                "0000111122223333"
            ),
            "bitacora-Chait-n-2024-03-10-223333.pdf"
        );
    }

    #[test]
    fn test_slug_collapses_runs() {
        assert_eq!(slugify("Centro  Isla / Huar"), "Centro-Isla-Huar");
        assert_eq!(slugify("--Quellón--"), "Quell-n");
    }

    #[test]
    fn test_verification_code() {
        assert_eq!(verification_code("abc123def456"), "DL-ABC123DE");
        assert_eq!(verification_code("ab"), "DL-AB");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abc123def456"), "DEF456");
        assert_eq!(short_id("x1"), "X1");
    }
}
