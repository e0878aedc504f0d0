//! Category display names.

/// Turn a hyphenated category into a display name.
///
/// Words are title-cased and joined with spaces. A third hyphen segment is a
/// subcategory and is dropped: `"cloud-services-aws"` becomes
/// `"Cloud Services"`.
pub fn format_category(raw: &str) -> String {
    raw.split('-')
        .filter(|w| !w.is_empty())
        .take(2)
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcategory_is_dropped() {
        assert_eq!(format_category("cloud-services-aws"), "Cloud Services");
        assert_eq!(format_category("cloud-services-gcp"), "Cloud Services");
    }

    #[test]
    fn test_plain_categories() {
        assert_eq!(format_category("security"), "Security");
        assert_eq!(format_category("network-activity"), "Network Activity");
        assert_eq!(format_category(""), "");
    }

    #[test]
    fn test_existing_case_is_kept_after_first_letter() {
        assert_eq!(format_category("macOS-logs"), "MacOS Logs");
    }
}
