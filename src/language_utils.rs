use anyhow::{Result, anyhow};
use isolang::Language;

/// Language code utilities
///
/// Translation rows are keyed by language code, so every code that enters the
/// crate goes through `normalize_language_code` first. Codes may carry a
/// region or script variant (`fr-ca`, `zh-hant`); validation only looks at the
/// base language part.
/// Language code type of the base language part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageCodeType {
    /// ISO 639-1 (2-letter) code
    Part1,
    /// ISO 639-2/T or 639-3 (3-letter) code
    Part2T,
    /// ISO 639-2/B (3-letter bibliographic) code
    Part2B,
}

/// ISO 639-2/B codes that differ from their 639-2/T counterpart
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("geo", "kat"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("ice", "isl"),
    ("mac", "mkd"),
    ("may", "msa"),
    ("per", "fas"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Undo the differences between language code notations
///
/// `en_US`, `EN-us` and ` en-us ` all become `en-us`.
pub fn normalize_language_code(code: &str) -> String {
    code.trim().to_lowercase().replace('_', "-")
}

/// The base language of a (normalized) code: `fr-ca` -> `fr`
pub fn base_language(code: &str) -> &str {
    code.split('-').next().unwrap_or(code)
}

/// Validate the base language part of a code against ISO 639
pub fn validate_language_code(code: &str) -> Result<LanguageCodeType> {
    let normalized = normalize_language_code(code);
    let base = base_language(&normalized);

    match base.len() {
        2 if Language::from_639_1(base).is_some() => Ok(LanguageCodeType::Part1),
        3 if Language::from_639_3(base).is_some() => Ok(LanguageCodeType::Part2T),
        3 if PART2B_TO_PART2T.iter().any(|(b, _)| *b == base) => Ok(LanguageCodeType::Part2B),
        _ => Err(anyhow!("Invalid language code: {}", code)),
    }
}

/// Map the base language part to an isolang `Language`
fn to_language(code: &str) -> Option<Language> {
    let normalized = normalize_language_code(code);
    let base = base_language(&normalized);

    match base.len() {
        2 => Language::from_639_1(base),
        3 => {
            let part2t = PART2B_TO_PART2T
                .iter()
                .find(|(b, _)| *b == base)
                .map(|(_, t)| *t)
                .unwrap_or(base);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Get the English language name for a code, used for display purposes
pub fn get_language_name(code: &str) -> Result<String> {
    let lang = to_language(code).ok_or_else(|| anyhow!("Unknown language code: {}", code))?;
    Ok(lang.to_name().to_string())
}
