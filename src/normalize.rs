// ✏️ Name Normalizer - per-entity canonical names
//
// Every function here is idempotent: normalize(normalize(x)) == normalize(x).
// Callers are expected to skip input that is empty after trimming; the
// functions themselves never panic on it.

/// Characters stripped from both ends of location names
pub const BOUNDARY_CHARS: [char; 10] = [',', '.', '-', '_', ' ', '\t', '\n', '\r', '\\', '/'];

/// Strip boundary characters from both ends, leaving any in `keep` alone.
///
/// Stripping stops at the first character that is either not a boundary
/// character or is protected, so `"St.,"` with `keep = ['.']` becomes `"St."`.
pub fn strip_boundary(word: &str, keep: &[char]) -> String {
    let strip = |c: char| BOUNDARY_CHARS.contains(&c) && !keep.contains(&c);
    word.trim_end_matches(strip).trim_start_matches(strip).to_string()
}

/// Upper-case the first character and lower-case the rest.
///
/// Only the first char of a multi-char upper-case mapping stays upper
/// ("ß" → "Ss"), otherwise a second pass would change the result.
fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut upper = first.to_uppercase();
    let mut out = String::with_capacity(part.len());
    out.extend(upper.next());
    out.extend(upper.flat_map(char::to_lowercase));
    out.extend(chars.flat_map(char::to_lowercase));
    out
}

/// Capitalize every dash- or period-delimited run, keeping the separators
fn capitalize_subwords(word: &str) -> String {
    word.split_inclusive(|c: char| c == '-' || c == '.')
        .map(capitalize)
        .collect()
}

pub fn normalize_band(name: &str) -> String {
    name.trim().to_string()
}

pub fn normalize_person(name: &str) -> String {
    name.trim().to_string()
}

/// "st. louis-park" → "St. Louis-Park"
pub fn normalize_city(name: &str) -> String {
    let name = strip_boundary(name, &['.']);
    name.split(' ')
        .map(capitalize_subwords)
        .collect::<Vec<_>>()
        .join(" ")
}

/// "new york" → "New York", "wa" → "WA"
pub fn normalize_state(name: &str) -> String {
    let name = strip_boundary(name, &[]);
    let name = name.split(' ').map(capitalize).collect::<Vec<_>>().join(" ");

    // Two-letter states are taken to be abbreviations
    if name.chars().count() == 2 {
        name.to_uppercase()
    } else {
        name
    }
}

pub fn normalize_country(name: &str) -> String {
    strip_boundary(name, &[])
}

pub fn normalize_website(url: &str) -> String {
    url.trim().to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_and_person_trim_only() {
        assert_eq!(normalize_band("  The Thermals \t"), "The Thermals");
        assert_eq!(normalize_band("foo "), "foo");
        assert_eq!(normalize_person(" Hutch Harris"), "Hutch Harris");
        // Case is preserved, dedup is case-insensitive elsewhere
        assert_eq!(normalize_band("dEAD moon"), "dEAD moon");
    }

    #[test]
    fn test_city_strips_and_title_cases() {
        assert_eq!(normalize_city(" portland, "), "Portland");
        assert_eq!(normalize_city("/seattle\\"), "Seattle");
        assert_eq!(normalize_city("winston-salem"), "Winston-Salem");
        assert_eq!(normalize_city("NEW YORK"), "New York");
    }

    #[test]
    fn test_city_protects_abbreviation_periods() {
        assert_eq!(normalize_city("st. louis"), "St. Louis");
        assert_eq!(normalize_city("washington d.c."), "Washington D.C.");
        assert_eq!(normalize_city("st.paul"), "St.Paul");
    }

    #[test]
    fn test_city_mixed_dash_and_period_subwords() {
        assert_eq!(normalize_city("WINSTON-SALEM"), "Winston-Salem");
        assert_eq!(normalize_city("st.louis-park"), "St.Louis-Park");
        assert_eq!(normalize_city("sedro-woolley st."), "Sedro-Woolley St.");
        assert_eq!(normalize_city("Winston-Salem"), "Winston-Salem");
    }

    #[test]
    fn test_state_abbreviations_upper_cased() {
        assert_eq!(normalize_state("wa"), "WA");
        assert_eq!(normalize_state(" Or,"), "OR");
        assert_eq!(normalize_state("new york"), "New York");
        assert_eq!(normalize_state("OREGON"), "Oregon");
    }

    #[test]
    fn test_country_strips_only() {
        assert_eq!(normalize_country(" usa. "), "usa");
        assert_eq!(normalize_country("United Kingdom"), "United Kingdom");
    }

    #[test]
    fn test_website_trims() {
        assert_eq!(normalize_website(" http://example.com/ "), "http://example.com/");
    }

    #[test]
    fn test_all_boundary_input_is_total() {
        assert_eq!(strip_boundary(",./ -", &[]), "");
        assert_eq!(normalize_city("--"), "");
        assert_eq!(normalize_state(""), "");
    }

    #[test]
    fn test_normalizers_are_idempotent() {
        let samples = [
            "  portland , ",
            "st. louis",
            "ST.PAUL-park",
            "wa",
            "new  york",
            "-_ Boise _-",
            "ÉCOLE du ß",
            "x",
            "",
        ];

        for s in samples {
            let city = normalize_city(s);
            assert_eq!(normalize_city(&city), city, "city: {:?}", s);

            let state = normalize_state(s);
            assert_eq!(normalize_state(&state), state, "state: {:?}", s);

            let country = normalize_country(s);
            assert_eq!(normalize_country(&country), country, "country: {:?}", s);

            let band = normalize_band(s);
            assert_eq!(normalize_band(&band), band, "band: {:?}", s);

            let person = normalize_person(s);
            assert_eq!(normalize_person(&person), person, "person: {:?}", s);

            let website = normalize_website(s);
            assert_eq!(normalize_website(&website), website, "website: {:?}", s);
        }
    }
}
