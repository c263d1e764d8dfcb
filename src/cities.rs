/// UK cities and towns with a significant student population. Location
/// inference and catalog maintenance both resolve against this table, so a
/// canonical spelling lives in exactly one place.
pub const KNOWN_CITIES: &[&str] = &[
    "London",
    "Manchester",
    "Birmingham",
    "Leeds",
    "Liverpool",
    "Sheffield",
    "Bristol",
    "Newcastle upon Tyne",
    "Newcastle",
    "Nottingham",
    "Leicester",
    "Coventry",
    "Bradford",
    "Cardiff",
    "Swansea",
    "Belfast",
    "Edinburgh",
    "Glasgow",
    "Aberdeen",
    "Dundee",
    "Stirling",
    "Brighton",
    "Portsmouth",
    "Southampton",
    "Oxford",
    "Cambridge",
    "Norwich",
    "Ipswich",
    "Exeter",
    "Plymouth",
    "Bath",
    "Cheltenham",
    "York",
    "Durham",
    "Sunderland",
    "Middlesbrough",
    "Hull",
    "Lancaster",
    "Preston",
    "Chester",
    "Stoke-on-Trent",
    "Derby",
    "Wolverhampton",
    "Reading",
    "Luton",
    "Milton Keynes",
    "Canterbury",
    "Colchester",
    "Guildford",
    "Loughborough",
    "Lincoln",
    "Huddersfield",
    "Bournemouth",
    "St Andrews",
    "Falmouth",
];

/// Exact (case-insensitive) match against the known city table.
pub fn canonical(name: &str) -> Option<&'static str> {
    let trimmed = name.trim();
    KNOWN_CITIES
        .iter()
        .find(|city| city.eq_ignore_ascii_case(trimmed))
        .copied()
}

/// Find a known city mentioned anywhere in free text. Matches on word
/// boundaries so "Bath" does not fire on "2 bathrooms"; the longest match
/// wins so "Newcastle upon Tyne" beats "Newcastle".
pub fn find_in(text: &str) -> Option<&'static str> {
    let haystack = text.to_lowercase();
    KNOWN_CITIES
        .iter()
        .filter(|city| contains_word(&haystack, &city.to_lowercase()))
        .max_by_key(|city| city.len())
        .copied()
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let boundary_before = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let boundary_after = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if boundary_before && boundary_after {
            return true;
        }
        from = end;
    }
    false
}
