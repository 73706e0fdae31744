//! Action-synonym and domain-hint lookup tables (spec §4.E items 3-4).

/// Every synonym (including British/American spelling variants) maps
/// to its canonical action name.
const ACTION_SYNONYMS: &[(&str, &str)] = &[
    ("summarize", "summarize"),
    ("summarise", "summarize"),
    ("summary", "summarize"),
    ("load", "load"),
    ("import", "load"),
    ("describe", "describe"),
    ("plot", "plot"),
    ("visualize", "plot"),
    ("visualise", "plot"),
    ("export", "export"),
    ("write", "write_docstring"),
    ("document", "write_docstring"),
    ("read", "read_script"),
];

const DOMAIN_HINTS: &[(&str, &str)] = &[
    ("data", "data"),
    ("matrix", "data"),
    ("csv", "io"),
    ("rows", "io"),
    ("statistics", "stats"),
    ("stats", "stats"),
    ("script", "script"),
    ("docstring", "script"),
    ("repository", "analysis"),
    ("directory", "analysis"),
    ("geojson", "geo"),
    ("selection", "geo"),
];

pub fn canonical_action(token: &str) -> Option<&'static str> {
    ACTION_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == token)
        .map(|(_, canonical)| *canonical)
}

pub fn domain_hint(token: &str) -> Option<&'static str> {
    DOMAIN_HINTS
        .iter()
        .find(|(keyword, _)| *keyword == token)
        .map(|(_, domain)| *domain)
}
