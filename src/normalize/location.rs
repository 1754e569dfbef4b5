//! Free-text location → structured geography.
//!
//! The parser is total: any input (empty, whitespace, noise) yields a
//! `Location`, with every geography field unset as the bottom case.
//!
//! Policy:
//! - remote / hybrid are case-insensitive substring markers, independent of
//!   any city/state found alongside them;
//! - the text is split on commas (parentheses, `|`, `/`, `;` and spaced dashes
//!   act as commas too) and work-mode words are peeled off each token;
//! - the rightmost 2-letter uppercase token found in the state table is the
//!   US state; full state names are accepted when no code is present;
//! - a token naming a known country (name or common code) sets `country`;
//!   a US state without an explicit country implies the United States;
//! - the city is the place-like token nearest to the left of the state /
//!   country anchor, or the first place-like token when there is no anchor.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::lead::Location;

pub const UNITED_STATES: &str = "United States";

const REMOTE_MARKERS: &[&str] = &["remote", "work from home", "wfh"];
const HYBRID_MARKERS: &[&str] = &["hybrid"];

const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("PR", "Puerto Rico"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// Canonical country name → lowercase aliases (names and codes).
/// Two-letter codes that collide with US states (CA, DE, IN, ...) are left
/// out on purpose: the state table wins for those.
const COUNTRIES: &[(&str, &[&str])] = &[
    (
        UNITED_STATES,
        &[
            "united states",
            "united states of america",
            "usa",
            "us",
            "u.s.",
            "u.s",
            "u.s.a.",
            "u.s.a",
        ],
    ),
    (
        "United Kingdom",
        &["united kingdom", "uk", "u.k.", "gb", "gbr", "great britain", "england", "scotland"],
    ),
    ("Canada", &["canada", "can"]),
    ("Mexico", &["mexico", "mex"]),
    ("Brazil", &["brazil", "brasil", "bra"]),
    ("Ireland", &["ireland", "irl"]),
    ("Germany", &["germany", "deutschland", "deu"]),
    ("France", &["france", "fra"]),
    ("Spain", &["spain", "esp"]),
    ("Portugal", &["portugal", "prt"]),
    ("Netherlands", &["netherlands", "the netherlands", "nld"]),
    ("Poland", &["poland", "pol"]),
    ("Sweden", &["sweden", "swe"]),
    ("Switzerland", &["switzerland", "che"]),
    ("Israel", &["israel", "isr"]),
    ("India", &["india", "ind"]),
    ("Singapore", &["singapore", "sgp"]),
    ("Japan", &["japan", "jpn"]),
    ("China", &["china", "chn"]),
    ("Australia", &["australia", "aus"]),
    ("United Arab Emirates", &["united arab emirates", "uae"]),
];

/// Major US hubs whose state is implied when the posting omits it.
/// (lowercase alias, display city, state code)
const HUB_CITIES: &[(&str, &str, &str)] = &[
    ("new york", "New York", "NY"),
    ("new york city", "New York", "NY"),
    ("nyc", "New York", "NY"),
    ("manhattan", "Manhattan", "NY"),
    ("brooklyn", "Brooklyn", "NY"),
    ("jersey city", "Jersey City", "NJ"),
    ("hoboken", "Hoboken", "NJ"),
    ("san francisco", "San Francisco", "CA"),
    ("palo alto", "Palo Alto", "CA"),
    ("mountain view", "Mountain View", "CA"),
    ("sunnyvale", "Sunnyvale", "CA"),
    ("menlo park", "Menlo Park", "CA"),
    ("santa clara", "Santa Clara", "CA"),
    ("san jose", "San Jose", "CA"),
    ("cupertino", "Cupertino", "CA"),
    ("redwood city", "Redwood City", "CA"),
    ("los angeles", "Los Angeles", "CA"),
    ("san diego", "San Diego", "CA"),
    ("seattle", "Seattle", "WA"),
    ("redmond", "Redmond", "WA"),
    ("bellevue", "Bellevue", "WA"),
    ("austin", "Austin", "TX"),
    ("dallas", "Dallas", "TX"),
    ("houston", "Houston", "TX"),
    ("boston", "Boston", "MA"),
    ("chicago", "Chicago", "IL"),
    ("denver", "Denver", "CO"),
    ("boulder", "Boulder", "CO"),
    ("atlanta", "Atlanta", "GA"),
    ("miami", "Miami", "FL"),
    ("philadelphia", "Philadelphia", "PA"),
    ("pittsburgh", "Pittsburgh", "PA"),
    ("salt lake city", "Salt Lake City", "UT"),
    ("raleigh", "Raleigh", "NC"),
    ("minneapolis", "Minneapolis", "MN"),
    ("phoenix", "Phoenix", "AZ"),
];

/// Parse a free-text location. Never fails.
pub fn parse_location(raw: &str) -> Location {
    let raw_clean = collapse_ws(raw);
    let lower = raw_clean.to_lowercase();

    let mut loc = Location {
        remote: REMOTE_MARKERS.iter().any(|m| lower.contains(m)),
        hybrid: HYBRID_MARKERS.iter().any(|m| lower.contains(m)),
        raw: raw_clean.clone(),
        ..Default::default()
    };

    let tokens = geo_tokens(&raw_clean);
    if tokens.is_empty() {
        return loc;
    }

    // State: rightmost 2-letter code first, then rightmost full name that is
    // not also a hub city ("New York" alone reads as the city).
    let mut state_idx = tokens.iter().rposition(|t| state_code(t).is_some());
    if state_idx.is_none() {
        state_idx = tokens
            .iter()
            .rposition(|t| state_by_name(t).is_some() && hub_city(t).is_none());
    }
    if let Some(i) = state_idx {
        loc.state = state_code(&tokens[i])
            .or_else(|| state_by_name(&tokens[i]))
            .map(str::to_string);
    }

    let country_idx = tokens
        .iter()
        .enumerate()
        .rposition(|(i, t)| Some(i) != state_idx && country_for(t).is_some());
    if let Some(i) = country_idx {
        loc.country = country_for(&tokens[i]).map(str::to_string);
    }

    // City: nearest place-like token left of the anchor, else the first one.
    let is_candidate = |i: usize| {
        Some(i) != state_idx && Some(i) != country_idx && is_place_like(&tokens[i])
    };
    let anchor = match (state_idx, country_idx) {
        (Some(s), Some(c)) => Some(s.min(c)),
        (s, c) => s.or(c),
    };
    let city_idx = match anchor {
        Some(a) => (0..a).rev().find(|&i| is_candidate(i)),
        None => (0..tokens.len()).find(|&i| is_candidate(i)),
    };

    if let Some(i) = city_idx {
        let token = &tokens[i];
        match hub_city(token) {
            Some((display, state)) => {
                loc.city = Some(display.to_string());
                let us_or_unknown = loc.country.as_deref().map_or(true, |c| c == UNITED_STATES);
                if loc.state.is_none() && us_or_unknown {
                    loc.state = Some(state.to_string());
                }
            }
            None => loc.city = Some(token.clone()),
        }
    }

    if loc.country.is_none() && loc.state.is_some() {
        loc.country = Some(UNITED_STATES.to_string());
    }

    loc
}

/// Split into geography tokens with work-mode words removed.
fn geo_tokens(s: &str) -> Vec<String> {
    static RE_SEP: OnceCell<Regex> = OnceCell::new();
    static RE_MARKERS: OnceCell<Regex> = OnceCell::new();
    let re_sep = RE_SEP.get_or_init(|| {
        Regex::new(r"\s+[-–—]\s+|[–—()\[\]|;/•·]").unwrap()
    });
    let re_markers = RE_MARKERS.get_or_init(|| {
        Regex::new(
            r"(?i)\b(fully|remote|hybrid|on-?site|in[- ]office|work from home|wfh|first|friendly|only|ok|optional|flexible|anywhere|based)\b",
        )
        .unwrap()
    });

    let separated = re_sep.replace_all(s, ",");
    separated
        .split(',')
        .map(|t| {
            let stripped = re_markers.replace_all(t, " ");
            collapse_ws(&stripped)
                .trim_matches(|c: char| c == '-' || c == ':' || c == '*')
                .trim()
                .to_string()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn state_code(token: &str) -> Option<&'static str> {
    if token.chars().count() != 2 || !token.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    US_STATES
        .iter()
        .find(|(code, _)| *code == token)
        .map(|(code, _)| *code)
}

fn state_by_name(token: &str) -> Option<&'static str> {
    US_STATES
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(token))
        .map(|(code, _)| *code)
}

/// Canonical country name for a name or common code (`"US"`, `"usa"`, ...).
pub fn country_for(token: &str) -> Option<&'static str> {
    let t = token.to_lowercase();
    COUNTRIES
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|a| *a == t))
        .map(|(name, _)| *name)
}

fn hub_city(token: &str) -> Option<(&'static str, &'static str)> {
    let t = token.to_lowercase();
    HUB_CITIES
        .iter()
        .find(|(alias, _, _)| *alias == t)
        .map(|(_, display, state)| (*display, *state))
}

/// Letters, spaces and a little punctuation; at least two letters, at most four words.
fn is_place_like(token: &str) -> bool {
    let letters = token.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 2
        && token.split_whitespace().count() <= 4
        && token
            .chars()
            .all(|c| c.is_alphabetic() || c == ' ' || c == '.' || c == '\'' || c == '-')
        && state_code(token).is_none()
        && country_for(token).is_none()
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
