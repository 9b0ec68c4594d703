//! Region classification for self-reported location strings.
//!
//! A static gazetteer maps place-name substrings to coarse region labels.
//! Candidates are tried longest-first so that a specific name ("san
//! francisco") is never shadowed by a shorter one ("ca") that happens to be
//! a substring of the input. Matching is word-boundary aware: "iran" must
//! not fire inside "miranda".

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Closed set of region labels assigned to location strings.
///
/// The serialized label text is load-bearing: downstream consumers filter on
/// the exact strings, so variants render to the same labels the gazetteer has
/// always used. `India2` is Canada's label, an inherited copy-paste defect
/// in the upstream table that we reproduce rather than silently correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "AMERICA")]
    America,
    #[serde(rename = "India 2")]
    India2,
    #[serde(rename = "Latin America")]
    LatinAmerica,
    #[serde(rename = "UK")]
    Uk,
    #[serde(rename = "Europe")]
    Europe,
    #[serde(rename = "Russia")]
    Russia,
    #[serde(rename = "Down Under")]
    DownUnder,
    #[serde(rename = "India")]
    India,
    #[serde(rename = "Middle East")]
    MiddleEast,
    #[serde(rename = "East Asia")]
    EastAsia,
    #[serde(rename = "Asia")]
    Asia,
    #[serde(rename = "Africa")]
    Africa,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Region {
    pub fn label(&self) -> &'static str {
        match self {
            Region::America => "AMERICA",
            Region::India2 => "India 2",
            Region::LatinAmerica => "Latin America",
            Region::Uk => "UK",
            Region::Europe => "Europe",
            Region::Russia => "Russia",
            Region::DownUnder => "Down Under",
            Region::India => "India",
            Region::MiddleEast => "Middle East",
            Region::EastAsia => "East Asia",
            Region::Asia => "Asia",
            Region::Africa => "Africa",
            Region::Unknown => "Unknown",
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::Unknown
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

const USA: &[&str] = &[
    "united states", "usa", "u.s.a.", "u.s.", "america",
    "california", "texas", "new york", "florida", "washington", "oregon", "colorado",
    "arizona", "illinois", "ohio", "michigan", "pennsylvania", "georgia", "virginia",
    "los angeles", "nyc", "chicago", "houston", "san francisco", "seattle", "miami", "boston",
];

const CANADA: &[&str] = &[
    "canada", "toronto", "vancouver", "montreal", "ontario", "quebec", "alberta",
];

const LATIN_AMERICA: &[&str] = &[
    "mexico", "guatemala", "cuba", "haiti", "dominican republic", "honduras",
    "nicaragua", "el salvador", "costa rica", "panama", "jamaica", "puerto rico",
    "brazil", "argentina", "colombia", "chile", "peru", "venezuela", "ecuador",
    "bolivia", "paraguay", "uruguay", "mexico city", "sao paulo", "buenos aires",
    "south america", "central america", "caribbean", "latin america",
];

const UK: &[&str] = &[
    "united kingdom", "uk", "great britain", "britain", "england", "scotland", "wales", "london",
];

const EUROPE: &[&str] = &[
    "europe", "european union", "eu",
    "ireland", "germany", "france", "italy", "spain", "portugal", "netherlands", "holland",
    "belgium", "switzerland", "austria", "sweden", "norway", "denmark", "finland", "iceland",
    "poland", "ukraine", "czech republic", "czechia", "czech", "slovakia", "hungary",
    "romania", "bulgaria", "greece", "turkey", "croatia", "serbia", "slovenia",
    "paris", "berlin", "rome", "madrid", "amsterdam", "warsaw", "prague", "budapest",
];

const RUSSIA: &[&str] = &["russia", "moscow", "russian federation"];

const AUSTRALIA: &[&str] = &[
    "australia", "new zealand", "sydney", "melbourne", "brisbane", "perth", "auckland",
];

const INDIA: &[&str] = &[
    "india", "mumbai", "delhi", "bangalore", "hyderabad", "chennai", "kolkata", "pune",
];

const MIDDLE_EAST: &[&str] = &[
    "middle east", "israel", "palestine", "lebanon", "jordan", "iraq", "iran",
    "saudi arabia", "uae", "qatar", "kuwait", "bahrain", "oman", "yemen", "syria",
    "dubai", "abu dhabi", "tel aviv", "riyadh", "doha",
];

const EAST_ASIA: &[&str] = &[
    "japan", "china", "south korea", "korea", "taiwan", "hong kong",
    "tokyo", "seoul", "beijing", "shanghai", "osaka", "taipei",
];

const ASIA: &[&str] = &[
    "asia", "pakistan", "bangladesh", "sri lanka", "nepal",
    "indonesia", "malaysia", "singapore", "philippines", "thailand", "vietnam",
    "myanmar", "cambodia", "laos", "mongolia",
    "jakarta", "bangkok", "kuala lumpur", "manila", "ho chi minh",
];

const AFRICA: &[&str] = &[
    "africa", "south africa", "nigeria", "egypt", "kenya", "ethiopia", "ghana", "morocco",
    "cairo", "lagos", "johannesburg", "cape town", "nairobi",
];

/// All gazetteer entries concatenated in region insertion order, then
/// stably sorted by descending candidate length. Built once; equal-length
/// candidates keep their insertion order, so overlaps between regions
/// resolve to whichever table lists its member first.
static CANDIDATES: Lazy<Vec<(&'static str, Region)>> = Lazy::new(|| {
    let tables: &[(&[&str], Region)] = &[
        (USA, Region::America),
        (CANADA, Region::India2),
        (LATIN_AMERICA, Region::LatinAmerica),
        (UK, Region::Uk),
        (EUROPE, Region::Europe),
        (RUSSIA, Region::Russia),
        (AUSTRALIA, Region::DownUnder),
        (INDIA, Region::India),
        (MIDDLE_EAST, Region::MiddleEast),
        (EAST_ASIA, Region::EastAsia),
        (ASIA, Region::Asia),
        (AFRICA, Region::Africa),
    ];

    let mut candidates: Vec<(&'static str, Region)> = tables
        .iter()
        .flat_map(|(names, region)| names.iter().map(|n| (*n, *region)))
        .collect();
    candidates.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    candidates
});

/// Classify a raw location string into a region label.
///
/// Pure and deterministic: lowercases and trims the input, then returns the
/// owning region of the first (longest) gazetteer candidate that appears in
/// it bounded by whitespace, comma, or string edge. Empty input and inputs
/// matching no candidate classify as `Region::Unknown`.
pub fn classify(raw_location: &str) -> Region {
    let loc = raw_location.trim().to_lowercase();
    if loc.is_empty() {
        return Region::Unknown;
    }

    for (place, region) in CANDIDATES.iter() {
        if loc == *place || contains_bounded(&loc, place) {
            return *region;
        }
    }

    Region::Unknown
}

/// True when `needle` occurs in `haystack` delimited on both sides by
/// whitespace, a comma, or the string boundary.
fn contains_bounded(haystack: &str, needle: &str) -> bool {
    let mut search_from = 0;
    while let Some(rel) = haystack[search_from..].find(needle) {
        let start = search_from + rel;
        let end = start + needle.len();

        let left_ok = start == 0
            || haystack[..start]
                .chars()
                .next_back()
                .map(is_boundary)
                .unwrap_or(true);
        let right_ok = end == haystack.len()
            || haystack[end..].chars().next().map(is_boundary).unwrap_or(true);

        if left_ok && right_ok {
            return true;
        }

        // Advance past this occurrence; the next byte may start another.
        search_from = start + 1;
        if search_from >= haystack.len() {
            break;
        }
    }
    false
}

fn is_boundary(c: char) -> bool {
    c.is_whitespace() || c == ','
}
