//! Plausible patient demographics drawn from fixed word lists and digit patterns.
//!
//! Every function takes the caller's RNG, so the same seed always yields the same people.

use rand::Rng;
use rand::seq::IndexedRandom;

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Carlos", "Karen", "Daniel", "Lisa", "Matthew", "Nancy", "Anthony", "Sandra", "Mark",
    "Ashley", "Steven", "Emily", "Andrew", "Donna", "Joshua", "Michelle", "Kevin", "Carol",
    "Brian", "Amanda", "Wei", "Melissa", "Luis", "Deborah", "Aisha", "Priya", "Omar", "Mei",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright",
    "Scott", "Nguyen", "Hill", "Flores", "Green", "Patel", "Kim", "Chen", "Okafor",
];

const STREET_NAMES: &[&str] = &[
    "Maple", "Oak", "Cedar", "Pine", "Elm", "Washington", "Lake", "Hill", "Park", "Main",
    "Sunset", "Highland", "Riverside", "Church", "Walnut", "Lincoln", "Jackson", "Willow",
];

const STREET_SUFFIXES: &[&str] = &[
    "Street", "Avenue", "Road", "Lane", "Drive", "Court", "Way", "Boulevard", "Place",
];

const CITIES: &[&str] = &[
    "Springfield", "Riverside", "Franklin", "Greenville", "Bristol", "Clinton", "Fairview",
    "Salem", "Madison", "Georgetown", "Arlington", "Ashland", "Dover", "Oxford", "Jackson",
    "Burlington", "Manchester", "Milton", "Newport", "Auburn", "Dayton", "Lexington",
];

const STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];

const WORDS: &[&str] = &[
    "pain", "since", "yesterday", "worse", "after", "eating", "mild", "fever", "and", "cough",
    "shortness", "of", "breath", "when", "walking", "dizzy", "spells", "at", "night", "lower",
    "back", "swelling", "in", "left", "ankle", "headache", "for", "three", "days", "nausea",
    "chest", "tightness", "follow", "up", "on", "medication", "refill", "needed", "fatigue",
    "rash", "right", "arm", "sore", "throat", "blurred", "vision", "morning",
];

fn pick<R: Rng>(rng: &mut R, words: &'static [&'static str]) -> &'static str {
    words.choose(rng).copied().unwrap_or_default()
}

/// A first name.
pub fn first_name<R: Rng>(rng: &mut R) -> String {
    pick(rng, FIRST_NAMES).to_owned()
}

/// A last name.
pub fn last_name<R: Rng>(rng: &mut R) -> String {
    pick(rng, LAST_NAMES).to_owned()
}

/// A social security number in `AAA-GG-SSSS` form, avoiding never-issued area numbers.
pub fn ssn<R: Rng>(rng: &mut R) -> String {
    let area = loop {
        let area = rng.random_range(1..=899);
        if area != 666 {
            break area;
        }
    };
    let group = rng.random_range(1..=99);
    let serial = rng.random_range(1..=9999);
    format!("{area:03}-{group:02}-{serial:04}")
}

/// An email address on a reserved example domain.
pub fn email<R: Rng>(rng: &mut R, first_name: &str, last_name: &str) -> String {
    let number = rng.random_range(1..=99);
    let domain = pick(rng, EMAIL_DOMAINS);
    format!(
        "{}.{}{number}@{domain}",
        first_name.to_lowercase(),
        last_name.to_lowercase()
    )
}

/// A phone number in `(NXX) NXX-XXXX` form.
pub fn phone_number<R: Rng>(rng: &mut R) -> String {
    let area = rng.random_range(201..=989);
    let exchange = rng.random_range(200..=999);
    let line = rng.random_range(0..=9999);
    format!("({area}) {exchange}-{line:04}")
}

/// A street address such as `1742 Maple Avenue`.
pub fn street_address<R: Rng>(rng: &mut R) -> String {
    let number = rng.random_range(1..=9999);
    let name = pick(rng, STREET_NAMES);
    let suffix = pick(rng, STREET_SUFFIXES);
    format!("{number} {name} {suffix}")
}

/// A city name.
pub fn city<R: Rng>(rng: &mut R) -> String {
    pick(rng, CITIES).to_owned()
}

/// A two-letter state abbreviation.
pub fn state_abbr<R: Rng>(rng: &mut R) -> String {
    pick(rng, STATES).to_owned()
}

/// A five-digit ZIP code.
pub fn zip_code<R: Rng>(rng: &mut R) -> String {
    format!("{:05}", rng.random_range(501..=99950))
}

/// A capitalized sentence of `words` words ending in a period.
pub fn sentence<R: Rng>(rng: &mut R, words: usize) -> String {
    let mut sentence = String::new();
    for i in 0..words {
        let word = pick(rng, WORDS);
        if i == 0 {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                sentence.extend(first.to_uppercase());
                sentence.push_str(chars.as_str());
            }
        } else {
            sentence.push(' ');
            sentence.push_str(word);
        }
    }
    sentence.push('.');
    sentence
}
