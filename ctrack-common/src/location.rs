//! Closed set of reporting locations
//!
//! One country-level value plus one value per state, district and territory reported by the
//! daily feeds. Every location carries a stable two-letter code; the code is the join key
//! between feeds and the key used in the database.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

macro_rules! locations {
    ($($variant:ident => ($code:literal, $name:literal)),+ $(,)?) => {
        /// Reporting location
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Location {
            $($variant),+
        }

        impl Location {
            const ALL: &'static [Location] = &[$(Location::$variant),+];

            /// Stable short code (`US`, `NY`, ...)
            pub fn code(&self) -> &'static str {
                match self {
                    $(Location::$variant => $code),+
                }
            }

            /// Display name as published by the feeds
            pub fn name(&self) -> &'static str {
                match self {
                    $(Location::$variant => $name),+
                }
            }
        }
    };
}

locations! {
    UnitedStates => ("US", "United States"),
    Alabama => ("AL", "Alabama"),
    Alaska => ("AK", "Alaska"),
    AmericanSamoa => ("AS", "American Samoa"),
    Arizona => ("AZ", "Arizona"),
    Arkansas => ("AR", "Arkansas"),
    California => ("CA", "California"),
    Colorado => ("CO", "Colorado"),
    Connecticut => ("CT", "Connecticut"),
    Delaware => ("DE", "Delaware"),
    DistrictOfColumbia => ("DC", "District of Columbia"),
    Florida => ("FL", "Florida"),
    Georgia => ("GA", "Georgia"),
    Guam => ("GU", "Guam"),
    Hawaii => ("HI", "Hawaii"),
    Idaho => ("ID", "Idaho"),
    Illinois => ("IL", "Illinois"),
    Indiana => ("IN", "Indiana"),
    Iowa => ("IA", "Iowa"),
    Kansas => ("KS", "Kansas"),
    Kentucky => ("KY", "Kentucky"),
    Louisiana => ("LA", "Louisiana"),
    Maine => ("ME", "Maine"),
    Maryland => ("MD", "Maryland"),
    Massachusetts => ("MA", "Massachusetts"),
    Michigan => ("MI", "Michigan"),
    Minnesota => ("MN", "Minnesota"),
    Mississippi => ("MS", "Mississippi"),
    Missouri => ("MO", "Missouri"),
    Montana => ("MT", "Montana"),
    Nebraska => ("NE", "Nebraska"),
    Nevada => ("NV", "Nevada"),
    NewHampshire => ("NH", "New Hampshire"),
    NewJersey => ("NJ", "New Jersey"),
    NewMexico => ("NM", "New Mexico"),
    NewYork => ("NY", "New York"),
    NorthCarolina => ("NC", "North Carolina"),
    NorthDakota => ("ND", "North Dakota"),
    NorthernMarianaIslands => ("MP", "Northern Mariana Islands"),
    Ohio => ("OH", "Ohio"),
    Oklahoma => ("OK", "Oklahoma"),
    Oregon => ("OR", "Oregon"),
    Pennsylvania => ("PA", "Pennsylvania"),
    PuertoRico => ("PR", "Puerto Rico"),
    RhodeIsland => ("RI", "Rhode Island"),
    SouthCarolina => ("SC", "South Carolina"),
    SouthDakota => ("SD", "South Dakota"),
    Tennessee => ("TN", "Tennessee"),
    Texas => ("TX", "Texas"),
    Utah => ("UT", "Utah"),
    Vermont => ("VT", "Vermont"),
    VirginIslands => ("VI", "Virgin Islands"),
    Virginia => ("VA", "Virginia"),
    Washington => ("WA", "Washington"),
    WestVirginia => ("WV", "West Virginia"),
    Wisconsin => ("WI", "Wisconsin"),
    Wyoming => ("WY", "Wyoming"),
}

/// Alternate spellings used by the vaccination feeds
const FEED_ALIASES: &[(&str, Location)] = &[
    ("New York State", Location::NewYork),
    ("United States Virgin Islands", Location::VirginIslands),
];

impl Location {
    /// The single country-level location
    pub const COUNTRY: Location = Location::UnitedStates;

    /// Every location, country first
    pub fn all() -> &'static [Location] {
        Self::ALL
    }

    /// Resolve a location from its stable code (exact match)
    pub fn from_code(code: &str) -> Option<Location> {
        Self::ALL.iter().copied().find(|l| l.code() == code)
    }

    /// Resolve a location from the name used in a feed's location column
    ///
    /// Exact match against display names and the known feed aliases. Federal agencies and
    /// other non-geographic rows in the feeds resolve to `None`.
    pub fn from_feed_name(name: &str) -> Option<Location> {
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.name() == name)
            .or_else(|| {
                FEED_ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == name)
                    .map(|(_, location)| *location)
            })
    }

    /// True for the country-level aggregate
    pub fn is_country(&self) -> bool {
        *self == Self::COUNTRY
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Location::from_code(&code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown location code: {}", code)))
    }
}
