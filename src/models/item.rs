//! Practice items, tactical tags and difficulty tiers.
//!
//! Epistemic foundation:
//! - K_i: Items are read-only once ingested
//! - K_i: Tag and tier vocabularies are closed; anything else is carried
//!   verbatim in an explicit unknown variant instead of silently passing
//! - B_i: Optional provenance may be missing → Option

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Tactical theme an item exemplifies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tag {
    Fork,
    Pin,
    Skewer,
    DiscoveredAttack,
    Mate,
    MateIn1,
    MateIn2,
    Sacrifice,
    Deflection,
    Attraction,
    /// Generic fallback for items carrying no tag at all
    Tactics,
    /// Token outside the known vocabulary, kept as written
    Other(String),
}

impl Tag {
    /// Every known tag, in registry order.
    pub const KNOWN: [Tag; 11] = [
        Tag::Fork,
        Tag::Pin,
        Tag::Skewer,
        Tag::DiscoveredAttack,
        Tag::Mate,
        Tag::MateIn1,
        Tag::MateIn2,
        Tag::Sacrifice,
        Tag::Deflection,
        Tag::Attraction,
        Tag::Tactics,
    ];

    /// Parse a tag token. Never fails; unrecognized tokens become `Other`.
    ///
    /// Accepts the canonical camelCase token as well as lower/snake forms
    /// (`discovered_attack`, `matein1`).
    pub fn parse(token: &str) -> Self {
        let trimmed = token.trim();
        let folded: String = trimmed
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "fork" => Tag::Fork,
            "pin" => Tag::Pin,
            "skewer" => Tag::Skewer,
            "discoveredattack" => Tag::DiscoveredAttack,
            "mate" => Tag::Mate,
            "matein1" => Tag::MateIn1,
            "matein2" => Tag::MateIn2,
            "sacrifice" => Tag::Sacrifice,
            "deflection" => Tag::Deflection,
            "attraction" => Tag::Attraction,
            "tactics" => Tag::Tactics,
            _ => Tag::Other(trimmed.to_string()),
        }
    }

    /// Canonical token.
    pub fn as_str(&self) -> &str {
        match self {
            Tag::Fork => "fork",
            Tag::Pin => "pin",
            Tag::Skewer => "skewer",
            Tag::DiscoveredAttack => "discoveredAttack",
            Tag::Mate => "mate",
            Tag::MateIn1 => "mateIn1",
            Tag::MateIn2 => "mateIn2",
            Tag::Sacrifice => "sacrifice",
            Tag::Deflection => "deflection",
            Tag::Attraction => "attraction",
            Tag::Tactics => "tactics",
            Tag::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Tag::Other(_))
    }

    /// Teaching information for this tag.
    pub fn info(&self) -> TagInfo {
        let known = |display_name: &str, description: &str, key_concepts: &[&str]| TagInfo {
            display_name: display_name.to_string(),
            description: description.to_string(),
            key_concepts: key_concepts.iter().map(|c| c.to_string()).collect(),
        };

        match self {
            Tag::Fork => known(
                "Fork Tactics",
                "Master the art of attacking two pieces simultaneously",
                &["double_attack", "piece_coordination", "material_gain"],
            ),
            Tag::Pin => known(
                "Pin Tactics",
                "Learn to immobilize opponent pieces effectively",
                &["absolute_pin", "relative_pin", "pin_breaking"],
            ),
            Tag::Skewer => known(
                "Skewer Tactics",
                "Force valuable pieces to move and capture what's behind",
                &["x_ray_attack", "piece_alignment", "forcing_moves"],
            ),
            Tag::DiscoveredAttack => known(
                "Discovered Attack",
                "Unleash hidden power by moving blocking pieces",
                &["discovery", "double_threat", "piece_coordination"],
            ),
            Tag::Mate => known(
                "Checkmate Patterns",
                "Deliver decisive checkmate attacks",
                &["mating_patterns", "king_safety", "forcing_sequences"],
            ),
            Tag::MateIn1 => known(
                "Mate in One",
                "Find immediate checkmate opportunities",
                &["pattern_recognition", "tactical_vision", "quick_calculation"],
            ),
            Tag::MateIn2 => known(
                "Mate in Two",
                "Execute two-move checkmate sequences",
                &["calculation", "forcing_moves", "mating_nets"],
            ),
            Tag::Sacrifice => known(
                "Tactical Sacrifices",
                "Invest material for decisive advantage",
                &["material_investment", "compensation", "calculation"],
            ),
            Tag::Deflection => known(
                "Deflection Tactics",
                "Remove key defending pieces",
                &["overloaded_pieces", "defensive_duties", "tactical_shots"],
            ),
            Tag::Attraction => known(
                "Attraction Tactics",
                "Lure pieces to vulnerable squares",
                &["piece_misdirection", "tactical_themes", "decoy_sacrifice"],
            ),
            Tag::Tactics | Tag::Other(_) => {
                let spaced = self.as_str().replace('_', " ");
                TagInfo {
                    display_name: title_case(&spaced),
                    description: format!("Learn {spaced} tactical patterns"),
                    key_concepts: vec![
                        "pattern_recognition".to_string(),
                        "calculation".to_string(),
                        "tactical_vision".to_string(),
                    ],
                }
            }
        }
    }
}

pub(crate) fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

impl From<String> for Tag {
    fn from(s: String) -> Self {
        Tag::parse(&s)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.as_str().to_string()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-facing description of a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub display_name: String,
    pub description: String,
    pub key_concepts: Vec<String>,
}

/// Skill band used to filter items and title lessons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tier {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Unknown(String),
}

impl Tier {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "beginner" => Tier::Beginner,
            "intermediate" => Tier::Intermediate,
            "advanced" => Tier::Advanced,
            "expert" => Tier::Expert,
            _ => Tier::Unknown(token.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Tier::Beginner => "beginner",
            Tier::Intermediate => "intermediate",
            Tier::Advanced => "advanced",
            Tier::Expert => "expert",
            Tier::Unknown(raw) => raw,
        }
    }

    /// Fixed rating table for this tier. `None` for unknown tiers.
    pub fn rating_band(&self) -> Option<RatingBand> {
        let band = |min, optimal, max| Some(RatingBand { min, optimal, max });
        match self {
            Tier::Beginner => band(600, 900, 1200),
            Tier::Intermediate => band(1200, 1500, 1800),
            Tier::Advanced => band(1800, 2100, 2400),
            Tier::Expert => band(2400, 2700, 3000),
            Tier::Unknown(_) => None,
        }
    }

    /// Tier an item of the given rating falls into.
    pub fn for_rating(rating: u32) -> Self {
        match rating {
            r if r < 1200 => Tier::Beginner,
            r if r < 1800 => Tier::Intermediate,
            r if r < 2400 => Tier::Advanced,
            _ => Tier::Expert,
        }
    }

    /// Prefix used when titling a lesson at this tier.
    pub fn title_prefix(&self) -> &'static str {
        match self {
            Tier::Beginner => "Introduction to",
            Tier::Intermediate | Tier::Unknown(_) => "Mastering",
            Tier::Advanced => "Advanced",
            Tier::Expert => "Expert-Level",
        }
    }
}

impl From<String> for Tier {
    fn from(s: String) -> Self {
        Tier::parse(&s)
    }
}

impl From<Tier> for String {
    fn from(tier: Tier) -> Self {
        tier.as_str().to_string()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tier rating table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingBand {
    pub min: u32,
    pub optimal: u32,
    pub max: u32,
}

impl RatingBand {
    /// Largest distance from the optimum that still lies inside the band.
    pub fn half_width(&self) -> u32 {
        (self.optimal - self.min).max(self.max - self.optimal)
    }
}

/// Coarse difficulty label produced by the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

/// Where an item came from and how often it was played.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// A curated position with a known correct continuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeItem {
    pub id: String,
    /// FEN string
    pub position: String,
    /// Solution in UCI notation
    pub solution: Vec<String>,
    pub tags: Vec<Tag>,
    pub rating: u32,
    /// Curated quality in [0, 1]
    pub quality: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    pub primary_tag: Tag,
    pub tier: Tier,
    pub fingerprint: String,
}

impl PracticeItem {
    /// Build an item, deriving primary tag, tier and fingerprint.
    pub fn new(
        id: impl Into<String>,
        position: impl Into<String>,
        solution: Vec<String>,
        tags: Vec<Tag>,
        rating: u32,
        quality: f64,
    ) -> Self {
        let position = position.into();
        let tags = if tags.is_empty() { vec![Tag::Tactics] } else { tags };
        let primary_tag = tags[0].clone();
        Self {
            id: id.into(),
            fingerprint: position_fingerprint(&position),
            solution,
            primary_tag,
            tier: Tier::for_rating(rating),
            tags,
            rating,
            quality,
            provenance: None,
            position,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Override the derived primary tag.
    pub fn with_primary_tag(mut self, tag: Tag) -> Self {
        if !self.tags.contains(&tag) {
            self.tags.push(tag.clone());
        }
        self.primary_tag = tag;
        self
    }

    pub fn popularity(&self) -> Option<i32> {
        self.provenance.as_ref().and_then(|p| p.popularity)
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.primary_tag == *tag || self.tags.contains(tag)
    }

    /// Side to move, read from the FEN.
    pub fn white_to_move(&self) -> bool {
        self.position.split_whitespace().nth(1) != Some("b")
    }
}

/// Deterministic digest of a position, ignoring move counters.
pub fn position_fingerprint(fen: &str) -> String {
    let placement: Vec<&str> = fen.split_whitespace().take(4).collect();
    let digest = Sha256::digest(placement.join(" ").as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_tag_parse_forms() {
        assert_eq!(Tag::parse("discoveredAttack"), Tag::DiscoveredAttack);
        assert_eq!(Tag::parse("discovered_attack"), Tag::DiscoveredAttack);
        assert_eq!(Tag::parse("MateIn1"), Tag::MateIn1);
        assert_eq!(Tag::parse("pinn"), Tag::Other("pinn".into()));
        assert_eq!(Tag::DiscoveredAttack.to_string(), "discoveredAttack");
    }

    #[test]
    fn test_tag_serde_roundtrip_keeps_unknown() {
        let tags = vec![Tag::Pin, Tag::Other("zugzwang".into())];
        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, r#"["pin","zugzwang"]"#);
        let back: Vec<Tag> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tags);
    }

    #[test]
    fn test_unknown_tag_info_fallback() {
        let info = Tag::Other("back_rank".into()).info();
        assert_eq!(info.display_name, "Back Rank");
        assert_eq!(info.description, "Learn back rank tactical patterns");
        assert_eq!(Tag::Pin.info().display_name, "Pin Tactics");
    }

    #[test]
    fn test_tier_table_and_rating_mapping() {
        let band = Tier::Intermediate.rating_band().unwrap();
        assert_eq!((band.min, band.optimal, band.max), (1200, 1500, 1800));
        assert_eq!(band.half_width(), 300);
        assert!(Tier::parse("grandmaster").rating_band().is_none());

        assert_eq!(Tier::for_rating(1199), Tier::Beginner);
        assert_eq!(Tier::for_rating(1200), Tier::Intermediate);
        assert_eq!(Tier::for_rating(2400), Tier::Expert);
    }

    #[test]
    fn test_item_normalization() {
        let item = PracticeItem::new("a1", START, vec!["e2e4".into()], vec![], 1500, 0.8);
        assert_eq!(item.tags, vec![Tag::Tactics]);
        assert_eq!(item.primary_tag, Tag::Tactics);
        assert_eq!(item.tier, Tier::Intermediate);
        assert_eq!(item.fingerprint.len(), 16);
        assert!(item.white_to_move());
    }

    #[test]
    fn test_fingerprint_ignores_move_counters() {
        let later = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 4 9";
        assert_eq!(position_fingerprint(START), position_fingerprint(later));
        let black = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1";
        assert_ne!(position_fingerprint(START), position_fingerprint(black));
    }

    #[test]
    fn test_difficulty_ordering() {
        assert!(Difficulty::Beginner < Difficulty::Intermediate);
        assert!(Difficulty::Intermediate < Difficulty::Advanced);
    }
}
