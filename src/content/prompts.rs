//! Prompt construction for lesson text.
//!
//! Each lesson component has one brief per tier. An unknown tier borrows
//! the intermediate brief.

use crate::models::{PracticeItem, TagInfo, Tier};

/// Per-tier instructions for one lesson component.
struct Brief {
    /// Register of the request ("beginner-friendly", "advanced" ...)
    register: &'static str,
    goals: [&'static str; 4],
    style: &'static str,
    words: &'static str,
}

/// Statistics about the examples a lesson covers.
#[derive(Debug, Clone, Copy)]
pub struct ExampleStats {
    pub count: usize,
    pub avg_rating: u32,
}

impl ExampleStats {
    /// Count and mean rating. An empty slice reports 1500.
    pub fn from_items(items: &[PracticeItem]) -> Self {
        let avg_rating = if items.is_empty() {
            1500
        } else {
            let total: u64 = items.iter().map(|i| u64::from(i.rating)).sum();
            (total / items.len() as u64) as u32
        };
        Self {
            count: items.len(),
            avg_rating,
        }
    }
}

fn introduction_brief(tier: &Tier) -> Brief {
    match tier {
        Tier::Beginner => Brief {
            register: "a beginner-friendly",
            goals: [
                "Explains what {theme} is in simple terms",
                "Shows why it matters in real games",
                "Describes what the student will learn in this lesson",
                "Encourages patient practice",
            ],
            style: "Keep the language simple and motivating.",
            words: "150-200",
        },
        Tier::Advanced => Brief {
            register: "an advanced",
            goals: [
                "Explores the deeper strategic implications",
                "Discusses the positional requirements and setups",
                "Mentions psychological and practical considerations",
                "Connects the motif to broader chess understanding",
            ],
            style: "Assume strong chess knowledge.",
            words: "250-300",
        },
        Tier::Expert => Brief {
            register: "an expert-level",
            goals: [
                "Analyzes the concept from several perspectives",
                "Discusses rare variations and exceptional cases",
                "Connects the motif to opening theory and endgames",
                "Gives insights for competitive play",
            ],
            style: "Use advanced terminology freely.",
            words: "300-350",
        },
        Tier::Intermediate | Tier::Unknown(_) => Brief {
            register: "an intermediate-level",
            goals: [
                "Explains the tactical concept and its variations",
                "Discusses when and how to look for the opportunity",
                "Mentions common patterns and setups",
                "Sets expectations for the examples that follow",
            ],
            style: "Use chess terminology where it helps.",
            words: "200-250",
        },
    }
}

fn solution_brief(tier: &Tier) -> Brief {
    match tier {
        Tier::Beginner => Brief {
            register: "a beginner",
            goals: [
                "Describes what to look for in the position",
                "Explains the key tactical idea step by step",
                "Shows why the solution works",
                "Points out what makes this a good example of {theme}",
            ],
            style: "Use simple language and explain each move clearly.",
            words: "100-150",
        },
        Tier::Advanced => Brief {
            register: "an advanced",
            goals: [
                "Examines the positional factors that enable the tactic",
                "Analyzes the calculation required",
                "Discusses defensive resources and refutations",
                "Connects to similar patterns",
            ],
            style: "Assume strong analytical skills.",
            words: "200-250",
        },
        Tier::Expert => Brief {
            register: "an expert",
            goals: [
                "Explores every critical variation",
                "Discusses the precise move-order requirements",
                "Analyzes psychological and practical aspects",
                "Gives insights for similar positions",
            ],
            style: "Use precise evaluation.",
            words: "250-300",
        },
        Tier::Intermediate | Tier::Unknown(_) => Brief {
            register: "an intermediate",
            goals: [
                "Identifies the key features of the position",
                "Explains the tactical motif and its execution",
                "Discusses tempting alternatives and why they fail",
                "Highlights the learning points",
            ],
            style: "Use standard notation and terminology.",
            words: "150-200",
        },
    }
}

fn summary_brief(tier: &Tier) -> Brief {
    match tier {
        Tier::Beginner => Brief {
            register: "beginner",
            goals: [
                "Reviews the main points learned",
                "Gives simple tips for recognizing {theme}",
                "Suggests how to practice these patterns",
                "Encourages continued learning",
            ],
            style: "Keep it encouraging and practical.",
            words: "150-200",
        },
        Tier::Advanced => Brief {
            register: "advanced",
            goals: [
                "Distills the essential principles",
                "Discusses application in competitive play",
                "Suggests advanced training approaches",
                "Offers insights for teaching others",
            ],
            style: "Assume deep chess understanding.",
            words: "250-300",
        },
        Tier::Expert => Brief {
            register: "expert",
            goals: [
                "Provides deep insights and principles",
                "Discusses current top-level understanding",
                "Suggests directions for further analysis",
                "Connects to the highest level of play",
            ],
            style: "Use advanced concepts and terminology.",
            words: "300-350",
        },
        Tier::Intermediate | Tier::Unknown(_) => Brief {
            register: "intermediate",
            goals: [
                "Synthesizes the key learning points",
                "Gives practical advice for applying them in games",
                "Suggests training methods and exercises",
                "Connects to broader tactical understanding",
            ],
            style: "Give clear, actionable advice.",
            words: "200-250",
        },
    }
}

fn render_goals(brief: &Brief, theme: &str) -> String {
    brief
        .goals
        .iter()
        .enumerate()
        .map(|(i, goal)| format!("{}. {}", i + 1, goal.replace("{theme}", theme)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn tier_label(tier: &Tier) -> &str {
    match tier {
        Tier::Unknown(_) => "intermediate",
        other => other.as_str(),
    }
}

/// Prompt for the lesson introduction.
pub fn introduction(tier: &Tier, info: &TagInfo, stats: ExampleStats) -> String {
    let brief = introduction_brief(tier);
    let theme = &info.display_name;
    format!(
        "Create {register} introduction to {theme}.\n\n\
         Theme: {theme}\n\
         Description: {description}\n\
         Key Concepts: {concepts}\n\
         Difficulty: {tier}\n\
         Example Count: {count}\n\
         Average Rating: {rating}\n\n\
         Write an introduction that:\n{goals}\n\n\
         {style} Use around {words} words.",
        register = brief.register,
        description = info.description,
        concepts = info.key_concepts.join(", "),
        tier = tier_label(tier),
        count = stats.count,
        rating = stats.avg_rating,
        goals = render_goals(&brief, theme),
        style = brief.style,
        words = brief.words,
    )
}

/// Prompt presenting a position without revealing its solution.
pub fn presentation(item: &PracticeItem, tier: &Tier, info: &TagInfo) -> String {
    format!(
        "Present this chess puzzle to a {tier} level student.\n\n\
         Position: {fen}\n\
         Theme: {theme}\n\
         Rating: {rating}\n\
         Quality: {quality:.2}\n\n\
         Create engaging content that:\n\
         1. Sets up the position and asks the student to find the best move\n\
         2. Gives hints about what to look for\n\
         3. Mentions the tactical theme without giving away the solution\n\
         4. Encourages careful analysis\n\n\
         Keep it concise. Around 80-120 words.",
        tier = tier_label(tier),
        fen = item.position,
        theme = info.display_name,
        rating = item.rating,
        quality = item.quality,
    )
}

/// Prompt walking through the solution of one example.
pub fn solution(item: &PracticeItem, tier: &Tier, info: &TagInfo) -> String {
    let brief = solution_brief(tier);
    let theme = &info.display_name;
    let tags: Vec<&str> = item.tags.iter().take(3).map(|t| t.as_str()).collect();
    format!(
        "Analyze this chess puzzle for {register} student.\n\n\
         Position: {fen}\n\
         Theme: {theme}\n\
         Solution: {moves}\n\
         Rating: {rating}\n\
         Puzzle Themes: {tags}\n\n\
         Provide an analysis that:\n{goals}\n\n\
         {style} Around {words} words.",
        register = brief.register,
        fen = item.position,
        moves = leading_moves(&item.solution, 3),
        rating = item.rating,
        tags = tags.join(", "),
        goals = render_goals(&brief, theme),
        style = brief.style,
        words = brief.words,
    )
}

/// Prompt for the deeper analysis step.
pub fn analysis(item: &PracticeItem, tier: &Tier, info: &TagInfo) -> String {
    let tags: Vec<&str> = item.tags.iter().map(|t| t.as_str()).collect();
    format!(
        "Provide detailed analysis of this {theme} puzzle.\n\n\
         Position: {fen}\n\
         Solution: {moves}\n\
         Rating: {rating}\n\
         Themes: {tags}\n\n\
         For a {tier} level student, explain:\n\
         1. Why the key move works tactically\n\
         2. What the opponent's best defenses are\n\
         3. Which patterns to remember\n\
         4. How this applies to practical play\n\n\
         Match the depth to the skill level. Around 150-200 words.",
        theme = info.display_name.to_lowercase(),
        fen = item.position,
        moves = item.solution.join(" "),
        rating = item.rating,
        tags = tags.join(", "),
        tier = tier_label(tier),
    )
}

/// Prompt for the closing summary.
pub fn summary(tier: &Tier, info: &TagInfo, stats: ExampleStats) -> String {
    let brief = summary_brief(tier);
    let theme = &info.display_name;
    format!(
        "Create a lesson summary for {register} students.\n\n\
         Theme: {theme}\n\
         Examples Covered: {count}\n\
         Key Concepts: {concepts}\n\n\
         Write a summary that:\n{goals}\n\n\
         {style} Around {words} words.",
        register = brief.register,
        count = stats.count,
        concepts = info.key_concepts.join(", "),
        goals = render_goals(&brief, theme),
        style = brief.style,
        words = brief.words,
    )
}

/// First `n` moves joined by spaces.
pub fn leading_moves(moves: &[String], n: usize) -> String {
    moves.iter().take(n).cloned().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tag;

    fn item() -> PracticeItem {
        PracticeItem::new(
            "p1",
            "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1",
            vec!["d1d8".into(), "g8h7".into(), "d8h8".into(), "h7h8".into()],
            vec![Tag::Pin, Tag::MateIn1],
            1400,
            0.8,
        )
    }

    #[test]
    fn test_introduction_carries_theme_and_stats() {
        let info = Tag::Pin.info();
        let stats = ExampleStats {
            count: 6,
            avg_rating: 1512,
        };
        let prompt = introduction(&Tier::Beginner, &info, stats);
        assert!(prompt.contains("Pin Tactics"));
        assert!(prompt.contains("Example Count: 6"));
        assert!(prompt.contains("Average Rating: 1512"));
        assert!(prompt.contains("absolute_pin, relative_pin"));
        assert!(prompt.contains("150-200"));
    }

    #[test]
    fn test_unknown_tier_uses_intermediate_brief() {
        let info = Tag::Fork.info();
        let stats = ExampleStats {
            count: 3,
            avg_rating: 1500,
        };
        let unknown = summary(&Tier::Unknown("grandmaster".into()), &info, stats);
        let intermediate = summary(&Tier::Intermediate, &info, stats);
        assert_eq!(unknown, intermediate);
    }

    #[test]
    fn test_solution_prompt_limits_moves() {
        let prompt = solution(&item(), &Tier::Advanced, &Tag::Pin.info());
        assert!(prompt.contains("Solution: d1d8 g8h7 d8h8\n"));
        assert!(prompt.contains("Puzzle Themes: pin, mateIn1"));
    }

    #[test]
    fn test_example_stats() {
        let stats = ExampleStats::from_items(&[item(), item()]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.avg_rating, 1400);
        assert_eq!(ExampleStats::from_items(&[]).avg_rating, 1500);
    }
}
