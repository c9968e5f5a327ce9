//! Deterministic lesson text used when generation is unavailable or its
//! output is rejected.

use super::prompts::{leading_moves, ExampleStats};
use crate::models::{title_case, PracticeItem, StepKind, Tag, Tier};

pub fn introduction(tag: &Tag, tier: &Tier, stats: ExampleStats) -> String {
    let info = tag.info();
    let concepts: Vec<String> = info
        .key_concepts
        .iter()
        .map(|c| format!("• {}", title_case(&c.replace('_', " "))))
        .collect();

    format!(
        "Welcome to {name}!\n\n\
         {description}\n\n\
         In this {tier} level lesson you will work through {count} carefully selected \
         puzzles with an average rating of {rating}. Each example shows a {token} \
         pattern that will sharpen your tactical vision.\n\n\
         Key concepts you will learn:\n{concepts}\n\n\
         Take your time with each position and look for the underlying pattern. \
         Let's begin!",
        name = info.display_name,
        description = info.description,
        tier = tier,
        count = stats.count,
        rating = stats.avg_rating,
        token = tag.as_str(),
        concepts = concepts.join("\n"),
    )
}

pub fn summary(tag: &Tag, stats: ExampleStats) -> String {
    let info = tag.info();
    let token = tag.as_str();
    format!(
        "Lesson Summary: {name}\n\n\
         You have completed {count} {token} puzzles. The key takeaways:\n\n\
         • Look for {token} opportunities when pieces are aligned or overloaded\n\
         • Calculate forcing sequences carefully\n\
         • Practice recognizing the pattern in your own games\n\
         • Revisit these positions periodically to reinforce the ideas\n\n\
         Keep practicing and you will start spotting {token} chances automatically.",
        name = info.display_name,
        count = stats.count,
    )
}

/// Plain body for one step of one example.
pub fn step(item: &PracticeItem, kind: StepKind) -> String {
    match kind {
        StepKind::Presentation => {
            let side = if item.white_to_move() { "White" } else { "Black" };
            format!("Find the best move for {side} in this position.")
        }
        StepKind::Solution => {
            format!("The solution is: {}", leading_moves(&item.solution, 3))
        }
        StepKind::Analysis => {
            let first = item.solution.first().map(String::as_str).unwrap_or("the key move");
            format!(
                "Study why {first} works here. Note which pieces are tied down, \
                 what the defender's best tries are, and how the {theme} idea \
                 decides the position. Rating: {rating}.",
                theme = item.primary_tag.info().display_name.to_lowercase(),
                rating = item.rating,
            )
        }
    }
}
