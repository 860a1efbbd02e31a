//! Display personalities for agents and light-hearted status lines.
//!
//! Names are unique within one generator; a deployment uses one generator
//! so no two agents in the same session share a name.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::models::event::EventKind;

const NAMES: &[&str] = &[
    "Sparkle", "Tinker", "Jingle", "Pip", "Clover", "Bramble", "Fern", "Juniper", "Nutmeg",
    "Pebble", "Thistle", "Willow", "Biscuit", "Cobble", "Dandelion", "Fizz", "Hazel", "Maple",
    "Mossy", "Nimble", "Quill", "Sprocket", "Tumble", "Wren",
];

const AVATARS: &[&str] = &["🧝", "🧙", "🧚", "🧞", "🤖", "👾"];

const COLORS: &[&str] = &[
    "#FFD93D", "#FF6B6B", "#6BCB77", "#4D96FF", "#FF8B3D", "#C084FC",
];

const QUIRKS: &[&str] = &[
    "Hums while compiling",
    "Names every variable after a snack",
    "Triple-checks semicolons",
    "Talks to rubber ducks",
    "Refuses to work without tea",
    "Counts braces out loud",
    "Leaves tidy commit messages",
    "Believes every bug is a feature in disguise",
];

const SPAWN_STATUSES: &[&str] = &[
    "Lacing up tiny boots",
    "Stretching before the big task",
    "Reporting for duty",
];
const THINKING_STATUSES: &[&str] = &[
    "Pondering deeply",
    "Consulting the ancient scrolls",
    "Staring thoughtfully into the void",
];
const TOOL_CALL_STATUSES: &[&str] = &[
    "Grabbing the right tool",
    "Rummaging through the toolbox",
    "Tinkering with gadgets",
];
const TOOL_RESULT_STATUSES: &[&str] = &[
    "Inspecting the results",
    "Squinting at the output",
    "Nodding approvingly",
];
const OUTPUT_STATUSES: &[&str] = &[
    "Scribbling notes",
    "Sharing findings",
    "Explaining with wild hand gestures",
];
const CHAT_STATUSES: &[&str] = &["Whispering to a teammate", "Passing notes"];
const TASK_UPDATE_STATUSES: &[&str] = &[
    "Celebrating a job well done",
    "Doing a victory dance",
    "Throwing confetti",
];
const FILE_CHANGE_STATUSES: &[&str] = &["Rearranging the furniture", "Editing with care"];

/// Display identity assigned to an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Personality {
    /// Display name, unique within a deployment.
    pub name: String,
    /// Avatar glyph.
    pub avatar: String,
    /// Hex color.
    pub color: String,
    /// One-line quirk.
    pub quirk: String,
}

/// Random source of personalities and status lines.
#[derive(Debug)]
pub struct PersonalityGenerator {
    rng: StdRng,
    used_names: HashSet<String>,
}

impl Default for PersonalityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PersonalityGenerator {
    /// Generator seeded from system entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            used_names: HashSet::new(),
        }
    }

    /// Deterministic generator.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            used_names: HashSet::new(),
        }
    }

    /// Generate a personality whose name was not produced before by this generator.
    ///
    /// Once the name pool is exhausted, names gain a numeric suffix.
    pub fn generate(&mut self) -> Personality {
        let name = self.unique_name();
        Personality {
            name,
            avatar: pick(&mut self.rng, AVATARS).to_owned(),
            color: pick(&mut self.rng, COLORS).to_owned(),
            quirk: pick(&mut self.rng, QUIRKS).to_owned(),
        }
    }

    /// A status line for an event of `kind`.
    pub fn funny_status(&mut self, kind: EventKind) -> String {
        let pool = match kind {
            EventKind::Spawn => SPAWN_STATUSES,
            EventKind::Thinking => THINKING_STATUSES,
            EventKind::ToolCall => TOOL_CALL_STATUSES,
            EventKind::ToolResult => TOOL_RESULT_STATUSES,
            EventKind::Output => OUTPUT_STATUSES,
            EventKind::Chat => CHAT_STATUSES,
            EventKind::TaskUpdate => TASK_UPDATE_STATUSES,
            EventKind::FileChange => FILE_CHANGE_STATUSES,
        };
        pick(&mut self.rng, pool).to_owned()
    }

    fn unique_name(&mut self) -> String {
        let free: Vec<&str> = NAMES
            .iter()
            .copied()
            .filter(|name| !self.used_names.contains(*name))
            .collect();

        let name = if let Some(name) = free.choose(&mut self.rng) {
            (*name).to_owned()
        } else {
            let base = pick(&mut self.rng, NAMES);
            let mut suffix = 2_usize;
            loop {
                let candidate = format!("{base} {suffix}");
                if !self.used_names.contains(&candidate) {
                    break candidate;
                }
                suffix += 1;
            }
        };
        self.used_names.insert(name.clone());
        name
    }
}

fn pick<'a>(rng: &mut StdRng, pool: &[&'a str]) -> &'a str {
    pool[rng.gen_range(0..pool.len())]
}
