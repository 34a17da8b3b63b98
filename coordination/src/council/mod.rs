//! Council panel registry
//!
//! The fixed panel of personas that deliberate on every debate. Member
//! identities form a closed enum and the panel is a fixed-size array, so a
//! panel with the wrong number of members cannot be constructed. The panel is
//! built once at startup and shared by reference; it has no interior
//! mutability and is safe for unsynchronized concurrent reads.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Number of members on the panel.
pub const PANEL_SIZE: usize = 9;

/// Framing shared by every persona prompt.
const PERSONA_PREAMBLE: &str = "You are a member of a deliberative council. \
Each member argues from one distinct worldview. Stay in character, be concrete, \
and keep your answer to a few focused paragraphs.";

/// Stable identity of a panel member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberId {
    Pragmatist,
    Visionary,
    SystemsThinker,
    Optimist,
    DevilsAdvocate,
    Mediator,
    UserAdvocate,
    Traditionalist,
    Analyst,
}

impl MemberId {
    /// Every member, in registry order.
    pub const ALL: [MemberId; PANEL_SIZE] = [
        Self::Pragmatist,
        Self::Visionary,
        Self::SystemsThinker,
        Self::Optimist,
        Self::DevilsAdvocate,
        Self::Mediator,
        Self::UserAdvocate,
        Self::Traditionalist,
        Self::Analyst,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pragmatist => "pragmatist",
            Self::Visionary => "visionary",
            Self::SystemsThinker => "systems_thinker",
            Self::Optimist => "optimist",
            Self::DevilsAdvocate => "devils_advocate",
            Self::Mediator => "mediator",
            Self::UserAdvocate => "user_advocate",
            Self::Traditionalist => "traditionalist",
            Self::Analyst => "analyst",
        }
    }

    /// Parse a member slug.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == value)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Pragmatist => "The Pragmatist",
            Self::Visionary => "The Visionary",
            Self::SystemsThinker => "The Systems Thinker",
            Self::Optimist => "The Optimist",
            Self::DevilsAdvocate => "The Devil's Advocate",
            Self::Mediator => "The Mediator",
            Self::UserAdvocate => "The User Advocate",
            Self::Traditionalist => "The Traditionalist",
            Self::Analyst => "The Analyst",
        }
    }

    /// The worldview this member argues from.
    pub fn focus(self) -> &'static str {
        match self {
            Self::Pragmatist => {
                "Focus on practicality, feasibility, and real-world constraints.\n\
                 Consider resource limitations, time constraints, and implementation challenges.\n\
                 Prefer simple, tested approaches over experimental ones."
            }
            Self::Visionary => {
                "Focus on long-term potential and transformative possibilities.\n\
                 Consider how this could be revolutionary rather than just incremental.\n\
                 Embrace ambitious ideas even if they seem challenging today."
            }
            Self::SystemsThinker => {
                "Focus on system-level effects and interconnections.\n\
                 Consider feedback loops, dependencies, and cascading consequences.\n\
                 Look for patterns and second-order effects."
            }
            Self::Optimist => {
                "Focus on opportunities and positive possibilities.\n\
                 Emphasize strengths, advantages, and potential benefits.\n\
                 Approach challenges with enthusiasm and confidence."
            }
            Self::DevilsAdvocate => {
                "Focus on potential flaws, risks, and alternative viewpoints.\n\
                 Challenge assumptions and explore what could go wrong.\n\
                 Ask the questions others might be afraid to ask."
            }
            Self::Mediator => {
                "Focus on finding common ground and shared interests.\n\
                 Look for ways to integrate different perspectives into a balanced solution.\n\
                 Emphasize collaboration and mutual understanding."
            }
            Self::UserAdvocate => {
                "Focus on user experience, accessibility, and inclusion.\n\
                 Consider diverse user needs and potential barriers.\n\
                 Prioritize intuitive, user-friendly design."
            }
            Self::Traditionalist => {
                "Focus on historical precedents and proven methods.\n\
                 Consider what has worked well in the past and why.\n\
                 Value stability and evolution over revolution."
            }
            Self::Analyst => {
                "Focus on data, metrics, and objective evidence.\n\
                 Break down problems systematically and quantifiably.\n\
                 Demand evidence for claims and predictions."
            }
        }
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fixed participant persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelMember {
    pub id: MemberId,
    pub display_name: String,
    /// System context injected as persona framing on every call.
    pub persona_prompt: String,
}

impl PanelMember {
    /// Build a member with its built-in persona prompt.
    pub fn builtin(id: MemberId) -> Self {
        Self {
            id,
            display_name: id.display_name().to_string(),
            persona_prompt: format!(
                "{}\n\nYou are {}.\n\n{}",
                PERSONA_PREAMBLE,
                id.display_name(),
                id.focus()
            ),
        }
    }
}

/// The immutable panel of council members, in registry order.
#[derive(Debug, Clone)]
pub struct Panel {
    members: [PanelMember; PANEL_SIZE],
}

impl Panel {
    /// The reference panel with built-in persona prompts.
    pub fn builtin() -> Self {
        Self {
            members: MemberId::ALL.map(PanelMember::builtin),
        }
    }

    /// Replace persona prompts with `<dir>/<member_id>.md` where such a file
    /// exists. Members without a file keep their built-in prompt.
    pub fn with_prompt_overrides(mut self, dir: &Path) -> std::io::Result<Self> {
        let mut overridden = 0usize;
        for member in self.members.iter_mut() {
            let path = dir.join(format!("{}.md", member.id));
            if !path.is_file() {
                continue;
            }
            let prompt = std::fs::read_to_string(&path)?;
            if prompt.trim().is_empty() {
                debug!(member = %member.id, path = %path.display(), "ignoring empty persona override");
                continue;
            }
            member.persona_prompt = prompt;
            overridden += 1;
        }
        info!(dir = %dir.display(), overridden, "loaded persona prompt overrides");
        Ok(self)
    }

    /// Look up a member by id.
    pub fn get(&self, id: MemberId) -> &PanelMember {
        // Registry order equals `MemberId::ALL` order.
        &self.members[id as usize]
    }

    /// Look up a member by slug.
    pub fn find(&self, id: &str) -> Option<&PanelMember> {
        MemberId::parse(id).map(|id| self.get(id))
    }

    /// All members in registry order.
    pub fn all(&self) -> &[PanelMember; PANEL_SIZE] {
        &self.members
    }

    pub fn is_valid_id(&self, id: &str) -> bool {
        MemberId::parse(id).is_some()
    }

    /// Number of members (always [`PANEL_SIZE`]).
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

impl Default for Panel {
    fn default() -> Self {
        Self::builtin()
    }
}
