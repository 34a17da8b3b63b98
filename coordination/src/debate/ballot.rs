//! Ballots and the vote response protocol
//!
//! Each voter sees every opinion except its own, numbered from 1 in panel
//! order. The voter must answer in this line-oriented format:
//!
//! ```text
//! response  := .* vote-line .* reason-tag reasoning
//! vote-line := "VOTE" ws* ":" ws* "Option" ws* "#"? digits ...
//! reason-tag:= "REASONING" ws* ":"
//! reasoning := everything after the tag, across lines, trimmed
//! ```
//!
//! Tags are case-insensitive. The first `VOTE:` line wins. A missing tag is
//! a parse failure; a present but empty `REASONING:` becomes
//! [`NO_REASONING`].

use std::sync::LazyLock;

use regex::Regex;

use crate::council::MemberId;
use crate::state::Opinion;

/// Stored reasoning when the voter gave the tag but no text.
pub const NO_REASONING: &str = "No reasoning provided";

static VOTE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[^\n]*?\bVOTE\s*:(.*)$").expect("VOTE_LINE regex should compile")
});
static OPTION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bOption\b\s*#?\s*(\S*)").expect("OPTION_TOKEN regex should compile")
});
static REASONING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bREASONING\s*:(.*)").expect("REASONING regex should compile")
});

/// Why a vote response could not be turned into a vote.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteParseError {
    #[error("response has no VOTE: line")]
    MissingVoteLine,

    #[error("VOTE line does not name an Option")]
    MissingOption,

    #[error("VOTE option is not a number: {0:?}")]
    NonNumericOption(String),

    #[error("response has no REASONING: section")]
    MissingReasoning,

    #[error("invalid vote option: {option} (ballot has {ballot_size} options)")]
    InvalidOption { option: String, ballot_size: usize },
}

/// A parsed but not yet resolved vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteResponse {
    /// 1-based ballot position.
    pub option: usize,
    pub reasoning: String,
}

/// Parse a voter's raw answer against a ballot of `ballot_size` options.
///
/// The `VOTE:` tag may follow a list marker or emphasis on its line. The
/// option must fall in `1..=ballot_size`.
pub fn parse_vote_response(
    raw: &str,
    ballot_size: usize,
) -> Result<VoteResponse, VoteParseError> {
    let vote_line = VOTE_LINE
        .captures(raw)
        .and_then(|c| c.get(1))
        .ok_or(VoteParseError::MissingVoteLine)?
        .as_str();

    let token = OPTION_TOKEN
        .captures(vote_line)
        .and_then(|c| c.get(1))
        .ok_or(VoteParseError::MissingOption)?
        .as_str();

    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(VoteParseError::NonNumericOption(token.to_string()));
    }
    // Too large for usize is out of range for any ballot.
    let option = digits
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=ballot_size).contains(n))
        .ok_or(VoteParseError::InvalidOption {
            option: digits,
            ballot_size,
        })?;

    let reasoning = REASONING
        .captures(raw)
        .and_then(|c| c.get(1))
        .ok_or(VoteParseError::MissingReasoning)?
        .as_str()
        .trim();

    Ok(VoteResponse {
        option,
        reasoning: if reasoning.is_empty() {
            NO_REASONING.to_string()
        } else {
            reasoning.to_string()
        },
    })
}

/// The opinions one voter may choose from.
#[derive(Debug, Clone)]
pub struct Ballot<'a> {
    entries: Vec<&'a Opinion>,
}

impl<'a> Ballot<'a> {
    /// Every opinion not authored by `voter`, in the given order.
    pub fn for_voter(voter: MemberId, opinions: &'a [Opinion]) -> Self {
        Self {
            entries: opinions.iter().filter(|o| o.member_id != voter).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map a 1-based option number to its opinion.
    pub fn resolve(&self, option: usize) -> Result<&'a Opinion, VoteParseError> {
        option
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .copied()
            .ok_or_else(|| VoteParseError::InvalidOption {
                option: option.to_string(),
                ballot_size: self.entries.len(),
            })
    }

    /// The voting prompt shown to `voter_name`.
    pub fn render_prompt(&self, topic: &str, voter_name: &str) -> String {
        let options = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, o)| format!("**Option {}:** {}\n{}", i + 1, o.member_name, o.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "As {voter_name}, review the following council member opinions on the topic \
             \"{topic}\" and vote for the one you find most compelling. \
             You cannot vote for your own opinion.\n\n\
             {options}\n\n\
             Respond in exactly this format:\n\
             VOTE: Option X\n\
             REASONING: Your explanation"
        )
    }
}
