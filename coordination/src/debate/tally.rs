//! Vote tally and winner resolution
//!
//! Pure: the same multiset of votes always yields the same [`Results`],
//! regardless of the order the votes arrived in.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::council::MemberId;
use crate::state::{Results, ResultsStatus, Vote, VoteCount};

/// Tally `votes` and stamp the outcome with the current time.
pub fn resolve(votes: &[Vote]) -> Results {
    resolve_at(votes, Utc::now())
}

/// Tally `votes` and stamp the outcome with `timestamp`.
///
/// Winners are every member holding the maximum count, ordered by
/// ascending member id. No votes means no winners and status `in_progress`.
pub fn resolve_at(votes: &[Vote], timestamp: DateTime<Utc>) -> Results {
    let mut counts: BTreeMap<MemberId, (String, u32)> = BTreeMap::new();
    for vote in votes {
        let entry = counts
            .entry(vote.voted_for_id)
            .or_insert_with(|| (vote.voted_for_name.clone(), 0));
        entry.1 += 1;
    }

    let mut tally: Vec<VoteCount> = counts
        .into_iter()
        .map(|(member_id, (member_name, votes))| VoteCount {
            member_id,
            member_name,
            votes,
        })
        .collect();
    tally.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then_with(|| a.member_id.as_str().cmp(b.member_id.as_str()))
    });

    let top = tally.first().map(|c| c.votes).unwrap_or(0);
    let winners: Vec<&VoteCount> = tally.iter().filter(|c| top > 0 && c.votes == top).collect();

    let status = if winners.is_empty() {
        ResultsStatus::InProgress
    } else {
        ResultsStatus::ResultsReady
    };
    let synthesis = synthesize(&winners, votes.len());
    let winner_ids = winners.iter().map(|c| c.member_id).collect();
    let winner_names = winners.iter().map(|c| c.member_name.clone()).collect();

    Results {
        status,
        winner_ids,
        winner_names,
        synthesis,
        tally,
        timestamp,
    }
}

fn synthesize(winners: &[&VoteCount], cast: usize) -> Option<String> {
    match winners {
        [] => None,
        [winner] => Some(format!(
            "{} won with {} of {} votes.",
            winner.member_name, winner.votes, cast
        )),
        [.., last] => {
            let names: Vec<&str> = winners[..winners.len() - 1]
                .iter()
                .map(|c| c.member_name.as_str())
                .collect();
            Some(format!(
                "Tie between {} and {} with {} votes each ({} votes cast).",
                names.join(", "),
                last.member_name,
                last.votes,
                cast
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vote(voter: MemberId, target: MemberId) -> Vote {
        Vote {
            voter_id: voter,
            voter_name: voter.display_name().to_string(),
            voted_for_id: target,
            voted_for_name: target.display_name().to_string(),
            reasoning: "because".to_string(),
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    /// Nine votes: `targets[i]` is the choice of `MemberId::ALL[i]`.
    fn ballot(targets: [MemberId; 9]) -> Vec<Vote> {
        MemberId::ALL
            .iter()
            .zip(targets)
            .map(|(voter, target)| vote(*voter, target))
            .collect()
    }

    #[test]
    fn test_clear_winner() {
        use MemberId::*;
        let votes = ballot([
            Analyst, Analyst, Analyst, Analyst, Mediator, Mediator, Pragmatist, Visionary,
            Pragmatist,
        ]);
        let results = resolve_at(&votes, fixed_time());
        assert_eq!(results.status, ResultsStatus::ResultsReady);
        assert_eq!(results.winner_ids, vec![Analyst]);
        assert_eq!(results.winner_names, vec!["The Analyst"]);
        assert_eq!(results.tally[0].votes, 4);
        assert_eq!(
            results.synthesis.as_deref(),
            Some("The Analyst won with 4 of 9 votes.")
        );
    }

    #[test]
    fn test_three_way_tie_ordered_by_id() {
        use MemberId::*;
        // 3/3/3 between pragmatist, mediator and analyst.
        let votes = ballot([
            Analyst, Pragmatist, Pragmatist, Pragmatist, Mediator, Analyst, Mediator, Analyst,
            Mediator,
        ]);
        let results = resolve_at(&votes, fixed_time());
        assert_eq!(results.winner_ids, vec![Analyst, Mediator, Pragmatist]);
        assert!(results
            .synthesis
            .unwrap()
            .starts_with("Tie between The Analyst, The Mediator and The Pragmatist"));
    }

    #[test]
    fn test_two_way_tie_with_remainder() {
        use MemberId::*;
        let votes = ballot([
            Optimist, Optimist, Optimist, Optimist, Analyst, Analyst, Analyst, Analyst,
            Visionary,
        ]);
        let results = resolve_at(&votes, fixed_time());
        assert_eq!(results.winner_ids, vec![Analyst, Optimist]);
        assert_eq!(results.tally.len(), 3);
        assert_eq!(results.tally[2].member_id, Visionary);
    }

    #[test]
    fn test_order_independent() {
        use MemberId::*;
        let votes = ballot([
            Mediator, Analyst, Analyst, Mediator, Visionary, Analyst, Mediator, Optimist,
            Visionary,
        ]);
        let mut reversed = votes.clone();
        reversed.reverse();
        let mut rotated = votes.clone();
        rotated.rotate_left(4);

        let expected = resolve_at(&votes, fixed_time());
        assert_eq!(resolve_at(&reversed, fixed_time()), expected);
        assert_eq!(resolve_at(&rotated, fixed_time()), expected);
    }

    #[test]
    fn test_no_votes() {
        let results = resolve_at(&[], fixed_time());
        assert_eq!(results.status, ResultsStatus::InProgress);
        assert!(results.winner_ids.is_empty());
        assert!(results.tally.is_empty());
        assert!(results.synthesis.is_none());
    }
}
