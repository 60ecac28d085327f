use serde::{Deserialize, Serialize};

use super::{Candidate, CandidateId};

/// Final tallies of a closed election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    /// Every candidate, in ID order.
    pub candidates: Vec<Candidate>,
    pub total_votes: u64,
    /// IDs of every candidate sharing the highest tally. Empty if nobody
    /// received a vote.
    pub leaders: Vec<CandidateId>,
}

impl ElectionResults {
    pub(super) fn tally(candidates: &[Candidate], total_votes: u64) -> Self {
        let top = candidates.iter().map(|c| c.vote_count).max().unwrap_or(0);
        let leaders = if top == 0 {
            Vec::new()
        } else {
            candidates
                .iter()
                .filter(|c| c.vote_count == top)
                .map(|c| c.id)
                .collect()
        };

        Self {
            candidates: candidates.to_vec(),
            total_votes,
            leaders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: CandidateId, vote_count: u64) -> Candidate {
        Candidate {
            id,
            name: format!("Candidate {id}"),
            vote_count,
        }
    }

    #[test]
    fn ties_report_every_leader() {
        let candidates = vec![candidate(0, 4), candidate(1, 2), candidate(2, 4)];
        let results = ElectionResults::tally(&candidates, 10);
        assert_eq!(results.leaders, vec![0, 2]);
        assert_eq!(results.candidates, candidates);
    }

    #[test]
    fn no_votes_means_no_leaders() {
        let results = ElectionResults::tally(&[candidate(0, 0)], 0);
        assert!(results.leaders.is_empty());
        assert!(ElectionResults::tally(&[], 0).leaders.is_empty());
    }
}
