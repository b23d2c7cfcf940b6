// Copyright 2018-2019 Parity Technologies (UK) Ltd
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The vote accumulator used in the consensus context: a bit per voter,
//! with weights evaluated lazily against a [`VoterSet`].
//!
//! Storing voters rather than weights keeps the merge of two edges down to
//! a bitwise or. A voter observed on several branches therefore counts
//! once, and only once, towards every common ancestor.

use crate::bitfield::{Bit1, Bitfield};
use crate::graph::VoteAccumulator;
use crate::voter_set::{VoterInfo, VoterSet};
use crate::weights::VoteWeight;

/// A single vote cast by a known voter.
#[derive(Clone, Debug)]
pub struct Vote {
	bit: Bit1,
}

impl Vote {
	/// The vote cast by voter `info`.
	pub fn cast(info: &VoterInfo) -> Self {
		Vote { bit: Bit1 { position: info.position() } }
	}
}

/// The set of voters whose votes have been accumulated on a vote-node.
#[derive(Clone, Debug, Default)]
pub struct VoteTally {
	bits: Bitfield,
}

impl VoteTally {
	/// Whether the given voter's vote is part of this tally.
	pub fn contains(&self, info: &VoterInfo) -> bool {
		self.bits.test_bit(info.position())
	}

	/// Evaluate the total weight of the tally under the given voter set.
	///
	/// Bits without a corresponding voter carry no weight.
	pub fn weight<Id: Eq + Ord>(&self, voters: &VoterSet<Id>) -> VoteWeight {
		self.bits
			.iter1s()
			.filter_map(|bit| voters.nth(bit.position))
			.map(|(_, info)| info.weight())
			.sum()
	}
}

impl VoteAccumulator for VoteTally {
	type Vote = Vote;

	fn add_weight(&mut self, other: &Self) {
		self.bits.merge(&other.bits);
	}

	fn add_vote(&mut self, vote: &Vote) {
		self.bits.set_bit(vote.bit.position);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::{VoteGraph, VoteInput};
	use crate::testing::chain::{DummyChain, GENESIS_HASH};
	use quickcheck::quickcheck;

	#[test]
	fn each_voter_counts_once() {
		fn prop(voters: VoterSet<usize>, picks: Vec<usize>) {
			let mut tally = VoteTally::default();
			let mut expected = VoteWeight::ZERO;

			for pick in picks {
				let (_, info) = voters.nth_mod(pick);
				if !tally.contains(info) {
					expected = expected + info.weight();
				}

				tally.add_vote(&Vote::cast(info));
			}

			assert!(tally.weight(&voters) <= voters.total_weight());
			assert_eq!(tally.weight(&voters), expected);
		}

		quickcheck(prop as fn(_, _))
	}

	#[test]
	fn merging_tallies_never_double_counts() {
		fn prop(voters: VoterSet<usize>, left: Vec<usize>, right: Vec<usize>) {
			let mut a = VoteTally::default();
			for pick in &left {
				a.add_vote(&Vote::cast(voters.nth_mod(*pick).1));
			}

			let mut b = VoteTally::default();
			for pick in &right {
				b.add_vote(&Vote::cast(voters.nth_mod(*pick).1));
			}

			let mut merged = a.clone();
			merged.add_weight(&b);

			// the merge is the union of the contributing voters.
			let mut union = VoteTally::default();
			for pick in left.iter().chain(&right) {
				union.add_vote(&Vote::cast(voters.nth_mod(*pick).1));
			}

			assert_eq!(merged.weight(&voters), union.weight(&voters));
			assert!(merged.weight(&voters) <= a.weight(&voters) + b.weight(&voters));
		}

		quickcheck(prop as fn(_, _, _))
	}

	#[test]
	fn graph_threshold_with_tallies() {
		let mut chain = DummyChain::new();
		chain.push_blocks(GENESIS_HASH, &["A", "B", "C"]);
		chain.push_blocks("B", &["B1"]);

		let voters = VoterSet::new([("alice", 4u64), ("bob", 7), ("eve", 3)]).unwrap();
		assert_eq!(voters.threshold(), VoteWeight::new(10));

		let vote = |id: &&'static str| Vote::cast(voters.get(id).expect("voter in set; qed"));

		let mut graph: VoteGraph<&'static str, u32, VoteTally> =
			VoteGraph::new(GENESIS_HASH, 1, VoteTally::default());

		graph.insert("C", 4, VoteInput::Single(vote(&"alice")), &chain).unwrap();
		graph.insert("C", 4, VoteInput::Single(vote(&"eve")), &chain).unwrap();
		graph.insert("B1", 4, VoteInput::Single(vote(&"bob")), &chain).unwrap();

		let condition = |tally: &VoteTally| tally.weight(&voters) >= voters.threshold();

		// neither fork reaches the threshold on its own, but the common
		// ancestry of both forks carries every voter.
		assert_eq!(graph.find_ghost(None, condition), Some(("B", 3)));

		// bob switches over to the other fork. his weight counts once at
		// the merge and the threshold moves forward.
		graph.insert("C", 4, VoteInput::Single(vote(&"bob")), &chain).unwrap();

		assert_eq!(graph.find_ghost(None, condition), Some(("C", 4)));
		assert_eq!(
			graph.cumulative_vote(GENESIS_HASH, 1).weight(&voters),
			voters.total_weight(),
		);
	}
}
