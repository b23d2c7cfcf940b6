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

//! Byte-driven exercise of the vote-graph over a fixed fork topology,
//! for use from fuzzing harnesses and seeded tests.

use crate::graph::{VoteGraph, VoteInput};
use crate::std::vec::Vec;
use crate::{Chain, Error};

type Hash = u8;
type Number = u8;
type Weight = u64;

/// The exercised chain is made of 16 blocks, including the genesis.
/// The genesis is 0. Each block can be distinguished by a 4-bit number.
///
/// 0 -> [1, 2, 3]
/// 1 -> [4, 5, 6]
/// 2 -> [7, 8, 9]
/// 4 -> [10, 11, 12]
/// 7 -> [13, 14, 15]
#[derive(Default, Clone, Copy)]
pub struct FuzzChain;

impl FuzzChain {
	/// The height of a block.
	pub fn number(hash: Hash) -> Number {
		match hash {
			0 => 0,

			1 | 2 | 3 => 1,

			4 | 5 | 6 => 2,
			7 | 8 | 9 => 2,

			10 | 11 | 12 => 3,
			13 | 14 | 15 => 3,

			_ => panic!("invalid block hash"),
		}
	}

	// full ancestry of a block, genesis first, parent last.
	fn path(hash: Hash) -> &'static [Hash] {
		match hash {
			0 => &[],

			1 | 2 | 3 => &[0],

			4 | 5 | 6 => &[0, 1],
			7 | 8 | 9 => &[0, 2],

			10 | 11 | 12 => &[0, 1, 4],
			13 | 14 | 15 => &[0, 2, 7],

			_ => panic!("invalid block hash"),
		}
	}

	/// Whether `ancestor` is an ancestor of, or equal to, `block`.
	pub fn in_chain(ancestor: Hash, block: Hash) -> bool {
		ancestor == block || Self::path(block).contains(&ancestor)
	}
}

impl Chain<Hash, Number> for FuzzChain {
	fn ancestry(&self, base: Hash, block: Hash) -> Result<Vec<Hash>, Error> {
		if base == block || !Self::in_chain(base, block) {
			return Err(Error::NotDescendant)
		}

		Ok(Self::path(block)
			.iter()
			.rev()
			.take_while(|ancestor| **ancestor != base)
			.cloned()
			.collect())
	}
}

struct RandomnessStream<'a> {
	inner: &'a [u8],
	pos: usize,
	half_nibble: bool,
}

impl<'a> RandomnessStream<'a> {
	fn new(inner: &'a [u8]) -> Self {
		RandomnessStream { inner, pos: 0, half_nibble: false }
	}

	fn read_nibble(&mut self) -> Option<u8> {
		let active = *self.inner.get(self.pos)?;
		if self.half_nibble {
			self.half_nibble = false;
			self.pos += 1;

			Some(active & 0x0F)
		} else {
			self.half_nibble = true;

			Some((active >> 4) & 0x0F)
		}
	}
}

/// Interpret `data` as a sequence of weighted votes over the fixed chain,
/// checking the graph invariants after every insertion.
pub fn execute_fuzzed_graph(data: &[u8]) {
	let mut stream = RandomnessStream::new(data);

	let mut graph: VoteGraph<Hash, Number, Weight> = VoteGraph::new(0, 0, 0);
	let mut votes: Vec<(Hash, Weight)> = Vec::new();

	while let Some(target) = stream.read_nibble() {
		// the 16 possible nibbles are exactly the known blocks.
		let weight = match stream.read_nibble() {
			Some(raw) => Weight::from(raw % 4 + 1),
			None => break,
		};

		graph
			.insert(target, FuzzChain::number(target), VoteInput::Single(weight), &FuzzChain)
			.expect("every block descends from the genesis base; qed");

		votes.push((target, weight));

		check_invariants(&graph, &votes);
	}

	// the same votes in reverse order must accumulate to the same weights
	// on every block.
	let mut reversed: VoteGraph<Hash, Number, Weight> = VoteGraph::new(0, 0, 0);
	for (target, weight) in votes.iter().rev() {
		reversed
			.insert(*target, FuzzChain::number(*target), VoteInput::Single(*weight), &FuzzChain)
			.expect("every block descends from the genesis base; qed");
	}

	for block in 0..16 {
		assert_eq!(
			graph.cumulative_vote(block, FuzzChain::number(block)),
			reversed.cumulative_vote(block, FuzzChain::number(block)),
		);
	}
}

fn check_invariants(graph: &VoteGraph<Hash, Number, Weight>, votes: &[(Hash, Weight)]) {
	graph.assert_consistent();

	// weight conservation: every block accumulates exactly the votes cast
	// within its own subtree. the genesis accumulates everything.
	for block in 0..16 {
		let expected: Weight = votes
			.iter()
			.filter(|(target, _)| FuzzChain::in_chain(block, *target))
			.map(|(_, weight)| *weight)
			.sum();

		assert_eq!(graph.cumulative_vote(block, FuzzChain::number(block)), expected);
	}

	let total: Weight = votes.iter().map(|(_, weight)| *weight).sum();

	// both thresholds require more than half of the total weight, so at
	// most one fork of any block can qualify.
	let supermajority = |weight: &Weight| weight * 3 >= total * 2;
	let majority = |weight: &Weight| weight * 2 > total;

	let strict = graph.find_ghost(None, supermajority);
	let relaxed = graph.find_ghost(None, majority);

	// weakening the condition can only move GHOST further up.
	if let (Some((_, strict_number)), Some((_, relaxed_number))) = (&strict, &relaxed) {
		assert!(relaxed_number >= strict_number);
	}

	// the GHOST block fulfills the condition on its own chain.
	if let Some((hash, number)) = strict {
		assert_eq!(graph.find_ancestor(hash, number, supermajority), Some((hash, number)));
	}
}
