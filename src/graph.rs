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

//! The vote-graph: weighted votes accumulated over a tree of blocks.
//!
//! See docs on [`VoteGraph`] for more information.

use crate::std::{
	collections::{BTreeMap, BTreeSet},
	fmt::Debug,
	vec::Vec,
};

use crate::{BlockNumberOps, Chain, Error};

use log::trace;

/// Vote data accumulated along the edges of a [`VoteGraph`].
///
/// Merging is assumed commutative and associative, so that weights can be
/// propagated along ancestry regardless of insertion order. `Clone` must
/// produce an independent copy and `Default` the zero accumulator.
pub trait VoteAccumulator: Default + Clone {
	/// A single raw vote that can be incorporated into the accumulator.
	type Vote;

	/// Merge another accumulated value into this one.
	fn add_weight(&mut self, other: &Self);

	/// Incorporate one raw vote.
	fn add_vote(&mut self, vote: &Self::Vote);
}

impl VoteAccumulator for u32 {
	type Vote = u32;

	fn add_weight(&mut self, other: &Self) {
		*self = self.saturating_add(*other);
	}

	fn add_vote(&mut self, vote: &Self::Vote) {
		*self = self.saturating_add(*vote);
	}
}

impl VoteAccumulator for u64 {
	type Vote = u64;

	fn add_weight(&mut self, other: &Self) {
		*self = self.saturating_add(*other);
	}

	fn add_vote(&mut self, vote: &Self::Vote) {
		*self = self.saturating_add(*vote);
	}
}

/// A vote to be inserted into the graph: either one raw vote, or a value
/// that has already been accumulated elsewhere (e.g. when grafting the
/// votes of a commit message onto a fresh graph).
pub enum VoteInput<V: VoteAccumulator> {
	/// A single raw vote.
	Single(V::Vote),
	/// An already-accumulated vote value.
	Merged(V),
}

impl<V: VoteAccumulator> VoteInput<V> {
	fn apply_to(&self, target: &mut V) {
		match self {
			VoteInput::Single(vote) => target.add_vote(vote),
			VoteInput::Merged(weight) => target.add_weight(weight),
		}
	}
}

// result of checking a block against the compressed ancestry edge of a
// vote-node.
#[derive(Clone, Copy, Debug)]
enum EdgeCheck {
	// the edge does not reach down to the block's height; the answer lies
	// further back in the graph.
	Unknown,
	// the edge passes the block's height on a different branch.
	Excluded,
	// the edge passes through the block.
	Contained,
}

impl EdgeCheck {
	fn contained(self) -> bool {
		matches!(self, EdgeCheck::Contained)
	}
}

// where a block sits relative to the graph.
enum Location<H> {
	// the block has a vote-node of its own.
	Node,
	// the block lies on the compressed edges of these vote-nodes
	// (non-empty).
	Edges(Vec<H>),
	// the block is not part of the graph.
	Absent,
}

/// One vote-node of the graph: a block that has been voted on directly,
/// or that was materialized by splitting an edge.
#[derive(Debug)]
struct VoteNode<H, N, V> {
	number: N,
	// hashes walking back from the parent block, one per intervening
	// block; the last element is the parent vote-node's hash. Empty
	// exactly at the base.
	ancestors: Vec<H>,
	// child vote-nodes, unordered.
	descendants: Vec<H>,
	cumulative_vote: V,
}

impl<H, N, V> VoteNode<H, N, V>
where
	H: Ord + Eq + Clone,
	N: BlockNumberOps,
{
	// the hash at height `number` on the compressed edge above this node,
	// if the edge reaches down that far.
	fn ancestor_block(&self, number: N) -> Option<&H> {
		if number >= self.number {
			return None
		}
		let offset = self.number - number - N::one();

		self.ancestors.get(offset.as_())
	}

	// check a block against this node's compressed edge.
	fn in_direct_ancestry(&self, hash: &H, number: N) -> EdgeCheck {
		match self.ancestor_block(number) {
			None => EdgeCheck::Unknown,
			Some(h) if h == hash => EdgeCheck::Contained,
			Some(_) => EdgeCheck::Excluded,
		}
	}

	// the parent vote-node, or `None` at the base.
	fn parent_node(&self) -> Option<&H> {
		self.ancestors.last()
	}
}

// a subchain of blocks by hash.
struct Subchain<H, N> {
	hashes: Vec<H>, // forward order.
	best_number: N,
}

impl<H, N: Copy> Subchain<H, N> {
	fn best(self) -> Option<(H, N)> {
		let best_number = self.best_number;
		self.hashes.into_iter().last().map(|hash| (hash, best_number))
	}
}

/// Maintains a DAG of the blocks in the chain which have votes attached to
/// them, with vote data accumulated along its edges.
///
/// Only blocks that were voted on directly (or that became fork points
/// between such blocks) materialize as nodes; the stretches of chain in
/// between are kept as compressed edges. The cumulative vote of a node is
/// the sum of every vote ever inserted at the node itself or at any of its
/// descendants, so the base's cumulative vote contains every inserted vote.
pub struct VoteGraph<H: Ord + Eq, N, V> {
	entries: BTreeMap<H, VoteNode<H, N, V>>,
	heads: BTreeSet<H>,
	base: H,
	base_number: N,
}

impl<H, N, V> VoteGraph<H, N, V>
where
	H: Ord + Eq + Clone + Debug,
	N: Copy + Debug + BlockNumberOps,
	V: VoteAccumulator,
{
	/// Create a new `VoteGraph` with base block as given.
	pub fn new(base_hash: H, base_number: N, base_vote: V) -> Self {
		let mut entries = BTreeMap::new();
		entries.insert(
			base_hash.clone(),
			VoteNode {
				number: base_number,
				ancestors: Vec::new(),
				descendants: Vec::new(),
				cumulative_vote: base_vote,
			},
		);

		let mut heads = BTreeSet::new();
		heads.insert(base_hash.clone());

		VoteGraph { entries, heads, base: base_hash, base_number }
	}

	/// Get the base block.
	pub fn base(&self) -> (H, N) {
		(self.base.clone(), self.base_number)
	}

	/// Insert a vote for the block with given hash and number.
	///
	/// The chain oracle is only consulted for blocks the graph has never
	/// seen; if it fails, the error is returned and the graph is left
	/// unmodified. Inserting a vote for the same block twice accumulates
	/// it twice.
	pub fn insert<C: Chain<H, N>>(
		&mut self,
		hash: H,
		number: N,
		vote: VoteInput<V>,
		chain: &C,
	) -> Result<(), Error> {
		match self.locate(&hash, number) {
			Location::Node => {}, // vote-node already exists.
			Location::Absent => self.append(hash.clone(), number, chain)?,
			Location::Edges(containing) =>
				self.introduce_branch(containing, hash.clone(), number),
		}

		// update cumulative vote data.
		// NOTE: below this point, there always exists a node with the given hash.
		let mut inspecting_hash = hash;
		loop {
			let active_entry = self
				.entries
				.get_mut(&inspecting_hash)
				.expect("vote-node and its ancestry always exist after initial phase; qed");

			vote.apply_to(&mut active_entry.cumulative_vote);

			match active_entry.parent_node() {
				Some(parent) => inspecting_hash = parent.clone(),
				None => break,
			}
		}

		Ok(())
	}

	/// Find the block with the highest number in the chain with the given
	/// head which fulfills the given condition.
	///
	/// Returns `None` if the given head is not in the graph or no block
	/// fulfills the condition.
	pub fn find_ancestor<F>(&self, mut hash: H, mut number: N, condition: F) -> Option<(H, N)>
	where
		F: Fn(&V) -> bool,
	{
		loop {
			match self.locate(&hash, number) {
				Location::Node => {
					let node =
						self.entries.get(&hash).expect("just located as a vote-node; qed");

					if condition(&node.cumulative_vote) {
						return Some((hash, number))
					}

					// not enough accumulated weight; move to the parent block.
					match node.ancestors.first() {
						None => return None, // the base: nowhere further back.
						Some(parent) => {
							hash = parent.clone();
							number = node.number - N::one();
						},
					}
				},
				Location::Absent => return None,
				Location::Edges(containing) => {
					// the block lies on the edges of these vote-nodes; its
					// accumulated weight is everything below it.
					let mut sum = V::default();
					for key in &containing {
						let node = self
							.entries
							.get(key)
							.expect("containing nodes are vote-nodes; qed");
						sum.add_weight(&node.cumulative_vote);
					}

					if condition(&sum) {
						return Some((hash, number))
					}

					// not enough weight; step to the parent block through
					// any containing edge.
					let node = containing
						.last()
						.map(|key| {
							self.entries
								.get(key)
								.expect("containing nodes are vote-nodes; qed")
						})
						.expect("`Edges` is non-empty by construction; qed");

					let offset = (node.number - number).as_();
					match node.ancestors.get(offset) {
						None => return None, // reached the base without sufficient weight.
						Some(parent) => {
							hash = parent.clone();
							number = number - N::one();
						},
					}
				},
			}
		}
	}

	/// Find the total accumulated vote on the given block: the vote-node's
	/// own cumulative vote, or the sum over the vote-nodes whose edges
	/// contain the block. Zero if the block is not in the graph.
	pub fn cumulative_vote(&self, hash: H, number: N) -> V {
		match self.locate(&hash, number) {
			Location::Node => self
				.entries
				.get(&hash)
				.expect("just located as a vote-node; qed")
				.cumulative_vote
				.clone(),
			Location::Absent => V::default(),
			Location::Edges(containing) => {
				let mut sum = V::default();
				for key in &containing {
					let node = self
						.entries
						.get(key)
						.expect("containing nodes are vote-nodes; qed");
					sum.add_weight(&node.cumulative_vote);
				}

				sum
			},
		}
	}

	/// Find the best GHOST descendant of the given block, or of the base
	/// if `None`. Pass a closure used to evaluate the cumulative vote value.
	///
	/// The GHOST (hash, number) returned will be the block with the highest
	/// number for which the accumulated votes of itself and its descendants
	/// cause the closure to evaluate to true.
	///
	/// This assumes that the closure returns true for at most a single
	/// descendant of any block, in that only one fork of a block can be
	/// "heavy" enough to trigger the threshold.
	///
	/// Returns `None` when the given `current_best` does not fulfill the
	/// condition.
	pub fn find_ghost<'a, F>(&'a self, current_best: Option<(H, N)>, condition: F) -> Option<(H, N)>
	where
		F: Fn(&V) -> bool,
	{
		let entries = &self.entries;
		let get_node = |hash: &_| -> &'a _ {
			entries
				.get(hash)
				.expect("node either base or referenced by other in graph; qed")
		};

		let (mut node_key, mut force_constrain) = match current_best {
			None => (self.base.clone(), false),
			Some((ref hash, number)) => match self.locate(hash, number) {
				Location::Node => (hash.clone(), false),
				Location::Absent => (self.base.clone(), false),
				Location::Edges(ref containing) => {
					// start at the parent vote-node of the edge through the
					// block, and only descend back through that block.
					let ancestor = get_node(&containing[0])
						.parent_node()
						.expect("node containing non-node in history always has ancestor; qed");

					(ancestor.clone(), true)
				},
			},
		};

		let mut active_node = get_node(&node_key);

		if !condition(&active_node.cumulative_vote) {
			return None
		}

		// descend into the (at most one) descendant fulfilling the
		// condition, for as long as one exists.
		loop {
			let next_descendant = active_node
				.descendants
				.iter()
				.map(|d| (d, get_node(d)))
				.filter(|(_, node)| match (force_constrain, current_best.as_ref()) {
					(true, Some((hash, number))) =>
						node.in_direct_ancestry(hash, *number).contained(),
					_ => true,
				})
				.find(|(_, node)| condition(&node.cumulative_vote));

			match next_descendant {
				Some((key, node)) => {
					// once we have made at least one hop, the constraint no
					// longer applies.
					force_constrain = false;
					node_key = key.clone();
					active_node = node;
				},
				None => break,
			}
		}

		// `active_node` is now the highest vote-node fulfilling the
		// condition. its descendants form a frontier of vote-nodes which
		// individually do not pass the threshold, but some subset of them
		// may join at a block above `active_node`'s, giving that block
		// sufficient votes.
		let constrain = if force_constrain { current_best } else { None };
		self.find_merge_point(node_key, active_node, constrain, condition).best()
	}

	// given a key, node pair (which must correspond), assuming this node
	// fulfills the condition, find the highest block at which the
	// qualifying descendants still merge, which may be the node's own.
	fn find_merge_point<F>(
		&self,
		node_key: H,
		active_node: &VoteNode<H, N, V>,
		constrain: Option<(H, N)>,
		condition: F,
	) -> Subchain<H, N>
	where
		F: Fn(&V) -> bool,
	{
		let mut descendants: Vec<&VoteNode<H, N, V>> = active_node
			.descendants
			.iter()
			.map(|d| self.entries.get(d).expect("descendants always present in node storage; qed"))
			.filter(|node| match constrain {
				Some((ref hash, number)) => node.in_direct_ancestry(hash, number).contained(),
				None => true,
			})
			.collect();

		let base_number = active_node.number;
		let mut best_number = active_node.number;
		// per-height tallies, sorted by hash.
		let mut tallies: Vec<(H, V)> = Vec::with_capacity(descendants.len());
		let mut hashes = vec![node_key];

		// walk block-by-block above the node, accepting a height as long as
		// one block at it gathers enough of the descendants' weight.
		//
		// TODO: long stretches between vote-nodes make this walk linear in
		// the number of blocks; skipping ahead to the next disagreement
		// between edges would avoid the per-height scan.
		let mut offset = N::zero();
		loop {
			offset = offset + N::one();

			let mut new_best = None;
			for node in &descendants {
				let block = match node.ancestor_block(base_number + offset) {
					Some(block) => block,
					None => continue,
				};

				match tallies.binary_search_by_key(&block, |(hash, _)| hash) {
					Ok(idx) => {
						tallies[idx].1.add_weight(&node.cumulative_vote);
						if condition(&tallies[idx].1) {
							new_best = Some(block.clone());
							break
						}
					},
					Err(idx) =>
						tallies.insert(idx, (block.clone(), node.cumulative_vote.clone())),
				}
			}

			match new_best {
				Some(new_best) => {
					best_number = best_number + N::one();

					tallies.clear();
					descendants
						.retain(|node| node.in_direct_ancestry(&new_best, best_number).contained());

					hashes.push(new_best);
				},
				None => break,
			}
		}

		Subchain { hashes, best_number }
	}

	/// Adjust the base of the graph. The new base must be an ancestor of
	/// the old base.
	///
	/// Provide an ancestry proof from the old base to the new: the hashes
	/// in reverse order starting from the old base's parent, ending at the
	/// new base. An empty proof is a no-op; a proof longer than the height
	/// of the old base is ignored.
	pub fn adjust_base(&mut self, ancestry_proof: &[H]) {
		let new_hash = match ancestry_proof.last() {
			None => return, // empty -- nothing to do.
			Some(hash) => hash,
		};

		if ancestry_proof.len() > self.base_number.as_() {
			// the proof runs past the lowest representable height.
			trace!(
				target: "vote_graph",
				"ignoring ancestry proof of length {} above base at height {:?}",
				ancestry_proof.len(),
				self.base_number,
			);
			return
		}

		// a `usize` cannot be converted into `N` directly, so walk the
		// height down one step per proof element instead.
		let new_number = {
			let mut new_number = self.base_number;
			for _ in 0..ancestry_proof.len() {
				new_number = new_number - N::one();
			}
			new_number
		};

		let entry = {
			let old_base = self
				.entries
				.get_mut(&self.base)
				.expect("base hash entry always exists; qed");

			// the old base's compressed edge now extends up to the new base.
			old_base.ancestors.extend(ancestry_proof.iter().cloned());

			VoteNode {
				number: new_number,
				ancestors: Vec::new(),
				descendants: vec![self.base.clone()],
				// the new base sees every vote the old base saw.
				cumulative_vote: old_base.cumulative_vote.clone(),
			}
		};

		trace!(
			target: "vote_graph",
			"adjusted base to {:?} at height {:?}",
			new_hash,
			new_number,
		);

		self.entries.insert(new_hash.clone(), entry);
		self.base = new_hash.clone();
		self.base_number = new_number;
	}

	// find where a block sits relative to the graph: as a vote-node of its
	// own, on the compressed edges of one or more vote-nodes, or nowhere.
	fn locate(&self, hash: &H, number: N) -> Location<H> {
		if self.entries.contains_key(hash) {
			return Location::Node
		}

		let mut containing = Vec::new();
		let mut visited = BTreeSet::new();

		// iterate vote-heads and their ancestry backwards until an edge
		// either contains the block or rules its branch out.
		for head in &self.heads {
			let mut current = head.clone();

			while visited.insert(current.clone()) {
				let entry = match self.entries.get(&current) {
					Some(entry) => entry,
					None => break,
				};

				match entry.in_direct_ancestry(hash, number) {
					EdgeCheck::Contained => {
						// record the containing node and move to the next head.
						containing.push(current);
						break
					},
					EdgeCheck::Excluded => break, // nothing on this branch.
					EdgeCheck::Unknown => match entry.parent_node() {
						Some(parent) => current = parent.clone(), // iterate backwards.
						None => break,
					},
				}
			}
		}

		if containing.is_empty() {
			Location::Absent
		} else {
			Location::Edges(containing)
		}
	}

	// introduce a branch at the given block, splitting the edges of the
	// given vote-nodes.
	//
	// panics if any member of `descendants` is not a vote-node containing
	// the block in its edge, or if the block already has a node. either
	// violation leaves the graph in an indeterminate state.
	fn introduce_branch(&mut self, descendants: Vec<H>, ancestor_hash: H, ancestor_number: N) {
		let mut produced: Option<(VoteNode<H, N, V>, Option<H>)> = None;

		for descendant in descendants {
			let entry = self
				.entries
				.get_mut(&descendant)
				.expect("this function only invoked with keys of vote-nodes; qed");

			debug_assert!(entry.in_direct_ancestry(&ancestor_hash, ancestor_number).contained());
			assert!(
				ancestor_number <= entry.number,
				"this function only invoked with direct ancestors; qed",
			);

			// example: splitting an edge of a node at height 10 at the
			// ancestor of height 4
			// before: [9 8 7 6 5 4 3 2 1]
			// after: [9 8 7 6 5 4] on the descendant, [3 2 1] on the new node.
			let offset = (entry.number - ancestor_number).as_();
			let prev_ancestor = entry.parent_node().cloned();
			let split_off: Vec<H> = entry.ancestors.drain(offset..).collect();

			let (new_node, _) = produced.get_or_insert_with(move || {
				let new_node = VoteNode {
					number: ancestor_number,
					ancestors: split_off,
					descendants: Vec::new(),
					cumulative_vote: V::default(),
				};

				(new_node, prev_ancestor)
			});

			new_node.descendants.push(descendant);
			new_node.cumulative_vote.add_weight(&entry.cumulative_vote);
		}

		if let Some((new_node, prev_ancestor)) = produced {
			if let Some(prev_ancestor) = prev_ancestor {
				let prev_ancestor = self
					.entries
					.get_mut(&prev_ancestor)
					.expect("prior ancestor is referenced from a node; qed");

				prev_ancestor.descendants.retain(|hash| !new_node.descendants.contains(hash));
				prev_ancestor.descendants.push(ancestor_hash.clone());
			}

			trace!(
				target: "vote_graph",
				"introduced vote-node for block {:?} at height {:?} below {} edge(s)",
				ancestor_hash,
				ancestor_number,
				new_node.descendants.len(),
			);

			assert!(
				self.entries.insert(ancestor_hash, new_node).is_none(),
				"this function is only invoked when there is no entry for the ancestor already; qed",
			);
		}
	}

	// append a vote-node onto the chain-tree. only to be called when no
	// edge in the graph contains the block.
	fn append<C: Chain<H, N>>(&mut self, hash: H, number: N, chain: &C) -> Result<(), Error> {
		let mut ancestry = chain.ancestry(self.base.clone(), hash.clone())?;
		ancestry.push(self.base.clone()); // ancestry doesn't include base.

		let parent_index = ancestry
			.iter()
			.position(|ancestor| self.entries.contains_key(ancestor))
			.expect(
				"base is kept; \
				 chain returns ancestry only if the block is a descendant of base; qed",
			);

		let parent_hash = ancestry[parent_index].clone();
		ancestry.truncate(parent_index + 1);

		trace!(
			target: "vote_graph",
			"appending vote-node for block {:?} at height {:?} under {:?}",
			hash,
			number,
			parent_hash,
		);

		self.entries.insert(
			hash.clone(),
			VoteNode {
				number,
				ancestors: ancestry,
				descendants: Vec::new(),
				cumulative_vote: V::default(),
			},
		);

		self.entries
			.get_mut(&parent_hash)
			.expect("entry was found by the scan above; qed")
			.descendants
			.push(hash.clone());

		self.heads.remove(&parent_hash);
		self.heads.insert(hash);

		Ok(())
	}
}

#[cfg(any(test, feature = "fuzz-helpers"))]
impl<H, N, V> VoteGraph<H, N, V>
where
	H: Ord + Eq + Clone + Debug,
	N: Copy + Debug + BlockNumberOps,
	V: VoteAccumulator,
{
	/// Check the structural invariants tying entries, compressed edges and
	/// heads together, panicking on the first violation.
	pub fn assert_consistent(&self) {
		let base = self.entries.get(&self.base).expect("the base always has an entry");
		assert!(base.ancestors.is_empty(), "the base has no recorded ancestors");
		assert_eq!(base.number, self.base_number);

		for (hash, entry) in &self.entries {
			if *hash != self.base {
				let parent_hash = entry
					.parent_node()
					.expect("non-base nodes keep a non-empty ancestry");
				let parent = self
					.entries
					.get(parent_hash)
					.expect("compressed edges end at a vote-node");

				assert!(
					parent.descendants.contains(hash),
					"{:?} missing from the descendants of its parent node",
					hash,
				);

				// the edge length bridges the two heights exactly.
				let mut expected_number = parent.number;
				for _ in 0..entry.ancestors.len() {
					expected_number = expected_number + N::one();
				}
				assert_eq!(expected_number, entry.number);
			}

			assert_eq!(
				self.heads.contains(hash),
				entry.descendants.is_empty(),
				"heads are exactly the nodes without descendants",
			);

			for descendant in &entry.descendants {
				let child = self
					.entries
					.get(descendant)
					.expect("descendants are vote-nodes");
				assert_eq!(child.parent_node(), Some(hash));
			}
		}
	}
}
