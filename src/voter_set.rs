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

//! The set of voters whose weighted votes populate the graph.

use crate::std::vec::Vec;
use crate::weights::{VoteWeight, VoterWeight};

/// A set of voters with accompanying weights and canonical indices.
///
/// The canonical index of a voter is its position in the set when sorted
/// by id; bitfields over the set are keyed by that position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoterSet<Id: Eq + Ord> {
	/// Voters in canonical order.
	voters: Vec<(Id, VoterInfo)>,
	total_weight: VoteWeight,
	threshold: VoteWeight,
}

impl<Id: Eq + Ord> VoterSet<Id> {
	/// Create a voter set from an iterator of `(id, weight)` pairs.
	///
	/// Entries with weight zero are dropped, since a voter without weight
	/// cannot influence any outcome; among entries with the same id, the
	/// first wins. Returns `None` if no weighted voter remains.
	pub fn new<I>(weights: I) -> Option<Self>
	where
		I: IntoIterator<Item = (Id, u64)>,
	{
		let mut sorted: Vec<(Id, VoterWeight)> = weights
			.into_iter()
			.filter_map(|(id, weight)| VoterWeight::new(weight).map(|weight| (id, weight)))
			.collect();

		sorted.sort_by(|a, b| a.0.cmp(&b.0));
		sorted.dedup_by(|a, b| a.0 == b.0);

		if sorted.is_empty() {
			return None
		}

		let total_weight: VoteWeight = sorted.iter().map(|(_, weight)| *weight).sum();

		let voters: Vec<_> = sorted
			.into_iter()
			.enumerate()
			.map(|(position, (id, weight))| (id, VoterInfo { position, weight }))
			.collect();

		let threshold = VoteWeight::supermajority(total_weight);

		Some(VoterSet { voters, total_weight, threshold })
	}

	/// Get the voter info for the given id, if it is in the set.
	pub fn get(&self, id: &Id) -> Option<&VoterInfo> {
		self.voters
			.binary_search_by_key(&id, |(id, _)| id)
			.ok()
			.map(|idx| &self.voters[idx].1)
	}

	/// Whether the set contains the given id.
	pub fn contains(&self, id: &Id) -> bool {
		self.get(id).is_some()
	}

	/// Get the voter at the given canonical index, if any.
	pub fn nth(&self, position: usize) -> Option<(&Id, &VoterInfo)> {
		self.voters.get(position).map(|(id, info)| (id, info))
	}

	/// Get the voter at the given index, modulo the size of the set.
	pub fn nth_mod(&self, position: usize) -> (&Id, &VoterInfo) {
		self.nth(position % self.voters.len()).expect("set is never empty; qed")
	}

	/// The number of voters in the set. Always at least one.
	pub fn len(&self) -> usize {
		self.voters.len()
	}

	/// The combined weight of all voters.
	pub fn total_weight(&self) -> VoteWeight {
		self.total_weight
	}

	/// The supermajority threshold: the least weight that more than
	/// two thirds of the voters (by weight) must back.
	pub fn threshold(&self) -> VoteWeight {
		self.threshold
	}

	/// Iterate over the voters in canonical order.
	pub fn iter(&self) -> impl Iterator<Item = (&Id, &VoterInfo)> {
		self.voters.iter().map(|(id, info)| (id, info))
	}
}

/// Metadata of a single voter in a [`VoterSet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoterInfo {
	position: usize,
	weight: VoterWeight,
}

impl VoterInfo {
	/// The canonical index of the voter in the set.
	pub fn position(&self) -> usize {
		self.position
	}

	/// The weight of the voter.
	pub fn weight(&self) -> VoterWeight {
		self.weight
	}
}

#[cfg(test)]
impl quickcheck::Arbitrary for VoterSet<usize> {
	fn arbitrary(g: &mut quickcheck::Gen) -> Self {
		use quickcheck::Arbitrary;

		let mut ids: Vec<usize> = Vec::arbitrary(g);
		ids.push(usize::arbitrary(g)); // at least one voter.

		VoterSet::new(ids.into_iter().map(|id| (id, id as u64 % 16 + 1)))
			.expect("all weights are non-zero; qed")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use quickcheck::quickcheck;

	#[test]
	fn voters_are_sorted_and_deduplicated() {
		let v1 = VoterSet::new([(3usize, 9u64), (1, 5), (5, 7), (3, 2), (2, 7)]).unwrap();
		let v2 = VoterSet::new([(1usize, 5u64), (2, 7), (3, 9), (5, 7)]).unwrap();

		assert_eq!(v1, v2);
	}

	#[test]
	fn zero_weight_voters_are_dropped() {
		assert_eq!(VoterSet::<usize>::new([]), None);
		assert_eq!(VoterSet::new([(1usize, 0u64), (2, 0)]), None);

		let v = VoterSet::new([(1usize, 0u64), (2, 3)]).unwrap();
		assert_eq!(v.len(), 1);
		assert!(!v.contains(&1));
		assert!(v.contains(&2));
	}

	#[test]
	fn positions_match_canonical_order() {
		fn prop(v: VoterSet<usize>) {
			for (position, (id, info)) in v.iter().enumerate() {
				assert_eq!(info.position(), position);
				assert_eq!(v.nth(position), Some((id, info)));
				assert_eq!(v.get(id), Some(info));
			}

			assert_eq!(v.nth(v.len()), None);
		}

		quickcheck(prop as fn(_))
	}

	#[test]
	fn total_weight_is_the_sum() {
		fn prop(v: VoterSet<usize>) {
			let expected: VoteWeight = v.iter().map(|(_, info)| info.weight()).sum();

			assert_eq!(v.total_weight(), expected);
			assert!(v.threshold() <= v.total_weight());
		}

		quickcheck(prop as fn(_))
	}

	#[test]
	fn threshold_is_right() {
		let threshold = |total| VoteWeight::supermajority(VoteWeight::new(total));

		assert_eq!(threshold(3), VoteWeight::new(3));
		assert_eq!(threshold(4), VoteWeight::new(3));
		assert_eq!(threshold(5), VoteWeight::new(4));
		assert_eq!(threshold(6), VoteWeight::new(5));
		assert_eq!(threshold(7), VoteWeight::new(5));
		assert_eq!(threshold(10), VoteWeight::new(7));
		assert_eq!(threshold(100), VoteWeight::new(67));
		assert_eq!(threshold(101), VoteWeight::new(68));
		assert_eq!(threshold(102), VoteWeight::new(69));
		assert_eq!(threshold(103), VoteWeight::new(69));
	}
}
