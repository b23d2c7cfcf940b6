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

//! Vote-weight arithmetic for the accumulators in this crate.
//!
//! Two kinds of quantity appear when tallying: the fixed, non-zero weight
//! of an individual voter, and the running total accumulated from any
//! number of voters. Totals are only ever built up voter by voter and
//! compared against the supermajority threshold, so that is the entire
//! surface here. Accumulation saturates; a chain whose total voter weight
//! approaches `u64::MAX` is out of scope.

use crate::std::{iter, num::NonZeroU64, ops::Add};

/// The weight accumulated from any number of votes (possibly none).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct VoteWeight(u64);

impl VoteWeight {
	/// The weight of no votes at all.
	pub const ZERO: VoteWeight = VoteWeight(0);

	/// A known accumulated weight.
	pub const fn new(weight: u64) -> Self {
		VoteWeight(weight)
	}

	/// The least accumulated weight constituting a supermajority of
	/// `total`: what cannot be outvoted even if the faulty third
	/// tolerated by a 3f + 1 assumption defects.
	pub fn supermajority(total: VoteWeight) -> VoteWeight {
		let faulty = total.0.saturating_sub(1) / 3;
		VoteWeight(total.0 - faulty)
	}
}

impl Add for VoteWeight {
	type Output = Self;

	fn add(self, rhs: Self) -> Self {
		VoteWeight(self.0.saturating_add(rhs.0))
	}
}

impl Add<VoterWeight> for VoteWeight {
	type Output = Self;

	fn add(self, rhs: VoterWeight) -> Self {
		VoteWeight(self.0.saturating_add(rhs.get()))
	}
}

impl iter::Sum<VoterWeight> for VoteWeight {
	fn sum<I: Iterator<Item = VoterWeight>>(iter: I) -> Self {
		iter.fold(VoteWeight::ZERO, |total, weight| total + weight)
	}
}

/// The voting weight of a single voter.
///
/// Always non-zero: a voter without weight is not a voter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VoterWeight(NonZeroU64);

impl VoterWeight {
	/// Create a voter weight, rejecting zero.
	pub fn new(weight: u64) -> Option<Self> {
		NonZeroU64::new(weight).map(Self)
	}

	pub fn get(self) -> u64 {
		self.0.get()
	}
}
