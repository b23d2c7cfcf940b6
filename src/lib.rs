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

//! Vote accumulation over block trees for finality gadgets.
//!
//! A finality gadget superimposes weighted votes over the tree of blocks
//! produced by a blockchain. The [`VoteGraph`](graph::VoteGraph) in this
//! crate maintains a compressed view of the voted-on portion of that tree
//! and accumulates vote data along its edges, so that a round driver can
//! repeatedly ask two questions:
//!
//! - which block of greatest height has accumulated enough votes across its
//!   whole subtree ([`VoteGraph::find_ghost`](graph::VoteGraph::find_ghost)),
//! - and which block of greatest height *on a given chain* has accumulated
//!   enough votes ([`VoteGraph::find_ancestor`](graph::VoteGraph::find_ancestor)).
//!
//! What constitutes "vote data" is left to the [`VoteAccumulator`] trait.
//! The [`tally`] module provides the accumulator used in practice, counting
//! each voter of a [`VoterSet`] at most once per block via a bitfield.
//!
//! The graph performs no validation of votes: signature checking,
//! equivocation handling and round orchestration are the caller's concern.
//! Its only view of the underlying blockchain is the [`Chain`] ancestry
//! oracle.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
#[macro_use]
extern crate alloc;

#[cfg(not(feature = "std"))]
mod std {
	pub use core::{cmp, fmt, iter, num, ops};

	pub mod vec {
		pub use alloc::vec::Vec;
	}

	pub mod collections {
		pub use alloc::collections::{
			btree_map::{self, BTreeMap},
			btree_set::{self, BTreeSet},
		};
	}
}

#[cfg(feature = "std")]
mod std {
	pub use ::std::{cmp, collections, fmt, iter, num, ops, vec};
}

pub mod bitfield;
pub mod graph;
pub mod tally;
pub mod voter_set;
pub mod weights;

#[cfg(any(test, feature = "fuzz-helpers"))]
pub mod fuzz_helpers;

#[cfg(any(test, feature = "fuzz-helpers"))]
pub mod testing;

pub use crate::graph::{VoteAccumulator, VoteGraph, VoteInput};
pub use crate::voter_set::{VoterInfo, VoterSet};
pub use crate::weights::{VoteWeight, VoterWeight};

use crate::std::{cmp, fmt, ops, vec::Vec};

/// Errors surfaced by the ancestry oracle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
	/// The block is not a descendant of the base in question.
	NotDescendant,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Error::NotDescendant => write!(f, "block not descendant of base"),
		}
	}
}

#[cfg(feature = "std")]
impl ::std::error::Error for Error {}

/// Arithmetic necessary for a block number.
pub trait BlockNumberOps:
	fmt::Debug
	+ cmp::Ord
	+ ops::Add<Output = Self>
	+ ops::Sub<Output = Self>
	+ num::One
	+ num::Zero
	+ num::AsPrimitive<usize>
{
}

impl<T> BlockNumberOps for T
where
	T: fmt::Debug,
	T: cmp::Ord,
	T: ops::Add<Output = Self>,
	T: ops::Sub<Output = Self>,
	T: num::One,
	T: num::Zero,
	T: num::AsPrimitive<usize>,
{
}

/// Provides ancestry information between blocks to the vote-graph.
///
/// The oracle is trusted: the graph does not defend against answers that
/// are inconsistent with the real block tree.
pub trait Chain<H: Eq, N: Copy + BlockNumberOps> {
	/// Get the ancestry of `block` up to but not including `base`,
	/// in reverse order starting from `block`'s parent.
	///
	/// Fails if `block` is not a descendant of `base` or the lookup
	/// itself fails.
	fn ancestry(&self, base: H, block: H) -> Result<Vec<H>, Error>;

	/// Whether `block` is a descendant of, or equal to, `base`.
	fn is_equal_or_descendant_of(&self, base: H, block: H) -> bool {
		if base == block {
			return true
		}

		self.ancestry(base, block).is_ok()
	}
}
