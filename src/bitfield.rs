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

//! Compact sets of voters, indexed by their position in a voter set.
//!
//! Vote-nodes carry one such set each; merging the sets of two edges is a
//! bitwise or, which is what makes cross-edge accumulation immune to
//! counting any voter twice.

use crate::std::vec::Vec;

/// A dynamically sized bitfield with one bit per voter.
///
/// Bits are stored in 64-bit words, most significant bit first, so that
/// iteration yields positions in increasing order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bitfield {
	bits: Vec<u64>,
}

impl Bitfield {
	/// Create a new empty bitfield.
	pub fn new() -> Self {
		Bitfield { bits: Vec::new() }
	}

	/// Whether no bit is set.
	pub fn is_blank(&self) -> bool {
		self.bits.iter().all(|word| *word == 0)
	}

	/// Set the bit at the given position, growing the bitfield as needed.
	pub fn set_bit(&mut self, position: usize) {
		let word_off = position / 64;
		let bit_off = position % 64;

		if self.bits.len() <= word_off {
			self.bits.resize(word_off + 1, 0);
		}

		self.bits[word_off] |= 1 << (63 - bit_off);
	}

	/// Test the bit at the given position.
	pub fn test_bit(&self, position: usize) -> bool {
		let word_off = position / 64;
		let bit_off = position % 64;

		self.bits.get(word_off).map_or(false, |word| word & (1 << (63 - bit_off)) != 0)
	}

	/// Merge another bitfield into this one with a bitwise or.
	pub fn merge(&mut self, other: &Self) -> &mut Self {
		if self.bits.len() < other.bits.len() {
			self.bits.resize(other.bits.len(), 0);
		}

		for (word, other_word) in self.bits.iter_mut().zip(&other.bits) {
			*word |= other_word;
		}

		self
	}

	/// Iterate over all set bits, in increasing position order.
	pub fn iter1s(&self) -> impl Iterator<Item = Bit1> + '_ {
		self.bits.iter().enumerate().flat_map(|(word_off, &word)| {
			(0..64).filter_map(move |bit_off| {
				if word & (1 << (63 - bit_off)) != 0 {
					Some(Bit1 { position: word_off * 64 + bit_off })
				} else {
					None
				}
			})
		})
	}
}

/// A set bit at a known position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bit1 {
	/// The position of the bit in the bitfield.
	pub position: usize,
}

#[cfg(test)]
mod tests {
	use super::*;
	use quickcheck::quickcheck;

	// random bit positions, kept small enough for tests to stay fast.
	fn positions(seed: &[u16]) -> impl Iterator<Item = usize> + '_ {
		seed.iter().map(|p| *p as usize % 1024)
	}

	#[test]
	fn set_and_test_bits() {
		fn prop(seed: Vec<u16>) {
			let mut bitfield = Bitfield::new();

			for position in positions(&seed) {
				bitfield.set_bit(position);
			}

			for position in positions(&seed) {
				assert!(bitfield.test_bit(position));
			}

			assert_eq!(bitfield.is_blank(), seed.is_empty());
		}

		quickcheck(prop as fn(_))
	}

	#[test]
	fn iteration_is_sorted_and_complete() {
		fn prop(seed: Vec<u16>) {
			let mut expected: Vec<usize> = positions(&seed).collect();
			expected.sort_unstable();
			expected.dedup();

			let mut bitfield = Bitfield::new();
			for position in positions(&seed) {
				bitfield.set_bit(position);
			}

			let actual: Vec<usize> = bitfield.iter1s().map(|bit| bit.position).collect();
			assert_eq!(actual, expected);
		}

		quickcheck(prop as fn(_))
	}

	#[test]
	fn merge_is_union() {
		fn prop(left: Vec<u16>, right: Vec<u16>) {
			let mut a = Bitfield::new();
			for position in positions(&left) {
				a.set_bit(position);
			}

			let mut b = Bitfield::new();
			for position in positions(&right) {
				b.set_bit(position);
			}

			let mut merged = a.clone();
			merged.merge(&b);

			for position in positions(&left).chain(positions(&right)) {
				assert!(merged.test_bit(position));
			}

			for bit in merged.iter1s() {
				assert!(a.test_bit(bit.position) || b.test_bit(bit.position));
			}
		}

		quickcheck(prop as fn(_, _))
	}

	#[test]
	fn first_and_last_bit_of_a_word() {
		let mut bitfield = Bitfield::new();

		bitfield.set_bit(0);
		bitfield.set_bit(63);
		bitfield.set_bit(64);

		let positions: Vec<usize> = bitfield.iter1s().map(|bit| bit.position).collect();
		assert_eq!(positions, vec![0, 63, 64]);
	}
}
