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

//! Helpers for testing

pub mod chain {
	use crate::std::{collections::BTreeMap, vec::Vec};
	use crate::{Chain, Error};

	pub const GENESIS_HASH: &str = "genesis";
	const NULL_HASH: &str = "NULL";

	struct BlockRecord {
		number: u32,
		parent: &'static str,
	}

	/// An in-memory block tree acting as the ancestry oracle.
	pub struct DummyChain {
		inner: BTreeMap<&'static str, BlockRecord>,
	}

	impl DummyChain {
		pub fn new() -> Self {
			let mut inner = BTreeMap::new();
			inner.insert(GENESIS_HASH, BlockRecord { number: 1, parent: NULL_HASH });

			DummyChain { inner }
		}

		/// Add a chain of blocks, each the parent of the next, starting at
		/// the given (already known) parent.
		pub fn push_blocks(&mut self, mut parent: &'static str, blocks: &[&'static str]) {
			let base_number =
				self.inner.get(parent).expect("parent is a known block; qed").number + 1;

			for (i, block) in blocks.iter().enumerate() {
				self.inner
					.insert(block, BlockRecord { number: base_number + i as u32, parent });

				parent = block;
			}
		}

		/// The height of a known block.
		pub fn number(&self, hash: &'static str) -> u32 {
			self.inner.get(hash).expect("known block; qed").number
		}
	}

	impl Chain<&'static str, u32> for DummyChain {
		fn ancestry(
			&self,
			base: &'static str,
			mut block: &'static str,
		) -> Result<Vec<&'static str>, Error> {
			let mut ancestry = Vec::new();

			loop {
				match self.inner.get(block) {
					None => return Err(Error::NotDescendant),
					Some(record) => block = record.parent,
				}

				if block == NULL_HASH {
					return Err(Error::NotDescendant)
				}
				if block == base {
					break
				}

				ancestry.push(block);
			}

			Ok(ancestry)
		}
	}
}
