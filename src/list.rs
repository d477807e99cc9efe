//! Keyed reconciliation of list content.
//!
//! Matching prefixes, suffixes and crosswise swaps are handled in place. What remains is matched by key; the reused
//! items on a longest increasing subsequence of their old positions stay where they are and everything else is moved
//! or rendered before its successor, working from the tail.

use crate::{
	dom::Node,
	events::{Phases, Plan},
	value::{Key, Value},
	vnode::{Owner, Slot, VNode},
};
use hashbrown::HashMap;
use std::{cell::RefCell, rc::Rc};
use tracing::{instrument, trace, warn};

pub(crate) struct Entry {
	key: Key,
	node: VNode,
}

pub(crate) struct ListNode {
	pub(crate) slot: Slot,
	children: RefCell<Vec<Entry>>,
}

fn keyed(index: usize, item: &Value) -> (Key, &Value) {
	match item {
		Value::Keyed(keyed) => (keyed.key.clone(), &keyed.value),
		item => (Key::Index(index), item),
	}
}

fn key(old: &[Option<Entry>], a: usize) -> &Key {
	&old[a].as_ref().expect("tagged-dom bug: Old entry already taken.").key
}

fn take(old: &mut [Option<Entry>], a: usize) -> Entry {
	old[a].take().expect("tagged-dom bug: Old entry already taken.")
}

fn update(entry: Entry, value: &Value, anchor: &dyn Fn() -> Option<Node>) -> Entry {
	Entry {
		key: entry.key,
		node: entry.node.update(value, anchor),
	}
}

fn first_head<'a>(entries: impl IntoIterator<Item = &'a Option<Entry>>) -> Option<Node> {
	entries.into_iter().flatten().find_map(|entry| entry.node.head())
}

impl ListNode {
	#[instrument(skip_all, fields(len = items.len()))]
	pub(crate) fn render(items: &[Value], slot: Slot, before: Option<&Node>) -> Rc<ListNode> {
		let list = Rc::new(ListNode {
			slot,
			children: RefCell::new(Vec::with_capacity(items.len())),
		});
		let children = items
			.iter()
			.enumerate()
			.map(|(index, item)| {
				let (key, value) = keyed(index, item);
				Entry {
					key,
					node: VNode::render(value, list.child_slot(), before),
				}
			})
			.collect();
		*list.children.borrow_mut() = children;
		list
	}

	fn child_slot(self: &Rc<Self>) -> Slot {
		Slot {
			parent: self.slot.parent.clone(),
			exclusive: false,
			owner: Owner::List(Rc::downgrade(self)),
			root: self.slot.root.clone(),
			delegation_root: self.slot.delegation_root,
			depth: self.slot.depth,
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.children.borrow().len()
	}

	#[instrument(skip_all, fields(old = self.len(), new = items.len()))]
	pub(crate) fn update(self: &Rc<Self>, items: &[Value], after: &dyn Fn() -> Option<Node>) {
		let old = std::mem::take(&mut *self.children.borrow_mut());
		let new = items.iter().enumerate().map(|(index, item)| keyed(index, item)).collect::<Vec<_>>();
		let children = self.reconcile(old, &new, after);
		*self.children.borrow_mut() = children;
	}

	fn reconcile(self: &Rc<Self>, old: Vec<Entry>, new: &[(Key, &Value)], after: &dyn Fn() -> Option<Node>) -> Vec<Entry> {
		let old_len = old.len();
		let mut old = old.into_iter().map(Some).collect::<Vec<_>>();
		let mut result = (0..new.len()).map(|_| None).collect::<Vec<Option<Entry>>>();
		let (mut a0, mut a1, mut b0, mut b1) = (0, old_len, 0, new.len());

		loop {
			let progress = (a0, a1);

			while a0 < a1 && b0 < b1 && *key(&old, a0) == new[b0].0 {
				let entry = take(&mut old, a0);
				let anchor = || first_head(&old[a0 + 1..a1]).or_else(|| first_head(&result[b1..])).or_else(after);
				result[b0] = Some(update(entry, new[b0].1, &anchor));
				a0 += 1;
				b0 += 1;
			}

			while a0 < a1 && b0 < b1 && *key(&old, a1 - 1) == new[b1 - 1].0 {
				let entry = take(&mut old, a1 - 1);
				let anchor = || first_head(&result[b1..]).or_else(after);
				result[b1 - 1] = Some(update(entry, new[b1 - 1].1, &anchor));
				a1 -= 1;
				b1 -= 1;
			}

			while a1 - a0 >= 2 && b1 - b0 >= 2 && *key(&old, a0) == new[b1 - 1].0 && *key(&old, a1 - 1) == new[b0].0 {
				let front = take(&mut old, a0);
				let back = take(&mut old, a1 - 1);

				let anchor = front.node.head().or_else(|| first_head(&old[a0 + 1..a1 - 1])).or_else(|| first_head(&result[b1..])).or_else(after);
				back.node.insert(anchor.as_ref());
				result[b0] = Some(update(back, new[b0].1, &|| anchor.clone()));

				let anchor = first_head(&result[b1..]).or_else(after);
				front.node.insert(anchor.as_ref());
				result[b1 - 1] = Some(update(front, new[b1 - 1].1, &|| anchor.clone()));

				a0 += 1;
				a1 -= 1;
				b0 += 1;
				b1 -= 1;
			}

			if (a0, a1) == progress {
				break;
			}
		}

		if a0 == a1 {
			let anchor = first_head(&result[b1..]).or_else(after);
			let slot = self.child_slot();
			for b in b0..b1 {
				result[b] = Some(Entry {
					key: new[b].0.clone(),
					node: VNode::render(new[b].1, slot.clone(), anchor.as_ref()),
				});
			}
		} else if b0 == b1 {
			for a in a0..a1 {
				let entry = take(&mut old, a);
				entry.node.unmount();
				entry.node.remove();
			}
		} else {
			self.reconcile_keyed(&mut old, (a0, a1), &mut result, (b0, b1), new, after);
		}

		result.into_iter().map(|entry| entry.expect("tagged-dom bug: Reconciliation left a gap.")).collect()
	}

	/// The general case: the remaining ranges share no matching ends.
	fn reconcile_keyed(
		self: &Rc<Self>,
		old: &mut [Option<Entry>],
		(a0, a1): (usize, usize),
		result: &mut [Option<Entry>],
		(b0, b1): (usize, usize),
		new: &[(Key, &Value)],
		after: &dyn Fn() -> Option<Node>,
	) {
		let mut positions = HashMap::with_capacity(b1 - b0);
		for (b, (key, _)) in new.iter().enumerate().take(b1).skip(b0) {
			if !positions.contains_key(key) {
				positions.insert(key, b);
			} else if cfg!(debug_assertions) {
				warn!(?key, "Duplicate key in list. Later occurrences are rendered fresh.");
			}
		}

		// Old position for each new item, if reused.
		let mut sources = vec![None; b1 - b0];
		let mut reused = 0;
		let mut doomed = Vec::new();
		for a in a0..a1 {
			let entry = old[a].as_ref().expect("tagged-dom bug: Old entry already taken.");
			match positions.get(&entry.key) {
				Some(&b) if sources[b - b0].is_none() => {
					sources[b - b0] = Some(a);
					reused += 1;
				}
				_ => {
					if positions.contains_key(&entry.key) && cfg!(debug_assertions) {
						warn!(key = ?entry.key, "Duplicate key in list. Later occurrences are removed.");
					}
					doomed.push(a);
				}
			}
		}

		let slot = self.child_slot();
		if reused == 0 && a0 == 0 && a1 == old.len() && b0 == 0 && b1 == new.len() {
			trace!("No keys in common, replacing the whole list");
			for entry in old.iter_mut().filter_map(Option::take) {
				entry.node.unmount();
				if !self.slot.exclusive {
					entry.node.remove();
				}
			}
			if self.slot.exclusive {
				self.slot.parent.set_text_content("");
			}
			let anchor = after();
			for (b, (key, value)) in new.iter().enumerate() {
				result[b] = Some(Entry {
					key: key.clone(),
					node: VNode::render(value, slot.clone(), anchor.as_ref()),
				});
			}
			return;
		}

		for a in doomed {
			let entry = take(old, a);
			entry.node.unmount();
			entry.node.remove();
		}

		let (offsets, sequence): (Vec<usize>, Vec<usize>) = sources.iter().enumerate().filter_map(|(offset, source)| source.map(|a| (offset, a))).unzip();
		let mut stays = vec![false; b1 - b0];
		for index in longest_increasing_subsequence(&sequence) {
			stays[offsets[index]] = true;
		}
		trace!(reused, stay = sequence.len(), "Matched keys");

		for b in (b0..b1).rev() {
			let anchor = first_head(&result[b + 1..]).or_else(after);
			let (key, value) = &new[b];
			result[b] = Some(match sources[b - b0] {
				Some(a) => {
					let entry = take(old, a);
					if !stays[b - b0] {
						entry.node.insert(anchor.as_ref());
					}
					update(entry, value, &|| anchor.clone())
				}
				None => Entry {
					key: key.clone(),
					node: VNode::render(value, slot.clone(), anchor.as_ref()),
				},
			});
		}
	}

	pub(crate) fn unmount(&self) {
		for entry in self.children.borrow().iter() {
			entry.node.unmount();
		}
	}

	pub(crate) fn remove(&self) {
		for entry in self.children.borrow().iter() {
			entry.node.remove();
		}
	}

	pub(crate) fn size(&self) -> usize {
		self.children.borrow().iter().map(|entry| entry.node.size()).sum()
	}

	pub(crate) fn head(&self) -> Option<Node> {
		self.children.borrow().iter().find_map(|entry| entry.node.head())
	}

	pub(crate) fn insert(&self, before: Option<&Node>) {
		for entry in self.children.borrow().iter() {
			entry.node.insert(before);
		}
	}

	/// The first DOM node after the child with `id`.
	pub(crate) fn after_child(&self, id: usize) -> Option<Node> {
		let children = self.children.borrow();
		let position = children.iter().position(|entry| entry.node.id() == id)?;
		children[position + 1..].iter().find_map(|entry| entry.node.head())
	}

	pub(crate) fn route(&self, chain: &[Node], name: &str, phases: Phases, plan: &mut Plan) {
		let Ok(children) = self.children.try_borrow() else {
			warn!("List is busy, dropping event");
			return;
		};
		let parent = &self.slot.parent;
		let Some(start) = children.iter().find_map(|entry| entry.node.head()).and_then(|head| parent.child_index(&head)) else {
			return;
		};
		let Some(mut offset) = parent.child_index(&chain[0]).and_then(|index| index.checked_sub(start)) else {
			return;
		};
		for entry in children.iter() {
			let size = entry.node.size();
			if offset < size {
				entry.node.route(chain, name, phases, plan);
				return;
			}
			offset -= size;
		}
	}
}

/// Indices into `sequence` of one of its longest strictly increasing subsequences.
pub(crate) fn longest_increasing_subsequence(sequence: &[usize]) -> Vec<usize> {
	let mut tails: Vec<usize> = Vec::new();
	let mut predecessors = vec![usize::MAX; sequence.len()];
	for (index, &value) in sequence.iter().enumerate() {
		let position = match tails.last() {
			Some(&last) if sequence[last] < value => tails.len(),
			None => 0,
			Some(_) => tails.partition_point(|&tail| sequence[tail] < value),
		};
		if position > 0 {
			predecessors[index] = tails[position - 1];
		}
		if position == tails.len() {
			tails.push(index);
		} else {
			tails[position] = index;
		}
	}

	let mut subsequence = vec![0; tails.len()];
	let mut current = tails.last().copied().unwrap_or(usize::MAX);
	for slot in subsequence.iter_mut().rev() {
		*slot = current;
		current = predecessors[current];
	}
	subsequence
}

#[cfg(test)]
mod tests {
	use super::longest_increasing_subsequence;
	use rstest::rstest;

	#[rstest]
	#[case(&[], &[])]
	#[case(&[4], &[0])]
	#[case(&[0, 1, 2, 3], &[0, 1, 2, 3])]
	#[case(&[3, 2, 1, 0], &[3])]
	#[case(&[2, 0, 1, 5, 3, 4], &[1, 2, 4, 5])]
	#[case(&[10, 1, 11, 2, 12], &[1, 3, 4])]
	fn finds_a_longest_increasing_subsequence(#[case] sequence: &[usize], #[case] expected: &[usize]) {
		assert_eq!(longest_increasing_subsequence(sequence), expected);
	}

	#[test]
	fn subsequence_is_increasing_and_maximal_for_a_permutation() {
		let sequence = [5, 1, 6, 2, 7, 3, 8, 0, 4, 9];
		let subsequence = longest_increasing_subsequence(&sequence);
		assert_eq!(subsequence.len(), 5);
		assert!(subsequence.windows(2).all(|pair| pair[0] < pair[1] && sequence[pair[0]] < sequence[pair[1]]));
	}
}
