//! Batched re-rendering of invalidated components.

use crate::{component::ComponentNode, dom::queue_microtask};
use std::{
	cell::{Cell, RefCell},
	collections::BTreeMap,
	rc::{Rc, Weak},
};
use tracing::{instrument, trace};

thread_local! {
	/// Dirty components by depth.
	static PENDING: RefCell<BTreeMap<u32, Vec<Weak<ComponentNode>>>> = RefCell::new(BTreeMap::new());
	static SCHEDULED: Cell<bool> = Cell::new(false);
}

pub(crate) fn invalidate(node: &Rc<ComponentNode>) {
	if node.unmounted.get() || node.dirty.replace(true) {
		return;
	}
	PENDING.with(|pending| pending.borrow_mut().entry(node.slot.depth).or_default().push(Rc::downgrade(node)));
	if !SCHEDULED.with(|scheduled| scheduled.replace(true)) {
		trace!("Scheduling flush");
		queue_microtask(Box::new(flush));
	}
}

#[instrument]
fn flush() {
	let pending = PENDING.with(|pending| std::mem::take(&mut *pending.borrow_mut()));
	SCHEDULED.with(|scheduled| scheduled.set(false));

	for (depth, nodes) in pending {
		trace!(depth, count = nodes.len(), "Refreshing components");
		for node in nodes.iter().filter_map(Weak::upgrade) {
			if node.dirty.get() && !node.unmounted.get() {
				node.refresh(&|| node.after());
			}
		}
	}
}
