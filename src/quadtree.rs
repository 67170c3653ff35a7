//! A power-of-two-sided spatial subdivision with balanced-neighbor
//! refinement (spec S4.3).
//!
//! Represented as a flat arena of nodes rather than owned child pointers
//! (the arena-vs-owned-pointers redesign called for in spec S9): this
//! removes per-node heap allocation and turns `find`/`find_outer` into
//! iterative descents instead of recursive pointer chases.

/// Index into the node arena. `0` is always the root.
pub type NodeId = u32;

/// An axis-aligned square cell, half-open on all sides: `[xl, xr) x [yl, yr)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
	pub xl: isize,
	pub xr: isize,
	pub yl: isize,
	pub yr: isize,
}

impl Rect {
	pub fn side(&self) -> isize { self.xr - self.xl }
	pub fn area(&self) -> isize { self.side() * self.side() }
}

#[derive(Clone, Debug)]
struct Node {
	rect: Rect,
	/// `None` for a leaf; otherwise `[ll, lr, rl, rr]` child indices, where
	/// `ll` covers `x < xm, y < ym`, `lr` covers `x < xm, y >= ym`, `rl`
	/// covers `x >= xm, y < ym`, and `rr` covers `x >= xm, y >= ym`.
	children: Option<[NodeId; 4]>,
}

/// A balanced quadtree over `[0, range) x [0, range)`.
pub struct Quadtree {
	nodes: Vec<Node>,
	range: isize,
}

impl Quadtree {
	/// Creates a quadtree with a single leaf covering `[0, range) x [0, range)`.
	/// `range` must be a power of two.
	pub fn new(range: usize) -> Self {
		assert!(range.is_power_of_two());
		let root = Node {
			rect: Rect { xl: 0, xr: range as isize, yl: 0, yr: range as isize },
			children: None,
		};
		Quadtree { nodes: vec![root], range: range as isize }
	}

	/// Side length of the root cell.
	pub fn root_side(&self) -> isize { self.range }

	fn is_leaf(&self, idx: usize) -> bool { self.nodes[idx].children.is_none() }

	fn in_range(&self, x: isize, y: isize) -> bool {
		x >= 0 && y >= 0 && x < self.range && y < self.range
	}

	fn find_child_idx(&self, idx: usize, x: isize, y: isize) -> usize {
		let r = self.nodes[idx].rect;
		let xm = (r.xl + r.xr) / 2;
		let ym = (r.yl + r.yr) / 2;
		let children = self.nodes[idx].children.expect("find_child_idx called on a leaf");
		let which = if x < xm {
			if y < ym { 0 } else { 1 }
		} else {
			if y < ym { 2 } else { 3 }
		};
		children[which] as usize
	}

	/// Subdivides the leaf at `idx` into four equal children of half side.
	fn subdivide(&mut self, idx: usize) {
		let r = self.nodes[idx].rect;
		let xm = (r.xl + r.xr) / 2;
		let ym = (r.yl + r.yr) / 2;
		let rects = [
			Rect { xl: r.xl, xr: xm, yl: r.yl, yr: ym },
			Rect { xl: r.xl, xr: xm, yl: ym, yr: r.yr },
			Rect { xl: xm, xr: r.xr, yl: r.yl, yr: ym },
			Rect { xl: xm, xr: r.xr, yl: ym, yr: r.yr },
		];
		let mut ids = [0u32; 4];
		for (i, rect) in rects.iter().enumerate() {
			ids[i] = self.nodes.len() as NodeId;
			self.nodes.push(Node { rect: *rect, children: None });
		}
		self.nodes[idx].children = Some(ids);
	}

	/// The leaf containing `(x, y)` using the half-open convention
	/// (`x < xm` / `y < ym` routes to the lower child). `None` when
	/// `(x, y)` is outside `[0, range)^2`.
	pub fn find(&self, x: isize, y: isize) -> Option<Rect> {
		self.find_idx(x, y).map(|idx| self.nodes[idx].rect)
	}

	fn find_idx(&self, x: isize, y: isize) -> Option<usize> {
		if !self.in_range(x, y) {
			return None;
		}
		let mut now = 0usize;
		while !self.is_leaf(now) {
			now = self.find_child_idx(now, x, y);
		}
		Some(now)
	}

	/// Locates the leaf whose closed closure contains `(x, y)`, using the
	/// closed convention (`x <= xm` / `y <= ym`). Deliberately returns a
	/// *different* leaf than [`Quadtree::find`] when `(x, y)` lies exactly
	/// on a cell boundary, so callers can recover both cells meeting at a
	/// keypoint. The name is kept for traceability with the reference
	/// implementation even though the closed-boundary semantics are not
	/// really "outer" (spec S9 open question).
	pub fn find_outer(&self, x: isize, y: isize) -> Option<Rect> {
		self.find_outer_idx(x, y).map(|idx| self.nodes[idx].rect)
	}

	fn find_outer_idx(&self, x: isize, y: isize) -> Option<usize> {
		let mut now = 0usize;
		loop {
			let r = self.nodes[now].rect;
			if !(r.xl <= x && x <= r.xr && r.yl <= y && y <= r.yr) {
				return None;
			}
			if self.is_leaf(now) {
				return Some(now);
			}
			let xm = (r.xl + r.xr) / 2;
			let ym = (r.yl + r.yr) / 2;
			let children = self.nodes[now].children.unwrap();
			let which = if x <= xm {
				if y <= ym { 0 } else { 1 }
			} else {
				if y <= ym { 2 } else { 3 }
			};
			now = children[which] as usize;
		}
	}

	/// True iff `(x, y)` is a keypoint: on the canvas boundary, or the
	/// top-left corner of its enclosing leaf *and* the bottom-right corner
	/// of the leaf reached via the closed-convention descent.
	pub fn is_keypoint(&self, x: isize, y: isize) -> bool {
		if x == 0 || y == 0 {
			return true;
		}
		let node = match self.find_idx(x, y) {
			Some(n) => n,
			None => return false,
		};
		let r = self.nodes[node].rect;
		if r.xl == x && r.yl == y {
			match self.find_outer_idx(x, y) {
				Some(outer) => {
					let o = self.nodes[outer].rect;
					o.xr == x && o.yr == y
				}
				None => false,
			}
		} else {
			false
		}
	}

	/// Repeatedly descends to the leaf covering `(x, y)`; while its side
	/// exceeds `target_range`, subdivides it and additionally balances the
	/// four outward-adjacent points at the new side length, so that the
	/// 2:1 size-ratio invariant holds across every shared edge.
	/// `target_range = 1` forces a unit leaf.
	pub fn split(&mut self, x: isize, y: isize, target_range: isize) {
		if !self.in_range(x, y) {
			return;
		}
		let mut now = 0usize;
		loop {
			let side = self.nodes[now].rect.side();
			if side <= target_range {
				break;
			}
			if self.is_leaf(now) {
				self.subdivide(now);
				let r = self.nodes[now].rect;
				// Neighbor balance bound is this node's own pre-split side,
				// not the new children's half-side.
				self.sub_split(r.xl - 1, r.yl, side);
				self.sub_split(r.xl, r.yl - 1, side);
				self.sub_split(r.xr, r.yl, side);
				self.sub_split(r.xl, r.yr, side);
			}
			now = self.find_child_idx(now, x, y);
		}
	}

	fn sub_split(&mut self, x: isize, y: isize, range: isize) {
		if let Some(idx) = self.find_idx(x, y) {
			if self.nodes[idx].rect.side() > range {
				self.split(x, y, range);
			}
		}
	}

	/// Depth-first iteration over every leaf rectangle (replaces the
	/// reference implementation's callback-based `traverse` with a
	/// value-producing iterator, per spec S9).
	pub fn leaves(&self) -> Leaves<'_> {
		Leaves { tree: self, stack: vec![0] }
	}
}

/// Iterator over leaf rectangles, produced by [`Quadtree::leaves`].
pub struct Leaves<'a> {
	tree: &'a Quadtree,
	stack: Vec<usize>,
}

impl<'a> Iterator for Leaves<'a> {
	type Item = Rect;

	fn next(&mut self) -> Option<Self::Item> {
		while let Some(idx) = self.stack.pop() {
			match self.tree.nodes[idx].children {
				None => return Some(self.tree.nodes[idx].rect),
				Some(children) => {
					for &child in children.iter().rev() {
						self.stack.push(child as usize);
					}
				}
			}
		}
		None
	}
}
