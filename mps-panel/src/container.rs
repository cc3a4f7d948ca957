//! Ordered child lists standing in for toolkit containers.
//!
//! The bridge, the switcher's button box and its notebook all manipulate their
//! children only through [`HostContainer`], so a toolkit backend can supply its
//! own implementation. [`ChildList`] is the in-memory one the panel ships with.

pub trait HostContainer {
    type Child;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert at `index`, clamped to the current length.
    fn insert_child(&mut self, index: usize, child: Self::Child);

    fn remove_child(&mut self, index: usize) -> Option<Self::Child>;

    /// Move a child to a new index (clamped). Out-of-range `from` is a no-op.
    fn move_child(&mut self, from: usize, to: usize);

    /// Move a child to the end, i.e. the top of the stacking order.
    fn raise_child(&mut self, index: usize) {
        let last = self.len().saturating_sub(1);
        self.move_child(index, last);
    }

    fn child(&self, index: usize) -> Option<&Self::Child>;

    fn child_mut(&mut self, index: usize) -> Option<&mut Self::Child>;

    fn clear(&mut self) {
        while let Some(last) = self.len().checked_sub(1) {
            self.remove_child(last);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChildList<T> {
    children: Vec<T>,
}

impl<T> Default for ChildList<T> {
    fn default() -> Self {
        Self {
            children: Vec::new(),
        }
    }
}

impl<T> ChildList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.children.iter()
    }

    pub fn position(&self, pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.children.iter().position(pred)
    }
}

impl<T> HostContainer for ChildList<T> {
    type Child = T;

    fn len(&self) -> usize {
        self.children.len()
    }

    fn insert_child(&mut self, index: usize, child: T) {
        let index = index.min(self.children.len());
        self.children.insert(index, child);
    }

    fn remove_child(&mut self, index: usize) -> Option<T> {
        (index < self.children.len()).then(|| self.children.remove(index))
    }

    fn move_child(&mut self, from: usize, to: usize) {
        if let Some(child) = self.remove_child(from) {
            self.insert_child(to, child);
        }
    }

    fn child(&self, index: usize) -> Option<&T> {
        self.children.get(index)
    }

    fn child_mut(&mut self, index: usize) -> Option<&mut T> {
        self.children.get_mut(index)
    }

    fn clear(&mut self) {
        self.children.clear();
    }
}
