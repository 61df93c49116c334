use tracing::debug;

use cst_core::{CsTreeError, NodeId};

use crate::compact::open_close;
use crate::tree::Tree;

/// Cursor moves. Each returns the new cursor, or `None` when the cursor stays
/// put. The cursor is a single id, so exactly one node is current at any time.
impl Tree {
    pub fn go_next(&mut self) -> Result<Option<NodeId>, CsTreeError> {
        let current = self.get(self.cursor)?;
        if let Some(next) = current.next {
            return Ok(Some(self.move_to(next)));
        }
        for ancestor in self.ancestors(self.cursor) {
            if let Some(next) = self.get(ancestor)?.next {
                return Ok(Some(self.move_to(next)));
            }
        }
        self.descend()
    }

    pub fn go_previous(&mut self) -> Result<Option<NodeId>, CsTreeError> {
        let current = self.get(self.cursor)?;
        match current.prev.or(current.parent) {
            Some(target) => Ok(Some(self.move_to(target))),
            None => Ok(None),
        }
    }

    /// Descends to the first child, opening a closed node first. A leaf
    /// behaves like `go_next`.
    pub fn go_children(&mut self) -> Result<Option<NodeId>, CsTreeError> {
        if self.get(self.cursor)?.children.is_empty() {
            return self.go_next();
        }
        self.descend()
    }

    pub fn go_parent(&mut self) -> Result<Option<NodeId>, CsTreeError> {
        match self.get(self.cursor)?.parent {
            Some(parent) => Ok(Some(self.move_to(parent))),
            None => Ok(None),
        }
    }

    fn descend(&mut self) -> Result<Option<NodeId>, CsTreeError> {
        let cursor = self.cursor;
        if self.get(cursor)?.closed {
            open_close(self, cursor)?;
        }
        match self.get(cursor)?.first_child() {
            Some(child) => Ok(Some(self.move_to(child))),
            None => Ok(None),
        }
    }

    fn move_to(&mut self, target: NodeId) -> NodeId {
        debug!(from = %self.cursor, to = %target, "cursor moved");
        self.cursor = target;
        target
    }
}
