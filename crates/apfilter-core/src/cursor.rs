//! Cursors: sequential pagination over a collection's members.
//!
//! Each [`CursorStep`] carries its own traversal state (a seen flag or a
//! counter). A cursor is good for one traversal; call [`Cursor::reset`] before
//! running it again.

use apfilter_vocab::{Item, Link};

use crate::check::{Checks, Page};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorStep {
    /// Rejects everything up to and including `link`.
    After { link: Link, seen: bool },
    /// Rejects `link` and everything after it.
    Before { link: Link, seen: bool },
    /// Passes at most `max` items.
    MaxCount { max: usize, passed: usize },
}

impl CursorStep {
    fn accept(&mut self, item: &Item) -> bool {
        match self {
            CursorStep::After { link, seen } => {
                if *seen {
                    return true;
                }
                if is_link(item, link) {
                    *seen = true;
                }
                false
            }
            CursorStep::Before { link, seen } => {
                if *seen {
                    return false;
                }
                if is_link(item, link) {
                    *seen = true;
                    return false;
                }
                true
            }
            CursorStep::MaxCount { max, passed } => {
                if *passed >= *max {
                    return false;
                }
                *passed += 1;
                true
            }
        }
    }

    fn reset(&mut self) {
        match self {
            CursorStep::After { seen, .. } | CursorStep::Before { seen, .. } => *seen = false,
            CursorStep::MaxCount { passed, .. } => *passed = 0,
        }
    }
}

fn is_link(item: &Item, link: &Link) -> bool {
    item.id().is_some_and(|id| id.same_as(link.as_str()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    steps: Vec<CursorStep>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn after(mut self, link: impl Into<Link>) -> Self {
        self.steps.push(CursorStep::After {
            link: link.into(),
            seen: false,
        });
        self
    }

    pub fn before(mut self, link: impl Into<Link>) -> Self {
        self.steps.push(CursorStep::Before {
            link: link.into(),
            seen: false,
        });
        self
    }

    pub fn with_max_count(mut self, max: usize) -> Self {
        self.steps.push(CursorStep::MaxCount { max, passed: 0 });
        self
    }

    /// Build from the top-level pagination markers, in their order.
    pub fn from_checks(checks: &Checks) -> Self {
        checks.pages().fold(Self::new(), |cursor, page| match page {
            Page::After(link) => cursor.after(link.clone()),
            Page::Before(link) => cursor.before(link.clone()),
            Page::MaxItems(n) => cursor.with_max_count(*n),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[CursorStep] {
        &self.steps
    }

    pub fn reset(&mut self) {
        for step in &mut self.steps {
            step.reset();
        }
    }

    /// Run every step on `item`; later steps only see what earlier ones
    /// passed.
    pub fn accept(&mut self, item: &Item) -> bool {
        self.steps.iter_mut().all(|step| step.accept(item))
    }

    /// Rewrite a collection's members (and count) in place. Non-collections
    /// are left untouched.
    pub fn apply(&mut self, item: &mut Item) {
        match item {
            Item::Collection(members) => {
                let taken = std::mem::take(members);
                *members = self.filter_members(taken);
            }
            Item::Object(obj) if obj.shape().is_collection() => {
                let taken = obj.items.take().unwrap_or_default();
                let kept = self.filter_members(taken);
                obj.set_items(kept);
            }
            _ => {}
        }
    }

    pub fn apply_single(&mut self, item: Item) -> Option<Item> {
        self.accept(&item).then_some(item)
    }

    fn filter_members(&mut self, members: Vec<Item>) -> Vec<Item> {
        members.into_iter().filter(|m| self.accept(m)).collect()
    }
}
