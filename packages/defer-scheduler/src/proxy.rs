use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::driver::Core;
use crate::error::CallError;
use crate::future::CallFuture;

pub type Handler<A, T> = Rc<dyn Fn(A) -> anyhow::Result<T>>;

type NameList = SmallVec<[String; 8]>;

/// Operation name to handler. A slot may be empty; empty slots are not
/// callable and never get a wrapper.
pub struct HandlerTable<A, T> {
    entries: FxHashMap<String, Option<Handler<A, T>>>,
}

impl<A, T> HandlerTable<A, T> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    pub fn with<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(A) -> anyhow::Result<T> + 'static,
    {
        self.insert(name, handler);
        self
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(A) -> anyhow::Result<T> + 'static,
    {
        self.entries.insert(name.into(), Some(Rc::new(handler)));
    }

    pub fn insert_slot(&mut self, name: impl Into<String>, slot: Option<Handler<A, T>>) {
        self.entries.insert(name.into(), slot);
    }

    pub fn get(&self, name: &str) -> Option<&Handler<A, T>> {
        self.entries.get(name).and_then(Option::as_ref)
    }

    /// Names with a handler behind them, sorted.
    pub fn callable_names(&self) -> NameList {
        let mut names: NameList = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }
}

impl<A, T> Default for HandlerTable<A, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, T> Clone for HandlerTable<A, T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<A, T> fmt::Debug for HandlerTable<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Caller-facing wrapper for one operation.
pub struct Method<A, T> {
    name: Rc<str>,
    core: Weak<Core<A, T>>,
}

impl<A: 'static, T: 'static> Method<A, T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues the call and returns straight away; the handler runs on a later flush.
    pub fn call(&self, args: A) -> CallFuture<T> {
        match self.core.upgrade() {
            Some(core) => core.enqueue_call(&self.name, args),
            None => CallFuture::rejected(CallError::Disposed),
        }
    }
}

/// The stable set of wrappers handed to callers.
pub struct CallTable<A, T> {
    methods: Vec<Method<A, T>>,
}

impl<A: 'static, T: 'static> CallTable<A, T> {
    pub fn get(&self, name: &str) -> Option<&Method<A, T>> {
        self.methods
            .binary_search_by(|m| (*m.name).cmp(name))
            .ok()
            .map(|i| &self.methods[i])
    }

    /// Shorthand for `get(name).map(|m| m.call(args))`.
    pub fn call(&self, name: &str, args: A) -> Option<CallFuture<T>> {
        self.get(name).map(|method| method.call(args))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|m| &*m.name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<A, T> fmt::Debug for CallTable<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.methods.iter().map(|m| &*m.name)).finish()
    }
}

/// Builds call tables, reusing the last one while the set of callable names
/// is unchanged. Handler identity does not matter: wrappers resolve the
/// handler on the driver at call time.
pub(crate) struct ProxyFactory<A, T> {
    core: Weak<Core<A, T>>,
    names: NameList,
    current: Option<Rc<CallTable<A, T>>>,
}

impl<A: 'static, T: 'static> ProxyFactory<A, T> {
    pub(crate) fn new(core: Weak<Core<A, T>>) -> Self {
        Self {
            core,
            names: NameList::new(),
            current: None,
        }
    }

    pub(crate) fn build(&mut self, table: &HandlerTable<A, T>) -> Rc<CallTable<A, T>> {
        let names = table.callable_names();
        if let Some(current) = &self.current {
            if current_matches(&self.names, &names) {
                return Rc::clone(current);
            }
        }

        tracing::debug!(operations = ?names, "building call table");
        let methods = names
            .iter()
            .map(|name| Method {
                name: Rc::from(name.as_str()),
                core: self.core.clone(),
            })
            .collect();
        let table = Rc::new(CallTable { methods });
        self.names = names;
        self.current = Some(Rc::clone(&table));
        table
    }
}

fn current_matches(previous: &NameList, next: &NameList) -> bool {
    previous.as_slice() == next.as_slice()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slots_are_not_callable() {
        let mut table = HandlerTable::<i32, i32>::new().with("double", |x| Ok(x * 2));
        table.insert_slot("version", None);

        assert!(table.get("double").is_some());
        assert!(table.get("version").is_none());
        assert_eq!(table.callable_names().to_vec(), vec!["double"]);
    }

    #[test]
    fn callable_names_are_sorted() {
        let table = HandlerTable::<(), ()>::new()
            .with("zeta", |_| Ok(()))
            .with("alpha", |_| Ok(()))
            .with("mid", |_| Ok(()));
        assert_eq!(table.callable_names().to_vec(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn factory_reuses_table_for_same_names() {
        let mut factory = ProxyFactory::<i32, i32>::new(Weak::new());
        let first = factory.build(&HandlerTable::<i32, i32>::new().with("a", Ok).with("b", Ok));
        let second = factory.build(
            &HandlerTable::<i32, i32>::new()
                .with("b", |x| Ok(x + 1))
                .with("a", Ok),
        );
        assert!(Rc::ptr_eq(&first, &second));

        let third = factory.build(&HandlerTable::<i32, i32>::new().with("a", Ok));
        assert!(!Rc::ptr_eq(&first, &third));
        assert_eq!(third.names().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn orphaned_method_rejects_as_disposed() {
        let mut factory = ProxyFactory::<i32, i32>::new(Weak::new());
        let table = factory.build(&HandlerTable::<i32, i32>::new().with("double", |x| Ok(x * 2)));
        let mut future = table.call("double", 5).unwrap();
        assert!(matches!(future.try_take(), Some(Err(CallError::Disposed))));
        assert!(table.call("missing", 1).is_none());
    }
}
