//! Atom and selector families.
//!
//! A family maps a parameter to a member handle. Each distinct parameter,
//! compared by its serialized [`FamilyParam::family_key`], yields exactly one
//! member, created on first request and cached for the family's lifetime.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::atom::Atom;
use super::selector::Selector;

/// A value that can parameterize a family.
pub trait FamilyParam: Clone + Send + Sync + 'static {
    /// Serialized form used to key family members.
    fn family_key(&self) -> String;
}

impl FamilyParam for String {
    fn family_key(&self) -> String {
        self.clone()
    }
}

/// A family of atoms keyed by parameter.
pub struct AtomFamily<P, T>
where
    P: FamilyParam,
    T: Clone + Send + Sync + 'static,
{
    default: Arc<dyn Fn(&P) -> T + Send + Sync>,
    members: Arc<DashMap<String, Atom<T>>>,
}

impl<P, T> AtomFamily<P, T>
where
    P: FamilyParam,
    T: Clone + Send + Sync + 'static,
{
    /// Create a family whose members start at `default(param)`.
    pub fn new<F>(default: F) -> Self
    where
        F: Fn(&P) -> T + Send + Sync + 'static,
    {
        Self {
            default: Arc::new(default),
            members: Arc::new(DashMap::new()),
        }
    }

    /// Get or create the member for `param`.
    pub fn member(&self, param: &P) -> Atom<T> {
        self.member_entry(param).0
    }

    /// Get or create the member for `param`, reporting whether it was created.
    pub fn member_entry(&self, param: &P) -> (Atom<T>, bool) {
        match self.members.entry(param.family_key()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let atom = Atom::new((self.default)(param));
                (entry.insert(atom).value().clone(), true)
            }
        }
    }

    /// The member for `param`, if it was ever created.
    pub fn existing(&self, param: &P) -> Option<Atom<T>> {
        self.members.get(&param.family_key()).map(|m| m.value().clone())
    }

    /// Whether a member exists for `param`.
    pub fn contains(&self, param: &P) -> bool {
        self.members.contains_key(&param.family_key())
    }

    /// Number of materialized members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no member has been materialized yet.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Snapshot of all materialized members.
    pub fn members(&self) -> Vec<Atom<T>> {
        self.members.iter().map(|m| m.value().clone()).collect()
    }
}

impl<P, T> Clone for AtomFamily<P, T>
where
    P: FamilyParam,
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            default: Arc::clone(&self.default),
            members: Arc::clone(&self.members),
        }
    }
}

/// A family of selectors keyed by parameter.
pub struct SelectorFamily<P, T>
where
    P: FamilyParam,
    T: Clone + Send + Sync + PartialEq + 'static,
{
    compute: Arc<dyn Fn(&P) -> T + Send + Sync>,
    members: Arc<DashMap<String, Selector<T>>>,
}

impl<P, T> SelectorFamily<P, T>
where
    P: FamilyParam,
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a family whose members compute `compute(param)`.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn(&P) -> T + Send + Sync + 'static,
    {
        Self {
            compute: Arc::new(compute),
            members: Arc::new(DashMap::new()),
        }
    }

    /// Get or create the member for `param`.
    pub fn member(&self, param: &P) -> Selector<T> {
        self.members
            .entry(param.family_key())
            .or_insert_with(|| {
                let compute = Arc::clone(&self.compute);
                let param = param.clone();
                Selector::new(move || compute(&param))
            })
            .value()
            .clone()
    }

    /// The member for `param`, if it was ever created.
    pub fn existing(&self, param: &P) -> Option<Selector<T>> {
        self.members.get(&param.family_key()).map(|m| m.value().clone())
    }

    /// Number of materialized members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no member has been materialized yet.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Snapshot of all materialized members.
    pub fn members(&self) -> Vec<Selector<T>> {
        self.members.iter().map(|m| m.value().clone()).collect()
    }
}

impl<P, T> Clone for SelectorFamily<P, T>
where
    P: FamilyParam,
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            compute: Arc::clone(&self.compute),
            members: Arc::clone(&self.members),
        }
    }
}
