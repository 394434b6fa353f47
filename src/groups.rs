//! Queue, category and dustbin groupings of a pool
//!
//! Groupings hold task keys only; tasks themselves live in the
//! [`TaskTable`](crate::task::TaskTable). Membership is kept mutually
//! exclusive by moving a task with [`Groups::move_task`], which pairs one
//! removal with one insertion.
//!
//! Mutating methods push the events they cause onto a caller-supplied
//! buffer, so the pool can deliver them after releasing its state lock.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::events::Event;
use crate::types::{CategoryKey, GroupKey, TaskKey};

/// Display name of the dustbin
pub const DUSTBIN_NAME: &str = "Dustbin";

/// One grouping and its members
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    key: GroupKey,
    name: String,
    directory: Option<PathBuf>,
    parent: Option<GroupKey>,
    members: BTreeSet<TaskKey>,
}

impl Group {
    fn new(key: GroupKey, name: String, directory: Option<PathBuf>) -> Self {
        let parent = match key {
            GroupKey::Queue => None,
            GroupKey::Category(_) | GroupKey::Dustbin => Some(GroupKey::Queue),
        };
        Self {
            key,
            name,
            directory,
            parent,
            members: BTreeSet::new(),
        }
    }

    /// Key of this grouping
    pub fn key(&self) -> GroupKey {
        self.key
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory completed downloads are saved to (categories only)
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Grouping this one is shown under
    pub fn parent(&self) -> Option<GroupKey> {
        self.parent
    }

    /// Member task keys in ascending order
    pub fn members(&self) -> impl Iterator<Item = TaskKey> + '_ {
        self.members.iter().copied()
    }

    /// Whether `task` is a member
    pub fn contains(&self, task: TaskKey) -> bool {
        self.members.contains(&task)
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the grouping has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// All groupings of one pool
#[derive(Clone, Debug)]
pub struct Groups {
    queue: Group,
    dustbin: Group,
    categories: BTreeMap<CategoryKey, Group>,
}

impl Groups {
    /// Queue named after the pool, an empty dustbin and no categories
    pub(crate) fn new(pool_name: &str) -> Self {
        Self {
            queue: Group::new(GroupKey::Queue, pool_name.to_string(), None),
            dustbin: Group::new(GroupKey::Dustbin, DUSTBIN_NAME.to_string(), None),
            categories: BTreeMap::new(),
        }
    }

    /// Register a category; an existing one keeps its members
    pub(crate) fn add_category(
        &mut self,
        key: CategoryKey,
        name: String,
        directory: Option<PathBuf>,
        events: &mut Vec<Event>,
    ) {
        let group = self
            .categories
            .entry(key)
            .or_insert_with(|| Group::new(GroupKey::Category(key), String::new(), None));
        group.name = name;
        group.directory = directory;
        events.push(Event::Changed {
            group: GroupKey::Category(key),
        });
    }

    /// Rename a category; false if it does not exist
    pub(crate) fn rename_category(
        &mut self,
        key: CategoryKey,
        name: String,
        events: &mut Vec<Event>,
    ) -> bool {
        let Some(group) = self.categories.get_mut(&key) else {
            return false;
        };
        if group.name != name {
            group.name = name;
            events.push(Event::Changed {
                group: GroupKey::Category(key),
            });
        }
        true
    }

    /// Whether a category is registered
    pub fn has_category(&self, key: CategoryKey) -> bool {
        self.categories.contains_key(&key)
    }

    /// First registered category, the default for new tasks
    pub fn default_category(&self) -> Option<CategoryKey> {
        self.categories.keys().next().copied()
    }

    /// Look up a grouping
    pub fn get(&self, key: GroupKey) -> Option<&Group> {
        match key {
            GroupKey::Queue => Some(&self.queue),
            GroupKey::Dustbin => Some(&self.dustbin),
            GroupKey::Category(category) => self.categories.get(&category),
        }
    }

    fn get_mut(&mut self, key: GroupKey) -> Option<&mut Group> {
        match key {
            GroupKey::Queue => Some(&mut self.queue),
            GroupKey::Dustbin => Some(&mut self.dustbin),
            GroupKey::Category(category) => self.categories.get_mut(&category),
        }
    }

    /// Queue, then categories in key order, then dustbin
    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        std::iter::once(&self.queue)
            .chain(self.categories.values())
            .chain(std::iter::once(&self.dustbin))
    }

    /// Grouping currently listing `task`
    pub fn locate(&self, task: TaskKey) -> Option<GroupKey> {
        self.iter().find(|g| g.contains(task)).map(Group::key)
    }

    /// Insert `task` into `group`
    ///
    /// Emits `Changed` then `TaskAdded`; returns false (and emits nothing)
    /// when the task was already a member or the grouping does not exist.
    pub(crate) fn add_task(&mut self, group: GroupKey, task: TaskKey, events: &mut Vec<Event>) -> bool {
        let Some(target) = self.get_mut(group) else {
            tracing::warn!(task = %task, group = %group, "grouping does not exist");
            return false;
        };
        if !target.members.insert(task) {
            return false;
        }
        events.push(Event::Changed { group });
        events.push(Event::TaskAdded { group, task });
        true
    }

    /// Remove `task` from `group`
    ///
    /// Emits `Changed` then `TaskRemoved`; returns false (and emits nothing)
    /// when the task was not a member.
    pub(crate) fn remove_task(&mut self, group: GroupKey, task: TaskKey, events: &mut Vec<Event>) -> bool {
        let Some(source) = self.get_mut(group) else {
            return false;
        };
        if !source.members.remove(&task) {
            return false;
        }
        events.push(Event::Changed { group });
        events.push(Event::TaskRemoved { group, task });
        true
    }

    /// Make `to` the only grouping listing `task`
    ///
    /// Returns false when the task was already there.
    pub(crate) fn move_task(&mut self, task: TaskKey, to: GroupKey, events: &mut Vec<Event>) -> bool {
        let current = self.locate(task);
        if current == Some(to) {
            return false;
        }
        if let Some(from) = current {
            self.remove_task(from, task, events);
        }
        self.add_task(to, task, events)
    }

    /// Drop `task` from whichever grouping lists it
    pub(crate) fn forget(&mut self, task: TaskKey, events: &mut Vec<Event>) -> Option<GroupKey> {
        let from = self.locate(task)?;
        self.remove_task(from, task, events);
        Some(from)
    }
}
