// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use jiff::Timestamp;
use uuid::Uuid;

/// A calendar item as mirrored by the cache.
///
/// The payload is opaque to the engine; only identity, range and the modification
/// timestamp take part in synchronization decisions.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Item {
    /// Stable identifier, shared between the cache and the remote store.
    pub id: String,

    /// Recurrence identifier for an overridden occurrence of a recurring item.
    #[serde(default)]
    pub recurrence_id: Option<String>,

    /// Identifier of the owning calendar.
    pub calendar_id: String,

    /// Human readable title, used for diagnostics.
    #[serde(default)]
    pub title: String,

    /// Start of the item, if any.
    #[serde(default)]
    pub start: Option<Timestamp>,

    /// End of the item, if any.
    #[serde(default)]
    pub end: Option<Timestamp>,

    /// Last modification time as recorded by whichever store wrote the item.
    pub last_modified: Timestamp,

    /// Serialized item body (usually iCalendar text).
    #[serde(default)]
    pub data: String,
}

impl Item {
    /// Creates an item with a freshly generated id.
    pub fn new(calendar_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), calendar_id, title)
    }

    /// Creates an item with the given id, stamped with the current time.
    pub fn with_id(
        id: impl Into<String>,
        calendar_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            recurrence_id: None,
            calendar_id: calendar_id.into(),
            title: title.into(),
            start: None,
            end: None,
            last_modified: Timestamp::now(),
            data: String::new(),
        }
    }

    /// Secondary identity combining the id with the recurrence id.
    pub fn hash_id(&self) -> String {
        match &self.recurrence_id {
            Some(rid) => format!("{}#{}", self.id, rid),
            None => self.id.clone(),
        }
    }

    /// Sets the time span of the item.
    pub fn span(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Sets the last modification time.
    pub fn modified_at(mut self, last_modified: Timestamp) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Sets the serialized body.
    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    /// Returns a copy with a new title and a bumped modification time.
    pub fn retitled(&self, title: impl Into<String>) -> Self {
        let mut item = self.clone();
        item.title = title.into();
        item.last_modified = Timestamp::now().max(self.last_modified);
        item
    }

    /// Whether the item's `[start, end)` overlaps the given range. Items without a start
    /// always match; a zero-length item matches when its instant lies in the range.
    pub fn in_range(&self, range: &DateRange) -> bool {
        let Some(start) = self.start else {
            return true;
        };
        let end = self.end.unwrap_or(start).max(start);

        if let Some(range_end) = range.end
            && start >= range_end
        {
            return false;
        }
        if let Some(range_start) = range.start {
            let ended = if end > start {
                end <= range_start
            } else {
                end < range_start
            };
            if ended {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "{} (none)", self.id)
        } else {
            write!(f, "{} ({})", self.id, self.title)
        }
    }
}

/// Per-item marker of a pending, unconfirmed local mutation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfflineFlag {
    /// The item is in sync with the remote store.
    #[default]
    None,

    /// The item was created locally and the remote store has never seen it.
    Created,

    /// The item was modified locally.
    Modified,

    /// The item was deleted locally; the cached copy is kept for reconciliation.
    Deleted,
}

impl OfflineFlag {
    /// Whether the item still has to be confirmed against the remote store.
    pub fn is_pending(self) -> bool {
        self != OfflineFlag::None
    }

    /// Name of the remote operation replaying this flag.
    pub fn operation(self) -> &'static str {
        match self {
            OfflineFlag::None => "none",
            OfflineFlag::Created => "add",
            OfflineFlag::Modified => "modify",
            OfflineFlag::Deleted => "delete",
        }
    }
}

impl From<OfflineFlag> for u8 {
    fn from(flag: OfflineFlag) -> Self {
        match flag {
            OfflineFlag::None => 0,
            OfflineFlag::Created => 1,
            OfflineFlag::Modified => 2,
            OfflineFlag::Deleted => 3,
        }
    }
}

impl From<u8> for OfflineFlag {
    fn from(value: u8) -> Self {
        match value {
            1 => OfflineFlag::Created,
            2 => OfflineFlag::Modified,
            3 => OfflineFlag::Deleted,
            _ => OfflineFlag::None,
        }
    }
}

impl fmt::Display for OfflineFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OfflineFlag::None => "none",
            OfflineFlag::Created => "created",
            OfflineFlag::Modified => "modified",
            OfflineFlag::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Which items a `get_items` query returns.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ItemFilter {
    /// Every item that is not pending deletion.
    #[default]
    All,

    /// Items flagged [`OfflineFlag::Created`].
    OfflineCreated,

    /// Items flagged [`OfflineFlag::Modified`].
    OfflineModified,

    /// Items flagged [`OfflineFlag::Deleted`].
    OfflineDeleted,
}

impl ItemFilter {
    /// The filter selecting items with the given pending flag.
    pub fn offline(flag: OfflineFlag) -> Self {
        match flag {
            OfflineFlag::None => ItemFilter::All,
            OfflineFlag::Created => ItemFilter::OfflineCreated,
            OfflineFlag::Modified => ItemFilter::OfflineModified,
            OfflineFlag::Deleted => ItemFilter::OfflineDeleted,
        }
    }

    /// Whether an item carrying `flag` passes this filter.
    pub fn matches(self, flag: OfflineFlag) -> bool {
        match self {
            ItemFilter::All => flag != OfflineFlag::Deleted,
            ItemFilter::OfflineCreated => flag == OfflineFlag::Created,
            ItemFilter::OfflineModified => flag == OfflineFlag::Modified,
            ItemFilter::OfflineDeleted => flag == OfflineFlag::Deleted,
        }
    }
}

/// Half-open time range, unbounded on either side when `None`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// Inclusive lower bound.
    pub start: Option<Timestamp>,

    /// Exclusive upper bound.
    pub end: Option<Timestamp>,
}

impl DateRange {
    /// The unbounded range.
    pub fn all() -> Self {
        Self::default()
    }

    /// A bounded range.
    pub fn between(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}
