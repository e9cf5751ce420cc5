//! Saved-item data model.
//!
//! A [`SavedItemEntry`] is one bookmarked catalog item, carrying the full
//! denormalized payload so the UI can render it without a network round-trip.
//! Entries live in a [`Collection`], an insertion-ordered map keyed by
//! [`ItemId`] with the most recently saved entry at the front.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a catalog item, unique within one identity's collection.
///
/// Catalog ids arrive either as integers or strings depending on the source
/// API, so the id is normalized to its string form.
///
/// # Example
///
/// ```
/// use cookbook_sync::ItemId;
///
/// let a = ItemId::from(42);
/// let b = ItemId::from("42");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Create an id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Extract the id from an item payload's `id` field.
    ///
    /// Accepts both JSON numbers and strings. Returns `None` when the field
    /// is missing or has a non-id shape.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        match payload.get("id")? {
            Value::Number(n) => n.as_i64().map(Self::from),
            Value::String(s) if !s.is_empty() => Some(Self::new(s.clone())),
            _ => None,
        }
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&ItemId> for ItemId {
    fn from(id: &ItemId) -> Self {
        id.clone()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One saved item belonging to the current identity.
///
/// Field names serialize in camelCase to match the cache snapshot and remote
/// document format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedItemEntry {
    /// Catalog item this entry refers to
    pub item_id: ItemId,
    /// Full denormalized item data, opaque to the engine
    pub payload: Value,
    /// When the item was saved (epoch millis); drives default ordering
    pub saved_at: i64,
    /// User-toggleable favorite flag
    #[serde(default)]
    pub is_favorite: bool,
    /// User-toggleable cooked flag
    #[serde(default)]
    pub is_cooked: bool,
    /// Set when `is_cooked` transitions to true, cleared on the way back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooked_at: Option<i64>,
    /// Free-text annotation. Kept after un-cooking; the text is historical.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SavedItemEntry {
    /// Create a freshly saved entry with all flags off.
    pub fn new(item_id: ItemId, payload: Value, saved_at: i64) -> Self {
        Self {
            item_id,
            payload,
            saved_at,
            is_favorite: false,
            is_cooked: false,
            cooked_at: None,
            notes: None,
        }
    }

    /// Create an entry with initial flags from save options.
    ///
    /// When saved as already cooked, `cooked_at` is the save timestamp.
    pub fn with_options(item_id: ItemId, payload: Value, saved_at: i64, opts: &SaveOptions) -> Self {
        Self {
            item_id,
            payload,
            saved_at,
            is_favorite: opts.favorite,
            is_cooked: opts.cooked,
            cooked_at: opts.cooked.then_some(saved_at),
            notes: opts.notes.clone(),
        }
    }
}

/// Initial flags for a save operation.
///
/// # Example
///
/// ```
/// use cookbook_sync::SaveOptions;
///
/// let opts = SaveOptions::default().favorite().cooked_with_notes("weeknight staple");
/// assert!(opts.favorite);
/// assert!(opts.cooked);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Save as favorite
    pub favorite: bool,
    /// Save as already cooked
    pub cooked: bool,
    /// Notes attached at save time
    pub notes: Option<String>,
}

impl SaveOptions {
    /// Mark the saved item as a favorite.
    #[must_use]
    pub fn favorite(mut self) -> Self {
        self.favorite = true;
        self
    }

    /// Mark the saved item as already cooked.
    #[must_use]
    pub fn cooked(mut self) -> Self {
        self.cooked = true;
        self
    }

    /// Mark as cooked and attach notes in one go.
    #[must_use]
    pub fn cooked_with_notes(mut self, notes: impl Into<String>) -> Self {
        self.cooked = true;
        self.notes = Some(notes.into());
        self
    }
}

/// Insertion-ordered collection of saved items, newest first.
///
/// At most one entry exists per [`ItemId`]. Saving keeps the newest entry at
/// the front, so iteration order is `saved_at` descending. Snapshots coming
/// from sources without a defined order are normalized into that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    entries: IndexMap<ItemId, SavedItemEntry>,
}

impl Collection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from entries in arbitrary order.
    ///
    /// Entries are sorted `saved_at` descending; on a duplicate id the last
    /// occurrence wins.
    #[must_use]
    pub fn from_entries(mut entries: Vec<SavedItemEntry>) -> Self {
        entries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        let mut map = IndexMap::with_capacity(entries.len());
        for entry in entries {
            map.insert(entry.item_id.clone(), entry);
        }
        Self { entries: map }
    }

    /// Re-sort into canonical `saved_at`-descending order.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self::from_entries(self.entries.into_values().collect())
    }

    /// Number of saved items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when an entry exists for the id.
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.entries.contains_key(id)
    }

    /// Look up an entry by id.
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&SavedItemEntry> {
        self.entries.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &ItemId) -> Option<&mut SavedItemEntry> {
        self.entries.get_mut(id)
    }

    /// Insert an entry at the front, replacing any existing entry for the id.
    ///
    /// Re-saving an item therefore refreshes its recency position.
    pub fn insert_front(&mut self, entry: SavedItemEntry) {
        self.entries.shift_remove(&entry.item_id);
        self.entries.shift_insert(0, entry.item_id.clone(), entry);
    }

    /// Remove an entry, preserving the order of the rest.
    pub fn remove(&mut self, id: &ItemId) -> Option<SavedItemEntry> {
        self.entries.shift_remove(id)
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate entries in order, newest saved first.
    pub fn entries(&self) -> impl Iterator<Item = &SavedItemEntry> {
        self.entries.values()
    }

    /// Iterate the ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.entries.keys()
    }

    /// Consume the collection, yielding its entries in order.
    #[must_use]
    pub fn into_entries(self) -> Vec<SavedItemEntry> {
        self.entries.into_values().collect()
    }
}

// Snapshots are stored and shipped as a plain JSON array of entries, in
// collection order. Deserialization normalizes, so unordered sources land in
// saved_at-descending order.
impl Serialize for Collection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.entries.values())
    }
}

impl<'de> Deserialize<'de> for Collection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = Vec::<SavedItemEntry>::deserialize(deserializer)?;
        Ok(Self::from_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: i64, saved_at: i64) -> SavedItemEntry {
        SavedItemEntry::new(ItemId::from(id), json!({"id": id, "title": format!("Item {id}")}), saved_at)
    }

    #[test]
    fn test_item_id_from_payload_number() {
        let id = ItemId::from_payload(&json!({"id": 42, "title": "Soup"}));
        assert_eq!(id, Some(ItemId::from(42)));
    }

    #[test]
    fn test_item_id_from_payload_string() {
        let id = ItemId::from_payload(&json!({"id": "rcp-9", "title": "Stew"}));
        assert_eq!(id, Some(ItemId::from("rcp-9")));
    }

    #[test]
    fn test_item_id_from_payload_rejects_missing_or_malformed() {
        assert!(ItemId::from_payload(&json!({"title": "no id"})).is_none());
        assert!(ItemId::from_payload(&json!({"id": ""})).is_none());
        assert!(ItemId::from_payload(&json!({"id": [1, 2]})).is_none());
        assert!(ItemId::from_payload(&json!({"id": 1.5})).is_none());
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let mut e = entry(7, 1000);
        e.is_cooked = true;
        e.cooked_at = Some(1200);
        e.notes = Some("tasty".into());

        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["itemId"], "7");
        assert_eq!(v["savedAt"], 1000);
        assert_eq!(v["isFavorite"], false);
        assert_eq!(v["isCooked"], true);
        assert_eq!(v["cookedAt"], 1200);
        assert_eq!(v["notes"], "tasty");
    }

    #[test]
    fn test_entry_omits_empty_optionals() {
        let v = serde_json::to_value(entry(7, 1000)).unwrap();
        assert!(v.get("cookedAt").is_none());
        assert!(v.get("notes").is_none());
    }

    #[test]
    fn test_with_options_cooked_stamps_cooked_at() {
        let opts = SaveOptions::default().cooked();
        let e = SavedItemEntry::with_options(ItemId::from(1), json!({"id": 1}), 500, &opts);
        assert!(e.is_cooked);
        assert_eq!(e.cooked_at, Some(500));

        let plain = SavedItemEntry::with_options(ItemId::from(2), json!({"id": 2}), 500, &SaveOptions::default());
        assert!(!plain.is_cooked);
        assert_eq!(plain.cooked_at, None);
    }

    #[test]
    fn test_insert_front_orders_newest_first() {
        let mut c = Collection::new();
        c.insert_front(entry(1, 100));
        c.insert_front(entry(2, 200));
        c.insert_front(entry(3, 300));

        let ids: Vec<_> = c.ids().map(ItemId::as_str).collect();
        assert_eq!(ids, ["3", "2", "1"]);
    }

    #[test]
    fn test_resave_moves_entry_to_front_without_duplicate() {
        let mut c = Collection::new();
        c.insert_front(entry(1, 100));
        c.insert_front(entry(2, 200));
        c.insert_front(entry(1, 300));

        assert_eq!(c.len(), 2);
        let ids: Vec<_> = c.ids().map(ItemId::as_str).collect();
        assert_eq!(ids, ["1", "2"]);
        assert_eq!(c.get(&ItemId::from(1)).unwrap().saved_at, 300);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut c = Collection::new();
        c.insert_front(entry(1, 100));
        c.insert_front(entry(2, 200));
        c.insert_front(entry(3, 300));

        let removed = c.remove(&ItemId::from(2));
        assert!(removed.is_some());
        let ids: Vec<_> = c.ids().map(ItemId::as_str).collect();
        assert_eq!(ids, ["3", "1"]);

        assert!(c.remove(&ItemId::from(99)).is_none());
    }

    #[test]
    fn test_from_entries_sorts_descending() {
        let c = Collection::from_entries(vec![entry(1, 50), entry(2, 300), entry(3, 100)]);
        let ids: Vec<_> = c.ids().map(ItemId::as_str).collect();
        assert_eq!(ids, ["2", "3", "1"]);
    }

    #[test]
    fn test_from_entries_last_duplicate_wins() {
        let mut newer = entry(1, 100);
        newer.is_favorite = true;
        let c = Collection::from_entries(vec![entry(1, 100), newer]);
        assert_eq!(c.len(), 1);
        assert!(c.get(&ItemId::from(1)).unwrap().is_favorite);
    }

    #[test]
    fn test_collection_round_trip_preserves_order() {
        let mut c = Collection::new();
        c.insert_front(entry(1, 100));
        c.insert_front(entry(2, 200));

        let json_str = serde_json::to_string(&c).unwrap();
        let back: Collection = serde_json::from_str(&json_str).unwrap();

        assert_eq!(back, c);
        let ids: Vec<_> = back.ids().map(ItemId::as_str).collect();
        assert_eq!(ids, ["2", "1"]);
    }

    #[test]
    fn test_deserialize_unordered_array_normalizes() {
        let raw = json!([
            {"itemId": "1", "payload": {"id": 1}, "savedAt": 50},
            {"itemId": "2", "payload": {"id": 2}, "savedAt": 900},
            {"itemId": "3", "payload": {"id": 3}, "savedAt": 200}
        ]);
        let c: Collection = serde_json::from_value(raw).unwrap();
        let ids: Vec<_> = c.ids().map(ItemId::as_str).collect();
        assert_eq!(ids, ["2", "3", "1"]);
    }
}
