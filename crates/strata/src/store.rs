//! The composite store engine.
//!
//! [`CompositeStore`] maps composites onto rows of one logical backend table
//! and back. It holds no backend state: every operation runs inside a
//! transaction the caller opened, and the caller commits or rolls back.
//!
//! # Row layout
//!
//! For a composite with identity key `P` (see [`Schema::identifier_key`]):
//!
//! | Row                 | Key                     | Value                    |
//! |---------------------|-------------------------|--------------------------|
//! | witness             | `P` + witness tag       | encoded `true`           |
//! | root                | `P`                     | encoded [`Schema::Root`] |
//! | singleton `tag`     | `P` + `tag`             | encoded member value     |
//! | collection item     | `P` + `tag` + `item-id` | encoded item             |
//!
//! All rows of a composite sort together, so one range scan over the range of
//! `P` reads the whole composite, and a scan over the range of the base name
//! reads every composite of a schema in identity order.

use std::ops::Bound;

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::{Codec, Filtering, JsonMarshaling, Key, Marshaling, NoFiltering, Tag};
use strata_storage::{Cursor, Transaction};
use tracing::{debug, trace, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::{
    collection_entries, collection_key, collections_entries, root_entry, singleton_key,
    singletons_entries, validate, witness_entry, Collection, MemberVisitor, RootPolicy, Schema, Singleton,
};
use crate::types::{Composite, Entry, Item, MemberError, Range};

/// The identity type of a schema.
pub type IdOf<S> = <S as Schema>::Id;

/// Maps composites onto an ordered key-value backend.
///
/// The store is generic over its value pipeline: `M` marshals values to bytes
/// and `F` filters the bytes before they reach the backend.
///
/// # Example
///
/// ```ignore
/// use strata::{CompositeStore, StorageEngine, Transaction};
/// use strata::backends::RedbEngine;
///
/// let engine = RedbEngine::in_memory()?;
/// let store = CompositeStore::new();
///
/// let mut tx = engine.begin_write()?;
/// store.put_composite::<PersonSchema>(&mut tx, &person)?;
/// tx.commit()?;
///
/// let tx = engine.begin_read()?;
/// let read = store.get_composite::<PersonSchema>(&tx, &person.id)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct CompositeStore<M = JsonMarshaling, F = NoFiltering> {
    config: StoreConfig,
    codec: Codec<M, F>,
}

impl CompositeStore {
    /// Create a store with JSON marshaling, no filtering and the default
    /// configuration.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: Marshaling, F: Filtering> CompositeStore<M, F> {
    /// Create a store from a configuration and a codec.
    pub const fn with_codec(config: StoreConfig, codec: Codec<M, F>) -> Self {
        Self { config, codec }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the marshaling stage.
    pub fn with_marshaling<M2: Marshaling>(self, marshaling: M2) -> CompositeStore<M2, F> {
        CompositeStore { config: self.config, codec: self.codec.with_marshaling(marshaling) }
    }

    /// Replace the filtering stage.
    pub fn with_filtering<F2: Filtering>(self, filtering: F2) -> CompositeStore<M, F2> {
        CompositeStore { config: self.config, codec: self.codec.with_filtering(filtering) }
    }

    /// The store configuration.
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The value pipeline.
    pub const fn codec(&self) -> &Codec<M, F> {
        &self.codec
    }

    // ------------------------------------------------------------------
    // Composites
    // ------------------------------------------------------------------

    /// Write a composite.
    ///
    /// Writes the witness row if it is missing, then one row per set
    /// singleton and per collection item; unset singletons and items without
    /// a value have their rows deleted. The root row is written when no
    /// member row was written or the schema always keeps its root, and a
    /// stale root row is deleted otherwise.
    ///
    /// Collection items absent from a container are left untouched. Use
    /// [`CompositeStore::del_composite`] first to replace a composite
    /// wholesale.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema declares a tag twice, a key is invalid,
    /// a value cannot be encoded, or the backend fails.
    pub fn put_composite<S: Schema>(
        &self,
        tx: &mut impl Transaction,
        value: &S::Value,
    ) -> StoreResult<()> {
        validate::<S>(self.config.separator)?;
        let id = S::identifier(value);
        let key = S::identifier_key(&id);
        self.ensure_witness::<S>(tx, &id)?;

        let singletons = singletons_entries::<S, M, F>(&self.codec, value)?;
        let collections = collections_entries::<S, M, F>(&self.codec, value)?;

        let mut has_members = false;
        for entry in singletons.iter().chain(&collections) {
            has_members |= entry.is_present();
            self.write_entry(tx, entry)?;
        }

        let root = root_entry::<S, M, F>(&self.codec, value)?;
        if !has_members || S::ROOT_POLICY == RootPolicy::AlwaysKeepRoot {
            self.write_entry(tx, &root)?;
        } else {
            self.delete_row(tx, &root.key)?;
        }

        debug!(
            schema = S::NAME,
            key = %key,
            rows = singletons.len() + collections.len() + 1,
            "put composite"
        );
        Ok(())
    }

    /// Read a composite.
    ///
    /// Returns `Ok(None)` when the witness row is missing. Otherwise every row
    /// under the identity is decoded into a fresh value; rows that fail to
    /// decode are skipped and reported in [`Composite::member_errors`], and
    /// rows with unknown tags are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema declares a tag twice, a key is invalid,
    /// or the backend fails.
    pub fn get_composite<S: Schema>(
        &self,
        tx: &impl Transaction,
        id: &S::Id,
    ) -> StoreResult<Option<Composite<S::Value>>> {
        validate::<S>(self.config.separator)?;
        if !self.has_composite::<S>(tx, id)? {
            return Ok(None);
        }

        let key = S::identifier_key(id);
        let mut value = S::create();
        S::set_identifier(&mut value, id.clone());
        let mut member_errors = Vec::new();

        let (first, last) = key.range(self.config.separator)?;
        self.scan(tx, &first, &last, &key, |row, bytes| {
            if let Some(err) = self.inject::<S>(&key, &mut value, &row, bytes)? {
                member_errors.push(err);
            }
            Ok(())
        })?;

        Ok(Some(Composite::new(value, member_errors)))
    }

    /// Whether a composite exists, judged by its witness row alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend fails.
    pub fn has_composite<S: Schema>(&self, tx: &impl Transaction, id: &S::Id) -> StoreResult<bool> {
        let witness = S::witness_key(&S::identifier_key(id));
        Ok(self.read_row(tx, &witness)?.is_some())
    }

    /// Delete every row of a composite, witness included.
    ///
    /// Deleting a missing composite is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend fails.
    pub fn del_composite<S: Schema>(
        &self,
        tx: &mut impl Transaction,
        id: &S::Id,
    ) -> StoreResult<()> {
        let key = S::identifier_key(id);
        let (first, last) = key.range(self.config.separator)?;

        let mut rows = Vec::new();
        self.scan_raw(&*tx, &first, &last, &key, |raw, _| {
            rows.push(raw);
            Ok(())
        })?;
        for raw in &rows {
            self.delete_raw(tx, raw, &key)?;
        }

        debug!(schema = S::NAME, key = %key, rows = rows.len(), "deleted composite");
        Ok(())
    }

    /// Read every composite of a schema in identity order.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored key cannot be parsed or does not belong
    /// to the schema, or the backend fails.
    pub fn get_composite_all<S: Schema>(
        &self,
        tx: &impl Transaction,
    ) -> StoreResult<Vec<Composite<S::Value>>> {
        let base = Key::new(S::KEY_BASE_NAME);
        let (first, last) = base.range(self.config.separator)?;
        self.read_composites::<S>(tx, &first, &last, &base)
    }

    /// Read the composites whose identity lies in `range`, in identity order.
    ///
    /// A range whose first identity sorts after its last yields nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound is not a valid key, a stored key does not
    /// belong to the schema, or the backend fails.
    pub fn get_composite_range<S: Schema>(
        &self,
        tx: &impl Transaction,
        range: &Range<S::Id>,
    ) -> StoreResult<Vec<Composite<S::Value>>> {
        let (first, last) = self.identifier_range::<S>(range)?;
        self.read_composites::<S>(tx, &first, &last, &S::identifier_key(&range.first))
    }

    /// Delete every row of the composites whose identity lies in `range`.
    ///
    /// Returns the identities whose witness row was deleted, in identity
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound is not a valid key, a stored key cannot be
    /// parsed, or the backend fails.
    pub fn del_composite_range<S: Schema>(
        &self,
        tx: &mut impl Transaction,
        range: &Range<S::Id>,
    ) -> StoreResult<Vec<S::Id>> {
        let (first, last) = self.identifier_range::<S>(range)?;
        let context = S::identifier_key(&range.first);

        let mut rows = Vec::new();
        let mut deleted = Vec::new();
        self.scan_raw(&*tx, &first, &last, &context, |raw, _| {
            let key = Key::from_bytes(&raw, self.config.separator)?;
            if S::is_witness_key(&key) {
                deleted.push(S::key_identifier(&key)?);
            }
            rows.push(raw);
            Ok(())
        })?;
        for raw in &rows {
            self.delete_raw(tx, raw, &context)?;
        }

        debug!(
            schema = S::NAME,
            from = %context,
            rows = rows.len(),
            composites = deleted.len(),
            "deleted composite range"
        );
        Ok(deleted)
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// Write one singleton member of a composite, creating the witness if
    /// needed. `None` deletes the member row.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid, the value cannot be encoded, or
    /// the backend fails.
    pub fn put_composite_singleton<Sg: Singleton>(
        &self,
        tx: &mut impl Transaction,
        id: &IdOf<Sg::Schema>,
        value: Option<&Sg::Value>,
    ) -> StoreResult<()> {
        validate::<Sg::Schema>(self.config.separator)?;
        self.ensure_witness::<Sg::Schema>(tx, id)?;
        let key = singleton_key::<Sg>(&<Sg::Schema as Schema>::identifier_key(id))?;
        let entry = match value {
            Some(value) => Entry::present(key, self.codec.encode(value)?),
            None => Entry::absent(key),
        };
        self.write_entry(tx, &entry)
    }

    /// Read one singleton member of a composite.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid, the stored value cannot be
    /// decoded, or the backend fails.
    pub fn get_composite_singleton<Sg: Singleton>(
        &self,
        tx: &impl Transaction,
        id: &IdOf<Sg::Schema>,
    ) -> StoreResult<Option<Sg::Value>> {
        let key = singleton_key::<Sg>(&<Sg::Schema as Schema>::identifier_key(id))?;
        match self.read_row(tx, &key)? {
            Some(bytes) => Ok(Some(self.codec.decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Write the items of one collection member of a composite, creating the
    /// witness if needed.
    ///
    /// Items without a value are deleted; items absent from the container are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is invalid, an item cannot be encoded, or the
    /// backend fails.
    pub fn put_composite_collection<C: Collection>(
        &self,
        tx: &mut impl Transaction,
        id: &IdOf<C::Schema>,
        container: &C::Container,
    ) -> StoreResult<()> {
        validate::<C::Schema>(self.config.separator)?;
        self.ensure_witness::<C::Schema>(tx, id)?;
        let identity = <C::Schema as Schema>::identifier_key(id);
        for entry in collection_entries::<C, M, F>(&self.codec, &identity, container)? {
            self.write_entry(tx, &entry)?;
        }
        Ok(())
    }

    /// Read one collection member of a composite into a fresh container, in
    /// item identifier order.
    ///
    /// Unlike [`CompositeStore::get_composite`], an item that fails to decode
    /// fails the whole read.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is invalid, an item cannot be decoded, or the
    /// backend fails.
    pub fn get_composite_collection<C: Collection>(
        &self,
        tx: &impl Transaction,
        id: &IdOf<C::Schema>,
    ) -> StoreResult<C::Container> {
        let prefix = collection_key::<C>(&<C::Schema as Schema>::identifier_key(id))?;
        let (first, last) = prefix.range(self.config.separator)?;

        let mut container = C::create();
        self.scan(tx, &first, &last, &prefix, |row, bytes| {
            if let Some(item) = row.tag().and_then(Tag::value) {
                let value = self.codec.decode(bytes)?;
                C::collect(&mut container, Item::new(item, value));
            }
            Ok(())
        })?;
        Ok(container)
    }

    // ------------------------------------------------------------------
    // Raw values
    // ------------------------------------------------------------------

    /// Write a value under an arbitrary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid, the value cannot be encoded, or
    /// the backend fails.
    pub fn put_value<V: Serialize + ?Sized>(
        &self,
        tx: &mut impl Transaction,
        key: &Key,
        value: &V,
    ) -> StoreResult<()> {
        let bytes = self.codec.encode(value)?;
        self.write_row(tx, key, &bytes)
    }

    /// Read a value stored under an arbitrary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid, the stored bytes cannot be
    /// decoded, or the backend fails.
    pub fn get_value<V: DeserializeOwned>(
        &self,
        tx: &impl Transaction,
        key: &Key,
    ) -> StoreResult<Option<V>> {
        match self.read_row(tx, key)? {
            Some(bytes) => Ok(Some(self.codec.decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether a row exists under an arbitrary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend fails.
    pub fn has_value(&self, tx: &impl Transaction, key: &Key) -> StoreResult<bool> {
        Ok(self.read_row(tx, key)?.is_some())
    }

    /// Delete the row under an arbitrary key. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend fails.
    pub fn del_value(&self, tx: &mut impl Transaction, key: &Key) -> StoreResult<bool> {
        self.delete_row(tx, key)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_witness<S: Schema>(&self, tx: &mut impl Transaction, id: &S::Id) -> StoreResult<()> {
        let witness = S::witness_key(&S::identifier_key(id));
        if self.read_row(&*tx, &witness)?.is_none() {
            let entry = witness_entry::<S, M, F>(&self.codec, id)?;
            self.write_entry(tx, &entry)?;
        }
        Ok(())
    }

    fn identifier_range<S: Schema>(&self, range: &Range<S::Id>) -> StoreResult<(Vec<u8>, Vec<u8>)> {
        let (first, _) = S::identifier_key(&range.first).range(self.config.separator)?;
        let (_, last) = S::identifier_key(&range.last).range(self.config.separator)?;
        Ok((first, last))
    }

    /// Decode a scanned range into composites, one per run of rows sharing
    /// an identity.
    fn read_composites<S: Schema>(
        &self,
        tx: &impl Transaction,
        first: &[u8],
        last: &[u8],
        context: &Key,
    ) -> StoreResult<Vec<Composite<S::Value>>> {
        validate::<S>(self.config.separator)?;
        let mut composites: Vec<Composite<S::Value>> = Vec::new();
        let mut current: Option<Key> = None;

        self.scan(tx, first, last, context, |row, bytes| {
            let identity = row.base_key();
            if current.as_ref() != Some(&identity) {
                let mut value = S::create();
                S::set_identifier(&mut value, S::key_identifier(&identity)?);
                composites.push(Composite::new(value, Vec::new()));
                current = Some(identity);
            }

            if let (Some(identity), Some(composite)) = (&current, composites.last_mut()) {
                if let Some(err) = self.inject::<S>(identity, &mut composite.value, &row, bytes)? {
                    composite.member_errors.push(err);
                }
            }
            Ok(())
        })?;

        debug!(schema = S::NAME, from = %context, composites = composites.len(), "read composites");
        Ok(composites)
    }

    /// Route one row of a composite into its value.
    fn inject<S: Schema>(
        &self,
        identity: &Key,
        value: &mut S::Value,
        row: &Key,
        bytes: Vec<u8>,
    ) -> StoreResult<Option<MemberError>> {
        let outcome = if row == identity {
            self.codec
                .decode::<S::Root>(bytes)
                .map(|root| S::set_root(value, root))
                .map_err(|e| MemberError::root(e.to_string()))
        } else {
            let tag = match row.tag() {
                Some(tag) if row.identifiers() == identity.identifiers() => tag,
                _ => {
                    trace!(schema = S::NAME, key = %row, "ignoring row outside the composite");
                    return Ok(None);
                }
            };
            if tag.is_witness() {
                return Ok(None);
            }

            let mut injector = Injector::<S, M, F> {
                codec: &self.codec,
                composite: value,
                tag,
                bytes: Some(bytes),
                outcome: None,
            };
            S::members(&mut injector)?;
            match injector.outcome {
                Some(outcome) => outcome,
                None => {
                    trace!(schema = S::NAME, key = %row, "ignoring row with unknown tag");
                    return Ok(None);
                }
            }
        };

        Ok(outcome.err().map(|err| {
            warn!(
                schema = S::NAME,
                key = %row,
                kind = %err.kind,
                error = %err.message,
                "failed to decode composite member"
            );
            err
        }))
    }

    fn write_entry(&self, tx: &mut impl Transaction, entry: &Entry) -> StoreResult<()> {
        match &entry.value {
            Some(bytes) => self.write_row(tx, &entry.key, bytes),
            None => self.delete_row(tx, &entry.key).map(|_| ()),
        }
    }

    fn write_row(&self, tx: &mut impl Transaction, key: &Key, bytes: &[u8]) -> StoreResult<()> {
        let raw = key.to_bytes(self.config.separator)?;
        tx.put(&self.config.table, &raw, bytes).map_err(|e| StoreError::backend("put", key, e))?;
        trace!(table = %self.config.table, key = %key, bytes = bytes.len(), "put row");
        Ok(())
    }

    fn read_row(&self, tx: &impl Transaction, key: &Key) -> StoreResult<Option<Vec<u8>>> {
        let raw = key.to_bytes(self.config.separator)?;
        tx.get(&self.config.table, &raw).map_err(|e| StoreError::backend("get", key, e))
    }

    fn delete_row(&self, tx: &mut impl Transaction, key: &Key) -> StoreResult<bool> {
        let raw = key.to_bytes(self.config.separator)?;
        self.delete_raw(tx, &raw, key)
    }

    fn delete_raw(
        &self,
        tx: &mut impl Transaction,
        raw: &[u8],
        context: &Key,
    ) -> StoreResult<bool> {
        let existed = tx
            .delete(&self.config.table, raw)
            .map_err(|e| StoreError::backend("delete", context, e))?;
        if existed {
            trace!(table = %self.config.table, key = %String::from_utf8_lossy(raw), "deleted row");
        }
        Ok(existed)
    }

    /// Visit every row in `[first, last)` with its parsed key.
    fn scan<V>(
        &self,
        tx: &impl Transaction,
        first: &[u8],
        last: &[u8],
        context: &Key,
        mut visit: V,
    ) -> StoreResult<usize>
    where
        V: FnMut(Key, Vec<u8>) -> StoreResult<()>,
    {
        let separator = self.config.separator;
        self.scan_raw(tx, first, last, context, |raw, bytes| {
            visit(Key::from_bytes(&raw, separator)?, bytes)
        })
    }

    /// Visit every row in `[first, last)`. The cursor is released before
    /// this returns, so callers may write to `tx` afterwards.
    fn scan_raw<V>(
        &self,
        tx: &impl Transaction,
        first: &[u8],
        last: &[u8],
        context: &Key,
        mut visit: V,
    ) -> StoreResult<usize>
    where
        V: FnMut(Vec<u8>, Vec<u8>) -> StoreResult<()>,
    {
        if first >= last {
            return Ok(0);
        }

        let mut cursor = tx
            .range(&self.config.table, Bound::Included(first), Bound::Excluded(last))
            .map_err(|e| StoreError::backend("scan", context, e))?;

        let mut rows = 0;
        while let Some((raw, bytes)) =
            cursor.next().map_err(|e| StoreError::backend("scan", context, e))?
        {
            visit(raw, bytes)?;
            rows += 1;
        }

        trace!(table = %self.config.table, from = %context, rows, "scanned rows");
        Ok(rows)
    }
}

/// Decodes one tagged row into the member that declared its tag.
struct Injector<'a, S: Schema, M, F> {
    codec: &'a Codec<M, F>,
    composite: &'a mut S::Value,
    tag: &'a Tag,
    bytes: Option<Vec<u8>>,
    outcome: Option<Result<(), MemberError>>,
}

impl<S: Schema, M: Marshaling, F: Filtering> MemberVisitor<S> for Injector<'_, S, M, F> {
    fn visit_singleton<T: Singleton<Schema = S>>(&mut self) -> StoreResult<()> {
        if self.tag.name() != T::TAG || self.tag.value().is_some() {
            return Ok(());
        }
        let Some(bytes) = self.bytes.take() else {
            return Ok(());
        };

        self.outcome = Some(match self.codec.decode::<T::Value>(bytes) {
            Ok(member) => {
                T::set(self.composite, member);
                Ok(())
            }
            Err(e) => Err(MemberError::singleton(T::TAG, e.to_string())),
        });
        Ok(())
    }

    fn visit_collection<T: Collection<Schema = S>>(&mut self) -> StoreResult<()> {
        let tag = self.tag;
        let Some(item_id) = tag.value() else {
            return Ok(());
        };
        if tag.name() != T::TAG {
            return Ok(());
        }
        let Some(bytes) = self.bytes.take() else {
            return Ok(());
        };

        self.outcome = Some(match self.codec.decode::<T::Item>(bytes) {
            Ok(item) => {
                if T::get_mut(self.composite).is_none() {
                    T::set(self.composite, T::create());
                }
                if let Some(container) = T::get_mut(self.composite) {
                    T::collect(container, Item::new(item_id, item));
                }
                Ok(())
            }
            Err(e) => Err(MemberError::collection(T::TAG, item_id, e.to_string())),
        });
        Ok(())
    }
}
