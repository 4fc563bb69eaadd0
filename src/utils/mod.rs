use foldhash::fast::RandomState;
use std::collections::HashMap;

pub(crate) mod paired_reads;

/// A [`HashMap`] keyed by sample or read identifiers, using foldhash.
pub(crate) type IdMap<V> = HashMap<String, V, RandomState>;

/// Creates an empty [`IdMap`].
#[inline]
pub(crate) fn new_id_map<V>() -> IdMap<V> {
    HashMap::with_hasher(RandomState::default())
}
