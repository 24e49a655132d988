//! Where clause decision caching.

use std::sync::Arc;

use tessera_cache::identity::IdentityCache;
use tessera_cache::stats::CacheStats;
use tessera_common::error::TesseraResult;

use super::WhereClause;
use crate::table::{ValueSet, ValueTable};

/// Remembers the decisions of an expensive Where clause per row.
///
/// Decisions are keyed by the identity of the row handle, not by its
/// content, and are retained only while the row handle is alive. Failed
/// evaluations are not remembered. Wrapping a clause never changes which
/// rows it accepts.
#[derive(Debug)]
pub struct CachingWhereClause {
    inner: Arc<dyn WhereClause>,
    decisions: IdentityCache<dyn ValueSet, bool>,
}

impl CachingWhereClause {
    /// Wraps a clause, retaining up to `capacity` live decisions.
    pub fn new(inner: Arc<dyn WhereClause>, capacity: usize) -> Self {
        Self {
            inner,
            decisions: IdentityCache::new(capacity),
        }
    }

    /// Returns the wrapped clause.
    pub fn inner(&self) -> &Arc<dyn WhereClause> {
        &self.inner
    }

    /// Returns hit and miss counts.
    pub fn stats(&self) -> &CacheStats {
        self.decisions.stats()
    }
}

impl WhereClause for CachingWhereClause {
    fn accepts(
        &self,
        table: &dyn ValueTable,
        value_set: &Arc<dyn ValueSet>,
    ) -> TesseraResult<bool> {
        self.decisions
            .get_or_try_insert_with(value_set, || self.inner.accepts(table, value_set))
    }

    fn accepts_in_view(
        &self,
        view: &dyn ValueTable,
        table: &dyn ValueTable,
        value_set: &Arc<dyn ValueSet>,
    ) -> TesseraResult<bool> {
        self.decisions.get_or_try_insert_with(value_set, || {
            self.inner.accepts_in_view(view, table, value_set)
        })
    }
}
