//! Redb-backed durable store.
//!
//! Redb gives ACID transactions with MVCC in pure Rust, which is exactly the
//! shape the ordering guarantees need: every owner mutation (sketch row plus
//! its band rows, or a cascade delete) is a single write transaction, so
//! readers observe either the old owner state or the new one, never a mix.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use redb::{
    Database, MultimapTableDefinition, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition,
};

use crate::records::{decode, encode, page_prefix};
use crate::{
    CaseBaseline, OwnerKind, PageRecord, RescanRecord, SketchStore, StoreError, StoreStats,
    TemplateRecord, TemplateSketches,
};

const TEMPLATES: TableDefinition<&str, &[u8]> = TableDefinition::new("templates");
const TEMPLATE_SKETCHES: TableDefinition<&str, &[u8]> = TableDefinition::new("template_sketches");
const PAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("pages");
/// (band_index, band_hash) -> owner ids. The inverted LSH index.
const TEMPLATE_BANDS: MultimapTableDefinition<(u8, u64), &str> =
    MultimapTableDefinition::new("template_band_index");
const PAGE_BANDS: MultimapTableDefinition<(u8, u64), &str> =
    MultimapTableDefinition::new("page_band_index");
/// owner id -> its current band hashes, so replacement removes exactly the
/// rows the owner previously held.
const TEMPLATE_OWNER_BANDS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("template_owner_bands");
const PAGE_OWNER_BANDS: TableDefinition<&str, &[u8]> = TableDefinition::new("page_owner_bands");
const BASELINES: TableDefinition<&str, &[u8]> = TableDefinition::new("case_baselines");
/// (case_id, seq) -> rescan record; seq grows monotonically per case.
const RESCANS: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("rescans");

/// Durable [`SketchStore`] at a single database file.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database and make sure every table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(StoreError::backend)?;
        let txn = db.begin_write().map_err(StoreError::backend)?;
        {
            txn.open_table(TEMPLATES).map_err(StoreError::backend)?;
            txn.open_table(TEMPLATE_SKETCHES)
                .map_err(StoreError::backend)?;
            txn.open_table(PAGES).map_err(StoreError::backend)?;
            txn.open_multimap_table(TEMPLATE_BANDS)
                .map_err(StoreError::backend)?;
            txn.open_multimap_table(PAGE_BANDS)
                .map_err(StoreError::backend)?;
            txn.open_table(TEMPLATE_OWNER_BANDS)
                .map_err(StoreError::backend)?;
            txn.open_table(PAGE_OWNER_BANDS)
                .map_err(StoreError::backend)?;
            txn.open_table(BASELINES).map_err(StoreError::backend)?;
            txn.open_table(RESCANS).map_err(StoreError::backend)?;
        }
        txn.commit().map_err(StoreError::backend)?;
        Ok(Self { db: Arc::new(db) })
    }
}

/// Replace the band rows an owner holds inside an open write transaction.
fn replace_band_rows(
    txn: &redb::WriteTransaction,
    bands_table: MultimapTableDefinition<(u8, u64), &str>,
    owner_table: TableDefinition<&str, &[u8]>,
    owner: &str,
    bands: &[u64],
) -> Result<(), StoreError> {
    let mut rows = txn
        .open_multimap_table(bands_table)
        .map_err(StoreError::backend)?;
    let mut owners = txn.open_table(owner_table).map_err(StoreError::backend)?;

    let previous: Option<Vec<u64>> = match owners.remove(owner).map_err(StoreError::backend)? {
        Some(guard) => Some(decode(guard.value())?),
        None => None,
    };
    if let Some(previous) = previous {
        for (i, hash) in previous.into_iter().enumerate() {
            rows.remove(&(i as u8, hash), owner)
                .map_err(StoreError::backend)?;
        }
    }
    for (i, &hash) in bands.iter().enumerate() {
        rows.insert(&(i as u8, hash), owner)
            .map_err(StoreError::backend)?;
    }
    if !bands.is_empty() {
        owners
            .insert(owner, encode(&bands.to_vec())?.as_slice())
            .map_err(StoreError::backend)?;
    }
    Ok(())
}

impl SketchStore for RedbStore {
    fn put_template(
        &self,
        record: &TemplateRecord,
        sketches: &TemplateSketches,
        bands: &[u64],
    ) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut templates = txn.open_table(TEMPLATES).map_err(StoreError::backend)?;
            templates
                .insert(record.id.as_str(), encode(record)?.as_slice())
                .map_err(StoreError::backend)?;
            let mut table = txn
                .open_table(TEMPLATE_SKETCHES)
                .map_err(StoreError::backend)?;
            table
                .insert(record.id.as_str(), sketches.to_bytes()?.as_slice())
                .map_err(StoreError::backend)?;
            replace_band_rows(&txn, TEMPLATE_BANDS, TEMPLATE_OWNER_BANDS, &record.id, bands)?;
        }
        txn.commit().map_err(StoreError::backend)?;
        Ok(())
    }

    fn put_page(&self, record: &PageRecord, bands: &[u64]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut pages = txn.open_table(PAGES).map_err(StoreError::backend)?;
            pages
                .insert(record.page_id.as_str(), record.to_bytes()?.as_slice())
                .map_err(StoreError::backend)?;
            replace_band_rows(&txn, PAGE_BANDS, PAGE_OWNER_BANDS, &record.page_id, bands)?;
        }
        txn.commit().map_err(StoreError::backend)?;
        Ok(())
    }

    fn get_template(&self, id: &str) -> Result<TemplateRecord, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = txn.open_table(TEMPLATES).map_err(StoreError::backend)?;
        match table.get(id).map_err(StoreError::backend)? {
            Some(guard) => decode(guard.value()),
            None => Err(StoreError::not_found("template", id)),
        }
    }

    fn get_template_sketches(&self, id: &str) -> Result<TemplateSketches, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = txn
            .open_table(TEMPLATE_SKETCHES)
            .map_err(StoreError::backend)?;
        match table.get(id).map_err(StoreError::backend)? {
            Some(guard) => TemplateSketches::from_bytes(guard.value()),
            None => Err(StoreError::not_found("template sketches", id)),
        }
    }

    fn get_page(&self, page_id: &str) -> Result<PageRecord, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = txn.open_table(PAGES).map_err(StoreError::backend)?;
        match table.get(page_id).map_err(StoreError::backend)? {
            Some(guard) => PageRecord::from_bytes(guard.value()),
            None => Err(StoreError::not_found("page", page_id)),
        }
    }

    fn list_pages(&self, template_id: &str) -> Result<Vec<PageRecord>, StoreError> {
        let prefix = page_prefix(template_id);
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = txn.open_table(PAGES).map_err(StoreError::backend)?;
        let mut out = Vec::new();
        for item in table
            .range(prefix.as_str()..)
            .map_err(StoreError::backend)?
        {
            let (key, value) = item.map_err(StoreError::backend)?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            out.push(PageRecord::from_bytes(value.value())?);
        }
        Ok(out)
    }

    fn delete_template(&self, id: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut templates = txn.open_table(TEMPLATES).map_err(StoreError::backend)?;
            templates.remove(id).map_err(StoreError::backend)?;
            let mut sketches = txn
                .open_table(TEMPLATE_SKETCHES)
                .map_err(StoreError::backend)?;
            sketches.remove(id).map_err(StoreError::backend)?;
            replace_band_rows(&txn, TEMPLATE_BANDS, TEMPLATE_OWNER_BANDS, id, &[])?;

            let prefix = page_prefix(id);
            let mut pages = txn.open_table(PAGES).map_err(StoreError::backend)?;
            let page_ids: Vec<String> = {
                let mut ids = Vec::new();
                for item in pages.range(prefix.as_str()..).map_err(StoreError::backend)? {
                    let (key, _) = item.map_err(StoreError::backend)?;
                    if !key.value().starts_with(&prefix) {
                        break;
                    }
                    ids.push(key.value().to_string());
                }
                ids
            };
            for page_id in &page_ids {
                pages.remove(page_id.as_str()).map_err(StoreError::backend)?;
                replace_band_rows(&txn, PAGE_BANDS, PAGE_OWNER_BANDS, page_id, &[])?;
            }
            tracing::debug!(template = id, pages = page_ids.len(), "cascade delete");
        }
        txn.commit().map_err(StoreError::backend)?;
        Ok(())
    }

    fn lookup_candidates(
        &self,
        band_hashes: &[u64],
        kind: OwnerKind,
    ) -> Result<BTreeSet<String>, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = match kind {
            OwnerKind::Template => txn
                .open_multimap_table(TEMPLATE_BANDS)
                .map_err(StoreError::backend)?,
            OwnerKind::Page => txn
                .open_multimap_table(PAGE_BANDS)
                .map_err(StoreError::backend)?,
        };
        let mut out = BTreeSet::new();
        for (i, &hash) in band_hashes.iter().enumerate() {
            for owner in table.get(&(i as u8, hash)).map_err(StoreError::backend)? {
                let owner = owner.map_err(StoreError::backend)?;
                out.insert(owner.value().to_string());
            }
        }
        Ok(out)
    }

    fn put_case_baseline(&self, baseline: &CaseBaseline) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut table = txn.open_table(BASELINES).map_err(StoreError::backend)?;
            let exists = table
                .get(baseline.case_id.as_str())
                .map_err(StoreError::backend)?
                .is_some();
            if exists {
                // Abort without committing; the existing baseline stays.
                return Err(StoreError::BaselineFrozen {
                    case_id: baseline.case_id.clone(),
                });
            }
            table
                .insert(baseline.case_id.as_str(), baseline.to_bytes()?.as_slice())
                .map_err(StoreError::backend)?;
        }
        txn.commit().map_err(StoreError::backend)?;
        Ok(())
    }

    fn get_case_baseline(&self, case_id: &str) -> Result<CaseBaseline, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = txn.open_table(BASELINES).map_err(StoreError::backend)?;
        match table.get(case_id).map_err(StoreError::backend)? {
            Some(guard) => CaseBaseline::from_bytes(guard.value()),
            None => Err(StoreError::not_found("case baseline", case_id)),
        }
    }

    fn append_rescan(&self, record: &RescanRecord) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut table = txn.open_table(RESCANS).map_err(StoreError::backend)?;
            let case = record.case_id.as_str();
            let next_seq = {
                let mut seq = 0u64;
                for item in table
                    .range((case, 0u64)..=(case, u64::MAX))
                    .map_err(StoreError::backend)?
                {
                    let (key, _) = item.map_err(StoreError::backend)?;
                    seq = key.value().1 + 1;
                }
                seq
            };
            table
                .insert(&(case, next_seq), encode(record)?.as_slice())
                .map_err(StoreError::backend)?;
        }
        txn.commit().map_err(StoreError::backend)?;
        Ok(())
    }

    fn list_rescans(&self, case_id: &str) -> Result<Vec<RescanRecord>, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = txn.open_table(RESCANS).map_err(StoreError::backend)?;
        let mut out = Vec::new();
        for item in table
            .range((case_id, 0u64)..=(case_id, u64::MAX))
            .map_err(StoreError::backend)?
        {
            let (_, value) = item.map_err(StoreError::backend)?;
            out.push(decode(value.value())?);
        }
        Ok(out)
    }

    fn list_template_ids(&self, limit: usize, offset: usize) -> Result<Vec<String>, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = txn.open_table(TEMPLATES).map_err(StoreError::backend)?;
        let mut out = Vec::with_capacity(limit);
        for item in table.iter().map_err(StoreError::backend)?.skip(offset) {
            if out.len() == limit {
                break;
            }
            let (key, _) = item.map_err(StoreError::backend)?;
            out.push(key.value().to_string());
        }
        Ok(out)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let templates = txn.open_table(TEMPLATES).map_err(StoreError::backend)?;
        let pages = txn.open_table(PAGES).map_err(StoreError::backend)?;
        let template_bands = txn
            .open_multimap_table(TEMPLATE_BANDS)
            .map_err(StoreError::backend)?;
        let page_bands = txn
            .open_multimap_table(PAGE_BANDS)
            .map_err(StoreError::backend)?;
        Ok(StoreStats {
            templates: templates.len().map_err(StoreError::backend)?,
            pages: pages.len().map_err(StoreError::backend)?,
            template_band_rows: template_bands.len().map_err(StoreError::backend)?,
            page_band_rows: page_bands.len().map_err(StoreError::backend)?,
        })
    }
}
