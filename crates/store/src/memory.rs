//! In-memory store backend for tests and ephemeral deployments.

use std::collections::BTreeSet;
use std::sync::RwLock;

use hashbrown::HashMap;

use crate::records::page_prefix;
use crate::{
    CaseBaseline, OwnerKind, PageRecord, RescanRecord, SketchStore, StoreError, StoreStats,
    TemplateRecord, TemplateSketches,
};

#[derive(Default)]
struct Inner {
    templates: HashMap<String, TemplateRecord>,
    sketches: HashMap<String, TemplateSketches>,
    pages: HashMap<String, PageRecord>,
    template_bands: BandIndex,
    page_bands: BandIndex,
    baselines: HashMap<String, CaseBaseline>,
    rescans: HashMap<String, Vec<RescanRecord>>,
}

#[derive(Default)]
struct BandIndex {
    /// (band_index, band_hash) -> owners.
    rows: HashMap<(u8, u64), BTreeSet<String>>,
    /// owner -> its current band hashes, for O(b) replacement.
    by_owner: HashMap<String, Vec<u64>>,
}

impl BandIndex {
    fn replace(&mut self, owner: &str, bands: &[u64]) {
        self.remove(owner);
        for (i, &hash) in bands.iter().enumerate() {
            self.rows
                .entry((i as u8, hash))
                .or_default()
                .insert(owner.to_string());
        }
        if !bands.is_empty() {
            self.by_owner.insert(owner.to_string(), bands.to_vec());
        }
    }

    fn remove(&mut self, owner: &str) {
        if let Some(old) = self.by_owner.remove(owner) {
            for (i, hash) in old.into_iter().enumerate() {
                if let Some(owners) = self.rows.get_mut(&(i as u8, hash)) {
                    owners.remove(owner);
                    if owners.is_empty() {
                        self.rows.remove(&(i as u8, hash));
                    }
                }
            }
        }
    }

    fn lookup(&self, band_hashes: &[u64]) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for (i, &hash) in band_hashes.iter().enumerate() {
            if let Some(owners) = self.rows.get(&(i as u8, hash)) {
                out.extend(owners.iter().cloned());
            }
        }
        out
    }

    fn row_count(&self) -> u64 {
        self.by_owner.values().map(|v| v.len() as u64).sum()
    }
}

/// Hashbrown-backed [`SketchStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Conflict("store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Conflict("store lock poisoned".into()))
    }
}

impl SketchStore for MemoryStore {
    fn put_template(
        &self,
        record: &TemplateRecord,
        sketches: &TemplateSketches,
        bands: &[u64],
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.templates.insert(record.id.clone(), record.clone());
        inner.sketches.insert(record.id.clone(), sketches.clone());
        inner.template_bands.replace(&record.id, bands);
        Ok(())
    }

    fn put_page(&self, record: &PageRecord, bands: &[u64]) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.pages.insert(record.page_id.clone(), record.clone());
        inner.page_bands.replace(&record.page_id, bands);
        Ok(())
    }

    fn get_template(&self, id: &str) -> Result<TemplateRecord, StoreError> {
        self.read()?
            .templates
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("template", id))
    }

    fn get_template_sketches(&self, id: &str) -> Result<TemplateSketches, StoreError> {
        self.read()?
            .sketches
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("template sketches", id))
    }

    fn get_page(&self, page_id: &str) -> Result<PageRecord, StoreError> {
        self.read()?
            .pages
            .get(page_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("page", page_id))
    }

    fn list_pages(&self, template_id: &str) -> Result<Vec<PageRecord>, StoreError> {
        let prefix = page_prefix(template_id);
        let inner = self.read()?;
        let mut pages: Vec<PageRecord> = inner
            .pages
            .iter()
            .filter(|(id, _)| id.starts_with(&prefix))
            .map(|(_, record)| record.clone())
            .collect();
        pages.sort_by(|a, b| a.page_id.cmp(&b.page_id));
        Ok(pages)
    }

    fn delete_template(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.templates.remove(id);
        inner.sketches.remove(id);
        inner.template_bands.remove(id);
        let prefix = page_prefix(id);
        let page_ids: Vec<String> = inner
            .pages
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        for page_id in page_ids {
            inner.pages.remove(&page_id);
            inner.page_bands.remove(&page_id);
        }
        Ok(())
    }

    fn lookup_candidates(
        &self,
        band_hashes: &[u64],
        kind: OwnerKind,
    ) -> Result<BTreeSet<String>, StoreError> {
        let inner = self.read()?;
        Ok(match kind {
            OwnerKind::Template => inner.template_bands.lookup(band_hashes),
            OwnerKind::Page => inner.page_bands.lookup(band_hashes),
        })
    }

    fn put_case_baseline(&self, baseline: &CaseBaseline) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.baselines.contains_key(&baseline.case_id) {
            return Err(StoreError::BaselineFrozen {
                case_id: baseline.case_id.clone(),
            });
        }
        inner
            .baselines
            .insert(baseline.case_id.clone(), baseline.clone());
        Ok(())
    }

    fn get_case_baseline(&self, case_id: &str) -> Result<CaseBaseline, StoreError> {
        self.read()?
            .baselines
            .get(case_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("case baseline", case_id))
    }

    fn append_rescan(&self, record: &RescanRecord) -> Result<(), StoreError> {
        self.write()?
            .rescans
            .entry(record.case_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn list_rescans(&self, case_id: &str) -> Result<Vec<RescanRecord>, StoreError> {
        Ok(self
            .read()?
            .rescans
            .get(case_id)
            .cloned()
            .unwrap_or_default())
    }

    fn list_template_ids(&self, limit: usize, offset: usize) -> Result<Vec<String>, StoreError> {
        let inner = self.read()?;
        let mut ids: Vec<String> = inner.templates.keys().cloned().collect();
        ids.sort();
        Ok(ids.into_iter().skip(offset).take(limit).collect())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let inner = self.read()?;
        Ok(StoreStats {
            templates: inner.templates.len() as u64,
            pages: inner.pages.len() as u64,
            template_band_rows: inner.template_bands.row_count(),
            page_band_rows: inner.page_bands.row_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;

    #[test]
    fn memory_store_conformance() {
        let store = MemoryStore::new();
        conformance::exercise_store(&store);
    }

    #[test]
    fn empty_band_slice_stores_no_rows() {
        let store = MemoryStore::new();
        store
            .put_template(
                &conformance::template("tpl-empty"),
                &conformance::sketches(0),
                &[],
            )
            .unwrap();
        assert_eq!(store.stats().unwrap().template_band_rows, 0);
    }
}
