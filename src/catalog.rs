//! Lookup of known product, mask, and zone-layer rasters
//!
//! The catalog is an explicit object handed to whoever needs it. It reads its
//! backing store on first lookup and again on [`RasterCatalog::refresh`].

use crate::errors::{Result, RuZonalError};
use crate::raster::{NetCDFRaster, RasterLocator};
use crate::statistics::MaskKind;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Which list of the catalog an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Product,
    Mask,
    ZoneLayer,
}

impl EntryKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "products",
            Self::Mask => "masks",
            Self::ZoneLayer => "zone_layers",
        }
    }
}

/// One raster known to the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub kind: EntryKind,
    pub locator: RasterLocator,
    pub variable: String,
    pub band: Option<usize>,
    /// Products only: core count to use instead of the configured pool size
    pub preferred_cores: Option<usize>,
    /// Masks only: how the mask pixels are interpreted
    pub mask_kind: Option<MaskKind>,
}

impl CatalogEntry {
    /// The NetCDF raster this entry points at
    pub fn raster(&self) -> NetCDFRaster {
        let raster = NetCDFRaster::new(self.locator.clone(), self.variable.clone());
        match self.band {
            Some(band) => raster.with_band(band),
            None => raster,
        }
    }
}

/// Backing store of a catalog
pub trait CatalogSource: Send + Sync {
    fn load(&self) -> Result<Vec<CatalogEntry>>;
}

/// Catalog document on disk
///
/// ```json
/// {
///   "products":    [{ "id": "ndvi", "locator": "/data/ndvi.nc", "variable": "ndvi", "preferred_cores": 4 }],
///   "masks":       [{ "id": "crop", "locator": "/data/crop.nc", "variable": "mask", "mask_kind": "binary" }],
///   "zone_layers": [{ "id": "admin1", "locator": "/data/admin1.nc", "variable": "zone" }]
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JsonCatalogSource {
    path: PathBuf,
}

impl JsonCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for JsonCatalogSource {
    fn load(&self) -> Result<Vec<CatalogEntry>> {
        let content = std::fs::read_to_string(&self.path)?;
        let document: CatalogDocument = serde_json::from_str(&content).map_err(|e| {
            RuZonalError::CatalogError(format!("{}: {}", self.path.display(), e))
        })?;
        document.into_entries()
    }
}

/// One entry as written in the catalog document
#[derive(Debug, Deserialize)]
struct RawEntry {
    id: String,
    locator: String,
    variable: String,
    #[serde(default)]
    band: Option<usize>,
    #[serde(default)]
    preferred_cores: Option<usize>,
    #[serde(default)]
    mask_kind: Option<String>,
}

impl RawEntry {
    fn into_entry(self, kind: EntryKind) -> Result<CatalogEntry> {
        let mask_kind = self
            .mask_kind
            .as_deref()
            .map(str::parse::<MaskKind>)
            .transpose()?;
        Ok(CatalogEntry {
            locator: RasterLocator::parse(&self.locator)?,
            id: self.id,
            kind,
            variable: self.variable,
            band: self.band,
            preferred_cores: self.preferred_cores,
            mask_kind,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    products: Vec<RawEntry>,
    #[serde(default)]
    masks: Vec<RawEntry>,
    #[serde(default)]
    zone_layers: Vec<RawEntry>,
}

impl CatalogDocument {
    fn into_entries(self) -> Result<Vec<CatalogEntry>> {
        let lists = [
            (EntryKind::Product, self.products),
            (EntryKind::Mask, self.masks),
            (EntryKind::ZoneLayer, self.zone_layers),
        ];
        let mut entries = Vec::new();
        for (kind, raw) in lists {
            for entry in raw {
                entries.push(entry.into_entry(kind)?);
            }
        }
        Ok(entries)
    }
}

/// Parse a catalog document into entries
///
/// # Errors
///
/// Returns a `CatalogError` for malformed entries (missing `id`, `locator` or
/// `variable`, negative counts), and a configuration error for bad locators or mask
/// kinds.
pub fn parse_catalog(document: &JsonValue) -> Result<Vec<CatalogEntry>> {
    CatalogDocument::deserialize(document)
        .map_err(|e| RuZonalError::CatalogError(e.to_string()))?
        .into_entries()
}

#[derive(Debug, Default)]
struct CatalogIndex {
    entries: HashMap<(EntryKind, String), CatalogEntry>,
}

/// Lazily built, refreshable catalog
pub struct RasterCatalog<S: CatalogSource> {
    source: S,
    index: RwLock<Option<Arc<CatalogIndex>>>,
}

impl<S: CatalogSource> RasterCatalog<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            index: RwLock::new(None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.index.read().map(|i| i.is_some()).unwrap_or(false)
    }

    /// Reload every entry from the backing store
    pub fn refresh(&self) -> Result<()> {
        let entries = self.source.load()?;
        let mut index = CatalogIndex::default();
        for entry in entries {
            let key = (entry.kind, entry.id.clone());
            if index.entries.insert(key, entry).is_some() {
                debug!("catalog entry replaced by a later duplicate");
            }
        }
        debug!(entries = index.entries.len(), "catalog loaded");

        let mut slot = self
            .index
            .write()
            .map_err(|_| RuZonalError::CatalogError("catalog lock poisoned".to_string()))?;
        *slot = Some(Arc::new(index));
        Ok(())
    }

    fn index(&self) -> Result<Arc<CatalogIndex>> {
        {
            let slot = self
                .index
                .read()
                .map_err(|_| RuZonalError::CatalogError("catalog lock poisoned".to_string()))?;
            if let Some(index) = slot.as_ref() {
                return Ok(Arc::clone(index));
            }
        }
        self.refresh()?;
        self.index()
    }

    fn lookup(&self, kind: EntryKind, id: &str) -> Result<CatalogEntry> {
        self.index()?
            .entries
            .get(&(kind, id.to_string()))
            .cloned()
            .ok_or_else(|| {
                RuZonalError::CatalogError(format!("unknown {} id '{}'", kind.as_str(), id))
            })
    }

    pub fn product(&self, id: &str) -> Result<CatalogEntry> {
        self.lookup(EntryKind::Product, id)
    }

    pub fn mask(&self, id: &str) -> Result<CatalogEntry> {
        self.lookup(EntryKind::Mask, id)
    }

    pub fn zone_layer(&self, id: &str) -> Result<CatalogEntry> {
        self.lookup(EntryKind::ZoneLayer, id)
    }

    /// Sorted ids of one list
    pub fn ids(&self, kind: EntryKind) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .index()?
            .entries
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// A mask raster together with the id its observations are recorded under
#[derive(Debug, Clone)]
pub struct ResolvedMask {
    pub id: String,
    pub raster: NetCDFRaster,
    /// Mask kind stored in the catalog, if the mask came from there
    pub mask_kind: Option<MaskKind>,
}

/// Pair the mask raster of a run with its mask id
///
/// An explicit raster wins over the catalog entry but still needs an id. An id with
/// no explicit raster is looked up in the catalog. Observations are keyed by the
/// mask id, so an id without a raster, or a raster without an id, is rejected.
///
/// # Errors
///
/// Returns a configuration error for an unpaired id or raster, or the catalog's
/// lookup error.
pub fn resolve_mask<S: CatalogSource>(
    explicit: Option<NetCDFRaster>,
    mask_id: Option<&str>,
    catalog: Option<&RasterCatalog<S>>,
) -> Result<Option<ResolvedMask>> {
    match (explicit, mask_id, catalog) {
        (Some(raster), Some(id), _) => Ok(Some(ResolvedMask {
            id: id.to_string(),
            raster,
            mask_kind: None,
        })),
        (Some(raster), None, _) => Err(RuZonalError::config(format!(
            "mask raster '{}' needs a mask id to key its observations",
            raster.variable_name()
        ))),
        (None, Some(id), Some(catalog)) => {
            let entry = catalog.mask(id)?;
            Ok(Some(ResolvedMask {
                id: entry.id.clone(),
                raster: entry.raster(),
                mask_kind: entry.mask_kind,
            }))
        }
        (None, Some(id), None) => Err(RuZonalError::config(format!(
            "mask id '{}' given without a mask raster or catalog",
            id
        ))),
        (None, None, _) => Ok(None),
    }
}
