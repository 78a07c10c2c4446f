//! Catalog value types handed to callers.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One row of the catalog index. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub id: u32,
    pub name: String,
    pub normalized_name: String,
}

impl IndexEntry {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        let normalized_name = crate::normalize(&name);
        Self {
            id,
            name,
            normalized_name,
        }
    }
}

/// An `(id, name)` pair selected by a search, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexHit {
    pub id: u32,
    pub name: String,
}

impl From<&IndexEntry> for IndexHit {
    fn from(entry: &IndexEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
        }
    }
}

/// A fully resolved entity.
///
/// Height and weight are kept in upstream units (tenths of a meter and of a
/// kilogram); see [`EntityDetail::height_meters`] and [`EntityDetail::weight_kg`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDetail {
    pub id: u32,
    pub name: String,
    pub height_raw: u32,
    pub weight_raw: u32,
    pub base_experience: u32,
    pub image_url: String,
    /// Empty when no label could be resolved
    pub category_label: String,
}

impl EntityDetail {
    pub fn height_meters(&self) -> f64 {
        f64::from(self.height_raw) / 10.0
    }

    pub fn weight_kg(&self) -> f64 {
        f64::from(self.weight_raw) / 10.0
    }
}

/// Flat projection consumed by export and notification collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub id: u32,
    pub name: String,
    pub category_label: String,
    pub image_url: String,
}

impl From<&EntityDetail> for ExportRow {
    fn from(detail: &EntityDetail) -> Self {
        Self {
            id: detail.id,
            name: detail.name.clone(),
            category_label: detail.category_label.clone(),
            image_url: detail.image_url.clone(),
        }
    }
}

/// A category as offered to filter pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub id: u32,
    pub name: String,
}

/// Consolidated result of a bulk notification fan-out.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BulkReport {
    pub count: usize,
    /// Ascending by id
    pub entities: Vec<EntityDetail>,
}

/// One page of an ordered result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    /// Length of the filtered set before slicing
    pub total_count: usize,
}

impl<T> Page<T> {
    /// Slices `[(page-1)*page_size, page*page_size)` out of an ordered set.
    pub fn slice(all: &[T], page: u32, page_size: u32) -> Self
    where
        T: Clone,
    {
        let start = page.saturating_sub(1) as usize * page_size as usize;
        let items = all
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();

        Self {
            items,
            page,
            page_size,
            total_count: all.len(),
        }
    }

    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size as usize)
    }

    /// Replaces the items, keeping paging metadata as is.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            page: self.page,
            page_size: self.page_size,
            total_count: self.total_count,
        }
    }
}

/// Search parameters as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Free text matched against normalized entity names
    pub name: Option<String>,
    pub category_id: Option<u32>,
    /// 1-based
    pub page: u32,
    /// Zero means "use the default"
    pub page_size: u32,
}

impl SearchFilter {
    /// Corrects out-of-range input instead of rejecting it: page becomes at
    /// least 1, page size defaults to 20 and is clamped to `[1, 100]`, and a
    /// blank name counts as no name.
    pub fn clamped(&self) -> Self {
        let page_size = match self.page_size {
            0 => DEFAULT_PAGE_SIZE,
            size => size.min(MAX_PAGE_SIZE),
        };
        let name = self
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string);

        Self {
            name,
            category_id: self.category_id,
            page: self.page.max(1),
            page_size,
        }
    }

    pub(crate) fn offset(&self) -> usize {
        self.page.saturating_sub(1) as usize * self.page_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        let filter = SearchFilter {
            name: Some("   ".into()),
            category_id: None,
            page: 0,
            page_size: 0,
        }
        .clamped();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(filter.name, None);

        let filter = SearchFilter {
            page: 3,
            page_size: 500,
            ..Default::default()
        }
        .clamped();
        assert_eq!(filter.page, 3);
        assert_eq!(filter.page_size, MAX_PAGE_SIZE);
        assert_eq!(filter.offset(), 200);
    }

    #[test]
    fn test_page_slice_lengths() {
        let all: Vec<u32> = (1..=45).collect();

        for (page, expected) in [(1, 20), (2, 20), (3, 5), (4, 0), (9, 0)] {
            let slice = Page::slice(&all, page, 20);
            assert_eq!(slice.items.len(), expected, "page {page}");
            assert_eq!(slice.total_count, 45);
            assert_eq!(slice.total_pages(), 3);
        }

        let third = Page::slice(&all, 3, 20);
        assert_eq!(third.items, vec![41, 42, 43, 44, 45]);
    }

    #[test]
    fn test_empty_page() {
        let slice = Page::<u32>::slice(&[], 1, 20);
        assert!(slice.items.is_empty());
        assert_eq!(slice.total_pages(), 0);
    }

    #[test]
    fn test_derived_units() {
        let detail = EntityDetail {
            id: 1,
            name: "bulbasaur".into(),
            height_raw: 7,
            weight_raw: 69,
            base_experience: 64,
            image_url: String::new(),
            category_label: "Seed".into(),
        };
        assert!((detail.height_meters() - 0.7).abs() < f64::EPSILON);
        assert!((detail.weight_kg() - 6.9).abs() < 1e-9);
    }
}
