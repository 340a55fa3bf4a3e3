use farm_engine::ElementId;

pub(crate) const SLOTS_PER_PAGE: usize = 10;
pub(crate) const AREA_SIZES: [u32; 4] = [1, 2, 3, 4];

/// Hotbar over the selectable catalog entries: pages of ten number-key slots
/// plus the side length used for area-prompted elements.
#[derive(Debug, Clone)]
pub(crate) struct Palette {
    entries: Vec<ElementId>,
    page: usize,
    selected: Option<ElementId>,
    area_index: usize,
}

impl Palette {
    pub(crate) fn new(entries: Vec<ElementId>) -> Self {
        Self {
            entries,
            page: 0,
            selected: None,
            area_index: 0,
        }
    }

    pub(crate) fn page(&self) -> usize {
        self.page
    }

    pub(crate) fn page_count(&self) -> usize {
        self.entries.len().div_ceil(SLOTS_PER_PAGE).max(1)
    }

    pub(crate) fn page_entries(&self) -> &[ElementId] {
        let start = (self.page * SLOTS_PER_PAGE).min(self.entries.len());
        let end = (start + SLOTS_PER_PAGE).min(self.entries.len());
        &self.entries[start..end]
    }

    pub(crate) fn next_page(&mut self) -> usize {
        self.page = (self.page + 1) % self.page_count();
        self.page
    }

    /// Selects slot `slot` (0-based) of the current page. An empty slot keeps
    /// the previous selection.
    pub(crate) fn select_slot(&mut self, slot: u8) -> Option<ElementId> {
        let element = self.page_entries().get(usize::from(slot)).copied()?;
        self.selected = Some(element);
        Some(element)
    }

    pub(crate) fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    pub(crate) fn area_size(&self) -> u32 {
        AREA_SIZES[self.area_index]
    }

    pub(crate) fn cycle_area(&mut self) -> u32 {
        self.area_index = (self.area_index + 1) % AREA_SIZES.len();
        self.area_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(count: u32) -> Vec<ElementId> {
        (0..count).map(ElementId).collect()
    }

    #[test]
    fn slots_index_into_current_page() {
        let mut palette = Palette::new(ids(23));
        assert_eq!(palette.page_count(), 3);
        assert_eq!(palette.select_slot(0), Some(ElementId(0)));

        palette.next_page();
        assert_eq!(palette.select_slot(9), Some(ElementId(19)));

        palette.next_page();
        assert_eq!(palette.page_entries().len(), 3);
        assert_eq!(palette.select_slot(5), None);
        assert_eq!(palette.selected(), Some(ElementId(19)));

        assert_eq!(palette.next_page(), 0);
    }

    #[test]
    fn empty_palette_has_one_empty_page() {
        let mut palette = Palette::new(Vec::new());
        assert_eq!(palette.page_count(), 1);
        assert_eq!(palette.next_page(), 0);
        assert_eq!(palette.select_slot(0), None);
    }

    #[test]
    fn area_size_cycles_and_wraps() {
        let mut palette = Palette::new(ids(1));
        assert_eq!(palette.area_size(), 1);
        let sizes: Vec<u32> = (0..4).map(|_| palette.cycle_area()).collect();
        assert_eq!(sizes, vec![2, 3, 4, 1]);
    }
}
