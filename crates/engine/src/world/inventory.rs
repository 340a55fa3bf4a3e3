use std::collections::BTreeMap;

use crate::content::ElementId;

/// What one actor holds: placeable elements by quantity and harvested resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    held: BTreeMap<ElementId, u32>,
    resources: BTreeMap<String, u32>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quantity(&self, element: ElementId) -> u32 {
        self.held.get(&element).copied().unwrap_or(0)
    }

    pub fn set_quantity(&mut self, element: ElementId, quantity: u32) {
        self.held.insert(element, quantity);
    }

    pub fn add_quantity(&mut self, element: ElementId, amount: u32) {
        let entry = self.held.entry(element).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn can_afford(&self, element: ElementId, amount: u32) -> bool {
        self.quantity(element) >= amount
    }

    /// Returns false and leaves the count untouched when short.
    pub fn consume(&mut self, element: ElementId, amount: u32) -> bool {
        match self.held.get_mut(&element) {
            Some(held) if *held >= amount => {
                *held -= amount;
                true
            }
            _ => amount == 0,
        }
    }

    pub fn credit(&mut self, resource: &str, amount: u32) {
        let entry = self.resources.entry(resource.to_string()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn resource(&self, resource: &str) -> u32 {
        self.resources.get(resource).copied().unwrap_or(0)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.resources
            .iter()
            .map(|(name, amount)| (name.as_str(), *amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_refuses_to_go_negative() {
        let mut inventory = Inventory::new();
        let seed = ElementId(4);
        inventory.set_quantity(seed, 2);

        assert!(inventory.consume(seed, 2));
        assert_eq!(inventory.quantity(seed), 0);
        assert!(!inventory.consume(seed, 1));
        assert_eq!(inventory.quantity(seed), 0);
        assert!(inventory.consume(seed, 0));
    }

    #[test]
    fn unknown_element_has_zero_quantity() {
        let inventory = Inventory::new();
        assert_eq!(inventory.quantity(ElementId(9)), 0);
        assert!(!inventory.can_afford(ElementId(9), 1));
        assert!(inventory.can_afford(ElementId(9), 0));
    }

    #[test]
    fn credits_accumulate_per_resource() {
        let mut inventory = Inventory::new();
        inventory.credit("wood", 5);
        inventory.credit("wood", 2);
        inventory.credit("leaf", 3);

        assert_eq!(inventory.resource("wood"), 7);
        assert_eq!(inventory.resource("seed"), 0);
        assert_eq!(
            inventory.resources().collect::<Vec<_>>(),
            vec![("leaf", 3), ("wood", 7)]
        );
    }
}
