use crate::formats::PageRoute;
use crate::status::StatusFilter;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRegistry {
    routes: Vec<PageRoute>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> &[PageRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&PageRoute> {
        self.routes.iter().find(|route| route.id == id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.routes.iter().map(|route| route.id)
    }

    pub fn replace_all(&mut self, routes: Vec<PageRoute>) {
        tracing::debug!(
            before = self.routes.len(),
            after = routes.len(),
            "replacing page registry"
        );
        self.routes = routes;
    }

    pub fn filter_by_status(&self, filter: &StatusFilter) -> Vec<&PageRoute> {
        self.routes
            .iter()
            .filter(|route| filter.matches(&route.status))
            .collect()
    }
}
