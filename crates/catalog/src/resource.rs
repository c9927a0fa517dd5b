/// An upstream collection and the JSON keys its items are projected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogResource {
    pub path: &'static str,
    pub code_field: &'static str,
    pub name_field: &'static str,
}

impl CatalogResource {
    pub const PARKS: Self = Self {
        path: "parks",
        code_field: "parkCode",
        name_field: "fullName",
    };

    pub const ACTIVITIES: Self = Self {
        path: "activities",
        code_field: "id",
        name_field: "name",
    };

    pub const AMENITIES: Self = Self {
        path: "amenities",
        code_field: "id",
        name_field: "name",
    };

    pub const ALERTS: Self = Self {
        path: "alerts",
        code_field: "id",
        name_field: "title",
    };

    pub const EVENTS: Self = Self {
        path: "events",
        code_field: "id",
        name_field: "title",
    };

    pub const VISITOR_CENTERS: Self = Self {
        path: "visitorcenters",
        code_field: "id",
        name_field: "name",
    };

    pub const THINGS_TO_DO: Self = Self {
        path: "thingstodo",
        code_field: "id",
        name_field: "title",
    };

    pub const PARKING_LOTS: Self = Self {
        path: "parkinglots",
        code_field: "id",
        name_field: "name",
    };

    pub const NEWS_RELEASES: Self = Self {
        path: "newsreleases",
        code_field: "id",
        name_field: "title",
    };
}

/// Items read from an array field of each walked item instead of the walked
/// items themselves, e.g. the `activities` listed on a park.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestedProjection {
    pub field: &'static str,
    pub resource: CatalogResource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub resource: CatalogResource,
    pub filters: Vec<(String, String)>,
    pub nested: Option<NestedProjection>,
}

impl CatalogQuery {
    pub fn new(resource: CatalogResource) -> Self {
        Self {
            resource,
            filters: Vec::new(),
            nested: None,
        }
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    pub fn nested(mut self, field: &'static str, resource: CatalogResource) -> Self {
        self.nested = Some(NestedProjection { field, resource });
        self
    }

    /// The resource whose keys the result is projected on.
    pub fn projection(&self) -> CatalogResource {
        self.nested
            .map(|nested| nested.resource)
            .unwrap_or(self.resource)
    }
}

impl From<CatalogResource> for CatalogQuery {
    fn from(value: CatalogResource) -> Self {
        Self::new(value)
    }
}
