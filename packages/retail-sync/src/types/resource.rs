use super::table::TableSpec;
use serde::Serialize;

/// How a resource is fetched from the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// One `GET /data/{tenant}/{path}` call answers completely.
    Simple { path: &'static str },
    /// Offset pages of `GET /data/{tenant}/{path}`.
    Paginated { path: &'static str },
    /// `POST /search/{path}/{tenant}/..` partitioned into month windows.
    Searchable { path: &'static str },
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Simple { path }
            | Endpoint::Paginated { path }
            | Endpoint::Searchable { path } => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Endpoint::Simple { .. } => "simple",
            Endpoint::Paginated { .. } => "paginated",
            Endpoint::Searchable { .. } => "searchable",
        }
    }
}

/// Whether the artifact is a list or a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Collection,
    Singleton,
}

/// Static description of one extractable resource.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    pub name: &'static str,
    pub endpoint: Endpoint,
    pub primary_key_field: &'static str,
    /// Dependency tier; lower tiers load first.
    pub tier: u8,
    pub shape: Shape,
    /// Set when the endpoint answers with bare scalars instead of objects.
    pub scalar_id_prefix: Option<&'static str>,
    /// Target table. `None` means extract-only.
    pub table: Option<&'static TableSpec>,
}

impl ResourceDescriptor {
    pub const fn new(name: &'static str, endpoint: Endpoint, tier: u8) -> Self {
        Self {
            name,
            endpoint,
            primary_key_field: "_id",
            tier,
            shape: Shape::Collection,
            scalar_id_prefix: None,
            table: None,
        }
    }

    pub const fn with_table(mut self, table: &'static TableSpec) -> Self {
        self.table = Some(table);
        self
    }

    pub const fn singleton(mut self) -> Self {
        self.shape = Shape::Singleton;
        self
    }

    pub const fn scalar_items(mut self, prefix: &'static str) -> Self {
        self.scalar_id_prefix = Some(prefix);
        self
    }
}
