//! Builders for the three logical path families the proxy forwards.

/// Logical API paths. Tenant goes into every path.
pub struct ApiPath;

impl ApiPath {
    /// Single-shot fetch: `GET /data/{tenant}/{resource}`.
    pub fn data(tenant: &str, resource: &str) -> String {
        format!("/data/{}/{}", tenant, resource)
    }

    /// Offset page of a data resource.
    pub fn data_page(tenant: &str, resource: &str, offset: u64, limit: u64) -> String {
        format!(
            "/data/{}/{}?offset={}&limit={}",
            tenant, resource, offset, limit
        )
    }

    /// Server-side record count: `GET /count/{tenant}/{resource}`.
    pub fn count(tenant: &str, resource: &str) -> String {
        format!("/count/{}/{}", tenant, resource)
    }

    /// Search page: `POST /search/{resource}/{tenant}/{offset}/{limit}`.
    pub fn search(resource: &str, tenant: &str, offset: u64, limit: u64) -> String {
        format!("/search/{}/{}/{}/{}", resource, tenant, offset, limit)
    }

    /// Inverse of [`ApiPath::search`]: the `(offset, limit)` pair of a search path.
    pub fn search_bounds(path: &str) -> Option<(u64, u64)> {
        let mut parts = path.rsplit('/');
        let limit = parts.next()?.parse().ok()?;
        let offset = parts.next()?.parse().ok()?;
        Some((offset, limit))
    }
}
