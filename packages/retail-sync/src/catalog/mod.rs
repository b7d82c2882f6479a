//! The resource catalog: what gets extracted, from where, in which tier,
//! and into which table.

pub mod tables;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::CatalogError;
use crate::types::resource::{Endpoint, ResourceDescriptor};
use crate::types::table::TableSpec;

/// An ordered set of resource descriptors.
#[derive(Debug, Clone)]
pub struct Catalog {
    resources: Vec<ResourceDescriptor>,
}

impl Catalog {
    pub fn new(resources: Vec<ResourceDescriptor>) -> Self {
        Self { resources }
    }

    /// Every resource the backend exposes for a tenant.
    pub fn standard() -> Self {
        use Endpoint::{Paginated, Searchable, Simple};

        Self::new(vec![
            // Tier 0: no foreign dependencies
            ResourceDescriptor::new("company", Simple { path: "company" }, 0).singleton(),
            ResourceDescriptor::new("stores", Simple { path: "stores" }, 0).with_table(&tables::STORES),
            ResourceDescriptor::new("accounts", Simple { path: "accounts" }, 0)
                .with_table(&tables::ACCOUNTS),
            ResourceDescriptor::new("money_sources", Simple { path: "sources" }, 0)
                .with_table(&tables::MONEY_SOURCES),
            ResourceDescriptor::new("categories", Simple { path: "catalog/categories" }, 0)
                .scalar_items("cat_")
                .with_table(&tables::CATEGORIES),
            ResourceDescriptor::new("units", Simple { path: "units" }, 0).with_table(&tables::UNITS),
            ResourceDescriptor::new("tags", Simple { path: "tags" }, 0).with_table(&tables::TAGS),
            ResourceDescriptor::new("taxes", Simple { path: "taxes" }, 0).with_table(&tables::TAXES),
            ResourceDescriptor::new("employees", Simple { path: "employees" }, 0)
                .with_table(&tables::EMPLOYEES),
            ResourceDescriptor::new("suppliers", Simple { path: "suppliers" }, 0)
                .with_table(&tables::SUPPLIERS),
            ResourceDescriptor::new("registers", Simple { path: "registers" }, 0),
            // Tier 1: may reference tier 0
            ResourceDescriptor::new("products", Paginated { path: "catalog" }, 1)
                .with_table(&tables::PRODUCTS),
            ResourceDescriptor::new("customers", Paginated { path: "clients" }, 1)
                .with_table(&tables::CUSTOMERS),
            // Tier 2: transactional
            ResourceDescriptor::new("documents", Searchable { path: "docs" }, 2)
                .with_table(&tables::DOCUMENTS),
            ResourceDescriptor::new("money_movements", Searchable { path: "money" }, 2)
                .with_table(&tables::MONEY_MOVEMENTS),
            ResourceDescriptor::new("shifts", Simple { path: "shifts" }, 2),
        ])
    }

    /// Check names are unique and every foreign reference targets a table
    /// resource in a strictly lower tier.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if !seen.insert(resource.name) {
                return Err(CatalogError::DuplicateResource {
                    name: resource.name.to_string(),
                });
            }
        }

        let by_name: HashMap<&str, &ResourceDescriptor> =
            self.resources.iter().map(|r| (r.name, r)).collect();

        for resource in &self.resources {
            let Some(table) = resource.table else { continue };
            for reference in table.references {
                let target = by_name
                    .get(reference.resource)
                    .filter(|t| t.table.is_some())
                    .ok_or_else(|| CatalogError::UnknownReference {
                        resource: resource.name.to_string(),
                        column: reference.column.to_string(),
                        referenced: reference.resource.to_string(),
                    })?;
                if target.tier >= resource.tier {
                    return Err(CatalogError::ReferenceOrder {
                        resource: resource.name.to_string(),
                        column: reference.column.to_string(),
                        referenced: reference.resource.to_string(),
                        tier: resource.tier,
                        referenced_tier: target.tier,
                    });
                }
            }
        }
        Ok(())
    }

    /// Resources grouped by ascending tier, declaration order within a tier.
    pub fn tiers(&self) -> BTreeMap<u8, Vec<&ResourceDescriptor>> {
        let mut tiers: BTreeMap<u8, Vec<&ResourceDescriptor>> = BTreeMap::new();
        for resource in &self.resources {
            tiers.entry(resource.tier).or_default().push(resource);
        }
        tiers
    }

    /// Narrow the catalog to the named resources. An empty list keeps everything.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, CatalogError> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        for name in names {
            if self.get(name.as_ref()).is_none() {
                return Err(CatalogError::UnknownResource {
                    name: name.as_ref().to_string(),
                });
            }
        }
        let resources = self
            .resources
            .iter()
            .filter(|r| names.iter().any(|n| n.as_ref() == r.name))
            .copied()
            .collect();
        Ok(Self::new(resources))
    }

    /// Target tables in tier order.
    pub fn tables(&self) -> Vec<&'static TableSpec> {
        self.tiers()
            .into_values()
            .flatten()
            .filter_map(|r| r.table)
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(resources: &[&ResourceDescriptor]) -> Vec<&'static str> {
        resources.iter().map(|r| r.name).collect()
    }

    #[test]
    fn test_standard_catalog_is_valid() {
        Catalog::standard().validate().unwrap();
    }

    #[test]
    fn test_tiers_keep_declaration_order() {
        let catalog = Catalog::standard();
        let tiers = catalog.tiers();

        assert_eq!(tiers.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(names(&tiers[&0])[..3], ["company", "stores", "accounts"]);
        assert_eq!(names(&tiers[&1]), vec!["products", "customers"]);
        assert_eq!(names(&tiers[&2]), vec!["documents", "money_movements", "shifts"]);
    }

    #[test]
    fn test_tables_skip_extract_only_resources() {
        let tables: Vec<_> = Catalog::standard().tables().iter().map(|t| t.name).collect();
        assert_eq!(tables.len(), 13);
        assert!(!tables.contains(&"company"));
        assert_eq!(tables.last(), Some(&"money_movements"));
    }

    #[test]
    fn test_select_subset_keeps_tier_order() {
        let catalog = Catalog::standard().select(&["documents", "stores"]).unwrap();
        let order: Vec<_> = catalog.tiers().into_values().flatten().map(|r| r.name).collect();
        assert_eq!(order, vec!["stores", "documents"]);
    }

    #[test]
    fn test_select_unknown_resource() {
        let err = Catalog::standard().select(&["invoices"]).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownResource { name } if name == "invoices"));
    }

    #[test]
    fn test_misordered_reference_rejected() {
        let catalog = Catalog::new(vec![
            ResourceDescriptor::new("stores", Endpoint::Simple { path: "stores" }, 2)
                .with_table(&tables::STORES),
            ResourceDescriptor::new("documents", Endpoint::Searchable { path: "docs" }, 2)
                .with_table(&tables::DOCUMENTS),
        ]);
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::ReferenceOrder { tier: 2, referenced_tier: 2, .. })
        ));
    }

    #[test]
    fn test_missing_referenced_resource_rejected() {
        let catalog = Catalog::new(vec![ResourceDescriptor::new(
            "money_movements",
            Endpoint::Searchable { path: "money" },
            2,
        )
        .with_table(&tables::MONEY_MOVEMENTS)]);
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::UnknownReference { referenced, .. }) if referenced == "accounts"
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let stores = ResourceDescriptor::new("stores", Endpoint::Simple { path: "stores" }, 0);
        let catalog = Catalog::new(vec![stores, stores]);
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::DuplicateResource { .. })
        ));
    }
}
