//! Azure resource id helpers

const COMPONENTS_RESOURCE_TYPE: &str = "microsoft.insights/components";

/// True for resource ids that do not point at a classic Application Insights component.
///
/// Queries against such resources need the resource-centric let-statements.
pub fn is_generic_resource_id(id: Option<&str>) -> bool {
    match id {
        Some(id) if !id.is_empty() => !id.to_lowercase().contains(COMPONENTS_RESOURCE_TYPE),
        _ => false,
    }
}
