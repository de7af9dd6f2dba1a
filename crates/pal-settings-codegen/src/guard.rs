//! Conditional-compilation guards.
//!
//! A setting or enum member may be gated by exactly one of:
//!
//! - `BuildTypes`: every listed macro must hold (`#if A && B`)
//! - `OrBuildTypes`: any listed macro suffices (`#if A || B`)
//! - `BuildFilters`: a raw `#if ...` line, passed through verbatim

use pal_settings_core::SettingsError;

/// Compute the `#if` line for an entity, or `None` if it is unguarded.
///
/// # Errors
///
/// `SettingsError::BuildGuard` if more than one guard form is present, or
/// if a `BuildFilters` string is not an `#if` line.
pub fn build_guard(
    owner: &str,
    build_types: &[String],
    or_build_types: &[String],
    build_filters: Option<&str>,
) -> Result<Option<String>, SettingsError> {
    let present = [
        !build_types.is_empty(),
        !or_build_types.is_empty(),
        build_filters.is_some(),
    ];
    if present.iter().filter(|&&p| p).count() > 1 {
        return Err(SettingsError::BuildGuard {
            owner: owner.to_string(),
            reason: "BuildTypes, OrBuildTypes and BuildFilters are mutually exclusive".to_string(),
        });
    }

    if !build_types.is_empty() {
        return Ok(Some(join_macros(build_types, " && ")));
    }
    if !or_build_types.is_empty() {
        return Ok(Some(join_macros(or_build_types, " || ")));
    }
    match build_filters {
        Some(filter) => {
            let filter = filter.trim();
            if !filter.starts_with("#if ") {
                return Err(SettingsError::BuildGuard {
                    owner: owner.to_string(),
                    reason: format!("BuildFilters must start with \"#if \", found \"{filter}\""),
                });
            }
            Ok(Some(filter.to_string()))
        }
        None => Ok(None),
    }
}

/// `#if A && B` style line from macro names.
pub fn join_macros(macros: &[String], op: &str) -> String {
    let joined: Vec<&str> = macros.iter().map(|m| m.trim()).collect();
    format!("#if {}", joined.join(op))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unguarded() {
        assert_eq!(build_guard("X", &[], &[], None).unwrap(), None);
    }

    #[test]
    fn and_guard() {
        let g = build_guard("X", &v(&["PAL_DEVELOPER_BUILD", " PAL_BUILD_GFX12 "]), &[], None);
        assert_eq!(g.unwrap().as_deref(), Some("#if PAL_DEVELOPER_BUILD && PAL_BUILD_GFX12"));
    }

    #[test]
    fn or_guard() {
        let g = build_guard("X", &[], &v(&["A", "B", "C"]), None);
        assert_eq!(g.unwrap().as_deref(), Some("#if A || B || C"));
    }

    #[test]
    fn raw_filter_passes_through() {
        let g = build_guard("X", &[], &[], Some("#if PAL_CLIENT_INTERFACE_MAJOR_VERSION <= 354"));
        assert_eq!(
            g.unwrap().as_deref(),
            Some("#if PAL_CLIENT_INTERFACE_MAJOR_VERSION <= 354")
        );
    }

    #[test]
    fn raw_filter_must_be_an_if_line() {
        let err = build_guard("X", &[], &[], Some("PAL_BUILD_GFX12")).unwrap_err();
        assert!(matches!(err, SettingsError::BuildGuard { .. }));
    }

    #[test]
    fn and_plus_or_is_rejected() {
        let err = build_guard("Both", &v(&["A"]), &v(&["B"]), None).unwrap_err();
        assert!(err.to_string().contains("Both"));
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn types_plus_filter_is_rejected() {
        assert!(build_guard("X", &v(&["A"]), &[], Some("#if B")).is_err());
    }
}
