use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use filedeck_transport::{Category, LocalFile, RouteTable};
use std::collections::BTreeMap;

/// Check a selection against a route before anything is transferred.
///
/// Checks run file by file in selection order; the first violation wins.
pub(crate) fn validate_selection(routes: &RouteTable, route_name: &str, files: &[LocalFile]) -> Result<()> {
    if files.is_empty() {
        exn::bail!(ErrorKind::EmptySelection);
    }
    let route = routes.get(route_name).ok_or_raise(|| ErrorKind::UnknownRoute(route_name.to_string()))?;
    let mut counts: BTreeMap<Category, u32> = BTreeMap::new();
    for file in files {
        let Some((category, limits)) = route.limits_for(file.category()) else {
            exn::bail!(ErrorKind::UnsupportedType {
                name: file.name().to_string(),
                mime_type: file.mime_type().to_string(),
                route: route_name.to_string(),
            });
        };
        if file.size() > limits.max_file_size.bytes() {
            exn::bail!(ErrorKind::FileTooLarge {
                name: file.name().to_string(),
                size: file.size(),
                limit: limits.max_file_size,
                category,
            });
        }
        let count = counts.entry(category).or_default();
        *count += 1;
        if *count > limits.max_file_count {
            exn::bail!(ErrorKind::TooManyFiles {
                route: route_name.to_string(),
                category,
                max: limits.max_file_count,
            });
        }
    }
    Ok(())
}
