//! Store statistics

use std::collections::BTreeMap;

use serde::Serialize;

use crate::record::RecordHeader;

/// Record counts by module and function
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of readable records
    pub total_records: usize,
    /// Number of distinct modules
    pub total_modules: usize,
    /// Number of distinct `module.function` pairs
    pub total_functions: usize,
    /// Records per module
    pub by_module: BTreeMap<String, usize>,
    /// Records per `module.function`
    pub by_function: BTreeMap<String, usize>,
    /// Record files whose metadata could not be read
    pub unreadable: usize,
}

impl StoreStats {
    pub(crate) fn from_headers<'a, I>(headers: I, unreadable: usize) -> Self
    where
        I: IntoIterator<Item = &'a RecordHeader>,
    {
        let mut stats = StoreStats {
            unreadable,
            ..Default::default()
        };
        for header in headers {
            stats.total_records += 1;
            *stats.by_module.entry(header.module.clone()).or_default() += 1;
            *stats
                .by_function
                .entry(format!("{}.{}", header.module, header.function))
                .or_default() += 1;
        }
        stats.total_modules = stats.by_module.len();
        stats.total_functions = stats.by_function.len();
        stats
    }
}
