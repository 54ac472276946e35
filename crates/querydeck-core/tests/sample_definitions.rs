//! Checks that the definitions shipped in the repository's `cfg/`
//! directory load cleanly and build a complete catalog.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use querydeck_core::{Catalog, DataSourceExecutor, ExecuteError, RefreshCoordinator, load_definitions};
use querydeck_types::ResultSet;

struct NoDatabase;

#[async_trait]
impl DataSourceExecutor for NoDatabase {
    async fn execute(&self, source_name: &str, _query: &str) -> Result<ResultSet, ExecuteError> {
        Err(ExecuteError::UnknownSource(source_name.to_owned()))
    }
}

fn sample_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../cfg")
}

#[test]
fn sample_definitions_load_without_diagnostics() {
    let defs = load_definitions(&sample_dir()).unwrap();
    assert!(defs.diagnostics.is_empty(), "{:?}", defs.diagnostics);
    assert_eq!(defs.data_sources.len(), 1);

    let (catalog, problems) = Catalog::from_definitions(
        defs.queries,
        defs.consumers,
        RefreshCoordinator::new(Arc::new(NoDatabase)),
    );
    assert!(problems.is_empty(), "{problems:?}");
    assert_eq!(catalog.query_count(), 1);
    assert_eq!(
        catalog.list_consumer_names(),
        vec!["east_sales", "east_sales_series"]
    );
}
