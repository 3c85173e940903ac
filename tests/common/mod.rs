#![allow(dead_code)]

pub use rebundle_test_utils::builders;
pub use rebundle_test_utils::{init_tracing, with_timeout};

use std::path::Path;
use std::sync::Arc;

use rebundle::bundle::{BundleCache, ModuleLoader, PackOptions, ResolveOptions, Resolver, artifact_name};
use rebundle::fs::FileSystem;
use rebundle::fs::mock::MockFileSystem;

/// A bundle cache for `entry` reading from `fs`, rooted at `.`.
pub fn mock_cache(fs: &MockFileSystem, entry: &str, debug: bool) -> BundleCache {
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let loader = ModuleLoader::new(
        Arc::clone(&shared),
        Resolver::new(shared, ResolveOptions::default()),
        false,
    );
    BundleCache::new(
        Path::new(entry),
        artifact_name(Path::new(entry)),
        loader,
        PackOptions {
            debug,
            root: ".".into(),
        },
    )
}
