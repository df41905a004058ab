use wfgate_types::ArgumentSet;

use crate::{CacheError, ResultCache};

/// Cache used when caching is switched off: never stores, never finds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledResultCache;

impl ResultCache for DisabledResultCache {
    fn get(&self, _tool_name: &str, _args: &ArgumentSet) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    fn set(&self, _tool_name: &str, _args: &ArgumentSet, _result: &str) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&self, _tool_name: &str) -> Result<u64, CacheError> {
        Ok(0)
    }

    fn purge_expired(&self) -> Result<u64, CacheError> {
        Ok(0)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
