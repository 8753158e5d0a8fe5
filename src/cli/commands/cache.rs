//! Cache Command
//!
//! Clears stored LLM responses.

use crate::cache::create_cache;
use crate::cli::ui::Output;
use crate::config::{CacheBackend, ConfigLoader};
use crate::types::Result;

pub fn clear() -> Result<()> {
    let config = ConfigLoader::load()?;
    let output = Output::new();

    if config.cache.backend == CacheBackend::Memory {
        output.info("Memory cache lives only for one run; nothing to clear");
        return Ok(());
    }

    let cache = create_cache(&config.cache)?;
    let entries = cache.stats().entries;
    cache.clear()?;
    output.success(&format!("Cleared {} cached responses", entries));
    Ok(())
}
