mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Cache, Config, Gateway, Push, Search, Service};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.search.min_query_chars == 0 {
		return Err(Error::Validation {
			message: "search.min_query_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.search.items_per_page == 0 {
		return Err(Error::Validation {
			message: "search.items_per_page must be greater than zero.".to_string(),
		});
	}
	if cfg.search.initial_chunk_size == 0 {
		return Err(Error::Validation {
			message: "search.initial_chunk_size must be greater than zero.".to_string(),
		});
	}
	if cfg.search.initial_chunk_count == 0 {
		return Err(Error::Validation {
			message: "search.initial_chunk_count must be greater than zero.".to_string(),
		});
	}
	// Widened so hostile chunk values cannot overflow before the comparison.
	if u64::from(cfg.search.initial_chunk_size) * u64::from(cfg.search.initial_chunk_count)
		< u64::from(cfg.search.items_per_page)
	{
		return Err(Error::Validation {
			message: "search.initial_chunk_size times search.initial_chunk_count must cover search.items_per_page."
				.to_string(),
		});
	}
	if cfg.cache.ttl_minutes <= 0 {
		return Err(Error::Validation {
			message: "cache.ttl_minutes must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.max_queries == 0 {
		return Err(Error::Validation {
			message: "cache.max_queries must be greater than zero.".to_string(),
		});
	}
	if cfg.gateway.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "gateway.api_base must be non-empty.".to_string(),
		});
	}
	if cfg.gateway.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "gateway.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.push.resolver_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "push.resolver_timeout_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	while cfg.gateway.api_base.ends_with('/') {
		cfg.gateway.api_base.pop();
	}
	if cfg
		.cache
		.path
		.as_deref()
		.map(|path| path.as_os_str().is_empty())
		.unwrap_or(false)
	{
		cfg.cache.path = None;
	}
}
