mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, EmbeddingProviderConfig, Pipeline, PipelineDecay, Providers, Retrieval,
	Service, VectorQueryProviderConfig,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		ParseOrValidate::Parse(source) => Error::ParseConfig { path: path.to_path_buf(), source },
		ParseOrValidate::Validate(err) => err,
	})
}

pub fn from_str(raw: &str) -> Result<Config> {
	parse(raw).map_err(|err| match err {
		ParseOrValidate::Parse(source) =>
			Error::Validation { message: format!("Failed to parse config: {source}") },
		ParseOrValidate::Validate(err) => err,
	})
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}

	match cfg.retrieval.source.as_str() {
		"local" => {},
		"remote" => {
			let Some(vector_query) = cfg.providers.vector_query.as_ref() else {
				return Err(Error::Validation {
					message: "providers.vector_query is required when retrieval.source is remote."
						.to_string(),
				});
			};

			if vector_query.api_key.trim().is_empty() {
				return Err(Error::Validation {
					message: "Provider vector_query api_key must be non-empty.".to_string(),
				});
			}
		},
		_ => {
			return Err(Error::Validation {
				message: "retrieval.source must be one of local or remote.".to_string(),
			});
		},
	}

	if cfg.retrieval.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "retrieval.collection must be non-empty.".to_string(),
		});
	}

	validate_pipeline(&cfg.pipeline)?;

	if cfg.cache.enabled && cfg.cache.max_entries == 0 {
		return Err(Error::Validation {
			message: "cache.max_entries must be greater than zero when enabled.".to_string(),
		});
	}

	Ok(())
}

pub fn validate_pipeline(pipeline: &Pipeline) -> Result<()> {
	if !matches!(pipeline.search_mode.as_str(), "vector" | "keyword" | "hybrid") {
		return Err(Error::Validation {
			message: "pipeline.search_mode must be one of vector, keyword, or hybrid.".to_string(),
		});
	}
	if !matches!(pipeline.summary_mode.as_str(), "append" | "replace") {
		return Err(Error::Validation {
			message: "pipeline.summary_mode must be one of append or replace.".to_string(),
		});
	}
	if pipeline.top_k == 0 {
		return Err(Error::Validation {
			message: "pipeline.top_k must be greater than zero.".to_string(),
		});
	}
	if pipeline.candidate_k < pipeline.top_k {
		return Err(Error::Validation {
			message: "pipeline.candidate_k must be greater than or equal to pipeline.top_k."
				.to_string(),
		});
	}

	for (path, value) in [
		("pipeline.threshold", pipeline.threshold),
		("pipeline.vector_weight", pipeline.vector_weight),
		("pipeline.keyword_weight", pipeline.keyword_weight),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{path} must be a finite number.") });
		}
		if !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{path} must be in the range 0.0-1.0."),
			});
		}
	}

	if !pipeline.group_boost_multiplier.is_finite() || pipeline.group_boost_multiplier <= 0.0 {
		return Err(Error::Validation {
			message: "pipeline.group_boost_multiplier must be a finite number greater than zero."
				.to_string(),
		});
	}
	if pipeline.decay.enabled
		&& (!pipeline.decay.half_life.is_finite() || pipeline.decay.half_life <= 0.0)
	{
		return Err(Error::Validation {
			message: "pipeline.decay.half_life must be a finite number greater than zero."
				.to_string(),
		});
	}

	Ok(())
}

enum ParseOrValidate {
	Parse(toml::de::Error),
	Validate(Error),
}

fn parse(raw: &str) -> std::result::Result<Config, ParseOrValidate> {
	let mut cfg: Config = toml::from_str(raw).map_err(ParseOrValidate::Parse)?;

	normalize(&mut cfg);

	validate(&cfg).map_err(ParseOrValidate::Validate)?;

	Ok(cfg)
}

fn normalize(cfg: &mut Config) {
	cfg.retrieval.source = cfg.retrieval.source.trim().to_ascii_lowercase();
	cfg.pipeline.search_mode = cfg.pipeline.search_mode.trim().to_ascii_lowercase();
	cfg.pipeline.summary_mode = cfg.pipeline.summary_mode.trim().to_ascii_lowercase();

	if cfg
		.providers
		.vector_query
		.as_ref()
		.map(|provider| provider.api_base.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.vector_query = None;
	}
}
