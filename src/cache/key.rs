//! Cache key derivation
//!
//! Keys are layered: `{prefix}{version}{domain}|{environment}|{job}[{instance}]-{execution}`.
//! Every layer short of the full key is offered as a restore key, most
//! specific first, so a job falls back to the closest previous state.

use crate::config::schema::CacheConfig;
use sha2::{Digest, Sha256};

/// Bumped whenever the layout of cached content changes incompatibly
pub const CACHE_PROTOCOL_VERSION: &str = "v1-";

/// Environment variables that override individual key components
pub mod vars {
    pub const PREFIX: &str = "GRADLE_CACHE_KEY_PREFIX";
    pub const ENVIRONMENT: &str = "GRADLE_CACHE_KEY_ENVIRONMENT";
    pub const JOB: &str = "GRADLE_CACHE_KEY_JOB";
    pub const JOB_INSTANCE: &str = "GRADLE_CACHE_KEY_JOB_INSTANCE";
    pub const JOB_EXECUTION: &str = "GRADLE_CACHE_KEY_JOB_EXECUTION";
    pub const JOB_MATRIX: &str = "GRADLE_CACHE_JOB_MATRIX";
}

/// A primary key plus its ordered fallbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// The exact key attempted first and used for saving
    pub key: String,
    /// Prefix keys, most specific first
    pub restore_keys: Vec<String>,
}

/// Ordered components identifying a job run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIdentity {
    pub prefix: String,
    pub protocol_version: String,
    pub environment_id: String,
    pub job_id: String,
    pub job_instance_id: String,
    pub job_execution_id: String,
}

impl KeyIdentity {
    /// Build the identity from the process environment
    pub fn from_env(config: &CacheConfig) -> Self {
        Self::from_lookup(config, |name| {
            std::env::var(name).ok().filter(|v| !v.is_empty())
        })
    }

    /// Build the identity from an arbitrary variable lookup
    pub fn from_lookup(config: &CacheConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let prefix = lookup(vars::PREFIX)
            .or_else(|| config.key_prefix.clone())
            .unwrap_or_default();

        let environment_id = lookup(vars::ENVIRONMENT)
            .or_else(|| lookup("RUNNER_OS"))
            .unwrap_or_else(|| std::env::consts::OS.to_string());

        let job_id = lookup(vars::JOB)
            .or_else(|| lookup("GITHUB_JOB"))
            .unwrap_or_else(|| "local".to_string());

        // Distinct matrix legs of one job must never collide
        let job_instance_id = lookup(vars::JOB_INSTANCE).unwrap_or_else(|| {
            let matrix = config
                .job_matrix
                .clone()
                .or_else(|| lookup(vars::JOB_MATRIX))
                .unwrap_or_else(|| "null".to_string());
            hash_strings(&[matrix.as_str()])
        });

        let job_execution_id = lookup(vars::JOB_EXECUTION)
            .or_else(|| lookup("GITHUB_SHA"))
            .unwrap_or_else(|| "local".to_string());

        Self {
            prefix,
            protocol_version: CACHE_PROTOCOL_VERSION.to_string(),
            environment_id,
            job_id,
            job_instance_id,
            job_execution_id,
        }
    }
}

/// Derives cache keys for every domain of one job run
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    identity: KeyIdentity,
    strict_match: bool,
}

impl KeyDerivation {
    pub fn new(identity: KeyIdentity, strict_match: bool) -> Self {
        Self {
            identity,
            strict_match,
        }
    }

    /// `{prefix}{version}{domain}`, the root every key of a domain shares
    pub fn key_base(&self, domain: &str) -> String {
        format!(
            "{}{}{}",
            self.identity.prefix, self.identity.protocol_version, domain
        )
    }

    /// Derive the layered key and fallback keys for a domain
    pub fn derive(&self, domain: &str) -> CacheKey {
        let id = &self.identity;

        let for_environment = format!("{}|{}", self.key_base(domain), id.environment_id);
        let for_job = format!("{}|{}", for_environment, id.job_id);
        let for_instance = format!("{}[{}]", for_job, id.job_instance_id);
        let key = format!("{}-{}", for_instance, id.job_execution_id);

        let restore_keys = if self.strict_match {
            vec![for_instance]
        } else {
            vec![for_instance, for_job, for_environment]
        };

        CacheKey { key, restore_keys }
    }

    /// Key for an extracted entry, `{base}-{digest}`, with no fallbacks
    pub fn extracted_key(&self, artifact_type: &str, digest: &str) -> String {
        format!("{}-{}", self.key_base(artifact_type), digest)
    }
}

/// SHA256 over a sequence of strings, hex encoded
pub fn hash_strings(values: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for value in values {
        hasher.update(value.as_bytes());
        // Separator keeps ["ab", "c"] distinct from ["a", "bc"]
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
