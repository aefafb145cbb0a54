//! Gradle build state caching
//!
//! Saves and restores the Gradle User Home and the project `.gradle`
//! directory as immutable, keyed cache entries.
//!
//! # Key Model
//!
//! - Keys layer `prefix + version + domain | environment | job [instance] - execution`
//! - Restore tries the exact key, then each less specific prefix
//! - Entries are immutable; an exact hit is never saved again
//! - Shared artifacts are extracted into content- or name-keyed entries
//!
//! # Domain Phases
//!
//! | Phase | Step | Output |
//! |-------|------|--------|
//! | Restore | `restore` command | handoff state file |
//! | Save | `save` command | report |

pub mod cleaner;
pub mod domain;
pub mod extract;
pub mod handoff;
pub mod hash;
pub mod key;
pub mod local;
pub mod orchestrator;
pub mod provider;
pub mod report;

pub use cleaner::CacheCleaner;
pub use domain::{GradleHomeDomain, ProjectDomain};
pub use extract::{EntryExtractor, ExtractedEntry};
pub use handoff::{DomainState, PhaseState};
pub use hash::ContentHasher;
pub use key::{CacheKey, KeyDerivation, KeyIdentity};
pub use local::LocalCacheProvider;
pub use orchestrator::{CacheContext, CacheDomain, CacheOptions, CacheOrchestrator};
pub use provider::{CacheProvider, ProviderError, StoredEntry};
pub use report::{format_bytes, CacheEntryReport, CacheReport};
