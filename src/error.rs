//! Hard-failure tier (§2.1, §7): conditions that mean a compile could not be
//! *attempted* at all, as distinct from `CompilerError` diagnostics (§7),
//! which are data accumulated in a list while the compile still completes.
//! Hard failures propagate with `?` and surface as `Result<T, E>` from the
//! driver's outer entry points and from the discovery/cache modules; they
//! are never mixed into `CompileResult::errors`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("source could not be parsed into an AST: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("failed to read `{path}`: {message}")]
    ReadFailed { path: String, message: String },
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to walk `{root}`: {message}")]
    WalkFailed { root: String, message: String },
    #[error("failed to read `{path}`: {message}")]
    ReadFailed { path: String, message: String },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache entry for `{path}` could not be deserialized: {message}")]
    Corrupt { path: String, message: String },
    #[error("failed to write cache entry for `{path}`: {message}")]
    WriteFailed { path: String, message: String },
}
