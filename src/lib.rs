//! Build-time compiler for an islands-style-hydration reactive component
//! dialect: JSX-like markup with signals/memos/effects lowered to
//! server-renderable markup plus a minimal client hydration script.
//!
//! # Pipeline (§2)
//! Expression sub-parser ([`expr`]) → type-strip ([`typestrip`]) →
//! analyzer ([`analyzer`], [`scope`]) → IR lowering ([`lowering`]) into
//! the polymorphic tree in [`ir`] → CSS layer prefixer ([`css_prefix`]) →
//! client-JS generator ([`codegen`]) → a pluggable [`adapter`] that
//! renders the IR into a backend template language. [`driver`] strings
//! all of this together per compile unit and handles multi-component
//! files; [`discovery`] and [`cache`] are the ambient multi-file/
//! incremental-build surface around it.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod adapter;
mod analyzer;
mod cache;
mod codegen;
mod css_prefix;
mod discovery;
mod driver;
mod error;
mod expr;
mod ir;
mod lowering;
#[cfg(feature = "napi")]
mod napi_api;
mod scope;
mod typestrip;
mod visitor;

pub use adapter::{AdapterOutput, HtmlAdapter, TemplateAdapter};
pub use analyzer::{analyze, discover_component_names, AnalyzerContext};
pub use cache::IncrementalCache;
pub use discovery::{discover_components, find_component_files, ComponentMetadata};
pub use driver::{compile, compile_async, CompileOptions, CompileResult, FileOutput, FileOutputKind, FileResolver};
pub use error::{CacheError, DiscoveryError, ParseError, ResolverError};
pub use ir::{CompilerError, ComponentIr, IrDump, Severity, TemplateNode};

#[cfg(feature = "napi")]
pub use napi_api::{compile_native, discover_components_native};

#[cfg(feature = "napi")]
#[napi]
pub fn compiler_bridge_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
