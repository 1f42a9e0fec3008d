//! NAPI surface (§6.1): thin JSON-in/JSON-out wrappers over the pure-Rust
//! `driver::compile`, consolidated into one module instead of the
//! teacher's pattern of an `#[napi]` function living next to the pass it
//! wraps (`parse.rs`'s `parse_full_zen_native`, `discovery.rs`'s
//! `discover_components_native`, `extract_styles_native`, …). Every
//! function here does exactly one thing: deserialize the JS-facing
//! options object, call the native API, serialize the result. No
//! compiler logic lives in this file.
//!
//! Only the reference `HtmlAdapter` is reachable from JS — an embedder
//! wanting a different `TemplateAdapter` links against the crate natively
//! instead of through this boundary, since `#[napi]` functions can't take
//! a trait object across the FFI edge.

use napi_derive::napi;
use serde::{Deserialize, Serialize};

use crate::adapter::HtmlAdapter;
use crate::discovery;
use crate::driver::{self, CompileOptions, FileOutputKind};
use crate::ir::CompilerError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptionsNative {
    pub output_ir: Option<bool>,
    pub css_layer_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum FileOutputKindNative {
    MarkedTemplate,
    ClientJs,
    Ir,
}

impl From<FileOutputKind> for FileOutputKindNative {
    fn from(kind: FileOutputKind) -> Self {
        match kind {
            FileOutputKind::MarkedTemplate => FileOutputKindNative::MarkedTemplate,
            FileOutputKind::ClientJs => FileOutputKindNative::ClientJs,
            FileOutputKind::Ir => FileOutputKindNative::Ir,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutputNative {
    pub path: String,
    pub content: String,
    pub kind: FileOutputKindNative,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResultNative {
    pub files: Vec<FileOutputNative>,
    pub errors: Vec<CompilerError>,
}

/// `compile(sourceText, filePath, options) → { files[], errors[] }` (§6.1),
/// fixed to the reference `HtmlAdapter` since a JS-supplied adapter can't
/// cross the NAPI boundary as a trait object.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_native(
    source_text: String,
    file_path: String,
    options_json: String,
) -> napi::Result<serde_json::Value> {
    let opts: CompileOptionsNative = serde_json::from_str(&options_json)
        .map_err(|e| napi::Error::from_reason(format!("options parse error: {e}")))?;

    let options = CompileOptions {
        output_ir: opts.output_ir.unwrap_or(false),
        css_layer_prefix: opts.css_layer_prefix,
        adapter: &HtmlAdapter,
    };

    let result = driver::compile(&source_text, &file_path, &options);
    let native = CompileResultNative {
        files: result
            .files
            .into_iter()
            .map(|f| FileOutputNative { path: f.path, content: f.content, kind: f.kind.into() })
            .collect(),
        errors: result.errors,
    };

    serde_json::to_value(&native)
        .map_err(|e| napi::Error::from_reason(format!("result serialize error: {e}")))
}

/// `discoverComponents(rootDir) → ComponentMetadata[]` for a project-wide
/// registry, ahead of compiling anything (mirrors the teacher's
/// `discover_components_native`).
#[cfg(feature = "napi")]
#[napi]
pub fn discover_components_native(root_dir: String) -> napi::Result<serde_json::Value> {
    let metadata = discovery::discover_components(&root_dir)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(
        &metadata
            .into_iter()
            .map(|m| {
                serde_json::json!({
                    "name": m.name,
                    "path": m.path,
                    "signalNames": m.signal_names,
                    "memoNames": m.memo_names,
                    "propNames": m.prop_names,
                    "isClientOnly": m.is_client_only,
                })
            })
            .collect::<Vec<_>>(),
    )
    .map_err(|e| napi::Error::from_reason(format!("result serialize error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_options_native_defaults_to_no_ir_and_no_prefix() {
        let opts: CompileOptionsNative = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.output_ir, None);
        assert_eq!(opts.css_layer_prefix, None);
    }
}
