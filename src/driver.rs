//! Compile driver (§6.1, §6.2): the single entry point that strings the
//! passes together — analyzer → IR lowering → CSS layer prefixer →
//! client-JS generator → template adapter — over one source file, and
//! handles the multi-component-per-file split/merge that §6.2 assigns to
//! the driver rather than to any individual pass.
//!
//! Grounded on `parse.rs`'s `parse_full_zen_native`/`compile_zen_internal`
//! end-to-end orchestration (parse → resolve → transform → finalize,
//! diagnostics threaded through every step) and `finalize.rs`'s
//! output-assembly shape (`FinalizedOutput`/`ZenManifestExport`), reframed
//! around the new `ir::ComponentIr`/`analyzer::AnalyzerContext` pipeline
//! and a pluggable `TemplateAdapter` instead of the teacher's single
//! hard-wired HTML renderer.
//!
//! Per §5, a compile unit is one source file; compile units share nothing
//! and may run in parallel. Within a unit the driver owns the error list
//! and appends to it in call order (analyzer, then lowering, then codegen),
//! matching §5's "Shared-resource policy".

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::adapter::TemplateAdapter;
use crate::analyzer::{self, AnalyzerContext};
use crate::codegen;
use crate::css_prefix;
use crate::error::ResolverError;
use crate::ir::{CompilerError, ComponentIr, IrDump, Severity, SourceLocation, INV_TYPE_STRIP_RESIDUAL};
use crate::lowering;
use crate::typestrip;

/// `{ outputIR?, cssLayerPrefix?, adapter }` (§6.1).
pub struct CompileOptions<'a> {
    pub output_ir: bool,
    pub css_layer_prefix: Option<String>,
    pub adapter: &'a dyn TemplateAdapter,
}

/// `type ∈ {markedTemplate, clientJs, ir}` (§6.1 `FileOutput`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutputKind {
    MarkedTemplate,
    ClientJs,
    Ir,
}

/// `{ path, content, type }` (§6.1).
#[derive(Debug, Clone)]
pub struct FileOutput {
    pub path: String,
    pub content: String,
    pub kind: FileOutputKind,
}

/// `{ files[], errors[] }`, the return shape of `compile` (§6.1).
#[derive(Debug, Clone, Default)]
pub struct CompileResult {
    pub files: Vec<FileOutput>,
    pub errors: Vec<CompilerError>,
}

/// The async `readFile(path) → Future<text>` collaborator (§6.1), modeled
/// without an async-runtime dependency the teacher's stack doesn't carry:
/// a boxed `Future` any executor (the embedder's, or `napi`'s own) can
/// drive. Used when the driver needs to resolve a sibling file (e.g. a
/// shared-context module referenced by a provider) during lowering; the
/// current pass set never calls it, but the seam is part of the public
/// contract and is exercised by `compile_async`.
pub trait FileResolver {
    fn read_file(&self, path: &str) -> Pin<Box<dyn Future<Output = Result<String, ResolverError>> + Send>>;
}

fn strip_extension(path: &str) -> &str {
    path.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(path)
}

fn output_path(entry_path: &str, adapter_extension: &str, kind: FileOutputKind) -> String {
    let stem = strip_extension(entry_path);
    match kind {
        FileOutputKind::MarkedTemplate => format!("{stem}.{adapter_extension}"),
        FileOutputKind::ClientJs => format!("{stem}.client.js"),
        FileOutputKind::Ir => format!("{stem}.ir.json"),
    }
}

/// One component's compiled pieces, before the multi-component merge.
struct CompiledComponent {
    ir: ComponentIr,
    template: String,
    client_script: Option<String>,
}

fn compile_one_component(
    source_text: &str,
    file_path: &str,
    component_name: Option<&str>,
    options: &CompileOptions,
) -> Result<CompiledComponent, Vec<CompilerError>> {
    let mut ctx: AnalyzerContext = analyzer::analyze(source_text, file_path, component_name);
    if !ctx.errors.is_empty() && ctx.errors.iter().any(|e| e.severity == Severity::Error) {
        // §7 MalformedComponentShape: compile returns no files for this
        // component; siblings in a multi-component file still compile.
        return Err(ctx.errors);
    }

    let lowered = lowering::lower_component(&ctx);
    let mut errors = ctx.errors.clone();
    errors.extend(lowered.errors);

    let mut ir = ComponentIr {
        component_name: ctx.component_name.clone(),
        file_path: file_path.to_string(),
        root: lowered.root,
        type_definitions: ctx.type_definitions.clone(),
        errors: errors.clone(),
    };

    if let Some(prefix) = &options.css_layer_prefix {
        css_prefix::apply_css_layer_prefix(&mut ir.root, &mut ctx.local_constants, prefix);
    }

    let client_script = codegen::generate_client_script(&ctx, &ir);
    let template = options.adapter.generate(&ir).template;

    // §7 TypeStripResidual: a hard error if any TypeScript-only token
    // survives type-strip into the emitted client script.
    if let Some(script) = &client_script {
        if typestrip::has_type_residual(script) {
            ir.errors.push(CompilerError::error(
                INV_TYPE_STRIP_RESIDUAL,
                "TypeScript-only syntax survived type-strip into the emitted client script".to_string(),
                SourceLocation::default(),
            ));
            return Err(ir.errors);
        }
    }

    Ok(CompiledComponent { ir, template, client_script })
}

/// §6.1 single-file synchronous compile.
pub fn compile(source_text: &str, file_path: &str, options: &CompileOptions) -> CompileResult {
    let names = analyzer::discover_component_names(source_text);

    if names.len() <= 1 {
        let hint = names.first().map(|s| s.as_str());
        return compile_single(source_text, file_path, hint, options);
    }

    compile_multi(source_text, file_path, &names, options)
}

/// §6.1's async form: identical pipeline, available to embedders driving
/// it from an async context (e.g. a `napi` `AsyncTask`). The `resolver` is
/// accepted so the signature matches the spec's external-collaborator
/// contract even though no current pass resolves sibling files.
pub async fn compile_async(
    source_text: &str,
    file_path: &str,
    options: &CompileOptions<'_>,
    _resolver: &dyn FileResolver,
) -> CompileResult {
    compile(source_text, file_path, options)
}

fn compile_single(
    source_text: &str,
    file_path: &str,
    component_name: Option<&str>,
    options: &CompileOptions,
) -> CompileResult {
    let compiled = match compile_one_component(source_text, file_path, component_name, options) {
        Ok(c) => c,
        Err(errors) => return CompileResult { files: vec![], errors },
    };

    let mut files = Vec::new();
    files.push(FileOutput {
        path: output_path(file_path, options.adapter.extension(), FileOutputKind::MarkedTemplate),
        content: compiled.template,
        kind: FileOutputKind::MarkedTemplate,
    });
    if let Some(script) = &compiled.client_script {
        files.push(FileOutput {
            path: output_path(file_path, options.adapter.extension(), FileOutputKind::ClientJs),
            content: script.clone(),
            kind: FileOutputKind::ClientJs,
        });
    }
    if options.output_ir {
        let dump = IrDump::from_ir(&compiled.ir);
        files.push(FileOutput {
            path: output_path(file_path, options.adapter.extension(), FileOutputKind::Ir),
            content: serde_json::to_string_pretty(&dump).unwrap_or_default(),
            kind: FileOutputKind::Ir,
        });
    }

    CompileResult { files, errors: compiled.ir.errors }
}

/// §6.2: each component is compiled independently; its adapter output is
/// parsed into import/type/component line groups by prefix and the groups
/// merged, with import specifiers deduplicated and sorted alphabetically
/// per source. The same merge applies to the generated client scripts,
/// since every script begins with its own `import { ... } from '...'`
/// line that would otherwise be duplicated once per component.
fn compile_multi(
    source_text: &str,
    file_path: &str,
    names: &[String],
    options: &CompileOptions,
) -> CompileResult {
    let mut errors = Vec::new();
    let mut templates = Vec::new();
    let mut scripts = Vec::new();
    let mut ir_dumps = Vec::new();

    for name in names {
        match compile_one_component(source_text, file_path, Some(name.as_str()), options) {
            Ok(compiled) => {
                templates.push(compiled.template);
                if let Some(script) = compiled.client_script {
                    scripts.push(script);
                }
                if options.output_ir {
                    ir_dumps.push(IrDump::from_ir(&compiled.ir));
                }
                errors.extend(compiled.ir.errors);
            }
            Err(component_errors) => errors.extend(component_errors),
        }
    }

    let mut files = Vec::new();
    if !templates.is_empty() {
        files.push(FileOutput {
            path: output_path(file_path, options.adapter.extension(), FileOutputKind::MarkedTemplate),
            content: merge_line_groups(&templates),
            kind: FileOutputKind::MarkedTemplate,
        });
    }
    if !scripts.is_empty() {
        files.push(FileOutput {
            path: output_path(file_path, options.adapter.extension(), FileOutputKind::ClientJs),
            content: merge_line_groups(&scripts),
            kind: FileOutputKind::ClientJs,
        });
    }
    if options.output_ir && !ir_dumps.is_empty() {
        let merged = serde_json::to_string_pretty(&ir_dumps).unwrap_or_default();
        files.push(FileOutput {
            path: output_path(file_path, options.adapter.extension(), FileOutputKind::Ir),
            content: merged,
            kind: FileOutputKind::Ir,
        });
    }

    CompileResult { files, errors }
}

/// Classifies each line of an adapter/codegen output by prefix into an
/// import group, a type group, or a component-body group, then reassembles
/// the three groups in that order: imports first (merged per source,
/// specifiers deduplicated and alphabetically sorted), then type lines,
/// then each component's body text in the order it was compiled.
fn merge_line_groups(pieces: &[String]) -> String {
    // source -> specifiers, preserving insertion order of sources so the
    // merge is stable across runs of the same input.
    let mut import_specifiers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut opaque_imports: Vec<String> = Vec::new();
    let mut type_lines: Vec<String> = Vec::new();
    let mut bodies: Vec<String> = Vec::new();

    for piece in pieces {
        let mut body_lines = Vec::new();
        for line in piece.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("import ") {
                match parse_named_import(trimmed) {
                    Some((source, specifiers)) => {
                        let entry = import_specifiers.entry(source).or_default();
                        for spec in specifiers {
                            if !entry.contains(&spec) {
                                entry.push(spec);
                            }
                        }
                    }
                    None => {
                        if !opaque_imports.contains(&trimmed.to_string()) {
                            opaque_imports.push(trimmed.to_string());
                        }
                    }
                }
            } else if trimmed.starts_with("type ") || trimmed.starts_with("interface ") {
                if !type_lines.contains(&trimmed.to_string()) {
                    type_lines.push(trimmed.to_string());
                }
            } else {
                body_lines.push(line);
            }
        }
        bodies.push(body_lines.join("\n"));
    }

    let mut out = String::new();
    for source in import_specifiers.keys() {
        let mut specs = import_specifiers[source].clone();
        specs.sort();
        out.push_str(&format!("import {{ {} }} from '{}';\n", specs.join(", "), source));
    }
    for line in &opaque_imports {
        out.push_str(line);
        out.push('\n');
    }
    if !type_lines.is_empty() {
        out.push('\n');
        for line in &type_lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    for body in &bodies {
        if body.trim().is_empty() {
            continue;
        }
        out.push('\n');
        out.push_str(body.trim_start_matches('\n'));
        out.push('\n');
    }
    out
}

/// Parses `import { a, b } from 'source';` into `(source, [a, b])`.
/// Anything else (default imports, namespace imports, bare side-effect
/// imports) is left opaque and passed through verbatim, deduplicated.
fn parse_named_import(line: &str) -> Option<(String, Vec<String>)> {
    let open = line.find('{')?;
    let close = line.find('}')?;
    if close < open {
        return None;
    }
    let from_idx = line[close..].find("from")? + close;
    let quote_start = line[from_idx..].find(['\'', '"'])? + from_idx;
    let quote_char = line.as_bytes()[quote_start] as char;
    let rest = &line[quote_start + 1..];
    let quote_end = rest.find(quote_char)?;
    let source = rest[..quote_end].to_string();

    let specifiers = line[open + 1..close]
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Some((source, specifiers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::HtmlAdapter;

    #[test]
    fn static_component_emits_single_marked_template_and_no_script() {
        let source = "function Hello() { return <div>Hi</div>; }";
        let options = CompileOptions { output_ir: false, css_layer_prefix: None, adapter: &HtmlAdapter };
        let result = compile(source, "hello.tsx", &options);
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].kind, FileOutputKind::MarkedTemplate);
        assert_eq!(result.files[0].path, "hello.html");
    }

    #[test]
    fn reactive_component_emits_template_and_client_script() {
        let source = "function Counter() { const [count, setCount] = createSignal(0); return <button onClick={() => setCount(n => n + 1)}>Count: {count()}</button>; }";
        let options = CompileOptions { output_ir: false, css_layer_prefix: None, adapter: &HtmlAdapter };
        let result = compile(source, "counter.tsx", &options);
        assert!(result.files.iter().any(|f| f.kind == FileOutputKind::ClientJs));
        let script = result.files.iter().find(|f| f.kind == FileOutputKind::ClientJs).unwrap();
        assert!(script.content.contains("createSignal"));
        assert!(script.content.contains("initCounter"));
    }

    #[test]
    fn output_ir_option_adds_ir_dump_file() {
        let source = "function Hello() { return <div>Hi</div>; }";
        let options = CompileOptions { output_ir: true, css_layer_prefix: None, adapter: &HtmlAdapter };
        let result = compile(source, "hello.tsx", &options);
        assert!(result.files.iter().any(|f| f.kind == FileOutputKind::Ir && f.path.ends_with(".ir.json")));
    }

    #[test]
    fn merge_line_groups_dedups_and_sorts_imports_per_source() {
        let a = "import { b, a } from 'bf-runtime';\nbody a".to_string();
        let b = "import { c, a } from 'bf-runtime';\nbody b".to_string();
        let merged = merge_line_groups(&[a, b]);
        let import_line = merged.lines().next().unwrap();
        assert_eq!(import_line, "import { a, b, c } from 'bf-runtime';");
        assert!(merged.contains("body a"));
        assert!(merged.contains("body b"));
    }

    #[test]
    fn malformed_component_does_not_crash_and_returns_errors() {
        let source = "const NotAComponent = 5;";
        let options = CompileOptions { output_ir: false, css_layer_prefix: None, adapter: &HtmlAdapter };
        let result = compile(source, "bad.tsx", &options);
        assert!(result.files.is_empty() || !result.errors.is_empty());
    }
}
