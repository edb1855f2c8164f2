//! Two-pass code generation over a stream of source files.
//!
//! The processor parses each file, extracts its augmenting-code regions,
//! invokes a registered generator per region in source order, merges the
//! results into the tree and serializes the outcome. Generators run once
//! before insertion; a generator that sets `call_again` on its output is
//! invoked a second time after every region's code has been inserted, so
//! it can observe the post-insertion state of the file.
//!
//! Generators share state through two explicit maps on [`ProcessContext`]:
//! the global scope lives for the whole run, the file scope is reset at
//! every file boundary. Files are processed strictly sequentially.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::ast::{stringify, AstBuilder, AstNode, ParseError, SourceAst};
use crate::change::SourceFileDescriptor;
use crate::transform::{
    shift_aug_codes, AstTransformer, AugCode, GeneratedCode, TransformError,
};

static GENERATOR_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").expect("generator name regex"));

/// Errors surfaced by the processing pipeline. Each carries enough context
/// to locate the offending file, and where one exists, the marker line.
#[derive(Debug)]
pub enum ProcessError {
    Parse(ParseError),
    /// Malformed region arguments; aborts the current file.
    Argument {
        src_path: PathBuf,
        source: TransformError,
    },
    /// A missing default marker or an inconsistent region position;
    /// fatal, not retried.
    Configuration {
        src_path: PathBuf,
        source: TransformError,
    },
    /// A generator failed for one region; sibling regions still run.
    Generator {
        src_path: PathBuf,
        line_number: usize,
        snippet: String,
        message: String,
    },
    Hook {
        stage: &'static str,
        message: String,
    },
    Io {
        path: PathBuf,
        source: io::Error,
    },
    UnknownGenerator(String),
    InvalidGeneratorName(String),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::Parse(e) => write!(f, "{}", e),
            ProcessError::Argument { src_path, source } => {
                write!(f, "in {}: {}", src_path.display(), source)
            }
            ProcessError::Configuration { src_path, source } => {
                write!(f, "in {}: {}", src_path.display(), source)
            }
            ProcessError::Generator {
                src_path,
                line_number,
                snippet,
                message,
            } => write!(
                f,
                "in {} at line {} ({:?}): {}",
                src_path.display(),
                line_number,
                snippet,
                message
            ),
            ProcessError::Hook { stage, message } => {
                write!(f, "{} hook failed: {}", stage, message)
            }
            ProcessError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            ProcessError::UnknownGenerator(name) => {
                write!(f, "no generator registered under name {:?}", name)
            }
            ProcessError::InvalidGeneratorName(name) => {
                write!(f, "invalid generator name {:?}", name)
            }
        }
    }
}

impl Error for ProcessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProcessError::Parse(e) => Some(e),
            ProcessError::Argument { source, .. } => Some(source),
            ProcessError::Configuration { source, .. } => Some(source),
            ProcessError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// State visible to generator functions.
pub struct ProcessContext {
    /// Lives for the whole run; mutations are visible across files.
    pub global_scope: Map<String, Value>,
    /// Reset at every file boundary.
    pub file_scope: Map<String, Value>,
    pub src_path: PathBuf,
    /// Ordinal of the region currently being generated, in source order.
    pub aug_code_index: usize,
    /// False during the generation pass, true during the second pass.
    pub generated_code_inserted: bool,
}

impl ProcessContext {
    pub fn new() -> Self {
        let mut global_scope = Map::new();
        global_scope.insert("code_indent".into(), Value::String("    ".into()));
        ProcessContext {
            global_scope,
            file_scope: Map::new(),
            src_path: PathBuf::new(),
            aug_code_index: 0,
            generated_code_inserted: false,
        }
    }
}

impl Default for ProcessContext {
    fn default() -> Self {
        ProcessContext::new()
    }
}

/// What one generator invocation produced.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOutput {
    /// One entry per slot; `None` deletes the slot.
    pub gen_codes: Vec<Option<GeneratedCode>>,
    /// Request a second invocation after all insertions in the file.
    pub call_again: bool,
}

impl GeneratorOutput {
    /// No output and no second invocation; existing slots get deleted.
    pub fn empty() -> Self {
        GeneratorOutput::default()
    }

    pub fn single(gen_code: GeneratedCode) -> Self {
        GeneratorOutput {
            gen_codes: vec![Some(gen_code)],
            call_again: false,
        }
    }

    pub fn of(gen_codes: Vec<Option<GeneratedCode>>) -> Self {
        GeneratorOutput {
            gen_codes,
            call_again: false,
        }
    }

    pub fn call_again(mut self) -> Self {
        self.call_again = true;
        self
    }
}

/// User-supplied generation logic for augmenting-code regions.
pub trait CodeGenerator {
    fn generate(
        &self,
        aug_code: &AugCode,
        context: &mut ProcessContext,
    ) -> Result<GeneratorOutput, Box<dyn Error>>;
}

impl<F> CodeGenerator for F
where
    F: Fn(&AugCode, &mut ProcessContext) -> Result<GeneratorOutput, Box<dyn Error>>,
{
    fn generate(
        &self,
        aug_code: &AugCode,
        context: &mut ProcessContext,
    ) -> Result<GeneratorOutput, Box<dyn Error>> {
        self(aug_code, context)
    }
}

/// Dispatch table from region names to generators.
///
/// The name of a region is the first whitespace-separated token of its
/// marker aftermath. Names are validated against an identifier pattern at
/// registration time; looking up an unregistered name fails with a clear
/// error instead of falling back to any dynamic evaluation.
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Box<dyn CodeGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        GeneratorRegistry::default()
    }

    /// Registers a generator, replacing any previous one of the same name.
    pub fn register(
        &mut self,
        name: &str,
        generator: Box<dyn CodeGenerator>,
    ) -> Result<(), ProcessError> {
        if !GENERATOR_NAME_PATTERN.is_match(name) {
            return Err(ProcessError::InvalidGeneratorName(name.to_string()));
        }
        self.generators.insert(name.to_string(), generator);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn CodeGenerator> {
        self.generators.get(name).map(|g| g.as_ref())
    }
}

impl CodeGenerator for GeneratorRegistry {
    fn generate(
        &self,
        aug_code: &AugCode,
        context: &mut ProcessContext,
    ) -> Result<GeneratorOutput, Box<dyn Error>> {
        let name = aug_code
            .marker_aftermath
            .split_whitespace()
            .next()
            .unwrap_or("");
        let generator = self
            .get(name)
            .ok_or_else(|| Box::new(ProcessError::UnknownGenerator(name.to_string())))?;
        generator.generate(aug_code, context)
    }
}

/// Optional run and file lifecycle callbacks.
///
/// A failing before-all-files hook aborts the run before any file is
/// touched. A failing before-file hook skips that file. Failures of the
/// after hooks are recorded without stopping anything.
pub trait FileHooks {
    fn before_all_files(&mut self, _context: &mut ProcessContext) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
    fn after_all_files(&mut self, _context: &mut ProcessContext) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
    fn before_file(
        &mut self,
        _src_path: &Path,
        _context: &mut ProcessContext,
    ) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
    fn after_file(
        &mut self,
        _src_path: &Path,
        _context: &mut ProcessContext,
    ) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

/// Hooks that do nothing.
pub struct NoHooks;

impl FileHooks for NoHooks {}

/// Result of a processing run: the produced file descriptors plus every
/// recorded non-fatal error.
#[derive(Default)]
pub struct ProcessOutcome {
    pub descriptors: Vec<SourceFileDescriptor>,
    pub errors: Vec<ProcessError>,
}

impl ProcessOutcome {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Drives parsing, generation and serialization for a list of files under
/// one source directory.
pub struct SourceFileProcessor {
    pub builder: AstBuilder,
    pub transformer: AstTransformer,
    /// Progress reporting on stderr, like the original command line runs.
    pub verbose: bool,
}

impl SourceFileProcessor {
    pub fn new(builder: AstBuilder, transformer: AstTransformer) -> Self {
        SourceFileProcessor {
            builder,
            transformer,
            verbose: false,
        }
    }

    /// Processes `files` (paths relative to `src_dir`) sequentially and
    /// returns one descriptor per successfully processed file.
    ///
    /// Per-file errors are recorded on the outcome and processing moves to
    /// the next file; only a before-all-files hook failure aborts the run.
    pub fn process_files<I>(
        &self,
        files: I,
        src_dir: &Path,
        generator: &dyn CodeGenerator,
        hooks: &mut dyn FileHooks,
        context: &mut ProcessContext,
    ) -> Result<ProcessOutcome, ProcessError>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        hooks
            .before_all_files(context)
            .map_err(|e| ProcessError::Hook {
                stage: "before all files",
                message: e.to_string(),
            })?;

        let start_time = Instant::now();
        if self.verbose {
            eprintln!("In directory {}:", src_dir.display());
        }
        let mut outcome = ProcessOutcome::default();
        let mut file_count = 0usize;
        for relative_path in files {
            file_count += 1;
            let src_path = src_dir.join(&relative_path);
            if self.verbose {
                eprintln!("{}. Processing file {}...", file_count, relative_path.display());
            }
            context.src_path = src_path.clone();
            context.file_scope = Map::new();
            context.aug_code_index = 0;
            context.generated_code_inserted = false;

            if let Err(e) = hooks.before_file(&src_path, context) {
                outcome.errors.push(ProcessError::Hook {
                    stage: "before file",
                    message: format!("{}: {}", src_path.display(), e),
                });
                continue;
            }
            match self.process_one_file(&src_path, generator, context, &mut outcome.errors) {
                Ok(content) => outcome.descriptors.push(SourceFileDescriptor {
                    base_dir: Some(src_dir.to_path_buf()),
                    relative_path,
                    content,
                    binary_content: None,
                }),
                Err(e) => outcome.errors.push(e),
            }
            if let Err(e) = hooks.after_file(&src_path, context) {
                outcome.errors.push(ProcessError::Hook {
                    stage: "after file",
                    message: format!("{}: {}", src_path.display(), e),
                });
            }
        }
        if self.verbose {
            eprintln!(
                "Done processing {} files in directory {} in {:.2?}",
                file_count,
                src_dir.display(),
                start_time.elapsed()
            );
        }
        if let Err(e) = hooks.after_all_files(context) {
            outcome.errors.push(ProcessError::Hook {
                stage: "after all files",
                message: e.to_string(),
            });
        }
        Ok(outcome)
    }

    fn process_one_file(
        &self,
        src_path: &Path,
        generator: &dyn CodeGenerator,
        context: &mut ProcessContext,
        errors: &mut Vec<ProcessError>,
    ) -> Result<String, ProcessError> {
        let content = fs::read_to_string(src_path).map_err(|e| ProcessError::Io {
            path: src_path.to_path_buf(),
            source: e,
        })?;
        let mut ast = self
            .builder
            .parse(&content, &src_path.display().to_string())
            .map_err(ProcessError::Parse)?;
        self.apply_transforms(&mut ast, src_path, generator, context, errors)
    }

    /// Runs both generation passes over an already parsed tree and returns
    /// the serialized result.
    pub fn apply_transforms(
        &self,
        ast: &mut SourceAst,
        src_path: &Path,
        generator: &dyn CodeGenerator,
        context: &mut ProcessContext,
        errors: &mut Vec<ProcessError>,
    ) -> Result<String, ProcessError> {
        let mut aug_codes = self
            .transformer
            .extract_aug_codes(ast, 1)
            .map_err(|e| classify_transform_error(src_path, e))?;
        let order = visit_order(&aug_codes);

        // First pass: generate and insert in source order. Each region's
        // edits shift the coordinates of every remaining descriptor.
        context.generated_code_inserted = false;
        let mut call_again_flags = vec![false; order.len()];
        for (ordinal, tree_path) in order.iter().enumerate() {
            context.aug_code_index = ordinal;
            let aug_code = aug_code_at(&aug_codes, tree_path).clone();
            let output = match generator.generate(&aug_code, context) {
                Ok(output) => output,
                Err(e) => {
                    errors.push(generator_error(src_path, ast, &aug_code, e.as_ref()));
                    continue;
                }
            };
            call_again_flags[ordinal] = output.call_again;
            let edits = self
                .transformer
                .apply_generated_codes(ast, &aug_code, &output.gen_codes)
                .map_err(|e| classify_transform_error(src_path, e))?;
            shift_aug_codes(&mut aug_codes, &edits);
        }

        // Second pass: re-invoke the generators that asked for it, now
        // that every region's code is in place. Their outputs are not
        // inserted; the pass exists for inspection and side effects.
        context.generated_code_inserted = true;
        for (ordinal, tree_path) in order.iter().enumerate() {
            if !call_again_flags[ordinal] {
                continue;
            }
            context.aug_code_index = ordinal;
            let aug_code = aug_code_at(&aug_codes, tree_path);
            if let Err(e) = generator.generate(aug_code, context) {
                errors.push(generator_error(src_path, ast, aug_code, e.as_ref()));
            }
        }
        Ok(stringify(ast))
    }
}

fn classify_transform_error(src_path: &Path, e: TransformError) -> ProcessError {
    match e {
        TransformError::InvalidJsonArg { .. } => ProcessError::Argument {
            src_path: src_path.to_path_buf(),
            source: e,
        },
        _ => ProcessError::Configuration {
            src_path: src_path.to_path_buf(),
            source: e,
        },
    }
}

fn generator_error(
    src_path: &Path,
    ast: &SourceAst,
    aug_code: &AugCode,
    e: &dyn Error,
) -> ProcessError {
    ProcessError::Generator {
        src_path: src_path.to_path_buf(),
        line_number: aug_code.line_number,
        snippet: marker_line_snippet(ast, aug_code),
        message: e.to_string(),
    }
}

/// Renders the lead marker line of a region, without its terminator.
fn marker_line_snippet(ast: &SourceAst, aug_code: &AugCode) -> String {
    match ast.node_at(&aug_code.parent_path, aug_code.idx_in_parent) {
        Some(AstNode::DecoratedLine(n)) => {
            format!("{}{}{}", n.indent, n.marker, n.marker_aftermath)
        }
        Some(AstNode::NestedBlock(n)) => {
            format!("{}{}{}", n.indent, n.marker, n.marker_aftermath)
        }
        _ => String::new(),
    }
}

/// Pre-order traversal of a descriptor forest as index paths, stable
/// across coordinate shifts.
fn visit_order(aug_codes: &[AugCode]) -> Vec<Vec<usize>> {
    fn recurse(codes: &[AugCode], prefix: &mut Vec<usize>, order: &mut Vec<Vec<usize>>) {
        for (i, code) in codes.iter().enumerate() {
            prefix.push(i);
            order.push(prefix.clone());
            recurse(&code.children, prefix, order);
            prefix.pop();
        }
    }
    let mut order = Vec::new();
    recurse(aug_codes, &mut Vec::new(), &mut order);
    order
}

fn aug_code_at<'a>(aug_codes: &'a [AugCode], tree_path: &[usize]) -> &'a AugCode {
    let mut code = &aug_codes[tree_path[0]];
    for &i in &tree_path[1..] {
        code = &code.children[i];
    }
    code
}
