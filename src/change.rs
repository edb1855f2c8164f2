//! Change detection over processed source files.
//!
//! Compares each produced file against the copy on disk, writes changed
//! outputs into a destination directory grouped by sanitized base
//! directory names, and records three reports: every file seen, every file
//! that changed, and a Unix normal diff per change.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diff::{print_normal_diff, EOL};
use crate::lines::{modify_name_to_be_absent, split_whole_lines};

/// Report listing every file that was not skipped.
pub const OUTPUT_SUMMARY_FILE_NAME: &str = "OUTPUT-SUMMARY.txt";

/// Report listing only the files that changed.
pub const CHANGE_SUMMARY_FILE_NAME: &str = "CHANGE-SUMMARY.txt";

/// Report holding a normal diff for each changed file.
pub const CHANGE_DETAILS_FILE_NAME: &str = "CHANGE-DETAILS.txt";

static FILE_NAME_SANITIZER: Lazy<Regex> =
    Lazy::new(|| Regex::new("[^a-zA-Z0-9_-]").expect("file name sanitizer regex"));

#[derive(Debug)]
pub enum ChangeError {
    Io { path: PathBuf, source: io::Error },
    InvalidPath(String),
}

impl fmt::Display for ChangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeError::Io { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
            ChangeError::InvalidPath(msg) => write!(f, "invalid path: {}", msg),
        }
    }
}

impl std::error::Error for ChangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChangeError::Io { source, .. } => Some(source),
            ChangeError::InvalidPath(_) => None,
        }
    }
}

fn io_err(path: &Path, source: io::Error) -> ChangeError {
    ChangeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One file produced by processing, to be compared with the original.
#[derive(Debug, Clone, Default)]
pub struct SourceFileDescriptor {
    pub base_dir: Option<PathBuf>,
    pub relative_path: PathBuf,
    /// Textual content; consulted when `binary_content` is absent.
    pub content: String,
    pub binary_content: Option<Vec<u8>>,
}

/// A source path split into a base directory and the path below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileLocation {
    pub base_dir: PathBuf,
    pub relative_path: PathBuf,
}

/// Resolves a possibly relative source location to an absolute base
/// directory and relative path pair.
pub fn normalize_src_file_loc(
    base_dir: Option<&Path>,
    relative_path: &Path,
) -> Result<SourceFileLocation, ChangeError> {
    if relative_path.as_os_str().is_empty() {
        return Err(ChangeError::InvalidPath(
            "no relative (or absolute) path provided".into(),
        ));
    }
    let abs_base = match base_dir {
        Some(d) => Some(std::path::absolute(d).map_err(|e| io_err(d, e))?),
        None => None,
    };
    let full_path = match &abs_base {
        Some(d) => std::path::absolute(d.join(relative_path)),
        None => std::path::absolute(relative_path),
    }
    .map_err(|e| io_err(relative_path, e))?;
    split_file_path(&full_path, abs_base.as_deref())
}

fn split_file_path(
    full_path: &Path,
    base_dir: Option<&Path>,
) -> Result<SourceFileLocation, ChangeError> {
    if let Some(bd) = base_dir {
        if let Ok(rel) = full_path.strip_prefix(bd) {
            if !rel.as_os_str().is_empty() {
                return Ok(SourceFileLocation {
                    base_dir: bd.to_path_buf(),
                    relative_path: rel.to_path_buf(),
                });
            }
        }
    }
    let parent = full_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| {
            ChangeError::InvalidPath(format!(
                "missing directory in file path: {}",
                full_path.display()
            ))
        })?;
    let name = full_path.file_name().ok_or_else(|| {
        ChangeError::InvalidPath(format!("missing file name in path: {}", full_path.display()))
    })?;
    Ok(SourceFileLocation {
        base_dir: parent.to_path_buf(),
        relative_path: PathBuf::from(name),
    })
}

/// Derives a directory name usable on any filesystem from the last segment
/// of a path, dropping every character outside `[a-zA-Z0-9_-]`.
pub fn generate_valid_file_name(p: &Path) -> String {
    let name = p
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let trimmed = FILE_NAME_SANITIZER.replace_all(&name, "").into_owned();
    if trimmed.is_empty() {
        "c".to_string()
    } else {
        trimmed
    }
}

/// Compares supplied file contents against their on-disk originals and
/// materializes the changed ones under a destination directory.
///
/// When change detection is disabled every supplied file counts as
/// changed, which turns the detective into a plain output writer.
pub struct CodeChangeDetective {
    pub dest_dir: Option<PathBuf>,
    /// Remove and recreate `dest_dir` before the run.
    pub clean_dest_dir: bool,
    pub code_change_detection_disabled: bool,
    /// Overrides for the three report locations; each defaults to a well
    /// known file name inside `dest_dir`.
    pub output_summary_path: Option<PathBuf>,
    pub change_summary_path: Option<PathBuf>,
    pub change_details_path: Option<PathBuf>,
    /// When set, per-file errors are reported here and processing
    /// continues; otherwise the first per-file error aborts the run.
    #[allow(clippy::type_complexity)]
    pub error_log: Option<Box<dyn FnMut(&ChangeError, &str)>>,
}

impl Default for CodeChangeDetective {
    fn default() -> Self {
        CodeChangeDetective {
            dest_dir: None,
            clean_dest_dir: true,
            code_change_detection_disabled: false,
            output_summary_path: None,
            change_summary_path: None,
            change_details_path: None,
            error_log: None,
        }
    }
}

impl CodeChangeDetective {
    /// Runs detection over the supplied descriptors and reports whether
    /// any change was seen.
    pub fn execute<I>(&mut self, supplier: I) -> Result<bool, ChangeError>
    where
        I: IntoIterator<Item = SourceFileDescriptor>,
    {
        let mut output_summary_path = self.output_summary_path.clone();
        let mut change_summary_path = None;
        let mut change_details_path = None;
        if !self.code_change_detection_disabled {
            change_summary_path = self.change_summary_path.clone();
            change_details_path = self.change_details_path.clone();
        }
        if let Some(dest_dir) = &self.dest_dir {
            if output_summary_path.is_none() {
                output_summary_path = Some(dest_dir.join(OUTPUT_SUMMARY_FILE_NAME));
            }
            if !self.code_change_detection_disabled {
                if change_summary_path.is_none() {
                    change_summary_path = Some(dest_dir.join(CHANGE_SUMMARY_FILE_NAME));
                }
                if change_details_path.is_none() {
                    change_details_path = Some(dest_dir.join(CHANGE_DETAILS_FILE_NAME));
                }
            }
            if self.clean_dest_dir {
                match fs::remove_dir_all(dest_dir) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(io_err(dest_dir, e)),
                }
                fs::create_dir_all(dest_dir).map_err(|e| io_err(dest_dir, e))?;
            }
        }

        let mut output_summary_writer = open_writer(output_summary_path.as_deref())?;
        let mut change_summary_writer = open_writer(change_summary_path.as_deref())?;
        let mut change_diff_writer = open_writer(change_details_path.as_deref())?;

        let mut dest_sub_dir_names: HashMap<PathBuf, String> = HashMap::new();
        let mut code_change_detected = false;
        for (item_idx, descriptor) in supplier.into_iter().enumerate() {
            let outcome = self.process_one(
                &descriptor,
                &mut dest_sub_dir_names,
                &mut output_summary_writer,
                &mut change_summary_writer,
                &mut change_diff_writer,
            );
            match outcome {
                Ok(changed) => code_change_detected |= changed,
                Err(e) => match &mut self.error_log {
                    Some(log) => {
                        log(&e, &format!("error processing item {}", item_idx));
                    }
                    None => return Err(e),
                },
            }
        }

        flush_writer(&mut output_summary_writer, output_summary_path.as_deref())?;
        flush_writer(&mut change_summary_writer, change_summary_path.as_deref())?;
        flush_writer(&mut change_diff_writer, change_details_path.as_deref())?;
        Ok(code_change_detected)
    }

    fn process_one(
        &self,
        descriptor: &SourceFileDescriptor,
        dest_sub_dir_names: &mut HashMap<PathBuf, String>,
        output_summary_writer: &mut Option<BufWriter<File>>,
        change_summary_writer: &mut Option<BufWriter<File>>,
        change_diff_writer: &mut Option<BufWriter<File>>,
    ) -> Result<bool, ChangeError> {
        let src_file_loc =
            normalize_src_file_loc(descriptor.base_dir.as_deref(), &descriptor.relative_path)?;
        let src_path = src_file_loc.base_dir.join(&src_file_loc.relative_path);
        // Fail early on unreadable sources.
        File::open(&src_path).map_err(|e| io_err(&src_path, e))?;

        let mut src_file_unchanged = false;
        let mut original_content = String::new();
        let mut changed = false;
        if !self.code_change_detection_disabled {
            if let Some(binary) = &descriptor.binary_content {
                let original = fs::read(&src_path).map_err(|e| io_err(&src_path, e))?;
                src_file_unchanged = *binary == original;
            } else {
                original_content =
                    fs::read_to_string(&src_path).map_err(|e| io_err(&src_path, e))?;
                src_file_unchanged = descriptor.content == original_content;
            }
            changed = !src_file_unchanged;
        }

        let mut dest_path: Option<PathBuf> = None;
        if let Some(dest_dir) = &self.dest_dir {
            if !src_file_unchanged {
                let sub_dir_name = match dest_sub_dir_names.get(&src_file_loc.base_dir) {
                    Some(name) => name.clone(),
                    None => {
                        let candidate = generate_valid_file_name(&src_file_loc.base_dir);
                        let taken: Vec<String> = dest_sub_dir_names.values().cloned().collect();
                        let name = modify_name_to_be_absent(&taken, &candidate);
                        dest_sub_dir_names.insert(src_file_loc.base_dir.clone(), name.clone());
                        name
                    }
                };
                let target = dest_dir
                    .join(&sub_dir_name)
                    .join(&src_file_loc.relative_path);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
                }
                if let Some(binary) = &descriptor.binary_content {
                    fs::write(&target, binary).map_err(|e| io_err(&target, e))?;
                } else {
                    fs::write(&target, &descriptor.content).map_err(|e| io_err(&target, e))?;
                }
                dest_path = Some(target);
            }
        }

        let dest_display = dest_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        if let Some(writer) = output_summary_writer {
            // The destination entry is empty for unchanged files.
            let entry = format!("{}{}{}{}", src_path.display(), EOL, dest_display, EOL);
            writer
                .write_all(entry.as_bytes())
                .map_err(|e| io_err(&src_path, e))?;
        }
        if let Some(dest) = &dest_path {
            if let Some(writer) = change_summary_writer {
                let entry = format!("{}{}{}{}", src_path.display(), EOL, dest.display(), EOL);
                writer
                    .write_all(entry.as_bytes())
                    .map_err(|e| io_err(&src_path, e))?;
            }
            if let Some(writer) = change_diff_writer {
                let header = format!(
                    "{}--- {}{}+++ {}{}",
                    EOL,
                    src_path.display(),
                    EOL,
                    dest.display(),
                    EOL
                );
                writer
                    .write_all(header.as_bytes())
                    .map_err(|e| io_err(&src_path, e))?;
                if descriptor.binary_content.is_some() {
                    let notice = format!("{}Binary files differ{}", EOL, EOL);
                    writer
                        .write_all(notice.as_bytes())
                        .map_err(|e| io_err(&src_path, e))?;
                } else {
                    if original_content.is_empty() {
                        original_content =
                            fs::read_to_string(&src_path).map_err(|e| io_err(&src_path, e))?;
                    }
                    let original = split_whole_lines(&original_content);
                    let revised = split_whole_lines(&descriptor.content);
                    let change_diff = print_normal_diff(&original, &revised);
                    writer
                        .write_all(change_diff.as_bytes())
                        .map_err(|e| io_err(&src_path, e))?;
                }
            }
        }
        Ok(changed)
    }
}

fn open_writer(path: Option<&Path>) -> Result<Option<BufWriter<File>>, ChangeError> {
    match path {
        Some(p) => {
            let file = File::create(p).map_err(|e| io_err(p, e))?;
            Ok(Some(BufWriter::new(file)))
        }
        None => Ok(None),
    }
}

fn flush_writer(
    writer: &mut Option<BufWriter<File>>,
    path: Option<&Path>,
) -> Result<(), ChangeError> {
    if let Some(w) = writer {
        w.flush()
            .map_err(|e| io_err(path.unwrap_or(Path::new("")), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_valid_file_name() {
        assert_eq!(generate_valid_file_name(Path::new("/home/user/my proj")), "myproj");
        assert_eq!(generate_valid_file_name(Path::new("/a/b/src-1_x")), "src-1_x");
        assert_eq!(generate_valid_file_name(Path::new("/")), "c");
        assert_eq!(generate_valid_file_name(Path::new("/x/%$#")), "c");
    }

    #[test]
    fn test_split_file_path_with_base_dir() {
        let loc = split_file_path(Path::new("/base/dir/a/b.txt"), Some(Path::new("/base/dir")))
            .unwrap();
        assert_eq!(loc.base_dir, Path::new("/base/dir"));
        assert_eq!(loc.relative_path, Path::new("a/b.txt"));
    }

    #[test]
    fn test_split_file_path_without_base_dir() {
        let loc = split_file_path(Path::new("/base/dir/b.txt"), None).unwrap();
        assert_eq!(loc.base_dir, Path::new("/base/dir"));
        assert_eq!(loc.relative_path, Path::new("b.txt"));
    }

    #[test]
    fn test_split_file_path_outside_base_dir() {
        let loc =
            split_file_path(Path::new("/elsewhere/b.txt"), Some(Path::new("/base/dir"))).unwrap();
        assert_eq!(loc.base_dir, Path::new("/elsewhere"));
        assert_eq!(loc.relative_path, Path::new("b.txt"));
    }

    #[test]
    fn test_normalize_rejects_empty_path() {
        assert!(matches!(
            normalize_src_file_loc(None, Path::new("")),
            Err(ChangeError::InvalidPath(_))
        ));
    }
}
