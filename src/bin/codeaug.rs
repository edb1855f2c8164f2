//! Command-line interface for codeaug
//! This binary inspects marker-annotated source files and compares file
//! revisions.
//!
//! Usage:
//!   codeaug check --config `<config>` `<path>`   - Parse a file and verify it re-serializes byte-exactly
//!   codeaug scan --config `<config>` `<path>`    - List augmenting-code regions as JSON
//!   codeaug diff `<old>` `<new>`                 - Print a Unix normal diff of two files

use clap::{Arg, Command};
use std::path::Path;

use codeaug::ast::stringify;
use codeaug::config::MarkerOptions;
use codeaug::diff::print_normal_diff;
use codeaug::lines::split_whole_lines;

fn main() {
    let matches = Command::new("codeaug")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A tool for inspecting marker-annotated source files")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("check")
                .about("Parse a file and verify it re-serializes byte-exactly")
                .arg(config_arg())
                .arg(
                    Arg::new("path")
                        .help("Path to the source file to check")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("scan")
                .about("List augmenting-code regions as JSON")
                .arg(config_arg())
                .arg(
                    Arg::new("path")
                        .help("Path to the source file to scan")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("diff")
                .about("Print a Unix normal diff of two files")
                .arg(
                    Arg::new("old")
                        .help("Path to the original file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("new")
                        .help("Path to the revised file")
                        .required(true)
                        .index(2),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("check", check_matches)) => {
            let config = check_matches.get_one::<String>("config").unwrap();
            let path = check_matches.get_one::<String>("path").unwrap();
            handle_check_command(config, path);
        }
        Some(("scan", scan_matches)) => {
            let config = scan_matches.get_one::<String>("config").unwrap();
            let path = scan_matches.get_one::<String>("path").unwrap();
            handle_scan_command(config, path);
        }
        Some(("diff", diff_matches)) => {
            let old = diff_matches.get_one::<String>("old").unwrap();
            let new = diff_matches.get_one::<String>("new").unwrap();
            handle_diff_command(old, new);
        }
        _ => unreachable!(),
    }
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .help("Path to a marker configuration file (YAML or JSON)")
        .required(true)
}

fn load_config(path: &str) -> MarkerOptions {
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config: {}", e);
        std::process::exit(1);
    });
    let is_json = Path::new(path)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let result = if is_json {
        MarkerOptions::from_json_str(&text)
    } else {
        MarkerOptions::from_yaml_str(&text)
    };
    result.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    })
}

fn read_source(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file: {}", e);
        std::process::exit(1);
    })
}

/// Handle the check command
fn handle_check_command(config: &str, path: &str) {
    let options = load_config(config);
    let (builder, _) = options.build();
    let source = read_source(path);
    let ast = builder.parse(&source, path).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    if stringify(&ast) != source {
        eprintln!("Error: {} does not re-serialize byte-exactly", path);
        std::process::exit(1);
    }
    println!("{}: ok", path);
}

/// Handle the scan command
fn handle_scan_command(config: &str, path: &str) {
    let options = load_config(config);
    let (builder, transformer) = options.build();
    let source = read_source(path);
    let ast = builder.parse(&source, path).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let aug_codes = transformer.extract_aug_codes(&ast, 1).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let json = serde_json::to_string_pretty(&aug_codes).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    println!("{}", json);
}

/// Handle the diff command
fn handle_diff_command(old: &str, new: &str) {
    let old_content = read_source(old);
    let new_content = read_source(new);
    let old_lines = split_whole_lines(&old_content);
    let new_lines = split_whole_lines(&new_content);
    let diff = print_normal_diff(&old_lines, &new_lines);
    print!("{}", diff);
    if !diff.is_empty() {
        std::process::exit(1);
    }
}
