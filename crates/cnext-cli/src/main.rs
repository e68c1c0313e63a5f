//! cnxc - C-Next to C/C++ transpiler CLI.
//!
//! Thin entry point: parse flags, build an `Options`, hand the real work
//! to `cnext_core::transpile`.

use std::path::PathBuf;
use std::process;

use clap::{Arg, ArgAction, Command};
use cnext_core::config::{find_project_root, load_config, Options};
use cnext_core::fs::OsFileSystem;
use cnext_core::{transpile, TranspileRequest};

fn main() {
    let matches = Command::new("cnxc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("C-Next to C/C++ transpiler")
        .arg(
            Arg::new("inputs")
                .help("C-Next source files to transpile")
                .required(true)
                .num_args(1..),
        )
        .arg(
            Arg::new("include-dir")
                .short('I')
                .long("include-dir")
                .value_name("DIR")
                .action(ArgAction::Append)
                .help("Additional #include search path"),
        )
        .arg(
            Arg::new("out-dir")
                .short('o')
                .long("out-dir")
                .value_name("DIR")
                .help("Output directory for generated bodies"),
        )
        .arg(
            Arg::new("header-out-dir")
                .long("header-out-dir")
                .value_name("DIR")
                .help("Output directory for generated headers"),
        )
        .arg(
            Arg::new("cpp")
                .long("cpp")
                .action(ArgAction::SetTrue)
                .help("Force C++ mode"),
        )
        .arg(
            Arg::new("parse-only")
                .long("parse-only")
                .action(ArgAction::SetTrue)
                .help("Discover, collect, and parse but emit no files"),
        )
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .action(ArgAction::SetTrue)
                .help("Disable the persistent header cache"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Emit [DEBUG] trace lines"),
        )
        .arg(
            Arg::new("target")
                .long("target")
                .value_name("NAME")
                .help("Target platform (selects atomic/critical-region strategy)"),
        )
        .get_matches();

    let inputs: Vec<PathBuf> = matches
        .get_many::<String>("inputs")
        .expect("required")
        .map(PathBuf::from)
        .collect();

    let overrides = Options {
        include_dirs: matches
            .get_many::<String>("include-dir")
            .map(|vs| vs.map(PathBuf::from).collect())
            .unwrap_or_default(),
        out_dir: matches.get_one::<String>("out-dir").map(PathBuf::from),
        header_out_dir: matches.get_one::<String>("header-out-dir").map(PathBuf::from),
        base_path: None,
        cpp_required: matches.get_flag("cpp"),
        parse_only: matches.get_flag("parse-only"),
        no_cache: matches.get_flag("no-cache"),
        debug_mode: matches.get_flag("debug"),
        target: matches.get_one::<String>("target").cloned(),
        preprocess: true,
    };

    let fs = OsFileSystem;
    let start_dir = inputs[0]
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let options = match find_project_root(&fs, &start_dir) {
        Some(root) => load_config(&fs, &root).merge(overrides),
        None => Options::default().merge(overrides),
    };

    let result = transpile(TranspileRequest::Files { inputs, options });

    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
    for error in &result.errors {
        eprintln!("error: {error}");
    }

    if !result.success {
        process::exit(1);
    }
}
