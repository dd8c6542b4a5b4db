use std::{env, fs, path::PathBuf};

// Bundles the demo supergraph so tests can locate it through `OUT_SCHEMAS`.
fn main() {
    println!("cargo:rerun-if-changed=schemas");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let out_schemas = out_dir.join("schemas");
    println!("cargo:rustc-env=OUT_SCHEMAS={}", out_schemas.display());
    fs::create_dir_all(&out_schemas).expect("failed to create schema output directory");

    for entry in fs::read_dir("schemas").expect("schemas directory is missing") {
        let path = entry.expect("failed to read schemas directory").path();
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if path.is_file() {
            fs::copy(&path, out_schemas.join(file_name)).expect("failed to copy schema file");
        }
    }
}
