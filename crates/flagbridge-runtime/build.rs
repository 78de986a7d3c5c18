use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Base name of the native engine library inside `FLAGBRIDGE_EMBED_DIR/<platform>/`
const ENGINE_LIB_NAME: &str = "flagbridge_engine";

fn main() {
    println!("cargo:rustc-check-cfg=cfg(flagbridge_embedded)");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=FLAGBRIDGE_EMBED_DIR");

    let os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_else(|_| "unknown".into());
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_else(|_| "unknown".into());
    let target_env = env::var("CARGO_CFG_TARGET_ENV").unwrap_or_default();

    let platform = platform_key(&os, &arch, &target_env);
    println!("cargo:rustc-env=FLAGBRIDGE_EMBED_PLATFORM={platform}");
    println!("cargo:rustc-env=FLAGBRIDGE_RUSTC_VERSION={}", rustc_version());

    let Some(embed_dir) = env::var_os("FLAGBRIDGE_EMBED_DIR") else {
        return;
    };

    let candidate = PathBuf::from(embed_dir)
        .join(&platform)
        .join(library_file_name(&os));
    println!("cargo:rerun-if-changed={}", candidate.display());

    if !candidate.is_file() {
        println!(
            "cargo:warning=no embedded engine for {platform} at {}",
            candidate.display()
        );
        return;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let dest = out_dir.join("embedded_engine.bin");
    copy_library(&candidate, &dest);
    println!("cargo:rustc-cfg=flagbridge_embedded");
}

/// `<os>-<arch>` plus `-musl` for musl targets
fn platform_key(os: &str, arch: &str, target_env: &str) -> String {
    if target_env == "musl" {
        format!("{os}-{arch}-musl")
    } else {
        format!("{os}-{arch}")
    }
}

fn library_file_name(os: &str) -> String {
    match os {
        "windows" => format!("{ENGINE_LIB_NAME}.dll"),
        "macos" | "ios" => format!("lib{ENGINE_LIB_NAME}.dylib"),
        _ => format!("lib{ENGINE_LIB_NAME}.so"),
    }
}

fn copy_library(from: &Path, to: &Path) {
    if let Err(err) = fs::copy(from, to) {
        panic!(
            "failed to copy embedded engine {} -> {}: {err}",
            from.display(),
            to.display()
        );
    }
}

fn rustc_version() -> String {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".into());
    Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".into())
}
