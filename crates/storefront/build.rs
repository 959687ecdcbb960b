//! Stamps the stylesheet with a content hash so `base.html` can link
//! `main.css?v=<hash>` and browsers refetch it only when it changes.

use std::env;
use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

fn main() {
    let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:rustc-env=STYLESHEET_VERSION=dev");
        return;
    };
    let stylesheet = PathBuf::from(manifest_dir).join("static/css/main.css");
    println!("cargo:rerun-if-changed={}", stylesheet.display());

    let version = match fs::read(&stylesheet) {
        Ok(content) => {
            let digest = format!("{:x}", Sha256::digest(&content));
            digest.chars().take(10).collect::<String>()
        }
        Err(e) => {
            println!("cargo:warning=Could not read {}: {e}", stylesheet.display());
            "dev".to_string()
        }
    };

    println!("cargo:rustc-env=STYLESHEET_VERSION={version}");
}
