#![allow(dead_code)]

use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

/// Build an in-memory zip. `None` content marks a directory entry.
pub fn zip_bytes(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in entries {
        match content {
            None => writer
                .add_directory(*name, zip::write::SimpleFileOptions::default())
                .expect("directory entry should be written"),
            Some(bytes) => {
                let options =
                    zip::write::SimpleFileOptions::default().unix_permissions(0o755);
                writer
                    .start_file(*name, options)
                    .expect("file entry should be started");
                writer
                    .write_all(bytes)
                    .expect("file entry should be written");
            }
        }
    }
    writer
        .finish()
        .expect("zip archive should be finalized")
        .into_inner()
}

/// A source archive shaped like a hosting-service zipball.
pub fn source_zipball(wrapper: &str) -> Vec<u8> {
    let root = format!("{wrapper}/");
    let main = format!("{wrapper}/main");
    let docs = format!("{wrapper}/docs/");
    let readme = format!("{wrapper}/docs/README.md");
    zip_bytes(&[
        (&root, None),
        (&main, Some(b"#!/bin/sh\necho new\n")),
        (&docs, None),
        (&readme, Some(b"# docs")),
    ])
}

pub fn release_json(tag: &str, server_uri: &str, assets: &[&str]) -> Value {
    let assets: Vec<Value> = assets
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "browser_download_url": format!("{server_uri}/download/{name}"),
            })
        })
        .collect();
    json!({
        "tag_name": tag,
        "zipball_url": format!("{server_uri}/repos/owner/app/zipball/{tag}"),
        "assets": assets,
    })
}

pub fn tag_json(name: &str, server_uri: &str) -> Value {
    json!({
        "name": name,
        "zipball_url": format!("{server_uri}/repos/owner/app/zipball/{name}"),
        "commit": { "sha": "0123456789abcdef" },
    })
}

/// Every path below `root`, relative to it.
pub fn walk(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).expect("directory should be readable") {
            let path = entry.expect("entry should be readable").path();
            found.push(
                path.strip_prefix(root)
                    .expect("entry should be below root")
                    .to_path_buf(),
            );
            if path.is_dir() {
                pending.push(path);
            }
        }
    }
    found.sort();
    found
}
