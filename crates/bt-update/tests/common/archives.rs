//! Release archive builders

#![allow(dead_code)]

use bt_update::download::sha256_hex;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Cursor, Write};

/// Gzip-compressed tarball holding the given files
pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, name, data.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Zip archive holding the given files
pub fn zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Release archive with `bt` inside a target-named folder, as CI publishes it
pub fn release_archive(binary: &str) -> Vec<u8> {
    tar_gz(&[
        ("bt-x86_64-unknown-linux-gnu/bt", binary),
        ("bt-x86_64-unknown-linux-gnu/LICENSE", "MIT"),
    ])
}

/// `sha256sum` output for an archive
pub fn checksum_file(bytes: &[u8], archive_name: &str) -> String {
    format!("{}  {}\n", sha256_hex(bytes), archive_name)
}
