// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gzip → table decompression.

use crate::cohort::table_path;
use crate::error::HarvestError;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Stream-decompress `gz_path` into its sibling `.{extension}` file, then
/// delete `gz_path`. Returns the path of the table.
///
/// On failure the partial table is removed and the compressed file is left
/// in place.
pub fn gunzip_to_table(gz_path: &Path, extension: &str) -> Result<PathBuf, HarvestError> {
    let out_path = table_path(gz_path, extension);

    if let Err(source) = copy_decoded(gz_path, &out_path) {
        let _ = std::fs::remove_file(&out_path);
        return Err(HarvestError::Decompress {
            path: gz_path.to_path_buf(),
            source,
        });
    }
    tracing::info!(
        "Decompressed {} to {}",
        gz_path.display(),
        out_path.display()
    );

    std::fs::remove_file(gz_path)?;
    tracing::info!("Removed {}", gz_path.display());

    Ok(out_path)
}

fn copy_decoded(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut decoder = MultiGzDecoder::new(BufReader::new(File::open(src)?));
    let mut out = BufWriter::new(File::create(dst)?);
    let n = io::copy(&mut decoder, &mut out)?;
    out.flush()?;
    Ok(n)
}
