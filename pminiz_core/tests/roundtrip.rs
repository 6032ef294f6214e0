//! Whole-job round-trip coverage through the public API (spec.md §8):
//! boundary sizes, directory preservation, disambiguation, and the
//! independence-of-parallelism property. Exercises `job::run` against a
//! real temp directory rather than spawning the built binary, since the
//! toolchain is not invoked in this pass.

use std::fs;

use flate2::Compression;
use pminiz_core::config::{JobConfig, Mode, Verbosity};
use pminiz_core::{fastpath, job};
use tempfile::tempdir;

/// Builds a `JobConfig` directly rather than through `JobConfig::new`'s
/// validated constructor, so tests can use block sizes below the
/// production minimum without tripping the range check.
fn cfg(mode: Mode, block_size: u64, workers: Option<usize>) -> JobConfig {
    JobConfig {
        mode,
        block_size: block_size as usize,
        workers,
        verbosity: Verbosity::Silent,
        compression_level: Compression::default(),
    }
}

/// Round-trips `data` through the fast-path container directly, bypassing
/// the filesystem — used for the boundary sizes where only the container
/// shape (block_count, trailing block length) matters.
fn roundtrip_small(data: &[u8]) -> Vec<u8> {
    let container = fastpath::compress_small(data, Compression::default()).unwrap();
    fastpath::decompress_small(&container).unwrap()
}

#[test]
fn boundary_sizes_roundtrip_exactly() {
    let block = 1024usize;
    let sizes = [0usize, 1, block - 1, block, block + 1, 2 * block, 2 * block - 1, 100 * block];
    for size in sizes {
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        assert_eq!(roundtrip_small(&data), data, "round-trip failed for size {size}");
    }
}

#[test]
fn two_mib_plus_remainder_yields_two_blocks_with_correct_tail() {
    let block = 2 * 1024 * 1024usize;
    let data: Vec<u8> = (0..block + 100)
        .map(|i| if i % 2 == 0 { b'a' } else { b'b' })
        .collect();

    let workers = 4usize;
    let source: pminiz_core::blockbuf::SharedBytes = std::sync::Arc::new(data.clone());
    let blocks = pminiz_core::pipeline::compress_shard(source, block, workers, Compression::default()).unwrap();
    assert_eq!(blocks.len(), 2);

    let lens: Vec<u64> = blocks.iter().map(|b| b.len() as u64).collect();
    let payload: Vec<u8> = blocks.into_iter().flatten().collect();
    let output_lens = pminiz_core::partition::output_lengths(data.len(), block, lens.len());
    assert_eq!(output_lens[1], 100);

    let decompressed = pminiz_core::pipeline::decompress_shard(
        std::sync::Arc::new(payload),
        &lens,
        &output_lens,
        workers,
    )
    .unwrap();
    let flat: Vec<u8> = decompressed.into_iter().flatten().collect();
    assert_eq!(flat, data);
}

#[test]
fn empty_file_produces_header_only_container() {
    let container = fastpath::compress_small(&[], Compression::default()).unwrap();
    let header = pminiz_core::container::decode_header(&container).unwrap();
    assert_eq!(header.uncompressed_size, 0);
    assert_eq!(header.block_count(), 0);
    assert_eq!(container.len(), 2 * pminiz_core::container::WIDTH);
}

#[test]
fn directory_tree_roundtrips_every_file() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("nested");
    fs::create_dir(&sub).unwrap();

    let contents = [
        ("top.bin", vec![1u8, 2, 3, 4, 5]),
        ("nested/deep.bin", (0u32..10_000).map(|i| (i % 256) as u8).collect()),
        ("empty.bin", Vec::new()),
    ];
    for (name, data) in &contents {
        fs::write(dir.path().join(name), data).unwrap();
    }

    let compress_cfg = cfg(Mode::Compress, 1024, Some(4));
    let report = job::run(&compress_cfg, &[dir.path().to_path_buf()]);
    assert!(report.all_succeeded(), "{:?}", report.failed);

    for (name, _) in &contents {
        fs::remove_file(dir.path().join(name)).unwrap();
    }

    let decompress_cfg = cfg(Mode::Decompress, 1024, Some(4));
    let report = job::run(&decompress_cfg, &[dir.path().to_path_buf()]);
    assert!(report.all_succeeded(), "{:?}", report.failed);

    for (name, data) in &contents {
        let restored = fs::read(dir.path().join(name)).unwrap();
        assert_eq!(&restored, data, "mismatch for {name}");
    }
}

#[test]
fn disambiguation_inserts_numeral_before_first_dot_on_collision() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("archive.tar");
    fs::write(&original, b"original archive bytes").unwrap();

    let compress_cfg = cfg(Mode::Compress, 1024, Some(2));
    job::run(&compress_cfg, &[dir.path().to_path_buf()]);

    // A stand-in file already occupies the name decompression would
    // otherwise produce.
    fs::write(dir.path().join("archive.tar"), b"someone else's archive.tar").unwrap();

    let decompress_cfg = cfg(Mode::Decompress, 1024, Some(2));
    let report = job::run(&decompress_cfg, &[dir.path().to_path_buf()]);
    assert!(report.all_succeeded(), "{:?}", report.failed);

    let disambiguated = dir.path().join("1archive.tar");
    assert!(disambiguated.exists(), "expected 1archive.tar from the first-dot rule");
    assert_eq!(fs::read(&disambiguated).unwrap(), b"original archive bytes");
}

#[test]
fn worker_count_does_not_change_the_compressed_artifact() {
    let dir = tempdir().unwrap();
    let data: Vec<u8> = (0u32..500_000).map(|i| (i % 256) as u8).collect();
    fs::write(dir.path().join("a.bin"), &data).unwrap();
    fs::write(dir.path().join("b.bin"), &data).unwrap();

    let cfg_one = cfg(Mode::Compress, 4096, Some(1));
    let report = job::run(&cfg_one, &[dir.path().join("a.bin")]);
    assert!(report.all_succeeded());

    let cfg_many = cfg(Mode::Compress, 4096, Some(8));
    let report = job::run(&cfg_many, &[dir.path().join("b.bin")]);
    assert!(report.all_succeeded());

    let y1 = fs::read(dir.path().join("a.bin.miniz")).unwrap();
    let y8 = fs::read(dir.path().join("b.bin.miniz")).unwrap();
    assert_eq!(y1, y8);
}
