//! The manifest's core promise: every row's byte range is a restorable member

mod common;

use std::io::Read;

use tarpack::restore::{self, ArchiveLocation};
use tarpack::{BatchPolicy, Config};

#[tokio::test(flavor = "multi_thread")]
async fn every_manifest_row_restores_its_member() {
    let src = tempfile::tempdir().expect("src tempdir");
    let dst = tempfile::tempdir().expect("dst tempdir");

    std::fs::create_dir_all(src.path().join("deep/tree")).expect("mkdir");
    std::fs::write(src.path().join("empty.bin"), b"").expect("write");
    std::fs::write(src.path().join("hello.txt"), b"hello world").expect("write");
    std::fs::write(src.path().join("deep/tree/blob.bin"), vec![9u8; 4444]).expect("write");
    common::populate_tree(src.path(), 9, 700);

    common::run(common::fs_config(
        src.path(),
        dst.path(),
        BatchPolicy::Count { max_files: 4 },
    ))
    .await;

    let mut restored = 0;
    for manifest in common::manifests_in(dst.path()) {
        for entry in common::read_manifest(&manifest) {
            let location = ArchiveLocation::Path(entry.tar_location.clone().into());
            let record =
                restore::fetch_range(&location, entry.start_bytes, entry.stop_bytes, None)
                    .await
                    .expect("ranged read");
            let members = restore::read_members(&record).expect("record parses as TAR");
            assert_eq!(members.len(), 1, "one row restores exactly one member");

            let member = &members[0];
            assert_eq!(member.content.len() as u64, entry.size_bytes);
            assert_eq!(
                format!("{:x}", md5::compute(&member.content)),
                entry.md5_hex,
                "restored content hashes to the manifest md5"
            );
            assert!(
                entry.original_name.ends_with(&member.name),
                "member name {} should be the relative tail of {}",
                member.name,
                entry.original_name
            );
            restored += 1;
        }
    }
    assert_eq!(restored, 12);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_member_restores_with_the_empty_md5() {
    let src = tempfile::tempdir().expect("src tempdir");
    let dst = tempfile::tempdir().expect("dst tempdir");
    std::fs::write(src.path().join("empty.dat"), b"").expect("write");

    common::run(common::fs_config(
        src.path(),
        dst.path(),
        BatchPolicy::Count { max_files: 1 },
    ))
    .await;

    let entries = common::all_entries(dst.path());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].size_bytes, 0);
    assert_eq!(entries[0].md5_hex, "d41d8cd98f00b204e9800998ecf8427e");

    let record = restore::fetch_range(
        &ArchiveLocation::Path(entries[0].tar_location.clone().into()),
        entries[0].start_bytes,
        entries[0].stop_bytes,
        None,
    )
    .await
    .expect("ranged read");
    let members = restore::read_members(&record).expect("record parses");
    assert_eq!(members.len(), 1);
    assert!(members[0].content.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn compressed_archives_carry_uncompressed_offsets() {
    let src = tempfile::tempdir().expect("src tempdir");
    let dst = tempfile::tempdir().expect("dst tempdir");
    common::populate_tree(src.path(), 6, 1500);

    let config = Config {
        compress: true,
        ..common::fs_config(src.path(), dst.path(), BatchPolicy::Count { max_files: 3 })
    };
    common::run(config).await;

    let archives = common::archives_in(dst.path());
    assert!(!archives.is_empty());
    assert!(
        archives
            .iter()
            .all(|a| a.extension().is_some_and(|e| e == "gz"))
    );

    // ranged restore against the compressed object is refused
    let entries = common::all_entries(dst.path());
    let first = &entries[0];
    assert!(
        restore::fetch_range(
            &ArchiveLocation::Path(first.tar_location.clone().into()),
            first.start_bytes,
            first.stop_bytes,
            None,
        )
        .await
        .is_err()
    );

    // but the whole object, decompressed, honors every row's offsets
    for manifest in common::manifests_in(dst.path()) {
        let entries = common::read_manifest(&manifest);
        let compressed =
            std::fs::read(&entries[0].tar_location).expect("read compressed archive");
        let mut decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(compressed));
        let mut tar_stream = Vec::new();
        decoder
            .read_to_end(&mut tar_stream)
            .expect("gzip decodes to the TAR stream");

        for entry in &entries {
            let record = &tar_stream[entry.start_bytes as usize..=entry.stop_bytes as usize];
            let members = restore::read_members(record).expect("record parses");
            assert_eq!(members.len(), 1);
            assert_eq!(
                format!("{:x}", md5::compute(&members[0].content)),
                entry.md5_hex
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn restore_to_dir_recreates_nested_member_paths() {
    let src = tempfile::tempdir().expect("src tempdir");
    let dst = tempfile::tempdir().expect("dst tempdir");
    std::fs::create_dir_all(src.path().join("a/b")).expect("mkdir");
    std::fs::write(src.path().join("a/b/target.txt"), b"needle").expect("write");

    common::run(common::fs_config(
        src.path(),
        dst.path(),
        BatchPolicy::Count { max_files: 10 },
    ))
    .await;

    let entries = common::all_entries(dst.path());
    assert_eq!(entries.len(), 1);
    let out = dst.path().join("restored");
    let names = restore::restore_to_dir(
        &ArchiveLocation::Path(entries[0].tar_location.clone().into()),
        entries[0].start_bytes,
        entries[0].stop_bytes,
        &out,
        None,
    )
    .await
    .expect("restore");

    assert_eq!(names, vec!["a/b/target.txt"]);
    assert_eq!(
        std::fs::read(out.join("a/b/target.txt")).expect("restored file"),
        b"needle"
    );
}
