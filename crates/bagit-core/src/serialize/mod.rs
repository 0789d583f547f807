//! On-disk BagIt layout.
//!
//! [`text`] holds the pure line formats; the reader and writer move a
//! [`Bag`](crate::bag::Bag) to and from a directory tree.

pub(crate) mod reader;
pub mod text;
pub(crate) mod writer;

pub(crate) use reader::read_bag;
pub(crate) use writer::{same_location, write_bag};

pub const BAGIT_TXT: &str = "bagit.txt";
pub const BAG_INFO_TXT: &str = "bag-info.txt";
pub const FETCH_TXT: &str = "fetch.txt";

/// True for files the writer regenerates on every write.
pub(crate) fn is_descriptor(name: &str) -> bool {
    if matches!(name, BAGIT_TXT | BAG_INFO_TXT | FETCH_TXT) {
        return true;
    }
    name.ends_with(".txt") && (name.starts_with("manifest-") || name.starts_with("tagmanifest-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::{keys, Bag, BagPath, FetchEntry, ManifestClass, ManifestSet};
    use crate::checksum::Algorithm;
    use std::fs;

    fn sample_bag(root: &std::path::Path) -> Bag {
        let mut bag = Bag::new(root);
        bag.payload_manifests = ManifestSet::for_algorithms(&[Algorithm::Md5, Algorithm::Sha256]);
        bag.tag_manifests = ManifestSet::for_algorithms(&[Algorithm::Sha256]);
        bag.metadata.add(keys::PROFILE_IDENTIFIER, "file:///p.json");
        bag.metadata.add("Contact-Name", "a");
        bag.metadata.add("Contact-Name", "b");

        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(root.join("data/a.txt"), b"hello").unwrap();
        let p = BagPath::new("data/a.txt").unwrap();
        bag.payload_manifests
            .record(Algorithm::Md5, &p, "5d41402abc4b2a76b9719d911017c592");
        bag.payload_manifests.record(
            Algorithm::Sha256,
            &p,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
        );
        bag.track_local_file(ManifestClass::Payload, &p, 5);

        let url = url::Url::parse("https://example.org/remote.bin").unwrap();
        let entry = FetchEntry::new(url, 42, "remote.bin").unwrap();
        bag.payload_manifests
            .record(Algorithm::Md5, &entry.path, "00112233445566778899aabbccddeeff");
        bag.fetch_entries = Some(vec![entry]);
        bag.payload_size_bytes += 42;
        bag
    }

    #[test]
    fn descriptors_are_recognized() {
        assert!(is_descriptor("bagit.txt"));
        assert!(is_descriptor("manifest-md5.txt"));
        assert!(is_descriptor("tagmanifest-sha256.txt"));
        assert!(!is_descriptor("metadata/datacite.xml"));
        assert!(!is_descriptor("data/manifest-md5.txt"));
    }

    #[test]
    fn written_bag_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let bag = sample_bag(dir.path());
        write_bag(&bag, dir.path()).unwrap();

        let read = read_bag(dir.path()).unwrap();
        assert_eq!(read.version, "0.97");
        assert_eq!(read.metadata.get("contact-name"), vec!["a", "b"]);
        assert_eq!(read.payload_manifests, bag.payload_manifests);
        assert_eq!(read.fetch_entries(), bag.fetch_entries());
        assert_eq!(read.tag_manifests.algorithms(), bag.tag_manifests.algorithms());
        assert!(read.tag_manifests.paths().is_empty());
        let descriptors: Vec<&str> = read
            .descriptor_checksums
            .paths()
            .into_iter()
            .map(BagPath::as_str)
            .collect();
        assert_eq!(
            descriptors,
            vec![
                "bag-info.txt",
                "bagit.txt",
                "fetch.txt",
                "manifest-md5.txt",
                "manifest-sha256.txt",
            ]
        );
        assert_eq!(read.payload_size_bytes, 47);
        assert_eq!(read.bag_size_bytes, 5);
        assert_eq!(read.local_files.len(), 1);
    }

    #[test]
    fn tag_manifest_covers_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let bag = sample_bag(dir.path());
        write_bag(&bag, dir.path()).unwrap();

        let tagmanifest = fs::read_to_string(dir.path().join("tagmanifest-sha256.txt")).unwrap();
        let paths: Vec<&str> = tagmanifest
            .lines()
            .filter_map(|l| l.split_whitespace().nth(1))
            .collect();
        assert_eq!(
            paths,
            vec![
                "bag-info.txt",
                "bagit.txt",
                "fetch.txt",
                "manifest-md5.txt",
                "manifest-sha256.txt",
            ]
        );
    }

    #[test]
    fn write_returns_descriptor_checksums() {
        let dir = tempfile::tempdir().unwrap();
        let bag = sample_bag(dir.path());
        let sums = write_bag(&bag, dir.path()).unwrap();
        let info = BagPath::new(BAG_INFO_TXT).unwrap();
        let written = fs::read(dir.path().join(BAG_INFO_TXT)).unwrap();
        let expected = crate::checksum::digest_all(
            written.as_slice(),
            &std::collections::BTreeSet::from([Algorithm::Sha256]),
            BAG_INFO_TXT,
        )
        .unwrap();
        assert_eq!(
            sums.get(Algorithm::Sha256).unwrap().entries.get(&info),
            expected.get(&Algorithm::Sha256)
        );
        assert!(sums.paths().iter().all(|p| is_descriptor(p.as_str())));
    }

    #[test]
    fn repeated_writes_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let bag = sample_bag(dir.path());
        write_bag(&bag, dir.path()).unwrap();
        let names = [
            "bagit.txt",
            "bag-info.txt",
            "fetch.txt",
            "manifest-md5.txt",
            "tagmanifest-sha256.txt",
        ];
        let first: Vec<Vec<u8>> = names
            .iter()
            .map(|n| fs::read(dir.path().join(n)).unwrap())
            .collect();
        write_bag(&bag, dir.path()).unwrap();
        let second: Vec<Vec<u8>> = names
            .iter()
            .map(|n| fs::read(dir.path().join(n)).unwrap())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn writing_elsewhere_copies_local_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let bag = sample_bag(src.path());
        write_bag(&bag, dst.path()).unwrap();
        assert_eq!(fs::read(dst.path().join("data/a.txt")).unwrap(), b"hello");
        assert!(dst.path().join("bagit.txt").is_file());
        assert!(!dst.path().join("data/remote.bin").exists());
    }

    #[test]
    fn stale_fetch_list_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let mut bag = sample_bag(dir.path());
        write_bag(&bag, dir.path()).unwrap();
        assert!(dir.path().join("fetch.txt").is_file());
        bag.fetch_entries = Some(Vec::new());
        write_bag(&bag, dir.path()).unwrap();
        assert!(!dir.path().join("fetch.txt").exists());
    }

    #[test]
    fn missing_declaration_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_bag(dir.path()).unwrap_err();
        assert!(matches!(err, crate::error::BagError::Serialization { .. }));
    }
}
