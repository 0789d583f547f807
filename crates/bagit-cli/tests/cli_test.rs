use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const PROFILE: &str = r#"{
    "BagIt-Profile-Info": { "BagIt-Profile-Identifier": "https://example.org/cli.json" },
    "Bag-Info": {
        "External-Identifier": { "required": true },
        "Access": { "required": false, "values": ["open", "closed"] }
    },
    "Manifests-Required": ["sha256"],
    "Tag-Manifests-Required": ["sha256"],
    "Allow-Fetch.txt": true
}"#;

fn bagit() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("bagit").expect("bagit binary");
    cmd.env_remove("BAGIT_PROFILE_URL").env("RUST_LOG", "warn");
    cmd
}

fn setup(dir: &Path) -> String {
    let profile = dir.join("profile.json");
    fs::write(&profile, PROFILE).unwrap();
    let payload = dir.join("payload");
    fs::create_dir_all(payload.join("sub")).unwrap();
    fs::write(payload.join("a.txt"), b"abc").unwrap();
    fs::write(payload.join("sub/b.txt"), b"bbbb").unwrap();
    profile.to_str().unwrap().to_string()
}

fn create(dir: &Path, profile: &str) -> std::path::PathBuf {
    let bag = dir.join("bag");
    bagit()
        .args(["--profile", profile, "create", "--bag"])
        .arg(&bag)
        .arg("--payload")
        .arg(dir.join("payload"))
        .args(["--property", "External-Identifier=ds-7", "--verify"])
        .assert()
        .success()
        .stderr(predicate::str::contains("bag created"));
    bag
}

#[test]
fn version_prints_package_version() {
    bagit()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn create_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let profile = setup(dir.path());
    let bag = create(dir.path(), &profile);

    assert!(bag.join("data/sub/b.txt").is_file());
    let manifest = fs::read_to_string(bag.join("manifest-sha256.txt")).unwrap();
    assert!(manifest.contains("  data/a.txt\n"));
    assert!(manifest.contains("  data/sub/b.txt\n"));

    bagit()
        .arg("validate")
        .arg("--bag")
        .arg(&bag)
        .assert()
        .success()
        .stderr(predicate::str::contains("bag valid"));
}

#[test]
fn invalid_property_fails_with_validation_code() {
    let dir = tempfile::tempdir().unwrap();
    let profile = setup(dir.path());
    let bag = dir.path().join("bag");

    bagit()
        .args(["--profile", &profile, "create", "--bag"])
        .arg(&bag)
        .args(["--property", "Access=secret"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "mandatory metadata with key External-Identifier is missing",
        ))
        .stderr(predicate::str::contains("invalid metadata value for key Access"));
    assert!(!bag.join("bagit.txt").exists());
}

#[test]
fn tampered_bag_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let profile = setup(dir.path());
    let bag = create(dir.path(), &profile);
    fs::write(bag.join("data/a.txt"), b"xyz").unwrap();

    bagit()
        .arg("validate")
        .arg("--bag")
        .arg(&bag)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("checksum mismatch for data/a.txt"));
}

#[test]
fn package_writes_archive_next_to_bag() {
    let dir = tempfile::tempdir().unwrap();
    let profile = setup(dir.path());
    let bag = create(dir.path(), &profile);

    bagit()
        .arg("package")
        .arg("--bag")
        .arg(&bag)
        .assert()
        .success();
    let archive = dir.path().join("bag.tar.gz");
    assert!(fs::metadata(&archive).unwrap().len() > 0);
}

#[test]
fn collect_streams_archive_to_output() {
    let dir = tempfile::tempdir().unwrap();
    let profile = setup(dir.path());
    fs::write(dir.path().join("datacite.xml"), "<resource/>").unwrap();
    let content = url::Url::from_file_path(dir.path().join("payload/a.txt")).unwrap();
    let collection = dir.path().join("collection.yaml");
    fs::write(
        &collection,
        format!(
            "resource_id: ds-9\n\
             items:\n\
             \x20 - content_url: {content}\n\
             \x20   fetch_url: https://repo.example/ds-9/a.txt\n\
             \x20   relative_path: a.txt\n\
             \x20   length: 3\n\
             \x20   algorithm: sha256\n\
             \x20   checksum: ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad\n\
             documents:\n\
             \x20 - path: metadata/datacite.xml\n\
             \x20   file: datacite.xml\n"
        ),
    )
    .unwrap();
    let output = dir.path().join("ds-9.tar.gz");

    bagit()
        .env("BAGIT_SCRATCH_DIR", dir.path().join("scratch"))
        .args(["--profile", &profile, "collect", "--collection"])
        .arg(&collection)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("application/vnd.datamanager.bagit+tar+gzip"));
    assert!(fs::metadata(&output).unwrap().len() > 0);
    assert_eq!(fs::read_dir(dir.path().join("scratch")).unwrap().count(), 0);
}

#[test]
fn unreachable_profile_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    bagit()
        .args(["--profile"])
        .arg(dir.path().join("missing.json"))
        .args(["create", "--bag"])
        .arg(dir.path().join("bag"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("fatal:"));
}

#[test]
fn missing_payload_directory_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let profile = setup(dir.path());
    let bag = dir.path().join("bag");

    bagit()
        .args(["--profile", &profile, "create", "--bag"])
        .arg(&bag)
        .arg("--payload")
        .arg(dir.path().join("no-such-dir"))
        .args(["--property", "External-Identifier=ds-7"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("payload is not a directory"));
    assert!(!bag.join("bagit.txt").exists());
}
