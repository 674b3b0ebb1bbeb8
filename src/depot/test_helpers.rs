//! Shared test helpers for creating DriverDepot instances in tests.

use crate::config::{AssetSpec, Config};
use crate::depot::DriverDepot;
use crate::types::Event;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::tempdir;

/// Build a driver archive in memory with a descriptor and an optional library
pub(crate) fn driver_zip(meta_json: &str, library: Option<&str>) -> Vec<u8> {
    let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    writer.start_file("meta.json", options).unwrap();
    writer.write_all(meta_json.as_bytes()).unwrap();
    if let Some(library) = library {
        writer.start_file(library, options).unwrap();
        writer.write_all(b"\x7fELF").unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Turnip package with the given release tag
pub(crate) fn turnip(release: &str) -> Vec<u8> {
    driver_zip(
        &format!(
            r#"{{"name":"Turnip","driverVersion":"{release}","libraryName":"vulkan.ad07XX.so"}}"#
        ),
        Some("vulkan.ad07XX.so"),
    )
}

/// Populate a bundle directory the way the shipped application lays it out
pub(crate) fn populate_bundle(bundle: &Path) {
    std::fs::create_dir_all(bundle.join("01007EF00011E000/romfs")).unwrap();
    std::fs::write(bundle.join("prod.keys"), b"header_key = 00\n").unwrap();
    std::fs::write(bundle.join("01007EF00011E000/romfs/patch.bin"), b"patch").unwrap();
    std::fs::write(bundle.join("Turnip-24.1.0.adpkg_R18.zip"), turnip("R18")).unwrap();
    std::fs::write(bundle.join("Turnip-24.1.0.adpkg_R16.zip"), turnip("R16")).unwrap();
}

/// Config rooted in `root` with a two-driver bundle plan
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.bundle_path = root.join("assets");
    config.storage.data_dir = root.join("data");
    config.storage.temp_dir = root.join("temp");
    config.materialize.assets = vec![
        AssetSpec::tree("01007EF00011E000", "load/01007EF00011E000"),
        AssetSpec::file(
            "Turnip-24.1.0.adpkg_R18.zip",
            "gpu_drivers/Turnip-24.1.0.adpkg_R18.zip",
        ),
        AssetSpec::file(
            "Turnip-24.1.0.adpkg_R16.zip",
            "gpu_drivers/Turnip-24.1.0.adpkg_R16.zip",
        ),
    ];
    config
}

/// Helper to create a test DriverDepot over a populated directory bundle.
/// Returns the depot and the tempdir (which must be kept alive).
pub(crate) async fn create_test_depot() -> (DriverDepot, tempfile::TempDir) {
    let root = tempdir().unwrap();
    populate_bundle(&root.path().join("assets"));
    let depot = DriverDepot::new(test_config(root.path())).await.unwrap();
    (depot, root)
}

/// Collect every event currently buffered in `rx`
pub(crate) fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// File names in `dir`, sorted
pub(crate) fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
