//! Test fixtures: driver archives, bundles and configurations

use driver_depot::{AssetSpec, Config};
use std::io::{Cursor, Write};
use std::path::Path;

/// Content identifier of the shipped content folder
pub const CONTENT_ID: &str = "01007EF00011E000";

/// Key file bytes placed in every test bundle
pub const PROD_KEYS: &[u8] = b"header_key = 0011223344556677\n";

/// Build a ZIP archive in memory from `(name, content)` pairs
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Turnip driver package with `meta.json` and `lib.so`
pub fn turnip_package(release: &str) -> Vec<u8> {
    let meta = format!(
        r#"{{
            "schemaVersion": 1,
            "name": "Turnip",
            "description": "Open-source Vulkan driver for Adreno GPUs",
            "author": "K11MCH1",
            "packageVersion": "1",
            "vendor": "Mesa",
            "driverVersion": "{release}",
            "minApi": 28,
            "libraryName": "lib.so"
        }}"#
    );
    zip_bytes(&[("meta.json", meta.as_bytes()), ("lib.so", &b"\x7fELF turnip"[..])])
}

/// Bundle directory with the key file, the content folder, a driver
/// package and an archive of system files
pub fn write_bundle(bundle: &Path) {
    let content = bundle.join(CONTENT_ID);
    std::fs::create_dir_all(content.join("exefs")).unwrap();
    std::fs::create_dir_all(content.join("romfs/shaders")).unwrap();
    std::fs::write(bundle.join("prod.keys"), PROD_KEYS).unwrap();
    std::fs::write(content.join("exefs/main.npdm"), b"npdm").unwrap();
    std::fs::write(content.join("romfs/shaders/cache.bin"), vec![3u8; 4096]).unwrap();
    std::fs::write(bundle.join("turnip.zip"), turnip_package("R18")).unwrap();
    std::fs::write(
        bundle.join("system.zip"),
        zip_bytes(&[("fonts/standard.bfttf", &b"font"[..]), ("nand/user.bin", &b"user"[..])]),
    )
    .unwrap();
}

/// Config rooted in `root`: bundle in `assets/`, data in `data/`
///
/// The plan copies the key file, mirrors the content folder, copies
/// `turnip.zip` into driver storage and expands `system.zip` under `sysdata`.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.bundle_path = root.join("assets");
    config.storage.data_dir = root.join("data");
    config.storage.temp_dir = root.join("temp");
    config.materialize.assets = vec![
        AssetSpec::tree(CONTENT_ID, Path::new("load").join(CONTENT_ID)),
        AssetSpec::file("turnip.zip", "gpu_drivers/Turnip-R18.zip"),
        AssetSpec::zip("system.zip", "sysdata"),
    ];
    config
}
