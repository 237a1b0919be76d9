use super::*;

#[test]
fn test_skl_defaults() {
    let config = TargetConfig::skl();
    assert_eq!(config.name, "skl");
    assert_eq!(config.platform, Platform::Skl);
    assert_eq!(config.grf_size, 32);
    assert_eq!(config.max_operand_bytes(), 64);
    assert_eq!(config.r0_lanes(), 8);
    assert_eq!(config.bundle_limit(), MAX_BUNDLE_SIZE);
    assert!(config.merge_enabled);
}

#[test]
fn test_pvc_has_wide_grf() {
    let config = TargetConfig::for_platform(Platform::Pvc);
    assert_eq!(config.grf_size, 64);
    assert_eq!(config.r0_lanes(), 16);
}

#[test]
fn test_from_cpu_falls_back_to_skl() {
    assert_eq!(Platform::from_cpu("TGLLP"), Platform::TglLp);
    assert_eq!(Platform::from_cpu("xehp"), Platform::XeHp);
    assert_eq!(Platform::from_cpu(""), Platform::Skl);
    assert_eq!(Platform::from_cpu("generic"), Platform::Skl);
    assert!(Platform::parse("generic").is_none());
}

#[test]
fn test_resolve_builtin() {
    let config = TargetConfig::resolve("dg1").unwrap();
    assert_eq!(config.platform, Platform::Dg1);
    assert_eq!(config.name, "dg1");
}

#[test]
fn test_resolve_rejects_path_traversal() {
    assert!(TargetConfig::resolve("../etc/passwd").is_err());
    assert!(TargetConfig::resolve("./sneaky").is_err());
    assert!(TargetConfig::resolve("foo/bar").is_err());
    assert!(TargetConfig::resolve(".hidden").is_err());
}

#[test]
fn test_resolve_unknown_has_help() {
    let err = TargetConfig::resolve("nonexistent_gpu").unwrap_err();
    assert!(err.message.contains("unknown target"));
    assert!(err.help.as_deref().unwrap_or("").contains("tgllp"));
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wide.toml");
    std::fs::write(
        &path,
        r#"
# experimental part
[target]
name = "wide"
display_name = "Wide GRF part"
platform = "xehp"

[grf]
size = 64

[merge]
enabled = true
max_bundle_size = 8
"#,
    )
    .unwrap();

    let config = TargetConfig::load(&path).unwrap();
    assert_eq!(config.name, "wide");
    assert_eq!(config.display_name, "Wide GRF part");
    assert_eq!(config.platform, Platform::XeHp);
    assert_eq!(config.grf_size, 64);
    assert_eq!(config.max_bundle_size, 8);
    assert!(config.merge_enabled);
}

#[test]
fn test_load_defaults_grf_from_platform() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("min.toml");
    std::fs::write(&path, "[target]\nname = \"min\"\nplatform = \"PVC\"\n").unwrap();
    let config = TargetConfig::load(&path).unwrap();
    assert_eq!(config.grf_size, 64);
    assert_eq!(config.max_bundle_size, MAX_BUNDLE_SIZE);
}

#[test]
fn test_load_rejects_bad_values() {
    let dir = tempfile::tempdir().unwrap();

    let path = dir.path().join("noname.toml");
    std::fs::write(&path, "[grf]\nsize = 32\n").unwrap();
    let err = TargetConfig::load(&path).unwrap_err();
    assert!(err.message.contains("missing target.name"));

    let path = dir.path().join("bundle.toml");
    std::fs::write(&path, "[target]\nname = \"x\"\n[merge]\nmax_bundle_size = 32\n").unwrap();
    let err = TargetConfig::load(&path).unwrap_err();
    assert!(err.message.contains("max_bundle_size"));

    let path = dir.path().join("grf.toml");
    std::fs::write(&path, "[target]\nname = \"x\"\n[grf]\nsize = abc\n").unwrap();
    let err = TargetConfig::load(&path).unwrap_err();
    assert!(err.message.contains("invalid grf.size"));

    let path = dir.path().join("plat.toml");
    std::fs::write(&path, "[target]\nname = \"x\"\nplatform = \"gen99\"\n").unwrap();
    let err = TargetConfig::load(&path).unwrap_err();
    assert!(err.message.contains("unknown platform"));

    let path = dir.path().join("zero.toml");
    std::fs::write(&path, "[target]\nname = \"x\"\n[grf]\nsize = 0\n").unwrap();
    let err = TargetConfig::load(&path).unwrap_err();
    assert!(err.message.contains("grf.size must be a positive multiple of 4"));
}

#[test]
fn test_validate_hand_built_configs() {
    assert!(TargetConfig::skl().validate().is_ok());
    let zero_grf = TargetConfig {
        grf_size: 0,
        ..TargetConfig::skl()
    };
    assert!(zero_grf.validate().unwrap_err().contains("grf.size"));
    let no_bundles = TargetConfig {
        max_bundle_size: 0,
        ..TargetConfig::skl()
    };
    assert!(no_bundles.validate().unwrap_err().contains("max_bundle_size"));
}

#[test]
fn test_load_missing_file() {
    let err = TargetConfig::load(Path::new("/nonexistent/target.toml")).unwrap_err();
    assert!(err.message.contains("cannot read target config"));
}

#[test]
fn test_merge_disabled_via_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("off.toml");
    std::fs::write(&path, "[target]\nname = \"off\"\n[merge]\nenabled = false\n").unwrap();
    let config = TargetConfig::load(&path).unwrap();
    assert!(!config.merge_enabled);
}
