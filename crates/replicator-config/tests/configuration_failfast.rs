use std::fs;

use tempfile::TempDir;

use replicator_config::{ConfigLoadError, ResolveError, resolve};

#[test]
fn first_broken_file_in_a_directory_aborts_resolution() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let good = temp_dir.path().join("10-good.toml");
    let broken = temp_dir.path().join("20-broken.toml");
    let unreached = temp_dir.path().join("30-also-broken.json");

    fs::write(&good, "consul = \"c:8500\"\n").expect("write good config");
    fs::write(&broken, "[cluster_scaling\nmax_size = 3\n").expect("write broken config");
    fs::write(&unreached, "{ not json").expect("write second broken config");

    let error = resolve([format!("-config={}", temp_dir.path().display())])
        .expect_err("loading must fail");

    match error {
        ResolveError::Load { path, source } => {
            assert_eq!(path.as_std_path(), temp_dir.path());
            assert!(
                matches!(source, ConfigLoadError::Toml { .. }),
                "expected a TOML error, got {source:?}"
            );
            assert_eq!(source.path(), broken.display().to_string());
        }
        other => panic!("expected a load error, got {other:?}"),
    }
}

#[test]
fn unknown_keys_fail_instead_of_being_ignored() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("agent.toml");
    fs::write(&path, "[telemetry]\nstatsd = \"127.0.0.1:8125\"\n").expect("write config");

    let error = resolve([format!("-config={}", path.display())]).expect_err("loading must fail");

    let message = error.to_string();
    assert!(message.contains("statsd"), "unexpected message: {message}");
    assert!(
        message.starts_with("Error loading configuration from"),
        "unexpected message: {message}"
    );
}

#[test]
fn malformed_flags_fail_before_any_file_is_read() {
    let error = resolve(["-config=/does/not/exist", "-scaling-interval=soon"])
        .expect_err("flag parsing must fail");
    assert!(matches!(error, ResolveError::Flags { .. }), "{error:?}");
}
