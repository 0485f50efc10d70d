mod common;

use std::process::Command;

use tempfile::tempdir;

const SWEEP: &str = r#"
[[sweep.parameters]]
target = "Camera"
property = "location_z"
range = { kind = "uniform", min = 8.0, max = 12.0, steps = 3 }
"#;

fn clean_command(bin: &str) -> Command {
    let mut cmd = Command::new(bin);
    for key in ["SDG_TARGET_PATH", "SDG_SPLIT", "SDG_SEED", "SDG_DEBUG", "SDG_SAMPLES"] {
        cmd.env_remove(key);
    }
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn rendered_split_passes_verification() {
    let dir = tempdir().expect("temp dir");
    let config = common::write_config(dir.path(), SWEEP).expect("write config");

    let render = clean_command(env!("CARGO_BIN_EXE_sdg_render"))
        .args(["--ui", "plain", "--config"])
        .arg(&config)
        .output()
        .expect("run sdg_render");
    assert!(
        render.status.success(),
        "sdg_render failed: {}",
        String::from_utf8_lossy(&render.stderr)
    );
    let stdout = String::from_utf8_lossy(&render.stdout);
    assert!(stdout.contains("written: 3"), "{}", stdout);

    let verify = clean_command(env!("CARGO_BIN_EXE_dataset_verify"))
        .args(["--ui", "plain", "--split-dir"])
        .arg(common::split_dir(dir.path()))
        .output()
        .expect("run dataset_verify");
    assert!(
        verify.status.success(),
        "dataset_verify failed: {}",
        String::from_utf8_lossy(&verify.stdout)
    );
}

#[test]
fn tampered_label_fails_verification() {
    let dir = tempdir().expect("temp dir");
    let config = common::write_config(dir.path(), SWEEP).expect("write config");
    let render = clean_command(env!("CARGO_BIN_EXE_sdg_render"))
        .args(["--ui", "plain", "--config"])
        .arg(&config)
        .output()
        .expect("run sdg_render");
    assert!(render.status.success());

    let labels = common::split_dir(dir.path()).join("labels");
    let first = common::files_in(&labels).expect("list labels")[0].clone();
    std::fs::write(labels.join(first), "0 0.5 0.5 0.9 0.9\n").expect("tamper label");

    let verify = clean_command(env!("CARGO_BIN_EXE_dataset_verify"))
        .args(["--ui", "plain", "--split-dir"])
        .arg(common::split_dir(dir.path()))
        .output()
        .expect("run dataset_verify");
    assert!(!verify.status.success());
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempdir().expect("temp dir");
    let config = common::write_config(dir.path(), SWEEP).expect("write config");
    let out = clean_command(env!("CARGO_BIN_EXE_sdg_render"))
        .args(["--dry-run", "--config"])
        .arg(&config)
        .output()
        .expect("run sdg_render");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.lines().filter(|l| l.starts_with('{')).count(), 3);
    assert!(!common::split_dir(dir.path()).exists());
}
