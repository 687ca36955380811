use assert_cmd::Command;
use std::fs;
use tempfile::tempdir;

#[test]
fn same_seed_writes_identical_files() {
    let temp = tempdir().unwrap();
    let mut contents = Vec::new();
    for name in ["one.txt", "two.txt"] {
        let out = temp.path().join(name);
        Command::cargo_bin("cardio")
            .unwrap()
            .args([
                "synth",
                "--kind",
                "afib",
                "--duration",
                "10",
                "--seed",
                "9",
                "--out",
                out.to_str().unwrap(),
            ])
            .assert()
            .success();
        contents.push(fs::read_to_string(out).unwrap());
    }
    assert_eq!(contents[0], contents[1]);
    assert_eq!(contents[0].lines().count(), 2500);
}

#[test]
fn fixtures_cover_every_archetype() {
    let temp = tempdir().unwrap();
    Command::cargo_bin("cardio")
        .unwrap()
        .args([
            "fixtures",
            "--out",
            temp.path().to_str().unwrap(),
            "--duration",
            "5",
            "--sr",
            "500",
        ])
        .assert()
        .success();
    for kind in ["normal", "st_elevation", "afib", "tachy"] {
        let path = temp.path().join(format!("{}_5s_500hz.txt", kind));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2500);
        assert!(temp.path().join(format!("{}_5s_500hz.meta.json", kind)).exists());
    }
}

#[test]
fn fixtures_accept_the_largest_seed() {
    let temp = tempdir().unwrap();
    Command::cargo_bin("cardio")
        .unwrap()
        .args([
            "fixtures",
            "--out",
            temp.path().to_str().unwrap(),
            "--duration",
            "2",
            "--sr",
            "250",
            "--seed",
            "18446744073709551615",
        ])
        .assert()
        .success();
    for kind in ["normal", "st_elevation", "afib", "tachy"] {
        assert!(temp.path().join(format!("{}_2s_250hz.txt", kind)).exists());
    }
}

#[test]
fn unknown_archetype_is_rejected() {
    let temp = tempdir().unwrap();
    Command::cargo_bin("cardio")
        .unwrap()
        .args(["synth", "--kind", "brady", "--out", temp.path().join("x.txt").to_str().unwrap()])
        .assert()
        .failure();
}
