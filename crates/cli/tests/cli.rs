//! End-to-end flows through the `janus` binary against a temp data dir.

use assert_cmd::Command;
use predicates::prelude::*;

fn janus(data_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("janus").expect("binary builds");
    cmd.arg("--data-dir").arg(data_dir).arg("--output").arg("json");
    cmd
}

#[test]
fn register_consume_and_retry_flow() {
    let dir = tempfile::tempdir().expect("tempdir");
    let user_id = "8d7f1c9a-2f4b-4a57-9d38-5a2e1b7c6d90";

    // Register with a known secret.
    let output = janus(dir.path())
        .args([
            "token",
            "register",
            "--user-id",
            user_id,
            "--value",
            "the-emailed-secret",
        ])
        .output()
        .expect("register runs");
    assert!(output.status.success(), "register failed: {output:?}");
    let row: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(row["user_id"], user_id);
    assert_eq!(row["is_used"], false);
    assert_eq!(row["version"], 1);
    assert_eq!(row["value"], "the-emailed-secret");

    // The stored document lists exactly one active token.
    let output = janus(dir.path())
        .args(["token", "list"])
        .output()
        .expect("list runs");
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(rows.as_array().map(Vec::len), Some(1));

    // Consume by value.
    let output = janus(dir.path())
        .args(["token", "consume", "--value", "the-emailed-secret"])
        .output()
        .expect("consume runs");
    assert!(output.status.success(), "consume failed: {output:?}");
    let row: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(row["is_used"], true);
    assert_eq!(row["version"], 2);

    // A second consumption is a business failure with the coded diagnostic.
    janus(dir.path())
        .args(["token", "consume", "--value", "the-emailed-secret"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("OneTimeToken.IsUsed.AlreadyUsed"));
}

#[test]
fn register_rejects_invalid_fields_with_all_codes() {
    let dir = tempfile::tempdir().expect("tempdir");

    // Nil user id and a negative TTL: both field failures surface.
    janus(dir.path())
        .args([
            "token",
            "register",
            "--user-id",
            "00000000-0000-0000-0000-000000000000",
            "--value",
            "x",
            "--ttl-hours",
            "-1",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("OneTimeToken.UserId.IsRequired"))
        .stderr(predicate::str::contains(
            "OneTimeToken.ExpiresAt.NotInFuture",
        ));
}

#[test]
fn consent_grant_revoke_flow() {
    let dir = tempfile::tempdir().expect("tempdir");
    let user_id = "4f1e9d3b-7c2a-4b68-8a21-0c9d5e7f3a14";
    let client_id = "9b8a7c6d-5e4f-4a3b-9c2d-1e0f9a8b7c6d";

    janus(dir.path())
        .args([
            "consent", "grant", "--user-id", user_id, "--client-id", client_id, "--scope",
            "profile:read",
        ])
        .assert()
        .success();

    let output = janus(dir.path())
        .args(["consent", "list", "--user-id", user_id])
        .output()
        .expect("list runs");
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(rows.as_array().map(Vec::len), Some(1));

    janus(dir.path())
        .args(["consent", "revoke", "--user-id", user_id, "--client-id", client_id])
        .assert()
        .success();

    // Revoked consents drop out of the granted listing.
    let output = janus(dir.path())
        .args(["consent", "list", "--user-id", user_id])
        .output()
        .expect("list runs");
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(rows.as_array().map(Vec::len), Some(0));

    // A second revoke fails with the coded diagnostic.
    janus(dir.path())
        .args(["consent", "revoke", "--user-id", user_id, "--client-id", client_id])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "UserConsent.IsRevoked.AlreadyRevoked",
        ));
}
