//! Command-line behaviour that needs no cloud access

use assert_cmd::Command;
use predicates::prelude::*;

fn lbcert() -> Command {
    let mut cmd = Command::cargo_bin("lbcert").unwrap();
    cmd.env_clear().env("LBCERT_LOG", "error");
    cmd
}

#[test]
fn help_lists_both_commands() {
    lbcert()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rotate"))
        .stdout(predicate::str::contains("listeners"));
}

#[test]
fn rotate_help_names_the_environment_variables() {
    lbcert()
        .args(["rotate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OCI_LB_OCID"))
        .stdout(predicate::str::contains("OCI_LISTENERS"))
        .stdout(predicate::str::contains("LETSENCRYPT_DOMAINS"));
}

#[test]
fn missing_load_balancer_is_reported_before_any_call() {
    // GIVEN an empty environment
    // WHEN rotating
    // THEN the first missing setting is named and the exit code is 1
    lbcert()
        .arg("rotate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("OCI_LB_OCID"));
}

#[test]
fn missing_listeners_are_reported() {
    lbcert()
        .arg("rotate")
        .env("OCI_LB_OCID", "ocid1.loadbalancer.oc1..lb")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("OCI_LISTENERS"));
}

#[test]
fn acme_without_domains_is_rejected() {
    lbcert()
        .arg("rotate")
        .env("OCI_LB_OCID", "ocid1.loadbalancer.oc1..lb")
        .env("OCI_LISTENERS", "https")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("LETSENCRYPT_DOMAINS"));
}

#[test]
fn acme_requires_a_dns_zone() {
    lbcert()
        .arg("rotate")
        .env("OCI_LB_OCID", "ocid1.loadbalancer.oc1..lb")
        .env("OCI_LISTENERS", "https")
        .env("LETSENCRYPT_DOMAINS", "example.org")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("OCI_DNS_ZONE"));
}

#[test]
fn archive_is_skipped_without_namespace_when_disabled() {
    // GIVEN every ACME setting but no object storage namespace
    // WHEN archiving is disabled
    // THEN validation moves on to the API credentials
    lbcert()
        .args(["rotate", "--no-archive"])
        .env("OCI_LB_OCID", "ocid1.loadbalancer.oc1..lb")
        .env("OCI_LISTENERS", "https")
        .env("LETSENCRYPT_DOMAINS", "example.org")
        .env("OCI_DNS_ZONE", "example.org")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("OCI_REGION"))
        .stderr(predicate::str::contains("OCI_OS_NAMESPACE").not());
}

#[test]
fn archive_requires_a_namespace() {
    lbcert()
        .arg("rotate")
        .env("OCI_LB_OCID", "ocid1.loadbalancer.oc1..lb")
        .env("OCI_LISTENERS", "https")
        .env("LETSENCRYPT_DOMAINS", "example.org")
        .env("OCI_DNS_ZONE", "example.org")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("OCI_OS_NAMESPACE"));
}

#[test]
fn credentials_are_checked_before_connecting() {
    lbcert()
        .args(["listeners", "--load-balancer", "ocid1.loadbalancer.oc1..lb"])
        .env("OCI_REGION", "us-ashburn-1")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("OCI_TENANCY_OCID"));
}

#[test]
fn unknown_output_format_is_a_usage_error() {
    lbcert()
        .args(["listeners", "--output", "yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--output"));
}

#[test]
fn cert_file_requires_key_file() {
    let dir = tempfile::tempdir().unwrap();
    let chain = dir.path().join("chain.pem");
    std::fs::write(&chain, "-----BEGIN CERTIFICATE-----\n").unwrap();

    lbcert()
        .arg("rotate")
        .arg("--cert-file")
        .arg(&chain)
        .assert()
        .code(2);
}
