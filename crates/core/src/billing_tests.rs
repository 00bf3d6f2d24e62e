// SPDX-License-Identifier: MIT

use super::*;
use yare::parameterized;

#[parameterized(
    one = { 1 },
    three = { 3 },
    seven = { 7 },
    hundred = { 100 },
    odd = { 999 },
    large = { 1_234_567 },
)]
fn split_sums_to_total(total: u64) {
    let (provider, site) = split_payment(total);
    assert_eq!(provider + site, total, "rounding leak: {} + {} != {}", provider, site, total);
}

#[parameterized(
    hundred = { 100 },
    thousand = { 1_000 },
    ten_thousand = { 10_000 },
)]
fn provider_gets_floor_of_75_percent(total: u64) {
    let (provider, _) = split_payment(total);
    assert_eq!(provider, total * 75 / 100);
}

#[test]
fn split_of_zero_is_zero() {
    assert_eq!(split_payment(0), (0, 0));
}

#[test]
fn proof_hash_matches_canonical_form() {
    let got = compute_proof_hash("job-1", "sess-1", 10_000, 1_700_000_000);
    let expected = format!("{:x}", sha2::Sha256::digest(b"job-1|sess-1|10000|1700000000"));
    assert_eq!(got, expected);
}

#[test]
fn different_inputs_different_hash() {
    let h1 = compute_proof_hash("job-1", "sess-1", 10_000, 1_700_000_000);
    let h2 = compute_proof_hash("job-2", "sess-1", 10_000, 1_700_000_000);
    assert_ne!(h1, h2);
}

#[test]
fn valid_proof_passes() {
    let proof = compute_proof_hash("job-1", "sess-1", 10_000, 1_700_000_000);
    assert!(verify_billing_integrity("job-1", "sess-1", 10_000, 1_700_000_000, &proof));
}

#[test]
fn tampered_amount_detected() {
    let proof = compute_proof_hash("job-1", "sess-1", 10_000, 1_700_000_000);
    assert!(!verify_billing_integrity("job-1", "sess-1", 99_999, 1_700_000_000, &proof));
}

#[test]
fn tampered_hash_detected() {
    let bogus = "deadbeef".repeat(8);
    assert!(!verify_billing_integrity("job-1", "sess-1", 10_000, 1_700_000_000, &bogus));
}

#[parameterized(
    typical = { 10_050, "100.50 SAR" },
    zero = { 0, "0.00 SAR" },
    single = { 1, "0.01 SAR" },
    round = { 100, "1.00 SAR" },
)]
fn halala_display(halalas: u64, expected: &str) {
    assert_eq!(halala_to_sar_display(halalas), expected);
}
