// SPDX-License-Identifier: MIT

//! Billing integrity helpers: payment split, proof hashes, halala display.
//!
//! All arithmetic is integer-only; amounts are halalas (1/100 SAR).

use sha2::{Digest, Sha256};

/// Split a payment into `(provider, site)` shares at 75/25.
///
/// The provider share rounds down; the site share absorbs the remainder so
/// the two always sum exactly to `total`.
pub fn split_payment(total: u64) -> (u64, u64) {
    let provider = total * 75 / 100;
    (provider, total - provider)
}

/// Billing proof = SHA-256 over `jobId|sessionId|amount|timestamp`.
pub fn compute_proof_hash(job_id: &str, session_id: &str, amount: u64, timestamp: i64) -> String {
    let canonical = format!("{}|{}|{}|{}", job_id, session_id, amount, timestamp);
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

/// Verify a billing record against its proof hash.
pub fn verify_billing_integrity(
    job_id: &str,
    session_id: &str,
    amount: u64,
    timestamp: i64,
    proof: &str,
) -> bool {
    compute_proof_hash(job_id, session_id, amount, timestamp) == proof
}

/// Render halalas as a SAR display string, e.g. `10050` → `"100.50 SAR"`.
pub fn halala_to_sar_display(halalas: u64) -> String {
    format!("{}.{:02} SAR", halalas / 100, halalas % 100)
}

#[cfg(test)]
#[path = "billing_tests.rs"]
mod tests;
