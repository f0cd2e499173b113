//! Pluggable biometric verification.
//!
//! The engine never interprets biometric data; it only consumes the boolean
//! verdict and sets the per-student flag. A real camera/face-recognition
//! pipeline implements [`BiometricVerifier`] out of tree; the implementors
//! here cover the mocked behavior shipped with the system and deterministic
//! test injection.

/// An opaque biometric sample (captured frame or reference image bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaceSample(Vec<u8>);

impl FaceSample {
    #[must_use]
    pub const fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// An empty sample, for callers with no capture hardware.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for FaceSample {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

/// Compares a captured sample against a student's reference image.
pub trait BiometricVerifier {
    /// Returns whether `captured` matches `reference`.
    fn verify(&self, captured: &FaceSample, reference: &FaceSample) -> bool;
}

/// Rejects every sample.
///
/// This is the stock verifier: it reproduces the shipped mock, which reports
/// no match for any input. With it installed, the biometric flag never turns
/// true and reconciliation writes `absent` for everyone but the delegate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReject;

impl BiometricVerifier for AlwaysReject {
    fn verify(&self, _captured: &FaceSample, _reference: &FaceSample) -> bool {
        false
    }
}

/// Returns a fixed verdict regardless of input. Test injection.
#[derive(Debug, Clone, Copy)]
pub struct Deterministic(pub bool);

impl BiometricVerifier for Deterministic {
    fn verify(&self, _captured: &FaceSample, _reference: &FaceSample) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_reject_never_matches() {
        let verifier = AlwaysReject;
        assert!(!verifier.verify(&FaceSample::new(vec![1, 2, 3]), &FaceSample::empty()));
        assert!(!verifier.verify(&FaceSample::empty(), &FaceSample::empty()));
    }

    #[test]
    fn deterministic_returns_configured_verdict() {
        assert!(Deterministic(true).verify(&FaceSample::empty(), &FaceSample::empty()));
        assert!(!Deterministic(false).verify(&FaceSample::empty(), &FaceSample::empty()));
    }
}
