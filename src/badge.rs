//! Badge issuance gate. A verified proof reports how many records were
//! folded; once that count reaches the gate's threshold the badge is issued
//! exactly once. Delivery failures leave the gate unfired so the award can be
//! retried on the next verified proof.

use thiserror::Error;
use tracing::{debug, info};

use crate::ScalarField;

#[derive(Debug, Error)]
pub enum BadgeError {
    #[error("badge delivery failed: {0}")]
    Delivery(String),
}

/// Whatever actually hands out the badge. Kept behind a trait so tests can
/// record issuance instead of talking to a real backend.
pub trait BadgeIssuer {
    fn issue(&mut self, owner: ScalarField, steps: u64) -> Result<(), BadgeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Issued,
    AlreadyIssued,
    BelowThreshold,
}

#[derive(Debug, Clone)]
pub struct ThresholdGate {
    threshold: u64,
    fired: bool,
}

impl ThresholdGate {
    pub fn new(threshold: u64) -> Self {
        ThresholdGate {
            threshold,
            fired: false,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Feed one verified proof result through the gate.
    pub fn observe(
        &mut self,
        owner: ScalarField,
        verified_steps: u64,
        issuer: &mut impl BadgeIssuer,
    ) -> Result<GateOutcome, BadgeError> {
        if verified_steps < self.threshold {
            debug!(
                steps = verified_steps,
                threshold = self.threshold,
                "below badge threshold"
            );
            return Ok(GateOutcome::BelowThreshold);
        }
        if self.fired {
            return Ok(GateOutcome::AlreadyIssued);
        }
        issuer.issue(owner, verified_steps)?;
        self.fired = true;
        info!(steps = verified_steps, "badge issued");
        Ok(GateOutcome::Issued)
    }
}
