//! One-shot receipt validation run before the host application starts.

use crate::device::DeviceIdentityProvider;
use crate::error::{ReceiptError, ReceiptResult};
use crate::receipt::{ReceiptValidator, ValidatedReceipt};
use crate::verify::{CodeIdentityVerifier, SignatureVerifier};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{error, info, warn};

/// Runs the full startup pipeline against a receipt file.
///
/// Order: code signature, receipt file, envelope signature, payload.
pub struct StartupValidator<'a> {
    validator: ReceiptValidator,
    code_identity: &'a dyn CodeIdentityVerifier,
    signature: &'a dyn SignatureVerifier,
    device: &'a dyn DeviceIdentityProvider,
}

impl<'a> StartupValidator<'a> {
    pub fn new(
        validator: ReceiptValidator,
        code_identity: &'a dyn CodeIdentityVerifier,
        signature: &'a dyn SignatureVerifier,
        device: &'a dyn DeviceIdentityProvider,
    ) -> Self {
        Self {
            validator,
            code_identity,
            signature,
            device,
        }
    }

    /// Validates the receipt at `receipt_path`.
    ///
    /// Returns `Ok(None)` when the file is absent and the policy tolerates
    /// that.
    ///
    /// # Errors
    ///
    /// Any error is fatal; see [`validate_or_exit`].
    pub fn run(&self, receipt_path: &Path) -> ReceiptResult<Option<ValidatedReceipt>> {
        let policy = self.validator.policy();
        self.code_identity.check(&policy.code_requirement)?;

        let signed = match std::fs::read(receipt_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound && !policy.require_receipt => {
                warn!("No receipt at {}; continuing without one", receipt_path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(ReceiptError::ReceiptUnreadable(format!(
                    "{}: {e}",
                    receipt_path.display()
                )));
            }
        };

        let payload = self.signature.verify(&signed)?;
        let device_id = self.device.current_device_id()?;
        let receipt = self.validator.validate(&payload, &device_id)?;
        info!("Startup receipt check passed");
        Ok(Some(receipt))
    }
}

/// Runs `startup` and terminates the process if validation fails.
///
/// Prints a one-line diagnostic to stderr and exits with
/// [`RECEIPT_INVALID_EXIT_CODE`](crate::RECEIPT_INVALID_EXIT_CODE). There is
/// no retry: a failure means the binary or receipt has been tampered with.
pub fn validate_or_exit(startup: &StartupValidator<'_>, receipt_path: &Path) {
    if let Err(e) = startup.run(receipt_path) {
        error!("Receipt validation failed: {e}");
        eprintln!("receipt validation failed: {e}");
        std::process::exit(e.exit_code());
    }
}
