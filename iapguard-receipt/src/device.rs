//! Device binding.
//!
//! A receipt embeds a SHA-1 digest over the issuing machine's identifier,
//! an opaque per-install value, and the bundle identifier attribute. Copying
//! the receipt to another machine changes the first input, so the digest no
//! longer matches.

use crate::error::DeviceUnavailable;
use sha1::{Digest, Sha1};

/// Length of the device-binding digest.
pub const DEVICE_DIGEST_LEN: usize = 20;

/// A device-binding digest.
pub type DeviceDigest = [u8; DEVICE_DIGEST_LEN];

/// Computes `SHA1(device_id || opaque_value || bundle_id_bytes)`.
///
/// No separators or length prefixes are inserted between the inputs.
#[must_use]
pub fn device_digest(device_id: &[u8], opaque_value: &[u8], bundle_id_bytes: &[u8]) -> DeviceDigest {
    let mut hasher = Sha1::new();
    hasher.update(device_id);
    hasher.update(opaque_value);
    hasher.update(bundle_id_bytes);
    hasher.finalize().into()
}

/// Source of the stable per-machine identifier.
pub trait DeviceIdentityProvider: Send + Sync {
    /// Returns the raw identifier bytes for this machine.
    fn current_device_id(&self) -> Result<Vec<u8>, DeviceUnavailable>;
}

/// Fixed identifier, for tools and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticDeviceId(pub Vec<u8>);

impl DeviceIdentityProvider for StaticDeviceId {
    fn current_device_id(&self) -> Result<Vec<u8>, DeviceUnavailable> {
        Ok(self.0.clone())
    }
}

/// Hardware address of a network interface.
///
/// Without an explicit interface this reads `en0` on macOS and the first
/// non-loopback interface with a non-zero address on Linux. The identifier
/// is the 6 raw address bytes.
#[derive(Debug, Clone, Default)]
pub struct InterfaceDeviceId {
    interface: Option<String>,
}

impl InterfaceDeviceId {
    /// Uses the platform's primary interface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the named interface.
    #[must_use]
    pub fn with_interface(name: impl Into<String>) -> Self {
        Self {
            interface: Some(name.into()),
        }
    }
}

impl DeviceIdentityProvider for InterfaceDeviceId {
    fn current_device_id(&self) -> Result<Vec<u8>, DeviceUnavailable> {
        let text = read_hardware_address(self.interface.as_deref())?;
        parse_hardware_address(&text)
            .ok_or_else(|| DeviceUnavailable("unparseable hardware address".to_string()))
    }
}

/// Parses `aa:bb:cc:dd:ee:ff` into 6 bytes.
#[must_use]
pub fn parse_hardware_address(text: &str) -> Option<Vec<u8>> {
    let bytes: Vec<u8> = text
        .trim()
        .split(':')
        .map(|part| {
            if part.len() == 2 {
                u8::from_str_radix(part, 16).ok()
            } else {
                None
            }
        })
        .collect::<Option<_>>()?;
    (bytes.len() == 6).then_some(bytes)
}

#[cfg(target_os = "linux")]
fn read_hardware_address(interface: Option<&str>) -> Result<String, DeviceUnavailable> {
    use std::path::Path;

    let base = Path::new("/sys/class/net");
    let read_address = |name: &str| {
        std::fs::read_to_string(base.join(name).join("address"))
            .map(|s| s.trim().to_string())
            .map_err(|e| DeviceUnavailable(format!("{name}: {e}")))
    };

    if let Some(name) = interface {
        return read_address(name);
    }

    let mut names: Vec<String> = std::fs::read_dir(base)
        .map_err(|e| DeviceUnavailable(format!("cannot list interfaces: {e}")))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name != "lo")
        .collect();
    names.sort();

    names
        .iter()
        .filter_map(|name| read_address(name.as_str()).ok())
        .find(|addr| parse_hardware_address(addr).is_some_and(|b| b.iter().any(|x| *x != 0)))
        .ok_or_else(|| DeviceUnavailable("no interface with a hardware address".to_string()))
}

#[cfg(target_os = "macos")]
fn read_hardware_address(interface: Option<&str>) -> Result<String, DeviceUnavailable> {
    let name = interface.unwrap_or("en0");
    let output = std::process::Command::new("ifconfig")
        .arg(name)
        .output()
        .map_err(|e| DeviceUnavailable(format!("ifconfig {name}: {e}")))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("ether "))
        .and_then(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .ok_or_else(|| DeviceUnavailable(format!("{name} has no hardware address")))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn read_hardware_address(_interface: Option<&str>) -> Result<String, DeviceUnavailable> {
    Err(DeviceUnavailable("unsupported platform".to_string()))
}
