//! ABI signatures and host platform screening.

use std::fmt;

use crate::error::{Error, Result};

#[cfg(target_os = "linux")]
const HOST_OS: &str = "linux";
#[cfg(target_os = "macos")]
const HOST_OS: &str = "macos";

/// Parsed `<compiler>-<library>-<dotted-version>-<abi_type>` tag,
/// e.g. `gcc-libstdc++-2.35-cxx11_abi`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiSignature {
    pub compiler: String,
    pub library: String,
    pub version_parts: Vec<u64>,
    pub abi_type: String,
}

impl AbiSignature {
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('-').collect();
        if parts.len() != 4 {
            return Err(Error::MalformedManifest(format!(
                "invalid ABI signature '{raw}': expected <compiler>-<library>-<version>-<abi_type>"
            )));
        }

        let version_parts = parts[2]
            .split('.')
            .map(str::parse)
            .collect::<std::result::Result<Vec<u64>, _>>()
            .map_err(|_| {
                Error::MalformedManifest(format!("invalid ABI version in '{raw}'"))
            })?;

        Ok(Self {
            compiler: parts[0].to_owned(),
            library: parts[1].to_owned(),
            version_parts,
            abi_type: parts[3].to_owned(),
        })
    }

    /// Whether a host with this signature can load a module built against
    /// `required`.
    ///
    /// Compiler, library and ABI type must match exactly. Versions compare
    /// element-wise: the first host element greater than the requirement wins,
    /// the first smaller loses, and an all-equal prefix is compatible iff the
    /// host version is at least as long.
    pub fn is_compatible_with(&self, required: &AbiSignature) -> bool {
        if self.compiler != required.compiler
            || self.library != required.library
            || self.abi_type != required.abi_type
        {
            return false;
        }

        for (host, req) in self.version_parts.iter().zip(&required.version_parts) {
            if host > req {
                return true;
            }
            if host < req {
                return false;
            }
        }
        self.version_parts.len() >= required.version_parts.len()
    }
}

impl fmt::Display for AbiSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self
            .version_parts
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        write!(
            f,
            "{}-{}-{}-{}",
            self.compiler, self.library, version, self.abi_type
        )
    }
}

/// Host platform identity used to screen bundle binaries.
#[derive(Debug, Clone)]
pub struct HostPlatform {
    /// `<arch>-<os>`, e.g. `x86_64-linux`.
    pub triplet: String,
    pub abi: AbiSignature,
}

impl HostPlatform {
    /// Probe the running host.
    pub fn probe() -> Result<Self> {
        let triplet = format!("{}-{}", std::env::consts::ARCH, HOST_OS);
        let abi = AbiSignature::parse(&host_abi_signature()?)?;
        Ok(Self { triplet, abi })
    }
}

/// Runtime ABI tag of this host.
///
/// The dominant native toolchains per platform are assumed; the version
/// component is the runtime revision that actually gates loadability
/// (glibc on Linux, the OS product version on macOS).
#[cfg(target_os = "linux")]
fn host_abi_signature() -> Result<String> {
    use std::ffi::CStr;

    let raw = unsafe { CStr::from_ptr(libc::gnu_get_libc_version()) };
    let version = raw.to_str().map_err(|_| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "glibc version is not valid UTF-8",
        ))
    })?;
    Ok(format!("gcc-libstdc++-{version}-cxx11_abi"))
}

#[cfg(target_os = "macos")]
fn host_abi_signature() -> Result<String> {
    let mut buf = [0u8; 256];
    let mut len = buf.len();
    let rc = unsafe {
        libc::sysctlbyname(
            c"kern.osproductversion".as_ptr(),
            buf.as_mut_ptr().cast(),
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }

    let version = std::str::from_utf8(&buf[..len])
        .map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "kern.osproductversion is not valid UTF-8",
            ))
        })?
        .trim_end_matches('\0');
    Ok(format!("clang-libc++-{version}-libc++_abi"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(raw: &str) -> AbiSignature {
        AbiSignature::parse(raw).unwrap()
    }

    #[test]
    fn parses_well_formed_signatures() {
        let parsed = sig("gcc-libstdc++-2.35-cxx11_abi");
        assert_eq!(parsed.compiler, "gcc");
        assert_eq!(parsed.library, "libstdc++");
        assert_eq!(parsed.version_parts, vec![2, 35]);
        assert_eq!(parsed.abi_type, "cxx11_abi");
        assert_eq!(parsed.to_string(), "gcc-libstdc++-2.35-cxx11_abi");
    }

    #[test]
    fn rejects_malformed_signatures() {
        assert!(AbiSignature::parse("gcc-libstdc++-2.35").is_err());
        assert!(AbiSignature::parse("gcc-libstdc++-two.four-cxx11_abi").is_err());
        assert!(AbiSignature::parse("clang-libc++-14.3.1-libc++_abi-extra").is_err());
    }

    #[test]
    fn newer_host_accepts_older_requirement() {
        let host = sig("gcc-libstdc++-2.35-cxx11_abi");
        assert!(host.is_compatible_with(&sig("gcc-libstdc++-2.33-cxx11_abi")));
        assert!(!host.is_compatible_with(&sig("gcc-libstdc++-2.36-cxx11_abi")));
    }

    #[test]
    fn compatibility_is_reflexive_but_not_symmetric() {
        let newer = sig("gcc-libstdc++-2.35-cxx11_abi");
        let older = sig("gcc-libstdc++-2.33-cxx11_abi");

        assert!(newer.is_compatible_with(&newer));
        assert!(older.is_compatible_with(&older));
        assert!(newer.is_compatible_with(&older));
        assert!(!older.is_compatible_with(&newer));
    }

    #[test]
    fn tuple_fields_must_match_exactly() {
        let host = sig("gcc-libstdc++-2.35-cxx11_abi");
        assert!(!host.is_compatible_with(&sig("clang-libstdc++-2.35-cxx11_abi")));
        assert!(!host.is_compatible_with(&sig("gcc-libc++-2.35-cxx11_abi")));
        assert!(!host.is_compatible_with(&sig("gcc-libstdc++-2.35-libc++_abi")));
    }

    #[test]
    fn equal_prefix_compares_version_lengths() {
        let short = sig("gcc-libstdc++-2.35-cxx11_abi");
        let long = sig("gcc-libstdc++-2.35.1-cxx11_abi");

        assert!(long.is_compatible_with(&short));
        assert!(!short.is_compatible_with(&long));
    }

    #[test]
    fn probe_reports_a_parseable_host() {
        let host = HostPlatform::probe().unwrap();
        assert!(host.triplet.ends_with(HOST_OS));
        assert!(host.abi.is_compatible_with(&host.abi));
    }
}
