//! Host platform → runtime distribution directory.

/// `(os, arch)` as reported by `std::env::consts`, mapped to the directory
/// name under `runtimes/`.
const PLATFORMS: &[((&str, &str), &str)] = &[
    (("linux", "x86_64"), "linux-x64"),
    (("linux", "aarch64"), "linux-arm64"),
    (("macos", "x86_64"), "darwin-x64"),
    (("macos", "aarch64"), "darwin-arm64"),
    (("windows", "x86_64"), "windows-x64"),
    (("windows", "aarch64"), "windows-arm64"),
];

/// An operating system / CPU architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform<'a> {
    pub os: &'a str,
    pub arch: &'a str,
}

impl Platform<'static> {
    /// The platform this binary was compiled for.
    pub fn host() -> Self {
        Self {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        }
    }
}

impl Platform<'_> {
    /// Canonical key such as `linux-x64`, if the pair is supported.
    pub fn key(&self) -> Option<&'static str> {
        PLATFORMS
            .iter()
            .find(|((os, arch), _)| *os == self.os && *arch == self.arch)
            .map(|(_, key)| *key)
    }

    /// File name of the runtime executable on this platform.
    pub fn binary_name(&self) -> &'static str {
        if self.os == "windows" {
            "wasmtime.exe"
        } else {
            "wasmtime"
        }
    }
}
