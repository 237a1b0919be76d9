use std::fmt;
use std::path::Path;

use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// GPU generation. Selects built-in register-file geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Hsw,
    Bdw,
    Chv,
    Skl,
    Bxt,
    Kbl,
    Glk,
    Cnl,
    IclLp,
    TglLp,
    Dg1,
    XeHp,
    Pvc,
}

impl Platform {
    pub const ALL: [Platform; 13] = [
        Platform::Hsw,
        Platform::Bdw,
        Platform::Chv,
        Platform::Skl,
        Platform::Bxt,
        Platform::Kbl,
        Platform::Glk,
        Platform::Cnl,
        Platform::IclLp,
        Platform::TglLp,
        Platform::Dg1,
        Platform::XeHp,
        Platform::Pvc,
    ];

    /// Map a CPU name to a platform. Unknown and empty names fall back to SKL.
    pub fn from_cpu(cpu: &str) -> Self {
        Self::parse(cpu).unwrap_or(Platform::Skl)
    }

    /// Strict variant of [`Platform::from_cpu`] (case-insensitive).
    pub fn parse(cpu: &str) -> Option<Self> {
        let upper = cpu.to_ascii_uppercase();
        Self::ALL.into_iter().find(|p| p.cpu_name() == upper)
    }

    pub fn cpu_name(self) -> &'static str {
        match self {
            Platform::Hsw => "HSW",
            Platform::Bdw => "BDW",
            Platform::Chv => "CHV",
            Platform::Skl => "SKL",
            Platform::Bxt => "BXT",
            Platform::Kbl => "KBL",
            Platform::Glk => "GLK",
            Platform::Cnl => "CNL",
            Platform::IclLp => "ICLLP",
            Platform::TglLp => "TGLLP",
            Platform::Dg1 => "DG1",
            Platform::XeHp => "XEHP",
            Platform::Pvc => "PVC",
        }
    }

    /// Size of one general register file entry in bytes.
    pub fn grf_size(self) -> u32 {
        match self {
            Platform::Pvc => 64,
            _ => 32,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cpu_name())
    }
}

/// Upper bound on instructions in one scalar-merge bundle.
pub const MAX_BUNDLE_SIZE: usize = 16;

/// Target configuration consumed by the lowering passes.
///
/// Carries the register-file geometry (GRF size drives R0 vector sizing and
/// operand capacity limits) and the scalar-merge policy.
#[derive(Clone, Debug)]
pub struct TargetConfig {
    /// Short identifier used in CLI and file paths (e.g. "tgllp").
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    pub platform: Platform,
    /// GRF size in bytes.
    pub grf_size: u32,
    /// Whether the scalar-merge pass runs at all.
    pub merge_enabled: bool,
    /// Bundle size limit, clamped to [`MAX_BUNDLE_SIZE`].
    pub max_bundle_size: usize,
}

impl TargetConfig {
    /// Built-in configuration for a platform.
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            name: platform.cpu_name().to_ascii_lowercase(),
            display_name: format!("Intel {}", platform.cpu_name()),
            platform,
            grf_size: platform.grf_size(),
            merge_enabled: true,
            max_bundle_size: MAX_BUNDLE_SIZE,
        }
    }

    /// Default target (SKL geometry).
    pub fn skl() -> Self {
        Self::for_platform(Platform::Skl)
    }

    /// Largest byte span a single operand may cover (two GRFs).
    pub fn max_operand_bytes(&self) -> u32 {
        self.grf_size * 2
    }

    /// Number of 32-bit lanes in the R0 vector.
    pub fn r0_lanes(&self) -> u32 {
        self.grf_size / 4
    }

    /// Effective bundle size limit.
    pub fn bundle_limit(&self) -> usize {
        self.max_bundle_size.clamp(1, MAX_BUNDLE_SIZE)
    }

    /// Check the geometry and merge policy the passes rely on.
    pub fn validate(&self) -> Result<(), String> {
        if self.grf_size == 0 || self.grf_size % 4 != 0 {
            return Err(format!(
                "grf.size must be a positive multiple of 4, got {}",
                self.grf_size
            ));
        }
        if self.max_bundle_size == 0 || self.max_bundle_size > MAX_BUNDLE_SIZE {
            return Err(format!(
                "merge.max_bundle_size must be in 1..={}, got {}",
                MAX_BUNDLE_SIZE, self.max_bundle_size
            ));
        }
        Ok(())
    }

    /// Load a target configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Diagnostic> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read target config '{}': {}", path.display(), e),
                Span::dummy(),
            )
        })?;
        Self::parse_toml(&content, path)
    }

    /// Resolve a target by name: built-in platforms first, then
    /// `targets/{name}.toml` relative to the working directory.
    pub fn resolve(name: &str) -> Result<Self, Diagnostic> {
        if name.contains('/') || name.contains('\\') || name.contains("..") || name.starts_with('.')
        {
            return Err(Diagnostic::error(
                format!("invalid target name '{}'", name),
                Span::dummy(),
            ));
        }

        if let Some(platform) = Platform::parse(name) {
            return Ok(Self::for_platform(platform));
        }

        let path = std::path::PathBuf::from(format!("targets/{}.toml", name));
        if path.exists() {
            return Self::load(&path);
        }

        let known: Vec<String> = Platform::ALL
            .iter()
            .map(|p| p.cpu_name().to_ascii_lowercase())
            .collect();
        Err(Diagnostic::error(
            format!("unknown target '{}' (looked for '{}')", name, path.display()),
            Span::dummy(),
        )
        .with_help(format!("available targets: {}", known.join(", "))))
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self, Diagnostic> {
        let err =
            |msg: String| Diagnostic::error(format!("{}: {}", path.display(), msg), Span::dummy());

        let mut name = String::new();
        let mut display_name = String::new();
        let mut platform_name = String::new();
        let mut grf_size: Option<u32> = None;
        let mut merge_enabled = true;
        let mut max_bundle_size = MAX_BUNDLE_SIZE;

        let mut section = String::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            if let Some((key, value)) = trimmed.split_once('=') {
                let key = key.trim();
                let value = value.trim();
                let unquoted = value.trim_matches('"');

                match (section.as_str(), key) {
                    ("target", "name") => name = unquoted.to_string(),
                    ("target", "display_name") => display_name = unquoted.to_string(),
                    ("target", "platform") => platform_name = unquoted.to_string(),
                    ("grf", "size") => {
                        grf_size = Some(
                            value
                                .parse()
                                .map_err(|_| err(format!("invalid grf.size: {}", value)))?,
                        );
                    }
                    ("merge", "enabled") => merge_enabled = value == "true",
                    ("merge", "max_bundle_size") => {
                        max_bundle_size = value
                            .parse()
                            .map_err(|_| err(format!("invalid merge.max_bundle_size: {}", value)))?;
                    }
                    _ => {}
                }
            }
        }

        if name.is_empty() {
            return Err(err("missing target.name".to_string()));
        }
        let platform = if platform_name.is_empty() {
            Platform::Skl
        } else {
            Platform::parse(&platform_name)
                .ok_or_else(|| err(format!("unknown platform '{}'", platform_name)))?
        };

        let mut config = Self::for_platform(platform);
        config.name = name;
        if !display_name.is_empty() {
            config.display_name = display_name;
        }
        if let Some(size) = grf_size {
            config.grf_size = size;
        }
        config.merge_enabled = merge_enabled;
        config.max_bundle_size = max_bundle_size;
        config.validate().map_err(err)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests;
