//! Device capability negotiation
//!
//! Runs once when a device is created. Finds a texel type the device can
//! render to (half float, then full float, then 8-bit normalized), then for
//! each field layout cascades R → RG → RGBA until a renderable format is
//! found. The resulting [`DeviceCapabilities`] is read-only for the session.

use super::device::{Channels, DeviceError, FieldFormat, TexelType};

/// Which rung of the context fallback ladder produced the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextTier {
    /// Primary backends with full limits
    Primary,
    /// Any backend with WebGL2-level limits
    Downlevel,
    /// Software adapter
    Fallback,
}

/// Format and filtering support of a device.
pub trait FormatProbe {
    /// Whether a texture of `format` can be rendered to and sampled.
    fn is_renderable(&self, format: FieldFormat) -> bool;

    /// Whether `format` supports linear filtering when sampled.
    fn is_filterable(&self, format: FieldFormat) -> bool;
}

/// Negotiated capability record.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCapabilities {
    pub tier: ContextTier,
    pub texel: TexelType,
    pub linear_filtering: bool,
    pub format_r: FieldFormat,
    pub format_rg: FieldFormat,
    pub format_rgba: FieldFormat,
}

impl DeviceCapabilities {
    /// Everything supported, as the software device reports.
    pub fn software() -> Self {
        Self {
            tier: ContextTier::Fallback,
            texel: TexelType::Full,
            linear_filtering: true,
            format_r: FieldFormat::new(Channels::R, TexelType::Full),
            format_rg: FieldFormat::new(Channels::Rg, TexelType::Full),
            format_rgba: FieldFormat::new(Channels::Rgba, TexelType::Full),
        }
    }

    pub fn supports_float(&self) -> bool {
        self.texel.is_float()
    }

    /// True when simulation quality has to be lowered for this device.
    pub fn is_degraded(&self) -> bool {
        !self.linear_filtering || !self.supports_float()
    }
}

/// Probe `probe` and build the capability record.
pub fn negotiate(tier: ContextTier, probe: &dyn FormatProbe) -> Result<DeviceCapabilities, DeviceError> {
    let texel = [TexelType::Half, TexelType::Full, TexelType::Unorm8]
        .into_iter()
        .find(|&texel| probe.is_renderable(FieldFormat::new(Channels::Rgba, texel)))
        .ok_or(DeviceError::NoRenderableFormat)?;

    let format_rgba = FieldFormat::new(Channels::Rgba, texel);
    let format_rg = supported_format(probe, Channels::Rg, texel).unwrap_or(format_rgba);
    let format_r = supported_format(probe, Channels::R, texel).unwrap_or(format_rg);

    let linear_filtering = probe.is_filterable(format_rgba) && probe.is_filterable(format_rg);

    let capabilities = DeviceCapabilities {
        tier,
        texel,
        linear_filtering,
        format_r,
        format_rg,
        format_rgba,
    };

    if capabilities.is_degraded() {
        log::warn!(
            "Degraded fluid capabilities: texel {:?}, linear filtering {}",
            texel,
            linear_filtering
        );
    } else {
        log::info!(
            "Fluid capabilities: texel {:?}, R {:?}, RG {:?}",
            texel,
            format_r.channels,
            format_rg.channels
        );
    }

    Ok(capabilities)
}

/// First renderable format at `channels` or wider.
fn supported_format(probe: &dyn FormatProbe, channels: Channels, texel: TexelType) -> Option<FieldFormat> {
    let mut candidate = Some(channels);
    while let Some(channels) = candidate {
        let format = FieldFormat::new(channels, texel);
        if probe.is_renderable(format) {
            return Some(format);
        }
        candidate = channels.wider();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TableProbe {
        renderable: Vec<FieldFormat>,
        filterable: Vec<FieldFormat>,
    }

    impl FormatProbe for TableProbe {
        fn is_renderable(&self, format: FieldFormat) -> bool {
            self.renderable.contains(&format)
        }

        fn is_filterable(&self, format: FieldFormat) -> bool {
            self.filterable.contains(&format)
        }
    }

    fn all(texel: TexelType) -> Vec<FieldFormat> {
        [Channels::R, Channels::Rg, Channels::Rgba]
            .into_iter()
            .map(|channels| FieldFormat::new(channels, texel))
            .collect()
    }

    #[test]
    fn test_prefers_half_float() {
        let mut renderable = all(TexelType::Half);
        renderable.extend(all(TexelType::Full));
        let probe = TableProbe {
            filterable: all(TexelType::Half),
            renderable,
        };
        let caps = negotiate(ContextTier::Primary, &probe).unwrap();
        assert_eq!(caps.texel, TexelType::Half);
        assert_eq!(caps.format_r.channels, Channels::R);
        assert!(caps.linear_filtering);
        assert!(!caps.is_degraded());
    }

    #[test]
    fn test_cascades_to_wider_channels() {
        // Only RGBA renders: R and RG fall through to RGBA
        let probe = TableProbe {
            renderable: vec![FieldFormat::new(Channels::Rgba, TexelType::Half)],
            filterable: all(TexelType::Half),
        };
        let caps = negotiate(ContextTier::Downlevel, &probe).unwrap();
        assert_eq!(caps.format_r.channels, Channels::Rgba);
        assert_eq!(caps.format_rg.channels, Channels::Rgba);

        // R missing but RG renders: R cascades to RG only
        let probe = TableProbe {
            renderable: vec![
                FieldFormat::new(Channels::Rg, TexelType::Half),
                FieldFormat::new(Channels::Rgba, TexelType::Half),
            ],
            filterable: all(TexelType::Half),
        };
        let caps = negotiate(ContextTier::Downlevel, &probe).unwrap();
        assert_eq!(caps.format_r.channels, Channels::Rg);
        assert_eq!(caps.format_rg.channels, Channels::Rg);
    }

    #[test]
    fn test_full_float_without_filtering_is_degraded() {
        let probe = TableProbe {
            renderable: all(TexelType::Full),
            filterable: vec![],
        };
        let caps = negotiate(ContextTier::Primary, &probe).unwrap();
        assert_eq!(caps.texel, TexelType::Full);
        assert!(!caps.linear_filtering);
        assert!(caps.is_degraded());
    }

    #[test]
    fn test_unorm_fallback_is_degraded() {
        let probe = TableProbe {
            renderable: all(TexelType::Unorm8),
            filterable: all(TexelType::Unorm8),
        };
        let caps = negotiate(ContextTier::Fallback, &probe).unwrap();
        assert!(!caps.supports_float());
        assert!(caps.is_degraded());
    }

    #[test]
    fn test_no_renderable_format_is_fatal() {
        let probe = TableProbe {
            renderable: vec![FieldFormat::new(Channels::R, TexelType::Half)],
            filterable: vec![],
        };
        assert!(matches!(
            negotiate(ContextTier::Primary, &probe),
            Err(DeviceError::NoRenderableFormat)
        ));
    }
}
