//! Shader modules loaded from SPIR-V.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>) -> meshview_rhi::RhiResult<()> {
//! let vert = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/spirv/model.vert.spv"),
//!     ShaderStage::Vertex,
//!     "main",
//! )?;
//! let _info = vert.stage_create_info();
//! # Ok(())
//! # }
//! ```

use std::ffi::{CStr, CString};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};
use crate::handle::OwnedHandle;

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Pipeline stage a shader runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Vulkan stage flag.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Lowercase stage name for log messages.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode little-endian SPIR-V bytes into code words.
///
/// # Errors
///
/// [`RhiError::Shader`] when the length is not a multiple of 4, the blob is
/// empty, or the magic number is wrong.
pub fn decode_spirv(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if bytes.is_empty() || !bytes.len().is_multiple_of(4) {
        return Err(RhiError::Shader(format!(
            "SPIR-V code must be a non-empty multiple of 4 bytes, got {} bytes",
            bytes.len()
        )));
    }

    let code: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if code[0] != SPIRV_MAGIC {
        return Err(RhiError::Shader(format!(
            "bad SPIR-V magic number {:#010x}",
            code[0]
        )));
    }

    Ok(code)
}

/// Shader module with its stage and entry point.
pub struct Shader {
    inner: OwnedHandle<vk::ShaderModule>,
    stage: ShaderStage,
    entry_point: CString,
}

impl Shader {
    /// Load a module from a `.spv` file.
    pub fn from_spirv_file(
        device: Arc<Device>,
        path: &Path,
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        debug!("Loading {} shader from {:?}", stage, path);

        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::Shader(format!("failed to read shader file {:?}: {}", path, e))
        })?;

        Self::from_spirv_bytes(device, &bytes, stage, entry_point)
    }

    /// Create a module from an in-memory SPIR-V blob.
    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        let code = decode_spirv(bytes)?;
        let entry_point = CString::new(entry_point)
            .map_err(|e| RhiError::Shader(format!("invalid entry point name: {}", e)))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None) }
            .context("vkCreateShaderModule")?;

        info!(
            "Created {} shader module with entry point {:?}",
            stage, entry_point
        );

        Ok(Self {
            inner: unsafe { OwnedHandle::from_raw(device, module) },
            stage,
            entry_point,
        })
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.inner.handle()
    }

    /// Stage this module was loaded for.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Entry point name.
    #[inline]
    pub fn entry_point(&self) -> &CStr {
        &self.entry_point
    }

    /// Stage info for pipeline creation. Borrows the entry point name.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.handle())
            .name(&self.entry_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_shader_stage_to_vk_stage() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_shader_stage_display() {
        assert_eq!(ShaderStage::Vertex.to_string(), "vertex");
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }

    #[test]
    fn test_decode_spirv_words() {
        let bytes = words_to_bytes(&[SPIRV_MAGIC, 0x0001_0000, 7]);
        let code = decode_spirv(&bytes).unwrap();
        assert_eq!(code, vec![SPIRV_MAGIC, 0x0001_0000, 7]);
    }

    #[test]
    fn test_decode_spirv_rejects_misaligned() {
        let mut bytes = words_to_bytes(&[SPIRV_MAGIC]);
        bytes.push(0);
        assert!(matches!(decode_spirv(&bytes), Err(RhiError::Shader(_))));
        assert!(matches!(decode_spirv(&[]), Err(RhiError::Shader(_))));
    }

    #[test]
    fn test_decode_spirv_rejects_bad_magic() {
        let bytes = words_to_bytes(&[0xdead_beef, 0]);
        assert!(matches!(decode_spirv(&bytes), Err(RhiError::Shader(_))));
    }
}
