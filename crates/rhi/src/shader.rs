//! Shader module management.
//!
//! This module handles SPIR-V loading and VkShaderModule creation.
//! It supports loading shaders from files or byte arrays and provides
//! the necessary Vulkan structures for pipeline creation.
//!
//! # Overview
//!
//! - [`ShaderStage`] defines the type of shader (vertex or fragment)
//! - [`Shader`] wraps VkShaderModule with stage and entry point information
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use facet_rhi::device::Device;
//! use facet_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), facet_rhi::RhiError> {
//! // Load vertex shader from SPIR-V file
//! let vertex_shader = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/mesh.vert.spv"),
//!     ShaderStage::Vertex,
//!     "main",
//! )?;
//!
//! // Load fragment shader from SPIR-V file
//! let fragment_shader = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/mesh.frag.spv"),
//!     ShaderStage::Fragment,
//!     "main",
//! )?;
//!
//! // Get pipeline shader stage create info for pipeline creation
//! let _vertex_stage_info = vertex_shader.stage_create_info();
//! let _fragment_stage_info = fragment_shader.stage_create_info();
//! # Ok(())
//! # }
//! ```

use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// First word of every valid SPIR-V binary.
const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Shader stage type.
///
/// Defines which stage of the graphics pipeline the shader will be used in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage - processes each vertex
    Vertex,
    /// Fragment (pixel) shader stage - processes each fragment
    Fragment,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Converts raw bytes to SPIR-V code words, validating shape and magic.
fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>, String> {
    if bytes.is_empty() {
        return Err("SPIR-V code is empty".to_string());
    }

    if !bytes.len().is_multiple_of(4) {
        return Err(format!(
            "SPIR-V code must be 4-byte aligned, got {} bytes",
            bytes.len()
        ));
    }

    let code: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if code[0] != SPIRV_MAGIC {
        return Err(format!(
            "Not a SPIR-V binary (magic word {:#010x})",
            code[0]
        ));
    }

    Ok(code)
}

/// Vulkan shader module wrapper.
///
/// This struct manages the lifecycle of a VkShaderModule and provides
/// the necessary information for creating graphics pipelines.
///
/// # Thread Safety
///
/// The shader module itself is immutable after creation and can be
/// safely shared between threads. The underlying Vulkan handle is
/// managed by the device.
pub struct Shader {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan shader module handle.
    module: vk::ShaderModule,
    /// Shader stage type.
    stage: ShaderStage,
    /// Entry point function name.
    entry_point: CString,
}

impl Shader {
    /// Creates a shader module from a SPIR-V file.
    ///
    /// This method reads the SPIR-V binary from the specified file path
    /// and creates a Vulkan shader module.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `path` - Path to the SPIR-V file
    /// * `stage` - The shader stage (vertex or fragment)
    /// * `entry_point` - The name of the entry point function (typically "main")
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The SPIR-V data is invalid
    /// - Shader module creation fails
    pub fn from_spirv_file(
        device: Arc<Device>,
        path: &Path,
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        debug!("Loading {} shader from {:?}", stage, path);

        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("Failed to read shader file {:?}: {}", path, e))
        })?;

        Self::from_spirv_bytes(device, &bytes, stage, entry_point)
    }

    /// Creates a shader module from SPIR-V bytes.
    ///
    /// The bytes must be a valid little-endian SPIR-V binary with 4-byte
    /// alignment.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `bytes` - The SPIR-V binary data
    /// * `stage` - The shader stage (vertex or fragment)
    /// * `entry_point` - The name of the entry point function (typically "main")
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The bytes are empty, misaligned, or lack the SPIR-V magic word
    /// - The entry point name contains null bytes
    /// - Shader module creation fails
    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        let code = spirv_words(bytes).map_err(RhiError::ShaderError)?;

        // Create shader module
        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);

        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        // Create entry point CString
        let entry_point_cstring = CString::new(entry_point)
            .map_err(|e| RhiError::ShaderError(format!("Invalid entry point name: {}", e)))?;

        info!(
            "Created {} shader module with entry point '{}'",
            stage, entry_point
        );

        Ok(Self {
            device,
            module,
            stage,
            entry_point: entry_point_cstring,
        })
    }

    /// Returns the Vulkan shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Returns the shader stage.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Returns the entry point function name as a C string reference.
    #[inline]
    pub fn entry_point(&self) -> &std::ffi::CStr {
        &self.entry_point
    }

    /// Creates a pipeline shader stage create info structure.
    ///
    /// This structure is used when creating graphics pipelines. The returned
    /// structure borrows from this shader and must not outlive it.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
        debug!("Destroyed {} shader module", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spirv_header() -> Vec<u8> {
        // Magic, version 1.6, generator 0, bound 1, schema 0
        let words: [u32; 5] = [SPIRV_MAGIC, 0x0001_0600, 0, 1, 0];
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
    fn test_shader_stage_name_and_display() {
        assert_eq!(ShaderStage::Vertex.name(), "vertex");
        assert_eq!(ShaderStage::Fragment.name(), "fragment");
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
    }

    #[test]
    fn test_spirv_words_accepts_valid_header() {
        let words = spirv_words(&spirv_header()).unwrap();
        assert_eq!(words[0], SPIRV_MAGIC);
        assert_eq!(words.len(), 5);
    }

    #[test]
    fn test_spirv_words_rejects_empty_input() {
        assert!(spirv_words(&[]).is_err());
    }

    #[test]
    fn test_spirv_words_rejects_misaligned_input() {
        let mut bytes = spirv_header();
        bytes.push(0);
        assert!(spirv_words(&bytes).is_err());
    }

    #[test]
    fn test_spirv_words_rejects_wrong_magic() {
        let words: [u32; 5] = [0xdead_beef, 0x0001_0600, 0, 1, 0];
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        assert!(spirv_words(&bytes).is_err());
    }
}
