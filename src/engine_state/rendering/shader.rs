//! Shader compilation.
//!
//! A [`Shader`] is a compiled vertex and fragment module pair. Compilation
//! happens inside a validation error scope so a bad source becomes a
//! [`ShaderError`] carrying the compiler's log instead of a device panic. The
//! rest of the engine treats a `Shader` as an opaque handle that the
//! renderer binds into its pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use wgpu::{Device, ShaderModule};

/// Built-in vertex stage.
pub const DEFAULT_VERTEX_SHADER: &str = include_str!("../../../assets/shaders/chunk.vert.wgsl");
/// Built-in fragment stage.
pub const DEFAULT_FRAGMENT_SHADER: &str = include_str!("../../../assets/shaders/chunk.frag.wgsl");

/// Entry point of the vertex stage.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Entry point of the fragment stage.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    /// `vs_main`
    Vertex,
    /// `fs_main`
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors raised while loading, compiling or linking shaders.
#[derive(Debug, Error)]
pub enum ShaderError {
    /// A stage failed to compile
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile {
        /// Stage that failed
        stage: ShaderStage,
        /// Compiler diagnostics
        log: String,
    },
    /// The stages compiled but could not be combined into a pipeline
    #[error("shader program failed to link:\n{log}")]
    Link {
        /// Pipeline validation diagnostics
        log: String,
    },
    /// A shader override could not be read
    #[error("could not read shader source '{path}'")]
    Io {
        /// Override that failed to load
        path: PathBuf,
        /// Underlying read error
        #[source]
        source: std::io::Error,
    },
}

/// WGSL source text for both stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    /// Vertex stage source
    pub vertex: String,
    /// Fragment stage source
    pub fragment: String,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self {
            vertex: DEFAULT_VERTEX_SHADER.to_string(),
            fragment: DEFAULT_FRAGMENT_SHADER.to_string(),
        }
    }
}

impl ShaderSources {
    /// Loads the sources, reading each stage from its override path when one
    /// is given and using the built-in source otherwise.
    pub fn load(vertex: Option<&Path>, fragment: Option<&Path>) -> Result<Self, ShaderError> {
        fn read(path: Option<&Path>, fallback: &str) -> Result<String, ShaderError> {
            match path {
                Some(path) => std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
                    path: path.to_path_buf(),
                    source,
                }),
                None => Ok(fallback.to_string()),
            }
        }

        Ok(Self {
            vertex: read(vertex, DEFAULT_VERTEX_SHADER)?,
            fragment: read(fragment, DEFAULT_FRAGMENT_SHADER)?,
        })
    }
}

/// A compiled vertex and fragment module pair.
#[derive(Debug)]
pub struct Shader {
    vertex: ShaderModule,
    fragment: ShaderModule,
}

impl Shader {
    /// Compiles both stages.
    ///
    /// A failure is logged and returned; no handle exists for a shader that
    /// did not compile, so it can never be bound.
    pub fn compile(device: &Device, sources: &ShaderSources) -> Result<Self, ShaderError> {
        let vertex = Self::compile_stage(device, ShaderStage::Vertex, &sources.vertex)?;
        let fragment = Self::compile_stage(device, ShaderStage::Fragment, &sources.fragment)?;
        Ok(Self { vertex, fragment })
    }

    fn compile_stage(
        device: &Device,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderModule, ShaderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(match stage {
                ShaderStage::Vertex => "Chunk Vertex Shader",
                ShaderStage::Fragment => "Chunk Fragment Shader",
            }),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => {
                let log = error.to_string();
                log::error!("{stage} shader failed to compile: {log}");
                Err(ShaderError::Compile { stage, log })
            }
            None => Ok(module),
        }
    }

    /// The compiled vertex module.
    pub fn vertex_module(&self) -> &ShaderModule {
        &self.vertex
    }

    /// The compiled fragment module.
    pub fn fragment_module(&self) -> &ShaderModule {
        &self.fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_sources_declare_their_entry_points() {
        let sources = ShaderSources::default();
        assert!(sources.vertex.contains(&format!("fn {VERTEX_ENTRY}(")));
        assert!(sources.fragment.contains(&format!("fn {FRAGMENT_ENTRY}(")));
    }

    #[test]
    fn missing_override_reports_its_path() {
        let err = ShaderSources::load(Some(Path::new("nope/chunk.wgsl")), None).unwrap_err();
        assert!(matches!(err, ShaderError::Io { .. }));
        assert!(err.to_string().contains("nope/chunk.wgsl"));
    }

    #[test]
    fn compile_errors_name_the_stage() {
        let err = ShaderError::Compile {
            stage: ShaderStage::Fragment,
            log: "unknown identifier".to_string(),
        };
        assert!(err.to_string().starts_with("fragment shader failed to compile"));
    }
}
